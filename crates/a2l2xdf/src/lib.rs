//! A2L to XDF definition converter.
//!
//! Streams a mapping CSV against a compiled A2L symbol database and
//! grows an XDF document: one table or constant per resolved row, plus
//! synthesized axis tables where the sheet asks for them. The binary in
//! `main.rs` wires this to the filesystem.

pub mod equation;
pub mod mapper;
pub mod text;
pub mod xdf;

use a2l2xdf_symbols::SymbolDatabase;
use anyhow::{Context, Result};
use mapper::CsvRow;
use tracing::{debug, warn};
use xdf::{AxisRole, XdfDocument};

/// Toggles that change what the converter emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Emit scalar characteristics as XDFCONSTANT entries instead of
    /// 1x1 tables.
    pub use_constants: bool,
}

/// What happened during a conversion run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub tables: usize,
    pub constants: usize,
    pub axis_tables: usize,
    /// Table names that were not in the database, in row order.
    pub missing: Vec<String>,
}

impl ConvertSummary {
    /// Rows consumed from the sheet, resolved or not.
    pub fn rows(&self) -> usize {
        self.tables + self.constants + self.missing.len()
    }
}

/// Strip a UTF-8 byte-order mark if present. Sheets exported from
/// spreadsheet tools usually carry one.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

/// Stream mapping rows from `csv_data` against `db`, appending every
/// resolved characteristic to `doc`.
///
/// Rows whose table name is not in the database are reported and
/// skipped; a structurally broken sheet aborts the run.
pub fn convert(
    db: &SymbolDatabase,
    csv_data: &[u8],
    doc: &mut XdfDocument,
    options: ConvertOptions,
) -> Result<ConvertSummary> {
    let mut reader = csv::Reader::from_reader(strip_bom(csv_data));
    let mut summary = ConvertSummary::default();

    for (index, record) in reader.deserialize::<CsvRow>().enumerate() {
        let row = record.with_context(|| format!("Failed to parse mapping row {}", index + 1))?;
        convert_row(db, &row, doc, options, &mut summary);
    }
    Ok(summary)
}

/// Convert one row, recording the outcome in `summary`.
pub fn convert_row(
    db: &SymbolDatabase,
    row: &CsvRow,
    doc: &mut XdfDocument,
    options: ConvertOptions,
    summary: &mut ConvertSummary,
) {
    let Some(characteristic) = db.characteristic(&row.table_name) else {
        warn!("Could not find! {}", row.table_name);
        summary.missing.push(row.table_name.clone());
        return;
    };

    debug!(
        "{} at {:#x} spans {} bytes",
        row.table_name,
        characteristic.address,
        mapper::map_size_bytes(characteristic)
    );

    let def = mapper::build_table_definition(characteristic, row, doc, options.use_constants);

    if def.constant {
        doc.push_constant(&def);
        summary.constants += 1;
        return;
    }

    doc.push_table(&def);
    summary.tables += 1;

    if row.wants_x_table() && def.x.is_some() {
        doc.push_axis_table(&def, AxisRole::X);
        summary.axis_tables += 1;
    }
    if row.wants_y_table() && def.y.is_some() {
        doc.push_axis_table(&def, AxisRole::Y);
        summary.axis_tables += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2l2xdf_symbols::{Characteristic, CompuMethod, DataType};

    fn scalar(name: &str) -> Characteristic {
        Characteristic {
            name: name.to_owned(),
            long_identifier: String::new(),
            address: 0xA081_0000,
            datatype: DataType::Uword,
            lower_limit: 0.0,
            upper_limit: 1.0,
            compu_method: CompuMethod::default(),
            axis_descriptions: Vec::new(),
        }
    }

    fn row(table: &str) -> CsvRow {
        CsvRow {
            table_name: table.to_owned(),
            category: "Fuel".to_owned(),
            sub_category: String::new(),
            generate_x_axis: "False".to_owned(),
            generate_y_axis: "False".to_owned(),
        }
    }

    #[test]
    fn row_outcomes_land_in_the_summary() {
        let db = SymbolDatabase::from_characteristics(vec![scalar("KRKTE")]);
        let mut doc = XdfDocument::new("test");
        let mut summary = ConvertSummary::default();

        convert_row(&db, &row("KRKTE"), &mut doc, ConvertOptions::default(), &mut summary);
        assert_eq!(summary.tables, 1);
        assert_eq!(doc.entry_count(), 1);

        convert_row(&db, &row("GONE"), &mut doc, ConvertOptions::default(), &mut summary);
        assert_eq!(summary.missing, vec!["GONE".to_owned()]);
        assert_eq!(doc.entry_count(), 1, "missing rows append nothing");
        assert_eq!(summary.rows(), 2);
    }

    #[test]
    fn bom_is_stripped_once() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBFa,b"), b"a,b");
        assert_eq!(strip_bom(b"a,b"), b"a,b");
        assert_eq!(strip_bom(b""), b"");
    }

    #[test]
    fn summary_counts_every_row() {
        let summary = ConvertSummary {
            tables: 3,
            constants: 1,
            axis_tables: 2,
            missing: vec!["GONE".to_owned()],
        };
        assert_eq!(summary.rows(), 5);
    }
}
