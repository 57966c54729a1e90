//! Per-row schema mapping.
//!
//! Resolves one mapping-CSV row against the symbol database and shapes
//! the result into a [`TableDefinition`] the document assembler can
//! render. Definitions are built fresh per row and discarded after
//! assembly; nothing here refers back to earlier rows.

use crate::equation;
use crate::text::repair_degree_sign;
use crate::xdf::XdfDocument;
use a2l2xdf_symbols::{AxisDescription, Characteristic, DataType};
use serde::Deserialize;

/// Absolute base of the calibration region in ECU address space. The
/// definition file wants offsets into the binary image instead.
pub const BASE_OFFSET: u32 = 0xA080_0000;

/// Rebase an absolute ECU address to a file offset.
///
/// Signed and unclamped: addresses below the region base come out
/// negative and are rendered sign-prefixed.
pub fn rebase_address(address: u32) -> i64 {
    i64::from(address) - i64::from(BASE_OFFSET)
}

/// Total stored size of a characteristic in bytes: element size times
/// every axis point count. Scalars are one element.
pub fn map_size_bytes(c: &Characteristic) -> u64 {
    let mut size = u64::from(c.datatype.size_bytes());
    for axis in &c.axis_descriptions {
        size *= u64::from(axis.max_axis_points);
    }
    size
}

// ---------------------------------------------------------------------------
// CSV rows
// ---------------------------------------------------------------------------

/// One row of the mapping CSV. Field names bind the sheet's exact
/// column headers; extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CsvRow {
    #[serde(rename = "Table Name")]
    pub table_name: String,
    #[serde(rename = "Category")]
    pub category: String,
    /// Empty cell means no sub-category.
    #[serde(rename = "Sub Category")]
    pub sub_category: String,
    #[serde(rename = "Generate X Axis")]
    pub generate_x_axis: String,
    #[serde(rename = "Generate Y Axis")]
    pub generate_y_axis: String,
}

impl CsvRow {
    /// The generate flags are spreadsheet booleans: the literal `True`
    /// and nothing else.
    pub fn wants_x_table(&self) -> bool {
        self.generate_x_axis == "True"
    }

    pub fn wants_y_table(&self) -> bool {
        self.generate_y_axis == "True"
    }
}

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Layout and scaling of one rendered axis. The same shape serves the
/// independent x/y axes and the z value grid; fields that apply to only
/// one role stay `None` in the other.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    /// Axis-points record name; the z role has none.
    pub name: Option<String>,
    pub units: String,
    pub min: f64,
    pub max: f64,
    /// Rebased file offset of the first data element.
    pub address: i64,
    pub datatype: DataType,
    /// Column count; absent renders as 1.
    pub length: Option<u32>,
    /// Row count, present only on the z grid of a two-axis map.
    pub rows: Option<u32>,
    pub equation: String,
}

/// Everything the assembler needs for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub title: String,
    pub description: String,
    /// Category registry index; rendered references add 1.
    pub category: usize,
    pub sub_category: Option<usize>,
    /// Scalar to be emitted as an XDFCONSTANT instead of a 1x1 table.
    pub constant: bool,
    pub z: AxisSpec,
    pub x: Option<AxisSpec>,
    pub y: Option<AxisSpec>,
}

/// Shape one axis description for rendering.
///
/// The first stored element at the axis-points address is the live
/// point count, so the data address skips one element. Units come from
/// the axis-points conversion, the math from the axis description's own.
fn axis_spec(axis: &AxisDescription) -> AxisSpec {
    let points = &axis.axis_points;
    AxisSpec {
        name: Some(points.name.clone()),
        units: repair_degree_sign(&points.compu_method.unit),
        min: axis.lower_limit,
        max: axis.upper_limit,
        address: rebase_address(points.address) + i64::from(points.datatype.size_bytes()),
        datatype: points.datatype,
        length: Some(axis.max_axis_points),
        rows: None,
        equation: equation::conversion_equation(&axis.compu_method),
    }
}

/// Build the table definition for one resolved characteristic.
///
/// Category indices are resolved against the document's registry before
/// any entry is appended, so membership references always point at
/// declared categories.
pub fn build_table_definition(
    c: &Characteristic,
    row: &CsvRow,
    doc: &mut XdfDocument,
    use_constants: bool,
) -> TableDefinition {
    let category = doc.ensure_category(&row.category);
    let sub_category = if row.sub_category.is_empty() {
        None
    } else {
        Some(doc.ensure_category(&row.sub_category))
    };

    let mut z = AxisSpec {
        name: None,
        units: repair_degree_sign(&c.compu_method.unit),
        min: c.lower_limit,
        max: c.upper_limit,
        address: rebase_address(c.address),
        datatype: c.datatype,
        length: None,
        rows: None,
        equation: equation::conversion_equation(&c.compu_method),
    };

    let mut description = c.name.clone();

    let x = c.axis_descriptions.first().map(axis_spec);
    if let Some(spec) = &x {
        z.length = spec.length;
        if let Some(name) = &spec.name {
            description.push_str(&format!("\nX: {name}"));
        }
    }

    let y = c.axis_descriptions.get(1).map(axis_spec);
    if let Some(spec) = &y {
        if let Some(name) = &spec.name {
            description.push_str(&format!("\nY: {name}"));
        }
        z.rows = spec.length;
    }

    TableDefinition {
        title: repair_degree_sign(&c.long_identifier),
        description,
        category,
        sub_category,
        constant: use_constants && c.axis_descriptions.is_empty(),
        z,
        x,
        y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2l2xdf_symbols::{AxisPoints, Coefficients, CompuMethod};

    fn scalar(name: &str, address: u32) -> Characteristic {
        Characteristic {
            name: name.to_owned(),
            long_identifier: format!("{name} title"),
            address,
            datatype: DataType::Uword,
            lower_limit: 0.0,
            upper_limit: 100.0,
            compu_method: CompuMethod::default(),
            axis_descriptions: Vec::new(),
        }
    }

    fn axis(name: &str, address: u32, points: u32, datatype: DataType) -> AxisDescription {
        AxisDescription {
            lower_limit: 0.0,
            upper_limit: 6000.0,
            max_axis_points: points,
            compu_method: CompuMethod::default(),
            axis_points: AxisPoints {
                name: name.to_owned(),
                address,
                datatype,
                compu_method: CompuMethod {
                    unit: "1/min".to_owned(),
                    coeffs: None,
                },
            },
        }
    }

    fn row(table: &str, category: &str) -> CsvRow {
        CsvRow {
            table_name: table.to_owned(),
            category: category.to_owned(),
            sub_category: String::new(),
            generate_x_axis: "False".to_owned(),
            generate_y_axis: "False".to_owned(),
        }
    }

    #[test]
    fn rebase_is_linear_in_the_offset() {
        assert_eq!(rebase_address(BASE_OFFSET), 0);
        assert_eq!(rebase_address(BASE_OFFSET + 0x1126), 0x1126);
        assert_eq!(rebase_address(0xA082_0000), 0x2_0000);
    }

    #[test]
    fn rebase_below_base_goes_negative() {
        assert_eq!(rebase_address(BASE_OFFSET - 1), -1);
        assert_eq!(rebase_address(0), -(i64::from(BASE_OFFSET)));
    }

    #[test]
    fn map_size_scalar_is_one_element() {
        let c = scalar("KRKTE", 0xA081_0000);
        assert_eq!(map_size_bytes(&c), 2);
    }

    #[test]
    fn map_size_multiplies_axis_points() {
        let mut c = scalar("KFMIRL", 0xA081_0000);
        c.axis_descriptions.push(axis("SNM16", 0xA082_0000, 16, DataType::Ubyte));
        c.axis_descriptions.push(axis("SRL12", 0xA082_0100, 12, DataType::Ubyte));
        assert_eq!(map_size_bytes(&c), 2 * 16 * 12);
    }

    #[test]
    fn axis_address_skips_the_count_element() {
        let spec = axis_spec(&axis("SNM16", 0xA082_0000, 16, DataType::Uword));
        assert_eq!(spec.address, 0x2_0000 + 2);
        assert_eq!(spec.length, Some(16));
        assert_eq!(spec.rows, None);
        assert_eq!(spec.name.as_deref(), Some("SNM16"));
    }

    #[test]
    fn axis_units_come_from_the_points_conversion() {
        let spec = axis_spec(&axis("SNM16", 0xA082_0000, 16, DataType::Ubyte));
        assert_eq!(spec.units, "1/min");
        assert_eq!(spec.equation, "X");
    }

    #[test]
    fn axis_math_comes_from_the_description_conversion() {
        let mut a = axis("STF08", 0xA082_0000, 8, DataType::Ubyte);
        a.compu_method.coeffs = Some(Coefficients {
            a: 0.0,
            b: 1.0,
            c: 0.0,
            d: 0.0,
            e: 0.0,
            f: 4.0,
        });
        let spec = axis_spec(&a);
        assert_eq!(spec.equation, "((4.0 * X) - 0.0 ) / (1.0 - (0.0 * X))");
    }

    #[test]
    fn scalar_definition_has_no_axes() {
        let mut doc = XdfDocument::new("test");
        let c = scalar("KRKTE", 0xA081_1126);
        let def = build_table_definition(&c, &row("KRKTE", "Fuel"), &mut doc, false);

        assert_eq!(def.title, "KRKTE title");
        assert_eq!(def.description, "KRKTE");
        assert!(def.x.is_none());
        assert!(def.y.is_none());
        assert!(!def.constant);
        assert_eq!(def.z.address, 0x1_1126);
        assert_eq!(def.z.length, None);
        assert_eq!(def.z.rows, None);
    }

    #[test]
    fn scalar_becomes_constant_only_when_enabled() {
        let mut doc = XdfDocument::new("test");
        let c = scalar("KRKTE", 0xA081_0000);
        let def = build_table_definition(&c, &row("KRKTE", "Fuel"), &mut doc, true);
        assert!(def.constant);

        let mut with_axis = scalar("KFZW", 0xA081_0000);
        with_axis
            .axis_descriptions
            .push(axis("SNM16", 0xA082_0000, 16, DataType::Ubyte));
        let def = build_table_definition(&with_axis, &row("KFZW", "Ignition"), &mut doc, true);
        assert!(!def.constant, "axes always force a real table");
    }

    #[test]
    fn curve_wires_x_into_z_and_description() {
        let mut doc = XdfDocument::new("test");
        let mut c = scalar("KFZW", 0xA081_0000);
        c.axis_descriptions.push(axis("SNM16", 0xA082_0000, 16, DataType::Ubyte));

        let def = build_table_definition(&c, &row("KFZW", "Ignition"), &mut doc, false);
        assert_eq!(def.description, "KFZW\nX: SNM16");
        assert_eq!(def.z.length, Some(16));
        assert_eq!(def.z.rows, None);
        assert!(def.y.is_none());
    }

    #[test]
    fn map_wires_both_axes() {
        let mut doc = XdfDocument::new("test");
        let mut c = scalar("KFMIRL", 0xA081_0000);
        c.axis_descriptions.push(axis("SNM16", 0xA082_0000, 16, DataType::Ubyte));
        c.axis_descriptions.push(axis("SRL12", 0xA082_0100, 12, DataType::Ubyte));

        let def = build_table_definition(&c, &row("KFMIRL", "Fuel"), &mut doc, false);
        assert_eq!(def.description, "KFMIRL\nX: SNM16\nY: SRL12");
        assert_eq!(def.z.length, Some(16));
        assert_eq!(def.z.rows, Some(12));
    }

    #[test]
    fn categories_register_in_first_seen_order() {
        let mut doc = XdfDocument::new("test");
        let c = scalar("KRKTE", 0xA081_0000);

        let mut r = row("KRKTE", "Fuel");
        r.sub_category = "Injection".to_owned();
        let def = build_table_definition(&c, &r, &mut doc, false);

        // Index 0 is the reserved Axis category.
        assert_eq!(def.category, 1);
        assert_eq!(def.sub_category, Some(2));

        let again = build_table_definition(&c, &r, &mut doc, false);
        assert_eq!(again.category, 1, "repeat labels reuse their index");
    }

    #[test]
    fn empty_sub_category_is_not_registered() {
        let mut doc = XdfDocument::new("test");
        let c = scalar("KRKTE", 0xA081_0000);
        let def = build_table_definition(&c, &row("KRKTE", "Fuel"), &mut doc, false);
        assert_eq!(def.sub_category, None);
        assert_eq!(doc.categories().names(), &["Axis", "Fuel"][..]);
    }

    #[test]
    fn titles_and_units_are_degree_repaired() {
        let mut doc = XdfDocument::new("test");
        let mut c = scalar("TANS", 0xA081_0000);
        c.long_identifier = "Intake temp in \u{FFFD}C".to_owned();
        c.compu_method.unit = "\u{FFFD}C".to_owned();

        let def = build_table_definition(&c, &row("TANS", "Sensors"), &mut doc, false);
        assert_eq!(def.title, "Intake temp in °C");
        assert_eq!(def.z.units, "°C");
    }

    #[test]
    fn generate_flags_accept_only_the_true_literal() {
        let mut r = row("KFZW", "Ignition");
        r.generate_x_axis = "True".to_owned();
        r.generate_y_axis = "TRUE".to_owned();
        assert!(r.wants_x_table());
        assert!(!r.wants_y_table());
    }
}
