//! A2L to XDF converter binary.
//!
//! Reads a compiled A2L symbol database plus a CSV listing the
//! characteristics to export, and writes a TunerPro XDF definition
//! next to the database.
//!
//! # Usage
//!
//! ```bash
//! # Convert using a mapping sheet; output lands in ecu_flash.a2ldb.xdf
//! a2l2xdf ecu_flash.a2ldb tables.csv
//!
//! # Emit scalar characteristics as XDF constants
//! a2l2xdf ecu_flash.a2ldb tables.csv --constants
//! ```
//!
//! Rows naming characteristics the database does not contain are
//! reported and skipped; the rest of the sheet still converts.

use a2l2xdf::xdf::XdfDocument;
use a2l2xdf::{convert, ConvertOptions};
use a2l2xdf_symbols::SymbolDatabase;
use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Generate a TunerPro XDF definition from an A2L symbol database
#[derive(Parser, Debug)]
#[command(name = "a2l2xdf")]
#[command(about = "Generate a TunerPro XDF definition from an A2L symbol database")]
#[command(version)]
struct Args {
    /// Compiled symbol database (JSON) produced by the A2L import step
    database: PathBuf,

    /// Mapping CSV: Table Name, Category, Sub Category, Generate X/Y Axis
    csv: PathBuf,

    /// Emit scalar characteristics as XDFCONSTANT entries
    ///
    /// Off by default: constants are awkward to edit in most tuning
    /// software, so scalars become 1x1 tables instead.
    #[arg(long)]
    constants: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    // The database path doubles as the definition title and the output
    // filename stem.
    let database_name = args.database.display().to_string();
    let output_path = PathBuf::from(format!("{database_name}.xdf"));

    info!("Database: {}", args.database.display());
    info!("Mapping: {}", args.csv.display());
    info!("Output: {}", output_path.display());

    let db = SymbolDatabase::open(&args.database)
        .with_context(|| format!("Failed to open symbol database: {}", args.database.display()))?;
    let csv_data = fs::read(&args.csv)
        .with_context(|| format!("Failed to read mapping CSV: {}", args.csv.display()))?;

    let mut doc = XdfDocument::new(database_name);
    let options = ConvertOptions {
        use_constants: args.constants,
    };
    let summary = convert(&db, &csv_data, &mut doc, options)
        .with_context(|| format!("Failed to convert mapping CSV: {}", args.csv.display()))?;

    doc.write_to_file(&output_path)
        .with_context(|| format!("Failed to write XDF: {}", output_path.display()))?;

    info!(
        "Wrote {} tables and {} constants ({} synthesized axis tables) to {}",
        summary.tables,
        summary.constants,
        summary.axis_tables,
        output_path.display()
    );
    if !summary.missing.is_empty() {
        warn!(
            "{} of {} rows had no matching characteristic",
            summary.missing.len(),
            summary.rows()
        );
    }

    Ok(())
}
