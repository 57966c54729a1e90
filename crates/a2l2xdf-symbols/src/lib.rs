//! Compiled A2L symbol database: the read-only characteristic store the
//! converter queries.
//!
//! Parsing the `.a2l` text format happens upstream; a separate import
//! step compiles the source into a JSON database of [`Characteristic`]
//! records with their axis descriptions denormalized inline. This crate
//! models those records and answers exact-name lookups, which is the
//! only query the converter needs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading a symbol database.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SymbolError {
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file is not valid JSON or does not match the database
    /// schema. Unknown datatype keywords surface here.
    #[error("invalid symbol database: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SymbolError>;

// ---------------------------------------------------------------------------
// Record datatypes
// ---------------------------------------------------------------------------

/// A2L record-layout datatypes accepted by the converter.
///
/// The set is closed: a database containing any other keyword fails to
/// load, so bad source metadata is rejected before any output exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "UBYTE")]
    Ubyte,
    #[serde(rename = "SBYTE")]
    Sbyte,
    #[serde(rename = "UWORD")]
    Uword,
    #[serde(rename = "SWORD")]
    Sword,
    #[serde(rename = "ULONG")]
    Ulong,
    #[serde(rename = "SLONG")]
    Slong,
    #[serde(rename = "FLOAT32_IEEE")]
    Float32Ieee,
}

impl DataType {
    /// Storage width of one element in bytes.
    pub const fn size_bytes(self) -> u32 {
        match self {
            DataType::Ubyte | DataType::Sbyte => 1,
            DataType::Uword | DataType::Sword => 2,
            DataType::Ulong | DataType::Slong | DataType::Float32Ieee => 4,
        }
    }

    /// Storage width of one element in bits.
    pub const fn size_bits(self) -> u32 {
        self.size_bytes() * 8
    }

    /// The A2L keyword this variant was parsed from.
    pub const fn keyword(self) -> &'static str {
        match self {
            DataType::Ubyte => "UBYTE",
            DataType::Sbyte => "SBYTE",
            DataType::Uword => "UWORD",
            DataType::Sword => "SWORD",
            DataType::Ulong => "ULONG",
            DataType::Slong => "SLONG",
            DataType::Float32Ieee => "FLOAT32_IEEE",
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion records
// ---------------------------------------------------------------------------

/// Rational-polynomial coefficients of an A2L compu-method:
/// `f(x) = (a*x^2 + b*x + c) / (d*x^2 + e*x + f)` maps raw to physical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

/// Raw-to-physical conversion attached to a characteristic or axis.
///
/// Tabular and verbal compu-methods carry no coefficients; the
/// converter treats those as identity conversions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompuMethod {
    /// Physical unit label, possibly empty.
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub coeffs: Option<Coefficients>,
}

// ---------------------------------------------------------------------------
// Characteristics
// ---------------------------------------------------------------------------

/// AXIS_PTS record referenced by an axis description: the block of
/// breakpoint values stored in the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisPoints {
    pub name: String,
    /// Absolute ECU address of the record.
    pub address: u32,
    pub datatype: DataType,
    /// Conversion of the stored points; supplies the axis unit label.
    #[serde(default)]
    pub compu_method: CompuMethod,
}

/// One AXIS_DESCR of a characteristic, with its axis-points reference
/// resolved inline by the import step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescription {
    pub lower_limit: f64,
    pub upper_limit: f64,
    /// Declared breakpoint capacity; also the rendered axis length.
    pub max_axis_points: u32,
    /// The axis description's own conversion, used for the axis math.
    #[serde(default)]
    pub compu_method: CompuMethod,
    pub axis_points: AxisPoints,
}

/// A calibratable object: scalar value, curve, or map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    pub name: String,
    /// Human-readable title from the A2L long identifier.
    #[serde(default)]
    pub long_identifier: String,
    /// Absolute ECU address of the stored data.
    pub address: u32,
    pub datatype: DataType,
    pub lower_limit: f64,
    pub upper_limit: f64,
    #[serde(default)]
    pub compu_method: CompuMethod,
    /// Zero for scalars, one for curves, two for maps.
    #[serde(default)]
    pub axis_descriptions: Vec<AxisDescription>,
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// On-disk shape of the compiled database.
#[derive(Debug, Serialize, Deserialize)]
struct DatabaseFile {
    characteristics: Vec<Characteristic>,
}

/// Every characteristic of the source A2L, indexed by name.
///
/// Duplicate names keep the last definition, matching the import step's
/// overwrite-on-recompile behavior.
#[derive(Debug, Default)]
pub struct SymbolDatabase {
    characteristics: BTreeMap<String, Characteristic>,
}

impl SymbolDatabase {
    /// Load a database from its JSON file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let file: DatabaseFile = serde_json::from_str(&raw)?;
        Ok(Self::from_characteristics(file.characteristics))
    }

    /// Build a database from records already in memory.
    pub fn from_characteristics(
        characteristics: impl IntoIterator<Item = Characteristic>,
    ) -> Self {
        let characteristics = characteristics
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();
        Self { characteristics }
    }

    /// Exact-name lookup.
    pub fn characteristic(&self, name: &str) -> Option<&Characteristic> {
        self.characteristics.get(name)
    }

    /// Number of characteristics in the store.
    pub fn len(&self) -> usize {
        self.characteristics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characteristics.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
