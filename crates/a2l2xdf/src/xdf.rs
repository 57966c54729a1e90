//! XDF document model and writer.
//!
//! The document accumulates header state and body entries while the
//! mapping CSV streams, then serializes once at the end of the run.
//! Entries are append-only; nothing is mutated after it lands in the
//! body, and the header's category declarations render straight from
//! the registry so references and declarations cannot diverge.

use crate::mapper::{AxisSpec, TableDefinition};
use crate::text::format_decimal;
use a2l2xdf_symbols::DataType;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xml::common::XmlVersion;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

/// Format version understood by the target tuning software.
pub const XDF_VERSION: &str = "1.60";

/// Reserved category referenced by every synthesized axis table. Always
/// registry index 0.
pub const AXIS_CATEGORY: &str = "Axis";

/// Stamp left in the header so generated files are recognizable.
const GENERATOR_TAG: &str = "Auto-generated by A2L2XDF";

/// Errors raised while serializing a document.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Xml(#[from] xml::writer::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serializer produced invalid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

// ---------------------------------------------------------------------------
// Category registry
// ---------------------------------------------------------------------------

/// Ordered, first-seen set of category labels.
///
/// Indices are stable for the lifetime of the document. The external id
/// written into `CATEGORYMEM` references is `index + 1`; the format
/// reserves id 0.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    names: Vec<String>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label, returning its index. Repeats are no-ops that
    /// return the original index.
    pub fn ensure(&mut self, name: &str) -> usize {
        match self.index_of(name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_owned());
                self.names.len() - 1
            }
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Labels in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// Which independent axis of a definition a synthesized table exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    X,
    Y,
}

impl AxisRole {
    /// Lowercase letter used in synthesized table titles.
    pub fn letter(self) -> &'static str {
        match self {
            AxisRole::X => "x",
            AxisRole::Y => "y",
        }
    }
}

/// Where an axis or value grid lives in the binary image.
#[derive(Debug, Clone)]
struct Embedded {
    address: i64,
    datatype: DataType,
    columns: Option<u32>,
    rows: Option<u32>,
}

impl Embedded {
    fn from_spec(spec: &AxisSpec) -> Self {
        Embedded {
            address: spec.address,
            datatype: spec.datatype,
            columns: spec.length,
            rows: spec.rows,
        }
    }
}

/// One rendered XDFAXIS.
#[derive(Debug, Clone)]
enum AxisNode {
    /// Axis backed by data in the image.
    Real {
        embedded: Embedded,
        min: f64,
        max: f64,
        units: String,
        equation: String,
    },
    /// Placeholder for an absent dimension: identity math and `size`
    /// dash labels.
    Fake { size: u32 },
}

impl AxisNode {
    fn real(spec: &AxisSpec) -> Self {
        AxisNode::Real {
            embedded: Embedded::from_spec(spec),
            min: spec.min,
            max: spec.max,
            units: spec.units.clone(),
            equation: spec.equation.clone(),
        }
    }
}

/// Body entries, appended in row order and serialized as-is.
#[derive(Debug, Clone)]
enum Entry {
    Table {
        uniqueid: i64,
        title: String,
        description: String,
        /// Registry indices, membership slot order.
        memberships: Vec<usize>,
        x: AxisNode,
        y: AxisNode,
        z: AxisNode,
    },
    Constant {
        uniqueid: i64,
        title: String,
        description: String,
        memberships: Vec<usize>,
        embedded: Embedded,
        equation: String,
    },
}

/// The growing output document: fixed header fields, the category
/// registry, and an append-only body.
#[derive(Debug)]
pub struct XdfDocument {
    title: String,
    categories: CategoryRegistry,
    entries: Vec<Entry>,
}

impl XdfDocument {
    /// Start an empty document. The `Axis` category is reserved at
    /// index 0 so synthesized axis tables always have it to reference.
    pub fn new(title: impl Into<String>) -> Self {
        let mut categories = CategoryRegistry::new();
        categories.ensure(AXIS_CATEGORY);
        Self {
            title: title.into(),
            categories,
            entries: Vec::new(),
        }
    }

    /// Register a category, returning its stable index.
    pub fn ensure_category(&mut self, name: &str) -> usize {
        self.categories.ensure(name)
    }

    /// Registry view, declaration order.
    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    /// Number of body entries appended so far.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Append the primary table for a definition: three axes, fake
    /// where the definition has none, z always real.
    pub fn push_table(&mut self, def: &TableDefinition) {
        self.entries.push(Entry::Table {
            uniqueid: def.z.address,
            title: def.title.clone(),
            description: def.description.clone(),
            memberships: memberships(def),
            x: def
                .x
                .as_ref()
                .map(AxisNode::real)
                .unwrap_or(AxisNode::Fake { size: 1 }),
            y: def
                .y
                .as_ref()
                .map(AxisNode::real)
                .unwrap_or(AxisNode::Fake { size: 1 }),
            z: AxisNode::real(&def.z),
        });
    }

    /// Append a scalar constant entry.
    pub fn push_constant(&mut self, def: &TableDefinition) {
        self.entries.push(Entry::Constant {
            uniqueid: def.z.address,
            title: def.title.clone(),
            description: def.description.clone(),
            memberships: memberships(def),
            embedded: Embedded::from_spec(&def.z),
            equation: def.z.equation.clone(),
        });
    }

    /// Append a synthesized 1xN table exposing one axis' breakpoints
    /// for direct editing. No-op when the definition has no such axis.
    pub fn push_axis_table(&mut self, def: &TableDefinition, role: AxisRole) {
        let spec = match role {
            AxisRole::X => def.x.as_ref(),
            AxisRole::Y => def.y.as_ref(),
        };
        let Some(spec) = spec else {
            return;
        };

        let axis_category = self.categories.ensure(AXIS_CATEGORY);
        let name = spec.name.clone().unwrap_or_default();
        let length = spec.length.unwrap_or(1);

        self.entries.push(Entry::Table {
            uniqueid: spec.address,
            title: format!("{} : {} axis : {}", def.title, role.letter(), name),
            description: name,
            memberships: vec![def.category, axis_category],
            x: AxisNode::Fake { size: length },
            y: AxisNode::Fake { size: 1 },
            z: AxisNode::real(spec),
        });
    }
}

/// Membership slots for a definition: primary category first, then the
/// sub-category when present.
fn memberships(def: &TableDefinition) -> Vec<usize> {
    let mut slots = vec![def.category];
    if let Some(sub) = def.sub_category {
        slots.push(sub);
    }
    slots
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

impl XdfDocument {
    /// Serialize the whole document into `out`.
    pub fn write_to<W: Write>(&self, out: W) -> Result<(), WriteError> {
        let mut writer = EmitterConfig::new().perform_indent(true).create_writer(out);

        writer.write(XmlEvent::StartDocument {
            version: XmlVersion::Version10,
            encoding: Some("UTF-8"),
            standalone: None,
        })?;

        writer.write(XmlEvent::start_element("XDFFORMAT").attr("version", XDF_VERSION))?;
        self.write_header(&mut writer)?;
        for entry in &self.entries {
            write_entry(&mut writer, entry)?;
        }
        writer.write(XmlEvent::end_element())?;
        Ok(())
    }

    /// Render the document to an in-memory string.
    pub fn to_xml_string(&self) -> Result<String, WriteError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Render the document and write it to `path` in one shot.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), WriteError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        fs::write(path, buf)?;
        Ok(())
    }

    fn write_header<W: Write>(&self, w: &mut EventWriter<W>) -> Result<(), WriteError> {
        w.write(XmlEvent::start_element("XDFHEADER"))?;

        text_element(w, "flags", "0x1")?;
        text_element(w, "deftitle", &self.title)?;
        text_element(w, "description", GENERATOR_TAG)?;

        w.write(
            XmlEvent::start_element("BASEOFFSET")
                .attr("offset", "0")
                .attr("subtract", "0"),
        )?;
        w.write(XmlEvent::end_element())?;

        w.write(
            XmlEvent::start_element("DEFAULTS")
                .attr("datasizeinbits", "8")
                .attr("sigdigits", "4")
                .attr("outputtype", "1")
                .attr("signed", "0")
                .attr("lsbfirst", "1")
                .attr("float", "0"),
        )?;
        w.write(XmlEvent::end_element())?;

        w.write(
            XmlEvent::start_element("REGION")
                .attr("type", "0xFFFFFFFF")
                .attr("startaddress", "0x0")
                .attr("size", "0x7D000")
                .attr("regionflags", "0x0")
                .attr("name", "Binary")
                .attr("desc", "BIN for the XDF"),
        )?;
        w.write(XmlEvent::end_element())?;

        for (index, name) in self.categories.names().iter().enumerate() {
            w.write(
                XmlEvent::start_element("CATEGORY")
                    .attr("index", &format!("{index:#x}"))
                    .attr("name", name),
            )?;
            w.write(XmlEvent::end_element())?;
        }

        w.write(XmlEvent::end_element())?;
        Ok(())
    }
}

fn write_entry<W: Write>(w: &mut EventWriter<W>, entry: &Entry) -> Result<(), WriteError> {
    match entry {
        Entry::Table {
            uniqueid,
            title,
            description,
            memberships,
            x,
            y,
            z,
        } => {
            w.write(
                XmlEvent::start_element("XDFTABLE")
                    .attr("uniqueid", &hex_address(*uniqueid))
                    .attr("flags", "0x30"),
            )?;
            text_element(w, "title", title)?;
            text_element(w, "description", description)?;
            write_memberships(w, memberships)?;
            write_axis(w, "x", x)?;
            write_axis(w, "y", y)?;
            write_axis(w, "z", z)?;
            w.write(XmlEvent::end_element())?;
        }
        Entry::Constant {
            uniqueid,
            title,
            description,
            memberships,
            embedded,
            equation,
        } => {
            w.write(XmlEvent::start_element("XDFCONSTANT").attr("uniqueid", &hex_address(*uniqueid)))?;
            text_element(w, "title", title)?;
            text_element(w, "description", description)?;
            write_memberships(w, memberships)?;
            write_embedded(w, "z", embedded)?;
            write_math(w, equation)?;
            w.write(XmlEvent::end_element())?;
        }
    }
    Ok(())
}

fn write_memberships<W: Write>(w: &mut EventWriter<W>, memberships: &[usize]) -> Result<(), WriteError> {
    for (slot, category) in memberships.iter().enumerate() {
        w.write(
            XmlEvent::start_element("CATEGORYMEM")
                .attr("index", &slot.to_string())
                .attr("category", &(category + 1).to_string()),
        )?;
        w.write(XmlEvent::end_element())?;
    }
    Ok(())
}

/// Render one XDFAXIS in the `role` position ("x", "y", or "z").
fn write_axis<W: Write>(w: &mut EventWriter<W>, role: &str, node: &AxisNode) -> Result<(), WriteError> {
    w.write(
        XmlEvent::start_element("XDFAXIS")
            .attr("uniqueid", "0x0")
            .attr("id", role),
    )?;
    match node {
        AxisNode::Real {
            embedded,
            min,
            max,
            units,
            equation,
        } => {
            write_embedded(w, role, embedded)?;
            text_element(w, "indexcount", &count_text(embedded.columns))?;
            text_element(w, "min", &format_decimal(*min))?;
            text_element(w, "max", &format_decimal(*max))?;
            text_element(w, "units", units)?;
            // embedinfo 1 = pure internal axis
            w.write(XmlEvent::start_element("embedinfo").attr("type", "1"))?;
            w.write(XmlEvent::end_element())?;
            w.write(XmlEvent::start_element("DALINK").attr("index", "0"))?;
            w.write(XmlEvent::end_element())?;
            write_math(w, equation)?;
        }
        AxisNode::Fake { size } => {
            text_element(w, "indexcount", &size.to_string())?;
            text_element(w, "outputtype", "4")?;
            w.write(XmlEvent::start_element("DALINK").attr("index", "0"))?;
            w.write(XmlEvent::end_element())?;
            write_math(w, "X")?;
            for index in 0..*size {
                w.write(
                    XmlEvent::start_element("LABEL")
                        .attr("index", &index.to_string())
                        .attr("value", "-"),
                )?;
                w.write(XmlEvent::end_element())?;
            }
        }
    }
    w.write(XmlEvent::end_element())?;
    Ok(())
}

fn write_embedded<W: Write>(w: &mut EventWriter<W>, role: &str, e: &Embedded) -> Result<(), WriteError> {
    let address = hex_address(e.address);
    let size_bits = e.datatype.size_bits().to_string();
    let columns = count_text(e.columns);
    let rows = count_text(e.rows);

    let mut ev = XmlEvent::start_element("EMBEDDEDDATA")
        .attr("mmedtypeflags", if role == "z" { "0x06" } else { "0x02" })
        .attr("mmedaddress", &address)
        .attr("mmedelementsizebits", &size_bits)
        .attr("mmedcolcount", &columns);
    if role == "z" {
        ev = ev.attr("mmedrowcount", &rows);
    }
    w.write(
        ev.attr("mmedmajorstridebits", &size_bits)
            .attr("mmedminorstridebits", "0"),
    )?;
    w.write(XmlEvent::end_element())?;
    Ok(())
}

fn write_math<W: Write>(w: &mut EventWriter<W>, equation: &str) -> Result<(), WriteError> {
    w.write(XmlEvent::start_element("MATH").attr("equation", equation))?;
    w.write(XmlEvent::start_element("VAR").attr("id", "X"))?;
    w.write(XmlEvent::end_element())?;
    w.write(XmlEvent::end_element())?;
    Ok(())
}

fn text_element<W: Write>(w: &mut EventWriter<W>, name: &str, text: &str) -> Result<(), WriteError> {
    w.write(XmlEvent::start_element(name))?;
    w.write(XmlEvent::characters(text))?;
    w.write(XmlEvent::end_element())?;
    Ok(())
}

fn count_text(count: Option<u32>) -> String {
    count.unwrap_or(1).to_string()
}

/// Render a rebased address the way the document expects: lowercase
/// hex, sign-prefixed when the offset is negative.
fn hex_address(value: i64) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{value:#x}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
