//! Core data models used throughout CNC Suite.
//!
//! [`Material`] records make up the shared catalog (`materials.json`);
//! [`Element`] records make up the per-project outliner (`elements.json`).
//! Field names below are the canonical on-disk schema.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

const SQUARE_MM_PER_SQUARE_M: f64 = 1_000_000.0;
const BYTES_PER_KB: u64 = 1024;

/// Generate a fresh UUID v4 string.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Deserialize `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn thickness_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\s*\d+(\.\d+)?\s*mm").expect("static regex"))
}

// ═══════════════════════════════════════════════════════════════════════
// Materials
// ═══════════════════════════════════════════════════════════════════════

/// Kind of stock a material is sold as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    /// Sheet goods with width and length.
    #[default]
    Sheet,
    /// Linear stock sold by length (profiles, trim, lumber).
    Length,
    SolidWood,
    Other,
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaterialType::Sheet => "Sheet",
            MaterialType::Length => "Length",
            MaterialType::SolidWood => "SolidWood",
            MaterialType::Other => "Other",
        };
        f.write_str(s)
    }
}

/// A catalog material.
///
/// `id` is assigned at construction and never changes afterwards. Records
/// deserialized without an id get an empty string, which the catalog load
/// path repairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: MaterialType,
    /// Millimeters.
    pub thickness: f64,
    /// Millimeters, sheets only.
    #[serde(default)]
    pub length: f64,
    /// Millimeters, sheets only.
    #[serde(default)]
    pub width: f64,
    /// kg per m² for sheets, kg per meter for lengths.
    #[serde(default)]
    pub weight: Option<f64>,
    /// kg/m³.
    #[serde(default)]
    pub density: f64,
    /// Hex color, e.g. `#DEB887`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default)]
    pub price_per_square_meter: f64,
}

impl Material {
    pub fn new(name: impl Into<String>, kind: MaterialType, thickness: f64) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            kind,
            thickness,
            length: 0.0,
            width: 0.0,
            weight: None,
            density: 0.0,
            color: String::new(),
            notes: String::new(),
            price_per_square_meter: 0.0,
        }
    }

    /// Sheet stock with its panel dimensions.
    pub fn sheet(name: impl Into<String>, thickness: f64, width: f64, length: f64) -> Self {
        Self {
            width,
            length,
            ..Self::new(name, MaterialType::Sheet, thickness)
        }
    }

    /// Linear stock (profiles, lumber).
    pub fn length(name: impl Into<String>, thickness: f64) -> Self {
        Self::new(name, MaterialType::Length, thickness)
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Copy every mutable field from `other`, keeping `self.id`.
    pub fn apply_from(&mut self, other: &Material) {
        self.name = other.name.clone();
        self.kind = other.kind;
        self.thickness = other.thickness;
        self.length = other.length;
        self.width = other.width;
        self.weight = other.weight;
        self.density = other.density;
        self.color = other.color.clone();
        self.notes = other.notes.clone();
        self.price_per_square_meter = other.price_per_square_meter;
    }

    /// `"18mm"`.
    pub fn formatted_thickness(&self) -> String {
        format!("{}mm", self.thickness)
    }

    /// Thickness without a unit, e.g. `"18"` or `"2.5"`.
    pub fn thickness_display(&self) -> String {
        self.thickness.to_string()
    }

    /// The name with any thickness fragment (`"18mm"`, `"2.5 mm"`) removed.
    pub fn display_name(&self) -> String {
        thickness_pattern()
            .replace_all(&self.name, "")
            .trim()
            .to_string()
    }

    /// `"{width}x{length}"`.
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.length)
    }

    pub fn has_valid_sheet_dimensions(&self) -> bool {
        self.kind == MaterialType::Sheet && self.width > 0.0 && self.length > 0.0
    }

    /// Area of one full sheet in m².
    pub fn sheet_area_m2(&self) -> Option<f64> {
        if !self.has_valid_sheet_dimensions() {
            return None;
        }
        Some(self.width * self.length / SQUARE_MM_PER_SQUARE_M)
    }

    /// Weight of one full sheet in kg.
    pub fn sheet_weight(&self) -> Option<f64> {
        Some(self.sheet_area_m2()? * self.weight?)
    }

    /// Parse [`color`](Material::color) as `#RRGGBB` (leading `#` optional).
    pub fn color_rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some((r, g, b))
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}mm)", self.name, self.thickness)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Elements
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    #[default]
    Block,
    Component,
    Assembly,
    Part,
    Hardware,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Where an element is in the manufacturing process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementStatus {
    #[default]
    Design,
    ReadyForManufacturing,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl ElementStatus {
    /// Neither completed nor cancelled.
    pub fn is_pending(self) -> bool {
        !matches!(self, ElementStatus::Completed | ElementStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    Drawing,
    Manual,
    Specification,
    #[serde(rename = "CNCProgram")]
    CncProgram,
    Assembly,
    Reference,
    #[default]
    Other,
}

/// A file (drawing, CNC program, manual) attached to an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    /// Extension including the leading dot, empty when the path has none.
    #[serde(default)]
    pub file_type: String,
    /// Bytes, captured when the file was attached.
    #[serde(default)]
    pub file_size: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub category: FileCategory,
    pub attached_at: DateTime<Utc>,
}

impl AttachedFile {
    /// Build a record for `path`; the caller supplies the size it observed.
    pub fn new(path: &Path, file_size: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self {
            id: new_id(),
            file_name,
            file_path: path.to_string_lossy().into_owned(),
            file_type,
            file_size,
            description: String::new(),
            category: FileCategory::Other,
            attached_at: Utc::now(),
        }
    }

    /// Whether the file is still present at `file_path`.
    pub fn file_exists(&self) -> bool {
        Path::new(&self.file_path).is_file()
    }

    /// Human-readable size: `"512 B"`, `"1.5 KB"`, `"2.0 MB"`.
    pub fn file_size_string(&self) -> String {
        if self.file_size < BYTES_PER_KB {
            return format!("{} B", self.file_size);
        }
        let kb = self.file_size as f64 / BYTES_PER_KB as f64;
        if kb < BYTES_PER_KB as f64 {
            return format!("{:.1} KB", kb);
        }
        format!("{:.1} MB", kb / BYTES_PER_KB as f64)
    }
}

fn default_quantity() -> u32 {
    1
}

/// A manufacturable element (block, component, part) tracked by the outliner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub name: String,
    /// Identity of the corresponding object or block in the host document.
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ElementType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Soft reference into the material catalog.
    #[serde(default)]
    pub material_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attached_files: Vec<AttachedFile>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manufacturing_notes: String,
    #[serde(default)]
    pub priority: ElementPriority,
    #[serde(default)]
    pub status: ElementStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl Element {
    pub fn new(name: impl Into<String>, kind: ElementType) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            external_id: None,
            kind,
            description: String::new(),
            material_id: None,
            quantity: 1,
            attached_files: Vec::new(),
            manufacturing_notes: String::new(),
            priority: ElementPriority::Normal,
            status: ElementStatus::Design,
            created_at: now,
            modified_at: now,
            tags: Vec::new(),
        }
    }

    /// A Block element bound to a host block definition.
    pub fn from_block(name: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            external_id: Some(external_id.into()),
            ..Self::new(name, ElementType::Block)
        }
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Case-insensitive substring match on name, description, and tags.
    /// `term_lower` must already be lowercase.
    pub fn matches_term(&self, term_lower: &str) -> bool {
        self.name.to_lowercase().contains(term_lower)
            || self.description.to_lowercase().contains(term_lower)
            || self
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(term_lower))
    }
}
