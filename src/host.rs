//! Host document contract.
//!
//! The plugin never owns the 3D document. Everything it needs from the host
//! application is expressed by [`HostDocument`]: enumerate objects, read and
//! write per-object user strings, toggle visibility, lock and selection,
//! color objects, add simple geometry and list block definitions.
//!
//! ```text
//!   MaterialPalette ──► HostDocument ◄── ElementOutlinerStore::sync_from_blocks
//!                          ▲
//!             ┌────────────┴────────────┐
//!        host adapter             InMemoryDocument
//!     (real application)        (headless use, tests)
//! ```
//!
//! Implementations are UI-thread affine and synchronous. Work that starts on
//! a background task reaches the UI thread through a [`UiDispatcher`].

use std::collections::BTreeMap;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// Document model
// ═══════════════════════════════════════════════════════════════════════

/// Host identity of a document object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub String);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Representative geometry inserted for a material. Millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Planar rectangle at the origin, `width` along X and `length` along Y.
    Rectangle { width: f64, length: f64 },
    /// Line from the origin along X.
    Line { length: f64 },
    Point,
}

/// A block definition (instance definition) in the host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDefinition {
    pub id: String,
    pub name: String,
}

/// What the plugin needs from the active host document.
pub trait HostDocument {
    fn objects(&self) -> Vec<ObjectId>;

    fn selected_objects(&self) -> Vec<ObjectId>;

    fn user_string(&self, object: &ObjectId, key: &str) -> Option<String>;

    /// Returns `false` if the object does not exist.
    fn set_user_string(&mut self, object: &ObjectId, key: &str, value: &str) -> bool;

    fn is_visible(&self, object: &ObjectId) -> bool;

    fn set_visible(&mut self, object: &ObjectId, visible: bool) -> bool;

    fn is_locked(&self, object: &ObjectId) -> bool;

    fn set_locked(&mut self, object: &ObjectId, locked: bool) -> bool;

    /// Hidden and locked objects cannot be selected.
    fn select(&mut self, object: &ObjectId, selected: bool) -> bool;

    fn unselect_all(&mut self);

    fn set_object_color(&mut self, object: &ObjectId, rgb: (u8, u8, u8)) -> bool;

    fn add_geometry(&mut self, geometry: Geometry) -> Option<ObjectId>;

    fn block_definitions(&self) -> Vec<BlockDefinition>;

    fn redraw(&mut self);

    /// Objects whose user string `key` equals `value`.
    fn objects_with_user_string(&self, key: &str, value: &str) -> Vec<ObjectId> {
        self.objects()
            .into_iter()
            .filter(|id| self.user_string(id, key).as_deref() == Some(value))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// In-memory document
// ═══════════════════════════════════════════════════════════════════════

/// One object of an [`InMemoryDocument`].
#[derive(Debug, Clone, PartialEq)]
pub struct HostObject {
    pub geometry: Geometry,
    pub user_strings: BTreeMap<String, String>,
    pub visible: bool,
    pub locked: bool,
    pub selected: bool,
    pub color: Option<(u8, u8, u8)>,
}

impl HostObject {
    fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            user_strings: BTreeMap::new(),
            visible: true,
            locked: false,
            selected: false,
            color: None,
        }
    }
}

/// A headless [`HostDocument`]. Objects keep insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDocument {
    objects: Vec<(ObjectId, HostObject)>,
    blocks: Vec<BlockDefinition>,
    redraws: usize,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block definition and return it.
    pub fn add_block_definition(&mut self, name: impl Into<String>) -> BlockDefinition {
        let block = BlockDefinition {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
        };
        self.blocks.push(block.clone());
        block
    }

    pub fn object(&self, id: &ObjectId) -> Option<&HostObject> {
        self.objects.iter().find(|(oid, _)| oid == id).map(|(_, o)| o)
    }

    fn object_mut(&mut self, id: &ObjectId) -> Option<&mut HostObject> {
        self.objects
            .iter_mut()
            .find(|(oid, _)| oid == id)
            .map(|(_, o)| o)
    }

    /// Number of times [`redraw`](HostDocument::redraw) was requested.
    pub fn redraw_count(&self) -> usize {
        self.redraws
    }
}

impl HostDocument for InMemoryDocument {
    fn objects(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|(id, _)| id.clone()).collect()
    }

    fn selected_objects(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.selected)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn user_string(&self, object: &ObjectId, key: &str) -> Option<String> {
        self.object(object)?.user_strings.get(key).cloned()
    }

    fn set_user_string(&mut self, object: &ObjectId, key: &str, value: &str) -> bool {
        match self.object_mut(object) {
            Some(o) => {
                o.user_strings.insert(key.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    fn is_visible(&self, object: &ObjectId) -> bool {
        self.object(object).is_some_and(|o| o.visible)
    }

    fn set_visible(&mut self, object: &ObjectId, visible: bool) -> bool {
        match self.object_mut(object) {
            Some(o) => {
                o.visible = visible;
                if !visible {
                    o.selected = false;
                }
                true
            }
            None => false,
        }
    }

    fn is_locked(&self, object: &ObjectId) -> bool {
        self.object(object).is_some_and(|o| o.locked)
    }

    fn set_locked(&mut self, object: &ObjectId, locked: bool) -> bool {
        match self.object_mut(object) {
            Some(o) => {
                o.locked = locked;
                if locked {
                    o.selected = false;
                }
                true
            }
            None => false,
        }
    }

    fn select(&mut self, object: &ObjectId, selected: bool) -> bool {
        match self.object_mut(object) {
            Some(o) if !selected || (o.visible && !o.locked) => {
                o.selected = selected;
                true
            }
            _ => false,
        }
    }

    fn unselect_all(&mut self) {
        for (_, o) in self.objects.iter_mut() {
            o.selected = false;
        }
    }

    fn set_object_color(&mut self, object: &ObjectId, rgb: (u8, u8, u8)) -> bool {
        match self.object_mut(object) {
            Some(o) => {
                o.color = Some(rgb);
                true
            }
            None => false,
        }
    }

    fn add_geometry(&mut self, geometry: Geometry) -> Option<ObjectId> {
        let id = ObjectId(uuid::Uuid::new_v4().to_string());
        self.objects.push((id.clone(), HostObject::new(geometry)));
        Some(id)
    }

    fn block_definitions(&self) -> Vec<BlockDefinition> {
        self.blocks.clone()
    }

    fn redraw(&mut self) {
        self.redraws += 1;
    }
}

// ═══════════════════════════════════════════════════════════════════════
// UI dispatch
// ═══════════════════════════════════════════════════════════════════════

/// Marshals work onto the host's UI thread.
pub trait UiDispatcher: Send + Sync {
    fn post(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs every job inline on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl UiDispatcher for ImmediateDispatcher {
    fn post(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}
