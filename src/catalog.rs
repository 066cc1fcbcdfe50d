//! Material catalog store.
//!
//! The catalog is the plugin-wide list of [`Material`]s, mirrored to
//! `materials.json`. The in-memory list is authoritative for the session;
//! the file is a best-effort copy rewritten after every mutation.
//!
//! # Locking
//!
//! The list sits behind a `std::sync::RwLock` that is never held across an
//! `.await`. File writes are serialized by an async write gate and snapshot
//! the list only after acquiring it, so the last write always carries the
//! newest state.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use cnc_suite_core::models::{new_id, Material};
use cnc_suite_core::notify::{CatalogChange, SubscriptionId, Subscribers};

use crate::persist::{read_json_list, write_json_atomic, JsonLoad};

/// Shared material catalog backed by one JSON file.
pub struct MaterialCatalogStore {
    path: PathBuf,
    materials: RwLock<Vec<Material>>,
    write_gate: tokio::sync::Mutex<()>,
    subscribers: Subscribers<CatalogChange>,
}

/// Built-in catalog used when no catalog file exists yet.
pub fn default_materials() -> Vec<Material> {
    let sheet = |name: &str, thickness: f64, width: f64, length: f64, color: &str, density: f64| {
        let mut m = Material::sheet(name, thickness, width, length).with_color(color);
        m.density = density;
        m.weight = Some(density * thickness / 1000.0);
        m
    };
    vec![
        sheet("Plywood 18mm", 18.0, 1220.0, 2440.0, "#DEB887", 680.0)
            .with_notes("Standard Birch Plywood"),
        sheet("MDF 12mm", 12.0, 1220.0, 2440.0, "#A0522D", 750.0)
            .with_notes("Medium-Density Fiberboard"),
        sheet("Acrylic 3mm", 3.0, 1000.0, 2000.0, "#F0F8FF", 1190.0)
            .with_notes("Clear Acrylic Sheet"),
        sheet("OSB 15mm", 15.0, 1220.0, 2440.0, "#DAA520", 620.0)
            .with_notes("Oriented Strand Board"),
        sheet("Aluminum 2mm", 2.0, 1220.0, 2440.0, "#D3D3D3", 2700.0)
            .with_notes("Aluminum Composite Panel"),
    ]
}

/// A material is storable when it has a name and a positive thickness.
pub fn is_valid_material(material: &Material) -> bool {
    !material.name.trim().is_empty() && material.thickness.is_finite() && material.thickness > 0.0
}

impl MaterialCatalogStore {
    /// Create an empty, unloaded store for `path`.
    ///
    /// Fails if `path` is empty; that is a wiring mistake, not a runtime
    /// condition.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            bail!("material catalog requires a file path");
        }
        Ok(Self {
            path,
            materials: RwLock::new(Vec::new()),
            write_gate: tokio::sync::Mutex::new(()),
            subscribers: Subscribers::new(),
        })
    }

    /// A store pre-filled with [`default_materials`], without touching disk.
    pub fn with_defaults(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path)?;
        *store.write() = default_materials();
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Material>> {
        self.materials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Material>> {
        self.materials
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load the catalog from disk, replacing the in-memory list.
    ///
    /// - missing file: the default catalog is installed and written out;
    /// - empty, corrupt, or unreadable file: the list becomes empty and a
    ///   warning is logged;
    /// - records without an id get a new one and the file is rewritten.
    ///
    /// Always notifies subscribers with `is_reload = true`. Returns the
    /// number of materials loaded.
    pub async fn load(&self) -> usize {
        let mut persist = false;
        let mut materials = match read_json_list::<Material>(&self.path).await {
            Ok(JsonLoad::Parsed(items)) => items,
            Ok(JsonLoad::Missing) => {
                tracing::info!(
                    path = %self.path.display(),
                    "material catalog not found; creating default catalog"
                );
                persist = true;
                default_materials()
            }
            Ok(JsonLoad::Empty) => {
                tracing::warn!(path = %self.path.display(), "material catalog is empty");
                Vec::new()
            }
            Ok(JsonLoad::Corrupt(error)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "material catalog is not valid JSON; starting with an empty catalog"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %format!("{:#}", e),
                    "failed to read material catalog; starting with an empty catalog"
                );
                Vec::new()
            }
        };

        let repaired = assign_missing_ids(&mut materials);
        if repaired > 0 {
            tracing::info!(count = repaired, "assigned ids to materials without one");
            persist = true;
        }

        let count = materials.len();
        *self.write() = materials;

        if persist {
            if let Err(e) = self.save().await {
                tracing::warn!(error = %format!("{:#}", e), "failed to persist material catalog");
            }
        }

        tracing::info!(count, path = %self.path.display(), "material catalog loaded");
        self.subscribers.notify(&CatalogChange { is_reload: true });
        count
    }

    /// Write the full list to disk.
    ///
    /// On failure the in-memory list is left as is and stays authoritative.
    pub async fn save(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.all();
        write_json_atomic(&self.path, &snapshot).await?;
        tracing::debug!(count = snapshot.len(), path = %self.path.display(), "material catalog saved");
        Ok(())
    }

    /// Snapshot of every material. Never touches disk.
    pub fn all(&self) -> Vec<Material> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Material> {
        if id.trim().is_empty() {
            return None;
        }
        self.read().iter().find(|m| m.id == id).cloned()
    }

    /// Insert `material`, or overwrite the mutable fields of the entry with
    /// the same id.
    ///
    /// An empty id is replaced with a fresh one. Materials without a name or
    /// with a non-positive thickness are rejected with `None`.
    ///
    /// The catalog is persisted before subscribers are notified. Subscribers
    /// are notified even when that write fails: the save error is logged and
    /// swallowed, the change is not undone, and the in-memory list stays
    /// authoritative until the next successful save.
    pub async fn add_or_update(&self, material: Material) -> Option<String> {
        if !is_valid_material(&material) {
            tracing::warn!(name = %material.name, "rejected invalid material");
            return None;
        }

        let mut material = material;
        if material.id.trim().is_empty() {
            material.id = new_id();
        }
        let id = material.id.clone();

        let inserted = {
            let mut materials = self.write();
            match materials.iter_mut().find(|m| m.id == id) {
                Some(existing) => {
                    existing.apply_from(&material);
                    false
                }
                None => {
                    materials.push(material);
                    true
                }
            }
        };

        if let Err(e) = self.save().await {
            tracing::warn!(error = %format!("{:#}", e), "failed to persist material catalog");
        }
        tracing::info!(id = %id, inserted, "material saved to catalog");
        self.subscribers.notify(&CatalogChange { is_reload: false });
        Some(id)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CatalogChange) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }
}

fn assign_missing_ids(materials: &mut [Material]) -> usize {
    let mut repaired = 0;
    for material in materials.iter_mut().filter(|m| m.id.trim().is_empty()) {
        material.id = new_id();
        repaired += 1;
    }
    repaired
}
