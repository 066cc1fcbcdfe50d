//! Material palette: binds catalog materials to host document objects.
//!
//! A material is attached to an object through four user strings
//! (`Material_Id`, `Material_Name`, `Material_Type`, `Material_Thickness`
//! with the default prefix) plus the object color. Every other palette
//! operation finds its objects through the `Material_Id` string.

use std::sync::Arc;

use cnc_suite_core::models::{Material, MaterialType};

use crate::catalog::MaterialCatalogStore;
use crate::config::PaletteConfig;
use crate::host::{Geometry, HostDocument, ObjectId};

/// Result of one palette operation, for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteOutcome {
    pub affected: usize,
    pub message: String,
}

impl PaletteOutcome {
    fn new(affected: usize, message: String) -> Self {
        tracing::info!(affected, "{}", message);
        Self { affected, message }
    }
}

pub struct MaterialPalette {
    catalog: Arc<MaterialCatalogStore>,
    config: PaletteConfig,
}

impl MaterialPalette {
    pub fn new(catalog: Arc<MaterialCatalogStore>, config: PaletteConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &Arc<MaterialCatalogStore> {
        &self.catalog
    }

    /// Materials shown in the palette, in catalog order.
    pub fn materials(&self) -> Vec<Material> {
        self.catalog.all()
    }

    /// User-string key for `field`, e.g. `Material_Id`.
    pub fn key(&self, field: &str) -> String {
        format!("{}{}", self.config.attribute_prefix, field)
    }

    /// Objects tagged with `material`.
    pub fn objects_with_material(
        &self,
        doc: &dyn HostDocument,
        material: &Material,
    ) -> Vec<ObjectId> {
        doc.objects_with_user_string(&self.key("Id"), &material.id)
    }

    /// The material an object is tagged with, if it is still in the catalog.
    pub fn material_of(&self, doc: &dyn HostDocument, object: &ObjectId) -> Option<Material> {
        let id = doc.user_string(object, &self.key("Id"))?;
        self.catalog.get_by_id(&id)
    }

    fn stamp(&self, doc: &mut dyn HostDocument, object: &ObjectId, material: &Material) -> bool {
        let stamped = doc.set_user_string(object, &self.key("Id"), &material.id)
            && doc.set_user_string(object, &self.key("Name"), &material.name)
            && doc.set_user_string(object, &self.key("Type"), &material.kind.to_string())
            && doc.set_user_string(object, &self.key("Thickness"), &material.thickness_display());
        if stamped {
            if let Some(rgb) = material.color_rgb() {
                doc.set_object_color(object, rgb);
            }
        }
        stamped
    }

    /// Brush: assign `material` to every selected object.
    pub fn assign_to_selection(
        &self,
        doc: &mut dyn HostDocument,
        material: &Material,
    ) -> PaletteOutcome {
        let selected = doc.selected_objects();
        if selected.is_empty() {
            return PaletteOutcome::new(0, "No objects selected".to_string());
        }
        let affected = selected
            .iter()
            .filter(|id| self.stamp(doc, id, material))
            .count();
        doc.redraw();
        PaletteOutcome::new(
            affected,
            format!("Assigned material {} to {} objects", material.name, affected),
        )
    }

    /// Eye: hide every object with `material` if any is visible, else show all.
    pub fn toggle_visibility(
        &self,
        doc: &mut dyn HostDocument,
        material: &Material,
    ) -> PaletteOutcome {
        let objects = self.objects_with_material(doc, material);
        if objects.is_empty() {
            return no_objects(material);
        }
        let show = !objects.iter().any(|id| doc.is_visible(id));
        for id in &objects {
            doc.set_visible(id, show);
        }
        doc.redraw();
        let action = if show { "Shown" } else { "Hidden" };
        PaletteOutcome::new(
            objects.len(),
            format!("{} {} objects with material {}", action, objects.len(), material.name),
        )
    }

    /// Target: replace the selection with the objects that carry `material`.
    pub fn select_objects(&self, doc: &mut dyn HostDocument, material: &Material) -> PaletteOutcome {
        doc.unselect_all();
        let objects = self.objects_with_material(doc, material);
        if objects.is_empty() {
            doc.redraw();
            return no_objects(material);
        }
        let affected = objects.iter().filter(|id| doc.select(id, true)).count();
        doc.redraw();
        PaletteOutcome::new(
            affected,
            format!("Selected {} objects with material {}", affected, material.name),
        )
    }

    /// Lock every object with `material` if any is unlocked, else unlock all.
    pub fn toggle_lock(&self, doc: &mut dyn HostDocument, material: &Material) -> PaletteOutcome {
        let objects = self.objects_with_material(doc, material);
        if objects.is_empty() {
            return no_objects(material);
        }
        let lock = objects.iter().any(|id| !doc.is_locked(id));
        for id in &objects {
            doc.set_locked(id, lock);
        }
        doc.redraw();
        let action = if lock { "Locked" } else { "Unlocked" };
        PaletteOutcome::new(
            objects.len(),
            format!("{} {} objects with material {}", action, objects.len(), material.name),
        )
    }

    /// Geometry that represents `material` in the document.
    pub fn geometry_for(&self, material: &Material) -> Geometry {
        match material.kind {
            MaterialType::Sheet if material.has_valid_sheet_dimensions() => Geometry::Rectangle {
                width: material.width,
                length: material.length,
            },
            MaterialType::Length | MaterialType::SolidWood => Geometry::Line {
                length: self.config.profile_length_mm,
            },
            _ => Geometry::Point,
        }
    }

    /// Plus: insert representative geometry tagged with `material`.
    pub fn insert_geometry(&self, doc: &mut dyn HostDocument, material: &Material) -> PaletteOutcome {
        let geometry = self.geometry_for(material);
        let Some(object) = doc.add_geometry(geometry) else {
            tracing::warn!(material = %material.name, "host refused to add geometry");
            return PaletteOutcome {
                affected: 0,
                message: format!("Could not insert geometry for material {}", material.name),
            };
        };
        self.stamp(doc, &object, material);
        doc.redraw();
        PaletteOutcome::new(1, format!("Inserted geometry for material {}", material.name))
    }
}

fn no_objects(material: &Material) -> PaletteOutcome {
    PaletteOutcome::new(0, format!("No objects with material {}", material.name))
}
