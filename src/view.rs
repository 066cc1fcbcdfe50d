//! Display rows and summary statistics for the outliner panel.

use cnc_suite_core::filter::{ElementFilter, PageRequest};
use cnc_suite_core::models::{Element, ElementStatus};

use crate::catalog::MaterialCatalogStore;
use crate::outliner::ElementOutlinerStore;

pub const UNASSIGNED: &str = "Unassigned";
pub const UNKNOWN_MATERIAL: &str = "Unknown Material";

/// One outliner row: the element plus its resolved material.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRow {
    pub element: Element,
    pub material_name: String,
    /// Hex color of the material, empty when it cannot be resolved.
    pub material_color: String,
}

impl ElementRow {
    pub fn new(element: Element, catalog: &MaterialCatalogStore) -> Self {
        let (material_name, material_color) = match element.material_id.as_deref() {
            None | Some("") => (UNASSIGNED.to_string(), String::new()),
            Some(id) => match catalog.get_by_id(id) {
                Some(material) => (material.name, material.color),
                None => (UNKNOWN_MATERIAL.to_string(), String::new()),
            },
        };
        Self {
            element,
            material_name,
            material_color,
        }
    }

    pub fn attachment_count(&self) -> usize {
        self.element.attached_files.len()
    }
}

/// Rows for every element matching `filter`, in list order.
pub fn element_rows(outliner: &ElementOutlinerStore, filter: &ElementFilter) -> Vec<ElementRow> {
    let catalog = outliner.catalog();
    outliner
        .filtered(filter, PageRequest::all())
        .items
        .into_iter()
        .map(|e| ElementRow::new(e, catalog))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlinerSummary {
    pub total: usize,
    pub completed: usize,
    /// Neither completed nor cancelled.
    pub pending: usize,
    /// `completed / total * 100`, 0 for an empty list.
    pub completion_percentage: f64,
}

impl OutlinerSummary {
    pub fn from_elements(elements: &[Element]) -> Self {
        let total = elements.len();
        let completed = elements
            .iter()
            .filter(|e| e.status == ElementStatus::Completed)
            .count();
        let pending = elements.iter().filter(|e| e.status.is_pending()).count();
        let completion_percentage = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            total,
            completed,
            pending,
            completion_percentage,
        }
    }
}

pub fn summary(outliner: &ElementOutlinerStore) -> OutlinerSummary {
    OutlinerSummary::from_elements(&outliner.all())
}
