//! Lookup index over an element list.
//!
//! Maps type, status, and material id to positions in the list it was built
//! from. Positions are only meaningful for that exact list, so the owner must
//! rebuild the index in the same critical section as any mutation.

use std::collections::HashMap;

use crate::models::{Element, ElementStatus, ElementType};

#[derive(Debug, Clone, Default)]
pub struct ElementIndex {
    by_type: HashMap<ElementType, Vec<usize>>,
    by_status: HashMap<ElementStatus, Vec<usize>>,
    by_material: HashMap<String, Vec<usize>>,
    by_id: HashMap<String, usize>,
}

impl ElementIndex {
    pub fn build(elements: &[Element]) -> Self {
        let mut index = Self::default();
        for (pos, element) in elements.iter().enumerate() {
            index.by_type.entry(element.kind).or_default().push(pos);
            index.by_status.entry(element.status).or_default().push(pos);
            if let Some(material_id) = element.material_id.as_deref() {
                if !material_id.is_empty() {
                    index
                        .by_material
                        .entry(material_id.to_string())
                        .or_default()
                        .push(pos);
                }
            }
            index.by_id.entry(element.id.clone()).or_insert(pos);
        }
        index
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn by_type(&self, kind: ElementType) -> &[usize] {
        self.by_type.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_status(&self, status: ElementStatus) -> &[usize] {
        self.by_status.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_material(&self, material_id: &str) -> &[usize] {
        self.by_material
            .get(material_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Clone the elements at `positions`, preserving list order.
    pub fn collect(elements: &[Element], positions: &[usize]) -> Vec<Element> {
        positions
            .iter()
            .filter_map(|&pos| elements.get(pos).cloned())
            .collect()
    }
}
