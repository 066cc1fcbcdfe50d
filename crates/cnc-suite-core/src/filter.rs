//! Composite element filters and paging.
//!
//! Every populated field of an [`ElementFilter`] must hold for an element to
//! match (logical AND). An empty set or `None` bound places no constraint,
//! so `ElementFilter::default()` matches everything.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{Element, ElementStatus, ElementType};

#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    /// Match any of these types.
    pub types: HashSet<ElementType>,
    /// Match any of these statuses.
    pub statuses: HashSet<ElementStatus>,
    /// Match any of these material ids. Elements without a material never match.
    pub material_ids: HashSet<String>,
    /// Case-insensitive substring over name, description, and tags.
    pub text: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
}

impl ElementFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, kind: ElementType) -> Self {
        self.types.insert(kind);
        self
    }

    pub fn with_status(mut self, status: ElementStatus) -> Self {
        self.statuses.insert(status);
        self
    }

    pub fn with_material(mut self, material_id: impl Into<String>) -> Self {
        self.material_ids.insert(material_id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn created_between(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_after = after;
        self.created_before = before;
        self
    }

    fn text_term(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    /// True when no field constrains the result.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.statuses.is_empty()
            && self.material_ids.is_empty()
            && self.text_term().is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.matches_with_term(element, self.text_term().as_deref())
    }

    /// Apply the filter to a slice, cloning matches in their original order.
    pub fn apply(&self, elements: &[Element]) -> Vec<Element> {
        if self.is_empty() {
            return elements.to_vec();
        }
        let term = self.text_term();
        elements
            .iter()
            .filter(|e| self.matches_with_term(e, term.as_deref()))
            .cloned()
            .collect()
    }

    fn matches_with_term(&self, element: &Element, term: Option<&str>) -> bool {
        if !self.types.is_empty() && !self.types.contains(&element.kind) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&element.status) {
            return false;
        }
        if !self.material_ids.is_empty() {
            match element.material_id.as_deref() {
                Some(id) if self.material_ids.contains(id) => {}
                _ => return false,
            }
        }
        if let Some(after) = self.created_after {
            if element.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if element.created_at > before {
                return false;
            }
        }
        term.map_or(true, |t| element.matches_term(t))
    }
}

/// Offset/limit window over a result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// No paging.
    pub fn all() -> Self {
        Self::default()
    }
}

/// One page of results plus the unpaged match count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}

/// Cut `items` down to the requested window.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total = items.len();
    let items: Vec<T> = match request.limit {
        Some(limit) => items.into_iter().skip(request.offset).take(limit).collect(),
        None => items.into_iter().skip(request.offset).collect(),
    };
    Page {
        items,
        total,
        offset: request.offset,
    }
}
