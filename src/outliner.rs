//! Element outliner store.
//!
//! Holds the per-project list of [`Element`]s, mirrored to `elements.json`,
//! together with an [`ElementIndex`] for type, status and material lookups.
//!
//! # Consistency
//!
//! The list and its index live in one [`OutlinerState`] behind a single
//! `std::sync::RwLock`. Every mutation changes the list and rebuilds the
//! index under the same write guard, so a reader never sees an index built
//! for a different list. Persistence and notification happen after the
//! guard is dropped:
//!
//! ```text
//! mutate + reindex (write lock) ─► save (write gate, fresh snapshot) ─► notify
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use cnc_suite_core::filter::{paginate, ElementFilter, Page, PageRequest};
use cnc_suite_core::index::ElementIndex;
use cnc_suite_core::models::{
    new_id, AttachedFile, Element, ElementStatus, ElementType, FileCategory,
};
use cnc_suite_core::notify::{ElementChange, SubscriptionId, Subscribers};

use crate::catalog::MaterialCatalogStore;
use crate::host::BlockDefinition;
use crate::persist::{read_json_list, write_json_atomic, JsonLoad};

/// The element list and the index built from it.
#[derive(Debug, Default)]
struct OutlinerState {
    elements: Vec<Element>,
    index: ElementIndex,
}

impl OutlinerState {
    fn new(elements: Vec<Element>) -> Self {
        let index = ElementIndex::build(&elements);
        Self { elements, index }
    }

    fn reindex(&mut self) {
        self.index = ElementIndex::build(&self.elements);
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.index.position_of(id)
    }

    fn get(&self, id: &str) -> Option<&Element> {
        self.position_of(id).and_then(|pos| self.elements.get(pos))
    }

    fn tracks_block(&self, external_id: &str) -> bool {
        self.elements
            .iter()
            .any(|e| e.external_id.as_deref() == Some(external_id))
    }
}

/// Per-project element list backed by one JSON file.
pub struct ElementOutlinerStore {
    path: PathBuf,
    state: RwLock<OutlinerState>,
    write_gate: tokio::sync::Mutex<()>,
    catalog: Arc<MaterialCatalogStore>,
    subscribers: Subscribers<ElementChange>,
}

impl ElementOutlinerStore {
    /// Create an empty, unloaded store.
    ///
    /// The catalog is only used for display lookups.
    pub fn new(path: impl Into<PathBuf>, catalog: Arc<MaterialCatalogStore>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            bail!("element outliner requires a file path");
        }
        Ok(Self {
            path,
            state: RwLock::new(OutlinerState::default()),
            write_gate: tokio::sync::Mutex::new(()),
            catalog,
            subscribers: Subscribers::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> &Arc<MaterialCatalogStore> {
        &self.catalog
    }

    fn read(&self) -> RwLockReadGuard<'_, OutlinerState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, OutlinerState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Load the element list from disk, replacing the in-memory list.
    ///
    /// A missing file becomes an empty, persisted list. Empty, corrupt or
    /// unreadable files yield an empty list with a warning. Empty ids are
    /// regenerated and duplicate ids dropped (first wins); either repair is
    /// written back. Always notifies [`ElementChange::Reloaded`].
    pub async fn load(&self) -> usize {
        let mut persist = false;
        let elements = match read_json_list::<Element>(&self.path).await {
            Ok(JsonLoad::Parsed(items)) => items,
            Ok(JsonLoad::Missing) => {
                tracing::info!(
                    path = %self.path.display(),
                    "element file not found; starting with an empty outliner"
                );
                persist = true;
                Vec::new()
            }
            Ok(JsonLoad::Empty) => {
                tracing::warn!(path = %self.path.display(), "element file is empty");
                Vec::new()
            }
            Ok(JsonLoad::Corrupt(error)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "element file is not valid JSON; starting with an empty outliner"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %format!("{:#}", e),
                    "failed to read element file; starting with an empty outliner"
                );
                Vec::new()
            }
        };

        let (elements, repaired) = repair_ids(elements);
        if repaired > 0 {
            tracing::warn!(count = repaired, "repaired missing or duplicate element ids");
            persist = true;
        }

        let count = elements.len();
        *self.write() = OutlinerState::new(elements);

        if persist {
            self.persist().await;
        }

        tracing::info!(count, path = %self.path.display(), "element outliner loaded");
        self.subscribers.notify(&ElementChange::Reloaded);
        count
    }

    /// Write the full list to disk. In-memory state is never rolled back.
    pub async fn save(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.all();
        write_json_atomic(&self.path, &snapshot).await?;
        tracing::debug!(count = snapshot.len(), path = %self.path.display(), "elements saved");
        Ok(())
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            tracing::warn!(error = %format!("{:#}", e), "failed to persist elements");
        }
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Append `element`. Returns `false` (and does nothing) if its id is
    /// already present. An empty id is replaced with a fresh one.
    pub async fn add(&self, element: Element) -> bool {
        self.insert_unless(element, |_| false).await
    }

    /// Append `element` unless its id is taken or `conflict` holds for the
    /// current state. The check and the push share one write guard.
    async fn insert_unless<F>(&self, element: Element, conflict: F) -> bool
    where
        F: FnOnce(&OutlinerState) -> bool + Send,
    {
        let mut element = element;
        if element.id.trim().is_empty() {
            element.id = new_id();
        }

        {
            let mut state = self.write();
            if state.position_of(&element.id).is_some() {
                tracing::debug!(id = %element.id, "element already exists; not added");
                return false;
            }
            if conflict(&*state) {
                return false;
            }
            state.elements.push(element.clone());
            state.reindex();
        }

        self.persist().await;
        tracing::info!(id = %element.id, name = %element.name, "element added");
        self.subscribers.notify(&ElementChange::Added(element));
        true
    }

    /// Append every element whose id is not yet present, persisting once.
    ///
    /// Emits a single [`ElementChange::Reloaded`] when anything was added.
    /// Returns the number added.
    pub async fn add_many(&self, elements: Vec<Element>) -> usize {
        self.extend_unless(elements, |_, _| false).await
    }

    /// Bulk form of [`insert_unless`](Self::insert_unless). `skip` sees the
    /// state including elements already appended from this batch.
    async fn extend_unless<F>(&self, elements: Vec<Element>, skip: F) -> usize
    where
        F: Fn(&OutlinerState, &Element) -> bool + Send,
    {
        let added = {
            let mut state = self.write();
            let before = state.elements.len();
            for mut element in elements {
                if element.id.trim().is_empty() {
                    element.id = new_id();
                }
                if state.position_of(&element.id).is_some() || skip(&*state, &element) {
                    continue;
                }
                state.elements.push(element);
                state.reindex();
            }
            state.elements.len() - before
        };

        if added == 0 {
            return 0;
        }

        self.persist().await;
        tracing::info!(count = added, "elements added");
        self.subscribers.notify(&ElementChange::Reloaded);
        added
    }

    /// Replace the element with the same id, stamping `modified_at`.
    ///
    /// Returns `false` for an unknown id; nothing is inserted.
    pub async fn update(&self, element: Element) -> bool {
        let updated = {
            let mut state = self.write();
            let Some(pos) = state.position_of(&element.id) else {
                return false;
            };
            let mut element = element;
            element.touch();
            state.elements[pos] = element.clone();
            state.reindex();
            element
        };

        self.finish_update(updated).await;
        true
    }

    /// Apply `change` to the stored element with `id` in place.
    ///
    /// `change` returns `false` to leave the element untouched. Lookup,
    /// change, `modified_at` stamp and reindex share one write guard, so
    /// concurrent edits of the same element are never lost.
    async fn modify<F>(&self, id: &str, change: F) -> bool
    where
        F: FnOnce(&mut Element) -> bool + Send,
    {
        if id.trim().is_empty() {
            return false;
        }
        let updated = {
            let mut state = self.write();
            let Some(pos) = state.position_of(id) else {
                return false;
            };
            let element = &mut state.elements[pos];
            if !change(element) {
                return false;
            }
            element.touch();
            let updated = element.clone();
            state.reindex();
            updated
        };

        self.finish_update(updated).await;
        true
    }

    async fn finish_update(&self, updated: Element) {
        self.persist().await;
        tracing::debug!(id = %updated.id, "element updated");
        self.subscribers.notify(&ElementChange::Updated(updated));
    }

    /// Remove the element with `id`. Returns `false` for an unknown id.
    pub async fn remove(&self, id: &str) -> bool {
        if id.trim().is_empty() {
            return false;
        }
        let removed = {
            let mut state = self.write();
            let Some(pos) = state.position_of(id) else {
                return false;
            };
            let removed = state.elements.remove(pos);
            state.reindex();
            removed
        };

        self.persist().await;
        tracing::info!(id = %removed.id, name = %removed.name, "element removed");
        self.subscribers.notify(&ElementChange::Removed(removed));
        true
    }

    /// Attach the file at `path` to an element.
    ///
    /// Returns `false` if the element is unknown or `path` is not a file.
    pub async fn attach_file(
        &self,
        element_id: &str,
        path: &Path,
        description: &str,
        category: FileCategory,
    ) -> bool {
        if self.get_by_id(element_id).is_none() {
            return false;
        }
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) | Err(_) => {
                tracing::warn!(path = %path.display(), "attachment is not a readable file");
                return false;
            }
        };

        let mut file = AttachedFile::new(path, size);
        file.description = description.to_string();
        file.category = category;
        self.modify(element_id, move |element| {
            element.attached_files.push(file);
            true
        })
        .await
    }

    pub async fn remove_attached_file(&self, element_id: &str, file_id: &str) -> bool {
        self.modify(element_id, |element| {
            let before = element.attached_files.len();
            element.attached_files.retain(|f| f.id != file_id);
            element.attached_files.len() != before
        })
        .await
    }

    /// Set (`Some`) or clear (`None`) the material reference of an element.
    ///
    /// The material id is not checked against the catalog.
    pub async fn assign_material(&self, element_id: &str, material_id: Option<&str>) -> bool {
        let material_id = material_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        self.modify(element_id, move |element| {
            element.material_id = material_id;
            true
        })
        .await
    }

    /// Create and add a Block element for a host block definition.
    ///
    /// Returns `None` for blank input or when the block is already tracked.
    pub async fn create_from_external_block(
        &self,
        name: &str,
        external_id: &str,
    ) -> Option<Element> {
        if name.trim().is_empty() || external_id.trim().is_empty() {
            return None;
        }
        let element = Element::from_block(name.trim(), external_id);
        let added = self
            .insert_unless(element.clone(), |state| {
                let tracked = state.tracks_block(external_id);
                if tracked {
                    tracing::debug!(external_id, "block already tracked");
                }
                tracked
            })
            .await;
        added.then_some(element)
    }

    /// Track every block definition that has no element yet.
    ///
    /// Returns the number of elements created.
    pub async fn sync_from_blocks(&self, blocks: &[BlockDefinition]) -> usize {
        let candidates: Vec<Element> = blocks
            .iter()
            .filter(|b| !b.id.trim().is_empty())
            .map(|b| Element::from_block(b.name.clone(), b.id.clone()))
            .collect();
        if candidates.is_empty() {
            return 0;
        }

        let added = self
            .extend_unless(candidates, |state, element| {
                element
                    .external_id
                    .as_deref()
                    .is_some_and(|id| state.tracks_block(id))
            })
            .await;
        if added > 0 {
            tracing::info!(count = added, "synchronized elements from block definitions");
        }
        added
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn all(&self) -> Vec<Element> {
        self.read().elements.clone()
    }

    pub fn len(&self) -> usize {
        self.read().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().elements.is_empty()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Element> {
        if id.trim().is_empty() {
            return None;
        }
        self.read().get(id).cloned()
    }

    pub fn get_by_external_id(&self, external_id: &str) -> Option<Element> {
        if external_id.trim().is_empty() {
            return None;
        }
        self.read()
            .elements
            .iter()
            .find(|e| e.external_id.as_deref() == Some(external_id))
            .cloned()
    }

    /// Case-insensitive substring search over name, description and tags.
    /// A blank term returns everything.
    pub fn search(&self, term: &str) -> Vec<Element> {
        let term = term.trim().to_lowercase();
        let state = self.read();
        if term.is_empty() {
            return state.elements.clone();
        }
        state
            .elements
            .iter()
            .filter(|e| e.matches_term(&term))
            .cloned()
            .collect()
    }

    pub fn get_by_type(&self, kind: ElementType) -> Vec<Element> {
        let state = self.read();
        ElementIndex::collect(&state.elements, state.index.by_type(kind))
    }

    pub fn get_by_status(&self, status: ElementStatus) -> Vec<Element> {
        let state = self.read();
        ElementIndex::collect(&state.elements, state.index.by_status(status))
    }

    pub fn get_by_material(&self, material_id: &str) -> Vec<Element> {
        if material_id.trim().is_empty() {
            return Vec::new();
        }
        let state = self.read();
        ElementIndex::collect(&state.elements, state.index.by_material(material_id))
    }

    /// Apply `filter` and return one page of the matches.
    pub fn filtered(&self, filter: &ElementFilter, page: PageRequest) -> Page<Element> {
        let matches = filter.apply(&self.read().elements);
        paginate(matches, page)
    }

    // ── Subscriptions ────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ElementChange) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }
}

/// Regenerate empty ids and drop later records that repeat an id.
fn repair_ids(elements: Vec<Element>) -> (Vec<Element>, usize) {
    let mut seen = HashSet::new();
    let mut repaired = 0;
    let mut kept = Vec::with_capacity(elements.len());
    for mut element in elements {
        if element.id.trim().is_empty() {
            element.id = new_id();
            repaired += 1;
        }
        if seen.insert(element.id.clone()) {
            kept.push(element);
        } else {
            tracing::warn!(id = %element.id, name = %element.name, "dropping element with duplicate id");
            repaired += 1;
        }
    }
    (kept, repaired)
}
