//! Canonical ordered collection of staged pages
//!
//! Entries are stored by id, with the output order kept as a separate list
//! of ids. Nothing else records a page's position, so order cannot drift
//! from what is submitted.

use crate::preview::PreviewState;
use crate::source::SourceFile;
use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One page's staged state
#[derive(Debug, Clone)]
pub struct PageEntry {
    id: PageId,
    source: Arc<SourceFile>,
    source_page_number: u32,
    pub rotation: Rotation,
    pub selected: bool,
    pub preview: PreviewState,
}

impl PageEntry {
    fn new(source: Arc<SourceFile>, source_page_number: u32) -> Self {
        Self {
            id: PageId::next(),
            source,
            source_page_number,
            rotation: Rotation::None,
            selected: true,
            preview: PreviewState::Pending,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn source(&self) -> &Arc<SourceFile> {
        &self.source
    }

    /// 1-based page number within the source file
    pub fn source_page_number(&self) -> u32 {
        self.source_page_number
    }
}

#[derive(Debug, Default)]
pub struct PageRegistry {
    entries: HashMap<PageId, PageEntry>,
    order: Vec<PageId>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one entry per page of `source`, appended after everything
    /// already staged
    pub fn expand(&mut self, source: &Arc<SourceFile>) -> Vec<PageId> {
        let mut added = Vec::with_capacity(source.page_count() as usize);
        for page_number in 1..=source.page_count() {
            let entry = PageEntry::new(Arc::clone(source), page_number);
            let id = entry.id();
            self.entries.insert(id, entry);
            self.order.push(id);
            added.push(id);
        }
        added
    }

    pub fn rotate(&mut self, id: PageId) -> Result<Rotation> {
        let entry = self.get_mut(id)?;
        entry.rotation = entry.rotation.next();
        Ok(entry.rotation)
    }

    pub fn toggle_select(&mut self, id: PageId) -> Result<bool> {
        let entry = self.get_mut(id)?;
        entry.selected = !entry.selected;
        Ok(entry.selected)
    }

    pub fn select_all(&mut self) {
        self.set_all_selected(true);
    }

    pub fn deselect_all(&mut self) {
        self.set_all_selected(false);
    }

    fn set_all_selected(&mut self, selected: bool) {
        for entry in self.entries.values_mut() {
            entry.selected = selected;
        }
    }

    pub fn remove(&mut self, id: PageId) -> Result<PageEntry> {
        let entry = self
            .entries
            .remove(&id)
            .ok_or(StageError::UnknownEntry(id))?;
        self.order.retain(|&existing| existing != id);
        Ok(entry)
    }

    /// Replace the order with a permutation of the current ids
    pub fn reorder(&mut self, sequence: Vec<PageId>) -> Result<()> {
        if sequence.len() != self.order.len() {
            return Err(StageError::InvalidPermutation);
        }
        let mut seen = HashSet::with_capacity(sequence.len());
        for id in &sequence {
            if !self.entries.contains_key(id) || !seen.insert(*id) {
                return Err(StageError::InvalidPermutation);
            }
        }
        self.order = sequence;
        Ok(())
    }

    pub fn set_preview(&mut self, id: PageId, preview: PreviewState) -> Result<()> {
        self.get_mut(id)?.preview = preview;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn get(&self, id: PageId) -> Option<&PageEntry> {
        self.entries.get(&id)
    }

    fn get_mut(&mut self, id: PageId) -> Result<&mut PageEntry> {
        self.entries
            .get_mut(&id)
            .ok_or(StageError::UnknownEntry(id))
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn order(&self) -> &[PageId] {
        &self.order
    }

    /// Entries in output order
    pub fn iter(&self) -> impl Iterator<Item = &PageEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Selected entries in output order
    pub fn selected(&self) -> impl Iterator<Item = &PageEntry> {
        self.iter().filter(|entry| entry.selected)
    }

    pub fn selected_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.selected).count()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
