//! Drag-and-drop reordering as a pure sequence transformation

use crate::types::PageId;

/// Move `dragged` to the position currently held by `target`.
///
/// Elements between the two positions shift by one slot. Returns the
/// sequence unchanged when the ids are equal or either is missing, which is
/// what a drop outside any page reports.
pub fn move_entry(sequence: &[PageId], dragged: PageId, target: PageId) -> Vec<PageId> {
    let mut result = sequence.to_vec();
    if dragged == target {
        return result;
    }

    let from = sequence.iter().position(|&id| id == dragged);
    let to = sequence.iter().position(|&id| id == target);

    if let (Some(from), Some(to)) = (from, to) {
        let moved = result.remove(from);
        result.insert(to, moved);
    }
    result
}
