mod common;

use common::source;
use pdf_stage::*;
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn test_expand_appends_pages_in_source_order() {
    let mut registry = PageRegistry::new();
    let a = Arc::new(source("a.pdf", 3));
    let b = Arc::new(source("b.pdf", 2));

    let first = registry.expand(&a);
    let second = registry.expand(&b);

    assert_eq!(registry.len(), 5);
    assert_eq!(registry.order()[..3], first[..]);
    assert_eq!(registry.order()[3..], second[..]);

    let numbers: Vec<(String, u32)> = registry
        .iter()
        .map(|e| (e.source().name().to_string(), e.source_page_number()))
        .collect();
    assert_eq!(
        numbers,
        vec![
            ("a.pdf".to_string(), 1),
            ("a.pdf".to_string(), 2),
            ("a.pdf".to_string(), 3),
            ("b.pdf".to_string(), 1),
            ("b.pdf".to_string(), 2),
        ]
    );
    assert!(registry
        .iter()
        .all(|e| e.selected && e.rotation == Rotation::None));
}

#[test]
fn test_ids_are_unique_across_expansions() {
    let mut registry = PageRegistry::new();
    let a = Arc::new(source("a.pdf", 4));
    registry.expand(&a);
    registry.expand(&a);

    let ids: HashSet<PageId> = registry.order().iter().copied().collect();
    assert_eq!(ids.len(), 8);
}

#[test]
fn test_rotation_wraps_every_four_turns() {
    let mut registry = PageRegistry::new();
    let ids = registry.expand(&Arc::new(source("a.pdf", 1)));
    let id = ids[0];

    for n in 1..=10u16 {
        let rotation = registry.rotate(id).unwrap();
        assert_eq!(rotation.degrees(), (90 * n) % 360);
    }
}

#[test]
fn test_removed_id_is_unknown_to_every_operation() {
    let mut registry = PageRegistry::new();
    let ids = registry.expand(&Arc::new(source("a.pdf", 2)));
    let gone = ids[0];

    registry.remove(gone).unwrap();
    assert!(!registry.contains(gone));
    assert_eq!(registry.order(), &ids[1..]);

    assert!(matches!(registry.rotate(gone), Err(StageError::UnknownEntry(id)) if id == gone));
    assert!(matches!(registry.toggle_select(gone), Err(StageError::UnknownEntry(_))));
    assert!(matches!(registry.remove(gone), Err(StageError::UnknownEntry(_))));
    assert!(matches!(
        registry.set_preview(gone, PreviewState::Failed("x".into())),
        Err(StageError::UnknownEntry(_))
    ));
}

#[test]
fn test_select_and_deselect_all_cover_every_entry() {
    let mut registry = PageRegistry::new();
    let ids = registry.expand(&Arc::new(source("a.pdf", 3)));

    registry.toggle_select(ids[1]).unwrap();
    assert_eq!(registry.selected_count(), 2);

    registry.deselect_all();
    assert_eq!(registry.selected_count(), 0);
    assert_eq!(registry.selected().count(), 0);

    registry.select_all();
    let selected: Vec<PageId> = registry.selected().map(|e| e.id()).collect();
    assert_eq!(selected, ids);
}

#[test]
fn test_reorder_accepts_only_exact_permutations() {
    let mut registry = PageRegistry::new();
    let ids = registry.expand(&Arc::new(source("a.pdf", 3)));

    let reversed: Vec<PageId> = ids.iter().rev().copied().collect();
    registry.reorder(reversed.clone()).unwrap();
    assert_eq!(registry.order(), &reversed[..]);

    // Missing an id
    assert!(matches!(
        registry.reorder(vec![ids[0], ids[1]]),
        Err(StageError::InvalidPermutation)
    ));
    // Duplicate standing in for a missing id
    assert!(matches!(
        registry.reorder(vec![ids[0], ids[0], ids[1]]),
        Err(StageError::InvalidPermutation)
    ));
    // Foreign id
    assert!(matches!(
        registry.reorder(vec![ids[0], ids[1], PageId(u64::MAX)]),
        Err(StageError::InvalidPermutation)
    ));

    assert_eq!(registry.order(), &reversed[..]);
}

#[test]
fn test_move_entry_is_a_bijection_preserving_relative_order() {
    let seq: Vec<PageId> = (1..=5).map(PageId).collect();

    for &dragged in &seq {
        for &target in &seq {
            let moved = move_entry(&seq, dragged, target);

            let before: HashSet<_> = seq.iter().collect();
            let after: HashSet<_> = moved.iter().collect();
            assert_eq!(before, after);
            assert_eq!(moved.len(), seq.len());

            let target_index = seq.iter().position(|&id| id == target).unwrap();
            assert_eq!(moved[target_index], dragged);

            let others_before: Vec<_> = seq.iter().filter(|&&id| id != dragged).collect();
            let others_after: Vec<_> = moved.iter().filter(|&&id| id != dragged).collect();
            assert_eq!(others_before, others_after);
        }
    }
}
