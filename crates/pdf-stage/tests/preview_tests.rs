mod common;

use common::{blob, source};
use pdf_stage::*;

#[test]
fn test_open_discovers_pages_and_inherited_media_box() {
    let file = source("a.pdf", 3);
    assert_eq!(file.page_count(), 3);
    assert_eq!(file.name(), "a.pdf");
    assert_eq!(
        file.page_size(2),
        Some(PageSize {
            width_pt: 595.0,
            height_pt: 842.0,
        })
    );
    assert_eq!(file.page_size(0), None);
    assert_eq!(file.page_size(4), None);
}

#[test]
fn test_open_rejects_documents_without_pages() {
    let result = SourceFile::open(blob("empty.pdf", 0));
    assert!(matches!(result, Err(LoadError::NoPages { name }) if name == "empty.pdf"));
}

#[tokio::test]
async fn test_read_missing_file_reports_name() {
    let dir = tempfile::tempdir().unwrap();
    let result = FileBlob::read(dir.path().join("missing.pdf")).await;
    match result {
        Err(e @ LoadError::Io { .. }) => assert_eq!(e.file_name(), Some("missing.pdf")),
        other => panic!("Expected IO error, got {:?}", other),
    }
}

#[test]
fn test_placeholder_matches_page_proportions() {
    let file = source("a.pdf", 1);
    let image = PlaceholderRenderer.render(&file, 1, 0.5).unwrap();
    assert_eq!(image.dimensions(), (298, 421));
}

#[test]
fn test_render_is_idempotent() {
    let file = source("a.pdf", 1);
    let first = PlaceholderRenderer.render(&file, 1, 0.2).unwrap();
    let second = PlaceholderRenderer.render(&file, 1, 0.2).unwrap();
    assert_eq!(first.as_raw(), second.as_raw());
}

#[test]
fn test_render_out_of_range_page_fails() {
    let file = source("a.pdf", 2);
    assert_eq!(
        PlaceholderRenderer.render(&file, 3, 1.0),
        Err(RenderError::PageOutOfRange {
            page: 3,
            page_count: 2,
        })
    );
}
