use bytes::Bytes;
use lopdf::{Dictionary, Document, Object, Stream};
use pdf_stage::{StageError, TransportError, UploadProgress, WireForm};
use pdf_stage_runtime::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

fn pdf_blob(name: &str, num_pages: usize) -> FileBlob {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..num_pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(200),
                    Object::Integer(100),
                ]),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(num_pages as i64)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut content = Vec::new();
    doc.save_to(&mut content).unwrap();
    FileBlob::new(name, content)
}

#[derive(Clone, Default)]
struct CountingTransport {
    calls: Arc<AtomicUsize>,
}

impl Transport for CountingTransport {
    async fn send(
        &self,
        _operation: Operation,
        form: WireForm,
        progress: UploadProgress,
    ) -> Result<Bytes, TransportError> {
        progress.set_total(form.upload_size());
        progress.advance(form.upload_size());
        progress.complete();
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"%PDF-1.7 merged"))
    }
}

#[derive(Clone, Default)]
struct StalledTransport;

impl Transport for StalledTransport {
    async fn send(
        &self,
        _operation: Operation,
        _form: WireForm,
        _progress: UploadProgress,
    ) -> Result<Bytes, TransportError> {
        std::future::pending().await
    }
}

struct Harness {
    commands: mpsc::UnboundedSender<StageCommand>,
    updates: mpsc::UnboundedReceiver<StageUpdate>,
}

impl Harness {
    fn start<T: Transport>(transport: T) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (update_tx, updates) = mpsc::unbounded_channel();
        tokio::spawn(worker_task(
            StagingController::new(ServiceOptions::default()),
            Arc::new(transport),
            Arc::new(PlaceholderRenderer),
            command_rx,
            update_tx,
        ));
        Self { commands, updates }
    }

    fn send(&self, cmd: StageCommand) {
        self.commands.send(cmd).unwrap();
    }

    /// Next update matching `pick`, skipping everything else
    async fn wait_for<T>(&mut self, mut pick: impl FnMut(StageUpdate) -> Option<T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let update = self.updates.recv().await.expect("worker stopped");
                if let Some(found) = pick(update) {
                    return found;
                }
            }
        })
        .await
        .expect("timed out waiting for update")
    }

    async fn staged(&mut self) -> Vec<PageView> {
        self.wait_for(|u| match u {
            StageUpdate::Staged { pages } => Some(pages),
            _ => None,
        })
        .await
    }

    async fn load(&mut self, files: Vec<FileBlob>) -> Vec<PageView> {
        self.send(StageCommand::LoadBlobs { files });
        self.staged().await
    }
}

#[tokio::test]
async fn test_load_publishes_pages_and_previews() {
    let mut harness = Harness::start(CountingTransport::default());

    let pages = harness
        .load(vec![pdf_blob("a.pdf", 2), pdf_blob("b.pdf", 1)])
        .await;
    let summary: Vec<_> = pages
        .iter()
        .map(|p| (p.source_name.as_str(), p.source_page_number))
        .collect();
    assert_eq!(summary, vec![("a.pdf", 1), ("a.pdf", 2), ("b.pdf", 1)]);

    let mut ready = Vec::new();
    while ready.len() < 3 {
        let (id, size) = harness
            .wait_for(|u| match u {
                StageUpdate::PreviewReady { id, image } => Some((id, image.dimensions())),
                _ => None,
            })
            .await;
        // 200x100pt at the default 0.7 scale
        assert_eq!(size, (140, 70));
        ready.push(id);
    }
    ready.sort_by_key(|id| id.0);
    let mut expected: Vec<_> = pages.iter().map(|p| p.id).collect();
    expected.sort_by_key(|id| id.0);
    assert_eq!(ready, expected);
}

#[tokio::test]
async fn test_unreadable_file_reports_error() {
    let mut harness = Harness::start(CountingTransport::default());

    harness.send(StageCommand::LoadBlobs {
        files: vec![FileBlob::new("broken.pdf", b"garbage".to_vec())],
    });
    let message = harness
        .wait_for(|u| match u {
            StageUpdate::Error { message } => Some(message),
            _ => None,
        })
        .await;
    assert!(message.contains("broken.pdf"));
}

#[tokio::test]
async fn test_edits_then_submit_and_save() {
    let transport = CountingTransport::default();
    let mut harness = Harness::start(transport.clone());

    let pages = harness.load(vec![pdf_blob("a.pdf", 3)]).await;
    let ids: Vec<_> = pages.iter().map(|p| p.id).collect();

    harness.send(StageCommand::Reorder {
        dragged: ids[2],
        target: ids[0],
    });
    let pages = harness.staged().await;
    assert_eq!(
        pages.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![ids[2], ids[0], ids[1]]
    );

    harness.send(StageCommand::RotateEntry { id: ids[2] });
    let pages = harness.staged().await;
    assert_eq!(pages[0].rotation, Rotation::Clockwise90);

    harness.send(StageCommand::ToggleSelect { id: ids[1] });
    let pages = harness.staged().await;
    assert!(!pages[2].selected);

    harness.send(StageCommand::Submit {
        operation: Operation::Merge,
    });
    let page_count = harness
        .wait_for(|u| match u {
            StageUpdate::SubmitStarted { page_count, .. } => Some(page_count),
            _ => None,
        })
        .await;
    assert_eq!(page_count, 2);

    let artifact = harness
        .wait_for(|u| match u {
            StageUpdate::SubmitComplete { artifact } => Some(artifact),
            _ => None,
        })
        .await;
    assert_eq!(artifact.filename, "unido.pdf");
    assert_eq!(&artifact.bytes[..], b"%PDF-1.7 merged");
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    let dir = tempfile::tempdir().unwrap();
    harness.send(StageCommand::SaveArtifact {
        path: dir.path().to_path_buf(),
    });
    let saved = harness
        .wait_for(|u| match u {
            StageUpdate::ArtifactSaved { path } => Some(path),
            _ => None,
        })
        .await;
    assert_eq!(saved, dir.path().join("unido.pdf"));
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.7 merged");
}

#[tokio::test]
async fn test_empty_selection_is_reported_without_sending() {
    let transport = CountingTransport::default();
    let mut harness = Harness::start(transport.clone());

    harness.load(vec![pdf_blob("a.pdf", 2)]).await;
    harness.send(StageCommand::DeselectAll);
    let pages = harness.staged().await;
    assert!(pages.iter().all(|p| !p.selected));

    harness.send(StageCommand::Submit {
        operation: Operation::Extract,
    });
    let message = harness
        .wait_for(|u| match u {
            StageUpdate::Error { message } => Some(message),
            StageUpdate::SubmitStarted { .. } => panic!("submission started"),
            _ => None,
        })
        .await;
    assert_eq!(message, "No pages selected");
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_abort_returns_to_editing() {
    let mut harness = Harness::start(StalledTransport);

    let pages = harness.load(vec![pdf_blob("a.pdf", 2)]).await;
    let first = pages[0].id;

    harness.send(StageCommand::Submit {
        operation: Operation::Extract,
    });
    harness
        .wait_for(|u| matches!(u, StageUpdate::SubmitStarted { .. }).then_some(()))
        .await;

    // Edits are ignored while the request is in flight
    harness.send(StageCommand::DeleteEntry { id: first });
    harness.send(StageCommand::AbortSubmit);
    harness
        .wait_for(|u| match u {
            StageUpdate::SubmitAborted => Some(()),
            StageUpdate::Staged { .. } => panic!("edit applied while submitting"),
            StageUpdate::Error { message } => panic!("unexpected error: {}", message),
            _ => None,
        })
        .await;

    harness.send(StageCommand::DeleteEntry { id: first });
    let pages = harness.staged().await;
    assert_eq!(pages.len(), 1);
    assert_ne!(pages[0].id, first);
}

#[tokio::test]
async fn test_save_without_artifact_is_an_error() {
    let mut harness = Harness::start(CountingTransport::default());
    let dir = tempfile::tempdir().unwrap();

    harness.send(StageCommand::SaveArtifact {
        path: dir.path().join("out.pdf"),
    });
    let message = harness
        .wait_for(|u| match u {
            StageUpdate::Error { message } => Some(message),
            _ => None,
        })
        .await;
    assert_eq!(message, StageError::NoArtifact.to_string());
    assert!(StageError::NoArtifact.is_user_visible());
}

#[tokio::test]
async fn test_reset_clears_staging() {
    let mut harness = Harness::start(CountingTransport::default());

    harness.load(vec![pdf_blob("a.pdf", 4)]).await;
    harness.send(StageCommand::Reset);
    assert!(harness.staged().await.is_empty());
}
