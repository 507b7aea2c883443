mod common;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use common::{blob, padded_pdf_bytes};
use pdf_stage::*;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct CapturedField {
    name: String,
    filename: Option<String>,
    data: Vec<u8>,
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<CapturedField>>>);

async fn accept(State(captured): State<Captured>, mut multipart: Multipart) -> (StatusCode, Vec<u8>) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        captured.0.lock().unwrap().push(CapturedField {
            name,
            filename,
            data,
        });
    }
    (StatusCode::OK, b"%PDF-merged".to_vec())
}

async fn reject() -> (StatusCode, &'static str) {
    (StatusCode::UNPROCESSABLE_ENTITY, "bad page list")
}

async fn serve(captured: Captured) -> String {
    let app = Router::new()
        .route("/unir-pdf/", post(accept))
        .route("/dividir-pdf/", post(reject))
        .layer(DefaultBodyLimit::disable())
        .with_state(captured);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_merge_round_trip_over_http() {
    let captured = Captured::default();
    let options = ServiceOptions {
        base_url: serve(captured.clone()).await,
        ..ServiceOptions::default()
    };
    let transport = HttpTransport::new(options.clone()).unwrap();

    let mut controller = StagingController::new(options);
    let report = controller
        .load_files(vec![blob("a.pdf", 2), blob("b.pdf", 1)])
        .await
        .unwrap();
    controller.rotate_entry(report.added[2]).unwrap();
    controller.reorder(report.added[2], report.added[0]).unwrap();

    let submission = controller.begin_submit(Operation::Merge).unwrap();
    let id = submission.id();
    let progress = submission.progress().clone();
    let result = submission.send(&transport).await;
    let artifact = controller.finish_submit(id, result).unwrap().unwrap();

    assert_eq!(&artifact.bytes[..], b"%PDF-merged");
    assert_eq!(artifact.filename, "unido.pdf");
    assert_eq!(progress.percent(), 100);

    let fields = captured.0.lock().unwrap().clone();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["operation", "pages", "files", "files", "files"]);
    assert_eq!(fields[0].data, b"merge");
    assert_eq!(fields[1].filename, None);

    let filenames: Vec<Option<&str>> = fields[2..].iter().map(|f| f.filename.as_deref()).collect();
    assert_eq!(filenames, vec![Some("b.pdf"), Some("a.pdf"), Some("a.pdf")]);
    assert_eq!(fields[2].data, controller.sources()[1].content().to_vec());

    let pages: Vec<PageDescriptor> = serde_json::from_slice(&fields[1].data).unwrap();
    let summary: Vec<(usize, u32, u16)> = pages
        .iter()
        .map(|p| (p.source_file_index, p.source_page_number, p.rotation.degrees()))
        .collect();
    assert_eq!(summary, vec![(0, 1, 90), (1, 1, 0), (2, 2, 0)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_large_upload_reports_intermediate_progress() {
    let captured = Captured::default();
    let options = ServiceOptions {
        base_url: serve(captured.clone()).await,
        ..ServiceOptions::default()
    };
    let transport = HttpTransport::new(options.clone()).unwrap();

    let mut controller = StagingController::new(options);
    let content = padded_pdf_bytes(2, 8 * 1024 * 1024);
    let size = content.len();
    controller
        .load_files(vec![FileBlob::new("big.pdf", content)])
        .await
        .unwrap();

    let submission = controller.begin_submit(Operation::Merge).unwrap();
    let id = submission.id();
    let mut rx = submission.progress().subscribe();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let percent = *rx.borrow_and_update();
            seen.push(percent);
            if percent == 100 {
                break;
            }
        }
        seen
    });

    let result = submission.send(&transport).await;
    controller.finish_submit(id, result).unwrap().unwrap();
    let seen = observer.await.unwrap();

    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.iter().any(|&p| p > 0 && p < 100), "{:?}", seen);

    let fields = captured.0.lock().unwrap().clone();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["operation", "pages", "files", "files"]);
    assert_eq!(fields[2].data.len(), size);
}

#[tokio::test]
async fn test_non_success_status_surfaces_body() {
    let options = ServiceOptions {
        base_url: serve(Captured::default()).await,
        ..ServiceOptions::default()
    };
    let transport = HttpTransport::new(options.clone()).unwrap();

    let mut controller = StagingController::new(options);
    controller.load_files(vec![blob("a.pdf", 1)]).await.unwrap();

    let result = controller.submit(Operation::Extract, &transport).await;
    match result {
        Err(StageError::Transport(TransportError::Status { status, detail })) => {
            assert_eq!(status, 422);
            assert_eq!(detail, "bad page list");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
    assert_eq!(controller.registry().len(), 1);
}

#[tokio::test]
async fn test_unreachable_service_is_a_network_error() {
    let options = ServiceOptions {
        // Port 9 (discard) is closed on test machines
        base_url: "http://127.0.0.1:9".to_string(),
        ..ServiceOptions::default()
    };
    let transport = HttpTransport::new(options.clone()).unwrap();

    let mut controller = StagingController::new(options);
    controller.load_files(vec![blob("a.pdf", 1)]).await.unwrap();

    let result = controller.submit(Operation::Merge, &transport).await;
    assert!(matches!(
        result,
        Err(StageError::Transport(TransportError::Network(_)))
    ));
    assert!(!controller.is_submitting());
}
