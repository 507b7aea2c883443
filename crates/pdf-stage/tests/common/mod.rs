#![allow(dead_code)]

use bytes::Bytes;
use lopdf::{Dictionary, Document, Object, Stream};
use pdf_stage::*;
use std::sync::{Arc, Mutex};

pub fn create_test_pdf(num_pages: usize) -> Document {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..num_pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    // MediaBox on the page tree root, inherited by every page
    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ]),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));

    doc.trailer.set("Root", catalog_id);

    doc
}

pub fn pdf_bytes(num_pages: usize) -> Vec<u8> {
    let mut doc = create_test_pdf(num_pages);
    let mut writer = Vec::new();
    doc.save_to(&mut writer).unwrap();
    writer
}

/// A document whose first page carries `padding` bytes of blank content
pub fn padded_pdf_bytes(num_pages: usize, padding: usize) -> Vec<u8> {
    let mut doc = create_test_pdf(num_pages);
    let mut content = b"q Q\n".to_vec();
    content.resize(content.len() + padding, b' ');
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let first_page = *doc.get_pages().values().next().unwrap();
    doc.get_object_mut(first_page)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Contents", Object::Reference(content_id));

    let mut writer = Vec::new();
    doc.save_to(&mut writer).unwrap();
    writer
}

pub fn blob(name: &str, num_pages: usize) -> FileBlob {
    FileBlob::new(name, pdf_bytes(num_pages))
}

pub fn source(name: &str, num_pages: usize) -> SourceFile {
    SourceFile::open(blob(name, num_pages)).unwrap()
}

pub const ARTIFACT: &[u8] = b"%PDF-1.7 artifact";

/// Records every form it is asked to send and answers with a fixed artifact
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub calls: Arc<Mutex<Vec<(Operation, WireForm)>>>,
}

impl RecordingTransport {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_form(&self) -> WireForm {
        self.calls.lock().unwrap().last().unwrap().1.clone()
    }

    pub fn last_pages(&self) -> Vec<PageDescriptor> {
        let form = self.last_form();
        serde_json::from_str(form.text("pages").unwrap()).unwrap()
    }
}

impl Transport for RecordingTransport {
    async fn send(
        &self,
        operation: Operation,
        form: WireForm,
        progress: UploadProgress,
    ) -> std::result::Result<Bytes, TransportError> {
        progress.set_total(form.upload_size());
        progress.advance(form.upload_size());
        progress.complete();
        self.calls.lock().unwrap().push((operation, form));
        Ok(Bytes::from_static(ARTIFACT))
    }
}

/// Fails every request with a server error
#[derive(Clone, Default)]
pub struct FailingTransport;

impl Transport for FailingTransport {
    async fn send(
        &self,
        _operation: Operation,
        _form: WireForm,
        _progress: UploadProgress,
    ) -> std::result::Result<Bytes, TransportError> {
        Err(TransportError::Status {
            status: 500,
            detail: "engine crashed".to_string(),
        })
    }
}

/// Never answers
#[derive(Clone, Default)]
pub struct StalledTransport;

impl Transport for StalledTransport {
    async fn send(
        &self,
        _operation: Operation,
        _form: WireForm,
        _progress: UploadProgress,
    ) -> std::result::Result<Bytes, TransportError> {
        std::future::pending().await
    }
}
