//! Submission request encoding
//!
//! A [`SubmissionRequest`] captures what the service must do: the operation,
//! the originating file content and an ordered list of page descriptors.
//! [`SubmissionRequest::to_form`] lays it out as multipart fields in one of
//! the supported [`WireFormat`]s without tying it to an HTTP client.

use crate::options::{FilePartLayout, WireFormat};
use crate::registry::PageEntry;
use crate::types::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const PDF_MIME: &str = "application/pdf";

/// Originating file content attached to a request
#[derive(Debug, Clone)]
pub struct FilePart {
    pub source: SourceId,
    pub filename: String,
    pub content: Bytes,
    pub page_count: u32,
}

/// Where one output page comes from, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    /// Index into the request's file parts
    pub source_file_index: usize,
    pub source_page_number: u32,
    pub rotation: Rotation,
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub operation: Operation,
    pub files: Vec<FilePart>,
    pub pages: Vec<PageDescriptor>,
}

impl SubmissionRequest {
    /// Encode entries, already filtered to the selection, in the order given
    pub fn encode<'a>(
        operation: Operation,
        entries: impl IntoIterator<Item = &'a PageEntry>,
        layout: FilePartLayout,
    ) -> Self {
        let mut files: Vec<FilePart> = Vec::new();
        let mut pages = Vec::new();
        let mut part_by_source: HashMap<SourceId, usize> = HashMap::new();

        for entry in entries {
            let source = entry.source();
            let source_file_index = match layout {
                FilePartLayout::PerPage => push_part(&mut files, source),
                FilePartLayout::Deduplicated => *part_by_source
                    .entry(source.id())
                    .or_insert_with(|| push_part(&mut files, source)),
            };
            pages.push(PageDescriptor {
                source_file_index,
                source_page_number: entry.source_page_number(),
                rotation: entry.rotation,
            });
        }

        Self {
            operation,
            files,
            pages,
        }
    }

    pub fn pages_json(&self) -> std::result::Result<String, ProtocolError> {
        serde_json::to_string(&self.pages).map_err(|e| ProtocolError::Metadata(e.to_string()))
    }

    /// Lay the request out as multipart fields
    pub fn to_form(&self, format: WireFormat) -> std::result::Result<WireForm, ProtocolError> {
        match format {
            WireFormat::Structured => self.structured_form(),
            WireFormat::Legacy => match self.operation {
                Operation::Merge => self.legacy_merge_form(),
                Operation::Extract => self.legacy_extract_form(),
            },
        }
    }

    /// Metadata first, then one `files` part per file part
    fn structured_form(&self) -> std::result::Result<WireForm, ProtocolError> {
        let mut fields = vec![
            FormField::text("operation", self.operation.as_str()),
            FormField::text("pages", self.pages_json()?),
        ];
        fields.extend(self.files.iter().map(|part| FormField::file("files", part)));
        Ok(WireForm { fields })
    }

    /// Whole files only, each in natural page order and unrotated
    fn legacy_merge_form(&self) -> std::result::Result<WireForm, ProtocolError> {
        let mut fields = Vec::new();
        let mut pages = self.pages.iter();

        while let Some(first) = pages.next() {
            let part = self.part(first)?;
            let mut expected = 1;
            let mut page = first;
            loop {
                if page.rotation != Rotation::None {
                    return Err(ProtocolError::Unrepresentable(
                        "merge cannot rotate pages".to_string(),
                    ));
                }
                if self.part(page)?.source != part.source || page.source_page_number != expected {
                    return Err(ProtocolError::Unrepresentable(format!(
                        "merge only accepts whole files in page order ({})",
                        part.filename
                    )));
                }
                if expected == part.page_count {
                    break;
                }
                expected += 1;
                page = pages.next().ok_or_else(|| {
                    ProtocolError::Unrepresentable(format!(
                        "merge only accepts whole files ({} is incomplete)",
                        part.filename
                    ))
                })?;
            }
            fields.push(FormField::file("files", part));
        }

        Ok(WireForm { fields })
    }

    /// One source file, a page list and a map of non-zero rotations
    fn legacy_extract_form(&self) -> std::result::Result<WireForm, ProtocolError> {
        let Some(first) = self.pages.first() else {
            return Err(ProtocolError::Unrepresentable("no pages".to_string()));
        };
        let part = self.part(first)?;

        let mut selected_pages = Vec::with_capacity(self.pages.len());
        let mut rotations: BTreeMap<u32, u16> = BTreeMap::new();
        let mut seen: HashMap<u32, Rotation> = HashMap::new();

        for page in &self.pages {
            if self.part(page)?.source != part.source {
                return Err(ProtocolError::Unrepresentable(
                    "extract accepts pages from a single file".to_string(),
                ));
            }
            let number = page.source_page_number;
            if let Some(previous) = seen.insert(number, page.rotation) {
                if previous != page.rotation {
                    return Err(ProtocolError::Unrepresentable(format!(
                        "page {} is used twice with different rotations",
                        number
                    )));
                }
            }
            selected_pages.push(number);
            if page.rotation != Rotation::None {
                rotations.insert(number, page.rotation.degrees());
            }
        }

        let selected_pages = serde_json::to_string(&selected_pages)
            .map_err(|e| ProtocolError::Metadata(e.to_string()))?;
        let rotations =
            serde_json::to_string(&rotations).map_err(|e| ProtocolError::Metadata(e.to_string()))?;

        Ok(WireForm {
            fields: vec![
                FormField::text("selected_pages", selected_pages),
                FormField::text("rotations", rotations),
                FormField::file("file", part),
            ],
        })
    }

    fn part(&self, page: &PageDescriptor) -> std::result::Result<&FilePart, ProtocolError> {
        self.files.get(page.source_file_index).ok_or_else(|| {
            ProtocolError::Metadata(format!(
                "page refers to missing file part {}",
                page.source_file_index
            ))
        })
    }
}

fn push_part(files: &mut Vec<FilePart>, source: &crate::source::SourceFile) -> usize {
    files.push(FilePart {
        source: source.id(),
        filename: source.name().to_string(),
        content: source.content().clone(),
        page_count: source.page_count(),
    });
    files.len() - 1
}

/// A multipart body, independent of any HTTP client
#[derive(Debug, Clone)]
pub struct WireForm {
    pub fields: Vec<FormField>,
}

impl WireForm {
    /// Bytes of field content in the body; progress is measured against this
    pub fn upload_size(&self) -> u64 {
        self.fields.iter().map(FormField::len).sum()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(FormField::name).collect()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|field| match field {
            FormField::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        mime: &'static str,
        content: Bytes,
    },
}

impl FormField {
    fn text(name: &str, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.to_string(),
            value: value.into(),
        }
    }

    fn file(name: &str, part: &FilePart) -> Self {
        FormField::File {
            name: name.to_string(),
            filename: part.filename.clone(),
            mime: PDF_MIME,
            content: part.content.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormField::Text { name, .. } | FormField::File { name, .. } => name,
        }
    }

    /// Length of the field's content, without multipart headers
    pub fn len(&self) -> u64 {
        match self {
            FormField::Text { value, .. } => value.len() as u64,
            FormField::File { content, .. } => content.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
