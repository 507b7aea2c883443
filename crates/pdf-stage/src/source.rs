//! Source documents and their discovery

use crate::types::*;
use bytes::Bytes;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// US Letter, used when a page carries no MediaBox anywhere in its tree
const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width_pt: 612.0,
    height_pt: 792.0,
};

/// Guards against cyclic /Parent chains in malformed files
const MAX_PARENT_DEPTH: usize = 32;

/// A file as chosen by the user, before it has been opened
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub content: Bytes,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk, naming it after its file name
    pub async fn read(path: impl AsRef<Path>) -> std::result::Result<Self, LoadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match tokio::fs::read(path).await {
            Ok(content) => Ok(Self::new(name, content)),
            Err(source) => Err(LoadError::Io { name, source }),
        }
    }
}

/// Page dimensions in PDF points, unrotated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// A loaded PDF. Immutable once opened.
#[derive(Debug)]
pub struct SourceFile {
    id: SourceId,
    name: String,
    content: Bytes,
    page_sizes: Vec<PageSize>,
}

impl SourceFile {
    /// Open a blob as a PDF, discovering its pages
    pub fn open(blob: FileBlob) -> std::result::Result<Self, LoadError> {
        let FileBlob { name, content } = blob;
        let doc = match Document::load_mem(&content) {
            Ok(doc) => doc,
            Err(source) => return Err(LoadError::Pdf { name, source }),
        };

        let page_sizes: Vec<PageSize> = doc
            .get_pages()
            .values()
            .map(|&page_id| media_box(&doc, page_id).unwrap_or(DEFAULT_PAGE_SIZE))
            .collect();

        if page_sizes.is_empty() {
            return Err(LoadError::NoPages { name });
        }

        Ok(Self {
            id: SourceId::next(),
            name,
            content,
            page_sizes,
        })
    }

    /// Open a blob off the async executor; parsing is CPU-bound
    pub async fn open_blocking(blob: FileBlob) -> std::result::Result<Self, LoadError> {
        tokio::task::spawn_blocking(move || Self::open(blob)).await?
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw file content, shared with any request built from it
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    /// Size of a 1-based page
    pub fn page_size(&self, page_number: u32) -> Option<PageSize> {
        let index = page_number.checked_sub(1)? as usize;
        self.page_sizes.get(index).copied()
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut current = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(obj) = current.get(b"MediaBox") {
            let (_, obj) = doc.dereference(obj).ok()?;
            return rect_size(obj.as_array().ok()?);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn rect_size(rect: &[Object]) -> Option<PageSize> {
    if rect.len() != 4 {
        return None;
    }
    let mut values = [0.0f32; 4];
    for (value, obj) in values.iter_mut().zip(rect) {
        *value = obj.as_float().ok()?;
    }
    let width_pt = (values[2] - values[0]).abs();
    let height_pt = (values[3] - values[1]).abs();
    if width_pt == 0.0 || height_pt == 0.0 {
        return None;
    }
    Some(PageSize {
        width_pt,
        height_pt,
    })
}
