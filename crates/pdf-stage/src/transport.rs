//! Delivery of encoded submissions to the remote service

use crate::options::ServiceOptions;
use crate::progress::UploadProgress;
use crate::protocol::{FormField, WireForm};
use crate::types::*;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use std::future::Future;

const USER_AGENT: &str = concat!("pdf-stage/", env!("CARGO_PKG_VERSION"));

/// Size of the slices field content is streamed in; progress advances per slice
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Sends a multipart body and returns the response artifact bytes
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        operation: Operation,
        form: WireForm,
        progress: UploadProgress,
    ) -> impl Future<Output = std::result::Result<Bytes, TransportError>> + Send;
}

/// `reqwest` transport posting to the configured endpoints
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    options: ServiceOptions,
}

impl HttpTransport {
    pub fn new(options: ServiceOptions) -> Result<Self> {
        options.validate()?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client, options })
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        operation: Operation,
        form: WireForm,
        progress: UploadProgress,
    ) -> std::result::Result<Bytes, TransportError> {
        let url = self.options.endpoint(operation);
        progress.set_total(form.upload_size());
        let multipart = build_multipart(form, &progress)?;

        log::info!("POST {} ({})", url, operation);
        let response = self.client.post(&url).multipart(multipart).send().await?;
        progress.complete();

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            log::warn!("{} request failed with {}", operation, status);
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let bytes = response.bytes().await?;
        log::debug!("Received {} byte artifact", bytes.len());
        Ok(bytes)
    }
}

fn build_multipart(
    form: WireForm,
    progress: &UploadProgress,
) -> std::result::Result<Form, TransportError> {
    let mut multipart = Form::new();
    for field in form.fields {
        multipart = match field {
            FormField::Text { name, value } => {
                multipart.part(name, tracked_part(Bytes::from(value), progress.clone()))
            }
            FormField::File {
                name,
                filename,
                mime,
                content,
            } => {
                let part = tracked_part(content, progress.clone())
                    .file_name(filename)
                    .mime_str(mime)?;
                multipart.part(name, part)
            }
        };
    }
    Ok(multipart)
}

/// Stream `content` in slices, counting each slice as it is pulled by the
/// connection
fn tracked_part(content: Bytes, progress: UploadProgress) -> Part {
    let length = content.len();
    let chunks: Vec<Bytes> = (0..length)
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| content.slice(start..(start + UPLOAD_CHUNK_SIZE).min(length)))
        .collect();

    let stream = futures::stream::iter(chunks).map(move |chunk| {
        progress.advance(chunk.len() as u64);
        Ok::<_, std::io::Error>(chunk)
    });

    Part::stream_with_length(reqwest::Body::wrap_stream(stream), length as u64)
}
