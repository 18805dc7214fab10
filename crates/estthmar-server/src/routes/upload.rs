//! PDF upload and ingestion.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use super::{run_blocking, AppError};
use crate::state::AppState;
use estthmar_core::Error;
use estthmar_ingest::Ingester;

/// Multipart field carrying the PDF.
const FILE_FIELD: &str = "file";
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const UPLOAD_STATUS: &str = "Successfully Uploaded";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/upload_pdf/",
        post(upload_pdf).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
    )
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub filename: String,
    /// Pages extracted from the PDF.
    pub doc_len: usize,
    /// Chunks written to the index.
    pub chunks: usize,
}

/// POST /api/upload_pdf/: save the file under `Documents/`, then chunk,
/// embed and index it.
async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Http(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = sanitize_filename(field.file_name().unwrap_or_default());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("Read failed: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        Error::Ingest(format!("multipart field `{}` is missing", FILE_FIELD))
    })?;
    let save_path = state.config.data_paths.documents.join(&filename);
    info!("Received {} ({} bytes)", filename, bytes.len());

    let ingest_state = state.clone();
    let report = run_blocking(move || {
        std::fs::write(&save_path, &bytes)?;
        Ingester::new(
            &ingest_state.store,
            ingest_state.embedder.as_ref(),
            ingest_state.config.chunking,
        )
        .ingest_pdf(&save_path)
    })
    .await?;

    Ok(Json(UploadResponse {
        status: UPLOAD_STATUS,
        filename,
        doc_len: report.pages,
        chunks: report.chunks,
    }))
}

/// Reduce a client-supplied name to its final path component.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default()
        .trim();

    match base {
        "" | "." | ".." => "upload.pdf".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("plan.pdf"), "plan.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\plan v2.pdf"), "plan v2.pdf");
        assert_eq!(sanitize_filename("dir/.."), "upload.pdf");
        assert_eq!(sanitize_filename(""), "upload.pdf");
    }
}
