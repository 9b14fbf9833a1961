use std::path::Path;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use standard_error::{Interpolate, StandardError, Status};

use crate::conf::settings;
use crate::pkg::internal::ai::generate::{self, GenerateOps};
use crate::pkg::internal::ai::prompt;
use crate::pkg::internal::ai::read;
use crate::pkg::internal::ai::repair;
use crate::pkg::internal::ai::spec::ParseResponse;
use crate::pkg::internal::retry::{with_retries, Backoff};
use crate::pkg::server::state::AppState;
use crate::prelude::Result;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "image/jpeg",
    "image/png",
    "image/webp",
];

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "jpg", "jpeg", "png", "webp"];

const RAW_EXCERPT_CHARS: usize = 200;

enum ModelPayload {
    Text(String),
    Inline { mime_type: String, data: Vec<u8> },
}

// Once a file passes the allow-list the caller always gets something
// actionable back: extracted fields when the model cooperates, otherwise a
// success-shaped fallback pointing at manual entry. Only bad input, missing
// configuration and rejected credentials surface as error statuses.
pub async fn parse(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        StandardError::new("ERR-UPLOAD-001")
            .interpolate_err(e.to_string())
            .code(StatusCode::BAD_REQUEST)
    })? {
        match field.name().unwrap_or("") {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    StandardError::new("ERR-UPLOAD-001")
                        .interpolate_err(e.to_string())
                        .code(StatusCode::BAD_REQUEST)
                })?;
                upload = Some((file_name, content_type, data.to_vec()));
            }
            _ => {
                let _ = field.bytes().await.map_err(|e| {
                    StandardError::new("ERR-UPLOAD-001")
                        .interpolate_err(e.to_string())
                        .code(StatusCode::BAD_REQUEST)
                })?;
            }
        }
    }
    let (file_name, content_type, data) = upload
        .ok_or_else(|| StandardError::new("ERR-UPLOAD-004").code(StatusCode::BAD_REQUEST))?;

    if !is_allowed(&content_type, &file_name) {
        return Err(StandardError::new("ERR-UPLOAD-002").code(StatusCode::BAD_REQUEST));
    }
    if data.len() > settings.max_upload_bytes {
        return Err(StandardError::new("ERR-UPLOAD-003").code(StatusCode::BAD_REQUEST));
    }
    if settings.ai_key.is_empty() {
        return Err(StandardError::new("ERR-CONF-001"));
    }
    tracing::debug!(
        "processing {} ({}, {} bytes)",
        &file_name,
        &content_type,
        data.len()
    );

    let mime = effective_mime(&content_type, &file_name);
    let mut extraction_method: Option<&str> = None;
    let payload = if mime.starts_with("image/") || mime == "application/pdf" {
        ModelPayload::Inline {
            mime_type: mime,
            data,
        }
    } else if mime == "text/plain" {
        ModelPayload::Text(String::from_utf8_lossy(&data).into_owned())
    } else {
        match read::extract_document(&data) {
            Some(extracted) => {
                extraction_method = Some(extracted.method.as_str());
                ModelPayload::Text(extracted.text)
            }
            None => {
                tracing::warn!("no readable text recovered from {}", &file_name);
                return Ok((
                    StatusCode::OK,
                    Json(ParseResponse::manual_entry(
                        &file_name,
                        "We couldn't read this document automatically. Your file was uploaded; \
                         please fill in the form manually.",
                    )),
                ));
            }
        }
    };

    let prompt_text = match &payload {
        ModelPayload::Text(text) => prompt::for_resume_text(text),
        ModelPayload::Inline { .. } => prompt::for_inline_document(),
    };

    let ai_client = &state.ai_client;
    let payload = &payload;
    let prompt_text = prompt_text.as_str();
    let reply = with_retries(Backoff::from_settings(), generate::is_transient, || {
        async move {
            match payload {
                ModelPayload::Text(_) => ai_client.structured_query(prompt_text).await,
                ModelPayload::Inline { mime_type, data } => {
                    ai_client
                        .structured_query_inline(prompt_text, mime_type, data)
                        .await
                }
            }
        }
    })
    .await;

    let response = match reply {
        Ok(raw_reply) => match repair::parse_profile(&raw_reply) {
            Ok(profile) => {
                tracing::debug!("model extraction complete for {}", &file_name);
                (
                    StatusCode::OK,
                    Json(ParseResponse::extracted(
                        &file_name,
                        profile,
                        extraction_method,
                    )),
                )
            }
            Err(parse_err) => {
                tracing::error!("model reply was not parseable json: {}", &parse_err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ParseResponse::parse_failure(
                        &file_name,
                        &excerpt(&raw_reply),
                    )),
                )
            }
        },
        Err(err) if generate::is_bad_credential(&err) => {
            return Err(StandardError::new("ERR-AI-401")
                .interpolate_err(err.message)
                .code(StatusCode::UNAUTHORIZED));
        }
        Err(err) if generate::is_transient(&err) => {
            tracing::warn!("model unavailable after retries: {}", &err.message);
            (
                StatusCode::OK,
                Json(ParseResponse::overloaded(
                    &file_name,
                    generate::is_quota(&err),
                )),
            )
        }
        Err(err) => {
            tracing::error!("model call failed: {}", &err.message);
            (StatusCode::OK, Json(ParseResponse::degraded(&file_name)))
        }
    };
    Ok(response)
}

fn is_allowed(content_type: &str, file_name: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&content_type)
        || ALLOWED_EXTENSIONS.contains(&extension(file_name).as_str())
}

fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// Browsers regularly send octet-stream for anything dragged into an input;
// fall back to the extension in that case.
fn effective_mime(content_type: &str, file_name: &str) -> String {
    if !content_type.is_empty() && content_type != "application/octet-stream" {
        return content_type.into();
    }
    match extension(file_name).as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
    .into()
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(RAW_EXCERPT_CHARS).collect()
}
