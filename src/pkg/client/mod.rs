use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use standard_error::{Interpolate, StandardError};
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::pkg::internal::ai::spec::ParseResponse;
use crate::prelude::Result;

const PROGRESS_TICK: Duration = Duration::from_millis(200);
const PROGRESS_STEP: u8 = 10;
const PROGRESS_CEILING: u8 = 90;

pub struct ResumeFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

// Progress is a local animation keyed by filename, not transfer telemetry:
// it climbs while the request is outstanding, holds at 90 and jumps to 100
// when the response lands.
#[derive(Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    endpoint: String,
    progress: Arc<RwLock<HashMap<String, u8>>>,
}

impl UploadClient {
    pub fn new(endpoint: &str) -> Self {
        UploadClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            progress: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn progress_for(&self, file_name: &str) -> Option<u8> {
        self.progress.read().await.get(file_name).copied()
    }

    pub async fn upload_resume(&self, file: ResumeFile) -> Result<ParseResponse> {
        self.set_progress(&file.name, 0).await;
        let ticker = tokio::spawn(advance_progress(self.progress.clone(), file.name.clone()));
        let outcome = self.post_file(&file).await;
        ticker.abort();
        self.set_progress(&file.name, 100).await;
        outcome
    }

    /// One concurrent request per file, each with its own progress entry. The
    /// result list is ordered by input index; a failed file becomes a captured
    /// error element and never aborts the batch.
    pub async fn upload_resumes(&self, files: Vec<ResumeFile>) -> Vec<ParseResponse> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let mut set = JoinSet::new();
        for (index, file) in files.into_iter().enumerate() {
            let client = self.clone();
            set.spawn(async move {
                let name = file.name.clone();
                let outcome = match client.upload_resume(file).await {
                    Ok(result) => result,
                    Err(err) => {
                        tracing::warn!("upload of {} failed: {}", &name, &err.message);
                        ParseResponse::failed(&name, err.message)
                    }
                };
                (index, outcome)
            });
        }
        let mut slots: Vec<Option<ParseResponse>> = names.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            if let Ok((index, outcome)) = joined {
                slots[index] = Some(outcome);
            }
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    ParseResponse::failed(&names[index], "upload task failed".into())
                })
            })
            .collect()
    }

    async fn post_file(&self, file: &ResumeFile) -> Result<ParseResponse> {
        let part = Part::bytes(file.data.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = Form::new().part("file", part);
        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| StandardError::new("ERR-CLIENT-002").interpolate_err(e.to_string()));
        }
        // parse failures come back non-2xx but still carry a marked result
        // body; resolve those to a manual-entry fallback instead of raising
        if let Ok(fallback) = serde_json::from_str::<ParseResponse>(&body) {
            if fallback.parse_error.unwrap_or(false) {
                return Ok(ParseResponse::manual_entry(
                    &file.name,
                    fallback.message.as_deref().unwrap_or(
                        "Automatic extraction failed. Please fill in the form manually.",
                    ),
                ));
            }
        }
        Err(StandardError::new("ERR-CLIENT-001").interpolate_err(format!(
            "{}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )))
    }

    async fn set_progress(&self, file_name: &str, value: u8) {
        self.progress.write().await.insert(file_name.into(), value);
    }
}

async fn advance_progress(progress: Arc<RwLock<HashMap<String, u8>>>, file_name: String) {
    let mut ticker = tokio::time::interval(PROGRESS_TICK);
    loop {
        ticker.tick().await;
        let mut map = progress.write().await;
        match map.get_mut(&file_name) {
            Some(value) if *value < PROGRESS_CEILING => {
                *value = (*value + PROGRESS_STEP).min(PROGRESS_CEILING);
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::internal::ai::spec::{ParseResponse, ResumeProfile};
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    // Loopback stand-in for the parse endpoint: replies per filename so the
    // client paths (success, transport failure, marked parse failure) can be
    // driven without a model.
    async fn stub_parse(mut multipart: Multipart) -> (StatusCode, Json<ParseResponse>) {
        let mut name = String::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            name = field.file_name().unwrap_or("").to_string();
            let _ = field.bytes().await.unwrap();
        }
        if name.contains("broken") {
            return (
                StatusCode::BAD_GATEWAY,
                Json(ParseResponse::failed(&name, "upstream exploded".into())),
            );
        }
        if name.contains("unparsable") {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ParseResponse::parse_failure(&name, "Sorry, I cannot")),
            );
        }
        let profile = ResumeProfile {
            name: Some(name.clone()),
            skills: vec!["Rust".into()],
            ..ResumeProfile::default()
        };
        (
            StatusCode::OK,
            Json(ParseResponse::extracted(&name, profile, Some("raw-text"))),
        )
    }

    async fn spawn_stub_server() -> String {
        let app = Router::new().route("/resumes/parse", post(stub_parse));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/resumes/parse", addr)
    }

    fn text_file(name: &str) -> ResumeFile {
        ResumeFile {
            name: name.into(),
            mime_type: "text/plain".into(),
            data: b"Jane Doe, engineer".to_vec(),
        }
    }

    #[tokio::test]
    async fn single_upload_resolves_with_extracted_data_and_full_progress() {
        let endpoint = spawn_stub_server().await;
        let client = UploadClient::new(&endpoint);
        let result = client.upload_resume(text_file("jane.txt")).await.unwrap();
        assert!(result.success);
        assert!(result.ai_processed);
        assert_eq!(result.extracted_data.name.as_deref(), Some("jane.txt"));
        assert_eq!(client.progress_for("jane.txt").await, Some(100));
    }

    #[tokio::test]
    async fn transport_failures_raise_for_single_uploads() {
        let endpoint = spawn_stub_server().await;
        let client = UploadClient::new(&endpoint);
        let err = client
            .upload_resume(text_file("broken.txt"))
            .await
            .unwrap_err();
        assert!(err.message.contains("502"));
        // the attempt still finishes its progress entry
        assert_eq!(client.progress_for("broken.txt").await, Some(100));
    }

    #[tokio::test]
    async fn marked_parse_failures_resolve_to_a_manual_entry_fallback() {
        let endpoint = spawn_stub_server().await;
        let client = UploadClient::new(&endpoint);
        let result = client
            .upload_resume(text_file("unparsable.txt"))
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.ai_processed);
        assert_eq!(result.parse_error, Some(true));
        assert!(result.extracted_data.skills.is_empty());
    }

    #[tokio::test]
    async fn batch_results_keep_input_order_and_capture_the_failing_file() {
        let endpoint = spawn_stub_server().await;
        let client = UploadClient::new(&endpoint);
        let results = client
            .upload_resumes(vec![
                text_file("first.txt"),
                text_file("broken.txt"),
                text_file("third.txt"),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].file_name, "first.txt");
        assert!(results[0].success);
        assert_eq!(results[0].extracted_data.name.as_deref(), Some("first.txt"));
        assert_eq!(results[1].file_name, "broken.txt");
        assert!(!results[1].success);
        assert!(results[1].message.as_deref().unwrap().contains("502"));
        assert_eq!(results[2].file_name, "third.txt");
        assert!(results[2].success);
        assert_eq!(results[2].extracted_data.name.as_deref(), Some("third.txt"));
    }
}
