//! Submit and poll handlers.

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use vdesc_models::TaskId;
use vdesc_worker::VideoSource;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const MISSING_SOURCE: &str = "Either video file or file_url must be provided";
pub const MISSING_APP_NAME: &str = "app_name is required";

/// Fields of the multipart submission form.
#[derive(Debug, Default, Validate)]
pub struct SubmissionForm {
    #[validate(url(message = "Invalid file_url"))]
    pub file_url: Option<String>,
    #[validate(
        required(message = "app_name is required"),
        length(max = 128, message = "app_name must be at most 128 characters")
    )]
    pub app_name: Option<String>,
    pub video: Option<UploadedVideo>,
}

#[derive(Debug)]
pub struct UploadedVideo {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
}

impl SubmissionForm {
    /// Read the `video`, `file_url` and `app_name` parts; unknown parts are skipped.
    pub async fn from_multipart(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("video") => {
                    let filename = field.file_name().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
                    form.video = Some(UploadedVideo {
                        bytes: bytes.to_vec(),
                        filename,
                    });
                }
                Some("file_url") => form.file_url = non_empty_text(field).await?,
                Some("app_name") => form.app_name = non_empty_text(field).await?,
                other => warn!(field = ?other, "Ignoring unexpected form field"),
            }
        }

        Ok(form)
    }

    /// Validated video source and app name. A URL wins over an upload.
    pub fn into_source(self) -> ApiResult<(VideoSource, String)> {
        if let Err(errors) = self.validate() {
            let message = errors
                .field_errors()
                .into_values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| errors.to_string());
            return Err(ApiError::validation(message));
        }

        let Some(app_name) = self.app_name else {
            return Err(ApiError::validation(MISSING_APP_NAME));
        };

        let source = match (self.file_url, self.video) {
            (Some(url), _) => VideoSource::Url(url),
            (None, Some(video)) => VideoSource::Upload {
                bytes: video.bytes,
                filename: video.filename,
            },
            (None, None) => return Err(ApiError::validation(MISSING_SOURCE)),
        };

        Ok((source, app_name))
    }
}

async fn non_empty_text(field: Field<'_>) -> ApiResult<Option<String>> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed form field: {e}")))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
    pub task_id: TaskId,
}

/// Accept a video upload or URL and start analysis in the background.
pub async fn analyze_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    let form = SubmissionForm::from_multipart(multipart).await?;
    let (source, app_name) = form.into_source()?;

    let task_id = state.pipeline.submit(source, Some(&app_name)).await?;
    info!(task_id = %task_id, app_name = %app_name, "Video analysis started");

    Ok(Json(SubmitResponse {
        message: "Video analysis started.".to_string(),
        task_id,
    }))
}

/// Stored result, live progress, or 404 for an unknown task id.
pub async fn analysis_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    let task_id = TaskId::from_string(task_id);
    let response = state.pipeline.poll(&task_id).await;

    if response.is_unknown() {
        return (StatusCode::NOT_FOUND, Json(response)).into_response();
    }
    Json(response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(bytes: &[u8]) -> Option<UploadedVideo> {
        Some(UploadedVideo {
            bytes: bytes.to_vec(),
            filename: Some("clip.mp4".to_string()),
        })
    }

    fn named(app_name: &str) -> Option<String> {
        Some(app_name.to_string())
    }

    #[test]
    fn test_missing_source_rejected() {
        let form = SubmissionForm {
            app_name: named("demo"),
            ..Default::default()
        };
        let err = form.into_source().unwrap_err();
        assert_eq!(err.to_string(), MISSING_SOURCE);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_url_wins_over_upload() {
        let form = SubmissionForm {
            file_url: Some("https://cdn.example.com/v.mp4".to_string()),
            app_name: named("demo"),
            video: upload(b"bytes"),
        };
        let (source, app_name) = form.into_source().unwrap();
        assert!(matches!(source, VideoSource::Url(ref u) if u == "https://cdn.example.com/v.mp4"));
        assert_eq!(app_name, "demo");
    }

    #[test]
    fn test_upload_passed_through() {
        let form = SubmissionForm {
            app_name: named("demo"),
            video: upload(b"bytes"),
            ..Default::default()
        };
        let (source, _) = form.into_source().unwrap();
        match source {
            VideoSource::Upload { bytes, filename } => {
                assert_eq!(bytes, b"bytes");
                assert_eq!(filename.as_deref(), Some("clip.mp4"));
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_invalid_url_rejected() {
        let form = SubmissionForm {
            file_url: Some("not a url".to_string()),
            app_name: named("demo"),
            ..Default::default()
        };
        let err = form.into_source().unwrap_err();
        assert_eq!(err.to_string(), "Invalid file_url");
    }

    #[test]
    fn test_long_app_name_rejected() {
        let form = SubmissionForm {
            app_name: Some("x".repeat(200)),
            video: upload(b"bytes"),
            ..Default::default()
        };
        assert_eq!(form.into_source().unwrap_err().status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_app_name_rejected() {
        let form = SubmissionForm {
            video: upload(b"bytes"),
            ..Default::default()
        };
        let err = form.into_source().unwrap_err();
        assert_eq!(err.to_string(), MISSING_APP_NAME);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
