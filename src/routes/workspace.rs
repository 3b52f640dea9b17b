use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use uuid::Uuid;
use validator::Validate;

use crate::dto::quiz_dto::{
    DocumentSettings, GenerateFromPromptRequest, SelectOptionRequest, UpdatePreferencesRequest,
    WorkspaceView,
};
use crate::error::{Error, Result};
use crate::services::generation_service::{DocumentUpload, QuizSettings};
use crate::services::prompt_service::QuestionCount;
use crate::AppState;

const DEFAULT_QUESTION_COUNT: u32 = 5;

#[axum::debug_handler]
pub async fn create_workspace(State(state): State<AppState>) -> Response {
    let view = state.workspaces.create();
    (StatusCode::CREATED, Json(view)).into_response()
}

#[axum::debug_handler]
pub async fn get_workspace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceView>> {
    Ok(Json(state.workspaces.view(id)?))
}

#[axum::debug_handler]
pub async fn delete_workspace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.workspaces.dispose(id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn update_preferences(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> Result<Json<WorkspaceView>> {
    let view = state
        .workspaces
        .update_preferences(id, req.dark_mode, req.source_mode)?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn generate_from_prompt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<GenerateFromPromptRequest>,
) -> Result<Json<WorkspaceView>> {
    req.validate()?;
    let settings = QuizSettings {
        count: QuestionCount::try_from(req.count)?,
        time_limit_minutes: req.time_limit_minutes,
        note: req.note,
    };

    let view = state
        .generation_service
        .from_prompt(id, req.prompt, settings)
        .await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<WorkspaceView>> {
    let mut upload: Option<DocumentUpload> = None;
    let mut settings = DocumentSettings::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes: Bytes = field.bytes().await.map_err(|e| {
                    tracing::warn!("Failed to read uploaded file: {:?}", e);
                    Error::FileReadFailure("the upload was interrupted or too large".to_string())
                })?;
                upload = Some(DocumentUpload {
                    file_name,
                    mime_type,
                    bytes,
                });
            }
            "count" => settings.count = parse_field(&field.text().await?, "count")?,
            "time_limit_minutes" => {
                settings.time_limit_minutes = parse_field(&field.text().await?, "time_limit_minutes")?
            }
            "note" => {
                let note = field.text().await?;
                settings.note = Some(note).filter(|n| !n.trim().is_empty());
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    settings.validate()?;
    let upload = upload.ok_or_else(|| Error::BadRequest("Missing 'file' field".to_string()))?;
    let settings = QuizSettings {
        count: QuestionCount::try_from(settings.count.unwrap_or(DEFAULT_QUESTION_COUNT))?,
        time_limit_minutes: settings.time_limit_minutes,
        note: settings.note,
    };

    let view = state
        .generation_service
        .from_document(id, upload, settings)
        .await?;
    Ok(Json(view))
}

fn parse_field(raw: &str, name: &str) -> Result<Option<u32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| Error::BadRequest(format!("Field '{}' must be a whole number", name)))
}

#[axum::debug_handler]
pub async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectOptionRequest>,
) -> Result<Json<WorkspaceView>> {
    let view = state.workspaces.with_quiz(id, |quiz| quiz.select(req.option))?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn check_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceView>> {
    let view = state.workspaces.with_quiz(id, |quiz| Ok(quiz.check()))?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn next_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceView>> {
    let view = state.workspaces.with_quiz(id, |quiz| Ok(quiz.next()))?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceView>> {
    Ok(Json(state.workspaces.restart(id)?))
}
