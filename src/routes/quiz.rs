use axum::{extract::State, response::Json};

use crate::dto::quiz_dto::{QuizOptionsResponse, MAX_TIME_LIMIT_MINUTES};
use crate::services::extractor_service::{MIN_EXTRACTED_CHARS, PDF_MIME_TYPE};
use crate::services::generation_service::MIN_PROMPT_CHARS;
use crate::services::prompt_service::{LARGE_QUESTION_COUNT, QUESTION_COUNTS};
use crate::AppState;

/// Settings a client needs to render the source form.
#[axum::debug_handler]
pub async fn get_quiz_options(State(state): State<AppState>) -> Json<QuizOptionsResponse> {
    Json(QuizOptionsResponse {
        question_counts: QUESTION_COUNTS.to_vec(),
        default_count: QUESTION_COUNTS[0],
        slow_count_threshold: LARGE_QUESTION_COUNT,
        accepted_mime_type: PDF_MIME_TYPE.to_string(),
        min_prompt_chars: MIN_PROMPT_CHARS,
        min_document_chars: MIN_EXTRACTED_CHARS,
        max_time_limit_minutes: MAX_TIME_LIMIT_MINUTES,
        max_upload_bytes: state.max_upload_bytes,
    })
}
