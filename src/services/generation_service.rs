use crate::dto::quiz_dto::WorkspaceView;
use crate::error::{Error, Result};
use crate::models::content_source::ContentSource;
use crate::services::ai_service::AIService;
use crate::services::extractor_service::ExtractorService;
use crate::services::prompt_service::QuestionCount;
use crate::services::workspace_service::WorkspaceStore;
use bytes::Bytes;
use uuid::Uuid;

pub const MIN_PROMPT_CHARS: usize = 10;

#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub count: QuestionCount,
    pub time_limit_minutes: Option<u32>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: Option<String>,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Settles an attempt whose request future is dropped before it finishes,
/// e.g. when the client disconnects. A no-op once the attempt installed a
/// quiz, failed, or was superseded.
struct AttemptGuard {
    workspaces: WorkspaceStore,
    id: Uuid,
    epoch: u64,
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.workspaces
            .fail_generation(self.id, self.epoch, &Error::GenerationFailed);
    }
}

/// Drives one attempt from source material to a running quiz.
#[derive(Clone)]
pub struct GenerationService {
    ai_service: AIService,
    extractor: ExtractorService,
    workspaces: WorkspaceStore,
}

impl GenerationService {
    pub fn new(ai_service: AIService, extractor: ExtractorService, workspaces: WorkspaceStore) -> Self {
        Self {
            ai_service,
            extractor,
            workspaces,
        }
    }

    pub async fn from_prompt(
        &self,
        id: Uuid,
        prompt: String,
        settings: QuizSettings,
    ) -> Result<WorkspaceView> {
        if prompt.trim().chars().count() < MIN_PROMPT_CHARS {
            let err = Error::PromptTooShort;
            self.workspaces.record_error(id, &err)?;
            return Err(err);
        }

        let epoch = self.workspaces.begin_generation(id, false)?;
        let _guard = self.guard(id, epoch);
        let source = ContentSource::prompt(prompt, settings.note.clone());
        self.generate(id, epoch, source, &settings).await
    }

    pub async fn from_document(
        &self,
        id: Uuid,
        upload: DocumentUpload,
        settings: QuizSettings,
    ) -> Result<WorkspaceView> {
        let epoch = self.workspaces.begin_generation(id, true)?;
        let _guard = self.guard(id, epoch);
        tracing::info!(
            "Workspace {} parsing {:?} ({} bytes, {})",
            id,
            upload.file_name,
            upload.bytes.len(),
            upload.mime_type
        );

        let text = match self.extract(id, epoch, upload).await {
            Ok(text) => text,
            Err(e) => {
                self.workspaces.fail_generation(id, epoch, &e);
                return Err(e);
            }
        };

        if !self.workspaces.mark_generating(id, epoch) {
            tracing::info!("Workspace {} abandoned the attempt during parsing", id);
            return self.workspaces.view(id);
        }

        let source = ContentSource::text(text, settings.note.clone());
        self.generate(id, epoch, source, &settings).await
    }

    fn guard(&self, id: Uuid, epoch: u64) -> AttemptGuard {
        AttemptGuard {
            workspaces: self.workspaces.clone(),
            id,
            epoch,
        }
    }

    async fn extract(&self, id: Uuid, epoch: u64, upload: DocumentUpload) -> Result<String> {
        let extractor = self.extractor.clone();
        let store = self.workspaces.clone();

        tokio::task::spawn_blocking(move || {
            extractor.extract_document(&upload.mime_type, &upload.bytes, |progress| {
                store.set_progress(id, epoch, progress)
            })
        })
        .await
        .map_err(|e| Error::FileReadFailure(format!("extraction was interrupted: {}", e)))?
    }

    async fn generate(
        &self,
        id: Uuid,
        epoch: u64,
        source: ContentSource,
        settings: &QuizSettings,
    ) -> Result<WorkspaceView> {
        match self.ai_service.generate_quiz(&source, settings.count).await {
            Ok(questions) => {
                self.workspaces
                    .install_quiz(id, epoch, questions, settings.time_limit_minutes)
            }
            Err(e) => {
                self.workspaces.fail_generation(id, epoch, &e);
                Err(e)
            }
        }
    }
}
