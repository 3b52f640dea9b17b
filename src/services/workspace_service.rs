use crate::dto::quiz_dto::{PhaseName, QuizView, WorkspaceView};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::services::quiz_service::QuizSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[default]
    Pdf,
    Prompt,
}

#[derive(Debug)]
pub enum Phase {
    Idle,
    Parsing { progress: u8 },
    Generating,
    InQuiz(QuizSession),
}

impl Phase {
    fn is_loading(&self) -> bool {
        matches!(self, Phase::Parsing { .. } | Phase::Generating)
    }
}

/// State of one client page: what it is doing, its preferences and the
/// quiz it is running.
#[derive(Debug)]
pub struct Workspace {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub phase: Phase,
    pub source_mode: SourceMode,
    pub dark_mode: bool,
    pub last_error: Option<String>,
    last_seen: Instant,
    epoch: u64,
    countdown: Option<JoinHandle<()>>,
}

impl Workspace {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            phase: Phase::Idle,
            source_mode: SourceMode::default(),
            dark_mode: false,
            last_error: None,
            last_seen: Instant::now(),
            epoch: 0,
            countdown: None,
        }
    }

    fn stop_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    pub fn view(&self) -> WorkspaceView {
        let (phase, parsing_progress, quiz) = match &self.phase {
            Phase::Idle => (PhaseName::Idle, None, None),
            Phase::Parsing { progress } => (PhaseName::Parsing, Some(*progress), None),
            Phase::Generating => (PhaseName::Generating, None, None),
            Phase::InQuiz(session) => (PhaseName::InQuiz, None, Some(QuizView::from_session(session))),
        };

        WorkspaceView {
            id: self.id,
            created_at: self.created_at,
            phase,
            loading: self.phase.is_loading(),
            parsing_progress,
            source_mode: self.source_mode,
            dark_mode: self.dark_mode,
            error: self.last_error.clone(),
            quiz,
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.stop_countdown();
    }
}

/// In-memory registry of workspaces. Guards are never held across `.await`.
#[derive(Clone, Default)]
pub struct WorkspaceStore {
    inner: Arc<Mutex<HashMap<Uuid, Workspace>>>,
}

impl WorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Workspace>> {
        self.inner.lock().expect("workspace store mutex poisoned")
    }

    fn with_workspace<T>(&self, id: Uuid, f: impl FnOnce(&mut Workspace) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let workspace = guard
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Workspace {} not found", id)))?;
        workspace.last_seen = Instant::now();
        f(workspace)
    }

    pub fn create(&self) -> WorkspaceView {
        let workspace = Workspace::new();
        let view = workspace.view();
        tracing::info!("Created workspace {}", workspace.id);
        self.lock().insert(workspace.id, workspace);
        view
    }

    pub fn view(&self, id: Uuid) -> Result<WorkspaceView> {
        self.with_workspace(id, |ws| Ok(ws.view()))
    }

    pub fn update_preferences(
        &self,
        id: Uuid,
        dark_mode: Option<bool>,
        source_mode: Option<SourceMode>,
    ) -> Result<WorkspaceView> {
        self.with_workspace(id, |ws| {
            if let Some(dark) = dark_mode {
                ws.dark_mode = dark;
            }
            if let Some(mode) = source_mode {
                if mode != ws.source_mode {
                    ws.last_error = None;
                }
                ws.source_mode = mode;
            }
            Ok(ws.view())
        })
    }

    /// Stores a user-facing message without changing the phase.
    pub fn record_error(&self, id: Uuid, error: &Error) -> Result<()> {
        self.with_workspace(id, |ws| {
            ws.last_error = Some(client_message(error));
            Ok(())
        })
    }

    /// Moves an idle workspace into parsing (document) or generating
    /// (prompt). Returns the epoch every later step must present.
    pub fn begin_generation(&self, id: Uuid, parsing: bool) -> Result<u64> {
        self.with_workspace(id, |ws| {
            match &ws.phase {
                Phase::Idle => {}
                Phase::InQuiz(session) if session.is_finished() => {}
                Phase::Parsing { .. } | Phase::Generating => return Err(Error::Busy),
                Phase::InQuiz(_) => {
                    return Err(Error::BadRequest(
                        "Restart the current quiz before generating a new one".to_string(),
                    ))
                }
            }

            ws.stop_countdown();
            ws.epoch += 1;
            ws.last_error = None;
            ws.phase = if parsing {
                Phase::Parsing { progress: 0 }
            } else {
                Phase::Generating
            };
            Ok(ws.epoch)
        })
    }

    pub fn set_progress(&self, id: Uuid, epoch: u64, progress: u8) {
        let updated = self.with_workspace(id, |ws| {
            if ws.epoch == epoch {
                if let Phase::Parsing { progress: current } = &mut ws.phase {
                    *current = progress;
                }
            }
            Ok(())
        });
        if updated.is_err() {
            tracing::debug!("Dropping progress {} for missing workspace {}", progress, id);
        }
    }

    /// Parsing finished; the request to the generative service is next.
    /// Returns false when the attempt was abandoned meanwhile.
    pub fn mark_generating(&self, id: Uuid, epoch: u64) -> bool {
        self.with_workspace(id, |ws| {
            let current = ws.epoch == epoch && matches!(ws.phase, Phase::Parsing { .. });
            if current {
                ws.phase = Phase::Generating;
            }
            Ok(current)
        })
        .unwrap_or(false)
    }

    /// Clears the loading state and keeps the message for the client.
    /// Internal failures are reported with the generic generation message.
    pub fn fail_generation(&self, id: Uuid, epoch: u64, error: &Error) {
        let failed = self.with_workspace(id, |ws| {
            if ws.epoch == epoch && ws.phase.is_loading() {
                ws.phase = Phase::Idle;
                ws.last_error = Some(client_message(error));
            }
            Ok(())
        });
        if failed.is_err() {
            tracing::debug!("Dropping failure for missing workspace {}: {}", id, error);
        }
    }

    /// Starts the quiz produced by the attempt `epoch`. Results of an
    /// abandoned attempt are dropped and the current state is returned.
    pub fn install_quiz(
        &self,
        id: Uuid,
        epoch: u64,
        questions: Vec<Question>,
        time_limit_minutes: Option<u32>,
    ) -> Result<WorkspaceView> {
        let session = QuizSession::new(questions, time_limit_minutes)?;
        let timed = session.is_timed();

        self.with_workspace(id, |ws| {
            if ws.epoch != epoch || !matches!(ws.phase, Phase::Generating) {
                tracing::info!("Discarding stale generation result for workspace {}", id);
                return Ok(ws.view());
            }
            ws.phase = Phase::InQuiz(session);
            ws.last_error = None;
            // The timer is replaced under the same guard as its session.
            ws.stop_countdown();
            if timed {
                ws.countdown = Some(self.spawn_countdown(id, epoch));
            }
            Ok(ws.view())
        })
    }

    /// Runs `f` against the active quiz.
    pub fn with_quiz<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut QuizSession) -> Result<T>,
    ) -> Result<WorkspaceView> {
        self.with_workspace(id, |ws| {
            let Phase::InQuiz(session) = &mut ws.phase else {
                return Err(Error::BadRequest("No quiz is in progress".to_string()));
            };
            f(session)?;
            if session.is_finished() {
                ws.stop_countdown();
            }
            Ok(ws.view())
        })
    }

    /// Discards any quiz or pending generation and returns to idle.
    pub fn restart(&self, id: Uuid) -> Result<WorkspaceView> {
        self.with_workspace(id, |ws| {
            ws.stop_countdown();
            ws.epoch += 1;
            ws.phase = Phase::Idle;
            ws.last_error = None;
            tracing::info!("Workspace {} restarted", id);
            Ok(ws.view())
        })
    }

    /// Removes workspaces untouched for at least `ttl`. Workspaces that are
    /// loading or running a countdown are kept. Returns how many were removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|_, ws| {
            ws.phase.is_loading() || ws.countdown.is_some() || ws.last_seen.elapsed() < ttl
        });
        let evicted = before - guard.len();
        if evicted > 0 {
            tracing::info!("Evicted {} idle workspaces", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn dispose(&self, id: Uuid) -> Result<()> {
        match self.lock().remove(&id) {
            Some(_) => {
                tracing::info!("Disposed workspace {}", id);
                Ok(())
            }
            None => Err(Error::NotFound(format!("Workspace {} not found", id))),
        }
    }

    /// Advances the countdown of attempt `epoch` by one second. Returns
    /// whether the countdown should keep running.
    fn tick(&self, id: Uuid, epoch: u64) -> bool {
        let mut guard = self.lock();
        let Some(ws) = guard.get_mut(&id) else {
            return false;
        };
        if ws.epoch != epoch {
            return false;
        }
        let Phase::InQuiz(session) = &mut ws.phase else {
            return false;
        };

        session.tick();
        if session.is_finished() {
            // The task is finishing on its own; dropping the handle detaches it.
            ws.countdown = None;
            return false;
        }
        true
    }

    fn spawn_countdown(&self, id: Uuid, epoch: u64) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if !store.tick(id, epoch) {
                    break;
                }
            }
        })
    }
}

fn client_message(error: &Error) -> String {
    if error.is_user_facing() {
        error.to_string()
    } else {
        Error::GenerationFailed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionKind;

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                kind: QuestionKind::MultipleChoice,
                question: format!("Question {}", i),
                options: vec!["right".into(), "wrong".into()],
                correct_index: 0,
                explanation: String::new(),
            })
            .collect()
    }

    #[test]
    fn second_generation_while_loading_is_busy() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        store.begin_generation(id, true).unwrap();
        assert!(matches!(store.begin_generation(id, false), Err(Error::Busy)));
        assert!(store.view(id).unwrap().loading);
    }

    #[test]
    fn progress_and_failure_update_the_view() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, true).unwrap();

        store.set_progress(id, epoch, 40);
        assert_eq!(store.view(id).unwrap().parsing_progress, Some(40));

        store.fail_generation(id, epoch, &Error::InsufficientText);
        let view = store.view(id).unwrap();
        assert_eq!(view.phase, PhaseName::Idle);
        assert!(!view.loading);
        assert_eq!(view.error, Some(Error::InsufficientText.to_string()));
    }

    #[tokio::test]
    async fn install_then_restart_returns_to_idle() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, false).unwrap();
        let view = store.install_quiz(id, epoch, questions(3), None).unwrap();
        assert_eq!(view.phase, PhaseName::InQuiz);

        for _ in 0..3 {
            store
                .with_quiz(id, |q| {
                    q.select(0)?;
                    q.check();
                    q.next();
                    Ok(())
                })
                .unwrap();
        }
        let finished = store.view(id).unwrap();
        assert_eq!(finished.quiz.unwrap().report.unwrap().score, 3);

        let view = store.restart(id).unwrap();
        assert_eq!(view.phase, PhaseName::Idle);
        assert!(view.quiz.is_none());
    }

    #[test]
    fn only_a_finished_quiz_can_be_replaced() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, false).unwrap();
        store.install_quiz(id, epoch, questions(1), None).unwrap();

        assert!(matches!(
            store.begin_generation(id, false),
            Err(Error::BadRequest(_))
        ));

        store
            .with_quiz(id, |q| {
                q.select(1)?;
                q.check();
                q.next();
                Ok(())
            })
            .unwrap();
        let next_epoch = store.begin_generation(id, true).unwrap();
        assert!(next_epoch > epoch);
        assert_eq!(store.view(id).unwrap().phase, PhaseName::Parsing);
    }

    #[tokio::test]
    async fn restart_during_generation_drops_late_result() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, false).unwrap();
        store.restart(id).unwrap();

        let view = store.install_quiz(id, epoch, questions(2), None).unwrap();
        assert_eq!(view.phase, PhaseName::Idle);
        assert!(view.quiz.is_none());
    }

    #[test]
    fn abandoned_parse_does_not_move_to_generating() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, true).unwrap();
        store.restart(id).unwrap();
        assert!(!store.mark_generating(id, epoch));
        store.dispose(id).unwrap();
        assert!(!store.mark_generating(id, epoch));
    }

    #[test]
    fn quiz_actions_require_a_quiz() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let result = store.with_quiz(id, |q| {
            q.check();
            Ok(())
        });
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn preferences_are_kept_in_memory() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let view = store
            .update_preferences(id, Some(true), Some(SourceMode::Prompt))
            .unwrap();
        assert!(view.dark_mode);
        assert_eq!(view.source_mode, SourceMode::Prompt);
    }

    #[test]
    fn unknown_workspace_is_not_found() {
        let store = WorkspaceStore::new();
        assert!(matches!(store.view(Uuid::new_v4()), Err(Error::NotFound(_))));
        assert!(matches!(store.dispose(Uuid::new_v4()), Err(Error::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_finishes_untouched_quiz_after_one_minute() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, false).unwrap();
        store.install_quiz(id, epoch, questions(3), Some(1)).unwrap();

        tokio::time::sleep(Duration::from_millis(59_500)).await;
        let quiz = store.view(id).unwrap().quiz.unwrap();
        assert!(!quiz.finished);
        assert_eq!(quiz.remaining_seconds, Some(1));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let quiz = store.view(id).unwrap().quiz.unwrap();
        assert!(quiz.finished);
        assert_eq!(quiz.remaining_seconds, Some(0));
        let report = quiz.report.unwrap();
        assert_eq!(report.score, 0);
        assert!(report.answers.iter().all(|a| a.selected_option.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_stops_the_countdown() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, false).unwrap();
        store.install_quiz(id, epoch, questions(1), Some(1)).unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        store.restart(id).unwrap();
        let epoch = store.begin_generation(id, false).unwrap();
        store.install_quiz(id, epoch, questions(1), Some(1)).unwrap();

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        let quiz = store.view(id).unwrap().quiz.unwrap();
        assert_eq!(quiz.remaining_seconds, Some(30));
    }

    #[tokio::test(start_paused = true)]
    async fn late_install_keeps_the_newer_countdown() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let stale = store.begin_generation(id, false).unwrap();
        store.restart(id).unwrap();
        let current = store.begin_generation(id, false).unwrap();
        store.install_quiz(id, current, questions(2), Some(1)).unwrap();

        let view = store.install_quiz(id, stale, questions(2), Some(1)).unwrap();
        assert_eq!(view.quiz.unwrap().remaining_seconds, Some(60));

        tokio::time::sleep(Duration::from_millis(60_500)).await;
        let quiz = store.view(id).unwrap().quiz.unwrap();
        assert!(quiz.finished);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_workspaces_are_evicted() {
        let store = WorkspaceStore::new();
        let abandoned = store.create().id;
        let active = store.create().id;
        let timed = store.create().id;
        let epoch = store.begin_generation(timed, false).unwrap();
        store.install_quiz(timed, epoch, questions(2), Some(180)).unwrap();

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        store.view(active).unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(store.evict_idle(Duration::from_secs(30 * 60)), 1);
        assert!(matches!(store.view(abandoned), Err(Error::NotFound(_))));
        assert!(store.view(active).is_ok());
        assert!(store.view(timed).is_ok());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn internal_failures_are_reported_generically() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, true).unwrap();

        store.fail_generation(id, epoch, &Error::Internal("join error".into()));
        let view = store.view(id).unwrap();
        assert_eq!(view.phase, PhaseName::Idle);
        assert_eq!(view.error, Some(Error::GenerationFailed.to_string()));
    }

    #[test]
    fn updates_for_a_disposed_workspace_are_dropped() {
        let store = WorkspaceStore::new();
        let id = store.create().id;
        let epoch = store.begin_generation(id, true).unwrap();
        store.dispose(id).unwrap();

        store.set_progress(id, epoch, 50);
        store.fail_generation(id, epoch, &Error::InsufficientText);
        assert!(store.is_empty());
    }
}
