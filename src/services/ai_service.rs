use crate::error::{Error, Result};
use crate::models::content_source::ContentSource;
use crate::models::question::{GroupType, Question, QuestionGroup, QuestionKind, RawQuestion};
use crate::services::prompt_service::{GenerationRequest, PromptService, QuestionCount};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// The generative service that turns an instruction into question groups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Returns the raw JSON text the service produced.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url,
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let payload = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": request.instruction }] }
            ],
            "generationConfig": {
                "temperature": request.temperature,
                "responseMimeType": "application/json",
                "responseSchema": request.response_schema
            }
        });

        tracing::info!("Sending generation request to {} (strategy: {})", self.model, request.strategy);
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini API Error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;
        candidate_text(&body).ok_or_else(|| anyhow::anyhow!("Invalid Gemini response format").into())
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(body: &JsonValue) -> Option<String> {
    let parts = body
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Clone)]
pub struct AIService {
    backend: Arc<dyn GenerativeBackend>,
    prompts: PromptService,
}

impl AIService {
    pub fn new(backend: Arc<dyn GenerativeBackend>, prompts: PromptService) -> Self {
        Self { backend, prompts }
    }

    /// Generates a ready-to-run question list. Every failure along the way
    /// collapses into `Error::GenerationFailed`.
    pub async fn generate_quiz(
        &self,
        source: &ContentSource,
        count: QuestionCount,
    ) -> Result<Vec<Question>> {
        let request = {
            let mut rng = rand::thread_rng();
            self.prompts.build(source, count, &mut rng)
        };

        let outcome = match self.backend.generate(&request).await {
            Ok(raw) => {
                let mut rng = rand::thread_rng();
                process_response(&raw, &mut rng)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(questions) => {
                if questions.len() != count.get() as usize {
                    tracing::warn!(
                        "Requested {} questions, backend produced {}",
                        count.get(),
                        questions.len()
                    );
                }
                tracing::info!("Generated {} questions", questions.len());
                Ok(questions)
            }
            Err(e) => {
                tracing::error!("Quiz generation error: {:?}", e);
                Err(Error::GenerationFailed)
            }
        }
    }
}

/// Parses the backend's JSON, flattens the groups and shuffles each
/// question's options.
pub fn process_response<R: Rng + ?Sized>(raw: &str, rng: &mut R) -> Result<Vec<Question>> {
    let groups: Vec<QuestionGroup> = serde_json::from_str(raw)?;
    let mut questions = flatten_groups(groups)?;
    if questions.is_empty() {
        return Err(anyhow::anyhow!("Response contained no questions").into());
    }

    for q in &mut questions {
        let options = std::mem::take(&mut q.options);
        let (options, correct_index) = shuffle_options(options, q.correct_index, rng);
        q.options = options;
        q.correct_index = correct_index;
    }

    Ok(questions)
}

/// Flattens groups into questions in group order, then question order.
/// Reading groups hand their passage to every question they contain.
pub fn flatten_groups(groups: Vec<QuestionGroup>) -> Result<Vec<Question>> {
    let mut questions = Vec::new();

    for (group_idx, group) in groups.into_iter().enumerate() {
        let kind = match group.group_type {
            GroupType::Single => QuestionKind::MultipleChoice,
            GroupType::Reading => match group.passage {
                Some(passage) if !passage.trim().is_empty() => QuestionKind::Reading { passage },
                _ => {
                    return Err(anyhow::anyhow!(
                        "Reading group {} has no passage",
                        group_idx
                    )
                    .into())
                }
            },
        };

        for raw in group.questions {
            questions.push(validate_question(raw, kind.clone(), group_idx)?);
        }
    }

    Ok(questions)
}

fn validate_question(raw: RawQuestion, kind: QuestionKind, group_idx: usize) -> Result<Question> {
    if raw.options.len() < 2 {
        return Err(anyhow::anyhow!(
            "Question in group {} has {} options",
            group_idx,
            raw.options.len()
        )
        .into());
    }

    let correct_index = usize::try_from(raw.correct_index)
        .ok()
        .filter(|idx| *idx < raw.options.len())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Question in group {} has correctIndex {} for {} options",
                group_idx,
                raw.correct_index,
                raw.options.len()
            )
        })?;

    Ok(Question {
        kind,
        question: raw.question,
        options: raw.options,
        correct_index,
        explanation: raw.explanation,
    })
}

/// Fisher-Yates shuffle of the options. The returned index points at the
/// option that was correct before shuffling; duplicates are tracked by
/// position, not by value.
pub fn shuffle_options<R: Rng + ?Sized>(
    options: Vec<String>,
    correct_index: usize,
    rng: &mut R,
) -> (Vec<String>, usize) {
    let mut order: Vec<usize> = (0..options.len()).collect();
    order.shuffle(rng);

    let new_correct = order
        .iter()
        .position(|&original| original == correct_index)
        .unwrap_or(correct_index);

    let mut slots: Vec<Option<String>> = options.into_iter().map(Some).collect();
    let shuffled = order
        .iter()
        .filter_map(|&original| slots[original].take())
        .collect();

    (shuffled, new_correct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prompt_service::SamplingPolicy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const MIXED: &str = r#"[
        {"type":"single","questions":[
            {"question":"2+2?","options":["3","4","5","6"],"correctIndex":1,"explanation":"math"},
            {"question":"Capital of France?","options":["Paris","Rome"],"correctIndex":0,"explanation":"geo"}
        ]},
        {"type":"reading","passage":"Taro went to school.","questions":[
            {"question":"Where did Taro go?","options":["home","school","park"],"correctIndex":1,"explanation":"line 1"}
        ]}
    ]"#;

    fn prompts() -> PromptService {
        PromptService::new(1000, SamplingPolicy::Truncate, "English".into(), 0.9)
    }

    fn count(n: u32) -> QuestionCount {
        QuestionCount::try_from(n).unwrap()
    }

    #[test]
    fn flattening_preserves_group_order_and_kinds() {
        let groups: Vec<QuestionGroup> = serde_json::from_str(MIXED).unwrap();
        let questions = flatten_groups(groups).unwrap();

        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].question, "2+2?");
        assert_eq!(questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(questions[1].passage(), None);
        assert_eq!(questions[2].passage(), Some("Taro went to school."));
        assert!(questions[2].is_reading());
    }

    #[test]
    fn processed_questions_keep_correct_answer_content() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let questions = process_response(MIXED, &mut rng).unwrap();
            assert_eq!(questions[0].correct_option(), Some("4"));
            assert_eq!(questions[1].correct_option(), Some("Paris"));
            assert_eq!(questions[2].correct_option(), Some("school"));
            for q in &questions {
                assert!(q.correct_index < q.options.len());
            }
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let options: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(8);
        let (shuffled, idx) = shuffle_options(options.clone(), 3, &mut rng);

        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, options);
        assert_eq!(shuffled[idx], "d");
    }

    #[test]
    fn shuffle_tracks_duplicate_options_by_position() {
        let options = vec!["same".to_string(), "same".to_string(), "other".to_string()];
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (shuffled, idx) = shuffle_options(options.clone(), 1, &mut rng);
            assert_eq!(shuffled[idx], "same");
            assert_eq!(shuffled.len(), 3);
        }
    }

    #[test]
    fn shuffle_reaches_every_arrangement() {
        let options: Vec<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        let mut seen = HashSet::new();
        for seed in 0..600 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (shuffled, _) = shuffle_options(options.clone(), 0, &mut rng);
            seen.insert(shuffled);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(process_response("not json", &mut rng).is_err());
        assert!(process_response(r#"{"questions":[]}"#, &mut rng).is_err());
    }

    #[test]
    fn missing_question_field_is_rejected() {
        let raw = r#"[{"type":"single","questions":[{"question":"q","options":["a","b"],"correctIndex":0}]}]"#;
        let mut rng = StdRng::seed_from_u64(1);
        assert!(process_response(raw, &mut rng).is_err());
    }

    #[test]
    fn unknown_group_type_is_rejected() {
        let raw = r#"[{"type":"essay","questions":[]}]"#;
        let mut rng = StdRng::seed_from_u64(1);
        assert!(process_response(raw, &mut rng).is_err());
    }

    #[test]
    fn out_of_range_correct_index_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let too_big = r#"[{"type":"single","questions":[{"question":"q","options":["a","b"],"correctIndex":2,"explanation":""}]}]"#;
        let negative = r#"[{"type":"single","questions":[{"question":"q","options":["a","b"],"correctIndex":-1,"explanation":""}]}]"#;
        assert!(process_response(too_big, &mut rng).is_err());
        assert!(process_response(negative, &mut rng).is_err());
    }

    #[test]
    fn single_option_question_is_rejected() {
        let raw = r#"[{"type":"single","questions":[{"question":"q","options":["a"],"correctIndex":0,"explanation":""}]}]"#;
        let mut rng = StdRng::seed_from_u64(1);
        assert!(process_response(raw, &mut rng).is_err());
    }

    #[test]
    fn reading_group_without_passage_is_rejected() {
        let raw = r#"[{"type":"reading","questions":[{"question":"q","options":["a","b"],"correctIndex":0,"explanation":""}]}]"#;
        let mut rng = StdRng::seed_from_u64(1);
        assert!(process_response(raw, &mut rng).is_err());
    }

    #[test]
    fn empty_response_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(process_response("[]", &mut rng).is_err());
    }

    #[test]
    fn candidate_text_joins_parts() {
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "[{\"a\":" }, { "text": "1}]" }] } }]
        });
        assert_eq!(candidate_text(&body).as_deref(), Some("[{\"a\":1}]"));
        assert_eq!(candidate_text(&serde_json::json!({ "candidates": [] })), None);
    }

    #[tokio::test]
    async fn generate_quiz_returns_shuffled_questions() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate()
            .withf(|req: &GenerationRequest| req.instruction.contains("Create 5 multiple-choice"))
            .times(1)
            .returning(|_| Ok(MIXED.to_string()));

        let service = AIService::new(Arc::new(backend), prompts());
        let source = ContentSource::prompt("Geography and arithmetic".into(), None);
        let questions = service.generate_quiz(&source, count(5)).await.unwrap();

        assert_eq!(questions.len(), 3);
        assert_eq!(questions[2].correct_option(), Some("school"));
    }

    #[tokio::test]
    async fn backend_failure_becomes_generation_failed() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate()
            .returning(|_| Err(Error::Internal("connection reset".into())));

        let service = AIService::new(Arc::new(backend), prompts());
        let source = ContentSource::prompt("Geography and arithmetic".into(), None);
        let result = service.generate_quiz(&source, count(5)).await;
        assert!(matches!(result, Err(Error::GenerationFailed)));
    }

    #[tokio::test]
    async fn schema_violation_becomes_generation_failed() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate()
            .returning(|_| Ok(r#"[{"type":"single"}]"#.to_string()));

        let service = AIService::new(Arc::new(backend), prompts());
        let source = ContentSource::prompt("Geography and arithmetic".into(), None);
        let result = service.generate_quiz(&source, count(10)).await;
        assert!(matches!(result, Err(Error::GenerationFailed)));
    }
}
