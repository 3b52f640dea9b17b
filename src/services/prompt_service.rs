use crate::error::{Error, Result};
use crate::models::content_source::{ContentSource, SourceType};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

pub const QUESTION_COUNTS: [u32; 5] = [5, 10, 15, 20, 50];
pub const LARGE_QUESTION_COUNT: u32 = 30;
pub const MAX_SEED: u32 = 1_000_000;
const DEFAULT_CHUNK_COUNT: usize = 6;
const GAP_MARKER: &str = "\n[...]\n";

/// Steering hints rotated across requests so repeated generations over the
/// same material drift to different aspects of it.
pub const STRATEGIES: [&str; 7] = [
    "JLPT grammar (Bunpou): particles, verb conjugation, sentence structure, honorifics.",
    "JLPT vocabulary (Goi/Kanji): readings, meanings, near-synonyms, word usage.",
    "JLPT reading comprehension (Dokkai): main idea, demonstratives, reasons, details.",
    "Focus on definitions, key concepts and what they mean.",
    "Focus on cause-and-effect relationships and logical arguments.",
    "Pick passages at random from the middle or the end of the text to ask about.",
    "Fill in the blank or put the words of a sentence in order (Mondai word ordering).",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QuestionCount(u32);

impl QuestionCount {
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_large(self) -> bool {
        self.0 >= LARGE_QUESTION_COUNT
    }
}

impl TryFrom<u32> for QuestionCount {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        if QUESTION_COUNTS.contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::BadRequest(format!(
                "Question count must be one of {:?}, got {}",
                QUESTION_COUNTS, value
            )))
        }
    }
}

/// How oversized content is cut down to the content limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// Keep the beginning of the content.
    Truncate,
    /// Fixed slices from the start, the middle and the end.
    Bookends,
    /// Random windows spread across the content, kept in document order.
    Chunks { count: usize },
}

impl FromStr for SamplingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "truncate" => Ok(Self::Truncate),
            "bookends" => Ok(Self::Bookends),
            "chunks" => Ok(Self::Chunks {
                count: DEFAULT_CHUNK_COUNT,
            }),
            other => match other.strip_prefix("chunks:") {
                Some(n) => match n.parse::<usize>() {
                    Ok(count) if count > 0 => Ok(Self::Chunks { count }),
                    _ => Err(format!("invalid chunk count '{}'", n)),
                },
                None => Err(format!(
                    "unknown sampling policy '{}', expected truncate, bookends or chunks[:N]",
                    other
                )),
            },
        }
    }
}

impl fmt::Display for SamplingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncate => write!(f, "truncate"),
            Self::Bookends => write!(f, "bookends"),
            Self::Chunks { count } => write!(f, "chunks:{}", count),
        }
    }
}

/// Everything the generative backend needs for one call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub instruction: String,
    pub response_schema: JsonValue,
    pub temperature: f32,
    pub strategy: String,
    pub seed: u32,
}

#[derive(Clone, Debug)]
pub struct PromptService {
    content_limit: usize,
    sampling: SamplingPolicy,
    explanation_language: String,
    temperature: f32,
}

impl PromptService {
    pub fn new(
        content_limit: usize,
        sampling: SamplingPolicy,
        explanation_language: String,
        temperature: f32,
    ) -> Self {
        Self {
            content_limit,
            sampling,
            explanation_language,
            temperature,
        }
    }

    pub fn build<R: Rng + ?Sized>(
        &self,
        source: &ContentSource,
        count: QuestionCount,
        rng: &mut R,
    ) -> GenerationRequest {
        let strategy = STRATEGIES
            .choose(rng)
            .copied()
            .unwrap_or(STRATEGIES[0]);
        let seed = rng.gen_range(0..MAX_SEED);

        let note = source
            .note
            .as_deref()
            .map(|n| format!("- Additional request from the user: \"{}\".\n", n))
            .unwrap_or_default();

        let task = match source.source_type {
            SourceType::Text => {
                let content = self.sample_content(&source.content, rng);
                format!(
                    "Create {count} multiple-choice questions from the document below.\n\
                     STRATEGY: \"{strategy}\"\n\
                     REQUIREMENTS:\n\
                     - Pick aspects at random and AVOID repeating earlier question sets.\n\
                     - Seed: {seed}.\n\
                     {note}\
                     CONTENT: {content}",
                    count = count.get(),
                )
            }
            SourceType::Prompt => format!(
                "Create {count} multiple-choice questions for the request: \"{content}\" \
                 (Strategy: \"{strategy}\", Seed: {seed})\n{note}",
                count = count.get(),
                content = source.content.trim(),
            ),
        };

        let instruction = format!("{}\n\n{}", task.trim_end(), self.formatting_rules());
        tracing::debug!(
            "Built generation request: strategy={:?}, seed={}, instruction_len={}",
            strategy,
            seed,
            instruction.len()
        );

        GenerationRequest {
            instruction,
            response_schema: response_schema(),
            temperature: self.temperature,
            strategy: strategy.to_string(),
            seed,
        }
    }

    fn formatting_rules(&self) -> String {
        format!(
            "JSON RULES:\n\
             - Return a list of question groups (type: \"single\" or \"reading\").\n\
             - \"reading\": include a \"passage\" field shared by the group's questions.\n\
             - \"questions\": the array of questions in the group.\n\
             \n\
             CONTENT RULES:\n\
             - PREFER THE JLPT FORMAT when the material is Japanese.\n\
             - VOCABULARY/KANJI: put the word being asked about in square brackets [ ]. \
             Example: \"What is the reading of [導入]?\".\n\
             - FILL-IN/GRAMMAR: mark the blank with \"(___)\". \
             Example: \"熱い(___)に、召し上がってください。\".\n\
             - Do NOT use Markdown (**bold**).\n\
             - Explanations: detailed, written in {language}, covering the related grammar and vocabulary.\n\
             - Questions and options: in Japanese for Japanese exams, otherwise in {language}.\n\
             - Kanji/Japanese: include hiragana readings in the explanation.",
            language = self.explanation_language
        )
    }

    /// Cuts content longer than the limit down according to the policy.
    /// Content within the limit is returned unchanged.
    pub fn sample_content<R: Rng + ?Sized>(&self, content: &str, rng: &mut R) -> String {
        let chars: Vec<char> = content.chars().collect();
        let limit = self.content_limit;
        if chars.len() <= limit {
            return content.to_string();
        }

        tracing::info!(
            "Content of {} characters exceeds limit {}, sampling with {}",
            chars.len(),
            limit,
            self.sampling
        );

        let marker_len = GAP_MARKER.chars().count();
        match self.sampling {
            SamplingPolicy::Truncate => truncate(&chars, limit),
            SamplingPolicy::Bookends => {
                let budget = limit.saturating_sub(2 * marker_len);
                let each = budget / 3;
                if each == 0 {
                    return truncate(&chars, limit);
                }
                let middle = (chars.len() - each) / 2;
                [
                    &chars[..each],
                    &chars[middle..middle + each],
                    &chars[chars.len() - each..],
                ]
                .iter()
                .map(|part| part.iter().collect::<String>())
                .collect::<Vec<_>>()
                .join(GAP_MARKER)
            }
            SamplingPolicy::Chunks { count } => {
                let count = count.max(1);
                let budget = limit.saturating_sub((count - 1) * marker_len);
                let chunk_len = budget / count;
                if chunk_len == 0 {
                    return truncate(&chars, limit);
                }
                let segment = chars.len() / count;
                (0..count)
                    .map(|i| {
                        let start = i * segment + rng.gen_range(0..=segment - chunk_len);
                        chars[start..start + chunk_len].iter().collect::<String>()
                    })
                    .collect::<Vec<_>>()
                    .join(GAP_MARKER)
            }
        }
    }
}

fn truncate(chars: &[char], limit: usize) -> String {
    chars[..limit.min(chars.len())].iter().collect()
}

/// Response schema sent with every request. The backend is asked to return
/// an array of question groups in exactly this shape.
pub fn response_schema() -> JsonValue {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "type": { "type": "STRING", "enum": ["single", "reading"] },
                "passage": { "type": "STRING" },
                "questions": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "question": { "type": "STRING" },
                            "options": {
                                "type": "ARRAY",
                                "items": { "type": "STRING" }
                            },
                            "correctIndex": { "type": "INTEGER" },
                            "explanation": { "type": "STRING" }
                        },
                        "required": ["question", "options", "correctIndex", "explanation"]
                    }
                }
            },
            "required": ["type", "questions"]
        }
    })
}
