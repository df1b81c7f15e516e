use crate::core::extract;
use crate::core::generator::{TextGenerator, truncate_chars};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, LazyLock};

pub const QUIZ_SIZE: usize = 10;
pub const OPTION_COUNT: usize = 4;
pub const QUIZ_ERROR_PREFIX: &str = "Error generating quiz: ";

const TRANSCRIPT_LIMIT: usize = 12_000;
const QUIZ_TEMPERATURE: f32 = 0.4;

static QUESTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Question\b|Q\s*\d+|\d+\s*[\).:])").expect("valid question regex")
});
static QUESTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Question\s*\d*|Q\s*\d+|\d+)\s*[\).:\-–]?\s*").expect("valid prefix regex")
});
static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-D])\s*[\).]\s*(.*)$").expect("valid option regex"));
static ANSWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:correct\s+)?answer\b\s*[:\-]?\s*(.*)$").expect("valid answer regex")
});

/// One multiple-choice question. `correct_text` always mirrors `options[correct_index]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredQuizItem")]
pub struct QuizItem {
    question: String,
    options: Vec<String>,
    correct_index: usize,
    correct_text: String,
}

pub type QuizSet = Vec<QuizItem>;

/// Serialized form; `correct_text` is rebuilt from the options on load.
#[derive(Deserialize)]
struct StoredQuizItem {
    question: String,
    options: Vec<String>,
    correct_index: usize,
}

impl TryFrom<StoredQuizItem> for QuizItem {
    type Error = String;

    fn try_from(stored: StoredQuizItem) -> std::result::Result<Self, Self::Error> {
        QuizItem::new(stored.question, stored.options, stored.correct_index)
            .ok_or_else(|| format!("quiz item needs {OPTION_COUNT} options and an answer among them"))
    }
}

impl QuizItem {
    /// Returns `None` unless there are exactly four options and the index points into them.
    pub fn new(question: impl Into<String>, options: Vec<String>, correct_index: usize) -> Option<Self> {
        let question = question.into().trim().to_string();
        if question.is_empty() || options.len() != OPTION_COUNT || correct_index >= OPTION_COUNT {
            return None;
        }
        let correct_text = options[correct_index].clone();
        Some(Self {
            question,
            options,
            correct_index,
            correct_text,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct_text(&self) -> &str {
        &self.correct_text
    }

    /// Overwrites the answer key without checks, to exercise the recovery paths.
    #[cfg(test)]
    pub(crate) fn with_answer_key(mut self, correct_index: usize, correct_text: impl Into<String>) -> Self {
        self.correct_index = correct_index;
        self.correct_text = correct_text.into();
        self
    }

    /// The stored index when it is usable, otherwise the position of `correct_text`.
    pub fn resolved_correct_index(&self) -> Option<usize> {
        if self.correct_index < self.options.len() {
            return Some(self.correct_index);
        }
        self.options.iter().position(|o| *o == self.correct_text)
    }
}

/// Per-item result of normalising generator output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Valid(QuizItem),
    Discarded(String),
}

/// What the quiz stage hands back: possibly empty items plus an optional error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub quiz_items: QuizSet,
    pub error: Option<String>,
}

impl QuizOutcome {
    pub fn is_empty(&self) -> bool {
        self.quiz_items.is_empty()
    }
}

fn collect_valid(outcomes: Vec<ParseOutcome>) -> Vec<QuizItem> {
    outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            ParseOutcome::Valid(item) => Some(item),
            ParseOutcome::Discarded(reason) => {
                log::debug!("Discarded quiz item: {reason}");
                None
            }
        })
        .collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_index(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn structured_item(value: &Value) -> ParseOutcome {
    let Some(object) = value.as_object() else {
        return ParseOutcome::Discarded("item is not an object".into());
    };

    let question = object.get("question").map(value_text).unwrap_or_default();
    if question.is_empty() {
        return ParseOutcome::Discarded("empty question".into());
    }

    let Some(raw_options) = object.get("options").and_then(Value::as_array) else {
        return ParseOutcome::Discarded(format!("no option list for '{question}'"));
    };
    if raw_options.len() < OPTION_COUNT {
        return ParseOutcome::Discarded(format!(
            "only {} options for '{question}'",
            raw_options.len()
        ));
    }
    let options: Vec<String> = raw_options.iter().take(OPTION_COUNT).map(value_text).collect();

    let index = match coerce_index(object.get("answer_index")) {
        Some(i) if (0..OPTION_COUNT as i64).contains(&i) => i as usize,
        _ => {
            return ParseOutcome::Discarded(format!("unusable answer_index for '{question}'"));
        }
    };

    match QuizItem::new(question, options, index) {
        Some(item) => ParseOutcome::Valid(item),
        None => ParseOutcome::Discarded("item failed shape check".into()),
    }
}

/// Tier 1: JSON emitted by the generator. Items are taken as-is, without shuffling.
pub fn parse_structured(text: &str) -> Vec<ParseOutcome> {
    let items = match extract::extract(text) {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut map)) => match map
            .remove("questions")
            .or_else(|| map.remove("quiz"))
        {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items.iter().map(structured_item).collect()
}

/// A question block as written by the generator, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBlock {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// Tier 2 grammar: a question line, `A.`..`D.` option lines, then `Answer: <letter>`.
pub fn parse_line_blocks(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<RawBlock> = None;

    for raw_line in text.lines() {
        let cleaned = raw_line.replace("**", "");
        let line = cleaned.trim().trim_start_matches('#').trim();
        if line.is_empty() {
            continue;
        }

        if QUESTION_START.is_match(line) {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some(RawBlock {
                question: QUESTION_PREFIX.replace(line, "").trim().to_string(),
                ..RawBlock::default()
            });
        } else if let Some(caps) = OPTION_LINE.captures(line) {
            if let Some(block) = current.as_mut() {
                block.options.push(caps[2].trim().to_string());
            }
        } else if let Some(caps) = ANSWER_LINE.captures(line)
            && let Some(block) = current.as_mut()
        {
            block.answer = caps[1].trim().to_string();
        }
    }

    if let Some(done) = current {
        blocks.push(done);
    }
    blocks
}

/// Maps an answer token to an option index: first letter A-D, else exact option text.
pub fn resolve_answer(token: &str, options: &[String]) -> Option<usize> {
    let by_letter = token
        .to_uppercase()
        .chars()
        .find(|c| matches!(c, 'A'..='D'))
        .map(|c| (c as u8 - b'A') as usize);

    by_letter
        .or_else(|| {
            let token = token.trim();
            options.iter().position(|o| o == token)
        })
        .filter(|&i| i < options.len())
}

/// Applies a random permutation to the options, keeping the correct answer tracked.
pub fn shuffle_options<R: Rng + ?Sized>(item: QuizItem, rng: &mut R) -> QuizItem {
    let mut indexed: Vec<(usize, String)> = item.options.into_iter().enumerate().collect();
    indexed.shuffle(rng);

    let correct_index = indexed
        .iter()
        .position(|(old, _)| *old == item.correct_index)
        .unwrap_or(0);
    let options: Vec<String> = indexed.into_iter().map(|(_, text)| text).collect();
    let correct_text = options[correct_index].clone();

    QuizItem {
        question: item.question,
        options,
        correct_index,
        correct_text,
    }
}

fn normalize_block<R: Rng + ?Sized>(block: RawBlock, rng: &mut R) -> ParseOutcome {
    if block.options.len() < OPTION_COUNT {
        return ParseOutcome::Discarded(format!(
            "only {} options for '{}'",
            block.options.len(),
            block.question
        ));
    }
    let options: Vec<String> = block.options.into_iter().take(OPTION_COUNT).collect();

    let Some(index) = resolve_answer(&block.answer, &options) else {
        return ParseOutcome::Discarded(format!(
            "unresolvable answer '{}' for '{}'",
            block.answer, block.question
        ));
    };

    let question = if block.question.is_empty() {
        "Question".to_string()
    } else {
        block.question
    };

    match QuizItem::new(question, options, index) {
        Some(item) => ParseOutcome::Valid(shuffle_options(item, rng)),
        None => ParseOutcome::Discarded("item failed shape check".into()),
    }
}

/// Tier 2: line-based fallback with per-item option shuffling.
pub fn parse_free_text<R: Rng + ?Sized>(text: &str, rng: &mut R) -> Vec<ParseOutcome> {
    parse_line_blocks(text)
        .into_iter()
        .map(|block| normalize_block(block, rng))
        .collect()
}

/// Keeps everything up to [`QUIZ_SIZE`]; beyond that draws a uniform sample without replacement.
pub fn cap_quiz<R: Rng + ?Sized>(items: Vec<QuizItem>, rng: &mut R) -> QuizSet {
    if items.len() <= QUIZ_SIZE {
        return items;
    }
    log::info!("Sampling {QUIZ_SIZE} of {} parsed questions", items.len());
    items.choose_multiple(rng, QUIZ_SIZE).cloned().collect()
}

fn structured_prompt(transcript: &str, variation: u64) -> String {
    format!(
        r#"
You are generating a quiz STRICTLY from the transcript. Return ONLY JSON, no extra text.

Schema:
{{
  "questions": [
    {{
      "question": "string",
      "options": ["string","string","string","string"],
      "answer_index": 0-3
    }}
  ]
}}

Rules:
- {QUIZ_SIZE} questions total, each with {OPTION_COUNT} options, exactly one correct.
- No trick questions, no "All of the above".
- Use only transcript facts; be unambiguous.
- Vary phrasing across runs via VARIATION_TOKEN.

VARIATION_TOKEN: {variation}

Transcript:
{transcript}
"#
    )
}

fn free_text_prompt(transcript: &str, variation: u64) -> String {
    format!(
        r#"Create {QUIZ_SIZE} concept-check multiple-choice questions (MCQs) strictly from this transcript. Vary phrasing across different VARIATION_TOKENs.

Transcript (truncate if needed):
{transcript}

Format each item exactly as:
Question 1: <question text>
A. <option A>
B. <option B>
C. <option C>
D. <option D>
Answer: <one letter A-D>

Rules:
- Questions must be unambiguous and based only on the transcript.
- Options should be plausible; only one correct answer.
- Avoid "All of the above"; avoid negation traps.

VARIATION_TOKEN: {variation}
"#
    )
}

/// Turns a transcript into a validated quiz using at most two generator calls.
#[derive(Clone)]
pub struct QuizGenerator {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
}

impl QuizGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    pub async fn generate_quiz(&self, transcript: &str) -> QuizOutcome {
        let mut rng = StdRng::from_entropy();
        self.generate_with_rng(transcript, &mut rng).await
    }

    /// Produces a brand-new quiz; any previous set and answers are left for the caller to drop.
    pub async fn regenerate(&self, transcript: &str) -> QuizOutcome {
        log::info!("Regenerating quiz with a fresh variation token");
        self.generate_quiz(transcript).await
    }

    pub async fn generate_with_rng<R: Rng + Send>(&self, transcript: &str, rng: &mut R) -> QuizOutcome {
        match self.build(transcript, rng).await {
            Ok(quiz_items) => QuizOutcome {
                quiz_items,
                error: None,
            },
            Err(e) => {
                log::warn!("Quiz generation failed: {e}");
                QuizOutcome {
                    quiz_items: Vec::new(),
                    error: Some(format!("{QUIZ_ERROR_PREFIX}{e}")),
                }
            }
        }
    }

    async fn build<R: Rng + Send>(&self, transcript: &str, rng: &mut R) -> Result<QuizSet> {
        let transcript = truncate_chars(transcript, TRANSCRIPT_LIMIT);
        let variation: u64 = rng.gen_range(1..=1_000_000_000);

        let response = self
            .generator
            .generate(
                &structured_prompt(transcript, variation),
                QUIZ_TEMPERATURE,
                self.max_tokens,
            )
            .await?;
        let mut items = collect_valid(parse_structured(&response));

        if items.is_empty() {
            log::info!("Structured quiz output unusable, falling back to line format");
            let response = self
                .generator
                .generate(
                    &free_text_prompt(transcript, variation),
                    QUIZ_TEMPERATURE,
                    self.max_tokens,
                )
                .await?;
            items = collect_valid(parse_free_text(&response, rng));
        }

        if items.is_empty() {
            return Err(Error::parse(
                "no valid questions could be parsed from model output",
            ));
        }

        Ok(cap_quiz(items, rng))
    }
}
