use crate::core::extract;
use crate::core::generator::{TextGenerator, truncate_chars};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const TRANSCRIPT_LIMIT: usize = 8_000;
const SUMMARY_TEMPERATURE: f32 = 0.3;
const MAX_KEY_POINTS: usize = 7;
const BULLET_CHARS: &[char] = &[' ', '-', '•', '\t', '*'];

const SUMMARY_PROMPT: &str = r#"
You are a precise summarizer. Given a YouTube video transcript, produce a clear, strictly relevant summary followed by concise key points.

Return ONLY valid JSON with this schema:
{
  "summary": "3-7 crisp sentences that explain the video clearly in plain language. Avoid fluff and speculation. Use only information present in the transcript.",
  "key_points": ["5-7 short bullets, each one sentence and highly informative"]
}

Rules:
- Do not include information that is not present in the transcript.
- No marketing tone, no opinions, no repetition.
- Prefer simple sentences and concrete wording.
- If something is unknown from the transcript, omit it instead of guessing.

Transcript:
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub key_points: Vec<String>,
}

#[derive(Clone)]
pub struct SummaryService {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
}

impl SummaryService {
    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    pub async fn summarize(&self, transcript: &str) -> Result<Summary> {
        let excerpt = truncate_chars(transcript, TRANSCRIPT_LIMIT);

        let response = self
            .ask(&format!("{SUMMARY_PROMPT}{excerpt}"))
            .await?;
        let mut summary = parse_summary(&response);

        if summary.summary.is_empty() {
            log::info!("Summary JSON unusable, asking for plain prose");
            let prompt = format!(
                "Summarize clearly in 5-7 sentences, strictly based on this transcript:\n\n{excerpt}\n\nSummary:"
            );
            summary.summary = self.ask(&prompt).await?.trim().to_string();
        }

        if summary.key_points.is_empty() {
            log::info!("Key points missing, asking for bullets");
            let prompt = format!(
                "Extract 5-7 concise, highly informative bullet points from this transcript. One sentence each.\n\n{excerpt}\n\nBullets:"
            );
            summary.key_points = bullet_lines(&self.ask(&prompt).await?);
        }

        summary.key_points.truncate(MAX_KEY_POINTS);
        Ok(summary)
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        self.generator
            .generate(prompt, SUMMARY_TEMPERATURE, self.max_tokens)
            .await
    }
}

fn clean_point(raw: &str) -> String {
    raw.trim_matches(BULLET_CHARS).trim().to_string()
}

fn bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(clean_point)
        .filter(|line| !line.is_empty())
        .take(MAX_KEY_POINTS)
        .collect()
}

/// Reads `{summary, key_points}` from generator text; missing parts come back empty.
pub fn parse_summary(text: &str) -> Summary {
    let Some(Value::Object(map)) = extract::extract(text) else {
        return Summary::default();
    };

    let summary = match map.get("summary") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let key_points = map
        .get("key_points")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .map(|p| match p {
                    Value::String(s) => clean_point(s),
                    other => clean_point(&other.to_string()),
                })
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Summary {
        summary,
        key_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generator::testing::ScriptedGenerator;

    #[test]
    fn parses_summary_and_cleans_bullets() {
        let text = r#"Here you go:
{"summary": " Plants make food. ", "key_points": ["- Light is absorbed", "• Water is split", "  ", "Oxygen is released"]}"#;
        let summary = parse_summary(text);
        assert_eq!(summary.summary, "Plants make food.");
        assert_eq!(
            summary.key_points,
            vec!["Light is absorbed", "Water is split", "Oxygen is released"]
        );
    }

    #[test]
    fn unparseable_text_gives_empty_summary() {
        assert_eq!(parse_summary("just prose"), Summary::default());
        assert_eq!(parse_summary("[1, 2]"), Summary::default());
    }

    #[tokio::test]
    async fn structured_reply_needs_one_call() {
        let generator = Arc::new(ScriptedGenerator::new().reply(
            r#"{"summary": "S.", "key_points": ["a","b","c","d","e","f","g","h","i"]}"#,
        ));
        let service = SummaryService::new(generator.clone(), 1024);

        let summary = service.summarize("transcript").await.expect("summary");
        assert_eq!(summary.summary, "S.");
        assert_eq!(summary.key_points.len(), MAX_KEY_POINTS);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_prose_and_bullets() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .reply("not json")
                .reply("  A plain summary.  ")
                .reply("- one\n\n* two\n• three"),
        );
        let service = SummaryService::new(generator.clone(), 1024);

        let summary = service.summarize("transcript").await.expect("summary");
        assert_eq!(summary.summary, "A plain summary.");
        assert_eq!(summary.key_points, vec!["one", "two", "three"]);
        assert_eq!(generator.calls(), 3);
        assert!(generator.prompts()[1].contains("Summarize clearly"));
    }

    #[tokio::test]
    async fn generator_failure_propagates() {
        let generator = Arc::new(ScriptedGenerator::new().fail("offline"));
        let service = SummaryService::new(generator, 1024);
        assert!(service.summarize("transcript").await.is_err());
    }

    #[tokio::test]
    async fn prompt_uses_bounded_excerpt() {
        let generator = Arc::new(
            ScriptedGenerator::new().reply(r#"{"summary": "S", "key_points": ["k"]}"#),
        );
        let service = SummaryService::new(generator.clone(), 1024);
        let transcript = "x".repeat(TRANSCRIPT_LIMIT * 2);

        service.summarize(&transcript).await.expect("summary");
        let prompt = &generator.prompts()[0];
        assert!(prompt.ends_with(&"x".repeat(TRANSCRIPT_LIMIT)));
        assert!(!prompt.contains(&"x".repeat(TRANSCRIPT_LIMIT + 1)));
    }
}
