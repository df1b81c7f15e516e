use crate::config::Config;
use crate::core::generator::{OpenAiGenerator, TextGenerator};
use crate::core::quiz::{QUIZ_ERROR_PREFIX, QuizGenerator, QuizOutcome, QuizSet};
use crate::core::resources::{Resource, ResourceSearch, TavilySearch, search_topic};
use crate::core::summary::SummaryService;
use crate::core::transcript::{VideoContent, VideoSource, YoutubeSource};
use crate::error::Result;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Every stage message starts with one of these, which lets a joined error be split back apart.
const STAGE_ERROR_PREFIXES: [&str; 2] = ["Error generating ", "Failed to process video"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Stage {
    #[display("video ingestion")]
    Ingestion,
    #[display("summary")]
    Summary,
    #[display("quiz")]
    Quiz,
    #[display("related resources")]
    Resources,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Started(Stage),
    Finished { stage: Stage, progress: f64 },
    Failed { stage: Stage, message: String },
}

/// Everything learned about one video. Only the orchestrator writes to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub video_reference: String,
    pub video_id: String,
    pub title: String,
    pub transcript: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub quiz_items: QuizSet,
    pub related_resources: Vec<Resource>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(video_reference: impl Into<String>) -> Self {
        Self {
            video_reference: video_reference.into(),
            ..Self::default()
        }
    }

    pub fn has_transcript(&self) -> bool {
        !self.transcript.trim().is_empty()
    }

    /// Applies a stage result. Errors accumulate instead of overwriting each other.
    pub fn merge(&mut self, update: StageUpdate) {
        match update {
            StageUpdate::Ingested(content) => {
                self.video_id = content.video_id;
                self.title = content.title;
                self.transcript = content.transcript;
                self.warnings.extend(content.warnings);
            }
            StageUpdate::Summarized {
                summary,
                key_points,
            } => {
                self.summary = summary;
                self.key_points = key_points;
            }
            StageUpdate::Quiz(items) => self.quiz_items = items,
            StageUpdate::Resources(resources) => self.related_resources = resources,
            StageUpdate::Failed(message) => self.push_error(message),
        }
    }

    /// Swaps in a regenerated quiz. The previous quiz error is dropped and the other stages' errors stay.
    pub fn replace_quiz(&mut self, outcome: QuizOutcome) {
        if let Some(joined) = self.error.take() {
            let kept: Vec<String> = split_stage_errors(&joined)
                .into_iter()
                .filter(|message| !message.starts_with(QUIZ_ERROR_PREFIX))
                .collect();
            if !kept.is_empty() {
                self.error = Some(kept.join("; "));
            }
        }
        for update in quiz_updates(outcome) {
            self.merge(update);
        }
    }

    fn push_error(&mut self, message: String) {
        self.error = Some(match self.error.take() {
            Some(existing) => format!("{existing}; {message}"),
            None => message,
        });
    }
}

/// Partial result returned by a stage and merged by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate {
    Ingested(VideoContent),
    Summarized {
        summary: String,
        key_points: Vec<String>,
    },
    Quiz(QuizSet),
    Resources(Vec<Resource>),
    Failed(String),
}

/// Undoes the `"; "` join, keeping a separator that belongs to a message's own text.
fn split_stage_errors(joined: &str) -> Vec<String> {
    let mut messages: Vec<String> = Vec::new();
    for part in joined.split("; ") {
        let starts_message = STAGE_ERROR_PREFIXES.iter().any(|p| part.starts_with(p));
        match messages.last_mut() {
            Some(last) if !starts_message => {
                last.push_str("; ");
                last.push_str(part);
            }
            _ => messages.push(part.to_string()),
        }
    }
    messages
}

fn quiz_updates(outcome: QuizOutcome) -> Vec<StageUpdate> {
    let mut updates = vec![StageUpdate::Quiz(outcome.quiz_items)];
    if let Some(error) = outcome.error {
        updates.push(StageUpdate::Failed(error));
    }
    updates
}

pub struct Orchestrator {
    source: Arc<dyn VideoSource>,
    summaries: SummaryService,
    quizzes: QuizGenerator,
    search: Option<Arc<dyn ResourceSearch>>,
    events: Option<mpsc::UnboundedSender<StageEvent>>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn VideoSource>,
        summaries: SummaryService,
        quizzes: QuizGenerator,
        search: Option<Arc<dyn ResourceSearch>>,
    ) -> Self {
        Self {
            source,
            summaries,
            quizzes,
            search,
            events: None,
        }
    }

    /// Wires the real collaborators: YouTube, the configured LLM and, if keyed, Tavily.
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(config)?);
        let source = Arc::new(YoutubeSource::new(config.languages.clone())?);
        let search = config.tavily_api_key.clone().map(|key| {
            let search: Arc<dyn ResourceSearch> = Arc::new(TavilySearch::new(key));
            search
        });

        Ok(Self::new(
            source,
            SummaryService::new(generator.clone(), config.max_tokens),
            QuizGenerator::new(generator, config.max_tokens),
            search,
        ))
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<StageEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: StageEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn report(&self, stage: Stage, progress: f64, updates: &[StageUpdate]) {
        let failure = updates.iter().find_map(|u| match u {
            StageUpdate::Failed(message) => Some(message.clone()),
            _ => None,
        });
        match failure {
            Some(message) => {
                log::warn!("Stage {stage} failed: {message}");
                self.emit(StageEvent::Failed { stage, message });
            }
            None => self.emit(StageEvent::Finished { stage, progress }),
        }
    }

    /// Runs ingestion, then summary, quiz and resources concurrently.
    pub async fn run(&self, video_reference: &str) -> PipelineState {
        let mut state = self.ingested_state(video_reference, 0.25).await;
        if !state.has_transcript() {
            return state;
        }

        let snapshot = state.clone();
        self.emit(StageEvent::Started(Stage::Summary));
        self.emit(StageEvent::Started(Stage::Quiz));
        self.emit(StageEvent::Started(Stage::Resources));

        let (summary, quiz, resources) = tokio::join!(
            self.summarize(&snapshot),
            self.quiz(&snapshot),
            self.resources(&snapshot),
        );

        for (stage, progress, updates) in [
            (Stage::Summary, 0.5, summary),
            (Stage::Quiz, 0.75, quiz),
            (Stage::Resources, 1.0, resources),
        ] {
            self.report(stage, progress, &updates);
            for update in updates {
                state.merge(update);
            }
        }

        state
    }

    /// Ingestion followed by the quiz stage alone.
    pub async fn run_quiz_only(&self, video_reference: &str) -> PipelineState {
        let mut state = self.ingested_state(video_reference, 0.5).await;
        if !state.has_transcript() {
            return state;
        }

        self.emit(StageEvent::Started(Stage::Quiz));
        let updates = self.quiz(&state).await;
        self.report(Stage::Quiz, 1.0, &updates);
        for update in updates {
            state.merge(update);
        }
        state
    }

    async fn ingested_state(&self, video_reference: &str, progress: f64) -> PipelineState {
        let mut state = PipelineState::new(video_reference);
        let ingested = self.ingest(video_reference).await;
        self.report(Stage::Ingestion, progress, std::slice::from_ref(&ingested));
        state.merge(ingested);
        state
    }

    /// Builds a fresh quiz for an already processed video and merges it in place of the old one.
    pub async fn regenerate_quiz(&self, state: &mut PipelineState) -> QuizOutcome {
        let outcome = if state.has_transcript() {
            self.quizzes.regenerate(&state.transcript).await
        } else {
            QuizOutcome {
                quiz_items: Vec::new(),
                error: Some(format!("{QUIZ_ERROR_PREFIX}no transcript available")),
            }
        };
        state.replace_quiz(outcome.clone());
        outcome
    }

    async fn ingest(&self, video_reference: &str) -> StageUpdate {
        self.emit(StageEvent::Started(Stage::Ingestion));
        match self.source.fetch(video_reference).await {
            Ok(content) => StageUpdate::Ingested(content),
            Err(e) => StageUpdate::Failed(format!("Failed to process video: {e}")),
        }
    }

    async fn summarize(&self, state: &PipelineState) -> Vec<StageUpdate> {
        match self.summaries.summarize(&state.transcript).await {
            Ok(summary) => vec![StageUpdate::Summarized {
                summary: summary.summary,
                key_points: summary.key_points,
            }],
            Err(e) => vec![StageUpdate::Failed(format!("Error generating summary: {e}"))],
        }
    }

    async fn quiz(&self, state: &PipelineState) -> Vec<StageUpdate> {
        quiz_updates(self.quizzes.generate_quiz(&state.transcript).await)
    }

    async fn resources(&self, state: &PipelineState) -> Vec<StageUpdate> {
        let Some(search) = &self.search else {
            log::info!("No search API key configured, skipping related resources");
            return vec![StageUpdate::Resources(Vec::new())];
        };

        let topic = search_topic(&state.title, &state.transcript);
        match search.search(&topic).await {
            Ok(resources) => vec![StageUpdate::Resources(resources)],
            Err(e) => vec![
                StageUpdate::Resources(Vec::new()),
                StageUpdate::Failed(format!("Error generating resources: {e}")),
            ],
        }
    }
}

#[cfg(test)]
pub mod testing {
    use crate::core::resources::{Resource, ResourceSearch};
    use crate::core::transcript::{VideoContent, VideoSource, extract_video_id};
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub struct StubSource {
        pub result: std::result::Result<VideoContent, String>,
    }

    impl StubSource {
        pub fn with_transcript(title: &str, transcript: &str) -> Self {
            Self {
                result: Ok(VideoContent {
                    video_id: "dQw4w9WgXcQ".into(),
                    title: title.into(),
                    transcript: transcript.into(),
                    warnings: Vec::new(),
                }),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                result: Err(message.into()),
            }
        }
    }

    #[async_trait]
    impl VideoSource for StubSource {
        async fn fetch(&self, video_reference: &str) -> Result<VideoContent> {
            extract_video_id(video_reference)?;
            self.result.clone().map_err(Error::retrieval)
        }
    }

    #[derive(Default)]
    pub struct StubSearch {
        pub fail: bool,
        pub topics: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResourceSearch for StubSearch {
        async fn search(&self, topic: &str) -> Result<Vec<Resource>> {
            self.topics.lock().expect("topics lock").push(topic.to_string());
            if self.fail {
                return Err(Error::custom("search quota exceeded"));
            }
            Ok(vec![Resource {
                title: format!("Learn {topic}"),
                url: "https://learn.example".into(),
                content: "course".into(),
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{StubSearch, StubSource};
    use super::*;
    use crate::core::generator::testing::ScriptedGenerator;
    use crate::core::generator::TextGenerator;
    use crate::core::quiz::QuizItem;
    use async_trait::async_trait;
    use serde_json::json;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn quiz_json(count: usize) -> String {
        let questions: Vec<_> = (0..count)
            .map(|i| {
                json!({
                    "question": format!("Q{i}?"),
                    "options": ["a", "b", "c", "d"],
                    "answer_index": 1
                })
            })
            .collect();
        json!({ "questions": questions }).to_string()
    }

    /// Answers by prompt kind so the concurrent stages can call in any order.
    struct RoutingGenerator {
        summary: Option<String>,
        quiz: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for RoutingGenerator {
        async fn generate(&self, prompt: &str, _t: f32, _m: u32) -> crate::error::Result<String> {
            let reply = if prompt.contains("summarizer") || prompt.contains("Summarize") || prompt.contains("bullet") {
                self.summary.clone()
            } else {
                self.quiz.clone()
            };
            reply.ok_or_else(|| crate::error::Error::generation("model unavailable"))
        }
    }

    fn orchestrator(
        source: StubSource,
        generator: Arc<dyn TextGenerator>,
        search: Option<Arc<dyn ResourceSearch>>,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(source),
            SummaryService::new(generator.clone(), 512),
            QuizGenerator::new(generator, 512),
            search,
        )
    }

    fn orchestrator_with(generator: Arc<dyn TextGenerator>) -> Orchestrator {
        orchestrator(StubSource::with_transcript("t", "unused"), generator, None)
    }

    #[tokio::test]
    async fn full_run_populates_every_section() {
        let generator = Arc::new(RoutingGenerator {
            summary: Some(r#"{"summary": "Plants eat light.", "key_points": ["Chlorophyll"]}"#.into()),
            quiz: Some(quiz_json(10)),
        });
        let search = Arc::new(StubSearch::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orchestrator = orchestrator(
            StubSource::with_transcript("Photosynthesis", "Photosynthesis converts light into sugar."),
            generator,
            Some(search.clone()),
        )
        .with_events(tx);

        let state = orchestrator.run(URL).await;

        assert_eq!(state.error, None);
        assert_eq!(state.title, "Photosynthesis");
        assert_eq!(state.summary, "Plants eat light.");
        assert_eq!(state.key_points, vec!["Chlorophyll"]);
        assert_eq!(state.quiz_items.len(), 10);
        assert_eq!(state.related_resources.len(), 1);
        assert_eq!(search.topics.lock().expect("lock").as_slice(), ["Photosynthesis"]);

        let mut finished = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let StageEvent::Finished { stage, .. } = event {
                finished.push(stage);
            }
        }
        assert_eq!(
            finished,
            vec![Stage::Ingestion, Stage::Summary, Stage::Quiz, Stage::Resources]
        );
    }

    #[tokio::test]
    async fn ingestion_failure_stops_everything() {
        let generator = Arc::new(ScriptedGenerator::new());
        let search = Arc::new(StubSearch::default());
        let orchestrator = orchestrator(
            StubSource::failing("video is private"),
            generator.clone(),
            Some(search.clone()),
        );

        let state = orchestrator.run(URL).await;

        assert_eq!(
            state.error.as_deref(),
            Some("Failed to process video: video is private")
        );
        assert!(state.summary.is_empty());
        assert!(state.quiz_items.is_empty());
        assert_eq!(generator.calls(), 0);
        assert!(search.topics.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn non_youtube_reference_is_rejected_before_fetching() {
        let orchestrator = orchestrator(
            StubSource::with_transcript("t", "long enough transcript"),
            Arc::new(ScriptedGenerator::new()),
            None,
        );

        let state = orchestrator.run("https://example.com/video").await;
        assert!(state.error.as_deref().expect("error").contains("valid YouTube URL"));
        assert!(!state.has_transcript());
    }

    #[tokio::test]
    async fn unusable_quiz_does_not_block_siblings() {
        let generator = Arc::new(RoutingGenerator {
            summary: Some(r#"{"summary": "S", "key_points": ["k"]}"#.into()),
            quiz: Some("I refuse to answer in any format.".into()),
        });
        let orchestrator = orchestrator(
            StubSource::with_transcript("Topic", "A transcript about a topic."),
            generator,
            Some(Arc::new(StubSearch::default())),
        );

        let state = orchestrator.run(URL).await;

        assert!(state.quiz_items.is_empty());
        assert!(state
            .error
            .as_deref()
            .expect("quiz error")
            .starts_with("Error generating quiz: "));
        assert_eq!(state.summary, "S");
        assert_eq!(state.related_resources.len(), 1);
    }

    #[tokio::test]
    async fn stage_errors_accumulate() {
        let generator = Arc::new(RoutingGenerator {
            summary: None,
            quiz: Some(quiz_json(3)),
        });
        let search = Arc::new(StubSearch {
            fail: true,
            ..StubSearch::default()
        });
        let orchestrator = orchestrator(
            StubSource::with_transcript("", "Transcript text used as a topic."),
            generator,
            Some(search.clone()),
        );

        let state = orchestrator.run(URL).await;

        let error = state.error.expect("errors");
        assert!(error.contains("Error generating summary: model unavailable"));
        assert!(error.contains("; Error generating resources: search quota exceeded"));
        assert_eq!(state.quiz_items.len(), 3);
        assert_eq!(
            search.topics.lock().expect("lock").as_slice(),
            ["Transcript text used as a topic."]
        );
    }

    #[tokio::test]
    async fn quiz_only_run_skips_summary_and_resources() {
        let generator = Arc::new(ScriptedGenerator::new().reply(quiz_json(2)));
        let search = Arc::new(StubSearch::default());
        let orchestrator = orchestrator(
            StubSource::with_transcript("Mitosis", "Cells divide by mitosis."),
            generator.clone(),
            Some(search.clone()),
        );

        let state = orchestrator.run_quiz_only(URL).await;

        assert_eq!(state.title, "Mitosis");
        assert_eq!(state.quiz_items.len(), 2);
        assert!(state.summary.is_empty());
        assert_eq!(generator.calls(), 1);
        assert!(search.topics.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn regeneration_replaces_the_quiz() {
        let generator = Arc::new(ScriptedGenerator::new().reply(quiz_json(4)));
        let orchestrator = orchestrator(
            StubSource::with_transcript("t", "unused"),
            generator,
            None,
        );
        let mut state = PipelineState::new(URL);
        state.transcript = "Cells divide by mitosis.".into();
        state.quiz_items = vec![];

        let outcome = orchestrator.regenerate_quiz(&mut state).await;
        assert!(outcome.error.is_none());
        assert_eq!(state.quiz_items.len(), 4);
        assert_eq!(state.quiz_items, outcome.quiz_items);
    }

    #[tokio::test]
    async fn regeneration_without_transcript_is_refused() {
        let generator = Arc::new(ScriptedGenerator::new());
        let orchestrator = orchestrator(
            StubSource::with_transcript("t", "unused"),
            generator.clone(),
            None,
        );
        let mut state = PipelineState::new(URL);

        let outcome = orchestrator.regenerate_quiz(&mut state).await;
        assert!(outcome.error.is_some());
        assert_eq!(state.error, outcome.error);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn successful_regeneration_clears_the_old_quiz_error() {
        let orchestrator = orchestrator_with(Arc::new(ScriptedGenerator::new().reply(quiz_json(1))));
        let mut state = PipelineState::new(URL);
        state.transcript = "Cells divide by mitosis.".into();
        state.error = Some(
            "Error generating summary: model unavailable; \
             Error generating quiz: rate limited; try again later; \
             Error generating resources: search quota exceeded"
                .into(),
        );

        let outcome = orchestrator.regenerate_quiz(&mut state).await;

        assert!(outcome.error.is_none());
        assert_eq!(state.quiz_items.len(), 1);
        assert_eq!(
            state.error.as_deref(),
            Some(
                "Error generating summary: model unavailable; \
                 Error generating resources: search quota exceeded"
            )
        );

        state.error = Some("Error generating quiz: rate limited".into());
        let orchestrator = orchestrator_with(Arc::new(ScriptedGenerator::new().reply(quiz_json(2))));
        orchestrator.regenerate_quiz(&mut state).await;
        assert_eq!(state.error, None);
        assert_eq!(state.quiz_items.len(), 2);
    }

    #[tokio::test]
    async fn failed_regeneration_records_its_error() {
        let generator = Arc::new(ScriptedGenerator::new().fail("rate limited"));
        let orchestrator = orchestrator_with(generator);
        let mut state = PipelineState::new(URL);
        state.transcript = "Cells divide by mitosis.".into();
        state.quiz_items = vec![QuizItem::new(
            "Old?",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            0,
        )
        .expect("valid")];
        state.error = Some("Error generating summary: model unavailable".into());

        let outcome = orchestrator.regenerate_quiz(&mut state).await;

        assert!(state.quiz_items.is_empty());
        assert_eq!(
            outcome.error.as_deref(),
            Some("Error generating quiz: rate limited")
        );
        assert_eq!(
            state.error.as_deref(),
            Some("Error generating summary: model unavailable; Error generating quiz: rate limited")
        );
    }

    #[test]
    fn joined_errors_split_on_stage_boundaries() {
        assert_eq!(
            split_stage_errors("Error generating quiz: a; b; Failed to process video: c"),
            vec!["Error generating quiz: a; b", "Failed to process video: c"]
        );
        assert_eq!(split_stage_errors("custom; note"), vec!["custom; note"]);
    }

    #[test]
    fn merge_applies_partial_updates() {
        let mut state = PipelineState::new(URL);
        state.merge(StageUpdate::Failed("first".into()));
        state.merge(StageUpdate::Resources(Vec::new()));
        state.merge(StageUpdate::Failed("second".into()));
        assert_eq!(state.error.as_deref(), Some("first; second"));
    }
}
