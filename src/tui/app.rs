use crate::config::{Config, Overrides};
use crate::core::Orchestrator;
use crate::core::pipeline::{PipelineState, StageEvent};
use crate::core::quiz::QuizOutcome;
use crate::core::session::{QuizSession, SessionStatus};
use crate::core::transcript::is_video_platform_url;
use crate::error::Result;
use crate::logging;
use crate::tui::components::{ChoiceList, ContentViewer, InputField, ProgressBar};
use crate::tui::events::AppEvent;
use crossterm::event::{KeyCode, KeyEvent, MouseEvent};
use tokio::sync::mpsc;

pub const MENU_OPTIONS: [&str; 3] = ["New Video", "Last Results", "Settings"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsTab {
    Summary,
    Resources,
    Quiz,
}

impl ResultsTab {
    pub const ALL: [ResultsTab; 3] = [ResultsTab::Summary, ResultsTab::Resources, ResultsTab::Quiz];

    pub fn title(self) -> &'static str {
        match self {
            ResultsTab::Summary => "Summary & Key Points",
            ResultsTab::Resources => "Resources",
            ResultsTab::Quiz => "Quiz",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Home,
    NewVideo,
    Processing { video_reference: String },
    Results { tab: ResultsTab },
    Settings,
}

/// Sent by background tasks and drained on every tick.
#[derive(Debug)]
pub enum AppMessage {
    Stage(StageEvent),
    Processed(Box<PipelineState>),
    /// `generation` must match the app's counter, otherwise the result belongs to an earlier request.
    QuizRegenerated { generation: u64, outcome: QuizOutcome },
}

pub struct App {
    pub state: AppState,
    pub should_quit: bool,

    // Home screen
    pub selected_option: usize,

    // New video screen
    pub url_input: InputField,

    // Processing screen
    pub progress_bar: ProgressBar,

    // Results screen
    pub results: Option<PipelineState>,
    pub summary_viewer: ContentViewer,
    pub resources_viewer: ContentViewer,
    pub viewer_height: u16,

    // Quiz tab
    pub quiz: QuizSession,
    pub choices: ChoiceList,
    pub quiz_notice: Option<String>,
    pub regenerating: bool,
    pub regeneration: u64,

    // Settings screen
    pub settings: Vec<String>,

    pub overrides: Overrides,

    // Async communication
    pub processing_tx: Option<mpsc::UnboundedSender<AppMessage>>,
    pub processing_rx: Option<mpsc::UnboundedReceiver<AppMessage>>,
}

impl App {
    /// Configuration is read when work starts, so a missing key shows up in the UI instead of aborting.
    pub fn new(overrides: Overrides) -> Self {
        Self {
            state: AppState::Home,
            should_quit: false,

            selected_option: 0,

            url_input: InputField::new("Video URL", "https://youtu.be/..."),

            progress_bar: ProgressBar::new(),

            results: None,
            summary_viewer: ContentViewer::new(String::new(), "Summary".to_string()),
            resources_viewer: ContentViewer::new(String::new(), "Related Resources".to_string()),
            viewer_height: 0,

            quiz: QuizSession::new(),
            choices: ChoiceList::default(),
            quiz_notice: None,
            regenerating: false,
            regeneration: 0,

            settings: Vec::new(),

            overrides,

            processing_tx: None,
            processing_rx: None,
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Quit => {
                self.should_quit = true;
            }
            AppEvent::Key(key) => {
                self.handle_key(key)?;
            }
            AppEvent::Mouse(mouse) => {
                self.handle_mouse(mouse);
            }
            AppEvent::Tick => {
                self.handle_tick();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.state {
            AppState::Home => self.handle_home_key(key),
            AppState::NewVideo => self.handle_new_video_key(key),
            AppState::Processing { .. } => self.handle_processing_key(key),
            AppState::Results { tab } => self.handle_results_key(tab, key),
            AppState::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let height = self.viewer_height as usize;
        match self.state {
            AppState::Results {
                tab: ResultsTab::Summary,
            } => {
                self.summary_viewer.handle_mouse(mouse, height);
            }
            AppState::Results {
                tab: ResultsTab::Resources,
            } => {
                self.resources_viewer.handle_mouse(mouse, height);
            }
            AppState::Results {
                tab: ResultsTab::Quiz,
            } if self.quiz.status == SessionStatus::InProgress => {
                self.choices.handle_mouse(mouse);
            }
            _ => {}
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up => {
                self.selected_option = self.selected_option.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.selected_option + 1 < MENU_OPTIONS.len() {
                    self.selected_option += 1;
                }
            }
            KeyCode::Char('1') => self.selected_option = 0,
            KeyCode::Char('2') => self.selected_option = 1,
            KeyCode::Char('3') => self.selected_option = 2,
            KeyCode::Enter => match self.selected_option {
                0 => {
                    self.state = AppState::NewVideo;
                    self.url_input.clear();
                    self.url_input.focused = true;
                }
                1 => {
                    if self.results.is_some() {
                        self.state = AppState::Results {
                            tab: ResultsTab::Summary,
                        };
                    }
                }
                2 => {
                    self.settings = self.settings_lines();
                    self.state = AppState::Settings;
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    fn handle_new_video_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.state = AppState::Home;
            }
            KeyCode::Enter => {
                self.start_processing()?;
            }
            _ => {
                self.url_input.handle_key(key);
            }
        }
        Ok(())
    }

    fn handle_processing_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Esc {
            // The background run keeps going; its result is dropped on arrival.
            self.state = AppState::NewVideo;
            self.progress_bar.reset();
        }
        Ok(())
    }

    fn handle_results_key(&mut self, tab: ResultsTab, key: KeyEvent) -> Result<()> {
        let height = self.viewer_height as usize;
        match key.code {
            KeyCode::Esc => self.state = AppState::Home,
            KeyCode::Tab => self.state = AppState::Results { tab: tab.next() },
            KeyCode::BackTab => self.state = AppState::Results { tab: tab.previous() },
            _ => match tab {
                ResultsTab::Summary => {
                    self.summary_viewer.handle_key(key, height);
                }
                ResultsTab::Resources => {
                    self.resources_viewer.handle_key(key, height);
                }
                ResultsTab::Quiz => self.handle_quiz_key(key),
            },
        }
        Ok(())
    }

    fn handle_quiz_key(&mut self, key: KeyEvent) {
        enum Next {
            Stay,
            Reload,
            Regenerate,
        }

        if self.regenerating {
            return;
        }
        let Some(results) = &self.results else {
            return;
        };
        let quiz = &results.quiz_items;

        let next = if quiz.is_empty() {
            match key.code {
                KeyCode::Char('g') => Next::Regenerate,
                _ => Next::Stay,
            }
        } else {
            let status = self.quiz.status.clone();
            match (&status, key.code) {
                (SessionStatus::NotStarted, KeyCode::Enter) => {
                    self.quiz.start(quiz);
                    Next::Reload
                }
                (SessionStatus::InProgress, KeyCode::Enter) => {
                    if let Some(selected) = self.choices.selected()
                        && let Err(e) = self.quiz.submit(quiz, selected)
                    {
                        self.quiz_notice = Some(e.to_string());
                    }
                    Next::Stay
                }
                (SessionStatus::InProgress, _) => {
                    self.choices.handle_key(key);
                    Next::Stay
                }
                (SessionStatus::AwaitingNext(_), KeyCode::Enter | KeyCode::Char('n')) => {
                    match self.quiz.advance(quiz) {
                        Ok(_) => Next::Reload,
                        Err(e) => {
                            self.quiz_notice = Some(e.to_string());
                            Next::Stay
                        }
                    }
                }
                (SessionStatus::Completed, KeyCode::Char('r')) => Next::Regenerate,
                (SessionStatus::Completed, KeyCode::Char('v')) => match self.quiz.review(quiz) {
                    Ok(()) => Next::Reload,
                    Err(e) => {
                        self.quiz_notice = Some(e.to_string());
                        Next::Stay
                    }
                },
                _ => Next::Stay,
            }
        };

        match next {
            Next::Stay => {}
            Next::Reload => self.load_choices(),
            Next::Regenerate => self.regenerate_quiz(),
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Esc {
            self.state = AppState::Home;
        }
        Ok(())
    }

    fn handle_tick(&mut self) {
        let mut messages = Vec::new();
        if let Some(rx) = &mut self.processing_rx {
            while let Ok(message) = rx.try_recv() {
                messages.push(message);
            }
        }

        for message in messages {
            self.handle_message(message);
        }
    }

    pub fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Stage(event) => self.progress_bar.apply(&event),
            AppMessage::Processed(state) => {
                let active = matches!(
                    &self.state,
                    AppState::Processing { video_reference } if *video_reference == state.video_reference
                );
                if !active {
                    log::debug!("Dropping result for {}", state.video_reference);
                    return;
                }

                if state.has_transcript() {
                    self.show_results(*state);
                } else {
                    self.url_input.error = Some(
                        state
                            .error
                            .unwrap_or_else(|| "Could not retrieve a transcript".to_string()),
                    );
                    self.state = AppState::NewVideo;
                }
            }
            AppMessage::QuizRegenerated {
                generation,
                outcome,
            } => {
                if generation != self.regeneration {
                    log::debug!("Dropping quiz from regeneration #{generation}");
                    return;
                }
                self.regenerating = false;
                let Some(results) = &mut self.results else {
                    return;
                };

                let has_questions = !outcome.is_empty();
                self.quiz_notice = outcome.error.clone();
                results.replace_quiz(outcome);
                self.summary_viewer.set_content(summary_text(results));
                self.quiz = QuizSession::new();
                if has_questions {
                    self.quiz.start(&results.quiz_items);
                }
                self.load_choices();
            }
        }
    }

    /// Replaces whatever was shown before with a freshly processed video.
    pub fn show_results(&mut self, state: PipelineState) {
        self.summary_viewer.set_content(summary_text(&state));
        self.resources_viewer.set_content(resources_text(&state));
        self.quiz_notice = state.error.clone();
        self.quiz = QuizSession::new();
        self.choices.update_items(Vec::new());
        self.regenerating = false;
        self.regeneration += 1;
        self.results = Some(state);
        self.progress_bar.reset();
        self.state = AppState::Results {
            tab: ResultsTab::Summary,
        };
    }

    /// Points the option list at the current question, restoring an earlier answer during review.
    fn load_choices(&mut self) {
        let current = self
            .results
            .as_ref()
            .and_then(|r| self.quiz.current(&r.quiz_items));
        match current {
            Some(item) => {
                self.choices.update_items(item.options().to_vec());
                if let Some(&previous) = self.quiz.answers.get(&self.quiz.cursor) {
                    self.choices.select(previous);
                }
            }
            None => self.choices.update_items(Vec::new()),
        }
    }

    fn orchestrator(&self) -> Result<Orchestrator> {
        let config = Config::from_env_with(&self.overrides)?;
        Orchestrator::from_config(&config)
    }

    fn start_processing(&mut self) -> Result<()> {
        if !self.url_input.is_valid() {
            return Ok(());
        }
        let video_reference = self.url_input.value.trim().to_string();
        if !is_video_platform_url(&video_reference) {
            self.url_input.error = Some("Please enter a valid YouTube URL".to_string());
            return Ok(());
        }

        let orchestrator = match self.orchestrator() {
            Ok(orchestrator) => orchestrator,
            Err(e) => {
                self.url_input.error = Some(e.to_string());
                return Ok(());
            }
        };

        self.state = AppState::Processing {
            video_reference: video_reference.clone(),
        };
        self.progress_bar.reset();
        self.progress_bar.set_message("Starting...".to_string());

        if let Some(tx) = &self.processing_tx {
            spawn_processing(orchestrator, video_reference, tx.clone());
        }
        Ok(())
    }

    fn regenerate_quiz(&mut self) {
        let Some(results) = &self.results else {
            return;
        };
        let Some(tx) = self.processing_tx.clone() else {
            return;
        };

        let orchestrator = match self.orchestrator() {
            Ok(orchestrator) => orchestrator,
            Err(e) => {
                self.quiz_notice = Some(e.to_string());
                return;
            }
        };

        let mut snapshot = results.clone();
        let generation = self.begin_regeneration();

        tokio::spawn(async move {
            let outcome = orchestrator.regenerate_quiz(&mut snapshot).await;
            let _ = tx.send(AppMessage::QuizRegenerated { generation, outcome });
        });
    }

    /// Marks a regeneration as in flight. Any result from an earlier one is dropped on arrival.
    fn begin_regeneration(&mut self) -> u64 {
        self.regeneration += 1;
        self.regenerating = true;
        self.quiz_notice = Some("Generating quiz questions...".to_string());
        self.regeneration
    }

    fn settings_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match Config::from_env_with(&self.overrides) {
            Ok(config) => {
                lines.push(format!("Provider: {}", config.provider));
                lines.push(format!("Model: {}", config.model));
                lines.push(format!(
                    "API key ({}): {}",
                    config.provider.key_variable(),
                    if config.api_key.is_some() { "set" } else { "missing" }
                ));
                lines.push(format!("Max output tokens: {}", config.max_tokens));
                lines.push(format!(
                    "Related resources search: {}",
                    if config.has_search() {
                        "enabled"
                    } else {
                        "disabled (set TAVILY_API_KEY)"
                    }
                ));
                lines.push(format!("Transcript languages: {}", config.languages.join(", ")));
                if let Err(e) = config.validate() {
                    lines.push(String::new());
                    lines.push(format!("⚠ {e}"));
                }
            }
            Err(e) => lines.push(format!("⚠ {e}")),
        }
        lines.push(String::new());
        lines.push(format!("Log file: {}", logging::log_file_path().display()));
        lines
    }
}

fn spawn_processing(
    orchestrator: Orchestrator,
    video_reference: String,
    tx: mpsc::UnboundedSender<AppMessage>,
) {
    tokio::spawn(async move {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let forward = tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let _ = forward.send(AppMessage::Stage(event));
            }
        });

        let orchestrator = orchestrator.with_events(events_tx);
        let state = orchestrator.run(&video_reference).await;

        // Dropping the orchestrator closes the event channel so the forwarder drains and stops.
        drop(orchestrator);
        let _ = forwarder.await;
        let _ = tx.send(AppMessage::Processed(Box::new(state)));
    });
}

pub fn summary_text(state: &PipelineState) -> String {
    let mut text = String::new();
    if !state.title.is_empty() {
        text.push_str(&format!("# {}\n\n", state.title));
    }

    text.push_str("# Summary\n");
    if state.summary.is_empty() {
        text.push_str("Summary not available.\n");
    } else {
        text.push_str(&state.summary);
        text.push('\n');
    }

    text.push_str("\n# Key Points\n");
    if state.key_points.is_empty() {
        text.push_str("Key points not available.\n");
    }
    for point in &state.key_points {
        text.push_str(&format!("- {point}\n"));
    }

    if !state.warnings.is_empty() || state.error.is_some() {
        text.push_str("\n# Notes\n");
        for warning in &state.warnings {
            text.push_str(&format!("- {warning}\n"));
        }
        if let Some(error) = &state.error {
            text.push_str(&format!("- {error}\n"));
        }
    }
    text
}

pub fn resources_text(state: &PipelineState) -> String {
    if state.related_resources.is_empty() {
        return "No related resources found for this video.".to_string();
    }

    let mut text = String::new();
    for (i, resource) in state.related_resources.iter().enumerate() {
        text.push_str(&format!("# {}. {}\n", i + 1, resource.title));
        text.push_str(&format!("{}\n", resource.url));
        let snippet: String = resource.content.chars().take(280).collect();
        if !snippet.is_empty() {
            text.push_str(&format!("{snippet}\n"));
        }
        text.push('\n');
    }
    text
}
