use crate::core::Orchestrator;
use crate::core::pipeline::PipelineState;
use crate::core::session::{QuizSession, SessionStatus};
use crate::error::Result;
use std::io::{BufRead, Write};

const WIDTH: usize = 88;
const LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

fn wrap(text: &str, indent: &str) -> String {
    let options = textwrap::Options::new(WIDTH)
        .initial_indent(indent)
        .subsequent_indent(indent);
    textwrap::fill(text, options)
}

pub fn print_package(state: &PipelineState, out: &mut impl Write) -> Result<()> {
    if !state.title.is_empty() {
        writeln!(out, "📺 {}", state.title)?;
        writeln!(out)?;
    }

    for warning in &state.warnings {
        writeln!(out, "⚠ {warning}")?;
    }

    writeln!(out, "📋 Summary")?;
    if state.summary.is_empty() {
        writeln!(out, "  Summary not available.")?;
    } else {
        writeln!(out, "{}", wrap(&state.summary, "  "))?;
    }
    writeln!(out)?;

    writeln!(out, "🔑 Key Points")?;
    if state.key_points.is_empty() {
        writeln!(out, "  Key points not available.")?;
    }
    for point in &state.key_points {
        let options = textwrap::Options::new(WIDTH)
            .initial_indent("  - ")
            .subsequent_indent("    ");
        writeln!(out, "{}", textwrap::fill(point, options))?;
    }
    writeln!(out)?;

    writeln!(out, "📚 Related Resources")?;
    if state.related_resources.is_empty() {
        writeln!(out, "  No related resources found for this video.")?;
    }
    for (i, resource) in state.related_resources.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, resource.title)?;
        writeln!(out, "     {}", resource.url)?;
    }
    writeln!(out)?;

    writeln!(out, "❓ Quiz: {} questions", state.quiz_items.len())?;

    if let Some(error) = &state.error {
        writeln!(out)?;
        writeln!(out, "Errors: {error}")?;
    }
    Ok(())
}

/// Accepts `a`-`d` (any case) or `1`-`4`.
pub fn parse_choice(input: &str) -> Option<usize> {
    let input = input.trim();
    let mut chars = input.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    match first.to_ascii_uppercase() {
        c @ 'A'..='D' => Some((c as u8 - b'A') as usize),
        c @ '1'..='4' => Some((c as u8 - b'1') as usize),
        _ => None,
    }
}

fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn prompt(out: &mut impl Write, text: &str) -> Result<()> {
    write!(out, "{text}")?;
    out.flush()?;
    Ok(())
}

enum AfterQuiz {
    Restart,
    Review,
    Quit,
}

/// Plays the quiz on a line-oriented terminal. Returns the last session when input ends or the user quits.
pub async fn play_quiz(
    state: &mut PipelineState,
    orchestrator: &Orchestrator,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<QuizSession> {
    let mut session = QuizSession::new();

    loop {
        if state.quiz_items.is_empty() {
            writeln!(out, "Quiz not available.")?;
            prompt(out, "[g] Generate quiz now  [q] Quit > ")?;
            match read_line(input)?.as_deref() {
                Some("g") | Some("G") => {
                    regenerate(state, orchestrator, out).await?;
                    continue;
                }
                _ => return Ok(session),
            }
        }

        session.start(&state.quiz_items);

        loop {
            if !run_questions(state, &mut session, input, out)? {
                return Ok(session);
            }

            writeln!(
                out,
                "Quiz completed! Your score: {}/{}",
                session.score,
                state.quiz_items.len()
            )?;

            match after_quiz(input, out)? {
                AfterQuiz::Review => {
                    // review always succeeds on a completed session
                    let _ = session.review(&state.quiz_items);
                }
                AfterQuiz::Restart => {
                    regenerate(state, orchestrator, out).await?;
                    session = QuizSession::new();
                    break;
                }
                AfterQuiz::Quit => return Ok(session),
            }
        }
    }
}

async fn regenerate(
    state: &mut PipelineState,
    orchestrator: &Orchestrator,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "Generating quiz questions...")?;
    let outcome = orchestrator.regenerate_quiz(state).await;
    if let Some(error) = &outcome.error {
        writeln!(out, "{error}")?;
    }
    Ok(())
}

fn after_quiz(input: &mut impl BufRead, out: &mut impl Write) -> Result<AfterQuiz> {
    loop {
        prompt(out, "[r] Restart (new questions)  [v] Review  [q] Quit > ")?;
        match read_line(input)?.as_deref().map(str::to_lowercase).as_deref() {
            Some("r") => return Ok(AfterQuiz::Restart),
            Some("v") => return Ok(AfterQuiz::Review),
            Some("q") | None => return Ok(AfterQuiz::Quit),
            Some(_) => continue,
        }
    }
}

/// Drives the session to completion. `Ok(false)` means input ran out.
fn run_questions(
    state: &PipelineState,
    session: &mut QuizSession,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<bool> {
    let quiz = &state.quiz_items;

    while session.status == SessionStatus::InProgress {
        let Some(item) = session.current(quiz) else {
            break;
        };

        writeln!(out)?;
        writeln!(out, "Question {} of {}", session.cursor + 1, quiz.len())?;
        writeln!(out, "{}", wrap(item.question(), ""))?;
        for (letter, option) in LETTERS.iter().zip(item.options()) {
            writeln!(out, "  {letter}. {option}")?;
        }

        prompt(out, "Your answer > ")?;
        let Some(line) = read_line(input)? else {
            return Ok(false);
        };
        let Some(choice) = parse_choice(&line) else {
            writeln!(out, "Please answer with A-D or 1-4.")?;
            continue;
        };

        match session.submit(quiz, choice) {
            Ok(feedback) => writeln!(out, "{feedback}")?,
            Err(e) => {
                writeln!(out, "{e}")?;
                continue;
            }
        }

        if session.cursor + 1 < quiz.len() {
            prompt(out, "[Enter] Next question > ")?;
            if read_line(input)?.is_none() {
                return Ok(false);
            }
        }
        // only fails when no answer is pending, which submit just ruled out
        let _ = session.advance(quiz);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generator::TextGenerator;
    use crate::core::generator::testing::ScriptedGenerator;
    use crate::core::pipeline::testing::StubSource;
    use crate::core::quiz::{QuizGenerator, QuizItem};
    use crate::core::summary::SummaryService;
    use crate::core::resources::Resource;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::Arc;

    fn item(n: usize, correct: usize) -> QuizItem {
        QuizItem::new(
            format!("Question number {n}?"),
            (0..4).map(|i| format!("choice {i}")).collect(),
            correct,
        )
        .expect("valid")
    }

    fn orchestrator(generator: Arc<dyn TextGenerator>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(StubSource::with_transcript("Cells", "Some transcript about cells.")),
            SummaryService::new(generator.clone(), 256),
            QuizGenerator::new(generator, 256),
            None,
        )
    }

    fn state_with_quiz(items: Vec<QuizItem>) -> PipelineState {
        let mut state = PipelineState::new("https://youtu.be/dQw4w9WgXcQ");
        state.transcript = "Some transcript about cells.".into();
        state.quiz_items = items;
        state
    }

    #[test]
    fn choices_accept_letters_and_numbers() {
        assert_eq!(parse_choice("a"), Some(0));
        assert_eq!(parse_choice(" D "), Some(3));
        assert_eq!(parse_choice("2"), Some(1));
        assert_eq!(parse_choice("5"), None);
        assert_eq!(parse_choice("ab"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn package_lists_every_section() {
        let mut state = state_with_quiz(vec![item(0, 0)]);
        state.title = "Cells".into();
        state.summary = "Cells are small.".into();
        state.key_points = vec!["Membranes matter".into()];
        state.related_resources = vec![Resource {
            title: "Cell biology course".into(),
            url: "https://cells.example".into(),
            content: String::new(),
        }];

        let mut out = Vec::new();
        print_package(&state, &mut out).expect("print");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("📺 Cells"));
        assert!(text.contains("  Cells are small."));
        assert!(text.contains("  - Membranes matter"));
        assert!(text.contains("https://cells.example"));
        assert!(text.contains("❓ Quiz: 1 questions"));
        assert!(!text.contains("Errors:"));
    }

    #[tokio::test]
    async fn plays_through_and_scores() {
        let mut state = state_with_quiz(vec![item(0, 1), item(1, 2)]);
        let orchestrator = orchestrator(Arc::new(ScriptedGenerator::new()));
        let mut input = Cursor::new("b\n\nx\nA\nq\n");
        let mut out = Vec::new();

        let session = play_quiz(&mut state, &orchestrator, &mut input, &mut out)
            .await
            .expect("play");

        assert!(session.is_completed());
        assert_eq!(session.score, 1);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("✅ Correct!"));
        assert!(text.contains("Please answer with A-D or 1-4."));
        assert!(text.contains("❌ Incorrect. Correct answer: choice 2"));
        assert!(text.contains("Your score: 1/2"));
    }

    #[tokio::test]
    async fn restart_replaces_quiz_with_new_questions() {
        let fresh = json!({"questions": [
            {"question": "Brand new?", "options": ["w","x","y","z"], "answer_index": 3}
        ]})
        .to_string();
        let generator = Arc::new(ScriptedGenerator::new().reply(fresh));
        let orchestrator = orchestrator(generator.clone());
        let mut state = state_with_quiz(vec![item(0, 0)]);
        let mut input = Cursor::new("a\nr\nd\nq\n");
        let mut out = Vec::new();

        let session = play_quiz(&mut state, &orchestrator, &mut input, &mut out)
            .await
            .expect("play");

        assert_eq!(generator.calls(), 1);
        assert_eq!(state.quiz_items.len(), 1);
        assert_eq!(state.quiz_items[0].question(), "Brand new?");
        assert_eq!(session.score, 1);
        assert_eq!(session.answers.len(), 1);
    }

    #[tokio::test]
    async fn review_keeps_previous_score() {
        let mut state = state_with_quiz(vec![item(0, 0)]);
        let orchestrator = orchestrator(Arc::new(ScriptedGenerator::new()));
        let mut input = Cursor::new("a\nv\nb\nq\n");
        let mut out = Vec::new();

        let session = play_quiz(&mut state, &orchestrator, &mut input, &mut out)
            .await
            .expect("play");

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Your score: 1/1"));
        assert!(text.contains("Your score: 0/1"));
        assert_eq!(session.score, 0);
    }

    #[tokio::test]
    async fn empty_quiz_offers_generation() {
        let generator = Arc::new(ScriptedGenerator::new().fail("offline"));
        let orchestrator = orchestrator(generator.clone());
        let mut state = state_with_quiz(Vec::new());
        let mut input = Cursor::new("g\nq\n");
        let mut out = Vec::new();

        play_quiz(&mut state, &orchestrator, &mut input, &mut out)
            .await
            .expect("play");

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Quiz not available."));
        assert!(text.contains("Error generating quiz: offline"));
        assert_eq!(state.error.as_deref(), Some("Error generating quiz: offline"));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn generated_quiz_clears_the_earlier_quiz_error() {
        let fresh = json!({"questions": [
            {"question": "Where is DNA kept?", "options": ["Nucleus","Wall","Lipid","Pore"], "answer_index": 0}
        ]})
        .to_string();
        let orchestrator = orchestrator(Arc::new(ScriptedGenerator::new().reply(fresh)));
        let mut state = state_with_quiz(Vec::new());
        state.error = Some("Error generating quiz: rate limited".into());
        let mut input = Cursor::new("g
a
q
");
        let mut out = Vec::new();

        let session = play_quiz(&mut state, &orchestrator, &mut input, &mut out)
            .await
            .expect("play");

        assert_eq!(state.error, None);
        assert_eq!(state.quiz_items.len(), 1);
        assert_eq!(session.score, 1);
    }
}
