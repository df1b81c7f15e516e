use crate::core::quiz::QuizItem;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub correct: bool,
    /// Text of the right option, if it could be determined.
    pub correct_text: Option<String>,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.correct {
            write!(f, "✅ Correct!")
        } else {
            let answer = self.correct_text.as_deref().unwrap_or("(unavailable)");
            write!(f, "❌ Incorrect. Correct answer: {answer}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    AwaitingNext(Feedback),
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionError {
    #[display("quiz has not been started")]
    NotStarted,
    #[display("an answer was already submitted for this question")]
    AwaitingNext,
    #[display("no answer has been submitted yet")]
    NotAwaitingNext,
    #[display("quiz is already completed")]
    Completed,
    #[display("quiz is not completed yet")]
    NotCompleted,
    #[display("option {selected} is out of range for {available} options")]
    OptionOutOfRange { selected: usize, available: usize },
    #[display("question {_0} does not exist")]
    MissingQuestion(usize),
}

impl std::error::Error for SessionError {}

/// Progress of one attempt over a quiz set. The set itself is passed to every
/// transition so the caller stays the only owner of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSession {
    pub cursor: usize,
    pub answers: BTreeMap<usize, usize>,
    pub score: usize,
    pub status: SessionStatus,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            answers: BTreeMap::new(),
            score: 0,
            status: SessionStatus::NotStarted,
        }
    }

    /// An empty quiz completes immediately without showing a question.
    pub fn start(&mut self, quiz: &[QuizItem]) {
        self.cursor = 0;
        self.score = 0;
        self.answers.clear();
        self.status = if quiz.is_empty() {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress
        };
    }

    pub fn current<'a>(&self, quiz: &'a [QuizItem]) -> Option<&'a QuizItem> {
        match self.status {
            SessionStatus::InProgress | SessionStatus::AwaitingNext(_) => quiz.get(self.cursor),
            _ => None,
        }
    }

    /// Records the answer for the current question. A rejected call leaves the session untouched.
    pub fn submit(&mut self, quiz: &[QuizItem], selected: usize) -> Result<Feedback, SessionError> {
        match self.status {
            SessionStatus::InProgress => {}
            SessionStatus::NotStarted => return Err(SessionError::NotStarted),
            SessionStatus::AwaitingNext(_) => return Err(SessionError::AwaitingNext),
            SessionStatus::Completed => return Err(SessionError::Completed),
        }

        let item = quiz
            .get(self.cursor)
            .ok_or(SessionError::MissingQuestion(self.cursor))?;
        if selected >= item.options().len() {
            return Err(SessionError::OptionOutOfRange {
                selected,
                available: item.options().len(),
            });
        }

        let correct_index = item.resolved_correct_index();
        let is_correct = |choice: usize| correct_index == Some(choice);

        // Answering again after a review replaces the earlier answer and its point.
        if let Some(previous) = self.answers.insert(self.cursor, selected)
            && is_correct(previous)
        {
            self.score = self.score.saturating_sub(1);
        }

        let correct = is_correct(selected);
        if correct {
            self.score += 1;
        }

        let correct_text = correct_index
            .and_then(|i| item.options().get(i).cloned())
            .or_else(|| Some(item.correct_text().to_string()).filter(|t| !t.is_empty()));

        let feedback = Feedback {
            correct,
            correct_text,
        };
        self.status = SessionStatus::AwaitingNext(feedback.clone());
        Ok(feedback)
    }

    pub fn advance(&mut self, quiz: &[QuizItem]) -> Result<&SessionStatus, SessionError> {
        if !matches!(self.status, SessionStatus::AwaitingNext(_)) {
            return Err(SessionError::NotAwaitingNext);
        }

        if self.cursor + 1 < quiz.len() {
            self.cursor += 1;
            self.status = SessionStatus::InProgress;
        } else {
            self.status = SessionStatus::Completed;
        }
        Ok(&self.status)
    }

    /// Walks the questions again from the top, keeping score and answers.
    pub fn review(&mut self, quiz: &[QuizItem]) -> Result<(), SessionError> {
        if self.status != SessionStatus::Completed {
            return Err(SessionError::NotCompleted);
        }
        if quiz.is_empty() {
            return Ok(());
        }
        self.cursor = 0;
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        match &self.status {
            SessionStatus::AwaitingNext(feedback) => Some(feedback),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}
