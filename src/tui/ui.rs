use crate::core::session::SessionStatus;
use crate::tui::app::{App, AppState, MENU_OPTIONS, ResultsTab};
use crate::tui::components::Reveal;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
};

pub fn draw(f: &mut Frame, app: &mut App) {
    match app.state.clone() {
        AppState::Home => draw_home(f, app),
        AppState::NewVideo => draw_new_video(f, app),
        AppState::Processing { video_reference } => draw_processing(f, app, &video_reference),
        AppState::Results { tab } => draw_results(f, app, tab),
        AppState::Settings => draw_settings(f, app),
    }
}

fn title_bar(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
}

fn help_bar(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
}

fn draw_home(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(1),    // Menu
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    f.render_widget(title_bar("YouTube Learning Assistant"), chunks[0]);

    let menu_items: Vec<ListItem> = MENU_OPTIONS
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let disabled = i == 1 && app.results.is_none();
            let (marker, style) = if i == app.selected_option {
                (
                    "●",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            } else if disabled {
                ("○", Style::default().fg(Color::DarkGray))
            } else {
                ("○", Style::default().fg(Color::White))
            };

            ListItem::new(Line::from(Span::styled(format!("{marker} {option}"), style)))
        })
        .collect();

    let menu = List::new(menu_items)
        .block(Block::default().borders(Borders::ALL).title("Menu"))
        .style(Style::default().fg(Color::White));
    f.render_widget(menu, chunks[1]);

    f.render_widget(
        help_bar("[↑↓] Navigate  [Enter] Select  [q] Exit"),
        chunks[2],
    );
}

fn draw_new_video(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // URL input
            Constraint::Min(1),    // Hint
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    f.render_widget(title_bar("New Video"), chunks[0]);

    app.url_input.render(f, chunks[1]);

    let hint = Paragraph::new(
        "Paste a YouTube link. The transcript is turned into a summary, key points, \
         a multiple-choice quiz and a list of related learning resources.",
    )
    .style(Style::default().fg(Color::Gray))
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("About"));
    f.render_widget(hint, chunks[2]);

    f.render_widget(help_bar("[Enter] Process  [Esc] Back"), chunks[3]);
}

fn draw_processing(f: &mut Frame, app: &App, video_reference: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(1),    // Progress area
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    f.render_widget(title_bar("Processing..."), chunks[0]);

    app.progress_bar.render(f, chunks[1], video_reference);

    f.render_widget(help_bar("[Esc] Cancel"), chunks[2]);
}

fn draw_results(f: &mut Frame, app: &mut App, tab: ResultsTab) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(1),    // Content
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    let title = app
        .results
        .as_ref()
        .map(|r| r.title.clone())
        .unwrap_or_default();
    let tabs = Tabs::new(ResultsTab::ALL.iter().map(|t| t.title()))
        .block(Block::default().borders(Borders::ALL).title(title))
        .select(tab.index())
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[0]);

    app.viewer_height = chunks[1].height;
    let help = match tab {
        ResultsTab::Summary => {
            app.summary_viewer.render(f, chunks[1]);
            "[↑↓] Scroll  [PgUp/PgDn] Page  [Tab] Next tab  [Esc] Home"
        }
        ResultsTab::Resources => {
            app.resources_viewer.render(f, chunks[1]);
            "[↑↓] Scroll  [PgUp/PgDn] Page  [Tab] Next tab  [Esc] Home"
        }
        ResultsTab::Quiz => draw_quiz(f, app, chunks[1]),
    };

    f.render_widget(help_bar(help), chunks[2]);
}

fn notice_line(app: &App) -> Line<'_> {
    match &app.quiz_notice {
        Some(notice) => Line::from(Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Red),
        )),
        None => Line::default(),
    }
}

fn message_panel(f: &mut Frame, area: Rect, lines: Vec<Line>) {
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Quiz"));
    f.render_widget(paragraph, area);
}

/// Draws the quiz tab and returns the matching key help.
fn draw_quiz(f: &mut Frame, app: &mut App, area: Rect) -> &'static str {
    let Some(results) = &app.results else {
        return "[Esc] Home";
    };
    let quiz = &results.quiz_items;

    if app.regenerating {
        message_panel(f, area, vec![Line::from("Generating quiz questions...")]);
        return "[Tab] Next tab  [Esc] Home";
    }

    if quiz.is_empty() {
        message_panel(
            f,
            area,
            vec![
                Line::from("Quiz not available."),
                notice_line(app),
                Line::default(),
                Line::from("Press [g] to generate a quiz now."),
            ],
        );
        return "[g] Generate quiz  [Tab] Next tab  [Esc] Home";
    }

    match &app.quiz.status {
        SessionStatus::NotStarted => {
            message_panel(
                f,
                area,
                vec![
                    Line::from(format!("{} questions ready.", quiz.len())),
                    notice_line(app),
                    Line::default(),
                    Line::from("Press [Enter] to start."),
                ],
            );
            "[Enter] Start  [Tab] Next tab  [Esc] Home"
        }
        SessionStatus::Completed => {
            message_panel(
                f,
                area,
                vec![
                    Line::from(Span::styled(
                        format!(
                            "Quiz completed! Your score: {}/{}",
                            app.quiz.score,
                            quiz.len()
                        ),
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )),
                    notice_line(app),
                    Line::default(),
                    Line::from("[r] Restart with new questions   [v] Review"),
                ],
            );
            "[r] Restart  [v] Review  [Tab] Next tab  [Esc] Home"
        }
        SessionStatus::InProgress | SessionStatus::AwaitingNext(_) => {
            let Some(item) = app.quiz.current(quiz) else {
                return "[Esc] Home";
            };

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(5), // Question
                    Constraint::Length(6), // Options
                    Constraint::Min(1),    // Feedback
                ])
                .split(area);

            let header = format!(
                "Question {} of {}  |  Score: {}",
                app.quiz.cursor + 1,
                quiz.len(),
                app.quiz.score
            );
            let question = Paragraph::new(item.question())
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title(header));
            f.render_widget(question, chunks[0]);

            let feedback = app.quiz.feedback().cloned();
            let reveal = feedback.as_ref().and_then(|_| {
                app.quiz.answers.get(&app.quiz.cursor).map(|&chosen| Reveal {
                    chosen,
                    correct: item.resolved_correct_index(),
                })
            });
            app.choices.render(f, chunks[1], "Options", reveal);

            let (lines, help) = match feedback {
                Some(feedback) => {
                    let color = if feedback.correct {
                        Color::Green
                    } else {
                        Color::Red
                    };
                    let next = if app.quiz.cursor + 1 < quiz.len() {
                        "Press [Enter] for the next question."
                    } else {
                        "Press [Enter] to see your score."
                    };
                    (
                        vec![
                            Line::from(Span::styled(
                                feedback.to_string(),
                                Style::default().fg(color).add_modifier(Modifier::BOLD),
                            )),
                            Line::default(),
                            Line::from(next),
                        ],
                        "[Enter] Next  [Tab] Next tab  [Esc] Home",
                    )
                }
                None => (
                    vec![notice_line(app)],
                    "[↑↓] Choose  [Enter] Submit  [Tab] Next tab  [Esc] Home",
                ),
            };
            let feedback_panel =
                Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Feedback"));
            f.render_widget(feedback_panel, chunks[2]);
            help
        }
    }
}

fn draw_settings(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(1),    // Settings content
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    f.render_widget(title_bar("Settings"), chunks[0]);

    let lines: Vec<Line> = app
        .settings
        .iter()
        .map(|line| {
            if line.starts_with('⚠') {
                Line::from(Span::styled(line.as_str(), Style::default().fg(Color::Red)))
            } else {
                Line::from(line.as_str())
            }
        })
        .collect();
    let settings_content = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Active configuration"));
    f.render_widget(settings_content, chunks[1]);

    f.render_widget(
        help_bar("Configure through the environment or a .env file  [Esc] Back"),
        chunks[2],
    );
}
