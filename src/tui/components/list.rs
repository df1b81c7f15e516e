use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};

const LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// How the options of an answered question are coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reveal {
    pub chosen: usize,
    pub correct: Option<usize>,
}

/// Answer options of the current quiz question.
pub struct ChoiceList {
    pub items: Vec<String>,
    pub state: ListState,
}

impl ChoiceList {
    pub fn new(items: Vec<String>) -> Self {
        let mut list = Self {
            items: Vec::new(),
            state: ListState::default(),
        };
        list.update_items(items);
        list
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => {
                self.previous();
                true
            }
            KeyCode::Down => {
                self.next();
                true
            }
            KeyCode::Home => {
                self.select(0);
                true
            }
            KeyCode::End => {
                self.select(self.items.len().saturating_sub(1));
                true
            }
            _ => false,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> bool {
        match mouse.kind {
            MouseEventKind::ScrollUp => {
                self.previous();
                true
            }
            MouseEventKind::ScrollDown => {
                self.next();
                true
            }
            _ => false,
        }
    }

    pub fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }

        let i = match self.state.selected() {
            Some(i) => (i + 1) % self.items.len(),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }

        let i = match self.state.selected() {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn select(&mut self, index: usize) {
        if index < self.items.len() {
            self.state.select(Some(index));
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.state.selected().filter(|&i| i < self.items.len())
    }

    pub fn update_items(&mut self, new_items: Vec<String>) {
        self.items = new_items;
        self.state = ListState::default();
        if !self.items.is_empty() {
            self.state.select(Some(0));
        }
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, title: &str, reveal: Option<Reveal>) {
        let items: Vec<ListItem> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, option)| {
                let letter = LETTERS.get(i).copied().unwrap_or('?');
                let style = match reveal {
                    Some(r) if r.correct == Some(i) => Style::default().fg(Color::Green),
                    Some(r) if r.chosen == i => Style::default().fg(Color::Red),
                    _ => Style::default().fg(Color::White),
                };

                ListItem::new(Line::from(vec![
                    Span::styled(format!("{letter}. "), Style::default().fg(Color::Cyan)),
                    Span::styled(option.as_str(), style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_symbol("▶ ")
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            );

        f.render_stateful_widget(list, area, &mut self.state);
    }
}

impl Default for ChoiceList {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
