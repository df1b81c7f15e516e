use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

/// Scrollable text panel. Lines starting with `#` render as headings and
/// lines starting with `-` as list items.
pub struct ContentViewer {
    pub content: String,
    pub scroll: usize,
    pub title: String,
    wrapped: Vec<String>,
}

impl ContentViewer {
    pub fn new(content: String, title: String) -> Self {
        let wrapped = content.lines().map(str::to_string).collect();
        Self {
            content,
            scroll: 0,
            title,
            wrapped,
        }
    }

    fn line_count(&self) -> usize {
        self.wrapped.len()
    }

    pub fn handle_key(&mut self, key: KeyEvent, area_height: usize) -> bool {
        let page_size = area_height.saturating_sub(2);
        let max_scroll = self.line_count().saturating_sub(page_size);
        match key.code {
            KeyCode::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                true
            }
            KeyCode::Down => {
                if self.scroll < max_scroll {
                    self.scroll += 1;
                }
                true
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(page_size);
                true
            }
            KeyCode::PageDown => {
                self.scroll = (self.scroll + page_size).min(max_scroll);
                true
            }
            KeyCode::Home => {
                self.scroll = 0;
                true
            }
            KeyCode::End => {
                self.scroll = max_scroll;
                true
            }
            _ => false,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, area_height: usize) -> bool {
        let code = match mouse.kind {
            MouseEventKind::ScrollUp => KeyCode::Up,
            MouseEventKind::ScrollDown => KeyCode::Down,
            _ => return false,
        };
        self.handle_key(KeyEvent::from(code), area_height)
    }

    fn rewrap(&mut self, width: usize) {
        let width = width.max(10);
        self.wrapped = self
            .content
            .lines()
            .flat_map(|line| {
                if line.is_empty() {
                    return vec![String::new()];
                }
                let indent = if line.starts_with("- ") { "  " } else { "" };
                let options = textwrap::Options::new(width).subsequent_indent(indent);
                textwrap::wrap(line, options)
                    .into_iter()
                    .map(|l| l.into_owned())
                    .collect()
            })
            .collect();
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        self.rewrap(area.width.saturating_sub(2) as usize);

        let visible_lines = area.height.saturating_sub(2) as usize;
        let total_lines = self.line_count();
        self.scroll = self.scroll.min(total_lines.saturating_sub(visible_lines));

        let lines: Vec<Line> = self
            .wrapped
            .iter()
            .skip(self.scroll)
            .take(visible_lines)
            .map(|line| {
                if let Some(heading) = line.strip_prefix("# ") {
                    Line::from(Span::styled(
                        heading.to_string(),
                        Style::default().fg(Color::Yellow),
                    ))
                } else if line.starts_with("- ") || line.starts_with("  ") {
                    Line::from(Span::styled(line.as_str(), Style::default().fg(Color::Green)))
                } else {
                    Line::from(Span::raw(line.as_str()))
                }
            })
            .collect();

        let scroll_info = if total_lines > visible_lines {
            format!(
                " (lines {}-{} of {})",
                self.scroll + 1,
                (self.scroll + visible_lines).min(total_lines),
                total_lines
            )
        } else {
            String::new()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{}{scroll_info}", self.title));

        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    pub fn set_content(&mut self, content: String) {
        self.wrapped = content.lines().map(str::to_string).collect();
        self.content = content;
        self.scroll = 0;
    }
}
