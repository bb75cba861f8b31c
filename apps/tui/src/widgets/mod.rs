//! Reusable TUI widgets.

use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str, busy: bool) -> Paragraph<'_> {
    let prefix = if busy { " ⏳ " } else { " " };
    Paragraph::new(format!("{prefix}{msg}"))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White))
}

/// Border style for a form field.
pub(crate) fn field_style(focused: bool, editing: bool) -> Style {
    match (focused, editing) {
        (true, true) => Style::default().fg(Color::Yellow),
        (true, false) => Style::default().fg(Color::Cyan),
        _ => Style::default(),
    }
}

/// A centered rectangle with percentage width and height.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// One text input.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub label: &'static str,
    pub value: String,
    pub secret: bool,
}

impl Field {
    pub(crate) fn text(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
            secret: false,
        }
    }

    pub(crate) fn secret(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
            secret: true,
        }
    }

    fn shown(&self) -> String {
        if self.secret {
            "•".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}

/// A vertical list of text inputs with one focused field.
#[derive(Debug, Clone)]
pub(crate) struct Form {
    pub fields: Vec<Field>,
    pub focused: usize,
    pub editing: bool,
}

impl Form {
    pub(crate) fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            focused: 0,
            editing: false,
        }
    }

    pub(crate) fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.value.as_str()).unwrap_or("")
    }

    pub(crate) fn next(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + 1) % self.fields.len();
        }
    }

    pub(crate) fn prev(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Apply a key while editing. Returns false when the key was not used.
    pub(crate) fn edit_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Esc | KeyCode::Enter => self.editing = false,
            KeyCode::Tab => {
                self.editing = false;
                self.next();
            }
            KeyCode::Backspace => {
                if let Some(f) = self.fields.get_mut(self.focused) {
                    f.value.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(f) = self.fields.get_mut(self.focused) {
                    f.value.push(c);
                }
            }
            _ => return false,
        }
        true
    }

    /// Apply a navigation key while not editing.
    pub(crate) fn nav_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Enter => self.editing = true,
            KeyCode::Down | KeyCode::Tab => self.next(),
            KeyCode::Up | KeyCode::BackTab => self.prev(),
            _ => return false,
        }
        true
    }

    /// Render fields in a two-column grid of bordered inputs.
    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, active: bool) {
        let rows = self.fields.len().div_ceil(2);
        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(3); rows])
            .split(area);

        for (i, field) in self.fields.iter().enumerate() {
            let Some(row) = row_areas.get(i / 2) else {
                break;
            };
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(*row);

            let focused = active && i == self.focused;
            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", field.label))
                .border_style(field_style(focused, focused && self.editing));
            f.render_widget(Paragraph::new(field.shown()).block(block), cols[i % 2]);
        }
    }

    /// Height the grid needs.
    pub(crate) fn height(&self) -> u16 {
        (self.fields.len().div_ceil(2) * 3) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> Form {
        Form::new(vec![Field::text("Host", "localhost"), Field::secret("Password", "")])
    }

    #[test]
    fn editing_appends_and_pops() {
        let mut form = form();
        assert!(form.nav_key(KeyCode::Enter));
        assert!(form.editing);
        form.edit_key(KeyCode::Backspace);
        form.edit_key(KeyCode::Char('X'));
        assert_eq!(form.value(0), "localhosX");
        form.edit_key(KeyCode::Tab);
        assert!(!form.editing);
        assert_eq!(form.focused, 1);
    }

    #[test]
    fn navigation_wraps() {
        let mut form = form();
        form.prev();
        assert_eq!(form.focused, 1);
        form.next();
        assert_eq!(form.focused, 0);
    }

    #[test]
    fn secrets_are_masked() {
        let field = Field::secret("Password", "hunter2");
        assert_eq!(field.shown(), "•••••••");
        assert_eq!(Field::text("Host", "db").shown(), "db");
    }
}
