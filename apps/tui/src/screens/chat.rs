//! "Chat" tab and the KG chat page.
//!
//! The tab shows whether the knowledge graph is ready and opens the chat
//! page; the page holds the conversation and the input line.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use schemaconsole_core::chat::{KgChat, Role};

use super::Action;

pub(crate) struct ChatScreen {
    pub kg: Option<KgChat>,
    /// Neo4j URI of a ready session, for the tab view.
    pub ready_uri: Option<String>,
    input: String,
    /// Lines scrolled up from the bottom.
    scroll: u16,
}

impl ChatScreen {
    pub(crate) fn new() -> Self {
        Self {
            kg: None,
            ready_uri: None,
            input: String::new(),
            scroll: 0,
        }
    }

    pub(crate) fn is_thinking(&self) -> bool {
        self.kg.as_ref().is_some_and(KgChat::is_thinking)
    }

    pub(crate) fn reset_scroll(&mut self) {
        self.scroll = 0;
    }

    /// Keys on the workspace Chat tab.
    pub(crate) fn handle_tab_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Enter => Action::OpenChat,
            _ => Action::None,
        }
    }

    /// Keys on the chat page. All printable keys go to the input line.
    pub(crate) fn handle_page_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action {
        match code {
            KeyCode::Esc => Action::LeaveChat,
            KeyCode::Char('n') if modifiers.contains(KeyModifiers::CONTROL) => {
                if self.is_thinking() {
                    Action::None
                } else {
                    self.input.clear();
                    self.scroll = 0;
                    Action::NewChat
                }
            }
            KeyCode::Enter => {
                if self.is_thinking() || self.input.trim().is_empty() {
                    return Action::None;
                }
                self.scroll = 0;
                Action::Ask(std::mem::take(&mut self.input))
            }
            KeyCode::Backspace => {
                self.input.pop();
                Action::None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_add(5);
                Action::None
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_sub(5);
                Action::None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    pub(crate) fn draw_tab(&self, f: &mut Frame, area: Rect) {
        let lines = match &self.ready_uri {
            Some(uri) => vec![
                Line::from("Knowledge graph is loaded.").style(Style::default().fg(Color::Green)),
                Line::from(""),
                Line::from(format!("Neo4j: {uri}")),
                Line::from(""),
                Line::from("Press Enter to open the chat."),
            ],
            None => vec![
                Line::from("Session Not Initialized").style(Style::default().fg(Color::Red)),
                Line::from(""),
                Line::from("Connect first so the knowledge graph is loaded."),
            ],
        };
        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title(" Chatbot ")),
            area,
        );
    }

    pub(crate) fn draw_page(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Min(3),    // Transcript
                Constraint::Length(3), // Input
            ])
            .split(area);

        let Some(kg) = &self.kg else {
            f.render_widget(Paragraph::new("No conversation open."), chunks[1]);
            return;
        };

        let browser = kg.kg_browser_url().unwrap_or_default();
        f.render_widget(
            Paragraph::new(format!(
                " Knowledge Graph Assistant · {} · {browser}",
                kg.title()
            ))
            .style(Style::default().fg(Color::Cyan)),
            chunks[0],
        );

        let mut lines: Vec<Line> = Vec::new();
        for message in kg.messages() {
            let (who, color) = match message.role {
                Role::User => ("you", Color::Yellow),
                Role::Bot => ("bot", Color::Green),
            };
            lines.push(Line::from(Span::styled(
                format!("{who}:"),
                Style::default().fg(color).bold(),
            )));
            for text_line in message.text.lines() {
                lines.push(Line::from(text_line.to_string()));
            }
            lines.push(Line::from(""));
        }
        if kg.is_thinking() {
            lines.push(Line::from("Thinking…").style(Style::default().fg(Color::DarkGray)));
        }

        let inner_width = chunks[1].width.saturating_sub(2).max(1) as usize;
        let inner_height = chunks[1].height.saturating_sub(2) as usize;
        let total: usize = lines
            .iter()
            .map(|l| l.width().max(1).div_ceil(inner_width))
            .sum();
        let bottom = total.saturating_sub(inner_height) as u16;
        let offset = bottom.saturating_sub(self.scroll);

        f.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .scroll((offset, 0))
                .block(Block::default().borders(Borders::ALL)),
            chunks[1],
        );

        let title = if kg.is_thinking() {
            " Waiting for the answer… "
        } else {
            " Ask · Enter send · Ctrl-N new chat · Esc back "
        };
        f.render_widget(
            Paragraph::new(self.input.as_str())
                .block(Block::default().borders(Borders::ALL).title(title)),
            chunks[2],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_sends_input_once() {
        let mut screen = ChatScreen::new();
        assert_eq!(screen.handle_page_key(KeyCode::Enter, KeyModifiers::NONE), Action::None);

        for c in "who leads HR?".chars() {
            screen.handle_page_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
        assert_eq!(
            screen.handle_page_key(KeyCode::Enter, KeyModifiers::NONE),
            Action::Ask("who leads HR?".into())
        );
        assert!(screen.input.is_empty());
    }

    #[test]
    fn page_keys() {
        let mut screen = ChatScreen::new();
        assert_eq!(screen.handle_page_key(KeyCode::Esc, KeyModifiers::NONE), Action::LeaveChat);
        assert_eq!(
            screen.handle_page_key(KeyCode::Char('n'), KeyModifiers::CONTROL),
            Action::NewChat
        );
        screen.handle_page_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(screen.input, "q");
        screen.handle_page_key(KeyCode::PageUp, KeyModifiers::NONE);
        assert_eq!(screen.scroll, 5);
    }

    #[test]
    fn tab_enter_opens_chat() {
        let mut screen = ChatScreen::new();
        assert_eq!(screen.handle_tab_key(KeyCode::Enter), Action::OpenChat);
        assert_eq!(screen.handle_tab_key(KeyCode::Char('x')), Action::None);
    }
}
