//! "Connect" screen: source database + Neo4j form and the connect action.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use schemaconsole_core::connect::ConnectForm;
use schemaconsole_shared::{DbConfig, Neo4jConfig};

use super::Action;
use crate::widgets::{Field, Form};

const HOST: usize = 0;
const PORT: usize = 1;
const DATABASE: usize = 2;
const USERNAME: usize = 3;
const PASSWORD: usize = 4;
const SCHEMA: usize = 5;
const NEO4J_URI: usize = 6;
const NEO4J_USER: usize = 7;
const NEO4J_PASSWORD: usize = 8;
const NEO4J_DATABASE: usize = 9;

pub(crate) struct ConnectScreen {
    form: Form,
    db_type: String,
    pub busy: bool,
    /// Connect steps reported so far.
    progress: Vec<String>,
    /// Summary of the live session, once connected.
    connected: Option<String>,
}

impl ConnectScreen {
    pub(crate) fn new(initial: &ConnectForm) -> Self {
        let pg = &initial.pg;
        let form = Form::new(vec![
            Field::text("Host", pg.host.clone()),
            Field::text("Port", pg.port.to_string()),
            Field::text("Database", pg.database.clone()),
            Field::text("Username", pg.username.clone()),
            Field::secret("Password", pg.password.clone()),
            Field::text("Schema", pg.schema_name.clone()),
            Field::text("Neo4j URI", initial.neo4j.uri.clone()),
            Field::text("Neo4j User", initial.neo4j.user.clone()),
            Field::secret("Neo4j Password", initial.neo4j.password.clone()),
            Field::text("Neo4j Database", initial.neo4j_database.clone()),
        ]);
        Self {
            form,
            db_type: pg.db_type.clone(),
            busy: false,
            progress: Vec::new(),
            connected: None,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.form.editing
    }

    /// Read the form back. A non-numeric port is reported, not guessed.
    pub(crate) fn to_form(&self) -> Result<ConnectForm, String> {
        let port = self
            .form
            .value(PORT)
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("Port must be a number, got '{}'", self.form.value(PORT)))?;

        Ok(ConnectForm {
            pg: DbConfig {
                db_type: self.db_type.clone(),
                host: self.form.value(HOST).trim().to_string(),
                port,
                database: self.form.value(DATABASE).trim().to_string(),
                username: self.form.value(USERNAME).trim().to_string(),
                password: self.form.value(PASSWORD).to_string(),
                schema_name: self.form.value(SCHEMA).trim().to_string(),
            },
            neo4j: Neo4jConfig {
                uri: self.form.value(NEO4J_URI).trim().to_string(),
                user: self.form.value(NEO4J_USER).trim().to_string(),
                password: self.form.value(NEO4J_PASSWORD).to_string(),
            },
            neo4j_database: self.form.value(NEO4J_DATABASE).trim().to_string(),
        })
    }

    pub(crate) fn started(&mut self) {
        self.busy = true;
        self.progress.clear();
    }

    pub(crate) fn phase(&mut self, name: String) {
        self.progress.push(name);
    }

    pub(crate) fn finished(&mut self, summary: Option<String>) {
        self.busy = false;
        self.connected = summary;
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(self.form.height()),
                Constraint::Length(1),
                Constraint::Min(1),
            ])
            .split(area);

        self.form.draw(f, chunks[0], self.connected.is_none());

        let hint = if self.connected.is_some() {
            "Connected · x to exit the session · 2-4 to switch tabs"
        } else if self.form.editing {
            "Type to edit · Esc to stop editing · Tab to next field"
        } else {
            "Enter to edit · ↑/↓ to move · c to connect"
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            chunks[1],
        );

        let mut lines: Vec<Line> = Vec::new();
        if let Some(summary) = &self.connected {
            lines.push(Line::from(summary.as_str()).style(Style::default().fg(Color::Green)));
        } else {
            for (i, step) in self.progress.iter().enumerate() {
                let done = i + 1 < self.progress.len() || !self.busy;
                let mark = if done { "✓" } else { "…" };
                lines.push(Line::from(format!("{mark} {step}")));
            }
            if self.progress.is_empty() {
                lines.push(Line::from("Fill in both connections and press c."));
            }
        }
        f.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title(" Status ")),
            chunks[2],
        );
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> Action {
        if self.connected.is_some() || self.busy {
            return Action::None;
        }
        if self.form.editing {
            self.form.edit_key(code);
            return Action::None;
        }
        match code {
            KeyCode::Char('c') => match self.to_form() {
                Ok(form) if form.can_connect() => Action::Connect(Box::new(form)),
                Ok(form) => Action::Status(format!(
                    "Missing: {}",
                    form.missing_fields().join(", ")
                )),
                Err(msg) => Action::Status(msg),
            },
            other => {
                self.form.nav_key(other);
                Action::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial() -> ConnectForm {
        ConnectForm {
            pg: DbConfig {
                database: "hr".into(),
                ..DbConfig::default()
            },
            neo4j: Neo4jConfig {
                uri: "bolt://localhost:7687".into(),
                user: "neo4j".into(),
                password: "pw".into(),
            },
            neo4j_database: String::new(),
        }
    }

    #[test]
    fn form_round_trips_through_fields() {
        let screen = ConnectScreen::new(&initial());
        assert_eq!(screen.to_form().unwrap(), initial());
    }

    #[test]
    fn bad_port_is_reported() {
        let mut screen = ConnectScreen::new(&initial());
        screen.form.fields[PORT].value = "54x".into();
        let action = screen.handle_key(KeyCode::Char('c'), KeyModifiers::NONE);
        assert!(matches!(action, Action::Status(msg) if msg.contains("Port")));
    }

    #[test]
    fn connect_needs_required_fields() {
        let mut screen = ConnectScreen::new(&initial());
        assert!(matches!(
            screen.handle_key(KeyCode::Char('c'), KeyModifiers::NONE),
            Action::Connect(_)
        ));

        screen.form.fields[NEO4J_PASSWORD].value.clear();
        let action = screen.handle_key(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(action, Action::Status("Missing: neo4j password".into()));
    }

    #[test]
    fn keys_are_ignored_once_connected() {
        let mut screen = ConnectScreen::new(&initial());
        screen.finished(Some("Connected".into()));
        assert_eq!(
            screen.handle_key(KeyCode::Char('c'), KeyModifiers::NONE),
            Action::None
        );
    }
}
