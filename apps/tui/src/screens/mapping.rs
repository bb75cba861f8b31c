//! "Mapping" screen: run hybrid mapping against a target database, then
//! review and edit the proposed column matches.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use schemaconsole_core::mapping::{
    ConfidenceLevel, EDITABLE_COLUMNS, MappingOptions, MappingState, dashboard_entries,
};
use schemaconsole_shared::DbConfig;

use super::Action;
use crate::widgets::{Field, Form, centered_rect};

const HOST: usize = 0;
const PORT: usize = 1;
const DATABASE: usize = 2;
const USERNAME: usize = 3;
const PASSWORD: usize = 4;
const SCHEMA: usize = 5;
const MIN_CONFIDENCE: usize = 6;
const TOP_K: usize = 7;
const QDRANT_HOST: usize = 8;
const QDRANT_PORT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Form,
    Sheet,
}

pub(crate) struct MappingScreen {
    form: Form,
    options: MappingOptions,
    db_type: String,
    pane: Pane,
    pub state: Option<MappingState>,
    selected: usize,
    /// Index into [`EDITABLE_COLUMNS`].
    edit_column: usize,
    show_legend: bool,
    pub busy: bool,
}

impl MappingScreen {
    pub(crate) fn new(target: &DbConfig, options: MappingOptions) -> Self {
        Self {
            form: Form::new(vec![
                Field::text("Target Host", target.host.clone()),
                Field::text("Target Port", target.port.to_string()),
                Field::text("Target Database", target.database.clone()),
                Field::text("Target Username", target.username.clone()),
                Field::secret("Target Password", target.password.clone()),
                Field::text("Target Schema", target.schema_name.clone()),
                Field::text("Min Confidence", options.min_confidence.to_string()),
                Field::text("Top K Dense", options.top_k_dense.to_string()),
                Field::text("Qdrant Host", options.qdrant_host.clone()),
                Field::text("Qdrant Port", options.qdrant_port.to_string()),
            ]),
            db_type: target.db_type.clone(),
            options,
            pane: Pane::Form,
            state: None,
            selected: 0,
            edit_column: 0,
            show_legend: false,
            busy: false,
        }
    }

    /// Restore a previous run; its target fills the form, the password stays.
    pub(crate) fn restore(&mut self, state: MappingState) {
        let t = &state.target;
        for (index, value) in [
            (HOST, t.host.clone()),
            (PORT, t.port.to_string()),
            (DATABASE, t.database.clone()),
            (USERNAME, t.username.clone()),
            (SCHEMA, t.schema_name.clone()),
            (MIN_CONFIDENCE, state.options.min_confidence.to_string()),
            (TOP_K, state.options.top_k_dense.to_string()),
            (QDRANT_HOST, state.options.qdrant_host.clone()),
            (QDRANT_PORT, state.options.qdrant_port.to_string()),
        ] {
            self.form.fields[index].value = value;
        }
        self.db_type = t.db_type.clone();
        self.options = state.options.clone();
        self.show(state);
    }

    /// Show a fresh result and move to the sheet.
    pub(crate) fn show(&mut self, state: MappingState) {
        self.selected = 0;
        if !state.sheet.is_empty() {
            self.pane = Pane::Sheet;
        }
        self.state = Some(state);
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.form.editing
    }

    fn target(&self) -> Result<DbConfig, String> {
        Ok(DbConfig {
            db_type: self.db_type.clone(),
            host: self.form.value(HOST).trim().to_string(),
            port: parse(self.form.value(PORT), "Target port")?,
            database: self.form.value(DATABASE).trim().to_string(),
            username: self.form.value(USERNAME).trim().to_string(),
            password: self.form.value(PASSWORD).to_string(),
            schema_name: self.form.value(SCHEMA).trim().to_string(),
        })
    }

    fn run_options(&self) -> Result<MappingOptions, String> {
        let options = MappingOptions {
            format: self.options.format,
            min_confidence: parse(self.form.value(MIN_CONFIDENCE), "Min confidence")?,
            top_k_dense: parse(self.form.value(TOP_K), "Top K")?,
            qdrant_host: self.form.value(QDRANT_HOST).trim().to_string(),
            qdrant_port: parse(self.form.value(QDRANT_PORT), "Qdrant port")?,
        };
        options.validate().map_err(|e| e.to_string())?;
        Ok(options)
    }

    fn run_action(&self) -> Action {
        let target = match self.target() {
            Ok(t) => t,
            Err(msg) => return Action::Status(msg),
        };
        if target.database.is_empty() {
            return Action::Status("Target database is required.".into());
        }
        match self.run_options() {
            Ok(options) => Action::RunMapping {
                target: Box::new(target),
                options,
            },
            Err(msg) => Action::Status(msg),
        }
    }

    fn column(&self) -> &'static str {
        EDITABLE_COLUMNS[self.edit_column % EDITABLE_COLUMNS.len()]
    }

    /// Step the selected row's edit column through its allowed values.
    fn cycle_value(&mut self, forward: bool) -> Action {
        let column = self.column();
        let selected = self.selected;
        let Some(state) = self.state.as_mut() else {
            return Action::None;
        };
        let Some(options) = state.sheet.options_for(column).filter(|o| !o.is_empty()) else {
            return Action::None;
        };
        let Some(row) = state.sheet.rows().get(selected) else {
            return Action::None;
        };

        let current = options.iter().position(|o| *o == row.text(column));
        let len = options.len();
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
            (None, _) => 0,
        };
        match state.sheet.update_row(selected, column, &options[next]) {
            Ok(()) => Action::PersistMapping,
            Err(e) => Action::Status(e.to_string()),
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> Action {
        if self.show_legend {
            self.show_legend = false;
            return Action::None;
        }
        if self.busy {
            return Action::None;
        }
        if self.form.editing {
            self.form.edit_key(code);
            return Action::None;
        }

        match (self.pane, code) {
            (_, KeyCode::Tab) => {
                self.pane = match self.pane {
                    Pane::Form => Pane::Sheet,
                    Pane::Sheet => Pane::Form,
                };
                Action::None
            }
            (_, KeyCode::Char('l')) => {
                self.show_legend = true;
                Action::None
            }
            (_, KeyCode::Char('r')) => self.run_action(),
            (Pane::Form, KeyCode::Left) => {
                self.options.format = self.options.format.prev();
                Action::None
            }
            (Pane::Form, KeyCode::Right) => {
                self.options.format = self.options.format.next();
                Action::None
            }
            (Pane::Form, KeyCode::Enter | KeyCode::Up | KeyCode::Down) => {
                self.form.nav_key(code);
                Action::None
            }
            (Pane::Sheet, KeyCode::Up) => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            (Pane::Sheet, KeyCode::Down) => {
                let len = self.state.as_ref().map_or(0, |s| s.sheet.len());
                if self.selected + 1 < len {
                    self.selected += 1;
                }
                Action::None
            }
            (Pane::Sheet, KeyCode::Char('c')) => {
                self.edit_column = (self.edit_column + 1) % EDITABLE_COLUMNS.len();
                Action::Status(format!("Editing {}", self.column()))
            }
            (Pane::Sheet, KeyCode::Left) => self.cycle_value(false),
            (Pane::Sheet, KeyCode::Right) => self.cycle_value(true),
            (Pane::Sheet, KeyCode::Char('s')) => match self.state.as_mut() {
                Some(state) if !state.sheet.is_empty() => {
                    state.sheet.save();
                    Action::PersistMapping
                }
                _ => Action::Status("No mapping rows to save.".into()),
            },
            (Pane::Sheet, KeyCode::Char('e')) => match &self.state {
                Some(state) if state.sheet.is_saved() => Action::ExportMapping,
                Some(_) => Action::Status("Save your changes before downloading.".into()),
                None => Action::Status("Run a mapping first.".into()),
            },
            (Pane::Sheet, KeyCode::Char('d')) => match &self.state {
                Some(state) if state.result.saved_file.is_some() => Action::DownloadMapping,
                _ => Action::Status("No backend mapping file to download.".into()),
            },
            _ => Action::None,
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(self.form.height()),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(3),
            ])
            .split(area);

        self.form.draw(f, chunks[0], self.pane == Pane::Form);

        let hint = match self.pane {
            Pane::Form => format!(
                "Format < {} > (←/→) · Enter edit · r run · Tab sheet · l legend",
                self.options.format
            ),
            Pane::Sheet => format!(
                "↑/↓ row · c column [{}] · ←/→ change · s save · e export · d download · Tab form",
                self.column()
            ),
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            chunks[1],
        );

        let Some(state) = &self.state else {
            let msg = if self.busy {
                "Generating mapping…"
            } else {
                "No mapping yet. Fill in the target and press r."
            };
            f.render_widget(Paragraph::new(msg).alignment(Alignment::Center), chunks[3]);
            return;
        };

        let dashboard = dashboard_entries(&state.result)
            .into_iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("  ·  ");
        f.render_widget(Paragraph::new(dashboard), chunks[2]);

        self.draw_sheet(f, chunks[3], state);

        if self.show_legend {
            draw_legend(f, area);
        }
    }

    fn draw_sheet(&self, f: &mut Frame, area: Rect, state: &MappingState) {
        let title = format!(
            " Mapping ({} rows, {}) ",
            state.sheet.len(),
            if state.sheet.is_saved() { "saved" } else { "unsaved" }
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(if self.pane == Pane::Sheet {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            });

        if state.sheet.is_empty() {
            f.render_widget(
                Paragraph::new("No mapping rows.").block(block),
                area,
            );
            return;
        }

        let columns = state.sheet.columns();
        let visible = area.height.saturating_sub(3).max(1) as usize;
        let offset = self.selected.saturating_sub(visible - 1);
        let edit = self.column();

        let rows = state
            .sheet
            .rows()
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .map(|(i, row)| {
                let is_selected = i == self.selected;
                let mut cells: Vec<Cell> = columns
                    .iter()
                    .map(|c| {
                        let cell = Cell::from(row.text(c));
                        if is_selected && c == edit {
                            cell.style(Style::default().fg(Color::Yellow).bold())
                        } else {
                            cell
                        }
                    })
                    .collect();
                let level = ConfidenceLevel::of_row(row);
                cells.push(
                    Cell::from(level.map(|l| l.label()).unwrap_or_default())
                        .style(Style::default().fg(level_color(level))),
                );
                let style = if is_selected {
                    Style::default().bg(Color::DarkGray)
                } else {
                    Style::default()
                };
                Row::new(cells).style(style)
            });

        let mut header: Vec<Cell> = columns.iter().map(|c| Cell::from(c.as_str())).collect();
        header.push(Cell::from("level"));
        let widths = vec![Constraint::Min(8); columns.len() + 1];

        let table = Table::new(rows, widths)
            .header(Row::new(header).style(Style::default().bold()))
            .block(block);
        f.render_widget(table, area);
    }
}

fn parse<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{what} is not a valid number: '{raw}'"))
}

fn level_color(level: Option<ConfidenceLevel>) -> Color {
    match level {
        Some(ConfidenceLevel::VeryHigh) => Color::Green,
        Some(ConfidenceLevel::High) => Color::LightGreen,
        Some(ConfidenceLevel::Medium) => Color::Yellow,
        Some(ConfidenceLevel::Low) => Color::LightRed,
        Some(ConfidenceLevel::VeryLow) => Color::Red,
        None => Color::Reset,
    }
}

fn draw_legend(f: &mut Frame, area: Rect) {
    let popup = centered_rect(40, 40, area);
    let rows = ConfidenceLevel::ALL.iter().map(|l| {
        Row::new(vec![
            Cell::from(l.range()),
            Cell::from(l.label()).style(Style::default().fg(level_color(Some(*l)))),
        ])
    });
    let table = Table::new(rows, [Constraint::Length(14), Constraint::Min(10)])
        .header(Row::new(vec!["Score", "Level"]).style(Style::default().bold()))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Confidence Levels Legend "),
        );
    f.render_widget(Clear, popup);
    f.render_widget(table, popup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaconsole_core::mapping::MappingSheet;
    use schemaconsole_shared::{MappingResponse, MappingRow};
    use serde_json::json;

    fn row(table: &str, column: &str, confidence: f64) -> MappingRow {
        let value = json!({
            "source_table": "emp",
            "source_column": "emp_id",
            "target_table": table,
            "best_match_column": column,
            "confidence": confidence,
        });
        match value {
            serde_json::Value::Object(map) => MappingRow(map),
            _ => unreachable!(),
        }
    }

    fn screen_with_rows() -> MappingScreen {
        let mut screen = MappingScreen::new(
            &DbConfig {
                database: "warehouse".into(),
                ..DbConfig::default()
            },
            MappingOptions::default(),
        );
        screen.show(MappingState {
            options: MappingOptions::default(),
            target: DbConfig::default(),
            result: MappingResponse::default(),
            sheet: MappingSheet::new(vec![
                row("employees", "employee_id", 0.93),
                row("staff", "staff_id", 0.55),
            ]),
        });
        screen
    }

    #[test]
    fn run_validates_form() {
        let mut screen = MappingScreen::new(&DbConfig::default(), MappingOptions::default());
        assert_eq!(
            screen.handle_key(KeyCode::Char('r'), KeyModifiers::NONE),
            Action::Status("Target database is required.".into())
        );

        screen.form.fields[DATABASE].value = "warehouse".into();
        screen.form.fields[MIN_CONFIDENCE].value = "1.5".into();
        assert!(matches!(
            screen.handle_key(KeyCode::Char('r'), KeyModifiers::NONE),
            Action::Status(msg) if msg.contains("between 0 and 1")
        ));

        screen.form.fields[MIN_CONFIDENCE].value = "0.7".into();
        match screen.handle_key(KeyCode::Char('r'), KeyModifiers::NONE) {
            Action::RunMapping { target, options } => {
                assert_eq!(target.database, "warehouse");
                assert_eq!(options.min_confidence, 0.7);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn cycling_edits_the_selected_cell() {
        let mut screen = screen_with_rows();
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(
            screen.handle_key(KeyCode::Right, KeyModifiers::NONE),
            Action::PersistMapping
        );
        let sheet = &screen.state.as_ref().unwrap().sheet;
        assert_eq!(sheet.rows()[1].text("target_table"), "employees");
        assert!(!sheet.is_saved());

        screen.handle_key(KeyCode::Char('c'), KeyModifiers::NONE);
        screen.handle_key(KeyCode::Left, KeyModifiers::NONE);
        let sheet = &screen.state.as_ref().unwrap().sheet;
        assert_eq!(sheet.rows()[1].text("best_match_column"), "employee_id");
    }

    #[test]
    fn export_requires_save() {
        let mut screen = screen_with_rows();
        assert!(matches!(
            screen.handle_key(KeyCode::Char('e'), KeyModifiers::NONE),
            Action::Status(_)
        ));
        assert_eq!(
            screen.handle_key(KeyCode::Char('s'), KeyModifiers::NONE),
            Action::PersistMapping
        );
        assert_eq!(
            screen.handle_key(KeyCode::Char('e'), KeyModifiers::NONE),
            Action::ExportMapping
        );
    }

    #[test]
    fn legend_swallows_next_key() {
        let mut screen = screen_with_rows();
        screen.handle_key(KeyCode::Char('l'), KeyModifiers::NONE);
        assert!(screen.show_legend);
        assert_eq!(
            screen.handle_key(KeyCode::Char('s'), KeyModifiers::NONE),
            Action::None
        );
        assert!(!screen.show_legend);
    }
}
