//! "Metadata" screen: generate schema metadata and browse its preview.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use schemaconsole_core::metadata::{MetadataDashboard, MetadataState, format_generated_at};
use schemaconsole_shared::OutputFormat;

use super::Action;

pub(crate) struct MetadataScreen {
    pub format: OutputFormat,
    pub state: Option<MetadataState>,
    pub busy: bool,
}

impl MetadataScreen {
    pub(crate) fn new(format: OutputFormat) -> Self {
        Self {
            format,
            state: None,
            busy: false,
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Controls
                Constraint::Length(5), // Dashboard
                Constraint::Min(3),    // Previews
                Constraint::Length(1), // File
            ])
            .split(area);

        let controls = Paragraph::new(format!(
            "Format: < {} >   g generate · d download · ←/→ format",
            self.format
        ))
        .block(Block::default().borders(Borders::ALL).title(" Generate Metadata "));
        f.render_widget(controls, chunks[0]);

        let Some(state) = &self.state else {
            let msg = if self.busy {
                "Generating metadata…"
            } else {
                "No metadata yet. Press g to generate."
            };
            f.render_widget(
                Paragraph::new(msg)
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
            return;
        };
        let result = &state.result;

        let lines: Vec<Line> = MetadataDashboard::from(result)
            .entries
            .into_iter()
            .map(|(label, value)| Line::from(format!("{label}: {value}")))
            .collect();
        let mut title = result.database.clone().unwrap_or_default();
        if let Some(at) = result.generated_at.as_deref() {
            title = format!("{title}  {}", format_generated_at(at));
        }
        f.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", title.trim())),
            ),
            chunks[1],
        );

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(chunks[2]);

        let tables = Table::new(
            result.tables_preview.iter().map(|t| {
                Row::new(vec![
                    Cell::from(t.table_name.clone().unwrap_or_default()),
                    Cell::from(t.column_count.to_string()),
                    Cell::from(t.row_count.to_string()),
                ])
            }),
            [Constraint::Min(12), Constraint::Length(6), Constraint::Length(10)],
        )
        .header(Row::new(vec!["Table", "Cols", "Rows"]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title(" Tables "));
        f.render_widget(tables, panes[0]);

        let columns = Table::new(
            result.columns_preview.iter().map(|c| {
                Row::new(vec![
                    Cell::from(c.table_name.clone().unwrap_or_default()),
                    Cell::from(c.column_name.clone().unwrap_or_default()),
                    Cell::from(c.data_type.clone().unwrap_or_default()),
                ])
            }),
            [Constraint::Min(10), Constraint::Min(10), Constraint::Length(14)],
        )
        .header(Row::new(vec!["Table", "Column", "Type"]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title(" Columns (sample) "));
        f.render_widget(columns, panes[1]);

        if let Some(saved) = result.saved_file.as_deref() {
            f.render_widget(
                Paragraph::new(format!("File ({}): {saved}", state.format))
                    .style(Style::default().fg(Color::DarkGray)),
                chunks[3],
            );
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> Action {
        if self.busy {
            return Action::None;
        }
        match code {
            KeyCode::Left => {
                self.format = self.format.prev();
                Action::None
            }
            KeyCode::Right => {
                self.format = self.format.next();
                Action::None
            }
            KeyCode::Char('g') => Action::GenerateMetadata(self.format),
            KeyCode::Char('d') => match &self.state {
                Some(s) if s.result.saved_file.as_deref().is_some_and(|f| !f.is_empty()) => {
                    Action::DownloadMetadata
                }
                _ => Action::Status("Generate metadata before downloading.".into()),
            },
            _ => Action::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaconsole_shared::MetadataResponse;

    #[test]
    fn format_cycles_and_generate_uses_it() {
        let mut screen = MetadataScreen::new(OutputFormat::Csv);
        screen.handle_key(KeyCode::Right, KeyModifiers::NONE);
        assert_eq!(
            screen.handle_key(KeyCode::Char('g'), KeyModifiers::NONE),
            Action::GenerateMetadata(OutputFormat::Json)
        );
        screen.handle_key(KeyCode::Left, KeyModifiers::NONE);
        screen.handle_key(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(screen.format, OutputFormat::Xlsx);
    }

    #[test]
    fn download_needs_a_saved_file() {
        let mut screen = MetadataScreen::new(OutputFormat::Csv);
        assert!(matches!(
            screen.handle_key(KeyCode::Char('d'), KeyModifiers::NONE),
            Action::Status(_)
        ));

        screen.state = Some(MetadataState {
            format: OutputFormat::Csv,
            result: MetadataResponse {
                saved_file: Some("/srv/out/hr.csv".into()),
                ..Default::default()
            },
        });
        assert_eq!(
            screen.handle_key(KeyCode::Char('d'), KeyModifiers::NONE),
            Action::DownloadMetadata
        );
    }

    #[test]
    fn busy_ignores_keys() {
        let mut screen = MetadataScreen::new(OutputFormat::Csv);
        screen.busy = true;
        assert_eq!(
            screen.handle_key(KeyCode::Char('g'), KeyModifiers::NONE),
            Action::None
        );
    }
}
