//! Core TUI application state and event loop.
//!
//! Backend calls run on a tokio runtime owned by the app and report back
//! over a channel; session reads and writes are local and run inline.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs};
use schemaconsole_client::ApiClient;
use schemaconsole_core::chat::KgChat;
use schemaconsole_core::connect::{self, ConnectForm, ConnectOutcome, ProgressReporter};
use schemaconsole_core::mapping::{self, MappingOptions, MappingState};
use schemaconsole_core::metadata::{self, MetadataState};
use schemaconsole_core::navigation::{Navigator, Page, WorkspaceTab};
use schemaconsole_core::session::{ChatGate, Session};
use schemaconsole_shared::{AppConfig, AskResponse, ConsoleError, DbConfig, resolve_secret};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{error, info, warn};

use crate::screens::chat::ChatScreen;
use crate::screens::connect::ConnectScreen;
use crate::screens::mapping::MappingScreen;
use crate::screens::metadata::MetadataScreen;
use crate::screens::{Action, Tab};
use crate::widgets::{centered_rect, status_bar};

/// Result of a background request.
pub(crate) enum Outcome {
    Phase(String),
    Connected(schemaconsole_shared::Result<ConnectOutcome>),
    Metadata(schemaconsole_shared::Result<MetadataState>),
    Mapping(schemaconsole_shared::Result<MappingState>),
    Answer(schemaconsole_shared::Result<AskResponse>),
    Saved(schemaconsole_shared::Result<PathBuf>),
}

/// Forwards connect steps to the UI.
struct ChannelProgress(UnboundedSender<Outcome>);

impl ProgressReporter for ChannelProgress {
    fn phase(&self, name: &str) {
        let _ = self.0.send(Outcome::Phase(name.to_string()));
    }

    fn done(&self, _outcome: &ConnectOutcome) {}
}

/// Application state.
pub(crate) struct App {
    rt: Runtime,
    tx: UnboundedSender<Outcome>,
    rx: UnboundedReceiver<Outcome>,
    config: AppConfig,
    client: ApiClient,
    session: Session,
    nav: Navigator,
    /// Source password from the connect form; never persisted.
    source_password: String,
    connect: ConnectScreen,
    metadata: MetadataScreen,
    mapping: MappingScreen,
    chat: ChatScreen,
    /// Background downloads still in flight.
    downloads: usize,
    pub status: String,
    pub show_help: bool,
    pub should_quit: bool,
}

impl App {
    pub(crate) fn new(config: AppConfig, session_db: &Path) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let client = ApiClient::new(&config.backend)?;
        let session = rt.block_on(Session::open(session_db))?;
        let (tx, rx) = unbounded_channel();

        let form = ConnectForm::from_config(&config);
        let mut app = Self {
            rt,
            tx,
            rx,
            client,
            session,
            nav: Navigator::new(),
            source_password: form.pg.password.clone(),
            connect: ConnectScreen::new(&form),
            metadata: MetadataScreen::new(config.metadata.output_format),
            mapping: MappingScreen::new(
                &target_defaults(&config),
                MappingOptions::from_config(&config),
            ),
            chat: ChatScreen::new(),
            downloads: 0,
            config,
            status: "Ready · press ? for help".to_string(),
            show_help: false,
            should_quit: false,
        };
        app.resume()?;
        Ok(app)
    }

    /// Pick up a session left by an earlier run (or by the CLI).
    fn resume(&mut self) -> Result<()> {
        if !self.rt.block_on(self.session.is_connected())? {
            return Ok(());
        }

        self.nav = Navigator::at(Page::Workspace(WorkspaceTab::Metadata));
        let database = self
            .rt
            .block_on(self.session.source())?
            .map(|s| s.database)
            .unwrap_or_default();
        self.connect
            .finished(Some(format!("Connected to {database} (resumed session)")));

        if let Some(state) = self.rt.block_on(metadata::restore(&self.session))? {
            self.metadata.format = state.format;
            self.metadata.state = Some(state);
        }
        if let Some(state) = self.rt.block_on(mapping::restore(&self.session))? {
            self.mapping.restore(state);
        }
        self.refresh_gate();
        info!(%database, "resumed session");
        self.status = format!("Resumed session for {database}");
        Ok(())
    }

    pub(crate) fn page(&self) -> Page {
        self.nav.page()
    }

    fn busy(&self) -> bool {
        self.connect.busy
            || self.metadata.busy
            || self.mapping.busy
            || self.chat.is_thinking()
            || self.downloads > 0
    }

    fn is_editing(&self) -> bool {
        match self.nav.page() {
            Page::Config => self.connect.is_editing(),
            Page::Workspace(WorkspaceTab::Mapping) => self.mapping.is_editing(),
            Page::Chat => true,
            _ => false,
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        // Global keybindings (always active)
        match code {
            KeyCode::Char('q') | KeyCode::Char('c')
                if modifiers.contains(KeyModifiers::CONTROL) =>
            {
                self.should_quit = true;
                return;
            }
            _ if self.show_help => {
                self.show_help = false;
                return;
            }
            _ => {}
        }

        if !self.is_editing() {
            match code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                    return;
                }
                KeyCode::Char(c @ '1'..='4') => {
                    let idx = (c as usize) - ('1' as usize);
                    self.select_tab(Tab::ALL[idx]);
                    return;
                }
                KeyCode::Char('x') if self.nav.page() != Page::Config => {
                    self.exit_session();
                    return;
                }
                _ => {}
            }
        }

        let action = match self.nav.page() {
            Page::Config => self.connect.handle_key(code, modifiers),
            Page::Workspace(WorkspaceTab::Metadata) => self.metadata.handle_key(code, modifiers),
            Page::Workspace(WorkspaceTab::Mapping) => self.mapping.handle_key(code, modifiers),
            Page::Workspace(WorkspaceTab::Chatbot) => self.chat.handle_tab_key(code),
            Page::Chat => self.chat.handle_page_key(code, modifiers),
        };
        self.perform(action);
    }

    fn select_tab(&mut self, tab: Tab) {
        let Some(ws) = tab.workspace() else {
            if self.nav.page() != Page::Config {
                self.status = "Connected. Press x to exit the session and reconnect.".into();
            }
            return;
        };
        match self.nav.select_tab(ws) {
            Ok(page) => {
                if ws == WorkspaceTab::Chatbot {
                    self.refresh_gate();
                }
                self.status = page.to_string();
            }
            Err(_) => self.status = "Connect first to unlock the workspace.".into(),
        }
    }

    fn refresh_gate(&mut self) {
        self.chat.ready_uri = match self.rt.block_on(self.session.chat_gate()) {
            Ok(ChatGate::Ready { neo4j, .. }) => Some(neo4j.uri),
            Ok(ChatGate::NotInitialized) => None,
            Err(e) => {
                warn!(error = %e, "could not read chat gate");
                None
            }
        };
    }

    /// The saved source connection with the in-memory password.
    fn source(&self) -> schemaconsole_shared::Result<DbConfig> {
        let mut db = self
            .rt
            .block_on(self.session.source())?
            .ok_or_else(|| ConsoleError::Session("not connected".into()))?;
        db.password = self.source_password.clone();
        Ok(db)
    }

    fn report(&mut self, what: &str, err: ConsoleError) {
        error!(error = %err, "{what} failed");
        self.status = format!("{what} failed: {err}");
    }

    pub(crate) fn perform(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Status(msg) => self.status = msg,
            Action::Connect(form) => {
                self.connect.started();
                self.source_password = form.pg.password.clone();
                self.status = "Connecting…".into();

                let (client, session, tx) = self.handles();
                self.rt.spawn(async move {
                    let progress = ChannelProgress(tx.clone());
                    let res = connect::connect(&client, &session, &form, &progress).await;
                    let _ = tx.send(Outcome::Connected(res));
                });
            }
            Action::GenerateMetadata(format) => {
                let db = match self.source() {
                    Ok(db) => db,
                    Err(e) => return self.report("Metadata generation", e),
                };
                self.metadata.busy = true;
                self.status = "Generating metadata…".into();

                let (client, session, tx) = self.handles();
                self.rt.spawn(async move {
                    let res = metadata::generate(&client, &session, &db, format).await;
                    let _ = tx.send(Outcome::Metadata(res));
                });
            }
            Action::DownloadMetadata => {
                let Some(result) = self.metadata.state.as_ref().map(|s| s.result.clone()) else {
                    return;
                };
                let dest = match download_dir() {
                    Ok(d) => d,
                    Err(e) => return self.report("Download", e),
                };
                let (client, _, tx) = self.handles();
                self.downloads += 1;
                self.status = "Downloading…".into();
                self.rt.spawn(async move {
                    let res = metadata::download(&client, &result, &dest).await;
                    let _ = tx.send(Outcome::Saved(res));
                });
            }
            Action::RunMapping { target, options } => {
                let src = match self.source() {
                    Ok(db) => db,
                    Err(e) => return self.report("Mapping", e),
                };
                self.mapping.busy = true;
                self.status = "Generating mapping…".into();

                let (client, session, tx) = self.handles();
                self.rt.spawn(async move {
                    let res = mapping::run(&client, &session, &src, &target, &options).await;
                    let _ = tx.send(Outcome::Mapping(res));
                });
            }
            Action::PersistMapping => {
                let Some(state) = &self.mapping.state else {
                    return;
                };
                let saved = state.sheet.is_saved();
                match self.rt.block_on(mapping::persist(&self.session, state)) {
                    Ok(()) if saved => self.status = "Changes saved. You can now download.".into(),
                    Ok(()) => self.status = "Edited (unsaved) · press s to save".into(),
                    Err(e) => self.report("Saving mapping", e),
                }
            }
            Action::ExportMapping => {
                let Some(state) = &self.mapping.state else {
                    return;
                };
                let res = download_dir()
                    .and_then(|dest| mapping::export_to(&state.sheet, state.options.format, &dest));
                match res {
                    Ok(path) => self.status = format!("Saved {}", path.display()),
                    Err(e) => self.report("Export", e),
                }
            }
            Action::DownloadMapping => {
                let Some(result) = self.mapping.state.as_ref().map(|s| s.result.clone()) else {
                    return;
                };
                let dest = match download_dir() {
                    Ok(d) => d,
                    Err(e) => return self.report("Download", e),
                };
                let (client, _, tx) = self.handles();
                self.downloads += 1;
                self.status = "Downloading…".into();
                self.rt.spawn(async move {
                    let res = mapping::download(&client, &result, &dest).await;
                    let _ = tx.send(Outcome::Saved(res));
                });
            }
            Action::OpenChat => self.open_chat(),
            Action::LeaveChat => {
                if self.nav.leave_chat().is_ok() {
                    self.refresh_gate();
                    self.status = self.nav.page().to_string();
                }
            }
            Action::Ask(question) => {
                let Some(kg) = self.chat.kg.as_mut() else {
                    return;
                };
                let req = match self.rt.block_on(kg.begin(&question)) {
                    Ok(Some(req)) => req,
                    Ok(None) => return,
                    Err(e) => return self.report("Saving message", e),
                };
                let (client, _, tx) = self.handles();
                self.rt.spawn(async move {
                    let res = client.ask(&req).await;
                    let _ = tx.send(Outcome::Answer(res));
                });
            }
            Action::NewChat => {
                let Some(kg) = self.chat.kg.as_mut() else {
                    return;
                };
                match self.rt.block_on(kg.new_chat()) {
                    Ok(()) => self.status = "New conversation started.".into(),
                    Err(e) => self.report("New chat", e),
                }
            }
        }
    }

    fn open_chat(&mut self) {
        let gate = match self.rt.block_on(self.session.chat_gate()) {
            Ok(gate) => gate,
            Err(e) => return self.report("Opening chat", e),
        };
        if let Err(e) = self.nav.open_chat(&gate) {
            self.status = e.to_string();
            return;
        }
        if self.chat.kg.is_none() {
            match self.rt.block_on(KgChat::start(&self.session, gate)) {
                Ok(kg) => self.chat.kg = Some(kg),
                Err(e) => {
                    let _ = self.nav.leave_chat();
                    return self.report("Opening chat", e);
                }
            }
        }
        self.chat.reset_scroll();
        self.status = "chat".into();
    }

    fn exit_session(&mut self) {
        if self.busy() {
            self.status = "Wait for the current request to finish.".into();
            return;
        }
        if let Err(e) = self.rt.block_on(self.session.exit()) {
            return self.report("Exit", e);
        }
        self.nav.exit();

        let form = ConnectForm::from_config(&self.config);
        self.source_password = form.pg.password.clone();
        self.connect = ConnectScreen::new(&form);
        self.metadata = MetadataScreen::new(self.config.metadata.output_format);
        self.mapping = MappingScreen::new(
            &target_defaults(&self.config),
            MappingOptions::from_config(&self.config),
        );
        self.chat = ChatScreen::new();
        self.status = "Session cleared.".into();
    }

    /// Apply every finished background request.
    pub(crate) fn drain(&mut self) {
        while let Ok(outcome) = self.rx.try_recv() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Phase(name) => {
                self.status = format!("{name}…");
                self.connect.phase(name);
            }
            Outcome::Connected(Ok(outcome)) => {
                let database = outcome.metadata.database.clone().unwrap_or_default();
                let tables = outcome
                    .kg
                    .tables_loaded
                    .map_or_else(String::new, |n| format!(" · {n} tables loaded"));
                self.connect.finished(Some(format!(
                    "Connected to {database}{tables} in {:.1}s",
                    outcome.elapsed.as_secs_f64()
                )));
                if let Err(e) = self.nav.connected() {
                    warn!(error = %e, "connected from an unexpected page");
                }
                self.refresh_gate();
                self.status = format!("Connected · session {}", outcome.session_id);
            }
            Outcome::Connected(Err(e)) => {
                self.connect.finished(None);
                self.status = match e {
                    ConsoleError::Session(msg) => msg,
                    other => other.to_string(),
                };
            }
            Outcome::Metadata(res) => {
                self.metadata.busy = false;
                match res {
                    Ok(state) => {
                        self.status = "Metadata generated.".into();
                        self.metadata.state = Some(state);
                    }
                    Err(e) => self.report("Metadata generation", e),
                }
            }
            Outcome::Mapping(res) => {
                self.mapping.busy = false;
                match res {
                    Ok(state) => {
                        self.status = format!("Mapping generated: {} rows.", state.sheet.len());
                        self.mapping.show(state);
                    }
                    Err(e) => self.report("Mapping", e),
                }
            }
            Outcome::Answer(res) => {
                let Some(kg) = self.chat.kg.as_mut() else {
                    return;
                };
                let saved = self.rt.block_on(kg.finish(res)).map(|_| ());
                if let Err(e) = saved {
                    self.report("Saving answer", e);
                }
            }
            Outcome::Saved(res) => {
                self.downloads = self.downloads.saturating_sub(1);
                match res {
                    Ok(path) => self.status = format!("Saved {}", path.display()),
                    Err(e) => self.report("Download", e),
                }
            }
        }
    }

    fn handles(&self) -> (ApiClient, Session, UnboundedSender<Outcome>) {
        (self.client.clone(), self.session.clone(), self.tx.clone())
    }
}

/// Target form defaults: the source host and credentials, no database.
fn target_defaults(config: &AppConfig) -> DbConfig {
    DbConfig {
        database: String::new(),
        password: resolve_secret(&config.mapping.target_password_env).unwrap_or_default(),
        ..config.source.to_db_config()
    }
}

fn download_dir() -> schemaconsole_shared::Result<PathBuf> {
    std::env::current_dir().map_err(|e| ConsoleError::io(".", e))
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(config: AppConfig, session_db: &Path) -> Result<()> {
    let mut app = App::new(config, session_db)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code, key.modifiers);
                }
            }
        }
        app.drain();

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    let connected = app.page() != Page::Config;
    let tab_titles: Vec<Line> = Tab::ALL
        .iter()
        .map(|t| {
            let locked = *t != Tab::Connect && !connected;
            let style = if locked {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            Line::from(format!("{}{t}", if locked { "🔒 " } else { "" })).style(style)
        })
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(" SchemaConsole "))
        .select(Tab::of(app.page()).index())
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider(" │ ");
    f.render_widget(tabs, chunks[0]);

    match app.page() {
        Page::Config => app.connect.draw(f, chunks[1]),
        Page::Workspace(WorkspaceTab::Metadata) => app.metadata.draw(f, chunks[1]),
        Page::Workspace(WorkspaceTab::Mapping) => app.mapping.draw(f, chunks[1]),
        Page::Workspace(WorkspaceTab::Chatbot) => app.chat.draw_tab(f, chunks[1]),
        Page::Chat => app.chat.draw_page(f, chunks[1]),
    }

    f.render_widget(status_bar(&app.status, app.busy()), chunks[2]);

    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let help_text = vec![
        Line::from("Keybindings").style(bold),
        Line::from(""),
        Line::from("  1-4          Switch tab (workspace tabs need a connection)"),
        Line::from("  x            Exit the session"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from("Connect").style(bold),
        Line::from("  Enter edit field · ↑/↓ move · c connect"),
        Line::from("Metadata").style(bold),
        Line::from("  ←/→ format · g generate · d download"),
        Line::from("Mapping").style(bold),
        Line::from("  Tab switch form/sheet · r run · l legend"),
        Line::from("  c column · ←/→ change value · s save · e export · d download"),
        Line::from("Chat").style(bold),
        Line::from("  Enter open/send · Ctrl-N new chat · PgUp/PgDn scroll · Esc back"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help · press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use schemaconsole_shared::Neo4jConfig;

    use super::*;

    fn temp_db(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "schemaconsole-tui-{name}-{}-{nanos}.db",
            std::process::id()
        ))
    }

    fn seed_connected(path: &Path) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let session = Session::open(path).await.unwrap();
            session.session_id_or_create().await.unwrap();
            session
                .save_source(&DbConfig {
                    database: "hr".into(),
                    password: "secret".into(),
                    ..DbConfig::default()
                })
                .await
                .unwrap();
            session
                .mark_kg_ready(&Neo4jConfig {
                    uri: "bolt://graph.internal:7687".into(),
                    user: "neo4j".into(),
                    password: "pw".into(),
                })
                .await
                .unwrap();
        });
    }

    #[test]
    fn workspace_is_locked_until_connected() {
        let mut app = App::new(AppConfig::default(), &temp_db("locked")).unwrap();
        assert_eq!(app.page(), Page::Config);

        app.handle_key(KeyCode::Char('3'), KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Config);
        assert!(app.status.contains("Connect first"));

        app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Config);
    }

    #[test]
    fn resumed_session_opens_chat_and_exits() {
        let path = temp_db("resume");
        seed_connected(&path);

        let mut app = App::new(AppConfig::default(), &path).unwrap();
        assert_eq!(app.page(), Page::Workspace(WorkspaceTab::Metadata));

        app.handle_key(KeyCode::Char('4'), KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Workspace(WorkspaceTab::Chatbot));
        assert_eq!(
            app.chat.ready_uri.as_deref(),
            Some("bolt://graph.internal:7687")
        );

        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Chat);
        let kg = app.chat.kg.as_ref().unwrap();
        assert_eq!(kg.messages().len(), 1);

        // 'q' types into the chat input instead of quitting.
        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.should_quit);

        app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Workspace(WorkspaceTab::Chatbot));

        app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Config);
        assert!(!app.rt.block_on(app.session.is_connected()).unwrap());
        assert!(app.chat.kg.is_none());
    }

    #[test]
    fn exit_waits_for_download() {
        let path = temp_db("download");
        seed_connected(&path);
        let mut app = App::new(AppConfig::default(), &path).unwrap();
        app.metadata.state = Some(MetadataState {
            format: Default::default(),
            result: Default::default(),
        });

        app.perform(Action::DownloadMetadata);
        assert!(app.busy());
        app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Workspace(WorkspaceTab::Metadata));
        assert!(app.status.contains("Wait"));

        let outcome = app.rx.blocking_recv().unwrap();
        app.apply(outcome);
        assert!(!app.busy());
        app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(app.page(), Page::Config);
    }

    #[test]
    fn help_overlay_swallows_one_key() {
        let mut app = App::new(AppConfig::default(), &temp_db("help")).unwrap();
        app.handle_key(KeyCode::Char('?'), KeyModifiers::NONE);
        assert!(app.show_help);
        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }
}
