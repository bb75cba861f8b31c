//! CLI command definitions, routing, and tracing setup.

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use schemaconsole_client::ApiClient;
use schemaconsole_core::connect::{self, ConnectForm, ConnectOutcome, ProgressReporter};
use schemaconsole_core::metadata::{MetadataDashboard, format_generated_at};
use schemaconsole_core::navigation::{Navigator, Page, WorkspaceTab};
use schemaconsole_core::session::{ChatGate, Session};
use schemaconsole_shared::{
    AppConfig, DbConfig, Neo4jConfig, OutputFormat, init_config, load_config, load_config_from,
    resolve_secret, session_db_path,
};
use tracing::info;

use crate::output;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SchemaConsole: operator console for the schema-intelligence backend.
#[derive(Parser)]
#[command(
    name = "schemaconsole",
    version,
    about = "Connect databases, run metadata and mapping jobs, and chat with the knowledge graph.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Clone, Debug)]
pub(crate) struct GlobalArgs {
    /// Backend base URL (overrides config).
    #[arg(long, global = true, env = "SCHEMACONSOLE_BACKEND_URL")]
    pub backend: Option<String>,

    /// Config file to use instead of ~/.schemaconsole/schemaconsole.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session database to use instead of ~/.schemaconsole/session.db.
    #[arg(long, global = true, env = "SCHEMACONSOLE_SESSION_DB")]
    pub session_db: Option<PathBuf>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Validate the source database, load the knowledge graph and start a RAG session.
    Connect {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        neo4j: Neo4jArgs,
    },

    /// Metadata tab.
    Metadata {
        #[command(subcommand)]
        action: MetadataAction,
    },

    /// Mapping tab.
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },

    /// Knowledge graph operations.
    Kg {
        #[command(subcommand)]
        action: KgAction,
    },

    /// Interactive chat with the knowledge graph.
    Chat {
        /// Resume a stored conversation by ID.
        #[arg(long)]
        resume: Option<String>,

        /// List stored conversations and exit.
        #[arg(long)]
        list: bool,
    },

    /// Ask the knowledge graph a single question.
    Ask {
        /// The question.
        question: Vec<String>,
    },

    /// Conversational NL2SQL.
    Nl2sql {
        #[command(subcommand)]
        action: Nl2sqlAction,
    },

    /// Inspect or clear session state.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Launch the interactive TUI.
    Tui,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum MetadataAction {
    /// Generate metadata for the connected source database.
    Generate {
        /// Output format: csv, json, or xlsx.
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },
    /// Show the last generated metadata.
    Show,
    /// Download the generated metadata file.
    Download {
        /// Destination file or directory (defaults to the current directory).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub(crate) enum MappingAction {
    /// Run hybrid mapping from the connected source to a target database.
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format: csv, json, or xlsx.
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Minimum confidence (0..1).
        #[arg(long)]
        min_confidence: Option<f64>,

        #[arg(long)]
        qdrant_host: Option<String>,

        #[arg(long)]
        qdrant_port: Option<u16>,

        #[arg(long)]
        top_k_dense: Option<u32>,
    },
    /// Show the current mapping rows.
    Show,
    /// Change the target table or best match column of one row.
    Edit {
        /// Row number as shown by `mapping show`.
        #[arg(long)]
        row: usize,
        /// Column to change: target_table or best_match_column.
        #[arg(long)]
        column: String,
        /// New value; must be one already proposed for that column.
        #[arg(long)]
        value: String,
    },
    /// Accept the current edits.
    Save,
    /// Write the saved rows to a local file.
    Export {
        /// Output format (defaults to the format chosen at run time).
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// Destination file or directory (defaults to the current directory).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Download the backend's own mapping file.
    Download {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the confidence level legend.
    Legend,
}

#[derive(Subcommand)]
pub(crate) enum KgAction {
    /// Load the knowledge graph from the source database.
    Load {
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
    /// Print the Neo4j browser URL for the loaded graph.
    Browser,
}

#[derive(Subcommand)]
pub(crate) enum Nl2sqlAction {
    /// Ask questions; interactive unless a question is given.
    Chat {
        /// One-shot question.
        question: Vec<String>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// List client ids, agents and models offered by the backend.
    Options,
    /// Show aggregated query metrics.
    Metrics,
    /// Download the metrics file.
    DownloadMetrics {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub(crate) enum SessionAction {
    /// Show session state.
    Show,
    /// Clear all session state (the Exit button).
    Exit,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Source database fields; unset fields fall back to the session, then config.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct SourceArgs {
    #[arg(long)]
    pub db_type: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(short, long)]
    pub database: Option<String>,
    #[arg(short, long)]
    pub username: Option<String>,
    #[arg(long)]
    pub schema: Option<String>,
    /// Source password (otherwise read from the env var named in config).
    #[arg(long)]
    pub password: Option<String>,
}

impl SourceArgs {
    fn apply(&self, db: &mut DbConfig) {
        apply_db(
            db,
            [&self.db_type, &self.host, &self.database, &self.username, &self.schema],
            self.port,
            self.password.as_ref(),
        );
    }
}

/// Target database fields for mapping.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct TargetArgs {
    #[arg(long = "target-db-type")]
    pub db_type: Option<String>,
    #[arg(long = "target-host")]
    pub host: Option<String>,
    #[arg(long = "target-port")]
    pub port: Option<u16>,
    #[arg(long = "target-database")]
    pub database: Option<String>,
    #[arg(long = "target-username")]
    pub username: Option<String>,
    #[arg(long = "target-schema")]
    pub schema: Option<String>,
    #[arg(long = "target-password")]
    pub password: Option<String>,
}

impl TargetArgs {
    pub(crate) fn apply(&self, db: &mut DbConfig) {
        apply_db(
            db,
            [&self.db_type, &self.host, &self.database, &self.username, &self.schema],
            self.port,
            self.password.as_ref(),
        );
    }
}

fn apply_db(db: &mut DbConfig, fields: [&Option<String>; 5], port: Option<u16>, password: Option<&String>) {
    let [db_type, host, database, username, schema] = fields;
    let targets = [
        (&mut db.db_type, db_type),
        (&mut db.host, host),
        (&mut db.database, database),
        (&mut db.username, username),
        (&mut db.schema_name, schema),
    ];
    for (slot, value) in targets {
        if let Some(v) = value {
            *slot = v.clone();
        }
    }
    if let Some(p) = port {
        db.port = p;
    }
    if let Some(p) = password {
        db.password = p.clone();
    }
}

/// Neo4j fields; unset fields fall back to config.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct Neo4jArgs {
    #[arg(long)]
    pub neo4j_uri: Option<String>,
    #[arg(long)]
    pub neo4j_user: Option<String>,
    #[arg(long)]
    pub neo4j_password: Option<String>,
    /// Neo4j database for the RAG session.
    #[arg(long)]
    pub neo4j_database: Option<String>,
}

impl Neo4jArgs {
    pub(crate) fn apply(&self, cfg: &mut Neo4jConfig) {
        if let Some(v) = &self.neo4j_uri {
            cfg.uri = v.clone();
        }
        if let Some(v) = &self.neo4j_user {
            cfg.user = v.clone();
        }
        if let Some(v) = &self.neo4j_password {
            cfg.password = v.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so command
/// output stays pipeable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "schemaconsole=warn",
        1 => "schemaconsole=info",
        2 => "schemaconsole=debug",
        _ => "schemaconsole=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// Resolved config, backend client and session for one command.
pub(crate) struct Ctx {
    pub config: AppConfig,
    pub client: ApiClient,
    pub session: Session,
}

impl Ctx {
    pub(crate) async fn open(global: &GlobalArgs) -> Result<Self> {
        let config = resolve_config(global)?;
        let client = ApiClient::new(&config.backend)?;
        let session = Session::open(&session_path(global)?).await?;
        Ok(Self {
            config,
            client,
            session,
        })
    }

    /// The connected source, with its password re-resolved.
    pub(crate) async fn source(&self, args: &SourceArgs) -> Result<DbConfig> {
        let mut db = match self.session.source().await? {
            Some(saved) => saved,
            None => self.config.source.to_db_config(),
        };
        args.apply(&mut db);
        if db.password.is_empty() {
            db.password = secret_or_prompt(&self.config.source.password_env, "Source password")?;
        }
        Ok(db)
    }

    /// Page navigator positioned on `tab`, or an error if not connected.
    pub(crate) async fn enter_tab(&self, tab: WorkspaceTab) -> Result<Navigator> {
        let mut nav = if self.session.is_connected().await? {
            Navigator::at(Page::Workspace(WorkspaceTab::default()))
        } else {
            Navigator::new()
        };
        nav.select_tab(tab)
            .map_err(|_| eyre!("not connected: run `schemaconsole connect` first"))?;
        Ok(nav)
    }

    /// Enter the chat page; requires a ready gate.
    pub(crate) async fn enter_chat(&self) -> Result<ChatGate> {
        let mut nav = self.enter_tab(WorkspaceTab::Chatbot).await?;
        let gate = self.session.chat_gate().await?;
        nav.open_chat(&gate)?;
        Ok(gate)
    }
}

fn resolve_config(global: &GlobalArgs) -> Result<AppConfig> {
    let mut config = match &global.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(url) = &global.backend {
        config.backend.base_url = url.clone();
    }
    Ok(config)
}

fn session_path(global: &GlobalArgs) -> Result<PathBuf> {
    match &global.session_db {
        Some(p) => Ok(p.clone()),
        None => Ok(session_db_path()?),
    }
}

/// Read a secret from `env_var`, prompting when interactive.
pub(crate) fn secret_or_prompt(env_var: &str, prompt: &str) -> Result<String> {
    if let Some(secret) = resolve_secret(env_var) {
        return Ok(secret);
    }
    if !std::io::stdin().is_terminal() {
        return Ok(String::new());
    }
    let secret = dialoguer::Password::new()
        .with_prompt(format!("{prompt} (or set {env_var})"))
        .allow_empty_password(true)
        .interact()?;
    Ok(secret)
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Command::Connect { source, neo4j } => cmd_connect(&global, &source, &neo4j).await,
        Command::Metadata { action } => {
            let ctx = Ctx::open(&global).await?;
            crate::workspace::metadata(&ctx, action).await
        }
        Command::Mapping { action } => {
            let ctx = Ctx::open(&global).await?;
            crate::workspace::mapping(&ctx, action).await
        }
        Command::Kg { action } => {
            let ctx = Ctx::open(&global).await?;
            crate::workspace::kg(&ctx, action).await
        }
        Command::Chat { resume, list } => {
            let ctx = Ctx::open(&global).await?;
            crate::chat::chat(&ctx, resume.as_deref(), list).await
        }
        Command::Ask { question } => {
            let ctx = Ctx::open(&global).await?;
            crate::chat::ask(&ctx, &question.join(" ")).await
        }
        Command::Nl2sql { action } => {
            let ctx = Ctx::open(&global).await?;
            crate::chat::nl2sql(&ctx, action).await
        }
        Command::Session { action } => match action {
            SessionAction::Show => cmd_session_show(&global).await,
            SessionAction::Exit => cmd_session_exit(&global).await,
        },
        Command::Tui => cmd_tui(&global),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&global).await,
        },
    }
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

async fn cmd_connect(global: &GlobalArgs, source: &SourceArgs, neo4j: &Neo4jArgs) -> Result<()> {
    let ctx = Ctx::open(global).await?;

    let mut form = ConnectForm::from_config(&ctx.config);
    source.apply(&mut form.pg);
    neo4j.apply(&mut form.neo4j);
    if let Some(db) = &neo4j.neo4j_database {
        form.neo4j_database = db.clone();
    }
    if form.pg.password.is_empty() {
        form.pg.password = secret_or_prompt(&ctx.config.source.password_env, "Source password")?;
    }
    if form.neo4j.password.is_empty() {
        form.neo4j.password = secret_or_prompt(&ctx.config.neo4j.password_env, "Neo4j password")?;
    }

    if !form.can_connect() {
        return Err(eyre!(
            "missing required fields: {}",
            form.missing_fields().join(", ")
        ));
    }

    info!(database = %form.pg.database, neo4j = %form.neo4j.uri, "connecting");

    let reporter = CliProgress::new();
    let outcome = connect::connect(&ctx.client, &ctx.session, &form, &reporter).await?;

    let mut nav = Navigator::new();
    let page = nav.connected()?;

    println!();
    println!("  Connected!");
    println!("  Session:  {}", outcome.session_id);
    println!("  Database: {}", form.pg.database);
    if let Some(generated) = outcome.metadata.generated_at.as_deref() {
        println!("  Metadata: generated at {}", format_generated_at(generated));
    }
    output::print_entries(&MetadataDashboard::from(&outcome.metadata).entries);
    if let Some(rows) = outcome.kg.rows_loaded {
        println!("  KG rows loaded: {rows}");
    }
    println!("  Time:     {:.1}s", outcome.elapsed.as_secs_f64());
    println!("  Now on:   {page}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
pub(crate) struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    /// Spinner for a single request.
    pub(crate) fn single(message: &str) -> Self {
        let this = Self::new();
        this.spinner.set_message(message.to_string());
        this
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _outcome: &ConnectOutcome) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// session / tui / config
// ---------------------------------------------------------------------------

async fn cmd_session_show(global: &GlobalArgs) -> Result<()> {
    let session = Session::open_readonly(&session_path(global)?).await?;

    let connected = session.is_connected().await?;
    let gate = session.chat_gate().await?;
    let page = if connected {
        Page::Workspace(WorkspaceTab::default())
    } else {
        Page::Config
    };

    println!("Session id:   {}", session.session_id().await?.unwrap_or_else(|| "-".into()));
    println!("Connected:    {connected}");
    println!("KG ready:     {}", session.kg_ready().await?);
    println!("Chat:         {}", if gate.is_ready() { "ready" } else { "not initialized" });
    println!("Start page:   {page}");
    if let Some(src) = session.source().await? {
        println!(
            "Source:       {}@{}:{}/{} ({})",
            src.username, src.host, src.port, src.database, src.schema_name
        );
    }
    if let Some(neo) = session.neo4j().await? {
        println!("Neo4j:        {}@{}", neo.user, neo.uri);
    }
    let keys = session.storage().keys().await?;
    println!("Stored keys:  {}", if keys.is_empty() { "-".into() } else { keys.join(", ") });
    let chats = session.storage().list_chats().await?;
    println!("Chats:        {}", chats.len());
    Ok(())
}

async fn cmd_session_exit(global: &GlobalArgs) -> Result<()> {
    let session = Session::open(&session_path(global)?).await?;
    session.exit().await?;
    let mut nav = Navigator::new();
    println!("Session cleared. Now on: {}", nav.exit());
    Ok(())
}

/// Launch the TUI binary, looked up next to this executable first.
fn cmd_tui(global: &GlobalArgs) -> Result<()> {
    let name = format!("schemaconsole-tui{}", std::env::consts::EXE_SUFFIX);
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .filter(|p| p.exists());
    let program = sibling.unwrap_or_else(|| PathBuf::from(&name));

    let args = tui_args(global);
    info!(program = %program.display(), ?args, "launching TUI");
    let mut cmd = std::process::Command::new(&program);
    cmd.args(&args);
    let status = cmd
        .status()
        .map_err(|e| eyre!("failed to launch {}: {e}", program.display()))?;
    if !status.success() {
        return Err(eyre!("TUI exited with status: {}", status.code().unwrap_or(-1)));
    }
    Ok(())
}

/// Flags forwarded to the TUI binary, so the child's command line shows
/// which backend and session it was started with.
fn tui_args(global: &GlobalArgs) -> Vec<OsString> {
    let mut args = Vec::new();
    if let Some(url) = &global.backend {
        args.extend([OsString::from("--backend"), OsString::from(url)]);
    }
    if let Some(db) = &global.session_db {
        args.extend([OsString::from("--session-db"), db.clone().into_os_string()]);
    }
    if let Some(config) = &global.config {
        args.extend([OsString::from("--config"), config.clone().into_os_string()]);
    }
    args
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(global: &GlobalArgs) -> Result<()> {
    let config = resolve_config(global)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
