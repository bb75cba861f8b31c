//! KG chat and NL2SQL commands.

use color_eyre::eyre::{Result, eyre};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use schemaconsole_core::chat::{self, KgChat, Role};
use schemaconsole_core::nl2sql::{self, Nl2sqlConversation, ResultTable};
use schemaconsole_shared::{Nl2sqlChatResponse, config_dir};
use tracing::warn;

use crate::commands::{CliProgress, Ctx, Nl2sqlAction};
use crate::output::{print_entries, print_table};
use crate::workspace::out_or_cwd;

const CHAT_HISTORY_FILE: &str = "chat_history.txt";

// ---------------------------------------------------------------------------
// KG chat
// ---------------------------------------------------------------------------

pub(crate) async fn chat(ctx: &Ctx, resume: Option<&str>, list: bool) -> Result<()> {
    let gate = ctx.enter_chat().await?;

    if list {
        let chats = chat::list_chats(&ctx.session).await?;
        if chats.is_empty() {
            println!("No stored conversations.");
            return Ok(());
        }
        let rows: Vec<Vec<String>> = chats
            .iter()
            .map(|c| {
                vec![
                    c.id.clone(),
                    c.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    c.title.clone(),
                ]
            })
            .collect();
        print_table(&["id".into(), "created".into(), "title".into()], &rows);
        return Ok(());
    }

    let mut conversation = match resume {
        Some(id) => KgChat::resume(&ctx.session, gate, id).await?,
        None => KgChat::start(&ctx.session, gate).await?,
    };

    println!("Knowledge Graph Assistant");
    println!("Commands: /new  /browser  /exit");
    println!();
    for message in conversation.messages() {
        print_message(message.role, &message.text);
    }

    let mut rl = DefaultEditor::new()?;
    let history = config_dir().ok().map(|d| d.join(CHAT_HISTORY_FILE));
    if let Some(path) = &history {
        rl.load_history(path).ok();
    }

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                match line {
                    "/exit" | "/quit" => break,
                    "/new" => {
                        conversation.new_chat().await?;
                        for message in conversation.messages() {
                            print_message(message.role, &message.text);
                        }
                    }
                    "/browser" => match conversation.kg_browser_url() {
                        Ok(url) => println!("Neo4j browser: {url}"),
                        Err(e) => println!("{e}"),
                    },
                    question => {
                        let spinner = CliProgress::single("Thinking…");
                        let reply = conversation.send(&ctx.client, question).await?;
                        spinner.finish();
                        if let Some(reply) = reply {
                            print_message(reply.role, &reply.text);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                warn!(error = %err, "readline failed");
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            warn!(error = %e, "could not save chat history");
        }
    }
    Ok(())
}

pub(crate) async fn ask(ctx: &Ctx, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(eyre!("question must not be empty"));
    }
    let gate = ctx.enter_chat().await?;
    let mut conversation = KgChat::start(&ctx.session, gate).await?;

    let spinner = CliProgress::single("Thinking…");
    let reply = conversation.send(&ctx.client, question).await?;
    spinner.finish();

    if let Some(reply) = reply {
        println!("{}", reply.text);
    }
    Ok(())
}

fn print_message(role: Role, text: &str) {
    let who = match role {
        Role::User => "you",
        Role::Bot => "bot",
    };
    println!("{who}> {text}");
    println!();
}

// ---------------------------------------------------------------------------
// NL2SQL
// ---------------------------------------------------------------------------

pub(crate) async fn nl2sql(ctx: &Ctx, action: Nl2sqlAction) -> Result<()> {
    match action {
        Nl2sqlAction::Chat {
            question,
            client_id,
            agent,
            model,
        } => {
            let mut conv = Nl2sqlConversation::from_config(&ctx.config);
            if let Some(v) = client_id {
                conv.client_id = v;
            }
            if let Some(v) = agent {
                conv.agent_name = v;
            }
            if let Some(v) = model {
                conv.model_name = v;
            }

            let question = question.join(" ");
            if !question.trim().is_empty() {
                let resp = send_nl2sql(ctx, &mut conv, &question).await?;
                print_nl2sql(&resp);
                return Ok(());
            }
            nl2sql_repl(ctx, &mut conv).await
        }
        Nl2sqlAction::Options => {
            let options = nl2sql::options(&ctx.client).await?;
            println!("Client ids: {}", options.client_ids.join(", "));
            println!("Agents:     {}", options.agent_types.join(", "));
            println!("Models:     {}", options.model_names.join(", "));
            Ok(())
        }
        Nl2sqlAction::Metrics => {
            let metrics = nl2sql::metrics(&ctx.client).await?;
            if let Some(err) = metrics.error.as_deref() {
                return Err(eyre!("backend could not compute metrics: {err}"));
            }
            print_entries(&nl2sql::metrics_entries(&metrics));
            Ok(())
        }
        Nl2sqlAction::DownloadMetrics { out } => {
            let dest = out_or_cwd(out)?;
            let path = nl2sql::download_metrics(&ctx.client, &dest).await?;
            println!("Saved {}", path.display());
            Ok(())
        }
    }
}

async fn send_nl2sql(
    ctx: &Ctx,
    conv: &mut Nl2sqlConversation,
    question: &str,
) -> Result<Nl2sqlChatResponse> {
    let spinner = CliProgress::single("Generating SQL…");
    let resp = conv.send(&ctx.client, question).await;
    spinner.finish();
    Ok(resp?)
}

async fn nl2sql_repl(ctx: &Ctx, conv: &mut Nl2sqlConversation) -> Result<()> {
    println!(
        "NL2SQL chat ({} / {} / {})",
        conv.client_id, conv.agent_name, conv.model_name
    );
    println!("Commands: /clear  /exit");
    println!();

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("sql> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;
                match line {
                    "/exit" | "/quit" => break,
                    "/clear" => {
                        conv.clear();
                        println!("History cleared.");
                    }
                    question => match send_nl2sql(ctx, conv, question).await {
                        Ok(resp) => print_nl2sql(&resp),
                        Err(e) => println!("error: {e}"),
                    },
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                warn!(error = %err, "readline failed");
                break;
            }
        }
    }
    Ok(())
}

fn print_nl2sql(resp: &Nl2sqlChatResponse) {
    if let Some(err) = resp.error.as_deref() {
        println!("error: {err}");
    }
    if let Some(summary) = resp.summary.as_deref() {
        println!("{summary}");
    }
    if let Some(sql) = resp.sql.as_deref() {
        println!();
        println!("SQL:");
        println!("  {sql}");
    }
    if let Some(records) = resp.dataframe.as_deref() {
        let table = ResultTable::from_records(records);
        if !table.is_empty() {
            println!();
            print_table(&table.columns, &table.rows);
        }
    }
    if let Some(chart) = resp.chart_suggestion.as_deref() {
        println!();
        println!("Suggested chart: {chart}");
    }
    println!();
}
