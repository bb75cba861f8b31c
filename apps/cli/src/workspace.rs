//! Workspace commands: metadata, mapping and knowledge graph.

use std::path::PathBuf;

use color_eyre::eyre::{Result, eyre};
use schemaconsole_core::chat::kg_browser_url;
use schemaconsole_core::mapping::{self, ConfidenceLevel, MappingOptions, MappingState};
use schemaconsole_core::metadata::{self, MetadataDashboard, MetadataState, format_generated_at};
use schemaconsole_core::navigation::WorkspaceTab;
use schemaconsole_shared::{DbConfig, KgLoadRequest, MetadataResponse};
use tracing::info;

use crate::commands::{
    CliProgress, Ctx, KgAction, MappingAction, MetadataAction, SourceArgs, secret_or_prompt,
};
use crate::output::{print_entries, print_table};

// ---------------------------------------------------------------------------
// metadata
// ---------------------------------------------------------------------------

pub(crate) async fn metadata(ctx: &Ctx, action: MetadataAction) -> Result<()> {
    ctx.enter_tab(WorkspaceTab::Metadata).await?;

    match action {
        MetadataAction::Generate { format } => {
            let db = ctx.source(&SourceArgs::default()).await?;
            let format = format.unwrap_or(ctx.config.metadata.output_format);

            let spinner = CliProgress::single("Generating metadata");
            let state = metadata::generate(&ctx.client, &ctx.session, &db, format).await?;
            spinner.finish();

            print_metadata(&state);
            Ok(())
        }
        MetadataAction::Show => {
            let state = metadata::restore(&ctx.session)
                .await?
                .ok_or_else(|| eyre!("no metadata yet: run `schemaconsole metadata generate`"))?;
            print_metadata(&state);
            Ok(())
        }
        MetadataAction::Download { out } => {
            let state = metadata::restore(&ctx.session)
                .await?
                .ok_or_else(|| eyre!("no metadata yet: run `schemaconsole metadata generate`"))?;
            let dest = out_or_cwd(out)?;
            let path = metadata::download(&ctx.client, &state.result, &dest).await?;
            println!("Saved {}", path.display());
            Ok(())
        }
    }
}

fn print_metadata(state: &MetadataState) {
    let result: &MetadataResponse = &state.result;
    println!();
    if let Some(db) = result.database.as_deref() {
        println!("  Database: {db}");
    }
    if let Some(at) = result.generated_at.as_deref() {
        println!("  Generated at: {}", format_generated_at(at));
    }
    print_entries(&MetadataDashboard::from(result).entries);

    println!();
    println!("Tables");
    if result.tables_preview.is_empty() {
        println!("  (none)");
    } else {
        let rows: Vec<Vec<String>> = result
            .tables_preview
            .iter()
            .map(|t| {
                vec![
                    t.table_name.clone().unwrap_or_default(),
                    t.column_count.to_string(),
                    t.row_count.to_string(),
                ]
            })
            .collect();
        print_table(&headers(&["table", "cols", "rows"]), &rows);
    }

    println!();
    println!("Columns (sample)");
    if result.columns_preview.is_empty() {
        println!("  (none)");
    } else {
        let rows: Vec<Vec<String>> = result
            .columns_preview
            .iter()
            .map(|c| {
                vec![
                    c.table_name.clone().unwrap_or_default(),
                    c.column_name.clone().unwrap_or_default(),
                    c.data_type.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&headers(&["table", "column", "type"]), &rows);
    }

    if let Some(saved) = result.saved_file.as_deref() {
        println!();
        println!("  File ({}): {saved}", state.format);
    }
    println!();
}

// ---------------------------------------------------------------------------
// mapping
// ---------------------------------------------------------------------------

pub(crate) async fn mapping(ctx: &Ctx, action: MappingAction) -> Result<()> {
    if !matches!(action, MappingAction::Legend) {
        ctx.enter_tab(WorkspaceTab::Mapping).await?;
    }

    match action {
        MappingAction::Run {
            target,
            format,
            min_confidence,
            qdrant_host,
            qdrant_port,
            top_k_dense,
        } => {
            let src = ctx.source(&SourceArgs::default()).await?;

            let mut tgt = match mapping::restore(&ctx.session).await? {
                Some(previous) => previous.target,
                None => DbConfig::default(),
            };
            target.apply(&mut tgt);
            if tgt.database.trim().is_empty() {
                return Err(eyre!("target database is required (--target-database)"));
            }
            if tgt.password.is_empty() {
                tgt.password =
                    secret_or_prompt(&ctx.config.mapping.target_password_env, "Target password")?;
            }

            let mut opts = MappingOptions::from_config(&ctx.config);
            if let Some(f) = format {
                opts.format = f;
            }
            if let Some(c) = min_confidence {
                opts.min_confidence = c;
            }
            if let Some(h) = qdrant_host {
                opts.qdrant_host = h;
            }
            if let Some(p) = qdrant_port {
                opts.qdrant_port = p;
            }
            if let Some(k) = top_k_dense {
                opts.top_k_dense = k;
            }

            let spinner = CliProgress::single("Generating mapping");
            let state = mapping::run(&ctx.client, &ctx.session, &src, &tgt, &opts).await?;
            spinner.finish();

            print_mapping(&state);
            Ok(())
        }
        MappingAction::Show => {
            print_mapping(&restore_mapping(ctx).await?);
            Ok(())
        }
        MappingAction::Edit { row, column, value } => {
            let mut state = restore_mapping(ctx).await?;
            state.sheet.update_row(row, &column, &value)?;
            mapping::persist(&ctx.session, &state).await?;
            info!(row, %column, %value, "mapping row edited");
            println!("Row {row}: {column} = {value} (unsaved; run `schemaconsole mapping save`)");
            Ok(())
        }
        MappingAction::Save => {
            let mut state = restore_mapping(ctx).await?;
            state.sheet.save();
            mapping::persist(&ctx.session, &state).await?;
            println!("Changes saved. You can now download.");
            Ok(())
        }
        MappingAction::Export { format, out } => {
            let state = restore_mapping(ctx).await?;
            let format = format.unwrap_or(state.options.format);
            let dest = out_or_cwd(out)?;
            let path = mapping::export_to(&state.sheet, format, &dest)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        MappingAction::Download { out } => {
            let state = restore_mapping(ctx).await?;
            let dest = out_or_cwd(out)?;
            let path = mapping::download(&ctx.client, &state.result, &dest).await?;
            println!("Saved {}", path.display());
            Ok(())
        }
        MappingAction::Legend => {
            print_legend();
            Ok(())
        }
    }
}

async fn restore_mapping(ctx: &Ctx) -> Result<MappingState> {
    mapping::restore(&ctx.session)
        .await?
        .ok_or_else(|| eyre!("no mapping yet: run `schemaconsole mapping run`"))
}

fn print_mapping(state: &MappingState) {
    println!();
    let dashboard = mapping::dashboard_entries(&state.result);
    if !dashboard.is_empty() {
        print_entries(&dashboard);
        println!();
    }

    if state.sheet.is_empty() {
        println!("  No mapping rows.");
        return;
    }

    let columns = state.sheet.columns();
    let mut header = vec!["#".to_string()];
    header.extend(columns.iter().cloned());
    header.push("level".to_string());

    let rows: Vec<Vec<String>> = state
        .sheet
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut cells = vec![i.to_string()];
            cells.extend(columns.iter().map(|c| row.text(c)));
            cells.push(
                ConfidenceLevel::of_row(row)
                    .map(|l| l.label().to_string())
                    .unwrap_or_default(),
            );
            cells
        })
        .collect();
    print_table(&header, &rows);

    println!();
    println!(
        "  {} rows, {}",
        state.sheet.len(),
        if state.sheet.is_saved() { "saved" } else { "unsaved" }
    );
    if let Some(saved) = state.result.saved_file.as_deref() {
        println!("  Backend file: {saved}");
    }
    println!();
}

fn print_legend() {
    println!("Confidence Levels Legend");
    let rows: Vec<Vec<String>> = ConfidenceLevel::ALL
        .iter()
        .map(|l| vec![l.range().to_string(), l.label().to_string()])
        .collect();
    print_table(&headers(&["score", "level"]), &rows);
}

// ---------------------------------------------------------------------------
// kg
// ---------------------------------------------------------------------------

pub(crate) async fn kg(ctx: &Ctx, action: KgAction) -> Result<()> {
    match action {
        KgAction::Load { neo4j } => {
            ctx.enter_tab(WorkspaceTab::Chatbot).await?;
            let pg = ctx.source(&SourceArgs::default()).await?;

            let mut cfg = ctx.config.neo4j.to_neo4j_config();
            if let Some(saved) = ctx.session.neo4j().await? {
                cfg.uri = saved.uri;
                cfg.user = saved.user;
            }
            neo4j.apply(&mut cfg);
            if cfg.password.is_empty() {
                cfg.password = secret_or_prompt(&ctx.config.neo4j.password_env, "Neo4j password")?;
            }

            let spinner = CliProgress::single("Loading knowledge graph");
            let resp = ctx
                .client
                .load_kg(&KgLoadRequest {
                    pg,
                    neo4j: cfg.clone(),
                })
                .await?;
            spinner.finish();
            ctx.session.mark_kg_ready(&cfg).await?;

            println!("Knowledge graph loaded ({}).", resp.status.as_deref().unwrap_or("ok"));
            let entries: Vec<(&str, String)> = [
                ("Neo4j database", resp.neo4j_database),
                ("Tables loaded", resp.tables_loaded.map(|v| v.to_string())),
                ("Rows loaded", resp.rows_loaded.map(|v| v.to_string())),
                ("Relationships", resp.relationships_created.map(|v| v.to_string())),
            ]
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
            print_entries(&entries);
            Ok(())
        }
        KgAction::Browser => {
            let neo4j = ctx
                .session
                .neo4j()
                .await?
                .ok_or_else(|| eyre!("no knowledge graph yet: run `schemaconsole connect`"))?;
            println!("{}", kg_browser_url(&neo4j.uri)?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn out_or_cwd(out: Option<PathBuf>) -> Result<PathBuf> {
    match out {
        Some(p) => Ok(p),
        None => Ok(std::env::current_dir()?),
    }
}
