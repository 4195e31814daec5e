//! Command-line surface: argument definitions and command dispatch.

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use kgrid_lib::GridClient;
use kgrid_lib::KnowledgeGrid;
use kgrid_lib::auth::StaticTokenProvider;
use kgrid_lib::error::ApiError;
use kgrid_lib::error::StoreError;
use kgrid_lib::grid::GridConfig;
use kgrid_lib::model::ColumnConfig;
use kgrid_lib::model::Row;
use kgrid_lib::model::Value;
use kgrid_lib::store::OverlayStore;
use kgrid_lib::store::SqliteBackend;

use crate::paths;

/// Browse and edit a remote knowledge table.
#[derive(Parser)]
#[command(name = "kgrid", version, long_about = None)]
pub(crate) struct Cli {
    /// Base URL of the table service.
    #[arg(long, env = "KGRID_URL")]
    pub url: String,

    /// Bearer token for the table service.
    #[arg(long, env = "KGRID_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Table to operate on.
    #[arg(short, long, env = "KGRID_TABLE")]
    pub table: String,

    /// Scroll source name (defaults to the table id).
    #[arg(long)]
    pub source: Option<String>,

    /// Scroll context id.
    #[arg(long, default_value = "")]
    pub context: String,

    /// Column mapping as `Display=backend_id`; repeatable.
    #[arg(short, long = "column", value_parser = parse_pair)]
    pub columns: Vec<(String, String)>,

    /// Rows per page.
    #[arg(long, default_value_t = 20)]
    pub page_size: usize,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print a page of rows.
    List {
        /// One-based page number.
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Load every row instead of one page.
        #[arg(long, conflicts_with = "page")]
        all: bool,

        /// Filter as `Column=text`; repeatable, all must match.
        #[arg(short, long = "filter", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
    },

    /// Add a row from `Column=value` pairs.
    Add {
        #[arg(required = true, value_parser = parse_pair)]
        fields: Vec<(String, String)>,
    },

    /// Change cells of a row and save it.
    Edit {
        /// Visible row id.
        id: String,

        #[arg(required = true, value_parser = parse_pair)]
        fields: Vec<(String, String)>,
    },

    /// Delete rows by visible id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Reconcile local changes against the full table.
    Refresh,

    /// Show local changes the server has not confirmed yet.
    Pending,
}

/// Errors surfaced to the terminal.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Grid(#[from] kgrid_lib::Error),

    #[error(transparent)]
    Client(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not determine a data directory")]
    NoDataDir,

    #[error("could not create {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn to_fields(pairs: Vec<(String, String)>) -> HashMap<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key, Value::from(value)))
        .collect()
}

impl Cli {
    fn grid_config(&self) -> GridConfig {
        let columns = self
            .columns
            .iter()
            .map(|(name, db_name)| ColumnConfig::new(name.clone(), db_name.clone()))
            .collect();
        let source = self.source.clone().unwrap_or_else(|| self.table.clone());
        GridConfig::new(self.table.clone())
            .with_source(source, self.context.clone())
            .with_columns(columns)
            .with_page_size(self.page_size)
            .with_request_timeout(Duration::from_secs(self.timeout))
    }

    async fn open_grid(&self) -> Result<KnowledgeGrid, CliError> {
        let client = GridClient::builder()
            .url(&self.url)
            .token_provider(StaticTokenProvider::new(self.token.clone()))
            .timeout(Duration::from_secs(self.timeout))
            .build()?;

        let db = paths::overlay_db().ok_or(CliError::NoDataDir)?;
        if let Some(dir) = db.parent() {
            std::fs::create_dir_all(dir).map_err(|source| CliError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }
        let store = OverlayStore::new(SqliteBackend::open(&db).await?);
        log::debug!("Using overlay database at {}", db.display());

        Ok(KnowledgeGrid::new(self.grid_config(), client, store))
    }
}

/// Runs the selected command to completion.
pub(crate) async fn run(cli: Cli) -> Result<(), CliError> {
    let grid = cli.open_grid().await?;
    grid.mount().await?;

    let result = dispatch(&grid, cli.command).await;
    for notice in grid.take_notices() {
        eprintln!("warning: {}", notice.message);
    }
    result
}

async fn dispatch(grid: &KnowledgeGrid, command: Command) -> Result<(), CliError> {
    match command {
        Command::List { page, all, filters } => {
            if all {
                grid.show_all().await?;
            } else {
                for _ in 1..page {
                    if grid.next_page().await?.is_none() {
                        break;
                    }
                }
            }
            for (column, query) in &filters {
                if !grid.set_filter(column, query) {
                    eprintln!("warning: column '{column}' cannot be filtered");
                }
            }
            grid.apply_filters_now();
            print_rows(grid);
        }
        Command::Add { fields } => {
            let id = grid.add_row(to_fields(fields)).await?;
            println!("{id}");
        }
        Command::Edit { id, fields } => {
            locate_row(grid, &id).await?;
            grid.edit_row(&id, to_fields(fields)).await?;
            let saved = grid.save().await?;
            println!("saved {}", saved.join(", "));
        }
        Command::Delete { ids } => {
            for id in &ids {
                locate_row(grid, id).await?;
            }
            let count = grid.delete_rows(ids).await?;
            println!("deleted {count} row(s)");
        }
        Command::Refresh => {
            let report = grid.refresh().await?;
            println!(
                "confirmed {}, evicted {}, forgotten {}",
                report.confirmed.len(),
                report.evicted.len(),
                report.forgotten.len()
            );
        }
        Command::Pending => {
            for row in grid.new_rows() {
                let state = grid
                    .entry_state(row.id())
                    .map_or_else(String::new, |s| format!("{s:?}"));
                println!("+ {}\t{state}", row.id());
            }
            for id in grid.deleted_row_ids() {
                println!("- {id}");
            }
        }
    }
    Ok(())
}

/// Pages forward until `id` is loaded. Returns `false` once the pages run
/// out without it.
async fn locate_row(grid: &KnowledgeGrid, id: &str) -> Result<bool, kgrid_lib::Error> {
    while grid.row_id(id).is_none() {
        if grid.next_page().await?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

fn print_rows(grid: &KnowledgeGrid) {
    let columns = grid.display_columns();
    println!("id\t{}", columns.join("\t"));
    for row in grid.display_rows() {
        let cells: Vec<String> = columns.iter().map(|c| row.text(c)).collect();
        println!("{}\t{}", row.id(), cells.join("\t"));
    }
    println!(
        "-- page {} of ~{} rows{}",
        grid.page_index() + 1,
        grid.row_count(),
        if grid.has_more() { ", more available" } else { "" }
    );
}
