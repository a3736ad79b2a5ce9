//! CLI Tooling
//!
//! Command-line inspector for tab-tree state. Works against a records
//! file (the JSON export of a store) plus two pure helpers for order-key
//! allocation and move planning that need no file at all.

use crate::config::{CanopyConfig, ConfigLoader};
use crate::error::EngineError;
use crate::keys::keys_between;
use crate::sequence::plan_moves;
use crate::store::TabStore;
use crate::tree::flatten::{flatten, flatten_all, FlatNode};
use crate::tree::{build_tree, TabRecord};
use crate::types::{TabId, WindowId};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::PathBuf;

/// Canopy CLI - Hierarchical tab-tree state inspector
#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Inspect and debug hierarchical tab-tree state")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Records file (JSON array of tab records)
    #[arg(long, default_value = "canopy.json")]
    pub file: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the tree rows of each container
    Flatten {
        /// Container to render; defaults to every container
        #[arg(long)]
        window: Option<WindowId>,

        /// Include rows hidden under collapsed ancestors
        #[arg(long)]
        all: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Check the store invariants
    Validate {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List raw tab records
    Nodes {
        /// Container to list; defaults to every record
        #[arg(long)]
        window: Option<WindowId>,
    },
    /// Allocate order keys between two existing keys
    Keys {
        /// Lower bound key (exclusive)
        #[arg(long)]
        left: Option<String>,

        /// Upper bound key (exclusive)
        #[arg(long)]
        right: Option<String>,

        /// How many keys to allocate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
    /// Plan single-item moves from one flat order to another
    Plan {
        /// Current order, comma-separated ids
        #[arg(long)]
        current: String,

        /// Desired order, comma-separated ids
        #[arg(long)]
        desired: String,

        /// Ids being moved, comma-separated
        #[arg(long)]
        moving: String,
    },
    /// Show the effective configuration after all sources are merged
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Execution context for CLI commands.
pub struct CliContext {
    file: PathBuf,
    config: CanopyConfig,
}

impl CliContext {
    pub fn new(file: PathBuf, config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(&path),
            None => ConfigLoader::load(),
        }
        .map_err(|e| EngineError::ConfigError(e.to_string()))?;
        Ok(Self { file, config })
    }

    pub fn config(&self) -> &CanopyConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, EngineError> {
        match command {
            Commands::Flatten {
                window,
                all,
                format,
            } => self.execute_flatten(*window, *all, format),
            Commands::Validate { format } => self.execute_validate(format),
            Commands::Nodes { window } => self.execute_nodes(*window),
            Commands::Keys { left, right, count } => {
                let keys = keys_between(left.as_deref(), right.as_deref(), *count)?;
                Ok(keys.join("\n"))
            }
            Commands::Plan {
                current,
                desired,
                moving,
            } => {
                let current = parse_ids(current)?;
                let desired = parse_ids(desired)?;
                let moving = parse_ids(moving)?;
                let ops = plan_moves(&current, &desired, &moving)?;
                if ops.is_empty() {
                    return Ok("no moves needed".to_string());
                }
                let mut out = String::new();
                for op in &ops {
                    out.push_str(&format!("move {} to index {}\n", op.id, op.to_index));
                }
                Ok(out.trim_end().to_string())
            }
            Commands::Config { format } => {
                if format == "json" {
                    serde_json::to_string_pretty(&self.config)
                        .map_err(|e| EngineError::ConfigError(e.to_string()))
                } else {
                    toml::to_string_pretty(&self.config)
                        .map_err(|e| EngineError::ConfigError(e.to_string()))
                }
            }
        }
    }

    fn load_store(&self) -> Result<TabStore, EngineError> {
        let data = std::fs::read_to_string(&self.file).map_err(|e| {
            EngineError::ConfigError(format!("Failed to read {:?}: {}", self.file, e))
        })?;
        let records: Vec<TabRecord> = serde_json::from_str(&data).map_err(|e| {
            EngineError::ConfigError(format!("Malformed records file {:?}: {}", self.file, e))
        })?;
        Ok(TabStore::from_records(records))
    }

    fn execute_flatten(
        &self,
        window: Option<WindowId>,
        all: bool,
        format: &str,
    ) -> Result<String, EngineError> {
        let store = self.load_store()?;
        let windows = match window {
            Some(w) => vec![w],
            None => store.window_ids(),
        };

        if format == "json" {
            let mut out = Vec::new();
            for w in windows {
                let roots = build_tree(&store.window_records(w));
                let rows = if all { flatten_all(&roots) } else { flatten(&roots) };
                out.push(json!({
                    "window": w,
                    "rows": rows
                        .iter()
                        .map(|row| json!({
                            "id": row.id,
                            "depth": row.depth,
                            "collapsed": row.collapsed,
                            "title": row.title,
                        }))
                        .collect::<Vec<_>>(),
                }));
            }
            serde_json::to_string_pretty(&out)
                .map_err(|e| EngineError::ConfigError(e.to_string()))
        } else {
            let mut out = String::new();
            for w in windows {
                let roots = build_tree(&store.window_records(w));
                let rows = if all { flatten_all(&roots) } else { flatten(&roots) };
                out.push_str(&format_window_tree(w, &rows));
            }
            Ok(out.trim_end().to_string())
        }
    }

    fn execute_validate(&self, format: &str) -> Result<String, EngineError> {
        let store = self.load_store()?;
        let violations = store.validate();

        if format == "json" {
            let value = json!({
                "valid": violations.is_empty(),
                "violations": violations,
            });
            return serde_json::to_string_pretty(&value)
                .map_err(|e| EngineError::ConfigError(e.to_string()));
        }
        if violations.is_empty() {
            return Ok(format!("{}", "store is consistent".green()));
        }
        let mut out = format!("{} violation(s):\n", violations.len());
        for violation in &violations {
            out.push_str(&format!("  {} {}\n", "x".red(), violation));
        }
        Ok(out.trim_end().to_string())
    }

    fn execute_nodes(&self, window: Option<WindowId>) -> Result<String, EngineError> {
        let store = self.load_store()?;
        let mut records = store.export();
        if let Some(w) = window {
            records.retain(|r| r.container_id == Some(w));
        }

        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec![
            "ID", "Parent", "Key", "Window", "Index", "Collapsed", "Title",
        ]);
        for r in &records {
            table.add_row(vec![
                r.id.to_string(),
                r.parent_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                r.order_key.clone(),
                r.container_id
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                r.flat_index.to_string(),
                if r.collapsed { "yes".to_string() } else { String::new() },
                r.title.clone().unwrap_or_default(),
            ]);
        }
        Ok(table.to_string())
    }
}

fn format_window_tree(window: WindowId, rows: &[FlatNode]) -> String {
    let mut out = format!("{} {}\n", "window".dimmed(), window.bold());
    if rows.is_empty() {
        out.push_str(&format!("  {}\n", "(empty)".dimmed()));
        return out;
    }
    for row in rows {
        let mut line = String::from("  ");
        for _ in 1..row.depth {
            line.push_str("│  ");
        }
        if row.depth > 0 {
            line.push_str(if row.is_last_child { "└─ " } else { "├─ " });
        }
        line.push_str(&format!("{}", row.id.cyan()));
        if row.collapsed {
            line.push_str(&format!(" {}", "[+]".yellow()));
        }
        if let Some(title) = &row.title {
            line.push_str(&format!("  {}", title.dimmed()));
        }
        line.push('\n');
        out.push_str(&line);
    }
    out
}

fn parse_ids(list: &str) -> Result<Vec<TabId>, EngineError> {
    list.split(',')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<TabId>()
                .map_err(|_| EngineError::ConfigError(format!("Invalid id '{}'", part)))
        })
        .collect()
}
