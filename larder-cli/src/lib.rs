//! larder - operator tool over a recipe-book file
//!
//! Inspection, repair analysis, opt-in repair application and planning
//! window maintenance. The binary in `main.rs` parses the command line,
//! initialises logging and hands over to [`run`].

pub mod report;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use larder_common::config::{resolve_book_path, resolve_config_path, write_toml_config, TomlConfig};
use larder_common::{time, Book, BookFile, EventBus, RepairAnalysis, RepairSelection, Taxonomy};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "larder")]
#[command(about = "Recipe book maintenance: statistics, consistency checks, repairs and planning")]
#[command(version)]
pub struct Cli {
    /// Recipe book file (overrides LARDER_BOOK and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub book: Option<PathBuf>,

    /// Configuration file (overrides LARDER_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count units, ingredients, recipes and planned days
    Stats,

    /// Run the repair analysis and print every finding
    Check {
        /// Print the findings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the selected repairs and save the book
    Repair {
        /// Overwrite drifted usage counters
        #[arg(long)]
        counts: bool,

        /// Merge homonymous ingredients and units
        #[arg(long)]
        homonyms: bool,

        /// Delete unused ingredients and units
        #[arg(long)]
        dead: bool,

        /// Remove plan items naming a missing recipe
        #[arg(long)]
        planning: bool,

        /// Every category
        #[arg(long)]
        all: bool,

        /// Report what would change without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Refresh the planning window and print it
    Plan {
        /// Window length in days (defaults to planning.window_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init {
        /// Target file (defaults to the resolved config path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn repair_selection(
    counts: bool,
    homonyms: bool,
    dead: bool,
    planning: bool,
    all: bool,
) -> RepairSelection {
    if all {
        return RepairSelection::all();
    }
    RepairSelection {
        counts,
        homonyms,
        dead,
        planning,
    }
}

/// Resolved configuration and book location for one invocation
pub struct AppContext {
    pub config: TomlConfig,
    pub config_path: PathBuf,
    pub book_file: BookFile,
    pub taxonomy: Arc<Taxonomy>,
}

impl AppContext {
    pub fn new(cli: &Cli, config: TomlConfig) -> Result<Self> {
        let taxonomy = config.load_taxonomy().context("Failed to load taxonomy")?;
        let book_path = resolve_book_path(cli.book.as_deref(), &config);
        Ok(Self {
            config_path: resolve_config_path(cli.config.as_deref()),
            book_file: BookFile::new(book_path),
            taxonomy: Arc::new(taxonomy),
            config,
        })
    }

    fn events(&self) -> EventBus {
        EventBus::new(self.config.events.capacity)
    }

    /// Load the book; a missing file gives an empty book
    pub async fn open_book(&self) -> Result<Book> {
        let path = self.book_file.path();
        if !self.book_file.exists().await {
            warn!(path = %path.display(), "Book file not found, starting with an empty book");
            return Ok(Book::new(Arc::clone(&self.taxonomy), self.events()));
        }
        self.book_file
            .load(Arc::clone(&self.taxonomy), self.events())
            .await
            .with_context(|| format!("Failed to load {}", path.display()))
    }

    pub async fn save_book(&self, book: &Book) -> Result<()> {
        self.book_file
            .save(book)
            .await
            .with_context(|| format!("Failed to save {}", self.book_file.path().display()))
    }
}

/// Execute one command, writing its report to `out`
pub async fn run(cli: Cli, config: TomlConfig, out: &mut impl Write) -> Result<()> {
    let ctx = AppContext::new(&cli, config)?;

    match cli.command {
        Command::Stats => {
            let book = ctx.open_book().await?;
            report::write_stats(out, &book)?;
        }

        Command::Check { json } => {
            let book = ctx.open_book().await?;
            let analysis = RepairAnalysis::run(&book);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&analysis)?)?;
            } else {
                report::write_analysis(out, &book, &analysis)?;
            }
        }

        Command::Repair {
            counts,
            homonyms,
            dead,
            planning,
            all,
            dry_run,
        } => {
            let selection = repair_selection(counts, homonyms, dead, planning, all);
            if selection.is_empty() {
                bail!("Nothing selected: pass --counts, --homonyms, --dead, --planning or --all");
            }

            let mut book = ctx.open_book().await?;
            let analysis = RepairAnalysis::run(&book);
            let repair = analysis.apply(&mut book, selection)?;
            report::write_repair(out, &repair, dry_run)?;

            if dry_run {
                info!("Dry run, book not saved");
            } else if repair.total() > 0 {
                ctx.save_book(&book).await?;
            }
        }

        Command::Plan { days } => {
            let window = days.unwrap_or(ctx.config.planning.window_days);
            let today = time::today();
            let mut book = ctx.open_book().await?;
            let (added, pruned) = book.refresh_planning(today, window);
            info!(added, pruned, window, "Planning refreshed");

            report::write_plan(out, &book, today, window)?;
            if added > 0 || pruned > 0 {
                ctx.save_book(&book).await?;
            }
        }

        Command::Config {
            action: ConfigCommand::Init { path, force },
        } => {
            let path = path.unwrap_or_else(|| ctx.config_path.clone());
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_toml_config(&TomlConfig::default(), &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            writeln!(out, "Wrote default configuration to {}", path.display())?;
        }
    }

    Ok(())
}
