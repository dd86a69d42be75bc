//! Signage CLI
//!
//! Command-line interface for the signage kiosk: runs the kiosk in the
//! terminal and manages slides, display order and timers from scripts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use signage_core::{Config, ContentStore, FormError, StorageError};

mod commands;
mod output;
mod prompt;
mod tui;

use commands::record::{CoverFields, ItemFields};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "signage")]
#[command(about = "Signage - unattended equipment slideshow kiosk")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the kiosk in the terminal
    Kiosk,
    /// Manage equipment items
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Manage cover pages
    Cover {
        #[command(subcommand)]
        command: CoverCommands,
    },
    /// List all slides, most recent first
    #[command(alias = "ls")]
    List,
    /// Show one slide
    Show {
        /// Stored order of the slide
        order: u32,
    },
    /// Delete a slide and its image
    #[command(alias = "rm")]
    Delete {
        /// Stored order of the slide
        order: u32,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Change the display order
    Reorder {
        /// New sequence of orders, top of the list first
        #[arg(conflicts_with_all = ["up", "down"])]
        sequence: Vec<u32>,
        /// Move one slide up a position
        #[arg(long, conflicts_with = "down")]
        up: Option<u32>,
        /// Move one slide down a position
        #[arg(long)]
        down: Option<u32>,
    },
    /// Show or set rotation and idle timers
    Timers {
        #[command(subcommand)]
        command: Option<TimerCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Add a new item
    #[command(alias = "create")]
    Add {
        #[command(flatten)]
        fields: ItemFields,
    },
    /// Edit an existing item
    Edit {
        /// Stored order of the item
        order: u32,
        #[command(flatten)]
        fields: ItemFields,
    },
}

#[derive(Subcommand)]
enum CoverCommands {
    /// Add a new cover page
    #[command(alias = "create")]
    Add {
        #[command(flatten)]
        fields: CoverFields,
    },
    /// Edit an existing cover page
    Edit {
        /// Stored order of the cover
        order: u32,
        #[command(flatten)]
        fields: CoverFields,
    },
}

#[derive(Subcommand, Clone)]
enum TimerCommands {
    /// Show timer values
    Show,
    /// Set one or more timer values (seconds, 1-99)
    Set {
        /// Slide rotation interval
        #[arg(long)]
        slider: Option<u32>,
        /// Idle timeout on the settings listing and list view
        #[arg(long)]
        home: Option<u32>,
        /// Idle timeout on editing screens
        #[arg(long)]
        back: Option<u32>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, max_image_bytes, image_naming, list_page_size, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Commands that don't need the store
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    // Kiosk is the default when no command is given
    let Some(command) = cli.command else {
        return tui::run(config).await;
    };
    if matches!(command, Commands::Kiosk) {
        return tui::run(config).await;
    }

    init_cli_logging();

    let mut store = ContentStore::open(config.clone()).context("Failed to open content store")?;
    if let Some(order) = store
        .migrate_legacy_cover()
        .context("Failed to migrate legacy cover")?
    {
        tracing::info!(order, "Moved legacy cover into the slide collection");
    }

    let result = match command {
        Commands::Kiosk | Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Item { command } => match command {
            ItemCommands::Add { fields } => {
                commands::record::add_item(&mut store, &config, fields, &output)
            }
            ItemCommands::Edit { order, fields } => {
                commands::record::edit_item(&mut store, &config, order, fields, &output)
            }
        },
        Commands::Cover { command } => match command {
            CoverCommands::Add { fields } => {
                commands::record::add_cover(&mut store, &config, fields, &output)
            }
            CoverCommands::Edit { order, fields } => {
                commands::record::edit_cover(&mut store, &config, order, fields, &output)
            }
        },
        Commands::List => commands::record::list(&store, &output),
        Commands::Show { order } => commands::record::show(&store, order, &output),
        Commands::Delete { order, yes } => {
            commands::record::delete(&mut store, &config, order, yes, &output)
        }
        Commands::Reorder { sequence, up, down } => {
            commands::order::reorder(&mut store, sequence, up, down, &output)
        }
        Commands::Timers { command } => match command {
            Some(TimerCommands::Show) | None => commands::timers::show(&store, &output),
            Some(TimerCommands::Set { slider, home, back }) => {
                commands::timers::set(&mut store, slider, home, back, &output)
            }
        },
    };

    if let Err(e) = &result {
        if let Some(hint) = recovery_hint(e) {
            eprintln!("Hint: {}", hint);
        }
    }
    result
}

/// Find a storage failure anywhere in the error chain and suggest a fix
fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .chain()
        .find_map(|cause| {
            cause.downcast_ref::<StorageError>().or_else(|| {
                match cause.downcast_ref::<FormError>() {
                    Some(FormError::Storage(e)) => Some(e),
                    _ => None,
                }
            })
        })
        .and_then(StorageError::recovery_suggestion)
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log to stderr, only if SIGNAGE_LOG is set
fn init_cli_logging() {
    let Ok(log_level) = std::env::var("SIGNAGE_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "signage_core={},signage_cli={}",
        log_level, log_level
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_core::RecordKind;

    #[test]
    fn test_recovery_hint_through_form_error() {
        let err: anyhow::Error = FormError::Storage(StorageError::CapacityExceeded {
            kind: RecordKind::Cover,
            cap: 5,
        })
        .into();
        let err = err.context("Failed to add cover");

        assert!(recovery_hint(&err).is_some());
    }

    #[test]
    fn test_recovery_hint_absent_for_validation() {
        let err: anyhow::Error = FormError::Required { field: "Machine" }.into();
        assert!(recovery_hint(&err).is_none());
    }
}
