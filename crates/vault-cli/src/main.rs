use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vault_cli::cli::{CliCommand, CliConfig, RuleCommand, Vault};
use vault_core::constants::removal_reasons;
use vault_core::tracing_setup::init_tracing_with_default;

#[derive(Parser)]
#[command(name = "notif-vault")]
#[command(about = "Capture, filter and browse a local notification history")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (dataDir, selfAppId, retentionDays, appNames)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory holding the notification database
    #[arg(long, short = 'd')]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one posted notification
    Capture {
        /// Package id of the posting app
        #[arg(long)]
        app_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// Notification key (defaults to "<app id>|<time>")
        #[arg(long)]
        key: Option<String>,
        /// Post time in epoch milliseconds (defaults to now)
        #[arg(long)]
        time: Option<i64>,
    },

    /// Replay listener events from a JSON-lines file
    Replay {
        /// One {"posted": {...}} or {"removed": {...}} object per line
        file: PathBuf,
    },

    /// Report a notification removal
    Dismiss {
        key: String,
        /// Removal reason code (2 = user cancel, 3 = cancel all, 8 = app cancel)
        #[arg(long, default_value_t = removal_reasons::CANCEL)]
        reason: i32,
    },

    /// Print the filtered notification history
    List {
        /// Show the Dismissed tab instead of All
        #[arg(long)]
        dismissed: bool,
        /// Restrict to one app by display name
        #[arg(long, short = 'a')]
        app: Option<String>,
        /// Case-insensitive search over app name, title and body
        #[arg(long, short = 's')]
        search: Option<String>,
        /// Include date and time-of-day headers
        #[arg(long, short = 'g')]
        grouped: bool,
    },

    /// List app names seen in the history
    Apps,

    /// Hide every notification from an app
    Ignore { app_id: String },

    /// Stop hiding an app
    Unignore { app_id: String },

    /// List ignored app ids
    Ignored,

    /// Manage keyword filter rules
    #[command(subcommand)]
    Rule(RuleCommands),

    /// Delete notifications by id
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Delete every notification
    Clear,

    /// Delete notifications older than the retention window
    Sweep,
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Add a rule hiding notifications whose title/content contain keywords
    Add {
        /// Limit the rule to one app by display name
        #[arg(long)]
        app: Option<String>,
        /// Limit the rule to one app by package id
        #[arg(long)]
        app_id: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },

    /// List rules, newest first
    List,

    /// Delete a rule by id
    Delete { id: i64 },
}

fn main() {
    let cli = Cli::parse();
    init_tracing_with_default("warn");

    let config = load_config(&cli);

    let command = match cli.command {
        Some(Commands::Capture {
            app_id,
            title,
            body,
            key,
            time,
        }) => CliCommand::Capture {
            app_id,
            title,
            body,
            key,
            time_millis: time,
        },
        Some(Commands::Replay { file }) => CliCommand::Replay { path: file },
        Some(Commands::Dismiss { key, reason }) => CliCommand::Dismiss { key, reason },
        Some(Commands::List {
            dismissed,
            app,
            search,
            grouped,
        }) => CliCommand::List {
            dismissed,
            app,
            search,
            grouped,
        },
        Some(Commands::Apps) => CliCommand::Apps,
        Some(Commands::Ignore { app_id }) => CliCommand::Ignore { app_id },
        Some(Commands::Unignore { app_id }) => CliCommand::Unignore { app_id },
        Some(Commands::Ignored) => CliCommand::Ignored,
        Some(Commands::Rule(rule)) => CliCommand::Rule(match rule {
            RuleCommands::Add {
                app,
                app_id,
                title,
                content,
            } => RuleCommand::Add {
                app_name: app,
                app_id,
                title,
                content,
            },
            RuleCommands::List => RuleCommand::List,
            RuleCommands::Delete { id } => RuleCommand::Delete { id },
        }),
        Some(Commands::Delete { ids }) => CliCommand::Delete { ids },
        Some(Commands::Clear) => CliCommand::Clear,
        Some(Commands::Sweep) => CliCommand::Sweep,
        None => {
            // No command - show help
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    let core_config = config.core_config(cli.data_dir.clone());
    let result = Vault::open(core_config, config.resolver()).and_then(|vault| vault.execute(command));

    match result {
        Ok(output) => {
            let rendered = if cli.pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            };
            match rendered {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Load configuration from file, or defaults when none is given
fn load_config(cli: &Cli) -> CliConfig {
    match cli.config {
        Some(ref path) => match CliConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => CliConfig::default(),
    }
}
