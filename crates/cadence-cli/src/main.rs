//! cadence CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use cadence_core::profile::AdjustmentDirection;

mod commands;

#[derive(Parser)]
#[command(
    name = "cadence",
    version,
    about = "Adaptive difficulty and spaced-repetition scheduling"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example catalog
    Init,

    /// Validate challenge catalog TOML files
    Validate {
        /// Catalog file or directory (defaults to catalog_path from config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Submit an attempt at a challenge
    Submit {
        #[arg(long)]
        user: String,

        /// Challenge id from the catalog
        #[arg(long)]
        challenge: String,

        /// One response; repeat for multi-part challenges
        #[arg(long = "answer")]
        answers: Vec<String>,

        /// Minutes spent
        #[arg(long, default_value = "0")]
        time_spent: u32,
    },

    /// Submit many attempts from a JSON file
    Batch {
        /// JSON array of {"user", "challenge", "answers", "time_spent"}
        #[arg(long)]
        file: PathBuf,
    },

    /// Record the outcome of a review session
    Review {
        #[arg(long)]
        session: uuid::Uuid,

        /// Recall quality, 0 (blackout) to 5 (perfect)
        #[arg(long)]
        quality: u8,
    },

    /// List reviews that are due now
    Due {
        #[arg(long)]
        user: String,
    },

    /// Push a review session back
    Postpone {
        #[arg(long)]
        session: uuid::Uuid,

        #[arg(long)]
        days: u32,
    },

    /// Show a learner's difficulty profile
    Profile {
        #[arg(long)]
        user: String,
    },

    /// Analyze recent performance and recommend a difficulty change
    Analyze {
        #[arg(long)]
        user: String,

        /// History window (defaults to analysis_window_days from config)
        #[arg(long)]
        window_days: Option<u32>,
    },

    /// Apply a difficulty adjustment
    Adjust {
        #[arg(long)]
        user: String,

        /// increase, decrease, or maintain
        #[arg(long)]
        direction: AdjustmentDirection,
    },

    /// Record a finished learning module
    RecordModule {
        #[arg(long)]
        user: String,

        #[arg(long)]
        module: String,
    },

    /// Promote due review sessions to ready
    Sweep {
        /// Keep sweeping on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cadence=info".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { catalog } => commands::validate::execute(catalog, config),
        Commands::Submit {
            user,
            challenge,
            answers,
            time_spent,
        } => commands::submit::execute(user, challenge, answers, time_spent, config, json).await,
        Commands::Batch { file } => commands::batch::execute(file, config, json).await,
        Commands::Review { session, quality } => {
            commands::review::execute(session, quality, config, json).await
        }
        Commands::Due { user } => commands::due::execute(user, config, json).await,
        Commands::Postpone { session, days } => {
            commands::postpone::execute(session, days, config, json).await
        }
        Commands::Profile { user } => commands::profile::execute(user, config, json).await,
        Commands::Analyze { user, window_days } => {
            commands::analyze::execute(user, window_days, config, json).await
        }
        Commands::Adjust { user, direction } => {
            commands::adjust::execute(user, direction, config, json).await
        }
        Commands::RecordModule { user, module } => {
            commands::record_module::execute(user, module, config).await
        }
        Commands::Sweep { watch } => commands::sweep::execute(watch, config, json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
