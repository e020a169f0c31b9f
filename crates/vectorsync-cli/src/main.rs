mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use vectorsync_config::{AppConfig, ConfigLoader};

#[derive(Parser)]
#[command(
    name = "vectorsync",
    version,
    about = "vectorsync - move embeddings into a vector index and keep it bounded"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (YAML or TOML); overrides --config-dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding config.yml or config.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy embeddings from a SQLite store into the index
    Migrate {
        /// SQLite database with an `embeddings` table
        #[arg(long)]
        sqlite_db: PathBuf,

        #[arg(long)]
        collection: Option<String>,

        #[arg(long)]
        vector_dim: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// Batches in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Validate and preview without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Enforce retention rules on the collection
    Retention {
        #[command(subcommand)]
        action: RetentionCommands,
    },

    /// Show collection statistics
    Stats,

    /// Nearest-neighbour query against the collection
    Search {
        /// Query vector as a JSON array
        #[arg(long)]
        vector: String,

        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum RetentionCommands {
    /// Run one sweep
    Run {
        #[command(flatten)]
        policy: PolicyArgs,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Sweep on an interval until interrupted
    Schedule {
        #[command(flatten)]
        policy: PolicyArgs,

        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[derive(Args, Debug, Default)]
struct PolicyArgs {
    /// Delete points older than this many seconds
    #[arg(long)]
    ttl_secs: Option<u64>,

    /// Keep at most this many points per partition
    #[arg(long)]
    max_per_partition: Option<usize>,

    /// Keep at most this many points overall
    #[arg(long)]
    global_max: Option<usize>,
}

impl PolicyArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ttl) = self.ttl_secs {
            config.retention.ttl_secs = Some(ttl);
        }
        if let Some(max) = self.max_per_partition {
            config.retention.max_per_partition = Some(max);
        }
        if let Some(max) = self.global_max {
            config.retention.global_max = Some(max);
        }
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config = match (&cli.config, &cli.config_dir) {
        (Some(file), _) => ConfigLoader::load_file(file)?,
        (None, Some(dir)) => ConfigLoader::with_dir(dir).load()?,
        (None, None) => ConfigLoader::new()?.load()?,
    };
    Ok(config)
}

fn apply_overrides(command: &Commands, config: &mut AppConfig) {
    match command {
        Commands::Migrate {
            collection,
            vector_dim,
            batch_size,
            concurrency,
            ..
        } => {
            if let Some(collection) = collection {
                config.index.collection = collection.clone();
            }
            if let Some(dim) = vector_dim {
                config.migration.vector_dim = *dim;
            }
            if let Some(size) = batch_size {
                config.migration.batch_size = *size;
            }
            if let Some(n) = concurrency {
                config.migration.concurrency = *n;
            }
        }
        Commands::Retention { action } => match action {
            RetentionCommands::Run { policy, .. } => policy.apply(config),
            RetentionCommands::Schedule {
                policy,
                interval_secs,
            } => {
                policy.apply(config);
                if let Some(secs) = interval_secs {
                    config.retention.interval_secs = *secs;
                }
            }
        },
        Commands::Stats | Commands::Search { .. } => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let mut config = load_config(&cli)?;
    apply_overrides(&cli.command, &mut config);
    config.validate()?;

    let failed = match cli.command {
        Commands::Migrate {
            sqlite_db, dry_run, ..
        } => commands::migrate(&config, &sqlite_db, dry_run).await?,
        Commands::Retention { action } => match action {
            RetentionCommands::Run { dry_run, .. } => {
                commands::retention_run(&config, dry_run).await?
            }
            RetentionCommands::Schedule { .. } => commands::retention_schedule(&config).await?,
        },
        Commands::Stats => commands::stats(&config).await?,
        Commands::Search { vector, limit } => commands::search(&config, &vector, limit).await?,
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
