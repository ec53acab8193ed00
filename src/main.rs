use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudctl::commands::{compute, storage, BucketFilters, InstanceFilters, DEFAULT_MAX_KEYS};
use cloudctl::config::{Config, Overrides};
use cloudctl::download::DownloadRequest;
use cloudctl::executor::execute;
use cloudctl::gcp::client::GcpClient;
use cloudctl::resource::{Aggregator, CloudClient};
use cloudctl::ui::{OutputFormat, PagerSink, PlainSink, RenderSink};
use cloudctl::VERSION;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Read-only inspector for GCP resources
#[derive(Parser, Debug)]
#[command(name = "cloudctl", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// GCP zone to use ("all" for every zone)
    #[arg(short, long, global = true)]
    zone: Option<String>,

    /// Display timezone (utc, los_angeles, tokyo)
    #[arg(long, global = true)]
    tz: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Show results in a scrollable pager
    #[arg(long, global = true)]
    pager: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute Engine instances
    Compute {
        #[command(subcommand)]
        command: ComputeCommand,
    },
    /// Cloud Storage buckets and objects
    Storage {
        #[command(subcommand)]
        command: StorageCommand,
    },
    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ComputeCommand {
    /// List instances grouped by state
    Ls(InstanceFilters),
    /// Describe one instance
    Def {
        /// Instance name or numeric id
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum StorageCommand {
    /// List buckets
    Ls(BucketFilters),
    /// List objects in a bucket
    ListObjects {
        bucket: String,
        /// Only keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Maximum number of objects to list
        #[arg(long, default_value_t = DEFAULT_MAX_KEYS)]
        max_keys: usize,
    },
    /// Describe one bucket
    Def { bucket: String },
    /// Download an object, or every object under a prefix
    Get {
        bucket: String,
        key: String,
        /// Destination directory
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Treat KEY as a prefix and download everything under it
        #[arg(long)]
        recursive: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the config file
    Show,
    /// Set one key (project, zone, timezone, section_timeout_secs)
    Set { key: String, value: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), err);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudctl {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = Config::config_dir() {
        return config_dir.join("cloudctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cloudctl").join("cloudctl.log");
    }
    PathBuf::from("cloudctl.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Commands that talk to the cloud APIs
#[derive(Debug)]
enum ServiceCommand {
    Compute(ComputeCommand),
    Storage(StorageCommand),
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = Config::load()?;

    let command = match args.command {
        Command::Config { command } => return config_command(&mut config, command),
        Command::Compute { command } => ServiceCommand::Compute(command),
        Command::Storage { command } => ServiceCommand::Storage(command),
    };

    let settings = config.resolve(&Overrides {
        project_id: args.project,
        zone: args.zone,
        timezone: args.tz,
    })?;
    tracing::info!(
        "Using project: {}, zone: {}, timezone: {}",
        settings.project_id,
        settings.zone,
        settings.timezone
    );

    let client = Arc::new(
        GcpClient::new(&settings.project_id, &settings.zone, settings.endpoints.clone()).await?,
    );
    let zone = settings.timezone;
    let aggregator = Aggregator::new(client.clone() as Arc<dyn CloudClient>, zone)
        .with_section_timeout(settings.section_timeout);

    let mut sink: Box<dyn RenderSink> = if args.pager {
        Box::new(PagerSink::new(&format!("cloudctl [{}]", settings.project_id)))
    } else {
        Box::new(PlainSink::stdout(args.output))
    };

    let view = match command {
        ServiceCommand::Compute(ComputeCommand::Ls(filters)) => {
            let criteria = filters.criteria();
            execute(sink.as_mut(), compute::list_instances(client.as_ref(), zone, &criteria)).await?
        }
        ServiceCommand::Compute(ComputeCommand::Def { name }) => {
            execute(sink.as_mut(), compute::describe_instance(&aggregator, &name)).await?
        }
        ServiceCommand::Storage(StorageCommand::Ls(filters)) => {
            let criteria = filters.criteria(zone)?;
            execute(sink.as_mut(), storage::list_buckets(client.as_ref(), zone, &criteria)).await?
        }
        ServiceCommand::Storage(StorageCommand::ListObjects {
            bucket,
            prefix,
            max_keys,
        }) => {
            execute(
                sink.as_mut(),
                storage::list_objects(client.as_ref(), zone, &bucket, prefix, max_keys),
            )
            .await?
        }
        ServiceCommand::Storage(StorageCommand::Def { bucket }) => {
            execute(sink.as_mut(), storage::describe_bucket(&aggregator, &bucket)).await?
        }
        ServiceCommand::Storage(StorageCommand::Get {
            bucket,
            key,
            path,
            recursive,
        }) => {
            let request = DownloadRequest {
                bucket,
                key,
                destination: path,
                recursive,
            };
            execute(sink.as_mut(), storage::get_objects(client.clone(), &request)).await?
        }
    };

    Ok(if view.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn config_command(config: &mut Config, command: ConfigCommand) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show => {
            let path = Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("# {}", path);
            println!(
                "{}",
                serde_json::to_string_pretty(config).context("Failed to serialize config")?
            );
        }
        ConfigCommand::Set { key, value } => {
            config.set(&key, &value)?;
            let path = config.save()?;
            println!("Saved {} to {}", key, path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}
