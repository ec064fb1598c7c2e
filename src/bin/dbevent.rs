use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use dbevent::{
    config::{ConfigError, NotifierConfig},
    dispatch::LoggingHandler,
    DispatchOutcome, EventDispatcher, EventType,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Dbevent(#[from] dbevent::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{count} unknown event code(s)")]
    UnknownCodes { count: usize },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every known engine event
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Decode raw engine event codes
    Decode {
        #[arg(required = true, allow_negative_numbers = true)]
        codes: Vec<i32>,
    },

    /// Dispatch raw engine event codes through a logging handler
    Dispatch {
        /// Dispatcher config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Payload passed with every code (env id or error code)
        #[arg(long, allow_negative_numbers = true)]
        info: Option<i32>,

        #[arg(required = true, allow_negative_numbers = true)]
        codes: Vec<i32>,
    },

    /// Validate a dispatcher config file
    CheckConfig {
        #[arg()]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
struct EventSummary {
    code: i32,
    name: &'static str,
    replication: bool,
    fatal: bool,
}

impl From<EventType> for EventSummary {
    fn from(event_type: EventType) -> Self {
        Self {
            code: event_type.code(),
            name: event_type.name(),
            replication: event_type.is_replication(),
            fatal: event_type.is_fatal(),
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Commands::List { output } => list(*output),
        Commands::Decode { codes } => decode(codes),
        Commands::Dispatch {
            config,
            info,
            codes,
        } => dispatch(config.as_deref(), *info, codes),
        Commands::CheckConfig { file } => check_config(file),
    }
}

fn list(output: OutputFormat) -> Result<(), CliError> {
    let summaries: Vec<EventSummary> = EventType::all().map(EventSummary::from).collect();
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Table => {
            println!("{:>4}  {:<18} {:<11} FATAL", "CODE", "NAME", "REPLICATION");
            for summary in summaries {
                println!(
                    "{:>4}  {:<18} {:<11} {}",
                    summary.code, summary.name, summary.replication, summary.fatal
                );
            }
        }
    }
    Ok(())
}

fn decode(codes: &[i32]) -> Result<(), CliError> {
    let mut unknown = 0;
    for &code in codes {
        match EventType::from_code(code) {
            Ok(event_type) => println!("{}\t{}", code, event_type),
            Err(e) => {
                eprintln!("{}\t{}", code, e);
                unknown += 1;
            }
        }
    }
    if unknown > 0 {
        return Err(CliError::UnknownCodes { count: unknown });
    }
    Ok(())
}

fn dispatch(config: Option<&Path>, info: Option<i32>, codes: &[i32]) -> Result<(), CliError> {
    let config = match config {
        Some(path) => NotifierConfig::from_file(path)?,
        None => NotifierConfig::default(),
    };
    debug!("Dispatcher config: {:?}", config);

    let dispatcher = EventDispatcher::new(config)?;
    dispatcher.register(Arc::new(LoggingHandler));

    for &code in codes {
        match dispatcher.dispatch_raw(code, info)? {
            DispatchOutcome::Filtered => println!("{}\tfiltered", code),
            DispatchOutcome::Delivered {
                handlers,
                failed_handlers,
                ..
            } => {
                if failed_handlers > 0 {
                    warn!(code, failed_handlers, "some handlers failed");
                }
                println!("{}\tdelivered to {} handler(s)", code, handlers);
            }
        }
    }
    Ok(())
}

fn check_config(file: &Path) -> Result<(), CliError> {
    let config = NotifierConfig::from_file(file)?;
    let enabled: Vec<&str> = config
        .enabled_events
        .iter()
        .map(|event_type| event_type.name())
        .collect();
    println!("enabled_events: {}", enabled.join(", "));
    println!("publish_to_bus: {}", config.publish_to_bus);
    println!("bus_capacity: {}", config.bus_capacity);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
