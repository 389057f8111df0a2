// remote-proc-sampler - version 0.1.0
// One-shot sampler for remote process CPU/memory usage, meant for cron
use anyhow::{Context, Result};
use clap::Parser;
use remote_proc_sampler::config::{load_config, validate_effective_config, Config};
use remote_proc_sampler::executor::{RemoteExecutor, ReplayExecutor, ShellExecutor};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Args, Commands, ConfigFormat, LogLevel};
use commands::config::render_config;
use commands::{
    command_check, command_config, command_generate_testdata, command_parse, command_prepare,
    command_run,
};

/// Loads the config file (unless disabled) and applies CLI overrides.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(db) = &args.database {
        config.database = Some(db.clone());
    }
    if let Some(n) = args.parallelism {
        config.parallelism = Some(n);
    }
    if let Some(path) = &args.metrics_file {
        config.metrics_file = Some(path.clone());
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{level:?}").to_lowercase());
    }

    Ok(config)
}

/// Shows configuration in requested format
fn show_config(config: &Config, format: ConfigFormat) -> Result<()> {
    let output = render_config(config, format)?;
    println!("{output}");
    Ok(())
}

/// Log level precedence: CLI > config file > info.
fn effective_log_level(config: &Config, args: &Args) -> LogLevel {
    args.log_level
        .or_else(|| config.log_level.as_deref().and_then(LogLevel::from_config))
        .unwrap_or(LogLevel::Info)
}

fn setup_logging(config: &Config, args: &Args) -> Result<()> {
    let level = effective_log_level(config, args);
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    // stdout carries the pass table and parse output
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    debug!("Logging initialized with level: {:?}", level);
    Ok(())
}

fn build_executor(args: &Args) -> Box<dyn RemoteExecutor> {
    match &args.replay_dir {
        Some(dir) => {
            info!("Replaying captured outputs from {}", dir.display());
            Box::new(ReplayExecutor::new(dir.clone()))
        }
        None => Box::new(ShellExecutor::new()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {:#}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        return show_config(&config, args.config_format);
    }

    // Offline subcommands do not need a valid sampling config
    match &args.command {
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => return command_config(output.clone(), *format, *commented),
        Some(Commands::Parse {
            format,
            process_prefix,
            output_format,
            input,
        }) => {
            setup_logging(&config, &args)?;
            return command_parse(
                (*format).into(),
                process_prefix.as_deref(),
                *output_format,
                input,
            );
        }
        _ => {}
    }

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {:#}", e);
        std::process::exit(1);
    }

    setup_logging(&config, &args)?;
    let executor = build_executor(&args);

    match args.command.as_ref() {
        None | Some(Commands::Run) => {
            info!(
                "Starting remote-proc-sampler pass over {} targets",
                config.target_count()
            );
            command_run(&config, executor.as_ref()).map(|_| ())
        }
        Some(Commands::Check { probe }) => command_check(&config, *probe, executor.as_ref()),
        Some(Commands::Prepare) => command_prepare(&config, executor.as_ref()).map(|_| ()),
        Some(Commands::GenerateTestdata {
            output,
            containers,
            backends,
        }) => command_generate_testdata(output.clone(), *containers, *backends, &config)
            .map(|_| ()),
        Some(Commands::Config { .. } | Commands::Parse { .. }) => Ok(()),
    }
}
