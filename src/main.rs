use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use plumbline::instance::{self, Instance};
use plumbline::plugins::{self, PluginSettings};
use plumbline::{FaultPolicy, Runner, SchemaDefinition, Severity, ValidationReport};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::{Config, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plumbline")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("plumbline.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Narrow the log level to the one named in the config, if any
fn apply_log_level(config: &Config) {
    if let Some(level) = config.log_level.as_deref() {
        match level.parse::<log::LevelFilter>() {
            Ok(filter) => log::set_max_level(filter),
            Err(_) => log::warn!("Ignoring unknown log level '{}'", level),
        }
    }
}

/// Options for one `validate` invocation, CLI flags layered over the config
struct ValidateOptions {
    schema: PathBuf,
    target_class: Option<String>,
    policy: FaultPolicy,
    format: OutputFormat,
    fail_fast: bool,
    instances: Vec<String>,
}

fn run_application(cli: &Cli, config: &Config) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    if !config.output.color {
        colored::control::set_override(false);
    }

    match &cli.command {
        Commands::Validate {
            schema,
            target_class,
            policy,
            format,
            fail_fast,
            instances,
        } => {
            let options = ValidateOptions {
                schema: schema.clone(),
                target_class: target_class.clone().or_else(|| config.run.target_class.clone()),
                policy: policy.unwrap_or(config.run.policy),
                format: format.unwrap_or(config.output.format),
                fail_fast: *fail_fast || config.run.fail_fast,
                instances: instances.clone(),
            };
            handle_validate_command(&options, config, cli.is_verbose())
        }
        Commands::Plugins => {
            handle_plugins_command(config);
            Ok(true)
        }
    }
}

/// Expand glob patterns; arguments without glob metacharacters are kept as-is
fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let matches: Vec<PathBuf> = glob::glob(pattern)
            .context(format!("Invalid glob pattern: {}", pattern))?
            .collect::<std::result::Result<_, _>>()
            .context(format!("Failed to expand {}", pattern))?;
        if matches.is_empty() {
            return Err(eyre!("No files match {}", pattern));
        }
        paths.extend(matches);
    }
    Ok(paths)
}

fn load_instances(paths: &[PathBuf]) -> Result<Vec<Instance>> {
    let mut instances = Vec::new();
    for path in paths {
        let loaded = instance::load_file(path).context(format!("Failed to load instances from {}", path.display()))?;
        debug!("Loaded {} instance(s) from {}", loaded.len(), path.display());
        instances.extend(loaded);
    }
    Ok(instances)
}

fn build_runner(config: &Config, policy: FaultPolicy) -> Result<Runner> {
    let mut runner = Runner::new().with_policy(policy);
    for entry in &config.plugins {
        runner = runner.add_boxed(plugins::builtin(&entry.name, &entry.settings)?);
    }
    if runner.is_empty() {
        return Err(eyre!("No plugins configured"));
    }
    Ok(runner)
}

fn validate(runner: &mut Runner, schema: Arc<SchemaDefinition>, options: &ValidateOptions) -> Result<ValidationReport> {
    let paths = expand_paths(&options.instances)?;
    let instances = load_instances(&paths)?;
    info!("Validating {} instance(s) from {} file(s)", instances.len(), paths.len());

    let mut session = runner.start(schema, options.target_class.as_deref())?;
    for instance in instances {
        let findings = session.process(instance)?;
        if options.fail_fast && findings.iter().any(|f| f.result.severity() >= Severity::Error) {
            info!("Stopping after the first instance with errors");
            return Ok(session.cancel());
        }
    }
    Ok(session.finish()?)
}

/// Returns whether the report passed
fn handle_validate_command(options: &ValidateOptions, config: &Config, verbose: bool) -> Result<bool> {
    info!("Validating against schema: {}", options.schema.display());

    let schema = Arc::new(
        SchemaDefinition::load(&options.schema)
            .context(format!("Failed to load schema {}", options.schema.display()))?,
    );
    let mut runner = build_runner(config, options.policy)?;

    if verbose {
        println!(
            "{} {} (policy: {})",
            "Plugins:".cyan(),
            runner.plugin_names().join(", "),
            options.policy
        );
    }

    let report = validate(&mut runner, schema, options).context("Validation failed")?;
    println!("{}", cli::output::render(&report, options.format)?);
    Ok(!report.has_errors())
}

fn handle_plugins_command(config: &Config) {
    let enabled: Vec<&str> = config.plugins.iter().map(|p| p.name.as_str()).collect();
    for (name, description) in plugins::BUILTIN {
        let marker = if enabled.contains(name) { "*".green() } else { " ".normal() };
        println!("{} {:<20} {}", marker, name.bold(), description);
    }
    for entry in config.plugins.iter().filter(|p| p.settings != PluginSettings::default()) {
        println!("  {} {:?}", format!("{}:", entry.name).dimmed(), entry.settings);
    }
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(&config);

    info!("Starting with config from: {:?}", cli.config);

    let passed = run_application(&cli, &config).context("Application failed")?;
    if !passed {
        std::process::exit(1);
    }

    Ok(())
}
