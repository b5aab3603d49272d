use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use metaingest_connectors::plugins::COMMON_DB_SOURCE;
use metaingest_connectors::{builtin_resolver, InMemoryCatalog, SourceClass};
use metaingest_core::{AutomationWorkflow, Config, ServiceConnection, ServiceType, StatusType, TestConnectionResult};
use metaingest_spec::SpecDescriptor;

/// metaingest - Resolve ingestion plugins and test source connections
#[derive(Parser)]
#[command(name = "metaingest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: metaingest.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the service spec for a source
    Resolve {
        /// Service type (e.g. database, dashboard)
        service: ServiceType,

        /// Source type (e.g. redshift, BigQuery)
        source: String,

        /// Print the spec as JSON
        #[arg(long)]
        json: bool,

        /// Plugin namespace, overriding the config file
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// List source types with a bundled spec
    List {
        /// Only list this service type
        #[arg(short, long)]
        service: Option<ServiceType>,
    },

    /// Connect to the configured service and run its connectivity probes
    TestConnection {
        /// JSON file with test-connection definitions
        #[arg(short, long)]
        definitions: Option<PathBuf>,

        /// Record results against a workflow with this name
        #[arg(short, long)]
        workflow: Option<String>,

        /// Per-step timeout in seconds, overriding the config file
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else if Path::new("metaingest.toml").exists() {
        Config::from_file(Path::new("metaingest.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if cli.verbose {
        eprintln!("{} namespace: {}", "Using".cyan(), config.namespace);
    }

    match cli.command {
        Commands::Resolve {
            service,
            source,
            json,
            namespace,
        } => resolve_command(config, service, &source, json, namespace),
        Commands::List { service } => list_command(&config, service),
        Commands::TestConnection {
            definitions,
            workflow,
            timeout,
            json,
        } => test_connection_command(&config, definitions.as_deref(), workflow, timeout, json, cli.verbose).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Resolve command - print the spec for one source
fn resolve_command(
    mut config: Config,
    service: ServiceType,
    source: &str,
    json: bool,
    namespace: Option<String>,
) -> Result<()> {
    if let Some(namespace) = namespace {
        config.namespace = namespace;
    }

    let resolver = builtin_resolver(&config)?;
    let spec = resolver
        .resolve_spec(service, source)
        .with_context(|| format!("Failed to resolve spec for {} source '{}'", service, source))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&spec)?);
    } else {
        print_spec(service, source, &spec);
    }

    Ok(())
}

fn print_spec(service: ServiceType, source: &str, spec: &SpecDescriptor) {
    println!("{} {} / {}", "Service spec".bold(), service, source.cyan());
    for (field, path) in spec.class_paths() {
        println!("  {:<22} {}", format!("{}:", field), path.green());
    }
}

/// List command - show bundled source types per service type
fn list_command(config: &Config, service: Option<ServiceType>) -> Result<()> {
    let resolver = builtin_resolver(config)?;

    let services: Vec<ServiceType> = match service {
        Some(service) => vec![service],
        None => ServiceType::ALL.to_vec(),
    };
    let show_empty = service.is_some();

    let mut total = 0;
    for service in services {
        let sources = resolver.source_types(service);
        let has_default = resolver.default_spec(service).is_some();
        if sources.is_empty() && !has_default && !show_empty {
            continue;
        }

        println!("{}", service.to_string().bold());
        for source in &sources {
            println!("  {}", source);
        }
        if has_default {
            println!("  {}", "* (default spec for other sources)".dimmed());
        } else if sources.is_empty() {
            println!("  {}", "(none)".dimmed());
        }
        total += sources.len();
    }

    eprintln!("\n{} {} source type(s)", "Found".cyan(), total);
    Ok(())
}

/// Test-connection command - connect and run the probes for `[service]`
async fn test_connection_command(
    config: &Config,
    definitions: Option<&Path>,
    workflow_name: Option<String>,
    timeout: Option<u64>,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let connection = config
        .service
        .clone()
        .context("No [service] section in config. Add one with service_type, type and connection settings.")?;

    let catalog = match definitions {
        Some(path) => {
            if verbose {
                eprintln!("{} {}", "Loading definitions from:".cyan(), path.display());
            }
            InMemoryCatalog::from_file(path)?
        }
        None => InMemoryCatalog::new(),
    };

    let timeout = timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.test_connection.timeout());

    let resolver = builtin_resolver(config)?;
    let source = resolver
        .import_source_class::<SourceClass>(connection.service_type, &connection.source_type)
        .with_context(|| format!("No source class for {} source '{}'", connection.service_type, connection.source_type))?;
    let connector = source.connector();

    if let Some(warning) = fallback_warning(&source, &connection) {
        tracing::warn!(source_type = %connection.source_type, "{}", warning);
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }

    eprintln!(
        "{} {} with {} connector...",
        "Testing".cyan(),
        connection.sanitized(),
        connector.connector_name()
    );

    let mut workflow = workflow_name.map(|name| AutomationWorkflow::new(name).with_request(connection.clone()));
    let result = connector
        .connect_and_test(&catalog, &connection, workflow.as_mut(), Some(timeout))
        .await?;

    if json {
        println!("{}", result.to_json()?);
    } else {
        print_result(&result);
    }

    if let Some(workflow) = &workflow {
        eprintln!("{} workflow '{}': {:?}", "Recorded".cyan(), workflow.name, workflow.status);
    }

    if result.status == StatusType::Failed {
        anyhow::bail!("Test connection failed");
    }

    Ok(())
}

/// Warning for sources that only resolve through the database default spec
fn fallback_warning(source: &SourceClass, connection: &ServiceConnection) -> Option<String> {
    if source.name() != COMMON_DB_SOURCE.name || connection.source_type.eq_ignore_ascii_case("postgres") {
        return None;
    }
    Some(format!(
        "No bundled connector for '{}'; using {} ({} probes)",
        connection.source_type,
        source.name(),
        source.connector().connector_name()
    ))
}

fn print_result(result: &TestConnectionResult) {
    for step in &result.steps {
        let marker = if step.passed {
            "✓".green()
        } else if step.mandatory {
            "✗".red()
        } else {
            "!".yellow()
        };

        match &step.message {
            Some(message) => println!("  {} {} {}", marker, step.name, message.dimmed()),
            None => println!("  {} {}", marker, step.name),
        }
    }

    let status = match result.status {
        StatusType::Successful => result.status.to_string().green().bold(),
        StatusType::Failed => result.status.to_string().red().bold(),
        StatusType::Running => result.status.to_string().yellow().bold(),
    };
    println!("\n{} {}", "Status:".bold(), status);
}
