//! CLI entry point for envsec.
//!
//! Lists, reads, writes and removes secrets in one organization/project
//! namespace. Credentials come from `ENVSEC_ID_TOKEN` via federation, or
//! from the ambient AWS credential chain when no token is set.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use envsec::SetAllError;
use envsec::config::{CACHE_NAMESPACE, cache_root};
use envsec::envcli::{CmdConfig, ConfigFlags, gen_config, parse_pairs};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "envsec")]
#[command(about = "Manage environment secrets stored in a parameter store", long_about = None)]
struct Cli {
    #[command(flatten)]
    namespace: NamespaceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct NamespaceArgs {
    /// Organization id by which to namespace secrets
    #[arg(long, global = true)]
    org_id: Option<String>,

    /// Project id by which to namespace secrets
    #[arg(long, global = true)]
    project_id: Option<String>,

    /// Environment name, one of: dev, preview, prod
    #[arg(long, global = true)]
    environment: Option<String>,

    /// Federate without reading or writing the local credential cache
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List secrets in the namespace
    Ls {
        /// Print values instead of masking them
        #[arg(long, default_value_t = false)]
        show: bool,
    },
    /// Print the values of one or more secrets
    Get {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },
    /// Create or overwrite secrets
    Set {
        #[arg(value_name = "NAME=VALUE", required = true)]
        pairs: Vec<String>,
    },
    /// Delete secrets
    Rm {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },
}

impl From<&NamespaceArgs> for ConfigFlags {
    fn from(args: &NamespaceArgs) -> Self {
        ConfigFlags {
            org_id: args.org_id.clone(),
            project_id: args.project_id.clone(),
            environment: args.environment.clone(),
            no_cache: args.no_cache,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            cache_root(|key| std::env::var(key).ok())
                .join(CACHE_NAMESPACE)
                .join("logs/envsec.log")
        });
    let log_dir = log_file_path.parent().unwrap_or(Path::new("logs"));
    let log_file_name = log_file_path
        .file_name()
        .unwrap_or(OsStr::new("envsec.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("warn".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = gen_config(&ConfigFlags::from(&cli.namespace), None).await?;

    match cli.command {
        Commands::Ls { show } => list(&config, show).await?,
        Commands::Get { names } => {
            let vars = config.store.get_all(&config.env_id, &names).await?;
            for name in names.iter().filter(|n| !vars.iter().any(|v| &v.name == *n)) {
                warn!(name = %name, env = %config.env_id, "Secret not set");
            }
            for var in vars {
                println!("{}={}", var.name, var.value);
            }
        }
        Commands::Set { pairs } => {
            let values = parse_pairs(&pairs)?;
            match config.store.set_all(&config.env_id, &values).await {
                Ok(()) => {
                    info!(count = values.len(), env = %config.env_id, "Secrets set");
                    println!("[DONE] Set {} secret(s) in environment: {}", values.len(), config.env_id.env());
                }
                Err(e) => {
                    if let Some(batch) = e.downcast_ref::<SetAllError>() {
                        let written = batch.attempted - batch.failures.len();
                        println!("[PARTIAL] Set {written} of {} secret(s)", batch.attempted);
                    }
                    return Err(e);
                }
            }
        }
        Commands::Rm { names } => {
            config.store.delete_all(&config.env_id, &names).await?;
            println!(
                "[DONE] Deleted {} in environment: {}",
                names.join(", "),
                config.env_id.env()
            );
        }
    }

    Ok(())
}

/// Prints every secret in each environment the command covers.
#[tracing::instrument(skip(config), fields(namespace = %config.env_id))]
async fn list(config: &CmdConfig, show: bool) -> Result<()> {
    for env_name in &config.env_names {
        let env_id = config.env_id.with_env(env_name.as_str())?;
        let vars = config.store.list(&env_id).await?;

        println!("Environment: {}", env_id.env());
        if vars.is_empty() {
            println!("  (no secrets)");
        }
        for var in vars {
            let value = if show { var.value } else { "*****".to_string() };
            println!("  {} = {}", var.name, value);
        }
    }
    Ok(())
}
