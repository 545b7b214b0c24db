//! zas-service: HTTP control plane for the ZFS auto-snapshot plugin
//!
//! Serves the settings, log and manual-run API the plugin page talks to, and
//! can print the cron schedule derived from the stored configuration.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zas_core::{config, PluginPaths};
use zas_http::{HttpServer, RouterBuilder};
use zas_web::{create_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "zas-service")]
#[command(about = "HTTP control plane for the ZFS auto-snapshot plugin")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Bind address (host:port or port)
    #[arg(short, long, default_value = "127.0.0.1:8089")]
    bind: String,

    /// Static files directory for the plugin UI
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Disable CORS
    #[arg(long)]
    no_cors: bool,

    /// Disable compression
    #[arg(long)]
    no_compression: bool,

    /// Plugin configuration file
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Script that installs the cron entry after a save
    #[arg(long)]
    activation_script: Option<PathBuf>,

    /// Snapshot worker executable
    #[arg(long)]
    worker: Option<PathBuf>,

    /// Worker debug log
    #[arg(long)]
    debug_log: Option<PathBuf>,

    /// Latest run summary log
    #[arg(long)]
    summary_log: Option<PathBuf>,

    /// Lock file held by the worker while it runs
    #[arg(long)]
    run_lock: Option<PathBuf>,

    /// Lock directory created by the worker while it runs
    #[arg(long)]
    run_lock_dir: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Print the cron expression derived from the stored configuration
    Cron,
}

impl Args {
    /// Environment-resolved paths with command-line overrides on top
    fn plugin_paths(&self) -> PluginPaths {
        let mut paths = PluginPaths::from_env();
        let overrides = [
            (&self.config_file, &mut paths.config_file),
            (&self.activation_script, &mut paths.activation_script),
            (&self.worker, &mut paths.worker),
            (&self.debug_log, &mut paths.debug_log),
            (&self.summary_log, &mut paths.summary_log),
            (&self.run_lock, &mut paths.run_lock),
            (&self.run_lock_dir, &mut paths.run_lock_dir),
        ];
        for (arg, path) in overrides {
            if let Some(value) = arg {
                *path = value.clone();
            }
        }
        paths
    }
}

fn print_cron(paths: &PluginPaths) -> Result<()> {
    let config = config::load(&paths.config_file);
    let cron = zas_core::derive_cron_for(&config)
        .with_context(|| format!("invalid schedule in {}", paths.config_file.display()))?;
    if cron.is_empty() {
        println!("(disabled)");
    } else {
        println!("{}", cron);
    }
    Ok(())
}

async fn serve(args: &Args, paths: PluginPaths) -> Result<()> {
    info!("Worker: {}", paths.worker.display());
    info!("Config: {}", paths.config_file.display());

    let state = Arc::new(AppState::new(paths));

    let mut router_builder = RouterBuilder::new().nest("/api", "zfs-autosnapshot", create_router(state));
    if let Some(dir) = &args.static_dir {
        router_builder = router_builder.static_dir(dir);
    }

    let server = HttpServer::builder()
        .bind(args.bind.clone())
        .router(router_builder.build())
        .cors(!args.no_cors)
        .compression(!args.no_compression)
        .build()?;

    server.serve().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from /etc/zfs-autosnapshot/environment (if exists)
    zas_core::load_environment();

    tracing_subscriber::registry()
        .with(fmt::layer().compact())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,zas_web=debug,zas_core=debug")),
        )
        .init();

    let args = Args::parse();
    let paths = args.plugin_paths();

    match args.command {
        Some(Commands::Cron) => print_cron(&paths),
        Some(Commands::Serve) | None => {
            info!("Starting ZFS auto-snapshot service v{}", env!("CARGO_PKG_VERSION"));
            serve(&args, paths).await
        }
    }
}
