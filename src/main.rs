//! plughost
//!
//! Boots the module host: configuration, logging, worker pool, startup
//! hooks, listeners. Runs until SIGINT/SIGTERM, then shuts down in reverse.
//!
//! ```text
//!   plughost.toml ─┐
//!   PLUGHOST_* env ├─▶ HostConfig ─▶ LogRegistry ─▶ tokio runtime (sized pool)
//!   CLI flags ─────┘                                      │
//!                                                          ▼
//!                     ┌────────────────────── Host::boot ─────────────────────┐
//!                     │ port preflight → hooks → module framework → listeners │
//!                     └───────────────────────────────────────────────────────┘
//!                                                          │
//!                         signal ─▶ RunningHost::shutdown ◀┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plughost::config::watcher::{apply_log_updates, ConfigWatcher};
use plughost::config::{load_or_default, HostConfig, Overrides, ServerMode};
use plughost::error::BootError;
use plughost::framework::{ConsoleModule, HostModule, StaticFramework};
use plughost::http::ServerProvisioner;
use plughost::lifecycle::{forward_signals, Host, Shutdown};
use plughost::logging::LogRegistry;
use plughost::observability::metrics::init_metrics;

#[derive(Parser, Debug)]
#[command(name = "plughost", version, about = "Pluggable module host")]
struct Cli {
    /// Configuration file; missing means defaults.
    #[arg(short, long, default_value = "plughost.toml")]
    config: PathBuf,

    /// Listener port, overrides `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Fail fast when the port is already bound.
    #[arg(long)]
    check_port: bool,

    /// Run mode (`dev` or `prod`).
    #[arg(long)]
    mode: Option<ServerMode>,

    /// Enable the HTTPS listener.
    #[arg(long)]
    https: bool,

    /// Enable the alternate plaintext listener.
    #[arg(long)]
    alt: bool,

    /// Route file logging through the async queue.
    #[arg(long)]
    log_async: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            check_port: self.check_port,
            mode: self.mode,
            enable_https: self.https,
            enable_alt: self.alt,
            log_async: self.log_async,
            log_immediate_flush: false,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let (config, overrides) = match load(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("plughost: {e}");
            std::process::exit(e.exit_code());
        }
    };

    let registry = Arc::new(LogRegistry::new(config.logging.clone()));
    tracing_subscriber::registry().with(registry.layers()).init();
    if let Err(e) = registry.init() {
        let e = BootError::from(e);
        eprintln!("plughost: {e}");
        std::process::exit(e.exit_code());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), mode = %config.server.mode, "plughost starting");

    let config = Arc::new(config);
    let pool = ServerProvisioner::new(Arc::clone(&config), overrides.port).worker_pool(num_cpus::get());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(pool.core.max(1))
        .max_blocking_threads(pool.max.max(1))
        .thread_name("plughost-worker")
        .enable_all()
        .build();
    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(e) => fail(&registry, BootError::Io(e)),
    };

    if let Err(e) = runtime.block_on(run(cli.config, config, overrides, Arc::clone(&registry))) {
        fail(&registry, e);
    }
}

fn load(cli: &Cli) -> Result<(HostConfig, Overrides), BootError> {
    let overrides = Overrides::from_env()?.merge(cli.overrides());
    let mut config = load_or_default(&cli.config)?;
    overrides.apply(&mut config);
    Ok((config, overrides))
}

async fn run(
    config_path: PathBuf,
    config: Arc<HostConfig>,
    overrides: Overrides,
    registry: Arc<LogRegistry>,
) -> Result<(), BootError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Dropping the watcher stops it, so it lives for the whole run.
    let _watcher = if config_path.exists() {
        let (watcher, updates) = ConfigWatcher::new(&config_path, (*config).clone());
        match watcher.run() {
            Ok(watcher) => {
                tokio::spawn(apply_log_updates(updates, Arc::clone(&registry)));
                Some(watcher)
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %config_path.display(), "Config watcher disabled");
                None
            }
        }
    } else {
        None
    };

    let modules: Vec<Arc<dyn HostModule>> = vec![Arc::new(ConsoleModule::new(config.console.route.clone()))];
    let framework = Arc::new(StaticFramework::new(modules));

    let running = Host::new(Arc::clone(&config), registry, framework, overrides.port)
        .with_default_hooks()
        .boot()
        .await?;

    let shutdown = Shutdown::new();
    forward_signals(&shutdown).await;

    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    running.shutdown(grace).await;
    Ok(())
}

fn fail(registry: &LogRegistry, error: BootError) -> ! {
    tracing::error!(error = %error, "Host failed to start");
    registry.stop();
    std::process::exit(error.exit_code());
}
