//! pmd daemon entry point.
//!
//! Loads the configuration and hardware topology, connects to CONFIG_DB and
//! STATE_DB, and runs the poll loop until SIGINT.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};

use sonic_pmd::config::BackendKind;
use sonic_pmd::debug;
use sonic_pmd::{ConfigStore, Daemon, ModuleBackend, PmdConfig, RedisConfigStore, StaticTopology};

/// SONiC Pluggable Module Daemon
#[derive(Parser, Debug)]
#[command(name = "pmd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = sonic_pmd::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Hardware topology file, overrides the configured one
    #[arg(short = 't', long)]
    topology: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Print module attributes after a single pass (all modules if no
    /// instance is given)
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    dump: Option<String>,

    /// Print the dump as JSON
    #[arg(long, requires = "dump")]
    json: bool,
}

/// Initialize tracing/logging. `RUST_LOG` takes precedence over `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = PmdConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate().context("invalid configuration")?;

    let topology_path = args.topology.unwrap_or_else(|| config.platform.topology.clone());
    let topology = Arc::new(
        StaticTopology::load(&topology_path)
            .with_context(|| format!("loading topology {}", topology_path.display()))?,
    );

    info!(
        "Redis: {}:{} (CONFIG_DB {}, STATE_DB {})",
        config.database.redis_host,
        config.database.redis_port,
        config.database.config_db_number,
        config.database.state_db_number
    );
    let mut store = RedisConfigStore::connect(&config.database)
        .await
        .context("connecting to redis")?;

    match config.platform.backend {
        BackendKind::I2c => {
            let backend = i2c_backend(&config, Arc::clone(&topology))?;
            let daemon = Daemon::new(backend, topology, &config.polling);
            drive(daemon, &mut store, &config, args.once, args.dump, args.json).await
        }
        BackendKind::Sdk => bail!("backend \"sdk\" is not available in this build"),
    }
}

#[cfg(target_os = "linux")]
fn i2c_backend(
    config: &PmdConfig,
    topology: Arc<StaticTopology>,
) -> anyhow::Result<
    sonic_pmd::RegisterBackend<sonic_pmd::transport::I2cDevTransport, StaticTopology>,
> {
    let transport = sonic_pmd::transport::I2cDevTransport::new(config.polling.operation_timeout());
    Ok(sonic_pmd::RegisterBackend::new(
        transport,
        topology,
        config.polling.retry_policy(),
    ))
}

#[cfg(not(target_os = "linux"))]
fn i2c_backend(
    _config: &PmdConfig,
    _topology: Arc<StaticTopology>,
) -> anyhow::Result<sonic_pmd::RegisterBackend<sonic_pmd::MemoryTransport, StaticTopology>> {
    bail!("the i2c backend is only available on Linux")
}

async fn drive<B, S>(
    mut daemon: Daemon<B, StaticTopology>,
    store: &mut S,
    config: &PmdConfig,
    once: bool,
    dump: Option<String>,
    json: bool,
) -> anyhow::Result<()>
where
    B: ModuleBackend,
    S: ConfigStore,
{
    info!("Backend: {}", daemon.backend().name());

    if once || dump.is_some() {
        let summary = daemon.run_pass(store).await.context("poll pass")?;
        info!(?summary, "Single pass complete");

        if let Some(filter) = dump {
            let filter = (!filter.is_empty()).then_some(filter.as_str());
            if json {
                println!("{}", debug::dump_json(daemon.registry(), filter)?);
            } else {
                print!("{}", debug::dump(daemon.registry(), filter));
            }
        }
        return Ok(());
    }

    info!(
        "Polling every {}ms, {} retries per operation",
        config.polling.interval_ms, config.polling.retry_count
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };
    daemon
        .run(store, config.polling.interval(), shutdown)
        .await
        .context("poll loop")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting pmd (Rust) ---");

    match run(args).await {
        Ok(()) => {
            info!("pmd exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("pmd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
