//! `harbor` CLI: load a config file, start the runtime, block until a
//! shutdown signal, then tear down cleanly. Grounded on `skynet_main.c`'s
//! one-positional-argument entry point, with argument parsing itself
//! lifted from the teacher pack's `clap`-derive style (cylo).

use std::path::PathBuf;

use clap::Parser;
use harbor_rt::config::RuntimeConfig;
use harbor_rt::{Runtime, StartupError};

/// Concurrent actor runtime.
#[derive(Parser, Debug)]
#[command(name = "harbor", version, about)]
struct Args {
    /// Path to a TOML config file (see RuntimeConfig for recognized keys).
    config: PathBuf,

    /// Run as a background daemon (overrides the config file's `daemon` key
    /// being absent; has no effect if `daemon` already names a pidfile).
    #[arg(long)]
    daemon: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut config = RuntimeConfig::load(&args.config).map_err(StartupError::Config)?;
    if let Some(pidfile) = args.daemon {
        config.daemon = Some(pidfile);
    }

    if config.daemon.is_some() {
        unsafe {
            harbor_rt::daemon::detach()?;
        }
        harbor_rt::daemon::redirect_fds()?;
    }

    let pidfile_path = config.daemon.clone();
    let pidfile_guard = match &pidfile_path {
        Some(pidfile) => Some(harbor_rt::daemon::acquire_pidfile(pidfile)?),
        None => None,
    };

    unsafe {
        harbor_rt::signal::install()?;
    }

    tracing::info!(config = %args.config.display(), threads = config.thread, "starting harbor");
    let runtime = Runtime::start(config, |_core| {})?;

    wait_for_shutdown_signal();

    tracing::info!("shutdown requested, draining services");
    runtime.shutdown();

    drop(pidfile_guard);
    if let Some(pidfile) = &pidfile_path {
        harbor_rt::daemon::release_pidfile(pidfile);
    }
    Ok(())
}

static SHUTDOWN_REQUESTED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

extern "C" fn on_shutdown_signal(_: i32) {
    SHUTDOWN_REQUESTED.store(true, std::sync::atomic::Ordering::SeqCst);
}

/// Block the main thread until SIGINT/SIGTERM. `nix`'s signal facilities are
/// already in use for SIGHUP/SIGPIPE in `signal::install`; this installs the
/// same style of handler for the two that mean "stop".
fn wait_for_shutdown_signal() {
    use nix::sys::signal::{self, SigHandler, Signal};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::Handler(on_shutdown_signal));
        let _ = signal::signal(Signal::SIGTERM, SigHandler::Handler(on_shutdown_signal));
    }

    while !SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }
}
