// # whitelistd - Whitelist Sync Daemon
//
// This daemon is a thin integration layer. All reconciliation logic lives in
// whitelist-core; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Wires file stores, the user directory and the HTTP fetcher
// 4. Starts the manager and serves an operator console on stdin
//
// The daemon runs until SIGTERM or SIGINT, whether or not stdin is open.
// SIGHUP (or the `whitelist reload` command) re-reads the plugin config.
//
// ## Configuration
//
// - `WHITELIST_CONFIG_PATH`: Plugin config JSON (default `whitelist-config.json`)
// - `WHITELIST_STORE_PATH`: Host whitelist JSON (default `whitelist.json`)
// - `WHITELIST_USERS_PATH`: Optional user directory JSON for `whitelist add`
// - `WHITELIST_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
//
// ## Example
//
// ```bash
// export WHITELIST_CONFIG_PATH=/etc/whitelist/config.json
// export WHITELIST_STORE_PATH=/var/lib/whitelist/whitelist.json
//
// whitelistd
// > whitelist add 76561198000000000
// > refresh-whitelist
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use whitelist_core::traits::{Plugin, UserDirectory};
use whitelist_core::{
    AuthLevel, CommandHandler, FileConfigStore, FileWhitelistStore, Invoker, StaticUserDirectory,
    WhitelistEvent, WhitelistManager,
};
use whitelist_source_http::HttpListFetcher;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum WhitelistExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<WhitelistExitCode> for ExitCode {
    fn from(code: WhitelistExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
struct Config {
    config_path: PathBuf,
    store_path: PathBuf,
    users_path: Option<PathBuf>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self {
            config_path: env::var("WHITELIST_CONFIG_PATH")
                .unwrap_or_else(|_| "whitelist-config.json".to_string())
                .into(),
            store_path: env::var("WHITELIST_STORE_PATH")
                .unwrap_or_else(|_| "whitelist.json".to_string())
                .into(),
            users_path: env::var("WHITELIST_USERS_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            log_level: env::var("WHITELIST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("WHITELIST_CONFIG_PATH", &self.config_path),
            ("WHITELIST_STORE_PATH", &self.store_path),
        ] {
            if path.as_os_str().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            check_parent(name, path)?;
        }

        if let Some(ref users) = self.users_path
            && !users.exists()
        {
            anyhow::bail!(
                "WHITELIST_USERS_PATH does not exist: {}",
                users.display()
            );
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "WHITELIST_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn check_parent(name: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        anyhow::bail!(
            "{} parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
            name,
            parent.display(),
            parent.display()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let config = Config::from_env();

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return WhitelistExitCode::ConfigError.into();
    }

    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WhitelistExitCode::ConfigError.into();
    }

    info!("Starting whitelistd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WhitelistExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let manager = match build_manager(&config).await {
            Ok(manager) => manager,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return WhitelistExitCode::ConfigError;
            }
        };

        match run_daemon(manager).await {
            Ok(()) => WhitelistExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                WhitelistExitCode::RuntimeError
            }
        }
    });

    // Stdin reads run on a blocking thread that never returns on its own
    rt.shutdown_timeout(SHUTDOWN_TIMEOUT);

    result.into()
}

/// Wire the collaborators and load the plugin configuration
async fn build_manager(
    config: &Config,
) -> Result<(Arc<WhitelistManager>, mpsc::Receiver<WhitelistEvent>)> {
    let whitelist = FileWhitelistStore::new(&config.store_path)
        .await
        .context("Failed to open whitelist store")?;
    let config_store = FileConfigStore::new(&config.config_path);

    let directory: Arc<dyn UserDirectory> = match config.users_path {
        Some(ref path) => Arc::new(
            StaticUserDirectory::from_file(path)
                .await
                .context("Failed to load user directory")?,
        ),
        None => {
            debug!("No WHITELIST_USERS_PATH set; `whitelist add` stores input as typed");
            Arc::new(StaticUserDirectory::new())
        }
    };

    let fetcher = HttpListFetcher::new()?;

    let (manager, events) = WhitelistManager::load(
        Arc::new(fetcher),
        Arc::new(whitelist),
        Arc::new(config_store),
        directory,
    )
    .await
    .context("Failed to load whitelist config")?;

    let sources = manager.config().await.whitelist_urls.len();
    info!(
        "Configuration loaded from {}: {} source(s)",
        config.config_path.display(),
        sources
    );

    Ok((Arc::new(manager), events))
}

/// Run until a shutdown signal
async fn run_daemon(
    (manager, events): (Arc<WhitelistManager>, mpsc::Receiver<WhitelistEvent>),
) -> Result<()> {
    let event_task = tokio::spawn(log_events(ReceiverStream::new(events)));

    manager.start().await?;
    info!("{}", manager.status());

    let handler = CommandHandler::new(Arc::clone(&manager));
    let console = tokio::spawn(run_console(handler, BufReader::new(tokio::io::stdin())));
    let reloads = reload_requests()?;

    let reason = serve_until_shutdown(&manager, wait_for_shutdown(), reloads).await?;
    info!("Shutting down: {}", reason);

    manager.stop().await?;

    // The console holds a manager handle; the event channel closes once both are gone
    console.abort();
    drop(manager);
    if tokio::time::timeout(EVENT_DRAIN_TIMEOUT, event_task)
        .await
        .is_err()
    {
        debug!("Event logger still running at exit");
    }

    Ok(())
}

/// Apply reload requests until `shutdown` resolves
///
/// The console is not part of this wait: a closed stdin leaves the daemon
/// running.
async fn serve_until_shutdown<S>(
    manager: &WhitelistManager,
    shutdown: S,
    mut reloads: mpsc::Receiver<()>,
) -> Result<&'static str>
where
    S: Future<Output = Result<&'static str>>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => return signal,
            Some(()) = reloads.recv() => {
                info!("Reloading whitelist config");
                if let Err(e) = manager.reload().await {
                    error!("Config reload failed, keeping current config: {}", e);
                }
            }
        }
    }
}

/// Read operator commands, one per line
async fn run_console<R>(handler: CommandHandler, input: R)
where
    R: AsyncBufRead + Unpin,
{
    let operator = Invoker::new("console", AuthLevel::Admin);
    let mut lines = input.lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match handler.handle_line(&operator, &line).await {
                Ok(reply) => {
                    for reply_line in reply {
                        println!("{}", reply_line);
                    }
                }
                Err(e) => println!("{}", e),
            },
            Ok(None) => {
                info!("Console input closed, running until a shutdown signal");
                break;
            }
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                break;
            }
        }
    }
}

/// Log manager events
async fn log_events(mut events: ReceiverStream<WhitelistEvent>) {
    while let Some(event) = events.next().await {
        match event {
            WhitelistEvent::SourceFailed { url, error } => {
                warn!("Source {} failed: {}", url, error)
            }
            WhitelistEvent::WhitelistPersistFailed { error } => {
                error!("Whitelist not saved: {}", error)
            }
            WhitelistEvent::ConfigPersistFailed { error } => {
                error!("Whitelist config not saved: {}", error)
            }
            WhitelistEvent::ManualEntriesAdded { ids, by } => {
                info!("{} added {:?} to the manual whitelist", by, ids)
            }
            other => debug!("Event: {:?}", other),
        }
    }
}

/// Forward SIGHUP as reload requests
#[cfg(unix)]
fn reload_requests() -> Result<mpsc::Receiver<()>> {
    let mut sighup = signal(SignalKind::hangup())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGHUP handler: {}", e))?;
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        while sighup.recv().await.is_some() {
            match tx.try_send(()) {
                // A queued reload will read the latest file anyway
                Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                Err(mpsc::error::TrySendError::Closed(())) => break,
            }
        }
    });

    Ok(rx)
}

/// No reload signal on this platform; use the `whitelist reload` command
#[cfg(not(unix))]
fn reload_requests() -> Result<mpsc::Receiver<()>> {
    let (_tx, rx) = mpsc::channel(1);
    Ok(rx)
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use whitelist_core::traits::{ConfigStore, ListFetcher};
    use whitelist_core::{MemoryConfigStore, MemoryWhitelistStore, WhitelistConfig};

    const URL: &str = "https://lists.example/subs.txt";

    #[derive(Clone, Default)]
    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ListFetcher for CountingFetcher {
        async fn fetch(
            &self,
            _source: &str,
            _timeout: Duration,
        ) -> whitelist_core::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["111".to_string()])
        }
    }

    fn test_manager(
        config: WhitelistConfig,
    ) -> (Arc<WhitelistManager>, CountingFetcher, MemoryConfigStore) {
        let fetcher = CountingFetcher::default();
        let config_store = MemoryConfigStore::with_config(config.clone());
        let (manager, _events) = WhitelistManager::new(
            Arc::new(fetcher.clone()),
            Arc::new(MemoryWhitelistStore::new()),
            Arc::new(config_store.clone()),
            Arc::new(StaticUserDirectory::new()),
            config,
        )
        .unwrap();
        (Arc::new(manager), fetcher, config_store)
    }

    /// Shutdown future driven by the test
    fn test_shutdown(rx: oneshot::Receiver<()>) -> impl Future<Output = Result<&'static str>> {
        async move {
            rx.await?;
            Ok("test")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_console_does_not_stop_daemon() {
        let config = WhitelistConfig::new()
            .with_url(URL)
            .with_refresh_interval_secs(300);
        let (manager, fetcher, _) = test_manager(config);
        manager.start().await.unwrap();

        // Console at EOF right away, like stdin from /dev/null
        let handler = CommandHandler::new(Arc::clone(&manager));
        tokio::spawn(run_console(handler, BufReader::new(&b""[..])))
            .await
            .unwrap();

        let (stop_tx, stop_rx) = oneshot::channel();
        let (_reload_tx, reload_rx) = mpsc::channel(1);
        let serving = Arc::clone(&manager);
        let serve = tokio::spawn(async move {
            serve_until_shutdown(&serving, test_shutdown(stop_rx), reload_rx).await
        });

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(!serve.is_finished());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        stop_tx.send(()).unwrap();
        assert_eq!(serve.await.unwrap().unwrap(), "test");
        manager.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_request_applies_stored_config() {
        let (manager, fetcher, config_store) = test_manager(WhitelistConfig::new());

        let (stop_tx, stop_rx) = oneshot::channel();
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let serving = Arc::clone(&manager);
        let serve = tokio::spawn(async move {
            serve_until_shutdown(&serving, test_shutdown(stop_rx), reload_rx).await
        });

        config_store
            .save(&WhitelistConfig::new().with_url(URL))
            .await
            .unwrap();
        reload_tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(manager.config().await.whitelist_urls, vec![URL.to_string()]);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        stop_tx.send(()).unwrap();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_console_runs_commands_as_admin() {
        let (manager, _, _) = test_manager(WhitelistConfig::new());
        let handler = CommandHandler::new(Arc::clone(&manager));

        run_console(handler, BufReader::new(&b"whitelist add slgX\n\nbogus\n"[..])).await;

        assert_eq!(
            manager.config().await.manual_whitelist,
            vec!["slgX".to_string()]
        );
    }
}
