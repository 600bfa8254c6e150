//! Background daemon for periodic source updates.
//!
//! Runs an update cycle every interval until SIGINT/SIGTERM, without
//! requiring system scheduler configuration.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::app::{AppContext, Result, RiftError};

/// Interval suffixes, largest first, with their length in seconds.
const INTERVAL_UNITS: &[(char, u64)] = &[('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Update interval in seconds (default: 1800 = 30 minutes)
    pub update_interval_secs: u64,
    /// Whether to run an update immediately on start
    pub update_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 1800,
            update_on_start: true,
        }
    }
}

impl DaemonConfig {
    /// Parse `30m`, `6h`, `1d`, `90s` or a bare number of seconds.
    pub fn parse_interval(input: &str) -> std::result::Result<u64, String> {
        let input = input.trim().to_ascii_lowercase();
        let (amount, unit_secs) = match input.char_indices().last() {
            Some((at, suffix)) if suffix.is_ascii_alphabetic() => {
                let unit_secs = INTERVAL_UNITS
                    .iter()
                    .find(|(unit, _)| *unit == suffix)
                    .map(|(_, secs)| *secs)
                    .ok_or_else(|| format!("Unknown interval unit '{suffix}' (use s, m, h or d)"))?;
                (&input[..at], unit_secs)
            }
            _ => (input.as_str(), 1),
        };

        let amount: u64 = amount
            .parse()
            .map_err(|_| format!("Invalid interval '{input}': use a form like 30m, 6h or 1d"))?;
        match amount.checked_mul(unit_secs) {
            Some(0) => Err("Interval must be greater than zero".to_string()),
            Some(secs) => Ok(secs),
            None => Err(format!("Interval '{input}' is too large")),
        }
    }

    /// Shortest exact rendering of an interval, e.g. 7200 → `2h`.
    pub fn format_interval(secs: u64) -> String {
        INTERVAL_UNITS
            .iter()
            .find(|(_, unit_secs)| secs >= *unit_secs && secs.is_multiple_of(*unit_secs))
            .map(|(unit, unit_secs)| format!("{}{}", secs / unit_secs, unit))
            .unwrap_or_else(|| format!("{secs}s"))
    }
}

/// The file recording which process runs the daemon.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// `riftfeed/daemon.pid` under the runtime dir, or the cache dir when
    /// the platform has no runtime dir.
    pub fn locate() -> Option<Self> {
        let base = dirs::runtime_dir().or_else(dirs::cache_dir)?;
        Some(Self::at(base.join("riftfeed").join("daemon.pid")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded PID, if the file exists and holds one.
    pub fn read(&self) -> Option<u32> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    /// The recorded PID if that process is still alive.
    pub fn live_pid(&self) -> Option<u32> {
        self.read().filter(|&pid| signal_process(pid, ProcessSignal::Alive))
    }

    /// Record the current process.
    pub fn claim(&self) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, format!("{}\n", std::process::id()))
    }

    pub fn release(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove PID file"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ProcessSignal {
    /// Deliver nothing, only report whether the process exists.
    Alive,
    Terminate,
}

#[cfg(unix)]
fn signal_process(pid: u32, signal: ProcessSignal) -> bool {
    let flag = match signal {
        ProcessSignal::Alive => "-0",
        ProcessSignal::Terminate => "-TERM",
    };
    Command::new("kill")
        .arg(flag)
        .arg(pid.to_string())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

#[cfg(windows)]
fn signal_process(pid: u32, signal: ProcessSignal) -> bool {
    let pid = pid.to_string();
    match signal {
        ProcessSignal::Alive => Command::new("tasklist")
            .args(["/NH", "/FI", &format!("PID eq {pid}")])
            .stderr(Stdio::null())
            .output()
            .is_ok_and(|out| String::from_utf8_lossy(&out.stdout).contains(&pid)),
        ProcessSignal::Terminate => Command::new("taskkill")
            .args(["/PID", &pid, "/F"])
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success()),
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
    pid_file: Option<PidFile>,
    stop: Arc<Notify>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self {
            ctx,
            config,
            pid_file: PidFile::locate(),
            stop: Arc::new(Notify::new()),
        }
    }

    /// Record the daemon's PID somewhere other than the default location.
    pub fn with_pid_file(mut self, pid_file: PidFile) -> Self {
        self.pid_file = Some(pid_file);
        self
    }

    /// Run until a shutdown signal or [`stop`](Self::stop), then release the
    /// context's clients.
    pub async fn run(&self) -> Result<()> {
        if let Some(pid_file) = &self.pid_file {
            if let Some(pid) = pid_file.live_pid() {
                return Err(RiftError::Daemon(format!(
                    "Another daemon instance is already running (PID {pid})"
                )));
            }
            pid_file.claim()?;
        }

        info!(
            interval = %DaemonConfig::format_interval(self.config.update_interval_secs),
            pid = std::process::id(),
            "RiftFeed daemon started"
        );

        let stop = self.stop.clone();
        let signals = tokio::spawn(async move {
            shutdown_signal().await;
            stop.notify_one();
        });

        self.run_loop().await;

        signals.abort();
        info!("Daemon shutting down");
        if let Some(pid_file) = &self.pid_file {
            pid_file.release();
        }
        self.ctx.shutdown().await;
        Ok(())
    }

    async fn run_loop(&self) {
        if self.config.update_on_start {
            info!("Running initial update");
            self.run_update().await;
        }

        let mut timer = interval(Duration::from_secs(self.config.update_interval_secs));
        timer.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                _ = self.stop.notified() => break,
                _ = timer.tick() => {
                    info!("Running scheduled update");
                    self.run_update().await;
                }
            }
        }
    }

    async fn run_update(&self) {
        let stats = self.ctx.update_service.update_all_sources().await;
        for err in &stats.errors {
            warn!("{}", err);
        }
        info!(
            new = stats.total_new,
            duplicates = stats.total_duplicates,
            errors = stats.errors.len(),
            elapsed_secs = stats.elapsed_seconds,
            "Update cycle complete"
        );
    }

    /// Ask a running loop to exit after its current cycle.
    pub fn stop(&self) {
        self.stop.notify_one();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = tokio::signal::ctrl_c() => {},
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Send SIGTERM to the daemon named in the PID file. Returns its PID.
pub fn stop_daemon() -> Result<u32> {
    let pid_file = PidFile::locate()
        .ok_or_else(|| RiftError::Daemon("Could not determine PID file path".to_string()))?;
    let pid = pid_file
        .read()
        .ok_or_else(|| RiftError::Daemon("No daemon is running".to_string()))?;

    if !signal_process(pid, ProcessSignal::Terminate) {
        return Err(RiftError::Daemon(format!("Failed to stop daemon (PID {pid})")));
    }
    pid_file.release();
    Ok(pid)
}

pub fn daemon_status() -> String {
    let Some(pid_file) = PidFile::locate() else {
        return "Daemon is not running".to_string();
    };
    match (pid_file.read(), pid_file.live_pid()) {
        (_, Some(pid)) => format!("Daemon is running (PID: {pid})"),
        (Some(_), None) => "Daemon is not running (stale PID file)".to_string(),
        (None, None) => "Daemon is not running".to_string(),
    }
}
