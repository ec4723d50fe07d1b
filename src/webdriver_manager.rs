use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::webdriver::BrowserType;

/// Polls of `/status` while a freshly spawned driver boots (100 ms apart)
const STARTUP_ATTEMPTS: u32 = 50;

/// Starts and stops WebDriver processes (geckodriver, chromedriver, safaridriver)
#[derive(Default)]
pub struct DriverManager {
    processes: Mutex<Vec<DriverProcess>>,
}

struct DriverProcess {
    browser_type: BrowserType,
    child: Child,
    port: u16,
    url: String,
}

impl DriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn processes(&self) -> MutexGuard<'_, Vec<DriverProcess>> {
        // A panic while holding the lock leaves the list usable
        self.processes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the URL of a working driver for `browser_type`, starting one if needed
    pub async fn ensure_driver(&self, browser_type: &BrowserType) -> Result<String> {
        let managed: Vec<String> = self
            .processes()
            .iter()
            .filter(|p| p.browser_type == *browser_type)
            .map(|p| p.url.clone())
            .collect();

        for url in managed {
            if Self::verify_driver_working(&url).await {
                debug!("Using managed WebDriver at {}", url);
                return Ok(url);
            }
        }

        let standard = format!("http://localhost:{}", browser_type.default_port());
        if Self::is_driver_running(&standard).await && Self::verify_driver_working(&standard).await {
            debug!("Found external WebDriver at {}", standard);
            return Ok(standard);
        }

        info!(
            "{} not detected, attempting to start it automatically",
            browser_type.driver_name()
        );
        self.start_driver(browser_type).await
    }

    async fn start_driver(&self, browser_type: &BrowserType) -> Result<String> {
        let command = browser_type.driver_name();
        if !Self::command_exists(command) {
            anyhow::bail!(
                "{command} not found in PATH. Please install it:\n\
                  Firefox: https://github.com/mozilla/geckodriver/releases\n\
                  Chrome: https://googlechromelabs.github.io/chrome-for-testing/\n\
                  Safari: run `safaridriver --enable` once (macOS only)"
            );
        }

        let port = Self::find_free_port(browser_type)?;
        let args = match browser_type {
            BrowserType::Firefox => vec!["--port".to_string(), port.to_string()],
            BrowserType::Chrome => vec![format!("--port={port}")],
            BrowserType::Safari => vec!["-p".to_string(), port.to_string()],
        };
        info!("Starting {} on port {}", command, port);

        let mut cmd = Command::new(command);
        cmd.args(&args).stdout(Stdio::null()).stderr(Stdio::null());

        // New process group so the browser children die with the driver
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {command}"))?;
        let url = format!("http://localhost:{port}");

        self.processes().push(DriverProcess {
            browser_type: *browser_type,
            child,
            port,
            url: url.clone(),
        });

        for _ in 0..STARTUP_ATTEMPTS {
            if Self::is_driver_running(&url).await {
                info!("{} started on port {}", command, port);
                return Ok(url);
            }
            sleep(Duration::from_millis(100)).await;
        }

        self.stop_port(port);
        anyhow::bail!("{command} failed to start within timeout")
    }

    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        let finder = if cfg!(windows) { "where" } else { "which" };
        Command::new(finder)
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Preferred port for the browser if free, otherwise one from the OS
    pub fn find_free_port(browser_type: &BrowserType) -> Result<u16> {
        let base = browser_type.default_port();
        for port in [base, base + 1, base + 2] {
            if !Self::is_port_in_use(port) {
                debug!("Found free port {} for {}", port, browser_type);
                return Ok(port);
            }
            debug!("Port {} is in use", port);
        }

        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        Ok(listener.local_addr()?.port())
    }

    pub fn is_port_in_use(port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
    }

    /// True when something answers `GET {url}/status` with a 2xx
    pub async fn is_driver_running(url: &str) -> bool {
        match reqwest::Client::new()
            .get(format!("{url}/status"))
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// True when the driver reports `value.ready == true`
    pub async fn verify_driver_working(url: &str) -> bool {
        let response = reqwest::Client::new()
            .get(format!("{url}/status"))
            .timeout(Duration::from_secs(1))
            .send()
            .await;
        let Ok(response) = response else {
            return false;
        };
        match response.json::<serde_json::Value>().await {
            Ok(body) => body["value"]["ready"].as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Number of driver processes this manager started and still tracks
    pub fn managed_count(&self) -> usize {
        self.processes().len()
    }

    fn stop_port(&self, port: u16) {
        let mut processes = self.processes();
        if let Some(index) = processes.iter().position(|p| p.port == port) {
            let mut process = processes.remove(index);
            Self::terminate(&mut process);
        }
    }

    /// Stop every driver this manager started
    pub fn stop_all(&self) {
        let mut processes = self.processes();
        for process in processes.iter_mut() {
            Self::terminate(process);
        }
        processes.clear();
    }

    fn terminate(process: &mut DriverProcess) {
        debug!(
            "Stopping {} on port {}",
            process.browser_type.driver_name(),
            process.port
        );

        #[cfg(unix)]
        Self::kill_process_group(process.child.id() as i32);

        if let Err(e) = process.child.kill() {
            debug!("Driver process already gone: {}", e);
        }
        let _ = process.child.wait();
    }

    /// SIGTERM the group, then SIGKILL whatever is left
    #[cfg(unix)]
    fn kill_process_group(pgid: i32) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let group = Pid::from_raw(pgid);
        if let Err(e) = killpg(group, Signal::SIGTERM) {
            debug!("SIGTERM to process group {} failed: {}", pgid, e);
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
        if let Err(e) = killpg(group, Signal::SIGKILL) {
            // ESRCH means everything already exited
            if e != nix::errno::Errno::ESRCH {
                warn!("SIGKILL to process group {} failed: {}", pgid, e);
            }
        }
    }
}

impl Drop for DriverManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

lazy_static::lazy_static! {
    /// Process-wide driver manager; `main` stops it before exiting
    pub static ref GLOBAL_DRIVER_MANAGER: DriverManager = DriverManager::new();
}

#[cfg(test)]
#[path = "webdriver_manager_test.rs"]
mod webdriver_manager_test;
