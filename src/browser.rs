//! Opening sites in the system browser

use std::path::PathBuf;
use std::process::{Command, Stdio};

use url::Url;

use crate::{Error, Result};

/// Opens a URL for the user
pub trait SiteOpener: Send + Sync {
    /// Open `url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is rejected or the browser can't be launched
    fn open(&self, url: &str) -> Result<()>;
}

/// Parse `url`, accepting only http and https
///
/// # Errors
///
/// Returns `Error::Browser` for unparseable URLs or other schemes
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| Error::Browser(format!("invalid url {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::Browser(format!("refusing to open {other} url"))),
    }
}

#[cfg(target_os = "macos")]
const LAUNCHERS: &[&str] = &["open"];

#[cfg(target_os = "windows")]
const LAUNCHERS: &[&str] = &["explorer"];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const LAUNCHERS: &[&str] = &["xdg-open", "gio", "sensible-browser"];

/// Platform browser launcher found on `PATH`
#[derive(Debug, Clone)]
pub struct SystemBrowser {
    launcher: PathBuf,
}

impl SystemBrowser {
    /// Locate a launcher for this platform
    ///
    /// # Errors
    ///
    /// Returns error if none of the known launchers is installed
    pub fn detect() -> Result<Self> {
        LAUNCHERS
            .iter()
            .find_map(|bin| which::which(bin).ok())
            .map(|launcher| {
                tracing::debug!(launcher = %launcher.display(), "found browser launcher");
                Self { launcher }
            })
            .ok_or_else(|| Error::Browser(format!("no browser launcher found ({LAUNCHERS:?})")))
    }
}

impl SiteOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let url = validate_url(url)?;

        let mut command = Command::new(&self.launcher);
        if self.launcher.file_stem().is_some_and(|stem| stem == "gio") {
            command.arg("open");
        }

        let mut child = command
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        tracing::info!(url = %url, "opened site");

        // Reap the launcher so it doesn't linger as a zombie
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(())
    }
}

/// Logs the URL instead of opening it
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunOpener;

impl SiteOpener for DryRunOpener {
    fn open(&self, url: &str) -> Result<()> {
        let url = validate_url(url)?;
        tracing::info!(url = %url, "would open site");
        Ok(())
    }
}
