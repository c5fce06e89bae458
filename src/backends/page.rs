// src/backends/page.rs

use async_trait::async_trait;
use reqwest::Client;
use std::{io::ErrorKind, time::Duration};
use tempfile::TempDir;
use tokio::{process::Command, time::timeout};
use tracing::{debug, info};
use url::Url;

use super::{PageRenderer, PageSession};
use crate::errors::LookupFailure;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
/// Virtual time Chromium gives scripts to run before dumping the DOM.
const RENDER_BUDGET_MS: u64 = 8000;

/// Plain HTTP fetch. Only sees server-rendered markup.
pub struct HttpRenderer {
    navigation_timeout: Duration,
}

impl HttpRenderer {
    pub fn new(navigation_timeout: Duration) -> Self {
        Self { navigation_timeout }
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, LookupFailure> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(self.navigation_timeout)
            .build()
            .map_err(|e| LookupFailure::Backend(format!("building page client: {}", e)))?;
        info!("opened http page session");
        Ok(Box::new(HttpSession { client }))
    }
}

struct HttpSession {
    client: Client,
}

#[async_trait]
impl PageSession for HttpSession {
    async fn render(&mut self, url: &Url) -> Result<String, LookupFailure> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(page_failure)?
            .error_for_status()
            .map_err(page_failure)?;
        resp.text().await.map_err(page_failure)
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        info!("released http page session");
    }
}

fn page_failure(e: reqwest::Error) -> LookupFailure {
    if e.is_timeout() {
        LookupFailure::Timeout(format!("page load: {}", e))
    } else {
        LookupFailure::Backend(format!("page load: {}", e))
    }
}

/// Headless Chromium. Each session owns a throwaway browser profile that is
/// deleted when the session is dropped.
pub struct ChromeRenderer {
    program: String,
    navigation_timeout: Duration,
}

impl ChromeRenderer {
    pub fn new(program: impl Into<String>, navigation_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            navigation_timeout,
        }
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, LookupFailure> {
        let profile = tempfile::Builder::new()
            .prefix("playscraper-profile-")
            .tempdir()
            .map_err(|e| LookupFailure::Backend(format!("creating browser profile: {}", e)))?;
        info!(profile = %profile.path().display(), "opened chromium session");
        Ok(Box::new(ChromeSession {
            program: self.program.clone(),
            navigation_timeout: self.navigation_timeout,
            profile,
        }))
    }
}

struct ChromeSession {
    program: String,
    navigation_timeout: Duration,
    profile: TempDir,
}

impl ChromeSession {
    fn command(&self, url: &Url) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-sandbox")
            .arg(format!("--user-data-dir={}", self.profile.path().display()))
            .arg(format!("--user-agent={}", USER_AGENT))
            .arg(format!("--virtual-time-budget={}", RENDER_BUDGET_MS))
            .arg("--dump-dom")
            .arg(url.as_str())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn render(&mut self, url: &Url) -> Result<String, LookupFailure> {
        debug!(%url, "rendering page");
        let output = match timeout(self.navigation_timeout, self.command(url).output()).await {
            Err(_) => {
                return Err(LookupFailure::Timeout(format!(
                    "page did not load within {}s",
                    self.navigation_timeout.as_secs()
                )))
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(LookupFailure::Backend(format!(
                    "{} is not installed or not on PATH",
                    self.program
                )))
            }
            Ok(Err(e)) => {
                return Err(LookupFailure::Backend(format!("starting {}: {}", self.program, e)))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(LookupFailure::Backend(format!(
                "{} exited with {:?}: {}",
                self.program,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        info!(profile = %self.profile.path().display(), "released chromium session");
    }
}
