// src/backends/ytdlp.rs

use async_trait::async_trait;
use std::{io::ErrorKind, time::Duration};
use tokio::{process::Command, time::timeout};
use tracing::{debug, trace};
use url::Url;

use super::{VideoBackend, VideoEntry};
use crate::errors::LookupFailure;

/// Video search and metadata through a `yt-dlp` subprocess.
pub struct YtDlpBackend {
    program: String,
    timeout: Duration,
}

impl YtDlpBackend {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Run yt-dlp with `--dump-json` and return its stdout.
    async fn run(&self, target: &str) -> Result<String, LookupFailure> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--dump-json", "--skip-download", "--no-warnings", "--quiet"])
            .arg(target)
            .kill_on_drop(true);

        debug!(program = %self.program, target, "running video backend");
        let output = match timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(LookupFailure::Timeout(format!(
                    "{} did not finish within {}s",
                    self.program,
                    self.timeout.as_secs()
                )))
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(LookupFailure::Backend(format!(
                    "{} is not installed or not on PATH",
                    self.program
                )))
            }
            Ok(Err(e)) => {
                return Err(LookupFailure::Backend(format!(
                    "could not start {}: {}",
                    self.program, e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(LookupFailure::Backend(if stderr.is_empty() {
                format!("{} exited with {:?}", self.program, output.status.code())
            } else {
                stderr
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VideoBackend for YtDlpBackend {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VideoEntry>, LookupFailure> {
        let stdout = self.run(&search_target(query, limit)).await?;
        parse_entries(&stdout)
    }

    async fn metadata(&self, url: &Url) -> Result<VideoEntry, LookupFailure> {
        let stdout = self.run(url.as_str()).await?;
        parse_entries(&stdout)?
            .into_iter()
            .next()
            .ok_or_else(|| LookupFailure::Backend(format!("no metadata returned for {}", url)))
    }
}

fn search_target(query: &str, limit: usize) -> String {
    format!("ytsearch{}:{}", limit.max(1), query)
}

/// `--dump-json` prints one JSON document per line.
pub fn parse_entries(stdout: &str) -> Result<Vec<VideoEntry>, LookupFailure> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            trace!(len = line.len(), "parsing video entry");
            serde_json::from_str::<VideoEntry>(line)
                .map_err(|e| LookupFailure::Parse(format!("video metadata: {}", e)))
        })
        .collect()
}
