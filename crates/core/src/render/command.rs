use crate::config::Settings;
use crate::domain::DateRange;
use crate::render::{validate_symbol, ChartArtifact, ChartRenderer, RenderError};
use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Runs an external capture script as `<program> [args..] <symbol> <range code> <output.png>`.
///
/// The script owns the browser; this side only names the output file, bounds the
/// run time and cleans up whatever a failed run left behind.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let command = settings.require_render_command()?;
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .context("CHART_RENDER_COMMAND must name a program")?;
        Ok(Self::new(
            program,
            words.collect(),
            settings.snapshots_dir.clone(),
            settings.render_timeout,
        ))
    }

    fn output_path(&self, symbol: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let file_name = format!("{}_{stamp}_{}.png", symbol.replace(':', "-"), &nonce[..8]);
        self.output_dir.join(file_name)
    }
}

#[async_trait::async_trait]
impl ChartRenderer for CommandRenderer {
    async fn render(&self, symbol: &str, date_range: DateRange) -> Result<ChartArtifact, RenderError> {
        let symbol = validate_symbol(symbol)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        // Owns the output path from here on: dropped or removed, the file goes with it.
        let artifact = ChartArtifact::new(self.output_path(symbol));
        let path = artifact.path().to_path_buf();

        tracing::info!(%symbol, %date_range, path = %path.display(), "rendering chart");

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(symbol)
            .arg(date_range.range_code())
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                artifact.remove().await;
                return Err(RenderError::Io(err));
            }
            Err(_) => {
                tracing::warn!(%symbol, timeout = ?self.timeout, "renderer timed out; killed");
                artifact.remove().await;
                return Err(RenderError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            artifact.remove().await;
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.len() > 0 => Ok(artifact),
            _ => {
                artifact.remove().await;
                Err(RenderError::ArtifactMissing(path))
            }
        }
    }
}
