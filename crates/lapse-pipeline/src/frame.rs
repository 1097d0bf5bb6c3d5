//! Frame sources: where a capture's pixels come from.

use std::{path::Path, process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::CaptureError;

/// Produces one frame and writes it to `path` as a PNG.
#[async_trait]
pub trait FrameSource: Send + Sync {
    fn name(&self) -> &str;

    async fn capture_to(&self, path: &Path) -> Result<(), CaptureError>;
}

/// Captures by running an external screenshot command through `sh -c`.
///
/// `{path}` in the command template is replaced with the shell-quoted
/// destination. The child is killed if it outlives `timeout`.
pub struct CommandFrameSource {
    template: String,
    timeout: Duration,
}

impl CommandFrameSource {
    pub fn new(template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            template: template.into(),
            timeout,
        }
    }

    fn render(&self, path: &Path) -> String {
        self.template
            .replace("{path}", &shell_quote(&path.to_string_lossy()))
    }
}

#[async_trait]
impl FrameSource for CommandFrameSource {
    fn name(&self) -> &str {
        "command"
    }

    async fn capture_to(&self, path: &Path) -> Result<(), CaptureError> {
        let command = self.render(path);
        debug!(%command, "running capture command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CaptureError::Timeout {
                ms: self.timeout.as_millis() as u64,
            })??;

        if !output.status.success() {
            return Err(CaptureError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(CaptureError::NoOutput {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Single-quote `s` for `sh`, escaping embedded quotes.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Grabs the primary monitor in-process.
#[cfg(feature = "screen")]
pub struct ScreenFrameSource;

#[cfg(feature = "screen")]
#[async_trait]
impl FrameSource for ScreenFrameSource {
    fn name(&self) -> &str {
        "screen"
    }

    async fn capture_to(&self, path: &Path) -> Result<(), CaptureError> {
        // Platform capture APIs block; keep them off the runtime workers.
        let png = tokio::task::spawn_blocking(grab_primary_png)
            .await
            .map_err(|e| CaptureError::Screen(e.to_string()))??;
        tokio::fs::write(path, png).await?;
        Ok(())
    }
}

#[cfg(feature = "screen")]
fn grab_primary_png() -> Result<Vec<u8>, CaptureError> {
    use screenshots::image::ImageOutputFormat;
    use screenshots::Screen;
    use std::io::Cursor;

    let screens = Screen::all().map_err(|e| CaptureError::Screen(e.to_string()))?;
    let screen = screens
        .iter()
        .find(|s| s.display_info.is_primary)
        .or_else(|| screens.first())
        .ok_or(CaptureError::NoMonitor)?;

    let image = screen
        .capture()
        .map_err(|e| CaptureError::Screen(e.to_string()))?;

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| CaptureError::Screen(e.to_string()))?;
    Ok(buffer.into_inner())
}
