//! Camera frame capture

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use wildwatch_core::{Error, Result};

/// Placeholder replaced with the destination path in capture arguments
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// A source of still frames
#[async_trait]
pub trait Camera: Send + Sync {
    /// Capture one frame and write it to `dest`
    async fn capture(&self, dest: &Path) -> Result<()>;

    /// Whether a camera is attached at all
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

/// Stands in when no camera is configured
pub struct UnavailableCamera;

#[async_trait]
impl Camera for UnavailableCamera {
    async fn capture(&self, _dest: &Path) -> Result<()> {
        Err(Error::camera(
            "Camera not available. Please check camera connection.",
        ))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Captures by running an external program (fswebcam, libcamera-still,
/// ffmpeg and the like) that writes a JPEG to the path given in place of
/// `{output}`
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandCamera {
    /// `None` when `command` is empty
    pub fn from_command(command: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    fn args_for(&self, dest: &Path) -> Vec<String> {
        let dest = dest.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &dest))
            .collect()
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture(&self, dest: &Path) -> Result<()> {
        let args = self.args_for(dest);
        debug!("Running capture command {} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| Error::camera(format!("capture timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::camera(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::camera(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let written = tokio::fs::metadata(dest)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(Error::camera("capture produced no image"));
        }

        info!("Image captured and saved to {:?}", dest);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_command_is_none() {
        assert!(CommandCamera::from_command(&[], Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_output_placeholder_substituted() {
        let camera = CommandCamera::from_command(
            &command(&["ffmpeg", "-i", "/dev/video0", "-frames:v", "1", "{output}"]),
            Duration::from_secs(1),
        )
        .unwrap();

        let args = camera.args_for(Path::new("/tmp/camera_x.jpg"));

        assert_eq!(args.last().map(String::as_str), Some("/tmp/camera_x.jpg"));
        assert_eq!(camera.name(), "ffmpeg");
    }

    #[tokio::test]
    async fn test_unavailable_camera() {
        let camera = UnavailableCamera;
        assert!(!camera.is_available());
        assert!(matches!(
            camera.capture(Path::new("x.jpg")).await,
            Err(Error::Camera(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_camera_writes_frame() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("camera_frame.jpg");
        let camera = CommandCamera::from_command(
            &command(&["sh", "-c", "printf 'jpeg' > \"$0\"", "{output}"]),
            Duration::from_secs(5),
        )
        .unwrap();

        camera.capture(&dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_camera_failure() {
        let dir = TempDir::new().unwrap();
        let camera = CommandCamera::from_command(
            &command(&["sh", "-c", "echo 'no device' >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = camera.capture(&dir.path().join("x.jpg")).await.unwrap_err();

        assert!(err.to_string().contains("no device"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_camera_times_out() {
        let dir = TempDir::new().unwrap();
        let camera = CommandCamera::from_command(
            &command(&["sleep", "5"]),
            Duration::from_millis(50),
        )
        .unwrap();

        let err = camera.capture(&dir.path().join("x.jpg")).await.unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }
}
