//! Stream inspection through an external `ffprobe` process.

use async_trait::async_trait;
use serde::Deserialize;
use std::{path::Path, process::Stdio, time::Duration};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("file does not exist at path: {0}")]
    MissingInput(String),
    #[error("could not run probe: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("probe exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),
    #[error("unparseable probe output: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("probe output contains no stream with dimensions")]
    NoStreams,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Capability to read the pixel dimensions of a media file's first video stream.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn dimensions(&self, path: &Path) -> Result<Dimensions, ProbeError>;
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Pick the first stream that reports both width and height.
pub fn parse_probe_output(stdout: &[u8]) -> Result<Dimensions, ProbeError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;
    output
        .streams
        .into_iter()
        .find_map(|s| match (s.width, s.height) {
            (Some(width), Some(height)) => Some(Dimensions { width, height }),
            _ => None,
        })
        .ok_or(ProbeError::NoStreams)
}

/// Runs `ffprobe -print_format json -show_streams` on the file.
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    binary: String,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    #[tracing::instrument(skip(self), fields(probe = %self.binary))]
    async fn dimensions(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ProbeError::MissingInput(path.display().to_string()));
        }

        // kill_on_drop: an abandoned request must not leave ffprobe running.
        let child = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ProbeError::TimedOut(self.timeout))??;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let dims = parse_probe_output(&output.stdout)?;
        tracing::debug!(width = dims.width, height = dims.height, "probed video");
        Ok(dims)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_stream_dimensions() {
        let stdout = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "width": 1920, "height": 1080},
                {"index": 1, "codec_type": "video", "width": 640, "height": 480}
            ]
        }"#;
        assert_eq!(
            parse_probe_output(stdout).unwrap(),
            Dimensions {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn skips_streams_without_dimensions() {
        let stdout = br#"{"streams": [{"codec_type": "audio"}, {"width": 1080, "height": 1920}]}"#;
        assert_eq!(parse_probe_output(stdout).unwrap().height, 1920);
    }

    #[test]
    fn rejects_empty_or_garbage_output() {
        assert!(matches!(
            parse_probe_output(br#"{"streams": []}"#),
            Err(ProbeError::NoStreams)
        ));
        assert!(matches!(
            parse_probe_output(br#"{}"#),
            Err(ProbeError::NoStreams)
        ));
        assert!(matches!(
            parse_probe_output(b"Invalid data found when processing input"),
            Err(ProbeError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_fails_before_spawning() {
        let probe = FfprobeProbe::new("ffprobe", Duration::from_secs(5));
        let err = probe
            .dimensions(Path::new("/definitely/not/here.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::MissingInput(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let probe = FfprobeProbe::new("/nonexistent/ffprobe-binary", Duration::from_secs(5));
        let err = probe.dimensions(file.path()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Spawn(_)));
    }

    /// Install an executable stand-in for ffprobe.
    #[cfg(unix)]
    fn stub_probe(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("ffprobe-stub");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_dimensions_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let input = tempfile::NamedTempFile::new().unwrap();
        let binary = stub_probe(
            &dir,
            r#"echo '{"streams":[{"index":0,"codec_type":"video","width":1080,"height":1920}]}'"#,
        );

        let probe = FfprobeProbe::new(binary, Duration::from_secs(5));
        let dims = probe.dimensions(input.path()).await.unwrap();
        assert_eq!(
            dims,
            Dimensions {
                width: 1080,
                height: 1920
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_keeps_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let input = tempfile::NamedTempFile::new().unwrap();
        let binary = stub_probe(&dir, "echo boom >&2; exit 1");

        let probe = FfprobeProbe::new(binary, Duration::from_secs(5));
        match probe.dimensions(input.path()).await.unwrap_err() {
            ProbeError::Failed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_probe_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let input = tempfile::NamedTempFile::new().unwrap();
        let binary = stub_probe(&dir, "exec sleep 5");

        let probe = FfprobeProbe::new(binary, Duration::from_millis(100));
        let err = probe.dimensions(input.path()).await.unwrap_err();
        assert!(matches!(err, ProbeError::TimedOut(t) if t == Duration::from_millis(100)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_stdout_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let input = tempfile::NamedTempFile::new().unwrap();
        let binary = stub_probe(&dir, "exit 0");

        let probe = FfprobeProbe::new(binary, Duration::from_secs(5));
        let err = probe.dimensions(input.path()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Malformed(_)));
    }
}
