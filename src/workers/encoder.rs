use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::watermark::WatermarkFilter;
use crate::modules::conversion::playlist::MANIFEST_NAME;
use crate::modules::conversion::quality::QualityProfile;

pub const DEFAULT_GOP_SIZE: u32 = 60;
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";
pub const HLS_SEGMENT_SECONDS: u32 = 6;

/// Largest stderr tail kept in a failure message.
const STDERR_TAIL: usize = 4000;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to start encoder {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("encoder failed while running: {0}")]
    Wait(#[source] io::Error),
    #[error("encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("conversion cancelled")]
    Cancelled,
}

/// Runs the external encoder with a prepared argument list.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, args: &[String], cancel: &CancellationToken) -> Result<(), EncodeError>;
}

/// GOP override when positive, default otherwise.
pub fn gop_size(requested: Option<u32>) -> u32 {
    match requested {
        Some(g) if g > 0 => g,
        _ => DEFAULT_GOP_SIZE,
    }
}

/// Everything needed to encode one quality variant.
#[derive(Debug, Clone)]
pub struct EncodePlan<'a> {
    pub input: &'a Path,
    pub watermark: Option<(&'a Path, WatermarkFilter)>,
    pub profile: &'a QualityProfile,
    pub gop_size: u32,
    pub output_dir: &'a Path,
}

impl EncodePlan<'_> {
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_NAME)
    }

    pub fn segment_pattern(&self) -> PathBuf {
        self.output_dir.join(SEGMENT_PATTERN)
    }

    pub fn args(&self) -> Vec<String> {
        let p = self.profile;
        let gop = self.gop_size.to_string();
        let mut args: Vec<String> = vec!["-y".into(), "-i".into(), path_arg(self.input)];

        match &self.watermark {
            Some((wm_path, filter)) => {
                args.extend(["-i".into(), path_arg(wm_path)]);
                args.extend([
                    "-filter_complex".into(),
                    filter.graph(p.scale),
                    "-map".into(),
                    "[outv]".into(),
                    "-map".into(),
                    "0:a?".into(),
                ]);
            }
            None => args.extend(["-vf".into(), format!("scale={}", p.scale)]),
        }

        args.extend(
            [
                "-c:v", "libx264",
                "-preset", "medium",
                "-b:v", p.bitrate,
                "-maxrate", p.max_rate,
                "-bufsize", p.buf_size,
                "-profile:v", "high",
                "-level", "4.1",
                "-pix_fmt", "yuv420p",
                "-g", gop.as_str(),
                "-keyint_min", gop.as_str(),
                "-sc_threshold", "0",
                "-c:a", "aac",
                "-b:a", "128k",
                "-ac", "2",
                "-f", "hls",
            ]
            .map(String::from),
        );
        args.extend([
            "-hls_time".into(),
            HLS_SEGMENT_SECONDS.to_string(),
            "-hls_list_size".into(),
            "0".into(),
            "-hls_playlist_type".into(),
            "vod".into(),
            "-hls_flags".into(),
            "independent_segments".into(),
            "-hls_segment_filename".into(),
            path_arg(&self.segment_pattern()),
            path_arg(&self.playlist_path()),
        ]);
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, args: &[String], cancel: &CancellationToken) -> Result<(), EncodeError> {
        debug!("Running: {} {}", self.program.display(), args.join(" "));
        let start = Instant::now();

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncodeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(EncodeError::Cancelled),
            out = child.wait_with_output() => out.map_err(EncodeError::Wait)?,
        };

        if !output.status.success() {
            if cancel.is_cancelled() {
                return Err(EncodeError::Cancelled);
            }
            return Err(EncodeError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        info!("Encode finished in {:.1?}", start.elapsed());
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_string();
    }
    let mut cut = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    format!("...{}", &text[cut..])
}
