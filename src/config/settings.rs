use std::path::PathBuf;
use std::time::Duration;

use crate::config::env::{self, EnvKey};

pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
pub const DEFAULT_TEMP_DIR: &str = "/tmp/hls-conversions";
pub const DEFAULT_CALLBACK_URL: &str = "http://localhost:8000/api/hls/callback";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 30;

/// Process-wide settings, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub ffmpeg_path: PathBuf,
    pub temp_dir: PathBuf,
    pub callback_url: String,
    pub storage: StorageConfig,
    pub queue_capacity: usize,
    pub callback_timeout: Duration,
}

/// Object storage settings. A missing bucket or missing credentials are not
/// fatal at boot; they surface as a setup failure of each job.
#[derive(Clone, Debug, Default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server_port: env::get_parsed(EnvKey::ServerPort, DEFAULT_PORT),
            ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, DEFAULT_FFMPEG_PATH)),
            temp_dir: PathBuf::from(env::get_or(EnvKey::TempDir, DEFAULT_TEMP_DIR)),
            callback_url: env::get_or(EnvKey::CallbackUrl, DEFAULT_CALLBACK_URL),
            storage: StorageConfig {
                bucket: env::get_opt(EnvKey::AwsBucket),
                region: env::get_or(EnvKey::AwsRegion, DEFAULT_REGION),
                access_key: env::get_opt(EnvKey::AwsAccessKey),
                secret_key: env::get_opt(EnvKey::AwsSecretKey),
                endpoint: env::get_opt(EnvKey::S3Endpoint),
            },
            queue_capacity: env::get_parsed(EnvKey::QueueCapacity, DEFAULT_QUEUE_CAPACITY).max(1),
            callback_timeout: Duration::from_secs(env::get_parsed(
                EnvKey::CallbackTimeoutSecs,
                DEFAULT_CALLBACK_TIMEOUT_SECS,
            )),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG_PATH),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            callback_url: DEFAULT_CALLBACK_URL.to_string(),
            storage: StorageConfig {
                region: DEFAULT_REGION.to_string(),
                ..StorageConfig::default()
            },
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            callback_timeout: Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS),
        }
    }
}
