use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    FfmpegPath,
    TempDir,
    CallbackUrl,
    AwsBucket,
    AwsRegion,
    AwsAccessKey,
    AwsSecretKey,
    S3Endpoint,
    QueueCapacity,
    CallbackTimeoutSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::TempDir => "TEMP_DIR",
            EnvKey::CallbackUrl => "CALLBACK_URL",
            EnvKey::AwsBucket => "AWS_BUCKET",
            EnvKey::AwsRegion => "AWS_DEFAULT_REGION",
            EnvKey::AwsAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::AwsSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::QueueCapacity => "QUEUE_CAPACITY",
            EnvKey::CallbackTimeoutSecs => "CALLBACK_TIMEOUT_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

/// Like [`get`], but treats an empty value the same as an unset one.
pub fn get_opt(key: EnvKey) -> Option<String> {
    get(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    get_opt(key).unwrap_or_else(|| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
