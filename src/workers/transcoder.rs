use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{error, info, warn};

use super::encoder::{self, EncodeError, EncodePlan, Encoder};
use super::queue::JobProcessor;
use super::watermark::WatermarkFilter;
use crate::infrastructure::callback::Notifier;
use crate::infrastructure::storage::{self, ObjectStorage, StorageConnector, StorageError};
use crate::modules::conversion::model::{CallbackPayload, ConversionJob};
use crate::modules::conversion::playlist::{self, MANIFEST_NAME};
use crate::modules::conversion::quality;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("unknown quality: {0}")]
    UnknownQuality(String),
    #[error("failed to prepare {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Encode(EncodeError),
    #[error("failed to upload to storage: {0}")]
    Storage(#[source] StorageError),
    #[error("conversion cancelled")]
    Cancelled,
}

impl From<EncodeError> for ConversionError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::Cancelled => ConversionError::Cancelled,
            other => ConversionError::Encode(other),
        }
    }
}

impl From<StorageError> for ConversionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Cancelled => ConversionError::Cancelled,
            other => ConversionError::Storage(other),
        }
    }
}

/// What happened to a job, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct JobReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub cancelled: bool,
}

pub fn quality_prefix(media_id: i64, quality: &str) -> String {
    format!("hls/{}/{}", media_id, quality)
}

pub fn quality_manifest_key(media_id: i64, quality: &str) -> String {
    format!("{}/{}", quality_prefix(media_id, quality), MANIFEST_NAME)
}

pub fn master_manifest_key(media_id: i64) -> String {
    format!("hls/{}/{}", media_id, MANIFEST_NAME)
}

/// Turns one job into uploaded HLS variants, one quality at a time.
pub struct Pipeline {
    storage: Arc<dyn StorageConnector>,
    encoder: Arc<dyn Encoder>,
    notifier: Arc<dyn Notifier>,
    temp_root: PathBuf,
    default_callback_url: String,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn StorageConnector>,
        encoder: Arc<dyn Encoder>,
        notifier: Arc<dyn Notifier>,
        temp_root: impl Into<PathBuf>,
        default_callback_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            encoder,
            notifier,
            temp_root: temp_root.into(),
            default_callback_url: default_callback_url.into(),
        }
    }

    pub async fn process_job(&self, job: &ConversionJob) -> JobReport {
        let req = &job.request;
        let mut report = JobReport::default();

        if job.is_cancelled() {
            info!(job_id = %job.id, "Job cancelled before it started, skipping");
            report.cancelled = true;
            return report;
        }

        // Removed when dropped, on every return path below.
        let workspace = match self.create_workspace(&job.id).await {
            Ok(ws) => ws,
            Err(e) => {
                error!(job_id = %job.id, "Could not create temp directory: {}", e);
                self.fail_all(job, &mut report, &format!("failed to create temp directory: {e}"))
                    .await;
                return report;
            }
        };
        let workdir = workspace.path();

        let storage = match self.storage.connect().await {
            Ok(s) => s,
            Err(e) => {
                error!(job_id = %job.id, "Could not create storage client: {}", e);
                self.fail_all(job, &mut report, &format!("failed to create storage client: {e}"))
                    .await;
                return report;
            }
        };

        let original = workdir.join(format!("original{}", extension_of(&req.s3_path)));
        info!(job_id = %job.id, "⬇️ Downloading source from {}", req.s3_path);
        if let Err(e) = storage
            .download(&req.s3_path, &original, job.cancellation())
            .await
        {
            if matches!(e, StorageError::Cancelled) || job.is_cancelled() {
                info!(job_id = %job.id, "Job cancelled during source download");
                report.cancelled = true;
                return report;
            }
            error!(job_id = %job.id, "Source download failed: {}", e);
            self.fail_all(job, &mut report, &format!("failed to download source file: {e}"))
                .await;
            return report;
        }

        let watermark = self.fetch_watermark(job, storage.as_ref(), workdir).await;

        for q in req.distinct_qualities() {
            if job.is_cancelled() {
                info!(job_id = %job.id, quality = %q, "Job cancelled, skipping remaining qualities");
                report.cancelled = true;
                break;
            }

            info!(job_id = %job.id, quality = %q, "🎥 Starting conversion");
            let result = self
                .convert_quality(job, storage.as_ref(), &original, watermark.as_deref(), workdir, q)
                .await;

            match result {
                Ok(manifest_key) => {
                    let completed = job.mark_completed(q);
                    if let Err(e) = self
                        .publish_master_playlist(job, storage.as_ref(), workdir, &completed)
                        .await
                    {
                        error!(job_id = %job.id, "Could not update master playlist: {}", e);
                    }

                    info!(job_id = %job.id, quality = %q, "✅ Conversion finished: {}", manifest_key);
                    self.notify(job, CallbackPayload::completed(req.media_file_id, q, manifest_key))
                        .await;
                    report.completed.push(q.to_string());
                }
                Err(e) => {
                    error!(job_id = %job.id, quality = %q, "❌ Conversion failed: {}", e);
                    self.notify(job, CallbackPayload::failed(req.media_file_id, q, e.to_string()))
                        .await;
                    report.failed.push(q.to_string());
                }
            }

            remove_quality_dir(workdir, q).await;
        }

        info!(
            job_id = %job.id,
            completed = report.completed.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "All qualities processed"
        );
        report
    }

    /// Encodes and uploads one variant. Returns the key of its manifest.
    pub async fn convert_quality(
        &self,
        job: &ConversionJob,
        storage: &dyn ObjectStorage,
        original: &Path,
        watermark: Option<&Path>,
        workdir: &Path,
        q: &str,
    ) -> Result<String, ConversionError> {
        let req = &job.request;
        let profile =
            quality::lookup(q).ok_or_else(|| ConversionError::UnknownQuality(q.to_string()))?;

        let output_dir = workdir.join(q);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| ConversionError::Workspace {
                path: output_dir.clone(),
                source,
            })?;

        let watermark = match (watermark, req.watermark.as_ref()) {
            (Some(path), Some(cfg)) if cfg.enabled => Some((path, WatermarkFilter::from_config(cfg))),
            _ => None,
        };

        let plan = EncodePlan {
            input: original,
            watermark,
            profile,
            gop_size: encoder::gop_size(req.gop_size),
            output_dir: &output_dir,
        };

        self.encoder.encode(&plan.args(), job.cancellation()).await?;

        let prefix = quality_prefix(req.media_file_id, q);
        storage::upload_directory(storage, &output_dir, &prefix, job.cancellation()).await?;

        Ok(quality_manifest_key(req.media_file_id, q))
    }

    async fn fetch_watermark(
        &self,
        job: &ConversionJob,
        storage: &dyn ObjectStorage,
        workdir: &Path,
    ) -> Option<PathBuf> {
        let wm = job.request.watermark.as_ref()?;
        if !wm.enabled || wm.s3_path.is_empty() {
            return None;
        }

        let path = workdir.join(format!("watermark{}", extension_of(&wm.s3_path)));
        info!(job_id = %job.id, "Downloading watermark from {}", wm.s3_path);
        match storage.download(&wm.s3_path, &path, job.cancellation()).await {
            Ok(_) => Some(path),
            Err(e) => {
                warn!(job_id = %job.id, "Watermark download failed, continuing without it: {}", e);
                None
            }
        }
    }

    async fn publish_master_playlist(
        &self,
        job: &ConversionJob,
        storage: &dyn ObjectStorage,
        workdir: &Path,
        completed: &[String],
    ) -> Result<(), ConversionError> {
        let body = playlist::build_master_playlist(completed);
        let path = workdir.join(MANIFEST_NAME);
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| ConversionError::Workspace {
                path: path.clone(),
                source,
            })?;

        let key = master_manifest_key(job.request.media_file_id);
        storage.upload(&path, &key, job.cancellation()).await?;
        Ok(())
    }

    async fn create_workspace(&self, job_id: &str) -> io::Result<TempDir> {
        tokio::fs::create_dir_all(&self.temp_root).await?;
        let root = self.temp_root.clone();
        let prefix = format!("{job_id}-");
        tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(root)
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn fail_all(&self, job: &ConversionJob, report: &mut JobReport, message: &str) {
        for q in job.request.distinct_qualities() {
            self.notify(job, CallbackPayload::failed(job.request.media_file_id, q, message))
                .await;
            report.failed.push(q.to_string());
        }
    }

    async fn notify(&self, job: &ConversionJob, payload: CallbackPayload) {
        let url = match job.request.callback_url.trim() {
            "" => self.default_callback_url.as_str(),
            url => url,
        };
        self.notifier.notify(url, &payload).await;
    }
}

#[async_trait]
impl JobProcessor for Pipeline {
    async fn process(&self, job: &ConversionJob) {
        self.process_job(job).await;
    }
}

fn extension_of(key: &str) -> String {
    Path::new(key)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

async fn remove_quality_dir(workdir: &Path, q: &str) {
    // Labels come from the request; only catalog labels ever got a directory.
    if quality::lookup(q).is_none() {
        return;
    }
    let dir = workdir.join(q);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => info!("Cleaned temp files for {}", q),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", dir.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::infrastructure::callback::recording::RecordingNotifier;
    use crate::infrastructure::storage::memory::{MemoryStorage, SharedConnector};
    use crate::modules::conversion::dto::ConvertRequest;
    use crate::modules::conversion::model::CallbackStatus;

    const SOURCE_KEY: &str = "uploads/source.mp4";

    /// Writes a playlist and one segment instead of running ffmpeg.
    #[derive(Default)]
    struct FakeEncoder {
        calls: Mutex<Vec<Vec<String>>>,
        fail: Vec<String>,
    }

    impl FakeEncoder {
        fn failing(qualities: &[&str]) -> Self {
            Self {
                fail: qualities.iter().map(|q| q.to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Encoder for FakeEncoder {
        async fn encode(
            &self,
            args: &[String],
            _cancel: &CancellationToken,
        ) -> Result<(), EncodeError> {
            self.calls.lock().unwrap().push(args.to_vec());
            let playlist = PathBuf::from(args.last().unwrap());
            let dir = playlist.parent().unwrap();
            let q = dir.file_name().unwrap().to_string_lossy().into_owned();
            if self.fail.contains(&q) {
                return Err(EncodeError::Failed {
                    status: "exit status: 1".into(),
                    stderr: "Invalid data found when processing input".into(),
                });
            }
            std::fs::write(dir.join("segment_000.ts"), b"ts").unwrap();
            std::fs::write(&playlist, b"#EXTM3U\n").unwrap();
            Ok(())
        }
    }

    /// Records callbacks and cancels the job once `quality` completes.
    struct CancelAfter {
        inner: RecordingNotifier,
        quality: String,
        token: CancellationToken,
    }

    #[async_trait]
    impl Notifier for CancelAfter {
        async fn notify(&self, url: &str, payload: &CallbackPayload) {
            self.inner.notify(url, payload).await;
            if payload.quality == self.quality && payload.status == CallbackStatus::Completed {
                self.token.cancel();
            }
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl StorageConnector for FailingConnector {
        async fn connect(&self) -> Result<Arc<dyn ObjectStorage>, StorageError> {
            Err(StorageError::Config("AWS_BUCKET is not set".into()))
        }
    }

    fn job(qualities: &[&str]) -> ConversionJob {
        job_with(json!({ "qualities": qualities }))
    }

    fn job_with(overrides: serde_json::Value) -> ConversionJob {
        let mut body = json!({
            "media_file_id": 5,
            "s3_path": SOURCE_KEY,
            "qualities": ["240p"],
            "callback_url": "http://backend.local/api/hls/callback"
        });
        for (k, v) in overrides.as_object().unwrap() {
            body[k] = v.clone();
        }
        let req: ConvertRequest = serde_json::from_value(body).unwrap();
        ConversionJob::new(req)
    }

    fn source_storage() -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::default().with_object(SOURCE_KEY, b"video"))
    }

    fn pipeline(
        storage: Arc<dyn StorageConnector>,
        encoder: Arc<FakeEncoder>,
        notifier: Arc<dyn Notifier>,
        root: &Path,
    ) -> Pipeline {
        Pipeline::new(storage, encoder, notifier, root, "http://default.local/callback")
    }

    fn statuses(payloads: &[CallbackPayload]) -> Vec<(String, CallbackStatus)> {
        payloads.iter().map(|p| (p.quality.clone(), p.status)).collect()
    }

    fn assert_workspace_removed(root: &Path) {
        let leftovers: Vec<_> = std::fs::read_dir(root).unwrap().collect();
        assert!(leftovers.is_empty(), "workspace left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn all_qualities_succeed() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );
        let job = job(&["720p", "240p"]);

        let report = p.process_job(&job).await;

        assert_eq!(report.completed, ["720p", "240p"]);
        assert!(report.failed.is_empty());
        assert_eq!(job.completed_qualities(), ["720p", "240p"]);

        let payloads = notifier.payloads();
        assert_eq!(
            statuses(&payloads),
            [
                ("720p".to_string(), CallbackStatus::Completed),
                ("240p".to_string(), CallbackStatus::Completed),
            ]
        );
        assert_eq!(payloads[0].s3_path.as_deref(), Some("hls/5/720p/master.m3u8"));
        assert_eq!(notifier.sent.lock().unwrap()[0].0, "http://backend.local/api/hls/callback");

        assert!(storage.object("hls/5/720p/segment_000.ts").is_some());
        assert!(storage.object("hls/5/240p/master.m3u8").is_some());
        let master = storage.object("hls/5/master.m3u8").unwrap();
        let refs: Vec<&str> = master.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(refs, ["240p/master.m3u8", "720p/master.m3u8"]);

        assert_eq!(encoder.calls().len(), 2);
        assert_workspace_removed(root.path());
    }

    #[tokio::test]
    async fn source_download_failure_fails_every_quality() {
        let root = tempfile::tempdir().unwrap();
        let storage = Arc::new(MemoryStorage::default());
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );

        let report = p.process_job(&job(&["240p", "720p"])).await;

        let payloads = notifier.payloads();
        assert_eq!(
            statuses(&payloads),
            [
                ("240p".to_string(), CallbackStatus::Failed),
                ("720p".to_string(), CallbackStatus::Failed),
            ]
        );
        assert!(
            payloads[0]
                .error_message
                .as_deref()
                .unwrap()
                .contains("failed to download source file")
        );
        assert_eq!(report.failed, ["240p", "720p"]);
        assert!(encoder.calls().is_empty());
        assert_eq!(storage.upload_count(), 0);
        assert_workspace_removed(root.path());
    }

    #[tokio::test]
    async fn storage_client_failure_fails_every_quality() {
        let root = tempfile::tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(Arc::new(FailingConnector), encoder.clone(), notifier.clone(), root.path());

        p.process_job(&job(&["360p", "1080p"])).await;

        let payloads = notifier.payloads();
        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().all(|p| p.status == CallbackStatus::Failed
            && p.error_message.as_deref().unwrap().contains("storage client")));
        assert!(encoder.calls().is_empty());
        assert_workspace_removed(root.path());
    }

    #[tokio::test]
    async fn failed_quality_does_not_touch_completed_sibling() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        let encoder = Arc::new(FakeEncoder::failing(&["1080p"]));
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );

        let report = p.process_job(&job(&["480p", "1080p"])).await;

        assert_eq!(report.completed, ["480p"]);
        assert_eq!(report.failed, ["1080p"]);
        let payloads = notifier.payloads();
        assert_eq!(payloads[1].status, CallbackStatus::Failed);
        assert!(
            payloads[1]
                .error_message
                .as_deref()
                .unwrap()
                .contains("Invalid data found")
        );

        let master = storage.object("hls/5/master.m3u8").unwrap();
        assert!(master.contains("480p/master.m3u8"));
        assert!(!master.contains("1080p"));
        assert!(storage.object("hls/5/1080p/master.m3u8").is_none());
        assert_workspace_removed(root.path());
    }

    #[tokio::test]
    async fn unknown_quality_fails_without_encoding() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );

        let report = p.process_job(&job(&["999p"])).await;

        assert_eq!(report.failed, ["999p"]);
        let payloads = notifier.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].error_message.as_deref(), Some("unknown quality: 999p"));
        assert!(encoder.calls().is_empty());
        assert_eq!(storage.upload_count(), 0);
        assert!(storage.object("hls/5/master.m3u8").is_none());
    }

    #[tokio::test]
    async fn cancel_after_first_quality_keeps_it_and_skips_the_rest() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        let encoder = Arc::new(FakeEncoder::default());
        let job = job(&["240p", "720p"]);
        let notifier = Arc::new(CancelAfter {
            inner: RecordingNotifier::default(),
            quality: "240p".into(),
            token: job.cancellation().clone(),
        });
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );

        let report = p.process_job(&job).await;

        assert!(report.cancelled);
        assert_eq!(report.completed, ["240p"]);
        assert_eq!(
            statuses(&notifier.inner.payloads()),
            [("240p".to_string(), CallbackStatus::Completed)]
        );
        assert_eq!(encoder.calls().len(), 1);
        let master = storage.object("hls/5/master.m3u8").unwrap();
        assert!(master.contains("240p/master.m3u8"));
        assert!(!master.contains("720p"));
        assert_workspace_removed(root.path());
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );
        let job = job(&["240p"]);
        job.cancel();

        let report = p.process_job(&job).await;

        assert!(report.cancelled);
        assert!(notifier.payloads().is_empty());
        assert!(encoder.calls().is_empty());
    }

    #[tokio::test]
    async fn encoder_cancellation_is_reported_as_cancelled() {
        struct CancelledEncoder;

        #[async_trait]
        impl Encoder for CancelledEncoder {
            async fn encode(&self, _args: &[String], cancel: &CancellationToken) -> Result<(), EncodeError> {
                cancel.cancel();
                Err(EncodeError::Cancelled)
            }
        }

        let root = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let p = Pipeline::new(
            Arc::new(SharedConnector(source_storage())),
            Arc::new(CancelledEncoder),
            notifier.clone(),
            root.path(),
            "http://default.local/callback",
        );

        let report = p.process_job(&job(&["240p", "720p"])).await;

        assert!(report.cancelled);
        let payloads = notifier.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].quality, "240p");
        assert_eq!(payloads[0].error_message.as_deref(), Some("conversion cancelled"));
        assert_workspace_removed(root.path());
    }

    #[tokio::test]
    async fn watermark_is_composited_when_downloaded() {
        let root = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            MemoryStorage::default()
                .with_object(SOURCE_KEY, b"video")
                .with_object("brand/logo.png", b"png"),
        );
        let encoder = Arc::new(FakeEncoder::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage)),
            encoder.clone(),
            Arc::new(RecordingNotifier::default()),
            root.path(),
        );
        let job = job_with(json!({
            "qualities": ["360p"],
            "gop_size": 48,
            "watermark": {
                "enabled": true,
                "s3_path": "brand/logo.png",
                "position": "top-left",
                "size": 12,
                "opacity": 70
            }
        }));

        p.process_job(&job).await;

        let args = &encoder.calls()[0];
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert!(args.iter().any(|a| a.ends_with("watermark.png")));
        let graph_at = args.iter().position(|a| a == "-filter_complex").unwrap();
        let graph = &args[graph_at + 1];
        assert!(graph.contains("aa=0.70"));
        assert!(graph.contains("overlay=W*0.02:W*0.02"));
        let gop_at = args.iter().position(|a| a == "-g").unwrap();
        assert_eq!(args[gop_at + 1], "48");
    }

    #[tokio::test]
    async fn watermark_download_failure_is_not_fatal() {
        let root = tempfile::tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(source_storage())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );
        let job = job_with(json!({
            "watermark": { "enabled": true, "s3_path": "brand/missing.png" }
        }));

        let report = p.process_job(&job).await;

        assert_eq!(report.completed, ["240p"]);
        let args = &encoder.calls()[0];
        assert!(!args.iter().any(|a| a == "-filter_complex"));
        assert!(args.iter().any(|a| a == "-vf"));
    }

    #[tokio::test]
    async fn variant_upload_failure_fails_only_that_quality() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        storage
            .reject_uploads
            .lock()
            .unwrap()
            .push("hls/5/720p/".into());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            Arc::new(FakeEncoder::default()),
            notifier.clone(),
            root.path(),
        );

        let report = p.process_job(&job(&["720p", "240p"])).await;

        assert_eq!(report.failed, ["720p"]);
        assert_eq!(report.completed, ["240p"]);
        let payloads = notifier.payloads();
        assert!(
            payloads[0]
                .error_message
                .as_deref()
                .unwrap()
                .starts_with("failed to upload to storage")
        );
    }

    #[tokio::test]
    async fn master_playlist_upload_failure_keeps_quality_completed() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        storage
            .reject_uploads
            .lock()
            .unwrap()
            .push("hls/5/master.m3u8".into());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            Arc::new(FakeEncoder::default()),
            notifier.clone(),
            root.path(),
        );

        let report = p.process_job(&job(&["240p"])).await;

        assert_eq!(report.completed, ["240p"]);
        assert_eq!(notifier.payloads()[0].status, CallbackStatus::Completed);
        assert!(storage.object("hls/5/master.m3u8").is_none());
    }

    #[tokio::test]
    async fn blank_callback_url_uses_default() {
        let root = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(source_storage())),
            Arc::new(FakeEncoder::default()),
            notifier.clone(),
            root.path(),
        );

        p.process_job(&job_with(json!({ "callback_url": "  " }))).await;

        assert_eq!(notifier.sent.lock().unwrap()[0].0, "http://default.local/callback");
    }

    #[tokio::test]
    async fn repeated_quality_is_converted_once() {
        let root = tempfile::tempdir().unwrap();
        let storage = source_storage();
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            root.path(),
        );
        let job = job(&["240p", "240p"]);

        let report = p.process_job(&job).await;

        assert_eq!(report.completed, ["240p"]);
        assert_eq!(encoder.calls().len(), 1);
        assert_eq!(
            statuses(&notifier.payloads()),
            [("240p".to_string(), CallbackStatus::Completed)]
        );
        assert_eq!(job.completed_qualities(), ["240p"]);
        let master = storage.object("hls/5/master.m3u8").unwrap();
        assert_eq!(master.matches("#EXT-X-STREAM-INF").count(), 1);
        assert_workspace_removed(root.path());
    }

    #[tokio::test]
    async fn workspace_failure_fails_every_quality() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let storage = source_storage();
        let encoder = Arc::new(FakeEncoder::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline(
            Arc::new(SharedConnector(storage.clone())),
            encoder.clone(),
            notifier.clone(),
            &blocker,
        );

        let report = p.process_job(&job(&["240p", "720p", "240p"])).await;

        let payloads = notifier.payloads();
        assert_eq!(
            statuses(&payloads),
            [
                ("240p".to_string(), CallbackStatus::Failed),
                ("720p".to_string(), CallbackStatus::Failed),
            ]
        );
        assert!(
            payloads
                .iter()
                .all(|p| p.error_message.as_deref().unwrap().contains("failed to create temp directory"))
        );
        assert_eq!(report.failed, ["240p", "720p"]);
        assert!(encoder.calls().is_empty());
        assert_eq!(storage.upload_count(), 0);
    }

    #[test]
    fn keys_follow_hls_layout() {
        assert_eq!(quality_prefix(9, "720p"), "hls/9/720p");
        assert_eq!(quality_manifest_key(9, "720p"), "hls/9/720p/master.m3u8");
        assert_eq!(master_manifest_key(9), "hls/9/master.m3u8");
        assert_eq!(extension_of("a/b/movie.MKV"), ".MKV");
        assert_eq!(extension_of("noext"), "");
    }
}
