//! End-to-end analysis of one submitted video.
//!
//! A submission is resolved to bytes synchronously (upload or download),
//! registered with the [`TaskTracker`] and then analyzed on its own tokio
//! task:
//!
//! 1. Video branch (split, frame grids, moderation) and audio branch
//!    (extraction, chunked transcription) run as separate tasks and are
//!    joined; the first failure aborts the sibling.
//! 2. Description and metadata are requested from the provider.
//! 3. The result is stored, then the task is moved to its terminal state,
//!    so a poll never sees a pending task at 100%.
//! 4. The extracted audio artifact is always removed once both branches
//!    have stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn, Instrument};
use vdesc_media::MediaToolkit;
use vdesc_models::{
    AnalysisReport, AnalysisResult, FrameGrid, ModerationVerdict, PollResponse, TaskId, TaskStatus,
};
use vdesc_provider::ContentAnalysisProvider;

use crate::audio::{AudioChunker, Transcription};
use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::fetch::RetryingFetcher;
use crate::logging::TaskLogger;
use crate::metrics;
use crate::moderation::ModerationAggregator;
use crate::results::ResultStore;
use crate::tracker::{TaskProgress, TaskTracker};

/// Where the video of a submission comes from.
#[derive(Debug, Clone)]
pub enum VideoSource {
    Upload { bytes: Vec<u8>, filename: Option<String> },
    Url(String),
}

/// Output of the video branch.
#[derive(Debug, Clone)]
pub struct VideoAnalysis {
    pub grids: Vec<FrameGrid>,
    pub duration_seconds: f64,
    pub verdict: ModerationVerdict,
}

/// Owns the task and result tables and runs submissions through the pipeline.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    config: Arc<PipelineConfig>,
    tracker: TaskTracker,
    results: ResultStore,
    fetcher: RetryingFetcher,
    media: Arc<dyn MediaToolkit>,
    provider: Arc<dyn ContentAnalysisProvider>,
    moderation: ModerationAggregator,
    audio: AudioChunker,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        media: Arc<dyn MediaToolkit>,
        provider: Arc<dyn ContentAnalysisProvider>,
    ) -> WorkerResult<Self> {
        let fetcher = RetryingFetcher::new(&config.fetch)?;
        let tracker = TaskTracker::new(config.task_ttl, config.max_tracked_tasks);
        let results = ResultStore::new(config.task_ttl, config.max_tracked_tasks);
        let moderation = ModerationAggregator::new(Arc::clone(&provider));
        let audio = AudioChunker::new(
            Arc::clone(&media),
            Arc::clone(&provider),
            config.audio_chunk_ms,
            config.audio_chunk_max_bytes,
        );

        Ok(Self {
            config: Arc::new(config),
            tracker,
            results,
            fetcher,
            media,
            provider,
            moderation,
            audio,
        })
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Resolve the video, register a task and start analysis in the background.
    ///
    /// A URL source wins over an upload. Validation and download failures
    /// are returned directly and no task is created.
    pub async fn submit(&self, source: VideoSource, app_name: Option<&str>) -> WorkerResult<TaskId> {
        let (video, filename, origin) = match source {
            VideoSource::Url(url) => {
                let fetched = self.fetcher.fetch(&url).await?;
                (fetched.bytes, fetched.filename, "url")
            }
            VideoSource::Upload { bytes, filename } => {
                if bytes.is_empty() {
                    return Err(WorkerError::validation("Uploaded file is empty"));
                }
                (bytes, filename.unwrap_or_else(|| "upload".to_string()), "upload")
            }
        };

        let task_id = TaskId::new();
        self.tracker.start(&task_id).await;
        metrics::record_task_submitted(origin);

        info!(
            task_id = %task_id,
            app_name = app_name.unwrap_or("-"),
            filename = %filename,
            bytes = video.len(),
            "Received video for analysis"
        );

        let logger = TaskLogger::new(&task_id, "video_analysis");
        let span = logger.create_span();
        let this = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move { this.run(id, video).await }.instrument(span));

        Ok(task_id)
    }

    /// Stored result if any, else progress of a known task, else unknown.
    pub async fn poll(&self, task_id: &TaskId) -> PollResponse {
        if let Some(result) = self.results.get(task_id).await {
            return PollResponse::Finished(result);
        }

        match self.tracker.get(task_id).await {
            Some(task) => PollResponse::Pending {
                progress: task.current_progress,
                current_step: task.current_step().map(str::to_string),
            },
            None => PollResponse::Unknown,
        }
    }

    /// Run the pipeline for a registered task until it reaches a terminal state.
    pub async fn run(&self, task_id: TaskId, video: Vec<u8>) {
        let logger = TaskLogger::new(&task_id, "video_analysis");
        let started = Instant::now();
        let artifact = self.audio_artifact_path(&task_id);

        logger.log_start(&format!("{} bytes", video.len()));

        match self.analyze(&task_id, video, &artifact).await {
            Ok(report) => {
                self.results
                    .put(&task_id, AnalysisResult::Completed(Box::new(report)))
                    .await;
                self.tracker
                    .finish(&task_id, TaskStatus::Completed, Some(("Task completed", 100)))
                    .await;
                metrics::record_task_completed(started.elapsed().as_secs_f64());
                logger.log_completion(&format!("finished in {:.1}s", started.elapsed().as_secs_f64()));
            }
            Err(e) => {
                logger.log_error(&format!("Error during video analysis: {e}"));
                self.results
                    .put(&task_id, AnalysisResult::error(e.to_string()))
                    .await;
                self.tracker.complete(&task_id, TaskStatus::Error).await;
                metrics::record_task_failed(e.kind());
            }
        }

        cleanup_artifact(&artifact, &logger).await;
    }

    /// Remove expired tasks and results.
    pub async fn sweep(&self) -> (usize, usize) {
        let tasks = self.tracker.purge_expired().await;
        let results = self.results.purge_expired().await;
        if tasks > 0 {
            metrics::record_evictions("tasks", tasks);
        }
        if results > 0 {
            metrics::record_evictions("results", results);
        }
        (tasks, results)
    }

    /// Periodically sweep expired entries until the runtime shuts down.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let (tasks, results) = this.sweep().await;
                if tasks + results > 0 {
                    info!(tasks, results, "Evicted expired entries");
                }
            }
        })
    }

    fn audio_artifact_path(&self, task_id: &TaskId) -> PathBuf {
        self.config
            .scratch_dir
            .join(format!("extracted_audio_{task_id}.wav"))
    }

    async fn analyze(
        &self,
        task_id: &TaskId,
        video: Vec<u8>,
        artifact: &Path,
    ) -> WorkerResult<AnalysisReport> {
        let progress = TaskProgress::new(self.tracker.clone(), task_id.clone());
        progress.step("Starting parallel processing", 0.0).await;

        let video = Arc::new(video);

        let video_branch = {
            let this = self.clone();
            let video = Arc::clone(&video);
            let progress = progress.clone();
            tokio::spawn(
                async move { this.video_branch(&video, &progress).await }.in_current_span(),
            )
        };

        let audio_branch = {
            let this = self.clone();
            let video = Arc::clone(&video);
            let progress = progress.clone();
            let artifact = artifact.to_path_buf();
            tokio::spawn(
                async move {
                    let started = Instant::now();
                    let result = this.audio.extract(&video, &artifact, Some(&progress)).await;
                    metrics::record_stage_duration("audio", started.elapsed().as_secs_f64());
                    result
                }
                .in_current_span(),
            )
        };

        let (visual, audio): (VideoAnalysis, Transcription) =
            join_branches(video_branch, audio_branch).await?;
        progress.step("Parallel processing completed", 40.0).await;

        if visual.grids.is_empty() {
            warn!(task_id = %task_id, "No valid frames were extracted from the video");
            return Err(WorkerError::NoUsableFrames);
        }

        progress.step("Generating description", 40.0).await;
        let started = Instant::now();
        let narrative = self
            .provider
            .describe(&visual.grids, &audio.transcript)
            .await?;
        metrics::record_stage_duration("describe", started.elapsed().as_secs_f64());
        progress.step("Description generated", 60.0).await;

        progress.step("Extracting metadata", 60.0).await;
        let started = Instant::now();
        let metadata = self
            .provider
            .extract_metadata(&narrative, visual.duration_seconds, visual.verdict.is_safe)
            .await?;
        metrics::record_stage_duration("metadata", started.elapsed().as_secs_f64());
        progress.step("Metadata extracted", 80.0).await;

        let is_safe = visual.verdict.is_safe && metadata.is_safe.unwrap_or(true);
        let report = AnalysisReport::assemble(narrative, is_safe, visual.verdict.warnings, metadata);
        progress.step("Results compiled", 90.0).await;

        Ok(report)
    }

    async fn video_branch(&self, video: &[u8], progress: &TaskProgress) -> WorkerResult<VideoAnalysis> {
        progress.step("Starting video processing", 5.0).await;

        let started = Instant::now();
        let split = self.media.split_video(video).await?;
        metrics::record_stage_duration("split", started.elapsed().as_secs_f64());
        info!(
            segments = split.segments.len(),
            duration_seconds = split.duration_seconds,
            "Video split completed"
        );
        progress.step("Video split completed", 15.0).await;

        let started = Instant::now();
        let extracted = join_all(split.segments.iter().map(|s| self.media.frame_grid(s))).await;
        let grids: Vec<FrameGrid> = extracted
            .into_iter()
            .enumerate()
            .filter_map(|(idx, result)| match result {
                Ok(grid) => grid,
                Err(e) => {
                    warn!(segment = idx, "Frame grid extraction failed: {}", e);
                    None
                }
            })
            .collect();
        metrics::record_stage_duration("grids", started.elapsed().as_secs_f64());
        progress.step("Frame extraction completed", 25.0).await;

        progress.step("Starting content moderation", 30.0).await;
        let started = Instant::now();
        let verdict = self.moderation.evaluate(&grids).await;
        metrics::record_stage_duration("moderation", started.elapsed().as_secs_f64());
        progress.step("Content moderation completed", 35.0).await;

        Ok(VideoAnalysis {
            grids,
            duration_seconds: split.duration_seconds,
            verdict,
        })
    }
}

fn flatten<T>(joined: Result<WorkerResult<T>, JoinError>) -> WorkerResult<T> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(e.into()),
    }
}

/// Await both branches; on the first failure abort the other one and wait
/// for it to stop.
async fn join_branches<A, B>(
    mut first: JoinHandle<WorkerResult<A>>,
    mut second: JoinHandle<WorkerResult<B>>,
) -> WorkerResult<(A, B)> {
    tokio::select! {
        joined = &mut first => match flatten(joined) {
            Ok(a) => Ok((a, flatten(second.await)?)),
            Err(e) => {
                second.abort();
                let _ = second.await;
                Err(e)
            }
        },
        joined = &mut second => match flatten(joined) {
            Ok(b) => Ok((flatten(first.await)?, b)),
            Err(e) => {
                first.abort();
                let _ = first.await;
                Err(e)
            }
        },
    }
}

async fn cleanup_artifact(path: &Path, logger: &TaskLogger) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => logger.log_progress(&format!("Cleaned up audio file: {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(path = %path.display(), "Error cleaning up audio file: {}", e),
    }
}
