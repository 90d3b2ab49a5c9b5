//! Scene pipeline orchestration.
//!
//! Every scene runs its own resolve → normalize → render → verify chain as
//! an independent task. Results are collected once all tasks finish,
//! re-sorted by scene number and then either concatenated into one timeline
//! or delivered as individual clips.

use chrono::Utc;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, Instrument};

use scenecraft_media::fs_utils::{ensure_readable_file, move_file, scene_artifact_path};
use scenecraft_media::{
    concatenate, normalize_audio, render_scene, resolve_durations, verify_duration,
    DurationProbe, FfmpegRunner, FfprobeProbe, MediaError, MediaResult, SceneRenderRequest,
    SCENE_TOLERANCE_SECS,
};
use scenecraft_models::{
    DroppedScene, DurationCheck, EncodingConfig, Job, JobReport, JobState, OutputMode,
    RenderedScene, Scene, SceneClip, TimelineArtifact,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::workspace::JobWorkspace;

/// A scene that made it through rendering.
#[derive(Debug, Clone)]
struct SceneOutput {
    rendered: RenderedScene,
    check: Option<DurationCheck>,
}

/// Shared, cheaply cloned state handed to every scene task.
#[derive(Clone)]
struct SceneContext {
    work_dir: PathBuf,
    encoding: Arc<EncodingConfig>,
    runner: FfmpegRunner,
    probe: Arc<dyn DurationProbe>,
    permits: Arc<Semaphore>,
}

/// Runs composition jobs end to end.
pub struct ScenePipeline {
    config: PipelineConfig,
    encoding: Arc<EncodingConfig>,
    public_url: Option<url::Url>,
    probe: Option<Arc<dyn DurationProbe>>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl ScenePipeline {
    /// Create a pipeline backed by `ffprobe`.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let public_url = config.public_url()?;

        Ok(Self {
            encoding: Arc::new(config.encoding()),
            public_url,
            config,
            probe: None,
            cancel_rx: None,
        })
    }

    /// Replace the duration probe.
    pub fn with_probe(mut self, probe: Arc<dyn DurationProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Observe a cancellation signal; every external process is killed
    /// once it flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.config.ffmpeg_timeout_secs() {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }

    /// The configured probe, else `ffprobe` under the job's timeout and
    /// cancellation signal.
    fn probe(&self) -> Arc<dyn DurationProbe> {
        match &self.probe {
            Some(probe) => Arc::clone(probe),
            None => Arc::new(FfprobeProbe::new(self.runner())),
        }
    }

    /// Run a job to a terminal state.
    ///
    /// Returns the report when at least one scene rendered. The job's working
    /// directory is cleaned up on every outcome.
    pub async fn run(&self, job: &Job) -> PipelineResult<JobReport> {
        let mode = job.mode.unwrap_or(self.config.output_mode);
        let logger = JobLogger::new(&job.id, mode.as_str());
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&format!("{} scenes, mode {}", job.scenes.len(), mode));

            let workspace = JobWorkspace::create(&self.config, &job.id).await?;
            let result = self.execute(job, mode, &workspace, &logger).await;
            workspace.cleanup().await;

            let elapsed = started.elapsed().as_secs_f64();
            match &result {
                Ok(report) => {
                    metrics::record_job_finished(report.state, elapsed);
                    logger.log_completion(report.state, elapsed, report.dropped_scenes.len());
                }
                Err(e) => {
                    metrics::record_job_finished(JobState::Failed, elapsed);
                    logger.log_error(&e.to_string());
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        job: &Job,
        mode: OutputMode,
        workspace: &JobWorkspace,
        logger: &JobLogger,
    ) -> PipelineResult<JobReport> {
        let started_at = Utc::now();
        logger.log_state(JobState::Rendering);

        let outcomes = self.render_all(job, workspace.root(), logger).await;

        let mut rendered = Vec::new();
        let mut scene_checks = Vec::new();
        let mut dropped = Vec::new();

        for (scene_number, outcome) in outcomes {
            match outcome {
                Ok(output) => {
                    metrics::record_scene_rendered();
                    rendered.push(output.rendered);
                    scene_checks.extend(output.check);
                }
                Err(e) => {
                    let error = PipelineError::from(e);
                    if error.is_job_fatal() {
                        return Err(error);
                    }
                    if let PipelineError::Media(media) = &error {
                        metrics::record_scene_failed(media.kind());
                    }
                    let reason = match &error {
                        PipelineError::Media(media) => media.detail(),
                        other => other.to_string(),
                    };
                    logger.log_scene_dropped(scene_number, &reason);
                    dropped.push(DroppedScene {
                        scene_number,
                        reason,
                    });
                }
            }
        }

        if rendered.is_empty() {
            return Err(PipelineError::NoRenderableScenes { dropped });
        }

        let (artifact, clips) = match mode {
            OutputMode::Timeline => {
                logger.log_state(JobState::Concatenating);
                let artifact = self.concatenate(job, &rendered, workspace).await?;
                (Some(artifact), Vec::new())
            }
            OutputMode::SceneClips => {
                let clips = deliver_clips(
                    &rendered,
                    workspace.output_dir(),
                    &job.artifact_stem(),
                    self.public_url.as_ref(),
                )
                .await?;
                (None, clips)
            }
        };

        let state = if dropped.is_empty() {
            JobState::Completed
        } else {
            logger.log_warning(&format!(
                "{} of {} scenes dropped",
                dropped.len(),
                job.scenes.len()
            ));
            JobState::PartiallyFailed
        };

        Ok(JobReport {
            job_id: job.id.clone(),
            state,
            mode,
            artifact,
            clips,
            dropped_scenes: dropped,
            scene_checks,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Fan out one task per scene and collect outcomes in scene order.
    async fn render_all(
        &self,
        job: &Job,
        work_dir: &Path,
        logger: &JobLogger,
    ) -> Vec<(u32, MediaResult<SceneOutput>)> {
        let context = SceneContext {
            work_dir: work_dir.to_path_buf(),
            encoding: Arc::clone(&self.encoding),
            runner: self.runner(),
            probe: self.probe(),
            permits: Arc::new(Semaphore::new(self.config.max_scene_parallel)),
        };

        let handles: Vec<_> = job
            .scenes
            .iter()
            .map(|scene| {
                let scene_number = scene.scene_number;
                let task = process_scene(context.clone(), scene.clone())
                    .instrument(logger.scene_span(scene_number));
                (scene_number, tokio::spawn(task))
            })
            .collect();

        let (numbers, tasks): (Vec<u32>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(tasks).await;

        let mut outcomes: Vec<(u32, MediaResult<SceneOutput>)> = numbers
            .into_iter()
            .zip(results)
            .map(|(scene_number, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    Err(MediaError::internal(format!("scene task failed: {}", e)))
                });
                (scene_number, outcome)
            })
            .collect();

        outcomes.sort_by_key(|(scene_number, _)| *scene_number);
        outcomes
    }

    async fn concatenate(
        &self,
        job: &Job,
        rendered: &[RenderedScene],
        workspace: &JobWorkspace,
    ) -> PipelineResult<TimelineArtifact> {
        let output = workspace.output_path(&format!("{}.mp4", job.artifact_stem()));

        let artifact = concatenate(
            rendered,
            &workspace.manifest_path(),
            &output,
            &self.encoding,
            &self.runner(),
            self.probe().as_ref(),
        )
        .await?;

        Ok(artifact)
    }
}

/// The per-scene chain. Any error drops only this scene.
async fn process_scene(ctx: SceneContext, scene: Scene) -> MediaResult<SceneOutput> {
    let _permit = ctx
        .permits
        .acquire_owned()
        .await
        .map_err(|_| MediaError::internal("scene semaphore closed"))?;

    let scene_number = scene.scene_number;

    for path in scene.input_paths() {
        ensure_readable_file(path).await?;
    }

    let durations = resolve_durations(&scene, ctx.probe.as_ref()).await?;

    let narration = match &scene.audio {
        Some(audio) => {
            let target = scene_artifact_path(&ctx.work_dir, scene_number, "narration", "wav");
            Some(
                normalize_audio(
                    audio.tracks(),
                    durations.final_duration,
                    &target,
                    &ctx.encoding,
                    &ctx.runner,
                )
                .await?,
            )
        }
        None => None,
    };

    let output = scene_artifact_path(&ctx.work_dir, scene_number, "final", "mp4");
    let request = SceneRenderRequest {
        scene: &scene,
        durations,
        narration: narration.as_deref(),
        work_dir: &ctx.work_dir,
        output: &output,
    };
    let rendered = render_scene(request, &ctx.encoding, &ctx.runner).await?;

    let check = verify_duration(
        ctx.probe.as_ref(),
        &rendered.path,
        rendered.duration,
        SCENE_TOLERANCE_SECS,
    )
    .await;

    Ok(SceneOutput { rendered, check })
}

/// Move rendered clips into the output directory as
/// `{stem}_scene_{n}.mp4`, attaching public URLs when a base is configured.
pub async fn deliver_clips(
    rendered: &[RenderedScene],
    output_dir: &Path,
    stem: &str,
    public_url: Option<&url::Url>,
) -> PipelineResult<Vec<SceneClip>> {
    let mut clips = Vec::with_capacity(rendered.len());

    for scene in rendered {
        let file_name = format!("{}_scene_{}.mp4", stem, scene.scene_number);
        let target = output_dir.join(&file_name);
        move_file(&scene.path, &target).await?;

        let url = public_url
            .and_then(|base| base.join(&file_name).ok())
            .map(|u| u.to_string());

        debug!(
            scene_number = scene.scene_number,
            path = %target.display(),
            url = ?url,
            "Delivered scene clip"
        );

        clips.push(SceneClip {
            scene_number: scene.scene_number,
            path: target,
            duration: scene.duration,
            url,
        });
    }

    Ok(clips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scenecraft_models::{SceneAudio, SceneMedia};
    use tempfile::TempDir;

    /// Probe for tests that must never reach ffprobe.
    struct UnreachableProbe;

    #[async_trait]
    impl DurationProbe for UnreachableProbe {
        async fn duration(&self, path: &Path) -> MediaResult<f64> {
            Err(MediaError::internal(format!(
                "unexpected probe of {}",
                path.display()
            )))
        }
    }

    fn pipeline_in(dir: &Path) -> ScenePipeline {
        let config = PipelineConfig {
            work_dir: dir.join("temp"),
            output_dir: dir.join("output"),
            ..Default::default()
        };
        ScenePipeline::new(config)
            .unwrap()
            .with_probe(Arc::new(UnreachableProbe))
    }

    #[tokio::test]
    async fn test_missing_media_fails_job_with_every_scene_dropped() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(dir.path());

        let job = Job::new(vec![
            Scene::new(
                2,
                SceneMedia::Video {
                    path: dir.path().join("missing.mp4"),
                },
            )
            .with_audio(SceneAudio::single(dir.path().join("missing.mp3"))),
            Scene::new(
                1,
                SceneMedia::Image {
                    path: dir.path().join("missing.jpg"),
                    duration: Some(5.0),
                },
            ),
        ])
        .unwrap();

        let err = pipeline.run(&job).await.unwrap_err();
        match &err {
            PipelineError::NoRenderableScenes { dropped } => {
                let numbers: Vec<u32> = dropped.iter().map(|d| d.scene_number).collect();
                assert_eq!(numbers, vec![1, 2]);
                assert!(dropped[1].reason.contains("missing.mp4"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // The job's working directory is gone even on failure
        assert!(!dir.path().join("temp").join(job.id.as_str()).exists());
    }

    #[tokio::test]
    async fn test_missing_narration_drops_scene() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("still.png");
        tokio::fs::write(&image, b"png").await.unwrap();

        let scene = Scene::new(
            1,
            SceneMedia::Image {
                path: image,
                duration: None,
            },
        )
        .with_audio(SceneAudio::single(dir.path().join("gone.mp3")));

        let err = pipeline_in(dir.path())
            .run(&Job::new(vec![scene]).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.dropped_scenes().len(), 1);
        assert!(err.dropped_scenes()[0].reason.contains("gone.mp3"));
    }

    #[tokio::test]
    async fn test_cancelled_job_stops_probing() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        tokio::fs::write(&video, b"mp4").await.unwrap();

        let config = PipelineConfig {
            work_dir: dir.path().join("temp"),
            output_dir: dir.path().join("output"),
            ffmpeg_timeout: Some(std::time::Duration::from_secs(1)),
            ..Default::default()
        };
        let (_tx, rx) = watch::channel(true);
        let pipeline = ScenePipeline::new(config).unwrap().with_cancel(rx);

        let job = Job::new(vec![Scene::new(1, SceneMedia::Video { path: video })]).unwrap();

        let started = Instant::now();
        let err = pipeline.run(&job).await.unwrap_err();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(err.dropped_scenes().len(), 1);
        assert_eq!(err.dropped_scenes()[0].reason, MediaError::Cancelled.to_string());
    }

    #[tokio::test]
    async fn test_deliver_clips_moves_files_and_builds_urls() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("work");
        let output = dir.path().join("output");
        tokio::fs::create_dir_all(&work).await.unwrap();

        let mut rendered = Vec::new();
        for n in [1u32, 3] {
            let path = work.join(format!("scene_{}_final.mp4", n));
            tokio::fs::write(&path, b"clip").await.unwrap();
            rendered.push(RenderedScene {
                scene_number: n,
                path,
                duration: 5.0,
            });
        }

        let base = url::Url::parse("http://localhost:3000/").unwrap();
        let clips = deliver_clips(&rendered, &output, "story", Some(&base))
            .await
            .unwrap();

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[1].path, output.join("story_scene_3.mp4"));
        assert!(clips[1].path.exists());
        assert!(!rendered[1].path.exists());
        assert_eq!(
            clips[0].url.as_deref(),
            Some("http://localhost:3000/story_scene_1.mp4")
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            max_scene_parallel: 0,
            ..Default::default()
        };
        assert!(matches!(
            ScenePipeline::new(config),
            Err(PipelineError::Config(_))
        ));
    }
}
