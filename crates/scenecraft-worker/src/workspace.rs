//! Per-job working directory.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use scenecraft_media::fs_utils::remove_dir_best_effort;
use scenecraft_models::JobId;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;

/// Directories owned by one job.
///
/// Intermediates live under `{work_dir}/{job_id}`; final artifacts go to the
/// shared output directory and are never removed here.
#[derive(Debug)]
pub struct JobWorkspace {
    root: PathBuf,
    output_dir: PathBuf,
    keep_intermediates: bool,
}

impl JobWorkspace {
    /// Create the job's working directory and the output directory.
    pub async fn create(config: &PipelineConfig, job_id: &JobId) -> PipelineResult<Self> {
        let root = config.work_dir.join(job_id.as_str());
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(&config.output_dir).await?;

        debug!(job_id = %job_id, work_dir = %root.display(), "Created job workspace");

        Ok(Self {
            root,
            output_dir: config.output_dir.clone(),
            keep_intermediates: config.keep_intermediates,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Location of the concat manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("concat.txt")
    }

    /// Location of a final artifact in the output directory.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Remove the working directory unless intermediates are kept.
    pub async fn cleanup(self) {
        if self.keep_intermediates {
            debug!(work_dir = %self.root.display(), "Keeping intermediates");
            return;
        }
        remove_dir_best_effort(&self.root).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path, keep: bool) -> PipelineConfig {
        PipelineConfig {
            work_dir: dir.join("temp"),
            output_dir: dir.join("output"),
            keep_intermediates: keep,
            ..Default::default()
        }
    }

    #[test]
    fn test_cleanup_removes_intermediates_only() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), false);
        let job_id = JobId::from_string("job-1");

        tokio_test::block_on(async {
            let workspace = JobWorkspace::create(&config, &job_id).await.unwrap();
            let root = workspace.root().to_path_buf();
            fs::write(root.join("scene_1_x_final.mp4"), b"clip").await.unwrap();
            fs::write(workspace.output_path("video.mp4"), b"final").await.unwrap();

            workspace.cleanup().await;

            assert!(!root.exists());
            assert!(config.output_dir.join("video.mp4").exists());
        });
    }

    #[tokio::test]
    async fn test_keep_intermediates() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), true);
        let workspace = JobWorkspace::create(&config, &JobId::from_string("job-2"))
            .await
            .unwrap();
        let root = workspace.root().to_path_buf();
        assert_eq!(workspace.manifest_path(), root.join("concat.txt"));

        workspace.cleanup().await;
        assert!(root.exists());
    }
}
