//! Post-render duration checks.
//!
//! Checks are advisory: a deviation is logged and counted, never fatal.

use std::path::Path;
use tracing::warn;

use scenecraft_models::DurationCheck;

use crate::probe::DurationProbe;

/// Allowed deviation of a rendered scene clip, in seconds.
pub const SCENE_TOLERANCE_SECS: f64 = 0.5;

/// Allowed deviation of the concatenated timeline, in seconds.
pub const TIMELINE_TOLERANCE_SECS: f64 = 1.0;

/// Probe `path` and compare it with `expected`.
///
/// Returns `None` when the file cannot be probed.
pub async fn verify_duration<P>(
    probe: &P,
    path: &Path,
    expected: f64,
    tolerance: f64,
) -> Option<DurationCheck>
where
    P: DurationProbe + ?Sized,
{
    let actual = match probe.duration(path).await {
        Ok(d) => d,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Could not probe output for duration check"
            );
            return None;
        }
    };

    let check = DurationCheck::new(path, expected, actual, tolerance);
    if !check.within_tolerance() {
        metrics::counter!("scenecraft_duration_mismatch_total").increment(1);
        warn!(
            path = %path.display(),
            expected = expected,
            actual = actual,
            deviation = check.deviation(),
            tolerance = tolerance,
            "Output duration outside tolerance"
        );
    }

    Some(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MediaError, MediaResult};
    use async_trait::async_trait;

    struct FixedProbe(Option<f64>);

    #[async_trait]
    impl DurationProbe for FixedProbe {
        async fn duration(&self, path: &Path) -> MediaResult<f64> {
            self.0
                .ok_or_else(|| MediaError::MediaFileMissing(path.to_path_buf()))
        }
    }

    #[tokio::test]
    async fn test_within_tolerance() {
        let check = verify_duration(&FixedProbe(Some(8.3)), Path::new("a.mp4"), 8.0, 0.5)
            .await
            .unwrap();
        assert!(check.within_tolerance());
        assert!((check.deviation() - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_outside_tolerance_is_reported_not_fatal() {
        let check = verify_duration(
            &FixedProbe(Some(12.0)),
            Path::new("t.mp4"),
            10.0,
            TIMELINE_TOLERANCE_SECS,
        )
        .await
        .unwrap();
        assert!(!check.within_tolerance());
        assert_eq!(check.actual, 12.0);
    }

    #[tokio::test]
    async fn test_unprobeable_output_yields_none() {
        let check =
            verify_duration(&FixedProbe(None), Path::new("x.mp4"), 5.0, SCENE_TOLERANCE_SECS).await;
        assert!(check.is_none());
    }
}
