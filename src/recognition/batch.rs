use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Serialize, Serializer};

use crate::recognition::pipeline::Recognizer;
use crate::recognition::types::{FailureReason, RecognitionOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    /// Serialized lossily, so non-UTF-8 paths still render.
    #[serde(serialize_with = "serialize_lossy_path")]
    pub path: PathBuf,
    pub outcome: RecognitionOutcome,
}

fn serialize_lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// Recognise many screenshots, at most `concurrency` at a time.
///
/// Each file runs on the blocking pool (recognition is CPU-bound). Results come
/// back in input order; a worker that panics or is cancelled yields
/// `internal_error` for its own entry only.
pub async fn recognize_batch(
    recognizer: Arc<Recognizer>,
    paths: Vec<PathBuf>,
    concurrency: usize,
) -> Vec<BatchEntry> {
    let total = paths.len();
    tracing::info!(total, concurrency, "starting batch recognition");

    let entries: Vec<BatchEntry> = stream::iter(paths)
        .map(|path| {
            let recognizer = recognizer.clone();
            async move {
                let job_path = path.clone();
                let job = move || recognizer.recognize_path(&job_path);
                let outcome = tokio::task::spawn_blocking(job)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!(
                            path = %path.display(),
                            error = %e,
                            "recognition worker failed"
                        );
                        FailureReason::InternalError {
                            detail: format!("worker: {e}"),
                        }
                        .into()
                    });
                BatchEntry { path, outcome }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let succeeded = entries.iter().filter(|e| e.outcome.is_success()).count();
    tracing::info!(total, succeeded, failed = total - succeeded, "batch recognition finished");
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MapFixResult;
    use crate::recognition::types::{ImageCoordinate, WorldCoordinate};
    use image::{GrayImage, Luma};

    fn write_png(width: u32, height: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mapfix-batch-{}.png", uuid::Uuid::new_v4()));
        GrayImage::from_fn(width, height, |x, y| Luma([(x * 7 + y * 3) as u8]))
            .save(&path)
            .unwrap();
        path
    }

    fn size_recognizer() -> Arc<Recognizer> {
        Arc::new(Recognizer::new(|g: &GrayImage| -> MapFixResult<ImageCoordinate> {
            Ok(ImageCoordinate::new(g.width() as f64, g.height() as f64))
        }))
    }

    #[tokio::test]
    async fn keeps_input_order_and_isolates_failures() {
        let a = write_png(10, 20);
        let b = write_png(30, 5);
        let missing = std::env::temp_dir().join("mapfix-batch-missing.png");
        let paths = vec![a.clone(), missing.clone(), b.clone()];

        let entries = recognize_batch(size_recognizer(), paths, 2).await;
        std::fs::remove_file(&a).ok();
        std::fs::remove_file(&b).ok();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, a);
        assert_eq!(entries[0].outcome.coordinate(), Some(WorldCoordinate::new(10.0, 20.0)));
        assert_eq!(entries[1].path, missing);
        assert_eq!(entries[1].outcome.reason().map(FailureReason::tag), Some("file_not_found"));
        assert_eq!(entries[2].outcome.coordinate(), Some(WorldCoordinate::new(30.0, 5.0)));
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs() {
        let a = write_png(4, 4);
        let entries = recognize_batch(size_recognizer(), vec![a.clone()], 0).await;
        std::fs::remove_file(&a).ok();
        assert!(entries[0].outcome.is_success());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_serializes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let entry = BatchEntry {
            path: PathBuf::from(OsStr::from_bytes(b"shots/map-\xff.png")),
            outcome: FailureReason::NoMatch.into(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["path"], "shots/map-\u{FFFD}.png");
        assert_eq!(value["outcome"]["status"], "failure");
    }

    #[test]
    fn path_serializes_as_plain_string() {
        let entry = BatchEntry {
            path: PathBuf::from("shots/a.png"),
            outcome: RecognitionOutcome::success(WorldCoordinate::new(1.0, 2.0)),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.starts_with("{\"path\":\"shots/a.png\""), "{json}");
    }

    #[tokio::test]
    async fn empty_batch() {
        assert!(recognize_batch(size_recognizer(), Vec::new(), 4).await.is_empty());
    }
}
