pub mod config;
pub mod errors;
pub mod recognition;

pub use errors::{MapFixError, MapFixResult};
pub use recognition::batch::{recognize_batch, BatchEntry};
pub use recognition::matcher::{BigMapMatcher, MatcherAdapter};
pub use recognition::pipeline::Recognizer;
pub use recognition::preprocess::{Preprocessor, ResizeFilter};
pub use recognition::template::{TemplateMatcher, TemplateMatcherOptions};
pub use recognition::transform::{Calibration, CoordinateTransformer};
pub use recognition::types::{
    FailureReason, ImageCoordinate, MapFragment, RecognitionOutcome, ScreenImage, WorldCoordinate,
};
pub use recognition::validator::{is_valid_coordinate, WorldBounds};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
///
/// Meant for binaries; calling it twice is a no-op.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
