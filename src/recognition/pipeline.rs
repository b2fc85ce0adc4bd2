/// Recognition pipeline: screenshot in, world coordinate (or typed failure) out.
///
/// Stages run strictly in order and the first failure short-circuits:
///
/// 1. Empty check.
/// 2. Preprocess (uniform downscale + grayscale).
/// 3. Match against the reference map.
/// 4. Convert image coordinates to world coordinates.
/// 5. Validate against the world bounds.
///
/// A `Recognizer` holds no per-call state, so one instance can be shared
/// across threads.
use std::path::Path;

use crate::config::AppConfig;
use crate::recognition::matcher::{BigMapMatcher, MatcherAdapter};
use crate::recognition::preprocess::Preprocessor;
use crate::recognition::transform::{Calibration, CoordinateTransformer};
use crate::recognition::types::{FailureReason, RecognitionOutcome, ScreenImage};
use crate::recognition::validator::WorldBounds;

#[derive(Debug)]
pub struct Recognizer {
    preprocessor: Preprocessor,
    adapter: MatcherAdapter,
    transformer: CoordinateTransformer,
    bounds: WorldBounds,
}

impl Recognizer {
    /// Pipeline with default preprocessing, identity calibration and default bounds.
    pub fn new(matcher: impl BigMapMatcher + 'static) -> Self {
        Self {
            preprocessor: Preprocessor::default(),
            adapter: MatcherAdapter::new(matcher),
            transformer: CoordinateTransformer::default(),
            bounds: WorldBounds::default(),
        }
    }

    pub fn from_config(config: &AppConfig, matcher: impl BigMapMatcher + 'static) -> Self {
        let preprocessor = Preprocessor::new(config.preprocess.max_dimension)
            .with_filter(config.preprocess.filter);
        Self::new(matcher)
            .with_preprocessor(preprocessor)
            .with_calibration(config.calibration)
            .with_bounds(config.bounds.into())
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.transformer = CoordinateTransformer::new(calibration);
        self
    }

    pub fn with_bounds(mut self, bounds: WorldBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    /// Recognise an already-decoded screenshot.
    pub fn recognize_image(&self, raw: ScreenImage) -> RecognitionOutcome {
        if raw.is_empty() {
            tracing::warn!("screenshot has zero area");
            return FailureReason::EmptyMapRegion.into();
        }

        let fragment = match self.preprocessor.prepare(raw) {
            Ok(fragment) => fragment,
            Err(reason) => {
                tracing::warn!(reason = reason.tag(), "could not extract map region");
                return reason.into();
            }
        };
        tracing::debug!(width = fragment.width(), height = fragment.height(), "map fragment ready");

        let image_coord = match self.adapter.locate(fragment) {
            Ok(Some(coord)) => coord,
            Ok(None) => {
                tracing::warn!("map matching failed; no position found");
                return FailureReason::NoMatch.into();
            }
            Err(e) => {
                tracing::error!(error = %e, "matcher fault");
                return FailureReason::InternalError { detail: e.to_string() }.into();
            }
        };

        let world = self.transformer.to_world(image_coord);
        if !self.bounds.contains(&world) {
            tracing::warn!(
                image_x = image_coord.x,
                image_y = image_coord.y,
                world_x = world.x,
                world_y = world.y,
                "recognised position outside world bounds"
            );
            return FailureReason::OutOfBounds { coordinate: world }.into();
        }

        tracing::info!(
            image_x = image_coord.x,
            image_y = image_coord.y,
            world_x = world.x,
            world_y = world.y,
            "recognition succeeded"
        );
        RecognitionOutcome::success(world)
    }

    /// Recognise a screenshot file.
    pub fn recognize_path(&self, path: impl AsRef<Path>) -> RecognitionOutcome {
        let path = path.as_ref();
        if path.as_os_str().is_empty() || !path.exists() {
            tracing::warn!(path = %path.display(), "screenshot file does not exist");
            return FailureReason::FileNotFound {
                path: path.display().to_string(),
            }
            .into();
        }

        tracing::info!(path = %path.display(), "processing screenshot");
        let image = match decode(path) {
            Ok(image) => image,
            Err(detail) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %detail,
                    "screenshot could not be decoded"
                );
                return FailureReason::UnreadableImage { detail }.into();
            }
        };
        if image.is_empty() {
            return FailureReason::UnreadableImage {
                detail: format!("{} decoded to an empty image", path.display()),
            }
            .into();
        }

        self.recognize_image(image)
    }
}

fn decode(path: &Path) -> Result<ScreenImage, String> {
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| e.to_string())?;
    reader.decode().map(ScreenImage::new).map_err(|e| e.to_string())
}
