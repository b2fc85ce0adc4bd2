use std::fmt;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Decoded screenshot. Owned by whichever stage currently holds it.
#[derive(Debug, Clone)]
pub struct ScreenImage {
    image: DynamicImage,
}

impl ScreenImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// True when the raster has zero area.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }
}

impl From<DynamicImage> for ScreenImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Grayscale, size-bounded portion of a screenshot submitted to the matcher.
#[derive(Debug, Clone)]
pub struct MapFragment {
    gray: GrayImage,
}

impl MapFragment {
    pub(crate) fn new(gray: GrayImage) -> Self {
        Self { gray }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn into_gray(self) -> GrayImage {
        self.gray
    }
}

/// Position in the reference map's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageCoordinate {
    pub x: f64,
    pub y: f64,
}

impl ImageCoordinate {
    /// Value a big-map matcher returns when it found nothing.
    pub const SENTINEL: ImageCoordinate = ImageCoordinate { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_sentinel(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Position in the game's world-map coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldCoordinate {
    pub x: f64,
    pub y: f64,
}

impl WorldCoordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Renders as `x,y` with one decimal place, the format downstream tools paste.
impl fmt::Display for WorldCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1},{:.1}", self.x, self.y)
    }
}

/// Why a recognition did not produce a position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    FileNotFound { path: String },
    UnreadableImage { detail: String },
    EmptyMapRegion,
    NoMatch,
    /// The match converted cleanly but lies outside the playable world.
    OutOfBounds { coordinate: WorldCoordinate },
    InternalError { detail: String },
}

impl FailureReason {
    /// Stable snake_case tag, identical to the serialized `kind`.
    pub fn tag(&self) -> &'static str {
        match self {
            FailureReason::FileNotFound { .. } => "file_not_found",
            FailureReason::UnreadableImage { .. } => "unreadable_image",
            FailureReason::EmptyMapRegion => "empty_map_region",
            FailureReason::NoMatch => "no_match",
            FailureReason::OutOfBounds { .. } => "out_of_bounds",
            FailureReason::InternalError { .. } => "internal_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::FileNotFound { path } => {
                write!(f, "{}: screenshot file does not exist: {path:?}", self.tag())
            }
            FailureReason::UnreadableImage { detail } => {
                write!(f, "{}: {detail}", self.tag())
            }
            FailureReason::EmptyMapRegion => {
                write!(f, "{}: no map region in screenshot", self.tag())
            }
            FailureReason::NoMatch => {
                write!(f, "{}: map fragment not found on reference map", self.tag())
            }
            FailureReason::OutOfBounds { coordinate } => {
                write!(f, "{}: {coordinate} is outside the world bounds", self.tag())
            }
            FailureReason::InternalError { detail } => write!(f, "{}: {detail}", self.tag()),
        }
    }
}

/// Result of a single recognition request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecognitionOutcome {
    Success { coordinate: WorldCoordinate },
    Failure { reason: FailureReason },
}

impl RecognitionOutcome {
    pub fn success(coordinate: WorldCoordinate) -> Self {
        RecognitionOutcome::Success { coordinate }
    }

    pub fn failure(reason: FailureReason) -> Self {
        RecognitionOutcome::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecognitionOutcome::Success { .. })
    }

    /// The accepted coordinate, `None` for every failure including out-of-bounds.
    pub fn coordinate(&self) -> Option<WorldCoordinate> {
        match self {
            RecognitionOutcome::Success { coordinate } => Some(*coordinate),
            RecognitionOutcome::Failure { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            RecognitionOutcome::Success { .. } => None,
            RecognitionOutcome::Failure { reason } => Some(reason),
        }
    }
}

impl From<FailureReason> for RecognitionOutcome {
    fn from(reason: FailureReason) -> Self {
        RecognitionOutcome::failure(reason)
    }
}

impl fmt::Display for RecognitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionOutcome::Success { coordinate } => write!(f, "{coordinate}"),
            RecognitionOutcome::Failure { reason } => write!(f, "error: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_coordinate_formats_one_decimal_no_spaces() {
        assert_eq!(WorldCoordinate::new(1234.56, -78.04).to_string(), "1234.6,-78.0");
        assert_eq!(WorldCoordinate::new(0.0, 0.0).to_string(), "0.0,0.0");
    }

    #[test]
    fn sentinel_is_exact_origin_only() {
        assert!(ImageCoordinate::SENTINEL.is_sentinel());
        assert!(ImageCoordinate::new(-0.0, 0.0).is_sentinel());
        assert!(!ImageCoordinate::new(0.0, 0.5).is_sentinel());
        assert!(!ImageCoordinate::new(1e-9, 0.0).is_sentinel());
    }

    #[test]
    fn empty_screen_image() {
        let img = ScreenImage::new(DynamicImage::new_luma8(0, 10));
        assert!(img.is_empty());
        let img = ScreenImage::new(DynamicImage::new_rgb8(3, 2));
        assert!(!img.is_empty());
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn out_of_bounds_keeps_coordinate_but_is_not_success() {
        let outcome = RecognitionOutcome::failure(FailureReason::OutOfBounds {
            coordinate: WorldCoordinate::new(3500.0, 12.0),
        });
        assert!(!outcome.is_success());
        assert_eq!(outcome.coordinate(), None);
        assert_eq!(outcome.reason().map(FailureReason::tag), Some("out_of_bounds"));
        assert_eq!(
            outcome.to_string(),
            "error: out_of_bounds: 3500.0,12.0 is outside the world bounds"
        );
    }

    #[test]
    fn outcome_serializes_with_status_and_kind() {
        let ok = RecognitionOutcome::success(WorldCoordinate::new(1.0, 2.0));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "success", "coordinate": {"x": 1.0, "y": 2.0}})
        );

        let miss = RecognitionOutcome::failure(FailureReason::NoMatch);
        assert_eq!(
            serde_json::to_value(&miss).unwrap(),
            serde_json::json!({"status": "failure", "reason": {"kind": "no_match"}})
        );
    }

    #[test]
    fn tags_match_serialized_kind() {
        let reasons = [
            FailureReason::FileNotFound { path: "a".into() },
            FailureReason::UnreadableImage { detail: "b".into() },
            FailureReason::EmptyMapRegion,
            FailureReason::NoMatch,
            FailureReason::OutOfBounds {
                coordinate: WorldCoordinate::new(0.0, 0.0),
            },
            FailureReason::InternalError { detail: "c".into() },
        ];
        for reason in reasons {
            let value = serde_json::to_value(&reason).unwrap();
            assert_eq!(value["kind"], reason.tag());
        }
    }
}
