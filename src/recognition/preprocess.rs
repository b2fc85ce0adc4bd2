/// Screenshot normalisation ahead of matching.
///
/// The whole screenshot is treated as the map. Oversized captures are shrunk
/// with a single uniform factor so the later affine mapping stays undistorted,
/// then reduced to luminance.
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::recognition::types::{FailureReason, MapFragment, ScreenImage};

pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    max_dimension: u32,
    filter: ResizeFilter,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl Preprocessor {
    /// `max_dimension` is clamped to at least one pixel.
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            filter: ResizeFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Output size for a `width`×`height` input, or `None` when no resize is needed.
    pub fn target_size(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let max = self.max_dimension;
        if width <= max && height <= max {
            return None;
        }
        let scale = (max as f64 / width as f64).min(max as f64 / height as f64);
        let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max);
        Some((scaled(width), scaled(height)))
    }

    pub fn prepare(&self, raw: ScreenImage) -> Result<MapFragment, FailureReason> {
        if raw.is_empty() {
            return Err(FailureReason::EmptyMapRegion);
        }

        let (width, height) = (raw.width(), raw.height());
        let image = raw.into_dynamic();
        let image = match self.target_size(width, height) {
            Some((w, h)) => {
                tracing::debug!(
                    from_w = width,
                    from_h = height,
                    to_w = w,
                    to_h = h,
                    "downscaling screenshot"
                );
                image.resize_exact(w, h, self.filter.into())
            }
            None => image,
        };

        let gray = image.into_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(FailureReason::EmptyMapRegion);
        }
        Ok(MapFragment::new(gray))
    }
}
