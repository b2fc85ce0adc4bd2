use serde::{Deserialize, Serialize};

use crate::recognition::types::{ImageCoordinate, WorldCoordinate};

/// Affine parameters tying reference-map pixels to world units.
///
/// `world = image * scale + offset`, each axis independent. The values belong
/// to the reference map data; the default is the identity mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Calibration {
    pub fn new(scale_x: f64, scale_y: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale_x,
            scale_y,
            offset_x,
            offset_y,
        }
    }

    pub fn image_to_world(&self, img: ImageCoordinate) -> WorldCoordinate {
        WorldCoordinate::new(
            img.x * self.scale_x + self.offset_x,
            img.y * self.scale_y + self.offset_y,
        )
    }

    /// Both scales must be finite and non-zero, offsets finite.
    pub fn is_usable(&self) -> bool {
        [self.scale_x, self.scale_y].iter().all(|s| s.is_finite() && *s != 0.0)
            && self.offset_x.is_finite()
            && self.offset_y.is_finite()
    }
}

/// Stateless image-space to world-space conversion. Range policy lives in the validator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateTransformer {
    calibration: Calibration,
}

impl CoordinateTransformer {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn to_world(&self, img: ImageCoordinate) -> WorldCoordinate {
        self.calibration.image_to_world(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identity_by_default() {
        let t = CoordinateTransformer::default();
        assert_eq!(
            t.to_world(ImageCoordinate::new(12.5, -3.0)),
            WorldCoordinate::new(12.5, -3.0)
        );
    }

    #[test]
    fn axes_are_independent() {
        let t = CoordinateTransformer::new(Calibration::new(0.5, -2.0, -100.0, 40.0));
        let w = t.to_world(ImageCoordinate::new(200.0, 10.0));
        assert_eq!(w, WorldCoordinate::new(0.0, 20.0));
    }

    #[test]
    fn usable_rejects_degenerate_scale() {
        assert!(Calibration::default().is_usable());
        assert!(!Calibration::new(0.0, 1.0, 0.0, 0.0).is_usable());
        assert!(!Calibration::new(1.0, f64::INFINITY, 0.0, 0.0).is_usable());
        assert!(!Calibration::new(1.0, 1.0, f64::NAN, 0.0).is_usable());
    }

    #[test]
    fn partial_calibration_fills_defaults() {
        let c: Calibration = toml::from_str("scale_x = 2.0\noffset_y = -5.0").unwrap();
        assert_eq!(c, Calibration::new(2.0, 1.0, 0.0, -5.0));
    }

    proptest! {
        #[test]
        fn finite_in_finite_out(
            x in -1.0e6f64..1.0e6,
            y in -1.0e6f64..1.0e6,
            sx in -100.0f64..100.0,
            sy in -100.0f64..100.0,
            ox in -1.0e5f64..1.0e5,
            oy in -1.0e5f64..1.0e5,
        ) {
            let t = CoordinateTransformer::new(Calibration::new(sx, sy, ox, oy));
            prop_assert!(t.to_world(ImageCoordinate::new(x, y)).is_finite());
        }
    }
}
