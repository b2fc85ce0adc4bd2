use std::panic::{self, AssertUnwindSafe};

use image::GrayImage;

use crate::errors::{MapFixError, MapFixResult};
use crate::recognition::types::{ImageCoordinate, MapFragment};

/// Big-map positional matcher: finds a grayscale fragment on the reference map.
///
/// Implementations return the fragment's position in reference-map pixels and
/// use exactly `(0, 0)` to mean "not found". Any internal caches are the
/// implementation's responsibility to synchronise.
pub trait BigMapMatcher: Send + Sync {
    fn match_position(&self, fragment: &GrayImage) -> MapFixResult<ImageCoordinate>;
}

impl<F> BigMapMatcher for F
where
    F: Fn(&GrayImage) -> MapFixResult<ImageCoordinate> + Send + Sync,
{
    fn match_position(&self, fragment: &GrayImage) -> MapFixResult<ImageCoordinate> {
        self(fragment)
    }
}

/// Owns a matcher and turns its sentinel convention into an `Option`.
pub struct MatcherAdapter {
    matcher: Box<dyn BigMapMatcher>,
}

impl MatcherAdapter {
    pub fn new(matcher: impl BigMapMatcher + 'static) -> Self {
        Self {
            matcher: Box::new(matcher),
        }
    }

    /// `Ok(None)` when the matcher reported the sentinel.
    ///
    /// Errors and panics raised by the matcher, and non-finite coordinates,
    /// come back as `MapFixError::Matcher`. The fragment is released on return.
    pub fn locate(&self, fragment: MapFragment) -> MapFixResult<Option<ImageCoordinate>> {
        let gray = fragment.into_gray();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.matcher.match_position(&gray)));
        drop(gray);

        let coordinate = match result {
            Ok(Ok(coordinate)) => coordinate,
            Ok(Err(MapFixError::Matcher(msg))) => return Err(MapFixError::Matcher(msg)),
            Ok(Err(e)) => return Err(MapFixError::Matcher(e.to_string())),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "matcher panicked".to_string());
                return Err(MapFixError::Matcher(format!("panic: {msg}")));
            }
        };

        if coordinate.is_sentinel() {
            return Ok(None);
        }
        if !coordinate.is_finite() {
            return Err(MapFixError::Matcher(format!(
                "non-finite coordinate ({}, {})",
                coordinate.x, coordinate.y
            )));
        }
        Ok(Some(coordinate))
    }
}

impl std::fmt::Debug for MatcherAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherAdapter").finish_non_exhaustive()
    }
}
