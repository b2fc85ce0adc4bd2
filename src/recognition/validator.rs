use serde::{Deserialize, Serialize};

use crate::recognition::types::WorldCoordinate;

/// Approximate half-extent of the playable world, in world units.
pub const DEFAULT_WORLD_LIMIT: f64 = 3000.0;

/// Inclusive square range a recognised coordinate must fall into on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min: -DEFAULT_WORLD_LIMIT,
            max: DEFAULT_WORLD_LIMIT,
        }
    }
}

impl WorldBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, coordinate: &WorldCoordinate) -> bool {
        self.contains_xy(coordinate.x, coordinate.y)
    }

    /// NaN on either axis is never contained.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.min && x <= self.max && y >= self.min && y <= self.max
    }
}

/// Checks `(x, y)` against the default world bounds.
pub fn is_valid_coordinate(x: f64, y: f64) -> bool {
    WorldBounds::default().contains_xy(x, y)
}
