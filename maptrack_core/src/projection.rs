//! World to map projection.
//!
//! The map texture is addressed in unit coordinates: `(0, 0)` is its top-left
//! corner and `(1, 1)` the bottom-right. Grids are laid over the same square.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Maps world positions onto the unit map square.
///
/// Implementations must be pure: grids call this once per point, many times
/// per frame.
pub trait MapProjection {
    fn project_world_to_unit(&self, position: &Vector3<f32>) -> Vector2<f32>;

    /// Grid-space coordinates for a `resolution x resolution` grid.
    fn project_to_grid(&self, position: &Vector3<f32>, resolution: usize) -> Vector2<f32> {
        self.project_world_to_unit(position) * resolution as f32
    }

    /// Cell containing `position`, if it falls inside the grid.
    fn cell_of(&self, position: &Vector3<f32>, resolution: usize) -> Option<(usize, usize)> {
        let g = self.project_to_grid(position, resolution);
        let (cx, cy) = (g.x.floor(), g.y.floor());
        let limit = resolution as f32;
        if cx >= 0.0 && cy >= 0.0 && cx < limit && cy < limit {
            Some((cx as usize, cy as usize))
        } else {
            None
        }
    }
}

/// Scale + offset projection; world Y points north, map V points down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearProjection {
    pub scale: Vector2<f32>,
    pub offset: Vector2<f32>,
}

impl Default for LinearProjection {
    fn default() -> Self {
        // One map texel per 205 world units on a 2048 texel map
        let s = 1.0 / (2048.0 * 205.0);
        Self {
            scale: Vector2::new(s, s),
            offset: Vector2::new(0.4766, 0.3760),
        }
    }
}

impl LinearProjection {
    pub fn new(scale: Vector2<f32>, offset: Vector2<f32>) -> Self {
        Self { scale, offset }
    }

    /// Inverse of [`MapProjection::project_world_to_unit`] on the XY plane.
    pub fn unit_to_world(&self, unit: &Vector2<f32>) -> Vector2<f32> {
        Vector2::new(
            (unit.x - self.offset.x) / self.scale.x,
            (self.offset.y - unit.y) / self.scale.y,
        )
    }
}

impl MapProjection for LinearProjection {
    fn project_world_to_unit(&self, position: &Vector3<f32>) -> Vector2<f32> {
        Vector2::new(
            self.offset.x + position.x * self.scale.x,
            self.offset.y - position.y * self.scale.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_world_origin_maps_to_offset() {
        let proj = LinearProjection::default();
        let unit = proj.project_world_to_unit(&Vector3::zeros());
        assert_relative_eq!(unit.x, 0.4766);
        assert_relative_eq!(unit.y, 0.3760);
    }

    #[test]
    fn test_north_is_up() {
        let proj = LinearProjection::new(Vector2::new(0.01, 0.01), Vector2::new(0.5, 0.5));
        let unit = proj.project_world_to_unit(&Vector3::new(10.0, 10.0, 99.0));
        assert_relative_eq!(unit.x, 0.6, epsilon = 1e-6);
        assert_relative_eq!(unit.y, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_unit_to_world_inverts_projection() {
        let proj = LinearProjection::default();
        let world = Vector3::new(-12_000.0, 48_000.0, 3.0);
        let back = proj.unit_to_world(&proj.project_world_to_unit(&world));
        assert_relative_eq!(back.x, world.x, max_relative = 1e-3);
        assert_relative_eq!(back.y, world.y, max_relative = 1e-3);
    }

    #[test]
    fn test_cell_of() {
        let proj = LinearProjection::new(Vector2::new(0.01, 0.01), Vector2::new(0.5, 0.5));
        assert_eq!(proj.cell_of(&Vector3::zeros(), 10), Some((5, 5)));
        assert_eq!(proj.cell_of(&Vector3::new(-49.0, 49.0, 0.0), 10), Some((0, 0)));
        assert_eq!(proj.cell_of(&Vector3::new(60.0, 0.0, 0.0), 10), None);
    }
}
