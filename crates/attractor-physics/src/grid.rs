//! Initial particle placement

use glam::Vec4;

use crate::constants::GRID_EXTENT;
use crate::error::PhysicsError;

/// Regular `resolution³` lattice spanning `[0, 2]³`.
///
/// Spacing is `2 / (resolution - 1)`. Points are emitted in nested-loop
/// order (outer x, middle y, inner z), each with `w = 1`. A resolution of 1
/// yields the single point at the origin.
pub fn initial_grid(resolution: u32) -> Result<Vec<Vec4>, PhysicsError> {
    if resolution == 0 {
        return Err(PhysicsError::EmptyGrid);
    }

    let spacing = if resolution > 1 {
        GRID_EXTENT / (resolution - 1) as f32
    } else {
        0.0
    };

    let n = resolution as usize;
    let mut positions = Vec::with_capacity(n * n * n);
    for i in 0..resolution {
        for j in 0..resolution {
            for k in 0..resolution {
                positions.push(Vec4::new(
                    spacing * i as f32,
                    spacing * j as f32,
                    spacing * k as f32,
                    1.0,
                ));
            }
        }
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_per_axis_grid_covers_each_point_once_in_loop_order() {
        let grid = initial_grid(3).unwrap();
        assert_eq!(grid.len(), 27);

        let coords = [0.0, 1.0, 2.0];
        let mut index = 0;
        for x in coords {
            for y in coords {
                for z in coords {
                    assert_eq!(grid[index], Vec4::new(x, y, z, 1.0), "index {index}");
                    index += 1;
                }
            }
        }

        for (a, p) in grid.iter().enumerate() {
            assert_eq!(grid.iter().filter(|q| *q == p).count(), 1, "duplicate at {a}");
        }
    }

    #[test]
    fn reference_grid_spans_cube() {
        let grid = initial_grid(100).unwrap();
        assert_eq!(grid.len(), 1_000_000);
        assert_eq!(grid[0], Vec4::new(0.0, 0.0, 0.0, 1.0));

        let last = grid[grid.len() - 1];
        for c in [last.x, last.y, last.z] {
            assert!((c - 2.0).abs() < 1e-5, "{last:?}");
        }
    }

    #[test]
    fn degenerate_resolutions() {
        assert_eq!(initial_grid(0), Err(PhysicsError::EmptyGrid));
        assert_eq!(initial_grid(1).unwrap(), vec![Vec4::new(0.0, 0.0, 0.0, 1.0)]);
    }
}
