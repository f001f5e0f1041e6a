//! Cylindrical tile grid addressing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("{field} has {actual} entries, expected {expected} for a {width}x{height} grid")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
    #[error("grid must have a non-zero width and height, got {width}x{height}")]
    Empty { width: u32, height: u32 },
}

impl GridDims {
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::Empty { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn coords(&self, index: usize) -> (u32, u32) {
        let width = self.width as usize;
        ((index % width) as u32, (index / width) as u32)
    }

    /// Wrap a signed column onto the cylinder.
    pub fn wrap_x(&self, x: i64) -> u32 {
        x.rem_euclid(self.width as i64) as u32
    }

    /// Check that a per-tile array covers the whole grid.
    pub fn check_len(&self, field: &'static str, actual: usize) -> Result<(), GridError> {
        if actual != self.len() {
            return Err(GridError::LengthMismatch {
                field,
                expected: self.len(),
                actual,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Tiles in the square window of `radius` around `(x, y)`, excluding the
    /// centre. Columns wrap; rows are clipped at the poles.
    pub fn neighborhood(&self, x: u32, y: u32, radius: u32) -> Neighborhood {
        // Windows wider than the map would revisit columns.
        let radius = radius as i64;
        let west = radius.min((self.width as i64 - 1) / 2);
        let east = radius.min(self.width as i64 - 1 - west);
        Neighborhood {
            dims: *self,
            cx: x as i64,
            cy: y as i64,
            radius,
            west,
            east,
            dx: -west,
            dy: -radius,
        }
    }

    /// Iterate every `(x, y)` in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32)> {
        let width = self.width;
        (0..self.height).flat_map(move |y| (0..width).map(move |x| (x, y)))
    }
}

#[derive(Debug, Clone)]
pub struct Neighborhood {
    dims: GridDims,
    cx: i64,
    cy: i64,
    radius: i64,
    west: i64,
    east: i64,
    dx: i64,
    dy: i64,
}

impl Iterator for Neighborhood {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.dy > self.radius {
                return None;
            }
            let (dx, dy) = (self.dx, self.dy);
            if self.dx >= self.east {
                self.dx = -self.west;
                self.dy += 1;
            } else {
                self.dx += 1;
            }
            if dx == 0 && dy == 0 {
                continue;
            }
            let ny = self.cy + dy;
            if ny < 0 || ny >= self.dims.height as i64 {
                continue;
            }
            return Some((self.dims.wrap_x(self.cx + dx), ny as u32));
        }
    }
}
