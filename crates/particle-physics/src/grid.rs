//! Slot addressing for the N×N simulation grid
//!
//! Slot `i` lives in texel `(i mod N, i / N)`. Every texture the simulation
//! owns uses this row-major layout, so readback by index and sampling from a
//! vertex shader must agree on it.

use glam::{UVec2, Vec2};

/// Fixed-size square grid of particle slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationGrid {
    width: u32,
}

impl SimulationGrid {
    /// Create a grid with `width` columns and `width` rows.
    ///
    /// Returns `None` for a zero width or when `width²` does not fit in a `u32`.
    pub fn new(width: u32) -> Option<Self> {
        if width == 0 || width.checked_mul(width).is_none() {
            return None;
        }
        Some(Self { width })
    }

    /// Edge length N.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of addressable slots (N²).
    pub fn capacity(&self) -> u32 {
        self.width * self.width
    }

    pub fn contains(&self, index: u32) -> bool {
        index < self.capacity()
    }

    /// Texel holding slot `index`, or `None` past capacity.
    pub fn index_to_coord(&self, index: u32) -> Option<UVec2> {
        if !self.contains(index) {
            return None;
        }
        Some(UVec2::new(index % self.width, index / self.width))
    }

    /// Inverse of [`Self::index_to_coord`].
    pub fn coord_to_index(&self, coord: UVec2) -> Option<u32> {
        if coord.x >= self.width || coord.y >= self.width {
            return None;
        }
        Some(coord.y * self.width + coord.x)
    }

    /// Normalized sampling coordinate for slot `index`.
    ///
    /// This is the texel's lower-left corner divided by N, which is what a
    /// point-cloud vertex attribute stores to look the particle up.
    pub fn texel_uv(&self, index: u32) -> Option<Vec2> {
        let coord = self.index_to_coord(index)?;
        Some(coord.as_vec2() / self.width as f32)
    }

    /// Row-major offset of slot `index` into a flat texel array.
    pub fn texel_offset(&self, index: u32) -> Option<usize> {
        self.contains(index).then_some(index as usize)
    }

    /// Every texel coordinate in slot order.
    pub fn coords(&self) -> impl Iterator<Item = UVec2> + '_ {
        (0..self.capacity()).map(move |i| UVec2::new(i % self.width, i / self.width))
    }
}
