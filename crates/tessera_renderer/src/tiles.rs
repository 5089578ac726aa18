//! Tile grid over the image.
//!
//! Divides the sample bounds into square tiles that are rendered
//! independently, one tile per parallel work item. Edge tiles are clipped
//! to the bounds, so tiles never overlap and together cover every pixel.

use tessera_math::{Bounds2, UVec2};

/// Default tile edge in pixels.
pub const TILE_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    bounds: Bounds2,
    tile_size: u32,
    count: UVec2,
}

impl TileGrid {
    /// Grid of `tile_size` tiles (at least 1 pixel) covering `bounds`.
    pub fn new(bounds: Bounds2, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        let count = UVec2::new(
            bounds.width().div_ceil(tile_size),
            bounds.height().div_ceil(tile_size),
        );
        Self { bounds, tile_size, count }
    }

    /// Tiles along x and y.
    pub fn count(&self) -> UVec2 {
        self.count
    }

    pub fn tile_count(&self) -> usize {
        self.count.x as usize * self.count.y as usize
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn bounds(&self) -> Bounds2 {
        self.bounds
    }

    /// Pixel bounds of the tile at grid position `tile`, clipped to the image.
    pub fn tile_bounds(&self, tile: UVec2) -> Bounds2 {
        let min = self.bounds.min + tile * self.tile_size;
        let max = (min + UVec2::splat(self.tile_size)).min(self.bounds.max);
        Bounds2::new(min, max)
    }

    /// Every tile in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Bounds2> + '_ {
        let count = self.count;
        (0..count.y).flat_map(move |y| (0..count.x).map(move |x| self.tile_bounds(UVec2::new(x, y))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiles_exact_fit() {
        let grid = TileGrid::new(Bounds2::from_size(128, 128), 64);
        assert_eq!(grid.count(), UVec2::new(2, 2));

        let total_pixels: usize = grid.tiles().map(|t| t.area()).sum();
        assert_eq!(total_pixels, 128 * 128);
    }

    #[test]
    fn test_tiles_partial_fit() {
        let grid = TileGrid::new(Bounds2::from_size(100, 37), TILE_SIZE);
        assert_eq!(grid.count(), UVec2::new(7, 3));
        assert_eq!(grid.tile_count(), 21);

        let total_pixels: usize = grid.tiles().map(|t| t.area()).sum();
        assert_eq!(total_pixels, 100 * 37);

        let corner = grid.tile_bounds(UVec2::new(6, 2));
        assert_eq!(corner.min, UVec2::new(96, 32));
        assert_eq!(corner.max, UVec2::new(100, 37));
    }

    #[test]
    fn test_tiles_are_disjoint() {
        let image = Bounds2::from_size(50, 33);
        let grid = TileGrid::new(image, 16);
        let mut owner = vec![0u32; image.area()];
        for tile in grid.tiles() {
            assert!(!tile.is_degenerate());
            for p in tile.pixels() {
                owner[image.offset(p)] += 1;
            }
        }
        assert!(owner.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_offset_bounds() {
        let bounds = Bounds2::new(UVec2::new(10, 20), UVec2::new(30, 30));
        let grid = TileGrid::new(bounds, 16);
        assert_eq!(grid.count(), UVec2::new(2, 1));
        assert_eq!(grid.tile_bounds(UVec2::new(1, 0)), Bounds2::new(UVec2::new(26, 20), UVec2::new(30, 30)));
    }

    #[test]
    fn test_empty_bounds_have_no_tiles() {
        let grid = TileGrid::new(Bounds2::from_size(0, 10), 16);
        assert_eq!(grid.tile_count(), 0);
        assert_eq!(grid.tiles().count(), 0);
    }
}
