use crate::UVec2;

/// Half-open integer pixel region `[min, max)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Bounds2 {
    pub min: UVec2,
    pub max: UVec2,
}

impl Bounds2 {
    pub fn new(min: UVec2, max: UVec2) -> Self {
        Self { min, max }
    }

    /// Region covering a whole `width x height` image.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(UVec2::ZERO, UVec2::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.max.x.saturating_sub(self.min.x)
    }

    pub fn height(&self) -> u32 {
        self.max.y.saturating_sub(self.min.y)
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// No pixels inside.
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, p: UVec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Overlap of two regions (degenerate when they are disjoint).
    pub fn intersect(&self, other: &Bounds2) -> Bounds2 {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max).max(min);
        Bounds2::new(min, max)
    }

    /// True if `other` lies entirely within this region.
    pub fn contains_bounds(&self, other: &Bounds2) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = UVec2> {
        let (min, max) = (self.min, self.max);
        (min.y..max.y).flat_map(move |y| (min.x..max.x).map(move |x| UVec2::new(x, y)))
    }

    /// Row-major index of `p` relative to this region's origin.
    pub fn offset(&self, p: UVec2) -> usize {
        (p.y - self.min.y) as usize * self.width() as usize + (p.x - self.min.x) as usize
    }
}
