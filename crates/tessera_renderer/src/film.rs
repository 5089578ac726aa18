//! Film: the image-wide sample accumulator.
//!
//! Workers never write to the film per sample. Each tile is rendered into a
//! private [`FilmTile`] obtained from [`Film::get_tile`] and merged back once
//! with [`Film::merge_tile`], which is the only point of contention.

use crate::material::Color;
use crate::ppm;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tessera_math::{Bounds2, UVec2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilmError {
    #[error("invalid film dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("tile bounds {0:?} do not overlap the film")]
    DegenerateBounds(Bounds2),

    #[error("tile {tile:?} lies outside the film {film:?}")]
    TileOutOfBounds { tile: Bounds2, film: Bounds2 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Running sum of the samples landing on one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilmPixel {
    pub sum: Color,
    pub samples: u32,
}

impl FilmPixel {
    /// Mean radiance, or black when nothing was recorded.
    pub fn average(&self) -> Color {
        if self.samples == 0 {
            Color::ZERO
        } else {
            self.sum / self.samples as f32
        }
    }
}

/// Private accumulation buffer for one tile.
#[derive(Debug, Clone)]
pub struct FilmTile {
    bounds: Bounds2,
    pixels: Vec<FilmPixel>,
}

impl FilmTile {
    pub fn bounds(&self) -> Bounds2 {
        self.bounds
    }

    /// Add one radiance sample to `pixel` (in film coordinates).
    ///
    /// Non-finite samples count as black so a single bad path cannot poison
    /// the pixel.
    pub fn add_sample(&mut self, pixel: UVec2, radiance: Color) {
        debug_assert!(self.bounds.contains(pixel), "pixel {:?} outside tile {:?}", pixel, self.bounds);
        let radiance = if radiance.is_finite() { radiance } else { Color::ZERO };
        let px = &mut self.pixels[self.bounds.offset(pixel)];
        px.sum += radiance;
        px.samples += 1;
    }

    pub fn pixel(&self, pixel: UVec2) -> FilmPixel {
        self.pixels[self.bounds.offset(pixel)]
    }
}

/// Image-wide accumulator shared by every render thread.
#[derive(Debug)]
pub struct Film {
    width: u32,
    height: u32,
    pixels: Mutex<Vec<FilmPixel>>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Result<Self, FilmError> {
        if width == 0 || height == 0 {
            return Err(FilmError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: Mutex::new(vec![FilmPixel::default(); width as usize * height as usize]),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn bounds(&self) -> Bounds2 {
        Bounds2::from_size(self.width, self.height)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FilmPixel>> {
        self.pixels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Empty tile buffer covering `bounds` clipped to the film.
    pub fn get_tile(&self, bounds: Bounds2) -> Result<FilmTile, FilmError> {
        let clipped = self.bounds().intersect(&bounds);
        if clipped.is_degenerate() {
            return Err(FilmError::DegenerateBounds(bounds));
        }
        Ok(FilmTile {
            bounds: clipped,
            pixels: vec![FilmPixel::default(); clipped.area()],
        })
    }

    /// Add a finished tile's samples into the film.
    pub fn merge_tile(&self, tile: FilmTile) -> Result<(), FilmError> {
        let film_bounds = self.bounds();
        if !film_bounds.contains_bounds(&tile.bounds) {
            return Err(FilmError::TileOutOfBounds {
                tile: tile.bounds,
                film: film_bounds,
            });
        }

        let mut pixels = self.lock();
        for (p, tile_px) in tile.bounds.pixels().zip(tile.pixels.iter()) {
            let px = &mut pixels[film_bounds.offset(p)];
            px.sum += tile_px.sum;
            px.samples += tile_px.samples;
        }
        Ok(())
    }

    /// Accumulated state of one pixel, or `None` outside the film.
    pub fn pixel(&self, x: u32, y: u32) -> Option<FilmPixel> {
        let bounds = self.bounds();
        let p = UVec2::new(x, y);
        if !bounds.contains(p) {
            return None;
        }
        Some(self.lock()[bounds.offset(p)])
    }

    /// Total samples merged so far.
    pub fn sample_count(&self) -> u64 {
        self.lock().iter().map(|p| p.samples as u64).sum()
    }

    /// Reset every pixel to zero samples.
    pub fn clear(&self) {
        self.lock().iter_mut().for_each(|p| *p = FilmPixel::default());
    }

    /// Row-major `width * height * 3` buffer of averaged radiance clamped to `[0, 1]`.
    pub fn to_rgb_buffer(&self) -> Vec<f32> {
        let pixels = self.lock();
        pixels
            .par_iter()
            .flat_map_iter(|p| p.average().clamp(Color::ZERO, Color::ONE).to_array())
            .collect()
    }

    /// Gamma encoded 8-bit triples, row-major.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let pixels = self.lock();
        pixels
            .par_iter()
            .flat_map_iter(|p| p.average().to_array().map(ppm::to_byte))
            .collect()
    }

    pub fn write_ppm(&self, path: impl AsRef<Path>) -> Result<(), FilmError> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_ppm_to(BufWriter::new(file))?;
        log::info!("Wrote {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }

    pub fn write_ppm_to<W: Write>(&self, writer: W) -> Result<(), FilmError> {
        ppm::write_ppm(writer, self.width, self.height, &self.to_rgb8())?;
        Ok(())
    }
}
