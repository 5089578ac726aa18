//! Look-at camera producing primary rays from [`CameraSample`]s.

use crate::sampler::CameraSample;
use tessera_math::{Bounds2, Ray, UVec2, Vec2, Vec3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CameraError {
    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("vertical field of view must be in (0, 180) degrees, got {0}")]
    InvalidFov(f32),

    #[error("focus distance must be positive, got {0}")]
    InvalidFocusDistance(f32),

    #[error("look-from equals look-at, or up is parallel to the view direction")]
    DegenerateView,
}

/// Pinhole or thin-lens camera looking at a point.
#[derive(Debug, Clone)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view, degrees
    vfov: f32,
    /// Cone angle of the lens, degrees; 0 is a pinhole
    defocus_angle: f32,
    focus_dist: f32,

    // Derived in initialize()
    center: Vec3,
    viewport_upper_left: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    u: Vec3,
    v: Vec3,
    w: Vec3,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,
}

impl Camera {
    /// 320x240 pinhole at the origin looking down `-z`, 90 degree field of view.
    pub fn new() -> Self {
        Self {
            image_width: 320,
            image_height: 240,
            look_from: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            vup: Vec3::Y,
            vfov: 90.0,
            defocus_angle: 0.0,
            focus_dist: 1.0,
            center: Vec3::ZERO,
            viewport_upper_left: Vec3::ZERO,
            pixel_delta_u: Vec3::ZERO,
            pixel_delta_v: Vec3::ZERO,
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
            defocus_disk_u: Vec3::ZERO,
            defocus_disk_v: Vec3::ZERO,
        }
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set lens settings.
    pub fn with_lens(mut self, vfov: f32, defocus_angle: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self
    }

    /// Initialize and return the camera.
    pub fn build(mut self) -> Result<Self, CameraError> {
        self.initialize()?;
        Ok(self)
    }

    /// Validate the settings and compute the view basis. Must be called
    /// before generating rays.
    pub fn initialize(&mut self) -> Result<(), CameraError> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(CameraError::InvalidResolution {
                width: self.image_width,
                height: self.image_height,
            });
        }
        if !(self.vfov > 0.0 && self.vfov < 180.0) {
            return Err(CameraError::InvalidFov(self.vfov));
        }
        if !(self.focus_dist > 0.0) {
            return Err(CameraError::InvalidFocusDistance(self.focus_dist));
        }

        self.center = self.look_from;

        // Viewport sits on the focus plane
        let half_height = (self.vfov.to_radians() * 0.5).tan();
        let viewport_height = 2.0 * half_height * self.focus_dist;
        let aspect = self.image_width as f32 / self.image_height as f32;
        let viewport_width = viewport_height * aspect;

        self.w = (self.look_from - self.look_at).try_normalize().ok_or(CameraError::DegenerateView)?;
        self.u = self.vup.cross(self.w).try_normalize().ok_or(CameraError::DegenerateView)?;
        self.v = self.w.cross(self.u);

        let viewport_u = viewport_width * self.u;
        let viewport_v = -viewport_height * self.v;

        self.pixel_delta_u = viewport_u / self.image_width as f32;
        self.pixel_delta_v = viewport_v / self.image_height as f32;

        // Film position (0, 0) is the upper-left corner of pixel (0, 0)
        self.viewport_upper_left = self.center - self.focus_dist * self.w - viewport_u / 2.0 - viewport_v / 2.0;

        let defocus_radius = self.focus_dist * (self.defocus_angle / 2.0).to_radians().tan();
        self.defocus_disk_u = self.u * defocus_radius;
        self.defocus_disk_v = self.v * defocus_radius;

        log::debug!(
            "Camera initialized: {}x{}, vfov {}, from {:?} to {:?}",
            self.image_width,
            self.image_height,
            self.vfov,
            self.look_from,
            self.look_at
        );
        Ok(())
    }

    /// Primary ray through `sample.film` (continuous pixel coordinates).
    /// The direction is unit length.
    pub fn generate_ray(&self, sample: &CameraSample) -> Ray {
        let pixel_sample =
            self.viewport_upper_left + sample.film.x * self.pixel_delta_u + sample.film.y * self.pixel_delta_v;

        let ray_origin = if self.defocus_angle <= 0.0 {
            self.center
        } else {
            let p = sample_unit_disk(sample.lens);
            self.center + p.x * self.defocus_disk_u + p.y * self.defocus_disk_v
        };

        Ray::new(ray_origin, (pixel_sample - ray_origin).normalize_or_zero(), sample.time)
    }

    /// Pixels the integrator must cover.
    pub fn sample_bounds(&self) -> Bounds2 {
        Bounds2::from_size(self.image_width, self.image_height)
    }

    pub fn film_size(&self) -> UVec2 {
        UVec2::new(self.image_width, self.image_height)
    }

    pub fn look_from(&self) -> Vec3 {
        self.look_from
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Concentric mapping of the unit square onto the unit disk.
fn sample_unit_disk(u: Vec2) -> Vec2 {
    let offset = 2.0 * u - Vec2::ONE;
    if offset == Vec2::ZERO {
        return Vec2::ZERO;
    }

    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, std::f32::consts::FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (
            offset.y,
            std::f32::consts::FRAC_PI_2 - std::f32::consts::FRAC_PI_4 * (offset.x / offset.y),
        )
    };
    r * Vec2::new(theta.cos(), theta.sin())
}
