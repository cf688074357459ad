//! Logical-to-physical size bookkeeping for the render canvas.
//!
//! The physical size is always recomputed from the three inputs (logical
//! size, demo scale factor, device pixel ratio) rather than adjusted in
//! place, so a sequence of resizes and scale changes can never drift.

use winit::dpi::{LogicalSize, PhysicalSize};

use crate::error::ViewportError;

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    logical: LogicalSize<f64>,
    scale_factor: f64,
    device_pixel_ratio: f64,
    physical: PhysicalSize<u32>,
    revision: u64,
}

impl Viewport {
    pub fn new(
        logical: impl Into<LogicalSize<f64>>,
        scale_factor: f64,
        device_pixel_ratio: f64,
    ) -> Result<Self, ViewportError> {
        check_scale(scale_factor)?;
        check_ratio(device_pixel_ratio)?;
        let mut viewport = Self {
            logical: logical.into(),
            scale_factor,
            device_pixel_ratio,
            physical: PhysicalSize::new(1, 1),
            revision: 0,
        };
        viewport.recompute();
        Ok(viewport)
    }

    /// Replaces logical size and scale factor together, then recomputes.
    pub fn configure(
        &mut self,
        logical: impl Into<LogicalSize<f64>>,
        scale_factor: f64,
    ) -> Result<PhysicalSize<u32>, ViewportError> {
        check_scale(scale_factor)?;
        self.logical = logical.into();
        self.scale_factor = scale_factor;
        Ok(self.recompute())
    }

    pub fn set_logical_size(&mut self, logical: impl Into<LogicalSize<f64>>) -> PhysicalSize<u32> {
        self.logical = logical.into();
        self.recompute()
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) -> Result<PhysicalSize<u32>, ViewportError> {
        check_scale(scale_factor)?;
        self.scale_factor = scale_factor;
        Ok(self.recompute())
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f64) -> Result<PhysicalSize<u32>, ViewportError> {
        check_ratio(ratio)?;
        self.device_pixel_ratio = ratio;
        Ok(self.recompute())
    }

    /// Derives the physical size from the current inputs. Bumps the revision
    /// when the result differs from the previous physical size.
    pub fn recompute(&mut self) -> PhysicalSize<u32> {
        let factor = self.device_pixel_ratio / self.scale_factor;
        let physical = PhysicalSize::new(
            physical_axis(self.logical.width, factor),
            physical_axis(self.logical.height, factor),
        );
        if physical != self.physical {
            tracing::debug!(
                width = physical.width,
                height = physical.height,
                scale = self.scale_factor,
                dpr = self.device_pixel_ratio,
                "viewport resized"
            );
            self.physical = physical;
            self.revision += 1;
        }
        physical
    }

    pub fn logical_size(&self) -> LogicalSize<f64> {
        self.logical
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    pub fn physical_size(&self) -> PhysicalSize<u32> {
        self.physical
    }

    /// Physical size as the `vec2` most shaders expect for `u_resolution`.
    pub fn resolution(&self) -> [f32; 2] {
        [self.physical.width as f32, self.physical.height as f32]
    }

    /// Increments every time the physical size changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Maps the digit keys to scale factors `2^(d-1)`: `1` is native resolution,
/// each further digit halves it (`2` → 2.0, `3` → 4.0, ...) and `0` renders
/// at twice the display resolution (0.5). Other keys map to nothing.
pub fn scale_factor_for_key(key: char) -> Option<f32> {
    let digit = key.to_digit(10)?;
    Some(2f32.powi(digit as i32 - 1))
}

fn physical_axis(logical: f64, factor: f64) -> u32 {
    if logical.is_nan() || logical <= 0.0 {
        return 1;
    }
    let scaled = (logical * factor).round();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (scaled as u32).max(1)
    }
}

fn check_scale(scale: f64) -> Result<(), ViewportError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(ViewportError::InvalidScaleFactor(scale))
    }
}

fn check_ratio(ratio: f64) -> Result<(), ViewportError> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(())
    } else {
        Err(ViewportError::InvalidPixelRatio(ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_follows_scale_factor() {
        let viewport = Viewport::new(LogicalSize::new(800.0, 600.0), 2.0, 1.0).unwrap();
        assert_eq!(viewport.physical_size(), PhysicalSize::new(400, 300));

        let viewport = Viewport::new(LogicalSize::new(800.0, 600.0), 0.5, 1.0).unwrap();
        assert_eq!(viewport.physical_size(), PhysicalSize::new(1600, 1200));
    }

    #[test]
    fn device_pixel_ratio_multiplies() {
        let viewport = Viewport::new(LogicalSize::new(640.0, 360.0), 2.0, 1.5).unwrap();
        assert_eq!(viewport.physical_size(), PhysicalSize::new(480, 270));
    }

    #[test]
    fn rounding_stays_within_one_pixel() {
        for width in [1.0, 3.0, 7.0, 99.0, 1001.0, 1919.0] {
            for scale in [0.3, 0.5, 1.0, 1.7, 2.0, 3.0, 8.0] {
                let viewport = Viewport::new(LogicalSize::new(width, width), scale, 1.0).unwrap();
                let expected = (width / scale).max(1.0);
                let actual = f64::from(viewport.physical_size().width);
                assert!((actual - expected).abs() <= 1.0, "{width}/{scale} gave {actual}");
                assert!(viewport.physical_size().width >= 1);
            }
        }
    }

    #[test]
    fn degenerate_sizes_clamp_to_one() {
        let mut viewport = Viewport::new(LogicalSize::new(0.0, 0.0), 1.0, 1.0).unwrap();
        assert_eq!(viewport.physical_size(), PhysicalSize::new(1, 1));

        viewport.set_logical_size(LogicalSize::new(0.0, 200.0));
        assert_eq!(viewport.physical_size(), PhysicalSize::new(1, 200));

        // Large scale factors shrink to at least one pixel too.
        viewport.configure(LogicalSize::new(10.0, 10.0), 64.0).unwrap();
        assert_eq!(viewport.physical_size(), PhysicalSize::new(1, 1));
    }

    #[test]
    fn invalid_scale_factors_are_rejected() {
        let mut viewport = Viewport::new(LogicalSize::new(100.0, 100.0), 1.0, 1.0).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                viewport.set_scale_factor(bad),
                Err(ViewportError::InvalidScaleFactor(_))
            ));
        }
        assert!(viewport.set_device_pixel_ratio(0.0).is_err());
        assert!(Viewport::new(LogicalSize::new(1.0, 1.0), -2.0, 1.0).is_err());
        assert_eq!(viewport.scale_factor(), 1.0);
        assert_eq!(viewport.physical_size(), PhysicalSize::new(100, 100));
    }

    #[test]
    fn recompute_is_derived_not_accumulated() {
        let mut viewport = Viewport::new(LogicalSize::new(333.0, 333.0), 1.0, 1.0).unwrap();
        for scale in [3.0, 0.25, 7.0, 1.0] {
            viewport.set_scale_factor(scale).unwrap();
        }
        assert_eq!(viewport.physical_size(), PhysicalSize::new(333, 333));
    }

    #[test]
    fn revision_tracks_physical_changes_only() {
        let mut viewport = Viewport::new(LogicalSize::new(100.0, 100.0), 1.0, 1.0).unwrap();
        let start = viewport.revision();
        viewport.recompute();
        assert_eq!(viewport.revision(), start);
        viewport.set_scale_factor(2.0).unwrap();
        assert_eq!(viewport.revision(), start + 1);
        assert_eq!(viewport.resolution(), [50.0, 50.0]);
    }

    #[test]
    fn digit_keys_map_to_powers_of_two() {
        assert_eq!(scale_factor_for_key('1'), Some(1.0));
        assert_eq!(scale_factor_for_key('2'), Some(2.0));
        assert_eq!(scale_factor_for_key('4'), Some(8.0));
        assert_eq!(scale_factor_for_key('9'), Some(256.0));
        assert_eq!(scale_factor_for_key('0'), Some(0.5));
        assert_eq!(scale_factor_for_key('x'), None);
    }

    #[test]
    fn zero_key_supersamples() {
        let mut viewport = Viewport::new(LogicalSize::new(320.0, 200.0), 1.0, 1.0).unwrap();
        let factor = scale_factor_for_key('0').unwrap();
        let physical = viewport.set_scale_factor(f64::from(factor)).unwrap();
        assert_eq!(physical, PhysicalSize::new(640, 400));
    }
}
