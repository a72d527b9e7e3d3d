//! Noise calibration lookup.

use crate::detector::ModuleId;
use crate::error::{Error, Result};

/// Per-strip noise lookup provided by the conditions framework.
pub trait NoiseCalibration: Send + Sync {
    /// Returns the calibrated noise of `strip` on `module`.
    ///
    /// # Errors
    /// Returns [`Error::CalibrationMissing`] when the module or strip is
    /// not calibrated.
    fn noise(&self, module: ModuleId, strip: u32) -> Result<f32>;
}

impl<C: NoiseCalibration + ?Sized> NoiseCalibration for &C {
    fn noise(&self, module: ModuleId, strip: u32) -> Result<f32> {
        (**self).noise(module, strip)
    }
}

/// Same noise for every strip of every module.
///
/// Handy for tests and for runs without conditions.
#[derive(Debug, Clone, Copy)]
pub struct UniformNoise(pub f32);

impl NoiseCalibration for UniformNoise {
    fn noise(&self, _module: ModuleId, _strip: u32) -> Result<f32> {
        Ok(self.0)
    }
}

/// Calibration that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalibration;

impl NoiseCalibration for NoCalibration {
    fn noise(&self, module: ModuleId, strip: u32) -> Result<f32> {
        Err(Error::CalibrationMissing { module, strip })
    }
}
