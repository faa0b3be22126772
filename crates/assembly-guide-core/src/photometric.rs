//! Per-channel tone correction applied to rectified samples.

use crate::RectifyError;
use serde::{Deserialize, Serialize};

/// Photometric correction, applied per channel in field order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometricParams {
    /// Multiplicative gain.
    pub exposure: f32,
    /// Additive offset on the 0..255 scale.
    pub brightness: f32,
    /// Contrast factor about mid-grey (128).
    pub contrast: f32,
    /// Gamma; output is `255 * (v / 255)^(1 / gamma)`.
    pub gamma: f32,
}

impl Default for PhotometricParams {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            brightness: 0.0,
            contrast: 1.0,
            gamma: 1.0,
        }
    }
}

impl PhotometricParams {
    pub fn validate(&self) -> Result<(), RectifyError> {
        let ok = self.exposure.is_finite()
            && self.exposure >= 0.0
            && self.brightness.is_finite()
            && self.contrast.is_finite()
            && self.gamma.is_finite()
            && self.gamma > 0.0;
        if ok {
            Ok(())
        } else {
            Err(RectifyError::InvalidPhotometric(*self))
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Run the full chain on one channel value.
    pub fn correct(&self, v: f32) -> f32 {
        let v = v * self.exposure;
        let v = v + self.brightness;
        let v = (v - 128.0) * self.contrast + 128.0;
        let v = v.clamp(0.0, 255.0);
        let v = 255.0 * (v / 255.0).powf(1.0 / self.gamma);
        v.clamp(0.0, 255.0)
    }
}

/// 256-entry lookup of [`PhotometricParams::correct`] on rounded inputs.
#[derive(Clone, Debug)]
pub struct ToneTable {
    lut: [u8; 256],
}

impl ToneTable {
    pub fn new(params: &PhotometricParams) -> Result<Self, RectifyError> {
        params.validate()?;
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = params.correct(i as f32).round() as u8;
        }
        Ok(Self { lut })
    }

    pub fn identity() -> Self {
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self { lut }
    }

    #[inline]
    pub fn map(&self, v: f32) -> u8 {
        self.lut[v.round().clamp(0.0, 255.0) as usize]
    }
}
