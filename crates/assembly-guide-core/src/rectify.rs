use crate::{
    BilinearTap, CalibrationError, CalibrationQuad, CanonicalImage, CanonicalSize, Homography,
    PhotometricParams, RgbImageView, ToneTable,
};
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum RectifyError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("frame is {got_w}x{got_h}, rectifier was built for {expected_w}x{expected_h}")]
    FrameSizeMismatch {
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },
    #[error("frame buffer has {got} bytes, expected {expected}")]
    InvalidFrameBuffer { expected: usize, got: usize },
    #[error("invalid photometric parameters: {0:?}")]
    InvalidPhotometric(PhotometricParams),
}

/// Canonical-space rectifier for one calibration and one capture size.
///
/// The destination-to-source mapping is computed once at construction and
/// kept as a table of bilinear taps; [`Rectifier::rectify`] only gathers and
/// tone-maps. A new calibration means a new `Rectifier`; callers share it as
/// `Arc<Rectifier>` and swap the handle instead of mutating it.
#[derive(Clone, Debug)]
pub struct Rectifier {
    h_frame_from_canonical: Homography,
    canonical: CanonicalSize,
    frame_width: usize,
    frame_height: usize,
    photometric: PhotometricParams,
    tone: ToneTable,
    taps: Vec<Option<BilinearTap>>,
}

/// Inverse-map one canonical pixel into the frame; `None` when `denom` vanishes.
#[inline]
pub fn map_canonical_pixel(h: &[f64; 9], dx: f64, dy: f64) -> Option<(f64, f64)> {
    let denom = h[6] * dx + h[7] * dy + h[8];
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let sx = (h[0] * dx + h[1] * dy + h[2]) / denom;
    let sy = (h[3] * dx + h[4] * dy + h[5]) / denom;
    Some((sx, sy))
}

impl Rectifier {
    /// Build the lookup for `h_frame_from_canonical` (canonical -> frame pixels).
    pub fn new(
        h_frame_from_canonical: Homography,
        canonical: CanonicalSize,
        frame_width: usize,
        frame_height: usize,
        photometric: PhotometricParams,
    ) -> Result<Self, RectifyError> {
        if canonical.width == 0 || canonical.height == 0 || frame_width == 0 || frame_height == 0
        {
            return Err(CalibrationError::InvalidFrameSize {
                width: frame_width,
                height: frame_height,
            }
            .into());
        }
        let tone = ToneTable::new(&photometric)?;
        let coeffs = h_frame_from_canonical.coefficients();

        let mut taps = vec![None; canonical.width * canonical.height];
        taps.par_chunks_mut(canonical.width)
            .enumerate()
            .for_each(|(dy, row)| {
                for (dx, slot) in row.iter_mut().enumerate() {
                    *slot = map_canonical_pixel(&coeffs, dx as f64, dy as f64).and_then(
                        |(sx, sy)| BilinearTap::new(sx, sy, frame_width, frame_height),
                    );
                }
            });

        let covered = taps.iter().filter(|t| t.is_some()).count();
        log::debug!(
            "rectifier lookup {}x{} from {}x{}: {} of {} pixels covered",
            canonical.width,
            canonical.height,
            frame_width,
            frame_height,
            covered,
            taps.len()
        );

        Ok(Self {
            h_frame_from_canonical,
            canonical,
            frame_width,
            frame_height,
            photometric,
            tone,
            taps,
        })
    }

    /// Solve the calibration homography and build the lookup in one go.
    pub fn from_quad(
        quad: &CalibrationQuad,
        canonical: CanonicalSize,
        frame_width: usize,
        frame_height: usize,
        photometric: PhotometricParams,
    ) -> Result<Self, RectifyError> {
        let h = quad.canonical_to_frame(canonical, frame_width, frame_height)?;
        Self::new(h, canonical, frame_width, frame_height, photometric)
    }

    /// Same geometry, new tone curve; the tap table is reused.
    pub fn with_photometric(&self, photometric: PhotometricParams) -> Result<Self, RectifyError> {
        Ok(Self {
            tone: ToneTable::new(&photometric)?,
            photometric,
            ..self.clone()
        })
    }

    pub fn homography(&self) -> Homography {
        self.h_frame_from_canonical
    }

    pub fn canonical(&self) -> CanonicalSize {
        self.canonical
    }

    pub fn frame_size(&self) -> (usize, usize) {
        (self.frame_width, self.frame_height)
    }

    pub fn photometric(&self) -> PhotometricParams {
        self.photometric
    }

    /// Number of canonical pixels that map inside the frame.
    pub fn covered_pixels(&self) -> usize {
        self.taps.iter().filter(|t| t.is_some()).count()
    }

    pub fn rectify(&self, frame: &RgbImageView<'_>) -> Result<CanonicalImage, RectifyError> {
        let mut out = CanonicalImage::empty(self.canonical.width, self.canonical.height);
        self.rectify_into(frame, &mut out)?;
        Ok(out)
    }

    /// Rectify into a caller-owned buffer, reallocating only on size change.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, out), fields(w = frame.width, h = frame.height))
    )]
    pub fn rectify_into(
        &self,
        frame: &RgbImageView<'_>,
        out: &mut CanonicalImage,
    ) -> Result<(), RectifyError> {
        if frame.width != self.frame_width || frame.height != self.frame_height {
            return Err(RectifyError::FrameSizeMismatch {
                expected_w: self.frame_width,
                expected_h: self.frame_height,
                got_w: frame.width,
                got_h: frame.height,
            });
        }
        if !frame.is_well_formed() {
            return Err(RectifyError::InvalidFrameBuffer {
                expected: frame.width * frame.height * 3,
                got: frame.data.len(),
            });
        }

        let (w, h) = (self.canonical.width, self.canonical.height);
        if out.width != w || out.height != h {
            *out = CanonicalImage::empty(w, h);
        }

        let stride = frame.width * 3;
        let src = frame.data;
        out.data
            .par_chunks_mut(w * 3)
            .zip(out.valid.par_chunks_mut(w))
            .zip(self.taps.par_chunks(w))
            .for_each(|((row, valid), taps)| {
                for (x, tap) in taps.iter().enumerate() {
                    let px = &mut row[x * 3..x * 3 + 3];
                    match tap {
                        Some(tap) => {
                            for (c, v) in px.iter_mut().enumerate() {
                                *v = self.tone.map(tap.sample(src, stride, c));
                            }
                            valid[x] = true;
                        }
                        None => {
                            px.fill(0);
                            valid[x] = false;
                        }
                    }
                }
            });
        Ok(())
    }
}
