//! Multi-signal occupancy voting.
//!
//! A single darkness threshold is brittle under uneven projector light, so
//! each zone is scored by five independent signals that vote with fixed
//! weights. The detector is pure: it reads a canonical image and returns
//! readings; recording them is the caller's job.

use crate::Zone;
use assembly_guide_core::{mean_rgb, CanonicalImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Vote weight of each signal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteWeights {
    pub darkness: u8,
    pub edges: u8,
    pub brightness_variance: u8,
    pub color_variance: u8,
    pub center_darkness: u8,
}

impl Default for VoteWeights {
    fn default() -> Self {
        Self {
            darkness: 2,
            edges: 1,
            brightness_variance: 1,
            color_variance: 1,
            center_darkness: 2,
        }
    }
}

impl VoteWeights {
    /// Highest reachable score. Summed in `u32` so no weight set can overflow.
    pub fn total(&self) -> u32 {
        [
            self.darkness,
            self.edges,
            self.brightness_variance,
            self.color_variance,
            self.center_darkness,
        ]
        .iter()
        .map(|&w| u32::from(w))
        .sum()
    }
}

/// Detector thresholds. Tuned for one lighting rig; recalibrate per deployment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Sample every `sample_stride`-th pixel in both axes.
    pub sample_stride: usize,
    /// A pixel is dark when its mean RGB is below this value.
    pub darkness_threshold: f32,
    /// Minimum dark fraction for the darkness vote.
    pub darkness_ratio_min: f32,
    /// Gradient magnitude (brightness units) that counts as an edge.
    pub edge_gradient_threshold: f32,
    /// Minimum edge fraction for the edge vote.
    pub edge_ratio_min: f32,
    /// Minimum population variance of brightness.
    pub brightness_variance_min: f32,
    /// Minimum mean per-pixel channel deviation.
    pub color_variance_min: f32,
    /// Central region size relative to the zone extent (0.5 = central quarter of a rectangle).
    pub center_fraction: f32,
    /// Minimum dark fraction inside the central region.
    pub center_darkness_ratio_min: f32,
    pub weights: VoteWeights,
    /// A zone is occupied when its votes reach this total.
    pub vote_minimum: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            sample_stride: 5,
            darkness_threshold: 201.0,
            darkness_ratio_min: 0.3,
            edge_gradient_threshold: 30.0,
            edge_ratio_min: 0.1,
            brightness_variance_min: 1000.0,
            color_variance_min: 20.0,
            center_fraction: 0.5,
            center_darkness_ratio_min: 0.5,
            weights: VoteWeights::default(),
            vote_minimum: 3,
        }
    }
}

/// Raw signal values for one zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancySignals {
    pub samples: usize,
    pub darkness_ratio: f32,
    pub edge_ratio: f32,
    pub brightness_variance: f32,
    pub color_variance: f32,
    pub center_darkness_ratio: f32,
}

/// Which signals voted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignalVotes {
    pub darkness: bool,
    pub edges: bool,
    pub brightness_variance: bool,
    pub color_variance: bool,
    pub center_darkness: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyReading {
    /// Absolute zone index.
    pub index: usize,
    pub signals: OccupancySignals,
    pub votes: SignalVotes,
    pub score: u32,
    pub occupied: bool,
}

#[derive(Default)]
struct Accumulator {
    samples: usize,
    dark: usize,
    interior: usize,
    edges: usize,
    sum_b: f64,
    sum_b2: f64,
    sum_color_dev: f64,
    center_samples: usize,
    center_dark: usize,
}

impl Accumulator {
    fn signals(&self) -> OccupancySignals {
        if self.samples == 0 {
            return OccupancySignals::default();
        }
        let n = self.samples as f64;
        let mean = self.sum_b / n;
        let variance = (self.sum_b2 / n - mean * mean).max(0.0);
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f32 / den as f32
            }
        };
        OccupancySignals {
            samples: self.samples,
            darkness_ratio: ratio(self.dark, self.samples),
            edge_ratio: ratio(self.edges, self.interior),
            brightness_variance: variance as f32,
            color_variance: (self.sum_color_dev / n) as f32,
            center_darkness_ratio: ratio(self.center_dark, self.center_samples),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OccupancyDetector {
    params: DetectorParams,
}

impl OccupancyDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Score every zone in `zones`.
    ///
    /// Callers pass only the zones that still need detection; permanently
    /// completed zones must be filtered out beforehand.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image, zones), fields(zones = zones.len()))
    )]
    pub fn detect(&self, image: &CanonicalImage, zones: &[Zone]) -> Vec<OccupancyReading> {
        zones.iter().map(|z| self.score_zone(image, z)).collect()
    }

    pub fn score_zone(&self, image: &CanonicalImage, zone: &Zone) -> OccupancyReading {
        let signals = self.measure(image, zone);
        let p = &self.params;
        let votes = SignalVotes {
            darkness: signals.darkness_ratio > p.darkness_ratio_min,
            edges: signals.edge_ratio > p.edge_ratio_min,
            brightness_variance: signals.brightness_variance > p.brightness_variance_min,
            color_variance: signals.color_variance > p.color_variance_min,
            center_darkness: signals.center_darkness_ratio > p.center_darkness_ratio_min,
        };
        let w = &p.weights;
        let score = [
            (votes.darkness, w.darkness),
            (votes.edges, w.edges),
            (votes.brightness_variance, w.brightness_variance),
            (votes.color_variance, w.color_variance),
            (votes.center_darkness, w.center_darkness),
        ]
        .iter()
        .filter(|(v, _)| *v)
        .map(|(_, w)| u32::from(*w))
        .sum::<u32>();

        let occupied = signals.samples > 0 && score >= p.vote_minimum;
        log::trace!(
            "zone {}: n={} dark={:.2} edge={:.2} var={:.0} color={:.1} center={:.2} -> {}",
            zone.index,
            signals.samples,
            signals.darkness_ratio,
            signals.edge_ratio,
            signals.brightness_variance,
            signals.color_variance,
            signals.center_darkness_ratio,
            score
        );

        OccupancyReading {
            index: zone.index,
            signals,
            votes,
            score,
            occupied,
        }
    }

    /// Walk the zone's bounding box at the sampling stride and accumulate signals.
    fn measure(&self, image: &CanonicalImage, zone: &Zone) -> OccupancySignals {
        let p = &self.params;
        let stride = p.sample_stride.max(1);
        let (hw, hh) = zone.extent.half_size();
        let (cx, cy) = (zone.center.x, zone.center.y);

        let x0 = (cx - hw).floor().max(0.0) as i64;
        let y0 = (cy - hh).floor().max(0.0) as i64;
        let x1 = ((cx + hw).ceil() as i64).min(image.width as i64 - 1);
        let y1 = ((cy + hh).ceil() as i64).min(image.height as i64 - 1);

        let mut acc = Accumulator::default();
        if x1 < x0 || y1 < y0 {
            return acc.signals();
        }

        for y in (y0..=y1).step_by(stride) {
            for x in (x0..=x1).step_by(stride) {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if !zone.extent.contains(dx, dy, 1.0) {
                    continue;
                }
                let Some(rgb) = image.get(x, y) else {
                    continue;
                };

                let b = mean_rgb(rgb);
                let dark = b < p.darkness_threshold;
                acc.samples += 1;
                acc.sum_b += b as f64;
                acc.sum_b2 += (b as f64) * (b as f64);
                acc.sum_color_dev += color_deviation(rgb, b) as f64;
                if dark {
                    acc.dark += 1;
                }

                if let Some(g) = gradient_magnitude(image, x, y) {
                    acc.interior += 1;
                    if g > p.edge_gradient_threshold {
                        acc.edges += 1;
                    }
                }

                if zone.extent.contains(dx, dy, p.center_fraction) {
                    acc.center_samples += 1;
                    if dark {
                        acc.center_dark += 1;
                    }
                }
            }
        }
        acc.signals()
    }
}

/// Mean absolute deviation of the channels from the pixel's own brightness.
#[inline]
fn color_deviation(rgb: [u8; 3], brightness: f32) -> f32 {
    rgb.iter()
        .map(|&c| (c as f32 - brightness).abs())
        .sum::<f32>()
        / 3.0
}

/// Central-difference brightness gradient; `None` unless all 4 neighbours have data.
#[inline]
fn gradient_magnitude(image: &CanonicalImage, x: i64, y: i64) -> Option<f32> {
    let l = image.brightness(x - 1, y)?;
    let r = image.brightness(x + 1, y)?;
    let u = image.brightness(x, y - 1)?;
    let d = image.brightness(x, y + 1)?;
    let gx = r - l;
    let gy = d - u;
    Some((gx * gx + gy * gy).sqrt())
}
