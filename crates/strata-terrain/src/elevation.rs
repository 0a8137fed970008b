//! Height-to-elevation remapping.

use serde::{Deserialize, Serialize};

use crate::noise_field::NoiseSettings;

/// Errors produced when building a [`HeightCurve`] from keyframes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    #[error("height curve needs at least one key")]
    Empty,
    #[error("height curve key {index} is not finite")]
    NonFinite { index: usize },
    #[error("height curve keys must have strictly increasing inputs (key {index})")]
    NotIncreasing { index: usize },
    #[error("height curve must be monotonic (key {index} decreases)")]
    NotMonotonic { index: usize },
}

/// A monotonic piecewise-linear curve evaluated over normalized heights.
///
/// Keys are `[input, output]` pairs with strictly increasing inputs and
/// non-decreasing outputs. Inputs outside the key range clamp to the first or
/// last output; NaN maps to the first output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct HeightCurve {
    keys: Vec<[f32; 2]>,
}

impl HeightCurve {
    pub fn new(keys: Vec<[f32; 2]>) -> Result<Self, CurveError> {
        if keys.is_empty() {
            return Err(CurveError::Empty);
        }
        for (index, key) in keys.iter().enumerate() {
            if !key[0].is_finite() || !key[1].is_finite() {
                return Err(CurveError::NonFinite { index });
            }
            if index > 0 {
                let prev = keys[index - 1];
                if key[0] <= prev[0] {
                    return Err(CurveError::NotIncreasing { index });
                }
                if key[1] < prev[1] {
                    return Err(CurveError::NotMonotonic { index });
                }
            }
        }
        Ok(Self { keys })
    }

    /// The identity curve over `[0, 1]`.
    pub fn linear() -> Self {
        Self {
            keys: vec![[0.0, 0.0], [1.0, 1.0]],
        }
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if t.is_nan() || t <= first[0] {
            return first[1];
        }
        if t >= last[0] {
            return last[1];
        }

        // First key whose input exceeds t; t lies in [keys[i - 1], keys[i]).
        let i = self.keys.partition_point(|k| k[0] <= t);
        let [t0, v0] = self.keys[i - 1];
        let [t1, v1] = self.keys[i];
        let s = (t - t0) / (t1 - t0);
        v0 + (v1 - v0) * s
    }

    pub fn keys(&self) -> &[[f32; 2]] {
        &self.keys
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl TryFrom<Vec<[f32; 2]>> for HeightCurve {
    type Error = CurveError;

    fn try_from(keys: Vec<[f32; 2]>) -> Result<Self, Self::Error> {
        Self::new(keys)
    }
}

impl From<HeightCurve> for Vec<[f32; 2]> {
    fn from(curve: HeightCurve) -> Self {
        curve.keys
    }
}

/// Maps a normalized height sample to a vertical world coordinate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Elevation {
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
}

impl Default for Elevation {
    fn default() -> Self {
        Self {
            height_multiplier: 30.0,
            height_curve: HeightCurve::linear(),
        }
    }
}

impl Elevation {
    #[inline]
    pub fn evaluate(&self, height: f32) -> f32 {
        self.height_curve.evaluate(height) * self.height_multiplier
    }

    /// Elevation of the lowest possible sample.
    pub fn min_height(&self) -> f32 {
        self.evaluate(0.0)
    }

    /// Elevation of the highest possible sample.
    pub fn max_height(&self) -> f32 {
        self.evaluate(1.0)
    }
}

/// Noise parameters plus the elevation remap: everything that decides the
/// shape of the terrain independent of how it is meshed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightSettings {
    pub noise: NoiseSettings,
    pub elevation: Elevation,
}
