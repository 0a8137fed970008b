//! Multi-octave Perlin height-field sampler.
//!
//! Composites `octaves` layers of Perlin noise, each at a seeded offset, with
//! frequency growing by `lacunarity` and amplitude decaying by `persistence`
//! per layer. Raw sums are then normalized into `[0, 1]` either against the
//! sampled window (`Local`) or against the theoretical maximum (`Global`).

use glam::{DVec2, Vec2};
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::height_field::HeightField;

/// Scale substituted for non-positive values so sampling never divides by zero.
pub const MIN_NOISE_SCALE: f32 = 0.0001;

/// Octave offsets are drawn uniformly from `[-OCTAVE_OFFSET_RANGE, OCTAVE_OFFSET_RANGE)`.
pub const OCTAVE_OFFSET_RANGE: i32 = 100_000;

/// How raw noise sums are mapped into `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Stretch each sample window to its own observed min/max. Values are not
    /// comparable between windows, so this is only suitable for a single
    /// self-contained preview map.
    Local,
    /// Divide by the geometric sum of octave amplitudes. Every window shares
    /// one scale, which keeps adjacent chunks continuous.
    #[default]
    Global,
}

/// Noise parameters for height-field generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Seed for the octave offsets and the Perlin permutation table.
    pub seed: i32,
    /// World units per noise period at the first octave.
    pub scale: f32,
    /// Number of octaves to composite.
    pub octaves: u32,
    /// Amplitude multiplier between successive octaves, in `[0, 1]`.
    pub persistence: f32,
    /// Frequency multiplier between successive octaves, `>= 1`.
    pub lacunarity: f32,
    /// Global offset added to every sample position.
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Global,
        }
    }
}

impl NoiseSettings {
    /// Apply the configuration-time clamps: non-positive scale becomes
    /// [`MIN_NOISE_SCALE`], lacunarity is floored at 1 and persistence is
    /// clamped into `[0, 1]`. Non-finite values take the same floors and a
    /// non-finite offset is reset to zero, so sampling never sees NaN.
    pub fn validated(mut self) -> Self {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            self.scale = MIN_NOISE_SCALE;
        }
        if !(self.lacunarity.is_finite() && self.lacunarity >= 1.0) {
            self.lacunarity = 1.0;
        }
        self.persistence = if self.persistence.is_nan() {
            0.0
        } else {
            self.persistence.clamp(0.0, 1.0)
        };
        if !self.offset.is_finite() {
            self.offset = Vec2::ZERO;
        }
        self
    }
}

/// Seeded fractal noise sampler.
///
/// The only state derived from the settings is the per-octave offset table,
/// so two samplers built from equal settings produce bit-identical output.
pub struct NoiseField {
    perlin: Perlin,
    octave_offsets: Vec<DVec2>,
    scale: f64,
    persistence: f64,
    lacunarity: f64,
}

impl NoiseField {
    pub fn new(settings: &NoiseSettings) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed as i64 as u64);
        let octave_offsets = (0..settings.octaves)
            .map(|_| {
                let ox = rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
                let oy = rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
                DVec2::new(
                    ox as f64 + settings.offset.x as f64,
                    oy as f64 - settings.offset.y as f64,
                )
            })
            .collect();

        let scale = if settings.scale <= 0.0 {
            MIN_NOISE_SCALE
        } else {
            settings.scale
        };

        Self {
            perlin: Perlin::new(settings.seed as u32),
            octave_offsets,
            scale: scale as f64,
            persistence: settings.persistence as f64,
            lacunarity: settings.lacunarity as f64,
        }
    }

    /// Sum of all octaves at noise-space position `(x, y)`, before normalization.
    pub fn sample_raw(&self, x: f64, y: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;

        for offset in &self.octave_offsets {
            let nx = (x + offset.x) / self.scale * frequency;
            let ny = (y + offset.y) / self.scale * frequency;
            total += self.perlin.get([nx, ny]) * amplitude;

            frequency *= self.lacunarity;
            amplitude *= self.persistence;
        }

        total
    }

    /// Raw samples for a `width x height` window centered on `sample_center`.
    ///
    /// Columns advance along +x, rows advance against +y, which is the
    /// orientation the mesh builder lays rows out in world space.
    pub fn sample_grid(&self, width: usize, height: usize, sample_center: Vec2) -> Vec<f64> {
        let half_width = width as f64 / 2.0;
        let half_height = height as f64 / 2.0;
        let cx = sample_center.x as f64;
        let cy = sample_center.y as f64;

        let mut raw = Vec::with_capacity(width * height);
        for y in 0..height {
            let gy = y as f64 - half_height - cy;
            for x in 0..width {
                let gx = x as f64 - half_width + cx;
                raw.push(self.sample_raw(gx, gy));
            }
        }
        raw
    }

    /// Geometric sum of octave amplitudes, `Σ persistence^i` for `i in 0..octaves`.
    pub fn max_possible_height(&self) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        for _ in &self.octave_offsets {
            sum += amplitude;
            amplitude *= self.persistence;
        }
        sum
    }

    /// The per-octave offsets derived from the seed and the global offset.
    pub fn octave_offsets(&self) -> &[DVec2] {
        &self.octave_offsets
    }
}

/// Generate a normalized `width x height` height field around `sample_center`.
pub fn generate_height_field(
    width: usize,
    height: usize,
    settings: &NoiseSettings,
    sample_center: Vec2,
) -> HeightField {
    let field = NoiseField::new(settings);
    let max_possible_height = field.max_possible_height();
    if matches!(settings.normalize_mode, NormalizeMode::Global) && max_possible_height <= 0.0 {
        return HeightField::filled(width, height, 0.0);
    }
    let raw = field.sample_grid(width, height, sample_center);

    let values = match settings.normalize_mode {
        NormalizeMode::Local => normalize_local(&raw),
        NormalizeMode::Global => normalize_global(&raw, max_possible_height),
    };

    HeightField::from_values(width, height, values)
}

fn normalize_local(raw: &[f64]) -> Vec<f32> {
    let (min, max) = raw
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    raw.iter()
        .map(|&v| {
            if range > 0.0 {
                ((v - min) / range) as f32
            } else {
                0.0
            }
        })
        .collect()
}

fn normalize_global(raw: &[f64], max_possible_height: f64) -> Vec<f32> {
    raw.iter()
        .map(|&v| ((v + 1.0) / max_possible_height).clamp(0.0, 1.0) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;
    /// Samples per line for the smallest supported chunk (48 + 5).
    const N: usize = 53;
    /// Distance in samples between adjacent chunk centers.
    const SPAN: f32 = (N - 3) as f32;

    fn global(seed: i32) -> NoiseSettings {
        NoiseSettings {
            seed,
            scale: 25.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_determinism_bit_identical() {
        let settings = global(42);
        let a = generate_height_field(N, N, &settings, Vec2::new(150.0, -50.0));
        let b = generate_height_field(N, N, &settings, Vec2::new(150.0, -50.0));
        let bits_a: Vec<u32> = a.values().iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u32> = b.values().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b, "identical inputs must give bit-identical grids");
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = generate_height_field(N, N, &global(1), Vec2::ZERO);
        let b = generate_height_field(N, N, &global(999), Vec2::ZERO);
        assert_ne!(a.values(), b.values());
    }

    #[test]
    fn test_global_seam_continuity_horizontal() {
        let settings = global(7);
        let left = generate_height_field(N, N, &settings, Vec2::ZERO);
        let right = generate_height_field(N, N, &settings, Vec2::new(SPAN, 0.0));

        // The last interior column of the left chunk is the first interior
        // column of the right chunk; the border columns overlap too.
        for y in 0..N {
            for (lx, rx) in [(N - 3, 0), (N - 2, 1), (N - 1, 2)] {
                let l = left.get(lx, y);
                let r = right.get(rx, y);
                assert!(
                    (l - r).abs() < EPSILON,
                    "seam mismatch at row {y}: left[{lx}]={l} right[{rx}]={r}"
                );
            }
        }
    }

    #[test]
    fn test_global_seam_continuity_vertical() {
        let settings = global(7);
        let lower = generate_height_field(N, N, &settings, Vec2::ZERO);
        let upper = generate_height_field(N, N, &settings, Vec2::new(0.0, SPAN));

        // Rows run against +y, so the upper chunk's bottom rows meet the
        // lower chunk's top rows.
        for x in 0..N {
            let l = lower.get(x, 1);
            let u = upper.get(x, N - 2);
            assert!(
                (l - u).abs() < EPSILON,
                "seam mismatch at column {x}: lower={l} upper={u}"
            );
        }
    }

    #[test]
    fn test_single_octave_unit_persistence_is_plain_perlin() {
        let settings = NoiseSettings {
            seed: 7,
            scale: 10.0,
            octaves: 1,
            persistence: 1.0,
            ..Default::default()
        };
        let field = NoiseField::new(&settings);
        let offset = field.octave_offsets()[0];
        let perlin = Perlin::new(7);

        for (x, y) in [(0.0, 0.0), (3.5, -2.25), (41.0, 17.0)] {
            let expected = perlin.get([(x + offset.x) / 10.0, (y + offset.y) / 10.0]);
            let got = field.sample_raw(x, y);
            assert_eq!(got, expected, "single octave must equal Perlin at ({x}, {y})");
        }
        assert_eq!(field.max_possible_height(), 1.0);
    }

    #[test]
    fn test_zero_octaves_is_constant_zero() {
        let settings = NoiseSettings {
            octaves: 0,
            ..global(3)
        };
        let field = NoiseField::new(&settings);
        assert!(
            field
                .sample_grid(N, N, Vec2::new(10.0, 10.0))
                .iter()
                .all(|&v| v == 0.0),
            "zero octaves must produce all zeros before normalization"
        );

        for mode in [NormalizeMode::Local, NormalizeMode::Global] {
            let settings = NoiseSettings {
                normalize_mode: mode,
                ..settings.clone()
            };
            let normalized = generate_height_field(N, N, &settings, Vec2::ZERO);
            assert!(normalized.values().iter().all(|&v| v == 0.0), "{mode:?}");
        }
    }

    #[test]
    fn test_local_mode_spans_unit_range() {
        let settings = NoiseSettings {
            normalize_mode: NormalizeMode::Local,
            ..global(11)
        };
        let field = generate_height_field(N, N, &settings, Vec2::ZERO);
        assert!((field.min_value() - 0.0).abs() < EPSILON);
        assert!((field.max_value() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_global_mode_within_unit_range() {
        let field = generate_height_field(N, N, &global(5), Vec2::new(-400.0, 900.0));
        for &v in field.values() {
            assert!((0.0..=1.0).contains(&v), "global value {v} outside [0, 1]");
        }
    }

    #[test]
    fn test_non_positive_scale_is_finite() {
        let settings = NoiseSettings {
            scale: 0.0,
            ..global(1)
        };
        let field = generate_height_field(9, 9, &settings, Vec2::ZERO);
        assert!(field.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_validated_applies_floors() {
        let settings = NoiseSettings {
            scale: -3.0,
            lacunarity: 0.25,
            persistence: 1.5,
            ..Default::default()
        }
        .validated();
        assert_eq!(settings.scale, MIN_NOISE_SCALE);
        assert_eq!(settings.lacunarity, 1.0);
        assert_eq!(settings.persistence, 1.0);
    }

    #[test]
    fn test_validated_replaces_non_finite_values() {
        let settings = NoiseSettings {
            scale: f32::NAN,
            lacunarity: f32::INFINITY,
            persistence: f32::NAN,
            offset: Vec2::new(f32::NAN, 4.0),
            ..Default::default()
        }
        .validated();
        assert_eq!(settings.scale, MIN_NOISE_SCALE);
        assert_eq!(settings.lacunarity, 1.0);
        assert_eq!(settings.persistence, 0.0);
        assert_eq!(settings.offset, Vec2::ZERO);

        let field = generate_height_field(9, 9, &settings, Vec2::ZERO);
        assert!(
            field.values().iter().all(|v| v.is_finite()),
            "validated settings must sample finite heights"
        );
    }

    #[test]
    fn test_max_possible_height_geometric_sum() {
        let field = NoiseField::new(&NoiseSettings {
            octaves: 4,
            persistence: 0.5,
            ..Default::default()
        });
        assert!((field.max_possible_height() - 1.875).abs() < 1e-12);
    }

    #[test]
    fn test_offsets_within_range() {
        let field = NoiseField::new(&NoiseSettings {
            octaves: 32,
            ..Default::default()
        });
        let limit = OCTAVE_OFFSET_RANGE as f64;
        for offset in field.octave_offsets() {
            assert!(offset.x >= -limit && offset.x < limit);
            assert!(offset.y >= -limit && offset.y < limit);
        }
    }
}
