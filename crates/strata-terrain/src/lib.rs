//! Height-field synthesis: seeded multi-octave noise, normalization, and the
//! height-to-elevation curve applied when meshing.

mod elevation;
mod height_field;
mod noise_field;

pub use elevation::{CurveError, Elevation, HeightCurve, HeightSettings};
pub use height_field::HeightField;
pub use noise_field::{
    MIN_NOISE_SCALE, NoiseField, NoiseSettings, NormalizeMode, OCTAVE_OFFSET_RANGE,
    generate_height_field,
};
