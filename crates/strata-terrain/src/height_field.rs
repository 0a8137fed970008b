//! Immutable 2D grid of normalized height samples.

/// A row-major grid of height samples produced by [`crate::generate_height_field`].
///
/// Once built the grid is never mutated, so it is shared between the worker
/// that produced it and every mesh request that reads it as an
/// `Arc<HeightField>`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    values: Vec<f32>,
    min_value: f32,
    max_value: f32,
}

impl HeightField {
    /// Wrap an existing row-major buffer of `width * height` samples.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != width * height`.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Self {
        assert_eq!(
            values.len(),
            width * height,
            "height field buffer must hold width * height samples"
        );
        let (min_value, max_value) = values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (min_value, max_value) = if values.is_empty() {
            (0.0, 0.0)
        } else {
            (min_value, max_value)
        };
        Self {
            width,
            height,
            values,
            min_value,
            max_value,
        }
    }

    /// A field of `width * height` copies of `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self::from_values(width, height, vec![value; width * height])
    }

    /// Sample at column `x`, row `y`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.values[y * self.width + x]
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// All samples, row-major.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Smallest sample in the field.
    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    /// Largest sample in the field.
    pub fn max_value(&self) -> f32 {
        self.max_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_indexing() {
        let field = HeightField::from_values(3, 2, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(field.get(0, 0), 0.0);
        assert_eq!(field.get(2, 0), 0.2);
        assert_eq!(field.get(0, 1), 0.3);
        assert_eq!(field.get(2, 1), 0.5);
    }

    #[test]
    fn test_min_max_tracked() {
        let field = HeightField::from_values(2, 2, vec![0.7, 0.2, 0.9, 0.4]);
        assert_eq!(field.min_value(), 0.2);
        assert_eq!(field.max_value(), 0.9);
    }

    #[test]
    #[should_panic(expected = "width * height")]
    fn test_mismatched_buffer_panics() {
        HeightField::from_values(4, 4, vec![0.0; 3]);
    }
}
