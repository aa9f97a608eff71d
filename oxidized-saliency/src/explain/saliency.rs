use candle_core::{DType, Tensor};
use ndarray::Array2;
use snafu::{ensure, Snafu};

/// Added to the maximum before dividing, so that constant maps become zero
/// instead of NaN.
const NORMALIZATION_EPSILON: f32 = 1e-8;

/// Saliency map errors.
#[derive(Debug, Snafu)]
pub enum SaliencyMapError {
    #[snafu(display("Saliency map values must be in [0, 1]"))]
    Range,
}

/// Saliency map.
///
/// A 2D map with one score per spatial location, normalized to `[0, 1]`.
/// The map is plain data, it does not hold on to any tensors.
#[derive(Clone, Debug, PartialEq)]
pub struct SaliencyMap {
    values: Array2<f32>,
}

impl SaliencyMap {
    /// Normalize scores into a saliency map.
    ///
    /// The minimum is subtracted and the result is divided by its maximum.
    /// A constant map normalizes to all zeros.
    ///
    /// * `scores` - Scores.
    ///   *Shape:* `(height, width)`
    pub fn normalize(mut scores: Array2<f32>) -> Self {
        let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
        if min.is_finite() {
            scores.mapv_inplace(|v| v - min);
        }

        let max = scores.iter().copied().fold(0f32, f32::max);
        let scale = max + NORMALIZATION_EPSILON;
        scores.mapv_inplace(|v| v / scale);

        Self { values: scores }
    }

    /// Wrap values that are already normalized.
    ///
    /// * `values` - Map values, all in `[0, 1]`.
    ///   *Shape:* `(height, width)`
    pub fn from_normalized(values: Array2<f32>) -> Result<Self, SaliencyMapError> {
        ensure!(
            values.iter().all(|v| (0.0..=1.0).contains(v)),
            RangeSnafu
        );
        Ok(Self { values })
    }

    /// Normalize scores stored in a tensor into a saliency map.
    ///
    /// * `scores` - Scores.
    ///   *Shape:* `(height, width)`
    pub fn normalize_tensor(scores: &Tensor) -> Result<Self, candle_core::Error> {
        let (height, width) = scores.dims2()?;
        let data = scores.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        let scores = Array2::from_shape_vec((height, width), data)
            .map_err(|err| candle_core::Error::Msg(err.to_string()))?;
        Ok(Self::normalize(scores))
    }

    /// Height and width of the map.
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Map values.
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Take the map values.
    pub fn into_values(self) -> Array2<f32> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use candle_core::{Device, Tensor};
    use ndarray::{array, Array2};

    use super::SaliencyMap;

    #[test]
    fn normalize_maps_to_unit_range() {
        let map = SaliencyMap::normalize(array![[-1f32, 0.], [1., 3.]]);
        assert_abs_diff_eq!(
            map.values(),
            &array![[0f32, 0.25], [0.5, 1.]],
            epsilon = 1e-6
        );
    }

    #[test]
    fn normalize_constant_map_is_zero() {
        let map = SaliencyMap::normalize(Array2::from_elem((7, 7), 0.5f32));
        assert!(map.values().iter().all(|&v| v == 0.));

        let map = SaliencyMap::normalize(Array2::zeros((3, 2)));
        assert_eq!(map.dim(), (3, 2));
        assert!(map.values().iter().all(|&v| v == 0.));
    }

    #[test]
    fn from_normalized_checks_range() {
        assert!(SaliencyMap::from_normalized(Array2::from_elem((7, 7), 0.5)).is_ok());
        assert!(SaliencyMap::from_normalized(array![[0f32, 1.5]]).is_err());
        assert!(SaliencyMap::from_normalized(array![[f32::NAN, 0.5]]).is_err());
    }

    #[test]
    fn normalize_tensor_checks_rank() {
        let device = Device::Cpu;
        let map =
            SaliencyMap::normalize_tensor(&Tensor::new(&[[2f32, 4.], [6., 10.]], &device).unwrap())
                .unwrap();
        assert_abs_diff_eq!(
            map.values(),
            &array![[0f32, 0.25], [0.5, 1.]],
            epsilon = 1e-6
        );
        assert!(SaliencyMap::normalize_tensor(&Tensor::new(&[1f32, 2.], &device).unwrap()).is_err());
    }
}
