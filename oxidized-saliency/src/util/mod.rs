
#[cfg(test)]
pub(crate) mod tests {
    use std::error::Error;
    use std::fmt::Debug;

    use approx::{assert_relative_eq, AbsDiffEq, Relative, RelativeEq};
    use candle_core::{Device, Shape, Tensor, WithDType};
    use ndarray::{ArrayBase, ArrayD, Data, Dimension};
    use rand_core::RngCore;
    use rand_pcg::Pcg32;

    // Like TryInto, but we need our own trait so that we can implement it
    // for external types.
    pub trait IntoArrayD<T> {
        fn into_arrayd(self) -> Result<ArrayD<T>, Box<dyn Error>>;
    }

    impl<T> IntoArrayD<T> for Tensor
    where
        T: WithDType,
    {
        fn into_arrayd(self) -> Result<ArrayD<T>, Box<dyn Error>> {
            (&self).into_arrayd()
        }
    }

    impl<T> IntoArrayD<T> for &Tensor
    where
        T: WithDType,
    {
        fn into_arrayd(self) -> Result<ArrayD<T>, Box<dyn Error>> {
            let data = self.reshape(((),))?.to_vec1()?;
            Ok(ArrayD::from_shape_vec(self.shape().dims(), data)?)
        }
    }

    impl<S, D, T> IntoArrayD<T> for ArrayBase<S, D>
    where
        D: Dimension,
        S: Data<Elem = T>,
        T: Clone,
    {
        fn into_arrayd(self) -> Result<ArrayD<T>, Box<dyn Error>> where {
            Ok(self.to_owned().into_dyn())
        }
    }

    /// Check that two tensors are equal with the given absolute (`epsilon`)
    /// and relative (`max_relative`) tolerances.
    macro_rules! assert_tensor_eq {
        ($lhs:expr, $rhs:expr $(, $opt:ident = $val:expr)*) => {
            crate::util::tests::assert_tensor_eq_($lhs, $rhs, approx::Relative::default()$(.$opt($val))*)
        };
        ($lhs:expr, $rhs:expr $(, $opt:ident = $val:expr)*,) => {
            crate::util::tests::assert_tensor_eq_($lhs, $rhs, approx::Relative::default()$(.$opt($val))*)
        };
    }
    pub(crate) use assert_tensor_eq;

    pub(crate) fn assert_tensor_eq_<T>(
        a: impl IntoArrayD<T>,
        b: impl IntoArrayD<T>,
        relative: Relative<T>,
    ) where
        T: AbsDiffEq<Epsilon = T> + RelativeEq + Clone + Debug,
    {
        let a = a.into_arrayd().expect("Cannot convert array");
        let b = b.into_arrayd().expect("Cannot convert array");

        assert_eq!(
            a.shape(),
            b.shape(),
            "Shape mismatch: {:?}, {:?}",
            a.shape(),
            b.shape()
        );

        assert_relative_eq!(
            a,
            b,
            epsilon = relative.epsilon,
            max_relative = relative.max_relative
        );
    }

    /// Generate tensors with a PRNG.
    pub trait PseudoRandom {
        /// Generate a tensor with uniform values in `[0, 1)`.
        ///
        /// The PRNG is seeded with `seed`, so the same seed always gives the
        /// same tensor. The returned tensor is always a float32 tensor.
        ///
        /// * `shape` - Shape of the tensor to generate.
        /// * `seed` - PRNG seed.
        /// * `device` - The device to allocate the tensor on.
        fn pseudo_random(shape: impl Into<Shape>, seed: u64, device: &Device) -> Self;
    }

    impl PseudoRandom for Tensor {
        fn pseudo_random(shape: impl Into<Shape>, seed: u64, device: &Device) -> Self {
            let shape = shape.into();
            let mut rng = Pcg32::new(seed, 0);
            let data = (0..shape.elem_count())
                .map(|_| {
                    // Use the top mantissa-width bits for a uniform number
                    // in [0, 1) without going through rand's samplers.
                    let mantissa_bits_shift = u32::BITS - f32::MANTISSA_DIGITS;
                    (rng.next_u32() >> mantissa_bits_shift) as f32
                        / (1 << f32::MANTISSA_DIGITS) as f32
                })
                .collect::<Vec<_>>();
            Tensor::from_vec(data, shape, device).expect("Cannot allocate random tensor")
        }
    }
}
