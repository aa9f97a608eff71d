#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use candle_core::{DType, Device, Tensor};
    use candle_nn::VarBuilder;
    use snafu::{ResultExt, Whatever};

    use crate::layers::activation::Activation;
    use crate::layers::convolution::{Conv2dConfig, Padding};
    use crate::layers::dense::DenseConfig;
    use crate::layers::flatten::Flatten;
    use crate::layers::pooling::{GlobalAveragePooling2d, Pool2dConfig};
    use crate::models::{SequentialClassifier, SequentialClassifierConfig};
    use crate::util::tests::PseudoRandom;

    /// Sample image with values in `[0, 1)`.
    ///
    /// * `shape` - Image shape as `(height, width, channels)`.
    /// *Shape:* `(1, height, width, channels)`
    pub fn sample_image(
        (height, width, channels): (usize, usize, usize),
        seed: u64,
        device: &Device,
    ) -> Result<Tensor, Whatever> {
        Ok(Tensor::pseudo_random((1, height, width, channels), seed, device))
    }

    /// Image where every value is `value`.
    pub fn constant_image(
        (height, width, channels): (usize, usize, usize),
        value: f32,
        device: &Device,
    ) -> Result<Tensor, Whatever> {
        Tensor::full(value, (1, height, width, channels), device)
            .whatever_context("Cannot create constant image")
    }

    /// Bias of the dense layer of `conv_classifier`.
    ///
    /// Chosen so that a constant image of `0.5` gets the score `0.8`.
    pub const CONV_CLASSIFIER_BIAS: f32 = 0.386_294_36;

    /// Convolutional classifier with a sigmoid head.
    ///
    /// Layers: `conv2d` (3 -> 4 channels, 32x32 kernel, stride 32, ReLU)
    /// producing a 7x7 feature map on 224x224 inputs, global average
    /// pooling, and a `dense` layer with a single sigmoid output.
    ///
    /// Every conv channel averages its receptive field, so a constant image
    /// of `0.5` gives activations of `0.5` and a logit of
    /// `0.5 * (1 + 0.5 - 0.5 + 1) + ln 4 - 1 = ln 4`, a score of `0.8`.
    pub fn conv_classifier(device: &Device) -> Result<SequentialClassifier, Whatever> {
        let tensors = HashMap::from([
            (
                "conv2d.kernel".to_string(),
                Tensor::full(1f32 / (32. * 32. * 3.), (4, 3, 32, 32), device)
                    .whatever_context("Cannot create kernel")?,
            ),
            (
                "conv2d.bias".to_string(),
                Tensor::zeros(4, DType::F32, device).whatever_context("Cannot create bias")?,
            ),
            (
                "dense.weight".to_string(),
                Tensor::new(&[[1f32, 0.5, -0.5, 1.0]], device)
                    .whatever_context("Cannot create weight")?,
            ),
            (
                "dense.bias".to_string(),
                Tensor::new(&[CONV_CLASSIFIER_BIAS], device)
                    .whatever_context("Cannot create bias")?,
            ),
        ]);

        SequentialClassifierConfig::default()
            .input_shape((224, 224, 3))
            .layer(
                "conv2d",
                Box::new(
                    Conv2dConfig::default()
                        .in_channels(3)
                        .filters(4)
                        .kernel_size(32)
                        .stride(32)
                        .activation(Activation::Relu),
                ),
            )
            .layer("global_average_pooling2d", Box::new(GlobalAveragePooling2d))
            .layer(
                "dense",
                Box::new(
                    DenseConfig::default()
                        .in_features(4)
                        .units(1)
                        .activation(Activation::Sigmoid),
                ),
            )
            .build(VarBuilder::from_tensors(tensors, DType::F32, device))
            .whatever_context("Cannot build convolutional classifier")
    }

    /// Fully-connected classifier with a sigmoid head.
    ///
    /// Layers: `flatten` and a `dense` layer with a single sigmoid output.
    /// None of the layers has a spatial output.
    pub fn dense_classifier(
        (height, width, channels): (usize, usize, usize),
        device: &Device,
    ) -> Result<SequentialClassifier, Whatever> {
        let in_features = height * width * channels;
        let weight = Tensor::pseudo_random((1, in_features), in_features as u64, device)
            .affine(2. / in_features as f64, -1. / in_features as f64)
            .whatever_context("Cannot create weight")?;
        let tensors = HashMap::from([
            ("dense.weight".to_string(), weight),
            (
                "dense.bias".to_string(),
                Tensor::new(&[0.25f32], device).whatever_context("Cannot create bias")?,
            ),
        ]);

        SequentialClassifierConfig::default()
            .input_shape((height, width, channels))
            .layer("flatten", Box::new(Flatten))
            .layer(
                "dense",
                Box::new(
                    DenseConfig::default()
                        .in_features(in_features)
                        .units(1)
                        .activation(Activation::Sigmoid),
                ),
            )
            .build(VarBuilder::from_tensors(tensors, DType::F32, device))
            .whatever_context("Cannot build dense classifier")
    }

    /// Fully-connected classifier with two linear outputs.
    ///
    /// The class scores are `weight * flatten(input)`, without bias.
    pub fn linear_classifier(
        (height, width, channels): (usize, usize, usize),
        device: &Device,
    ) -> Result<SequentialClassifier, Whatever> {
        let in_features = height * width * channels;
        let weight = Tensor::pseudo_random((2, in_features), 7, device)
            .affine(2., -1.)
            .whatever_context("Cannot create weight")?;

        SequentialClassifierConfig::default()
            .input_shape((height, width, channels))
            .layer("flatten", Box::new(Flatten))
            .layer(
                "dense",
                Box::new(
                    DenseConfig::default()
                        .in_features(in_features)
                        .units(2)
                        .use_bias(false),
                ),
            )
            .build(VarBuilder::from_tensors(
                HashMap::from([("dense.weight".to_string(), weight)]),
                DType::F32,
                device,
            ))
            .whatever_context("Cannot build linear classifier")
    }

    /// Small convolutional classifier with a softmax head.
    ///
    /// Layers on 8x8x3 inputs: `conv2d` (2 channels, same padding, ReLU),
    /// `max_pooling2d`, `flatten`, and a `dense` softmax layer with two
    /// outputs.
    pub fn softmax_classifier(device: &Device) -> Result<SequentialClassifier, Whatever> {
        let tensors = HashMap::from([
            (
                "conv2d.kernel".to_string(),
                Tensor::pseudo_random((2, 3, 3, 3), 1, device)
                    .affine(1., -0.25)
                    .whatever_context("Cannot create kernel")?,
            ),
            (
                "conv2d.bias".to_string(),
                Tensor::new(&[0.1f32, -0.1], device).whatever_context("Cannot create bias")?,
            ),
            (
                "dense.weight".to_string(),
                Tensor::pseudo_random((2, 32), 2, device)
                    .affine(2., -1.)
                    .whatever_context("Cannot create weight")?,
            ),
            (
                "dense.bias".to_string(),
                Tensor::zeros(2, DType::F32, device).whatever_context("Cannot create bias")?,
            ),
        ]);

        SequentialClassifierConfig::default()
            .input_shape((8, 8, 3))
            .layer(
                "conv2d",
                Box::new(
                    Conv2dConfig::default()
                        .in_channels(3)
                        .filters(2)
                        .padding(Padding::Same)
                        .activation(Activation::Relu),
                ),
            )
            .layer("max_pooling2d", Box::new(Pool2dConfig::default()))
            .layer("flatten", Box::new(Flatten))
            .layer(
                "dense",
                Box::new(
                    DenseConfig::default()
                        .in_features(32)
                        .units(2)
                        .activation(Activation::Softmax),
                ),
            )
            .build(VarBuilder::from_tensors(tensors, DType::F32, device))
            .whatever_context("Cannot build softmax classifier")
    }
}
