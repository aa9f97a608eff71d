use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;
use snafu::{ResultExt, Snafu};

/// Preprocessing errors.
#[derive(Debug, Snafu)]
pub enum PreprocessError {
    #[snafu(display("Cannot create input tensor"))]
    CreateTensor { source: candle_core::Error },

    #[snafu(display("Cannot open image: {path:?}"))]
    OpenImage {
        source: image::ImageError,
        path: PathBuf,
    },
}

/// Converts images to classifier inputs.
///
/// Images are converted to RGB, resized with nearest-neighbor sampling,
/// and scaled to `[0, 1]`.
#[derive(Clone, Debug)]
pub struct ImagePreprocessor {
    height: u32,
    width: u32,
}

impl ImagePreprocessor {
    /// Height of the classifier input.
    ///
    /// Default: `224`
    pub fn height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    /// Width of the classifier input.
    ///
    /// Default: `224`
    pub fn width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Convert an image to a classifier input.
    ///
    /// *Shape:* `(1, height, width, 3)`
    pub fn preprocess(&self, image: &DynamicImage, device: &Device) -> Result<Tensor, PreprocessError> {
        let resized = image
            .resize_exact(self.width, self.height, FilterType::Nearest)
            .into_rgb8();
        let data = resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.)
            .collect::<Vec<_>>();
        Tensor::from_vec(
            data,
            (1, self.height as usize, self.width as usize, 3),
            device,
        )
        .context(CreateTensorSnafu)
    }

    /// Read an image file and convert it to a classifier input.
    ///
    /// *Shape:* `(1, height, width, 3)`
    pub fn preprocess_file(
        &self,
        path: impl AsRef<Path>,
        device: &Device,
    ) -> Result<Tensor, PreprocessError> {
        let path = path.as_ref();
        let image = image::open(path).context(OpenImageSnafu { path })?;
        self.preprocess(&image, device)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            height: 224,
            width: 224,
        }
    }
}
