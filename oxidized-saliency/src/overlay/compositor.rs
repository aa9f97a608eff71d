use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use snafu::{ensure, ResultExt, Snafu};

use crate::explain::SaliencyMap;
use crate::overlay::Colormap;

/// Overlay errors.
#[derive(Debug, Snafu)]
pub enum OverlayError {
    #[snafu(display("Blend factor must be in [0, 1], got: {alpha}"))]
    Alpha { alpha: f32 },

    #[snafu(display("Cannot overlay an empty {what}"))]
    Empty { what: &'static str },

    #[snafu(display("Cannot open image: {path:?}"))]
    OpenImage {
        source: image::ImageError,
        path: PathBuf,
    },
}

/// Saliency map overlay configuration.
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    alpha: f32,
    colormap: Colormap,
}

impl OverlayConfig {
    /// Weight of the colored saliency map in the blend.
    ///
    /// Must be in `[0, 1]`, `0` keeps the original image.
    ///
    /// Default: `0.4`
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Color map applied to the saliency map.
    ///
    /// Default: `Colormap::Jet`
    pub fn colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }

    /// Blend a saliency map over an image.
    ///
    /// The map is scaled to 8 bits, resized to the image size with bicubic
    /// filtering, and colored. The result is
    /// `(1 - alpha) * image + alpha * colored`.
    ///
    /// * `map` - Saliency map of any resolution.
    /// * `image` - The original image.
    ///
    /// Returns an image with the size of `image`.
    pub fn overlay(&self, map: &SaliencyMap, image: &RgbImage) -> Result<RgbImage, OverlayError> {
        ensure!(
            (0.0..=1.0).contains(&self.alpha),
            AlphaSnafu { alpha: self.alpha }
        );
        let (map_height, map_width) = map.dim();
        ensure!(
            map_height > 0 && map_width > 0,
            EmptySnafu {
                what: "saliency map"
            }
        );
        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, EmptySnafu { what: "image" });

        let values = map.values();
        let heatmap = GrayImage::from_fn(map_width as u32, map_height as u32, |x, y| {
            Luma([(255. * values[[y as usize, x as usize]]).clamp(0., 255.) as u8])
        });
        let heatmap = imageops::resize(&heatmap, width, height, FilterType::CatmullRom);

        let colors = self.colormap.color_table();
        let alpha = self.alpha;
        Ok(RgbImage::from_fn(width, height, |x, y| {
            let original = image.get_pixel(x, y);
            let colored = colors[heatmap.get_pixel(x, y)[0] as usize];
            Rgb(std::array::from_fn(|c| {
                ((1. - alpha) * original[c] as f32 + alpha * colored[c] as f32)
                    .round()
                    .clamp(0., 255.) as u8
            }))
        }))
    }

    /// Blend a saliency map over an image file.
    ///
    /// The image is converted to RGB. See [OverlayConfig::overlay].
    ///
    /// * `map` - Saliency map of any resolution.
    /// * `path` - Path of the original image.
    pub fn overlay_image_file(
        &self,
        map: &SaliencyMap,
        path: impl AsRef<Path>,
    ) -> Result<RgbImage, OverlayError> {
        let path = path.as_ref();
        let image = image::open(path)
            .context(OpenImageSnafu { path })?
            .into_rgb8();
        self.overlay(map, &image)
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            alpha: 0.4,
            colormap: Colormap::Jet,
        }
    }
}
