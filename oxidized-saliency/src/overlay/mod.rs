/// Saliency map overlays.
mod colormap;
pub use colormap::Colormap;

mod compositor;
pub use compositor::{OverlayConfig, OverlayError};
