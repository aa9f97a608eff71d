use image::Rgb;
use serde::{Deserialize, Serialize};

/// Number of entries in a color lookup table.
const LUT_SIZE: usize = 256;

/// Piecewise-linear color channel: `(x, y)` anchors with `x` from `0` to `1`.
type Segments = &'static [(f32, f32)];

static JET: [Segments; 3] = [
    &[(0., 0.), (0.35, 0.), (0.66, 1.), (0.89, 1.), (1., 0.5)],
    &[(0., 0.), (0.125, 0.), (0.375, 1.), (0.64, 1.), (0.91, 0.), (1., 0.)],
    &[(0., 0.5), (0.11, 1.), (0.34, 1.), (0.65, 0.), (1., 0.)],
];

static HOT: [Segments; 3] = [
    &[(0., 0.0416), (0.365079, 1.), (1., 1.)],
    &[(0., 0.), (0.365079, 0.), (0.746032, 1.), (1., 1.)],
    &[(0., 0.), (0.746032, 0.), (1., 1.)],
];

/// Color maps for saliency maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    /// Blue through cyan, yellow, and red.
    #[default]
    Jet,

    /// Black through red and yellow to white.
    Hot,
}

impl Colormap {
    fn segments(self) -> &'static [Segments; 3] {
        match self {
            Colormap::Jet => &JET,
            Colormap::Hot => &HOT,
        }
    }

    /// Colors of all 8-bit scalar values.
    ///
    /// The scalar `v` is looked up in a table with 256 evenly-spaced
    /// entries at index `min(floor(v / 255 * 256), 255)`, color channels are
    /// truncated to 8 bits.
    pub fn color_table(self) -> [Rgb<u8>; 256] {
        let segments = self.segments();
        let lut: Vec<[f32; 3]> = (0..LUT_SIZE)
            .map(|idx| {
                let x = idx as f32 / (LUT_SIZE - 1) as f32;
                [
                    interpolate(segments[0], x),
                    interpolate(segments[1], x),
                    interpolate(segments[2], x),
                ]
            })
            .collect();

        std::array::from_fn(|value| {
            let idx = ((value as f32 / 255. * LUT_SIZE as f32) as usize).min(LUT_SIZE - 1);
            Rgb(lut[idx].map(|channel| (channel * 255.) as u8))
        })
    }
}

fn interpolate(segments: Segments, x: f32) -> f32 {
    for pair in segments.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        if x <= x1 {
            return y0 + (x - x0) / (x1 - x0) * (y1 - y0);
        }
    }

    segments.last().map(|&(_, y)| y).unwrap_or(0.)
}
