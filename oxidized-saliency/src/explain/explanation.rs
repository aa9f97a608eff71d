use std::fmt;

use serde::{Deserialize, Serialize};

use crate::explain::SaliencyMap;

/// Explanation methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplanationMethod {
    /// Gradient-weighted class activation mapping on a spatial layer.
    ///
    /// See [Selvaraju et al., 2017](https://arxiv.org/abs/1610.02391).
    #[serde(rename = "gradcam")]
    GradCam,

    /// Integrated gradients with respect to the input.
    ///
    /// See [Sundararajan et al., 2017](https://arxiv.org/abs/1703.01365).
    #[serde(rename = "ig")]
    IntegratedGradients,
}

impl ExplanationMethod {
    /// Method identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ExplanationMethod::GradCam => "gradcam",
            ExplanationMethod::IntegratedGradients => "ig",
        }
    }
}

impl fmt::Display for ExplanationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explanation of a prediction.
#[derive(Clone, Debug, PartialEq)]
pub struct Explanation {
    class_index: usize,
    layer: Option<String>,
    map: SaliencyMap,
    method: ExplanationMethod,
}

impl Explanation {
    pub(crate) fn new(
        map: SaliencyMap,
        class_index: usize,
        method: ExplanationMethod,
        layer: Option<String>,
    ) -> Self {
        Self {
            class_index,
            layer,
            map,
            method,
        }
    }

    /// Index of the explained class.
    ///
    /// This is the class that the classifier predicts for the input.
    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// Layer used by Grad-CAM, `None` for other methods.
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// Saliency map.
    ///
    /// Grad-CAM maps have the spatial resolution of the explained layer,
    /// integrated gradients maps have the input resolution.
    pub fn map(&self) -> &SaliencyMap {
        &self.map
    }

    /// Method that produced the explanation.
    pub fn method(&self) -> ExplanationMethod {
        self.method
    }

    /// Take the saliency map.
    pub fn into_map(self) -> SaliencyMap {
        self.map
    }
}
