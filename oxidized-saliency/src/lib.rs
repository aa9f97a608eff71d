pub mod architectures;
pub mod error;
pub mod explain;
pub mod layers;
pub mod models;
pub mod overlay;
pub mod pipeline;
pub mod repository;
pub mod util;
