/// Model repositories.
pub mod hf_hub;
pub mod local;
pub mod repo;
