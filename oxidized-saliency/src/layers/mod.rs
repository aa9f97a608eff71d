pub mod activation;

pub mod build_layer;

pub mod convolution;

pub mod dense;

pub mod dropout;

pub mod flatten;

pub mod pooling;
