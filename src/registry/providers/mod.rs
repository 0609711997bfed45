pub mod quay;

pub use quay::QuayRegistry;
