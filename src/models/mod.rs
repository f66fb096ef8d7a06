pub mod drone;
pub mod health_sample;
pub mod kit;
pub mod pattern;
pub mod signal;
