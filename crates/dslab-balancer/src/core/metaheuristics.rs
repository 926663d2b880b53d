//! Implementations of population-based optimizers.

pub mod gwo;
pub mod pco;
pub mod pso;
