//! # Utilities Module
//!
//! Seeded randomness and dice, grid mathematics, and pathfinding helpers shared
//! by generation and the turn engine.

pub mod math;
pub mod pathfinding;
pub mod rng;

pub use math::*;
pub use pathfinding::*;
pub use rng::*;
