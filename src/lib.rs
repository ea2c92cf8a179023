//! Cutting Stock
//!
//! One-dimensional cutting stock by column generation: a restricted master
//! linear program over cutting patterns, an integer knapsack that prices new
//! patterns from the master's dual prices, and a final integer re-solve of the
//! master that turns the fractional plan into whole rolls.

pub mod config;
pub mod fixtures;
pub mod instance;
pub mod logging;
pub mod patterns;
pub mod prelude;
pub mod report;
pub mod solvers;
