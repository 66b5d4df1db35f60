//! # Utility Functions (`utils`)
//!
//! Provides helpers around the optimizers, currently state serialization.

pub mod serialization;

pub use serialization::{load, load_state, save, save_state, SerializationError};
