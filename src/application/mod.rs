//! Application layer: wires adapters, services and the reactor together.

pub mod engine;

pub use engine::Engine;
