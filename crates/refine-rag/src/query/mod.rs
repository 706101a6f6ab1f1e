//! Query side of the pipeline

pub mod engine;

pub use engine::QueryEngine;
