//! Pipeline execution and the stages it runs

pub mod builder;
pub mod pipeline;
pub mod runner;
pub mod stages;
