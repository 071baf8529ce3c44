//! Scan model shared by the executor and the stages

pub mod context;
pub mod errors;
pub mod report;
pub mod stage;
