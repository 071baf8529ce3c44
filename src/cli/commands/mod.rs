pub mod plugins;
pub mod scan;
