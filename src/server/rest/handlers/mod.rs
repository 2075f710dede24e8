pub mod containers;
pub mod monitoring;
