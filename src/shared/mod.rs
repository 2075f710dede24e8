pub mod config;
pub mod logging;
pub mod models;

pub use config::Settings;
pub use models::AppState;
