mod health;
mod metrics;
mod status;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use status::status_handler;
