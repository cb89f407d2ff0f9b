pub mod middleware;
pub mod routes;

// Re-export public types and functions
pub use middleware::log_requests;
pub use routes::{AnalyzeResponse, analyze, healthz, index};
