pub mod analysis;
pub mod health;

pub use analysis::{analyze_logs, get_analysis_status, get_quick_stats};
pub use health::{health_check, readiness_check};
