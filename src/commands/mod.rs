pub mod check_config;
pub mod diagnose;
pub mod fetch;

pub use check_config::run_check_config;
pub use diagnose::run_diagnose;
pub use fetch::run_fetch;
