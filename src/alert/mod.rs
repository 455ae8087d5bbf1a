pub mod alert_config;
pub mod alert_dto;
pub mod alert_handlers;
pub mod alert_models;
pub mod alert_repository;
pub mod collectors;
pub mod rate_limit;
pub mod routes;
pub mod rule_engine;
pub mod scheduler;

pub use alert_config::{AlertConfigRepository, AlertConfigStore};
pub use alert_models::{Alert, AlertConfig, AlertSeverity, AlertType, NewAlert, Thresholds};
pub use alert_repository::{AlertRepository, AlertStore};
pub use collectors::{MetricSource, SqlMetricSource};
pub use rule_engine::{AlertEngine, ScanSummary};
pub use scheduler::start_alert_scheduler;
