pub mod compliance;
pub mod routes;
pub mod schedule_dto;
pub mod schedule_handlers;
pub mod schedule_models;
pub mod schedule_repository;
pub mod schedule_service;

pub use compliance::{ComplianceResult, ComplianceViolation};
pub use schedule_models::{ScheduleBlock, ScheduleStatus, WorkSchedule};
pub use schedule_repository::ScheduleRepository;
pub use schedule_service::ScheduleService;
