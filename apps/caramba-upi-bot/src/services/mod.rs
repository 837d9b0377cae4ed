pub mod notify_service;
pub mod settlement_service;
pub mod sweep_service;
