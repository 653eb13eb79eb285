//! Notification engine: validation, storage, delivery orchestration and the
//! background scheduler.

pub mod scheduler;
pub mod service;
pub mod store;
pub mod validation;
