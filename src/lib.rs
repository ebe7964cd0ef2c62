//! Assessment session engine.
//!
//! Generates multi-part ("Teil") exam sessions through a bounded pool of
//! concurrent gateway calls, makes Teils durably visible strictly in plan
//! order via a reorder buffer, and grades submitted answers with per-module
//! marking strategies into teil- and module-level score summaries.

pub mod config;
pub mod error;
pub mod gateway;
pub mod generate;
pub mod grading;
pub mod model;
pub mod plan;
pub mod scoring;
pub mod service;
pub mod storage;

pub use error::{AppError, AppResult};
pub use service::SessionService;
