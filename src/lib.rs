//! Intelligent Daily Schedule Optimizer — core constraint-programming engine.
//!
//! Given a nurse's heterogeneous work items and shift constraints for a
//! single day, produces a totally ordered, non-overlapping timetable,
//! reports items that could not be placed, and scores the result. See
//! `optimizer::optimize_schedule` for the single entry point.

pub mod activity;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalizer;
pub mod optimizer;
pub mod oracle;
pub mod projector;
pub mod request;
pub mod time;

pub use envelope::ResultEnvelope;
pub use error::{AppError, AppResult};
pub use optimizer::optimize_schedule;
pub use oracle::{DefaultParameterOracle, ParameterOracle};
pub use request::OptimizeRequest;
