//! 🎓 admx, the admissions egress job. Nested lake rows in, partner CSV out.
//!
//! Start at [`job::run`]. Everything else hangs off the
//! [`context::TransformationContext`] it builds.

pub mod app_config;
pub mod backends;
pub mod common;
pub mod context;
pub mod job;
pub mod publish;
pub mod response;
pub mod transforms;
pub mod window;

pub use app_config::{AppConfig, JobOverrides, load_config};
pub use job::{JobOutcome, run};
