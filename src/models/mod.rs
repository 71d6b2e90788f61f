//! Data models for the mirrored entities.
//!
//! All three are read-only mirrors of remote truth: created or refreshed by
//! a sync run, never mutated locally, never deleted. Each module also holds
//! the sqlx insert helpers for the database sink.

pub mod pipeline;
pub mod project;
pub mod user;

pub use pipeline::Pipeline;
pub use project::Project;
pub use user::User;
