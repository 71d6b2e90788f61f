//! glbackup - mirror a self-hosted GitLab instance to local storage.
//!
//! A one-shot synchronization job: fetch the user and project catalogs,
//! clone or fast-forward every project repository, and persist catalog
//! snapshots plus per-project pipeline history to JSON files, a local
//! SQLite database, or both. Designed to be rerun from cron; every step
//! is idempotent.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
