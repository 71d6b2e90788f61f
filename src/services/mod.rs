//! Service layer: API client, repository mirror, snapshot sinks, and the
//! sync driver that ties them together.

pub mod gitlab_client;
pub mod mirror;
pub mod snapshot;
pub mod sync_engine;
