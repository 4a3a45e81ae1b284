//! Wildwatch Server
//!
//! HTTP surface of the threat detection service. Uploads and camera frames
//! flow through one shared pipeline: classify, reduce to a verdict, store,
//! keep or delete the artifact, and alert a ranger when asked to.

pub mod artifacts;
pub mod camera;
pub mod cli;
pub mod config;
pub mod geo;
pub mod media;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use cli::Cli;
pub use config::ServerConfig;
pub use routes::create_router;
pub use state::AppState;
