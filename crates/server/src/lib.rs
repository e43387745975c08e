//! Territoires Server - HTTP API for territorial name resolution
//!
//! Exposes the matcher and the batch coordinator over REST, behind an
//! admission gate that throttles every caller:
//!
//! - **Matching**: resolve one free-text name to an official code
//! - **Batches**: submit up to 1000 names, poll progress, fetch ordered results
//! - **Admission**: per-IP and per-API-key quotas with escalation to a block
//! - **Health & Metrics**: liveness/readiness probes and Prometheus metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (reference data loaded)
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Gated Endpoints
//!
//! Every response carries `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
//! `X-RateLimit-Reset`; refusals add `Retry-After`.
//!
//! - `POST /api/v1/match` - Resolve one name
//! - `POST /api/v1/batch` - Submit a batch
//! - `GET /api/v1/batch?clientId=` - Batches of a client, newest first
//! - `GET /api/v1/batch/{id}` - Batch status and progress
//! - `GET /api/v1/batch/{id}/results` - Results, or 202 with `Retry-After`
//! - `GET /api/v1/metadata` - Server metadata

pub mod admission;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
