//! # Mobu HTTP
//!
//! The HTTP face of the monkey engine. Monitoring jobs create synthetic users
//! here, watch their status and delete them again.
//!
//! ## Routes
//!
//! Everything except the health check lives under a configurable prefix
//! (`SAFIR_NAME`, default `mobu`):
//!
//! | method | path | result |
//! |---|---|---|
//! | `GET` | `/health` | `OK` |
//! | `GET` | `/mobu` | name, version and description |
//! | `POST` | `/mobu/user` | creates and starts a monkey, `201` with its summary |
//! | `GET` | `/mobu/user` | summaries of every monkey |
//! | `GET` | `/mobu/user/{username}` | one summary plus the session cookies |
//! | `DELETE` | `/mobu/user/{username}` | stops the monkey and deletes its lab, `204` |
//!
//! Failures are returned as `{"error": "..."}`: `400` for bad create requests,
//! `404` for unknown users, `409` for duplicates and `500` otherwise.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mobu_core::{MobuConfig, MonkeyFactory, MonkeyManager, StaticTokenSource};
//! use mobu_http::{ServerConfig, start_server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let factory = MonkeyFactory::new(
//!         Arc::new(MobuConfig::default()),
//!         Arc::new(StaticTokenSource::new("gt-token")),
//!     );
//!     let manager = Arc::new(MonkeyManager::new(factory));
//!     start_server(ServerConfig::default(), manager).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod server;

pub use error::{ApiError, Result, ServerError};
pub use server::{ServerConfig, build_router, serve, start_server};
