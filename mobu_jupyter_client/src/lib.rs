//! # Mobu Jupyter Client
//!
//! Speaks the hub and lab protocol of a JupyterHub-based notebook platform on
//! behalf of one simulated user: hub login, lab spawn with progress polling,
//! kernel creation, code execution over the kernel websocket, and lab
//! deletion.
//!
//! ## Usage
//!
//! ```no_run
//! use mobu_jupyter_client::{JupyterClient, JupyterClientConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JupyterClientConfig::new(Url::parse("https://nublado.example.com/nb/")?);
//! let client = JupyterClient::new("someuser", "opaque-token", &config, CancellationToken::new())?;
//!
//! client.authenticate().await?;
//! client.ensure_lab().await?;
//! let kernel = client.create_kernel("python").await?;
//! let output = client.execute_code(&kernel, "print(2 + 2)").await?;
//! assert_eq!(output, "4\n");
//! client.delete_lab().await?;
//! # Ok(())
//! # }
//! ```

/// Session protocol client.
pub mod client;
/// Error types for protocol operations.
pub mod error;
/// Kernel message envelope and reply classification.
pub mod message;
/// Hub and lab URL templates.
pub mod urls;

pub use client::{ClientSnapshot, DEFAULT_POLL_INTERVAL, JupyterClient, JupyterClientConfig, SpawnForm};
pub use error::{JupyterError, Result};
pub use urls::JupyterUrls;
