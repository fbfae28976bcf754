//! # Mobu Core
//!
//! Mobu runs synthetic users against a JupyterHub-based science platform and
//! reports whether the platform keeps working for them. Each simulated user is
//! a *monkey*: it logs in, gets a lab, optionally runs some Python in it, deletes
//! the lab, pauses and does it all again until told to stop.
//!
//! ## Architecture
//!
//! ```text
//! CreateMonkeyRequest -> MonkeyFactory -> Monkey -> Business -> JupyterClient
//!                                            ^
//!                          MonkeyManager ----+  (username -> Monkey)
//! ```
//!
//! - Every monkey owns its own protocol client, cookie jar and anti-forgery
//!   token. Nothing but the registry is shared.
//! - Each monkey's loop is one tokio task. A cycle failure moves the monkey to
//!   `failed` and ends the task; the monkey stays registered with its error
//!   until someone deletes it.
//! - Stopping is cooperative but prompt: one cancellation token per monkey is
//!   observed by the loop and by every wait inside the protocol client.
//!
//! ## Modules
//!
//! - **`business`**: the [`Business`] trait and its variants.
//! - **`monkey`**: one simulated user and its loop task.
//! - **`factory`**: request validation and monkey construction.
//! - **`manager`**: the registry behind the HTTP boundary.
//! - **`config`**: environment URL, timings and spawn options.
//! - **`token`**: where bearer tokens come from.
//! - **`utils::logging`**: global `tracing` setup.

pub mod business;
pub mod config;
pub mod error;
pub mod factory;
pub mod manager;
pub mod monkey;
pub mod token;
pub mod user;
pub mod utils;

pub use business::{Business, BusinessKind};
pub use config::MobuConfig;
pub use error::{MonkeyError, Result};
pub use factory::{CreateMonkeyRequest, MonkeyFactory};
pub use manager::MonkeyManager;
pub use monkey::{BusinessState, Monkey, MonkeyDetail, MonkeySummary};
pub use token::{StaticTokenSource, TokenSource};
pub use user::User;
