//! # Monkey Business
//!
//! A business is one repeatable check scenario. The monkey that owns it calls
//! [`Business::cycle`] over and over, pausing in between, until it is stopped
//! or a cycle fails. Looping, pausing, state tracking and cancellation all live
//! in the monkey; a business only knows how to perform one pass.
//!
//! ## Variants
//!
//! | name | kind | one cycle |
//! |---|---|---|
//! | *(unset)* | [`BusinessKind::Idle`] | nothing |
//! | `JupyterLoginLoop` | [`BusinessKind::JupyterLoginLoop`] | login, ensure lab, idle, delete lab |
//! | `JupyterPythonLoop` | [`BusinessKind::JupyterPythonLoop`] | login, ensure lab, create kernel, run code, delete lab |

mod jupyter_login;
mod jupyter_python;

pub use jupyter_login::JupyterLoginLoop;
pub use jupyter_python::JupyterPythonLoop;

use crate::error::{MonkeyError, Result};
use async_trait::async_trait;
use mobu_jupyter_client::{JupyterClient, JupyterError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of known business variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusinessKind {
    #[serde(rename = "Business")]
    Idle,
    JupyterLoginLoop,
    JupyterPythonLoop,
}

impl BusinessKind {
    pub const ALL: [BusinessKind; 3] = [
        BusinessKind::Idle,
        BusinessKind::JupyterLoginLoop,
        BusinessKind::JupyterPythonLoop,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            BusinessKind::Idle => "Business",
            BusinessKind::JupyterLoginLoop => "JupyterLoginLoop",
            BusinessKind::JupyterPythonLoop => "JupyterPythonLoop",
        }
    }

    /// Resolves the optional `business` field of a create request.
    ///
    /// Absent or empty selects [`BusinessKind::Idle`]; names match exactly.
    pub fn from_request(business: Option<&str>) -> Result<Self> {
        match business {
            None | Some("") => Ok(BusinessKind::Idle),
            Some("JupyterLoginLoop") => Ok(BusinessKind::JupyterLoginLoop),
            Some("JupyterPythonLoop") => Ok(BusinessKind::JupyterPythonLoop),
            Some(other) => Err(MonkeyError::UnknownBusiness(other.to_string())),
        }
    }

    pub const fn needs_client(self) -> bool {
        !matches!(self, BusinessKind::Idle)
    }
}

impl fmt::Display for BusinessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait Business: Send + Sync {
    fn kind(&self) -> BusinessKind;

    /// One pass through the scenario. Returns output worth recording, if any.
    async fn cycle(&self) -> std::result::Result<Option<String>, JupyterError>;

    /// Releases whatever the scenario holds on the platform.
    async fn teardown(&self) -> std::result::Result<(), JupyterError> {
        Ok(())
    }

    /// The protocol client, for variants that talk to the platform.
    fn client(&self) -> Option<&JupyterClient> {
        None
    }
}

/// The business of a monkey that was given nothing to do.
#[derive(Debug, Default)]
pub struct IdleBusiness;

#[async_trait]
impl Business for IdleBusiness {
    fn kind(&self) -> BusinessKind {
        BusinessKind::Idle
    }

    async fn cycle(&self) -> std::result::Result<Option<String>, JupyterError> {
        Ok(None)
    }
}
