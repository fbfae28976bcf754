//! Turns create requests into monkeys.

use crate::business::{Business, BusinessKind, IdleBusiness, JupyterLoginLoop, JupyterPythonLoop};
use crate::config::MobuConfig;
use crate::error::{MonkeyError, Result};
use crate::monkey::Monkey;
use crate::token::TokenSource;
use crate::user::User;
use mobu_jupyter_client::JupyterClient;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Body of a create request. Every field is optional on the wire so that
/// missing fields surface as [`MonkeyError::InvalidRequest`] rather than as a
/// deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateMonkeyRequest {
    pub username: Option<String>,
    pub uidnumber: Option<u64>,
    pub business: Option<String>,
}

impl CreateMonkeyRequest {
    pub fn new(username: impl Into<String>, uidnumber: u64) -> Self {
        Self {
            username: Some(username.into()),
            uidnumber: Some(uidnumber),
            business: None,
        }
    }

    pub fn with_business(mut self, business: impl Into<String>) -> Self {
        self.business = Some(business.into());
        self
    }
}

#[derive(Clone)]
pub struct MonkeyFactory {
    config: Arc<MobuConfig>,
    tokens: Arc<dyn TokenSource>,
}

impl MonkeyFactory {
    pub fn new(config: Arc<MobuConfig>, tokens: Arc<dyn TokenSource>) -> Self {
        Self { config, tokens }
    }

    pub fn config(&self) -> &MobuConfig {
        &self.config
    }

    /// Validates `request` and builds an unstarted monkey.
    ///
    /// `cancel` becomes the monkey's stop signal and is shared with its
    /// protocol client.
    pub fn create(&self, request: &CreateMonkeyRequest, cancel: CancellationToken) -> Result<Monkey> {
        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MonkeyError::InvalidRequest("username is required".to_string()))?;
        validate_username(username)?;
        let uidnumber = request
            .uidnumber
            .ok_or_else(|| MonkeyError::InvalidRequest("uidnumber is required".to_string()))?;
        let kind = BusinessKind::from_request(request.business.as_deref())?;

        let token = self.tokens.token_for(username, uidnumber)?;
        let user = User::new(username, uidnumber, token);

        let business: Arc<dyn Business> = match kind {
            BusinessKind::Idle => Arc::new(IdleBusiness),
            BusinessKind::JupyterLoginLoop => Arc::new(JupyterLoginLoop::new(
                self.client(&user, cancel.clone())?,
                self.config.lab_idle,
            )),
            BusinessKind::JupyterPythonLoop => Arc::new(JupyterPythonLoop::new(
                self.client(&user, cancel.clone())?,
                self.config.kernel_name.clone(),
                self.config.python_code.clone(),
            )),
        };
        debug!(user = %username, business = %kind, "Monkey built");

        Ok(Monkey::new(
            user,
            business,
            cancel,
            self.config.cycle_pause,
            self.config.teardown_timeout,
        ))
    }

    fn client(&self, user: &User, cancel: CancellationToken) -> Result<JupyterClient> {
        Ok(JupyterClient::new(
            &user.username,
            user.token(),
            &self.config.client_config()?,
            cancel,
        )?)
    }
}

/// Usernames end up in hub URL paths, so only letters, digits, `-`, `_`
/// and `.` are accepted, and a name cannot start with `.`.
fn validate_username(username: &str) -> Result<()> {
    let valid = !username.starts_with('.')
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(MonkeyError::InvalidRequest(format!(
            "username {username:?} may only contain letters, digits, '-', '_' and '.'"
        )))
    }
}
