use serde::Serialize;
use std::fmt;

/// A simulated platform user.
///
/// Immutable once built. The bearer token is opaque to the engine and never
/// appears in `Debug` output or serialized summaries.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
    pub uidnumber: u64,
    #[serde(skip)]
    token: String,
}

impl User {
    pub fn new(username: impl Into<String>, uidnumber: u64, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            uidnumber,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("uidnumber", &self.uidnumber)
            .field("token", &"<redacted>")
            .finish()
    }
}
