use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum JupyterError {
    #[error("hub login failed: HTTP {status}, landed on {url}")]
    AuthenticationFailed { status: u16, url: String },
    #[error("lab attach failed: HTTP {status} from {url}")]
    SessionAttachFailed { status: u16, url: String },
    #[error("lab spawn failed: HTTP {status} from {url}")]
    ProvisioningFailed { status: u16, url: String },
    #[error("lab delete failed: HTTP {status} from {url}")]
    TeardownFailed { status: u16, url: String },
    #[error("kernel creation failed: HTTP {status} from {url}")]
    ExecutionChannelCreateFailed { status: u16, url: String },
    #[error("error running code: {payload}")]
    RemoteExecutionError { payload: Value },
    #[error("kernel channel closed before a reply arrived")]
    ExecutionChannelClosed,
    #[error("malformed kernel message: {0}")]
    MalformedMessage(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL parsing failed: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    #[error("username {0:?} cannot be used in a URL path")]
    InvalidUsername(String),
}

impl From<tungstenite::Error> for JupyterError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl JupyterError {
    /// True when the error came from a cancellation request rather than the platform.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, JupyterError>;
