use crate::error::{JupyterError, Result};
use url::Url;

/// Every hub and lab endpoint one user talks to, resolved once against the
/// Jupyter base URL.
///
/// Redirect targets are compared against these values byte for byte, so they
/// are built with the same `Url::join` rules the server's `Location` headers
/// are resolved with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JupyterUrls {
    pub base: Url,
    pub hub_login: Url,
    pub hub_home: Url,
    pub hub_root: Url,
    pub hub_spawn: Url,
    pub lab: Url,
    pub user_server: Url,
    pub kernels: Url,
}

impl JupyterUrls {
    /// Resolves every endpoint for `username`.
    ///
    /// The username is always one percent-encoded path segment, so `/`, `?`
    /// and `#` cannot reach another user's resources. `.` and `..` are
    /// rejected outright.
    pub fn new(jupyter_url: &Url, username: &str) -> Result<Self> {
        if username.is_empty() || username == "." || username == ".." {
            return Err(JupyterError::InvalidUsername(username.to_string()));
        }
        let base = with_trailing_slash(jupyter_url);
        Ok(Self {
            hub_login: base.join("hub/login")?,
            hub_home: base.join("hub/home")?,
            hub_root: base.join("hub")?,
            hub_spawn: base.join("hub/spawn")?,
            lab: with_segments(&base, &["user", username, "lab"])?,
            user_server: with_segments(&base, &["hub", "api", "users", username, "server"])?,
            kernels: with_segments(&base, &["user", username, "api", "kernels"])?,
            base,
        })
    }

    /// Streaming endpoint of a kernel, with the scheme switched to `ws`/`wss`.
    pub fn kernel_channels(&self, kernel_id: &str) -> Result<Url> {
        if kernel_id.is_empty() || kernel_id == "." || kernel_id == ".." {
            return Err(JupyterError::MalformedMessage(format!(
                "unusable kernel id {kernel_id:?}"
            )));
        }
        let mut url = with_segments(&self.kernels, &[kernel_id, "channels"])?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(JupyterError::MalformedMessage(format!(
                    "cannot open a kernel channel over {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| JupyterError::MalformedMessage(format!("cannot switch {url} to {scheme}")))?;
        Ok(url)
    }
}

/// Appends each entry of `segments` as a single encoded path segment.
fn with_segments(url: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = url.clone();
    url.path_segments_mut()
        .map_err(|()| JupyterError::UrlParse(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
