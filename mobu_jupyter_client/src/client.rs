use crate::error::{JupyterError, Result};
use crate::message::{KernelMessage, ReplyEvent, classify_reply};
use crate::urls::JupyterUrls;
use futures::{SinkExt, Stream, StreamExt};
use reqwest::{
    RequestBuilder, Response, StatusCode,
    cookie::{CookieStore, Jar},
    header::{self, HeaderMap, HeaderValue},
    redirect::Policy,
};
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message, client::IntoClientRequest, handshake::client::Request},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

const XSRF_HEADER: &str = "x-xsrftoken";
const XSRF_COOKIE: &str = "_xsrf";
const XSRF_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const XSRF_LEN: usize = 16;

/// How long to wait between polls of the spawn progress page.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Form body posted to the hub spawn page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnForm {
    pub kernel_image: String,
    pub image_tag: String,
    pub size: String,
}

impl Default for SpawnForm {
    fn default() -> Self {
        Self {
            kernel_image: "lsstsqre/sciplat-lab:recommended".to_string(),
            image_tag: "latest".to_string(),
            size: "small".to_string(),
        }
    }
}

/// Settings shared by every client built for one environment.
#[derive(Debug, Clone)]
pub struct JupyterClientConfig {
    /// Root of the Jupyter deployment, e.g. `https://nublado.example.com/nb/`.
    pub jupyter_url: Url,
    pub poll_interval: Duration,
    pub spawn_form: SpawnForm,
}

impl JupyterClientConfig {
    pub fn new(jupyter_url: Url) -> Self {
        Self {
            jupyter_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            spawn_form: SpawnForm::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_spawn_form(mut self, form: SpawnForm) -> Self {
        self.spawn_form = form;
        self
    }
}

/// Diagnostic view of a client's session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub cookies: Vec<String>,
}

#[derive(Deserialize)]
struct KernelInfo {
    id: String,
}

/// One user's authenticated conversation with the hub and their lab.
///
/// The hub has no "am I logged in" endpoint; every state check is answered by
/// following redirects and comparing where the request landed. All requests
/// therefore follow redirects, except the spawn POST whose 302 carries the
/// progress URL.
///
/// Cookies set by the hub accumulate in a jar owned by this client alone. The
/// anti-forgery token is sent both as the `x-xsrftoken` header and as the
/// `_xsrf` cookie.
///
/// Every request and wait is raced against the client's cancellation token,
/// so stopping the owner interrupts even the unbounded spawn poll. The one
/// exception is [`JupyterClient::delete_lab`], which must still work after
/// the owner has been stopped.
pub struct JupyterClient {
    username: String,
    urls: JupyterUrls,
    http: reqwest::Client,
    http_no_redirect: reqwest::Client,
    jar: Arc<Jar>,
    authorization: String,
    xsrf_token: String,
    poll_interval: Duration,
    spawn_form: SpawnForm,
    cancel: CancellationToken,
}

impl std::fmt::Debug for JupyterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JupyterClient")
            .field("username", &self.username)
            .field("base", &self.urls.base.as_str())
            .field("poll_interval", &self.poll_interval)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl JupyterClient {
    pub fn new(
        username: &str,
        token: &str,
        config: &JupyterClientConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let urls = JupyterUrls::new(&config.jupyter_url, username)?;
        let xsrf_token = generate_xsrf_token();
        let authorization = format!("Bearer {token}");

        let mut headers = HeaderMap::new();
        let mut auth_value = header_value(&authorization)?;
        auth_value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(XSRF_HEADER, header_value(&xsrf_token)?);

        let jar = Arc::new(Jar::default());
        jar.add_cookie_str(&format!("{XSRF_COOKIE}={xsrf_token}; Path=/"), &urls.base);

        let http = reqwest::Client::builder()
            .default_headers(headers.clone())
            .cookie_provider(jar.clone())
            .build()?;
        let http_no_redirect = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            username: username.to_string(),
            urls,
            http,
            http_no_redirect,
            jar,
            authorization,
            xsrf_token,
            poll_interval: config.poll_interval,
            spawn_form: config.spawn_form.clone(),
            cancel,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn urls(&self) -> &JupyterUrls {
        &self.urls
    }

    pub fn xsrf_token(&self) -> &str {
        &self.xsrf_token
    }

    /// Logs into the hub. The login page must redirect to the hub home page.
    pub async fn authenticate(&self) -> Result<()> {
        let response = self.send(self.http.get(self.urls.hub_login.clone())).await?;
        let status = response.status();
        if status != StatusCode::OK || response.url() != &self.urls.hub_home {
            return Err(JupyterError::AuthenticationFailed {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        debug!(user = %self.username, "Logged into hub");
        Ok(())
    }

    /// Attaches to a running lab, or spawns one if there is none.
    pub async fn ensure_lab(&self) -> Result<()> {
        info!(user = %self.username, "Ensure lab");
        if self.is_lab_running().await? {
            self.attach_lab().await
        } else {
            self.spawn_lab().await
        }
    }

    /// The hub bounces users without a lab to the spawn page; landing anywhere
    /// else means a lab is running.
    ///
    /// A non-200 answer is logged but does not fail the probe.
    pub async fn is_lab_running(&self) -> Result<bool> {
        let response = self.send(self.http.get(self.urls.hub_root.clone())).await?;
        let status = response.status();
        if status != StatusCode::OK {
            error!(
                user = %self.username,
                status = status.as_u16(),
                url = %response.url(),
                "Unexpected status probing hub"
            );
        }
        info!(
            user = %self.username,
            from = %self.urls.hub_root,
            to = %response.url(),
            "Probed hub for running lab"
        );
        Ok(response.url() != &self.urls.hub_spawn)
    }

    pub async fn attach_lab(&self) -> Result<()> {
        info!(user = %self.username, "Logging into lab");
        let response = self.send(self.http.get(self.urls.lab.clone())).await?;
        if response.status() != StatusCode::OK {
            return Err(JupyterError::SessionAttachFailed {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(())
    }

    /// Posts the spawn form and polls the progress page until it lands on the lab.
    ///
    /// The poll has no attempt limit; only cancellation ends it early.
    pub async fn spawn_lab(&self) -> Result<()> {
        let spawn_url = &self.urls.hub_spawn;

        // The hub renders the spawn form before it accepts a POST.
        let page = self.send(self.http.get(spawn_url.clone())).await?;
        self.cancellable(async { page.text().await.map_err(JupyterError::from) })
            .await?;

        let response = self
            .send(
                self.http_no_redirect
                    .post(spawn_url.clone())
                    .form(&self.spawn_form),
            )
            .await?;
        if response.status() != StatusCode::FOUND {
            return Err(JupyterError::ProvisioningFailed {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            });
        }

        let progress_url = progress_url(&response)?;
        info!(user = %self.username, %progress_url, "Watching progress url");

        let mut polls: u32 = 0;
        loop {
            let response = self.send(self.http.get(progress_url.clone())).await?;
            polls += 1;
            if response.url() == &self.urls.lab {
                info!(user = %self.username, polls, url = %response.url(), "Lab spawned");
                return Ok(());
            }
            debug!(
                user = %self.username,
                polls,
                status = response.status().as_u16(),
                url = %response.url(),
                "Still waiting for lab to spawn"
            );
            self.cancellable(async {
                tokio::time::sleep(self.poll_interval).await;
                Ok(())
            })
            .await?;
        }
    }

    /// Deletes the user's lab server. Not raced against cancellation.
    pub async fn delete_lab(&self) -> Result<()> {
        let server_url = &self.urls.user_server;
        info!(user = %self.username, url = %server_url, "Deleting lab");

        let response = self
            .http
            .delete(server_url.clone())
            .header(header::REFERER, self.urls.hub_home.as_str())
            .send()
            .await?;
        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(JupyterError::TeardownFailed {
                status: status.as_u16(),
                url: response.url().to_string(),
            }),
        }
    }

    /// Starts a kernel in the lab and returns its id.
    pub async fn create_kernel(&self, kernel_name: &str) -> Result<String> {
        let body = serde_json::json!({ "name": kernel_name });
        let response = self
            .send(self.http.post(self.urls.kernels.clone()).json(&body))
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(JupyterError::ExecutionChannelCreateFailed {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            });
        }
        let kernel: KernelInfo = self
            .cancellable(async { response.json().await.map_err(JupyterError::from) })
            .await?;
        debug!(user = %self.username, kernel_id = %kernel.id, "Kernel created");
        Ok(kernel.id)
    }

    /// Runs `code` on a kernel and returns the first stream output it produces.
    ///
    /// Blocks until the kernel answers with matching output or an error; there
    /// is no timeout beyond cancellation.
    pub async fn execute_code(&self, kernel_id: &str, code: &str) -> Result<String> {
        let url = self.urls.kernel_channels(kernel_id)?;
        let request = self.channel_request(&url)?;
        let (mut socket, _) = self
            .cancellable(async { connect_async(request).await.map_err(JupyterError::from) })
            .await?;

        let message = KernelMessage::execute_request(code);
        debug!(user = %self.username, msg_id = message.msg_id(), "Sending execute_request");
        socket
            .send(Message::Text(serde_json::to_string(&message)?.into()))
            .await?;

        let reply = self
            .cancellable(wait_for_reply(&mut socket, message.msg_id()))
            .await;
        if let Err(e) = socket.close(None).await {
            debug!(user = %self.username, "Closing kernel channel failed: {}", e);
        }
        reply
    }

    /// Cookies currently held for the hub.
    pub fn snapshot(&self) -> ClientSnapshot {
        let cookies = self
            .jar
            .cookies(&self.urls.base)
            .and_then(|value| value.to_str().ok().map(str::to_owned))
            .map(|joined| joined.split("; ").map(str::to_owned).collect())
            .unwrap_or_default();
        ClientSnapshot { cookies }
    }

    fn channel_request(&self, url: &Url) -> Result<Request> {
        let mut request = url.as_str().into_client_request()?;
        let cookies = self
            .jar
            .cookies(&self.urls.kernels)
            .and_then(|value| value.to_str().ok().map(str::to_owned));

        let headers = request.headers_mut();
        for (name, value) in [
            ("authorization", Some(self.authorization.as_str())),
            (XSRF_HEADER, Some(self.xsrf_token.as_str())),
            ("cookie", cookies.as_deref()),
        ] {
            if let Some(value) = value {
                let value = tungstenite::http::HeaderValue::from_str(value)
                    .map_err(|e| JupyterError::InvalidHeader(e.to_string()))?;
                headers.insert(name, value);
            }
        }
        Ok(request)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.cancellable(async { request.send().await.map_err(JupyterError::from) })
            .await
    }

    async fn cancellable<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(JupyterError::Cancelled),
            result = operation => result,
        }
    }
}

/// Reads kernel frames until our request produces output or the kernel errors.
pub(crate) async fn wait_for_reply<S>(frames: &mut S, msg_id: &str) -> Result<String>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = frames.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(JupyterError::ExecutionChannelClosed),
            _ => continue,
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str())?;
        match classify_reply(&value, msg_id)? {
            ReplyEvent::Output(output) => return Ok(output),
            ReplyEvent::Error(payload) => return Err(JupyterError::RemoteExecutionError { payload }),
            ReplyEvent::Unrelated => continue,
        }
    }
    Err(JupyterError::ExecutionChannelClosed)
}

fn progress_url(response: &Response) -> Result<Url> {
    match response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
    {
        Some(location) => Ok(response.url().join(location)?),
        None => Ok(response.url().clone()),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| JupyterError::InvalidHeader(e.to_string()))
}

fn generate_xsrf_token() -> String {
    (0..XSRF_LEN)
        .map(|_| XSRF_ALPHABET[rand::random_range(0..XSRF_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn text(value: serde_json::Value) -> std::result::Result<Message, tungstenite::Error> {
        Ok(Message::Text(value.to_string().into()))
    }

    #[test]
    fn xsrf_token_shape() {
        let token = generate_xsrf_token();
        assert_eq!(token.len(), 16);
        assert!(token.bytes().all(|b| XSRF_ALPHABET.contains(&b)));
    }

    #[test]
    fn spawn_form_defaults() {
        let form = SpawnForm::default();
        assert_eq!(form.kernel_image, "lsstsqre/sciplat-lab:recommended");
        assert_eq!(form.image_tag, "latest");
        assert_eq!(form.size, "small");
    }

    #[tokio::test]
    async fn reply_skips_unrelated_frames() {
        let mut frames = stream::iter(vec![
            text(json!({"msg_type": "status", "parent_header": {"msg_id": "m1"}, "content": {}})),
            Ok(Message::Ping(Vec::new().into())),
            text(json!({
                "msg_type": "stream",
                "parent_header": {"msg_id": "someone-else"},
                "content": {"text": "wrong\n"}
            })),
            text(json!({
                "msg_type": "stream",
                "parent_header": {"msg_id": "m1"},
                "content": {"text": "right\n"}
            })),
        ]);

        let output = wait_for_reply(&mut frames, "m1").await.unwrap();
        assert_eq!(output, "right\n");
    }

    #[tokio::test]
    async fn reply_error_frame_raises() {
        let mut frames = stream::iter(vec![text(json!({
            "msg_type": "error",
            "parent_header": {"msg_id": "m1"},
            "content": {"ename": "ZeroDivisionError"}
        }))]);

        let err = wait_for_reply(&mut frames, "m1").await.unwrap_err();
        match err {
            JupyterError::RemoteExecutionError { payload } => {
                assert_eq!(payload["content"]["ename"], "ZeroDivisionError");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reply_stream_end_is_channel_closed() {
        let mut frames = stream::iter(vec![text(
            json!({"msg_type": "status", "content": {}}),
        )]);
        let err = wait_for_reply(&mut frames, "m1").await.unwrap_err();
        assert!(matches!(err, JupyterError::ExecutionChannelClosed));

        let mut frames = stream::iter(vec![Ok(Message::Close(None))]);
        let err = wait_for_reply(&mut frames, "m1").await.unwrap_err();
        assert!(matches!(err, JupyterError::ExecutionChannelClosed));
    }

    #[tokio::test]
    async fn reply_rejects_non_json_text() {
        let mut frames = stream::iter(vec![Ok(Message::Text("not json".into()))]);
        let err = wait_for_reply(&mut frames, "m1").await.unwrap_err();
        assert!(matches!(err, JupyterError::Json(_)));
    }
}
