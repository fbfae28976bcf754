use super::{Business, BusinessKind};
use async_trait::async_trait;
use mobu_jupyter_client::{JupyterClient, JupyterError};
use tracing::{debug, info};

/// Logs in, makes sure a lab is up, runs a snippet in a fresh kernel and
/// deletes the lab. The kernel's output is the cycle's output.
#[derive(Debug)]
pub struct JupyterPythonLoop {
    client: JupyterClient,
    kernel_name: String,
    code: String,
}

impl JupyterPythonLoop {
    pub fn new(client: JupyterClient, kernel_name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            client,
            kernel_name: kernel_name.into(),
            code: code.into(),
        }
    }
}

#[async_trait]
impl Business for JupyterPythonLoop {
    fn kind(&self) -> BusinessKind {
        BusinessKind::JupyterPythonLoop
    }

    async fn cycle(&self) -> Result<Option<String>, JupyterError> {
        self.client.authenticate().await?;
        self.client.ensure_lab().await?;
        let kernel = self.client.create_kernel(&self.kernel_name).await?;
        debug!(%kernel, "Kernel created");
        let output = self.client.execute_code(&kernel, &self.code).await?;
        info!(output = %output.trim_end(), "Code executed");
        self.client.delete_lab().await?;
        Ok(Some(output))
    }

    async fn teardown(&self) -> Result<(), JupyterError> {
        self.client.delete_lab().await
    }

    fn client(&self) -> Option<&JupyterClient> {
        Some(&self.client)
    }
}
