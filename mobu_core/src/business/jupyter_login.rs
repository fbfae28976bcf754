use super::{Business, BusinessKind};
use async_trait::async_trait;
use mobu_jupyter_client::{JupyterClient, JupyterError};
use std::time::Duration;
use tracing::{debug, info};

/// Logs in, makes sure a lab is up, sits in it for a while, then deletes it.
#[derive(Debug)]
pub struct JupyterLoginLoop {
    client: JupyterClient,
    lab_idle: Duration,
}

impl JupyterLoginLoop {
    pub fn new(client: JupyterClient, lab_idle: Duration) -> Self {
        Self { client, lab_idle }
    }
}

#[async_trait]
impl Business for JupyterLoginLoop {
    fn kind(&self) -> BusinessKind {
        BusinessKind::JupyterLoginLoop
    }

    async fn cycle(&self) -> Result<Option<String>, JupyterError> {
        self.client.authenticate().await?;
        self.client.ensure_lab().await?;
        info!(idle = ?self.lab_idle, "Lab ready, idling");
        tokio::time::sleep(self.lab_idle).await;
        self.client.delete_lab().await?;
        debug!("Lab deleted");
        Ok(None)
    }

    async fn teardown(&self) -> Result<(), JupyterError> {
        self.client.delete_lab().await
    }

    fn client(&self) -> Option<&JupyterClient> {
        Some(&self.client)
    }
}
