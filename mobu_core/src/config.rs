//! # Engine Configuration
//!
//! [`MobuConfig`] carries everything a monkey needs to know about the
//! environment it runs against and how fast it should loop. Parsing it from
//! flags and environment variables is the binary's job; this module only
//! defines the values and their defaults.
//!
//! ## Timing
//!
//! - `poll_interval`: wait between polls of the lab spawn progress page.
//! - `lab_idle`: how long `JupyterLoginLoop` sits in its lab before deleting it.
//! - `cycle_pause`: wait between two cycles of any business.
//! - `teardown_timeout`: bound on the best-effort lab deletion when a monkey is
//!   stopped or the process shuts down.

use crate::error::{MonkeyError, Result};
use mobu_jupyter_client::{DEFAULT_POLL_INTERVAL, JupyterClientConfig, SpawnForm};
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENVIRONMENT_URL: &str = "https://nublado.lsst.codes";
pub const DEFAULT_JUPYTER_PATH: &str = "nb/";
pub const DEFAULT_KERNEL_NAME: &str = "python";
pub const DEFAULT_PYTHON_CODE: &str = "print(2+2)";

#[derive(Debug, Clone)]
pub struct MobuConfig {
    /// Base URL of the environment under test.
    pub environment_url: Url,
    /// Path of the Jupyter deployment relative to `environment_url`.
    pub jupyter_path: String,
    pub poll_interval: Duration,
    pub lab_idle: Duration,
    pub cycle_pause: Duration,
    pub teardown_timeout: Duration,
    pub kernel_name: String,
    /// Code run by `JupyterPythonLoop` each cycle.
    pub python_code: String,
    pub spawn_form: SpawnForm,
}

impl Default for MobuConfig {
    fn default() -> Self {
        Self {
            environment_url: Url::parse(DEFAULT_ENVIRONMENT_URL)
                .expect("default environment URL is valid"),
            jupyter_path: DEFAULT_JUPYTER_PATH.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            lab_idle: Duration::from_secs(60),
            cycle_pause: Duration::from_secs(60),
            teardown_timeout: Duration::from_secs(30),
            kernel_name: DEFAULT_KERNEL_NAME.to_string(),
            python_code: DEFAULT_PYTHON_CODE.to_string(),
            spawn_form: SpawnForm::default(),
        }
    }
}

impl MobuConfig {
    pub fn new(environment_url: Url) -> Self {
        Self {
            environment_url,
            ..Self::default()
        }
    }

    /// Root of the Jupyter deployment, always ending in `/`.
    pub fn jupyter_url(&self) -> Result<Url> {
        let mut base = self.environment_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut path = self.jupyter_path.trim_start_matches('/').to_string();
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        base.join(&path).map_err(|e| {
            MonkeyError::Config(format!(
                "cannot join {} onto {}: {}",
                self.jupyter_path, self.environment_url, e
            ))
        })
    }

    pub fn client_config(&self) -> Result<JupyterClientConfig> {
        Ok(JupyterClientConfig::new(self.jupyter_url()?)
            .with_poll_interval(self.poll_interval)
            .with_spawn_form(self.spawn_form.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let config = MobuConfig::default();
        assert_eq!(config.environment_url.as_str(), "https://nublado.lsst.codes/");
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.kernel_name, "python");
        assert_eq!(
            config.jupyter_url().unwrap().as_str(),
            "https://nublado.lsst.codes/nb/"
        );
    }

    #[test]
    fn jupyter_url_handles_slashes() {
        let mut config = MobuConfig::new(Url::parse("http://localhost:8080/base").unwrap());
        assert_eq!(
            config.jupyter_url().unwrap().as_str(),
            "http://localhost:8080/base/nb/"
        );

        config.jupyter_path = "/lab".to_string();
        assert_eq!(
            config.jupyter_url().unwrap().as_str(),
            "http://localhost:8080/base/lab/"
        );
    }

    #[test]
    fn client_config_carries_timing() {
        let mut config = MobuConfig::default();
        config.poll_interval = Duration::from_millis(5);
        let client = config.client_config().unwrap();
        assert_eq!(client.poll_interval, Duration::from_millis(5));
        assert_eq!(client.jupyter_url, config.jupyter_url().unwrap());
    }
}
