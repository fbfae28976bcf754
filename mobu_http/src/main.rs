use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use mobu_core::utils::logging::init_logging;
use mobu_core::{MobuConfig, MonkeyFactory, MonkeyManager, StaticTokenSource};
use mobu_http::{ServerConfig, start_server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Profile {
    Development,
    Production,
}

/// Runs synthetic users against a science platform and serves their status.
#[derive(Parser, Debug)]
#[command(name = "mobu")]
#[command(version, about)]
struct Args {
    /// Base URL of the environment under test.
    #[arg(long, env = "ENVIRONMENT_URL", default_value = "https://nublado.lsst.codes")]
    environment_url: Url,

    /// Route prefix of the HTTP API.
    #[arg(long, env = "SAFIR_NAME", default_value = "mobu")]
    name: String,

    /// Development enables colored log output.
    #[arg(long, env = "SAFIR_PROFILE", value_enum, default_value = "development")]
    profile: Profile,

    #[arg(long, env = "SAFIR_LOG_LEVEL", default_value = "INFO")]
    log_level: String,

    /// Write logs to a daily rolling file instead of stderr.
    #[arg(long, env = "MOBU_LOG_TO_FILE")]
    log_to_file: bool,

    #[arg(long, env = "MOBU_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Bearer token handed to every simulated user.
    #[arg(long, env = "MOBU_TOKEN", hide_env_values = true, conflicts_with = "token_file")]
    token: Option<String>,

    /// File holding the bearer token.
    #[arg(long, env = "MOBU_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Seconds between polls of the lab spawn progress page.
    #[arg(long, env = "MOBU_POLL_INTERVAL_SECS", default_value_t = 15)]
    poll_interval_secs: u64,

    /// Seconds between business cycles.
    #[arg(long, env = "MOBU_CYCLE_PAUSE_SECS", default_value_t = 60)]
    cycle_pause_secs: u64,

    /// Seconds a login loop keeps its lab before deleting it.
    #[arg(long, env = "MOBU_LAB_IDLE_SECS", default_value_t = 60)]
    lab_idle_secs: u64,
}

impl Args {
    fn token_source(&self) -> anyhow::Result<StaticTokenSource> {
        match (&self.token, &self.token_file) {
            (Some(token), _) if !token.trim().is_empty() => Ok(StaticTokenSource::new(token.trim())),
            (_, Some(path)) => StaticTokenSource::from_file(path)
                .with_context(|| format!("loading token from {}", path.display())),
            _ => bail!("a bearer token is required: set MOBU_TOKEN or MOBU_TOKEN_FILE"),
        }
    }

    fn mobu_config(&self) -> MobuConfig {
        let mut config = MobuConfig::new(self.environment_url.clone());
        config.poll_interval = Duration::from_secs(self.poll_interval_secs);
        config.cycle_pause = Duration::from_secs(self.cycle_pause_secs);
        config.lab_idle = Duration::from_secs(self.lab_idle_secs);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(
        &args.log_level,
        args.log_to_file,
        args.profile == Profile::Development,
    )?;

    let config = args.mobu_config();
    let tokens = args.token_source()?;
    // Fail at startup rather than on the first create request.
    config.jupyter_url()?;

    tracing::info!(
        environment = %config.environment_url,
        profile = ?args.profile,
        "Starting mobu"
    );

    let factory = MonkeyFactory::new(Arc::new(config), Arc::new(tokens));
    let manager = Arc::new(MonkeyManager::new(factory));
    let server = ServerConfig {
        bind_addr: args.bind_addr,
        name: args.name,
    };
    start_server(server, manager).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobu_core::TokenSource;
    use std::fs;
    use tempfile::tempdir;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["mobu", "--environment-url", "http://localhost:8080/"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn timing_flags_reach_config() {
        let args = parse(&["--poll-interval-secs", "1", "--cycle-pause-secs", "2", "--lab-idle-secs", "3"]);
        let config = args.mobu_config();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.cycle_pause, Duration::from_secs(2));
        assert_eq!(config.lab_idle, Duration::from_secs(3));
        assert_eq!(config.environment_url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn token_from_flag_or_file() {
        let args = parse(&["--token", "abc"]);
        assert_eq!(args.token_source().unwrap().token_for("u", 1).unwrap(), "abc");

        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "from-file\n").unwrap();
        let args = parse(&["--token-file", path.to_str().unwrap()]);
        assert_eq!(
            args.token_source().unwrap().token_for("u", 1).unwrap(),
            "from-file"
        );
    }

    #[test]
    fn token_and_token_file_conflict() {
        let result = Args::try_parse_from([
            "mobu",
            "--token",
            "abc",
            "--token-file",
            "/tmp/token",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn profile_parses_lowercase() {
        let args = parse(&["--profile", "production", "--token", "x"]);
        assert_eq!(args.profile, Profile::Production);
    }

    #[test]
    fn profile_defaults_to_development() {
        let args = parse(&["--token", "x"]);
        assert_eq!(args.profile, Profile::Development);
    }
}
