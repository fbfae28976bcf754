//! # Monkey Registry
//!
//! [`MonkeyManager`] is the process-wide map from username to [`Monkey`]. It
//! is the only state shared between monkeys, and it is only reachable through
//! the operations below; callers never iterate the map directly.
//!
//! Writes (create, delete, shutdown) take the write lock, so they never
//! interleave with a `list`. Stopping a monkey happens after it has been
//! removed and the lock released, so a slow teardown does not block the
//! registry. Until that teardown finishes the username stays reserved, so a
//! replacement monkey cannot attach to a lab that is about to be deleted.

use crate::error::{MonkeyError, Result};
use crate::factory::{CreateMonkeyRequest, MonkeyFactory};
use crate::monkey::{Monkey, MonkeyDetail, MonkeySummary};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Default)]
struct Registry {
    monkeys: HashMap<String, Arc<Monkey>>,
    /// Usernames whose monkey has been removed but is still tearing down.
    /// They cannot be reused until the old lab is gone.
    stopping: HashSet<String>,
}

pub struct MonkeyManager {
    registry: Arc<RwLock<Registry>>,
    factory: MonkeyFactory,
    shutdown: CancellationToken,
}

impl MonkeyManager {
    pub fn new(factory: MonkeyFactory) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            factory,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn factory(&self) -> &MonkeyFactory {
        &self.factory
    }

    /// Builds and registers a monkey without starting it.
    ///
    /// A username that is registered, or whose previous monkey is still
    /// tearing down, is rejected and the existing monkey is left alone.
    pub async fn create(&self, request: &CreateMonkeyRequest) -> Result<Arc<Monkey>> {
        let monkey = Arc::new(self.factory.create(request, self.shutdown.child_token())?);
        let username = monkey.username().to_string();

        let mut registry = self.registry.write().await;
        if registry.monkeys.contains_key(&username) || registry.stopping.contains(&username) {
            return Err(MonkeyError::AlreadyExists(username));
        }
        registry.monkeys.insert(username.clone(), monkey.clone());
        info!(user = %username, business = %monkey.kind(), "Monkey created");
        Ok(monkey)
    }

    pub async fn start(&self, username: &str) -> Result<()> {
        self.find(username).await?.start()
    }

    /// Creates a monkey and starts its loop.
    pub async fn spawn(&self, request: &CreateMonkeyRequest) -> Result<Arc<Monkey>> {
        let monkey = self.create(request).await?;
        monkey.start()?;
        Ok(monkey)
    }

    /// Summaries of every registered monkey, ordered by username.
    pub async fn list(&self) -> Vec<MonkeySummary> {
        let registry = self.registry.read().await;
        let mut summaries: Vec<_> = registry.monkeys.values().map(|m| m.summary()).collect();
        summaries.sort_by(|a, b| a.username.cmp(&b.username));
        summaries
    }

    pub async fn get(&self, username: &str) -> Result<MonkeyDetail> {
        Ok(self.find(username).await?.detail())
    }

    /// Removes a monkey, then stops it and tears its session down.
    ///
    /// The username stays reserved until teardown has finished. The stop runs
    /// on its own task so it completes even if the caller goes away.
    pub async fn delete(&self, username: &str) -> Result<()> {
        let monkey = {
            let mut registry = self.registry.write().await;
            let monkey = registry
                .monkeys
                .remove(username)
                .ok_or_else(|| MonkeyError::NotFound(username.to_string()))?;
            registry.stopping.insert(username.to_string());
            monkey
        };
        info!(user = %username, "Deleting monkey");

        let registry = self.registry.clone();
        let name = username.to_string();
        let stop = tokio::spawn(async move {
            monkey.stop().await;
            registry.write().await.stopping.remove(&name);
        });
        if let Err(e) = stop.await {
            warn!(user = %username, error = %e, "Stopping monkey failed");
            self.registry.write().await.stopping.remove(username);
        }
        Ok(())
    }

    /// Stops every monkey concurrently and empties the registry.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let monkeys: Vec<_> = {
            let mut registry = self.registry.write().await;
            let drained: Vec<_> = registry.monkeys.drain().collect();
            registry
                .stopping
                .extend(drained.iter().map(|(name, _)| name.clone()));
            drained
        };
        info!(count = monkeys.len(), "Stopping all monkeys");
        join_all(monkeys.iter().map(|(_, monkey)| monkey.stop())).await;

        let mut registry = self.registry.write().await;
        for (name, _) in &monkeys {
            registry.stopping.remove(name);
        }
    }

    pub async fn len(&self) -> usize {
        self.registry.read().await.monkeys.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.read().await.monkeys.is_empty()
    }

    async fn find(&self, username: &str) -> Result<Arc<Monkey>> {
        self.registry
            .read()
            .await
            .monkeys
            .get(username)
            .cloned()
            .ok_or_else(|| MonkeyError::NotFound(username.to_string()))
    }
}
