//! Seam to the simulation backend that owns entity poses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

use crate::{config::RetryPolicy, error::BackendError};

/// Entity pose in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Pose { x, y, z }
    }
}

/// Frame a pose is expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceFrame {
    World,
    /// Relative to another entity's pose.
    Entity(String),
}

impl std::fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceFrame::World => f.write_str("world"),
            ReferenceFrame::Entity(name) => f.write_str(name),
        }
    }
}

/// Represents a request to create a named entity in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub name: String,
    /// Model document describing the entity's shape and material.
    pub shape: String,
    pub pose: Pose,
    pub reference_frame: ReferenceFrame,
}

/// Simulation backend. All calls are request/response and may be in flight concurrently.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn spawn_entity(&self, request: SpawnRequest) -> Result<(), BackendError>;

    async fn list_entities(&self) -> Result<Vec<String>, BackendError>;

    async fn get_entity_pose(&self, name: &str) -> Result<Pose, BackendError>;

    async fn set_entity_pose(
        &self,
        name: &str,
        reference_frame: &ReferenceFrame,
        pose: Pose,
    ) -> Result<(), BackendError>;
}

/// Wraps a backend with a per-call timeout and bounded exponential backoff.
///
/// Only availability failures are retried. Once the budget is spent the call
/// fails with [`BackendError::Unavailable`].
pub struct RetryingBackend<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: Backend> RetryingBackend<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn call<'a, T, F, Fut>(&'a self, operation: &str, mut f: F) -> Result<T, BackendError>
    where
        F: FnMut(&'a B) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            let outcome = match tokio::time::timeout(self.policy.call_timeout(), f(&self.inner)).await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout),
            };
            match outcome {
                Err(error) if error.is_retryable() => {
                    if attempt == attempts {
                        break;
                    }
                    let delay = self.policy.delay_after(attempt);
                    debug!(operation, attempt, ?delay, %error, "backend not ready, backing off");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
        warn!(operation, attempts, "backend unavailable");
        Err(BackendError::Unavailable { attempts })
    }
}

#[async_trait]
impl<B: Backend> Backend for RetryingBackend<B> {
    async fn spawn_entity(&self, request: SpawnRequest) -> Result<(), BackendError> {
        self.call("spawn_entity", |backend| backend.spawn_entity(request.clone()))
            .await
    }

    async fn list_entities(&self) -> Result<Vec<String>, BackendError> {
        self.call("list_entities", |backend| backend.list_entities())
            .await
    }

    async fn get_entity_pose(&self, name: &str) -> Result<Pose, BackendError> {
        self.call("get_entity_pose", |backend| backend.get_entity_pose(name))
            .await
    }

    async fn set_entity_pose(
        &self,
        name: &str,
        reference_frame: &ReferenceFrame,
        pose: Pose,
    ) -> Result<(), BackendError> {
        self.call("set_entity_pose", |backend| {
            backend.set_entity_pose(name, reference_frame, pose)
        })
        .await
    }
}
