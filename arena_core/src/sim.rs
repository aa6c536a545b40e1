//! In-memory stand-in for the simulation backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    backend::{Backend, Pose, ReferenceFrame, SpawnRequest},
    error::BackendError,
};

#[derive(Debug, Default)]
struct SimState {
    entities: BTreeMap<String, Pose>,
    spawned: Vec<SpawnRequest>,
    unavailable: bool,
    fail_next: u32,
    calls: u64,
}

impl SimState {
    /// Counts the call and reports whether the backend answers it.
    fn answer(&mut self) -> Result<(), BackendError> {
        self.calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(BackendError::Unavailable { attempts: 1 });
        }
        if self.unavailable {
            return Err(BackendError::Unavailable { attempts: 1 });
        }
        Ok(())
    }

    /// Translates `pose` into world coordinates. Entity orientation is not modelled.
    fn resolve(&self, frame: &ReferenceFrame, pose: Pose) -> Result<Pose, BackendError> {
        match frame {
            ReferenceFrame::World => Ok(pose),
            ReferenceFrame::Entity(name) => {
                let base = self
                    .entities
                    .get(name)
                    .ok_or_else(|| BackendError::UnknownEntity(name.clone()))?;
                Ok(Pose::new(base.x + pose.x, base.y + pose.y, base.z + pose.z))
            }
        }
    }
}

/// Entity table shared between clones, so a test or console can move robots
/// while the arena talks to the same backend.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an entity directly, bypassing the spawn call.
    pub fn add_entity(&self, name: &str, pose: Pose) {
        self.state.lock().entities.insert(name.to_string(), pose);
    }

    /// Moves an existing entity on the floor. Returns `false` if it is unknown.
    pub fn move_entity(&self, name: &str, x: f64, y: f64) -> bool {
        match self.state.lock().entities.get_mut(name) {
            Some(pose) => {
                pose.x = x;
                pose.y = y;
                true
            }
            None => false,
        }
    }

    /// Deletes an entity. Returns `false` if it is unknown.
    pub fn remove_entity(&self, name: &str) -> bool {
        self.state.lock().entities.remove(name).is_some()
    }

    /// Current world pose of an entity.
    pub fn pose(&self, name: &str) -> Option<Pose> {
        self.state.lock().entities.get(name).copied()
    }

    /// Spawn requests accepted so far, in order.
    pub fn spawned(&self) -> Vec<SpawnRequest> {
        self.state.lock().spawned.clone()
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unavailable = !available;
    }

    /// Makes the next `count` calls fail as unavailable.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Number of calls received, answered or not.
    pub fn calls(&self) -> u64 {
        self.state.lock().calls
    }
}

#[async_trait]
impl Backend for SimBackend {
    async fn spawn_entity(&self, request: SpawnRequest) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.answer()?;
        if state.entities.contains_key(&request.name) {
            return Err(BackendError::Rejected(format!(
                "entity '{}' already exists",
                request.name
            )));
        }
        let pose = state.resolve(&request.reference_frame, request.pose)?;
        state.entities.insert(request.name.clone(), pose);
        state.spawned.push(request);
        Ok(())
    }

    async fn list_entities(&self) -> Result<Vec<String>, BackendError> {
        let mut state = self.state.lock();
        state.answer()?;
        Ok(state.entities.keys().cloned().collect())
    }

    async fn get_entity_pose(&self, name: &str) -> Result<Pose, BackendError> {
        let mut state = self.state.lock();
        state.answer()?;
        state
            .entities
            .get(name)
            .copied()
            .ok_or_else(|| BackendError::UnknownEntity(name.to_string()))
    }

    async fn set_entity_pose(
        &self,
        name: &str,
        reference_frame: &ReferenceFrame,
        pose: Pose,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.answer()?;
        if !state.entities.contains_key(name) {
            return Err(BackendError::UnknownEntity(name.to_string()));
        }
        let resolved = state.resolve(reference_frame, pose)?;
        state.entities.insert(name.to_string(), resolved);
        Ok(())
    }
}
