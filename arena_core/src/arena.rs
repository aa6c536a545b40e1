use std::{collections::VecDeque, sync::Arc};

use crate::{
    backend::{Backend, SpawnRequest},
    config::ArenaConfig,
    placement::PlacementGenerator,
    world::World,
};

/// World state together with everything allowed to change it.
///
/// Every mutating operation takes `&mut self`, so requests and ticks on one
/// arena can never interleave, even across backend calls.
pub struct Arena {
    pub(crate) world: World,
    pub(crate) placement: PlacementGenerator,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) seeded: bool,
    /// Spawns generated during seeding that the backend has not confirmed yet.
    pub(crate) pending_spawns: VecDeque<SpawnRequest>,
}

impl Arena {
    pub fn new(config: &ArenaConfig, backend: Arc<dyn Backend>) -> Self {
        Arena {
            world: World::new(&config.zones),
            placement: PlacementGenerator::new(config.random_seed, config.placement_max_attempts),
            backend,
            seeded: false,
            pending_spawns: VecDeque::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct access for setting up scenarios.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Skips first-run seeding, for arenas populated by hand.
    pub fn mark_seeded(&mut self) {
        self.seeded = true;
    }

    /// Spawn requests still waiting for the backend.
    pub fn pending_spawns(&self) -> usize {
        self.pending_spawns.len()
    }
}
