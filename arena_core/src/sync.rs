//! The periodic tick: seeding, robot discovery, pose sync and telemetry.

use tracing::{debug, info, warn};

use crate::{
    Colour, Position,
    arena::Arena,
    backend::{Pose, ReferenceFrame, SpawnRequest},
    error::{ArenaError, BackendError, PlacementError},
    telemetry::Telemetry,
};

pub const CLUSTER_COUNT: usize = 6;
pub const MAX_CLUSTERS_PER_COLOUR: usize = 2;
pub const MIN_ITEMS_PER_CLUSTER: usize = 3;
pub const MAX_ITEMS_PER_CLUSTER: usize = 5;

/// Entities whose name contains this are robots.
pub const ROBOT_NAME_PATTERN: &str = "robot";
/// Spawned once seeding is done, for whoever waits on the arena.
pub const READY_MARKER: &str = "ready";
const READY_MARKER_Z: f64 = -0.5;
/// Carried items ride this far above their robot.
pub const HELD_ITEM_HEIGHT: f64 = 0.15;

impl Arena {
    /// Runs one tick and returns the telemetry to publish.
    ///
    /// Backend errors abort the rest of the tick; the world is left consistent
    /// and the next tick picks up where this one stopped.
    pub async fn tick(&mut self) -> Result<Telemetry, ArenaError> {
        if !self.seeded {
            self.seed()?;
        }
        self.flush_spawns().await?;
        self.discover_robots().await?;
        self.sync_poses().await?;
        Ok(Telemetry::from_world(&self.world))
    }

    /// Generates clusters and items and queues their spawns. Runs once.
    fn seed(&mut self) -> Result<(), PlacementError> {
        let layout =
            self.placement
                .generate_layout(&self.world, CLUSTER_COUNT, MAX_CLUSTERS_PER_COLOUR)?;

        for (colour, center) in layout {
            let cluster_id = self.world.add_cluster(center, colour);
            let count = self
                .placement
                .item_count(MIN_ITEMS_PER_CLUSTER, MAX_ITEMS_PER_CLUSTER);
            for _ in 0..count {
                let position = self
                    .placement
                    .generate_item_position(&self.world, &cluster_id, None)?;
                let item_id = self
                    .world
                    .add_item(position, &cluster_id)
                    .ok_or_else(|| PlacementError::UnknownCluster(cluster_id.clone()))?;
                info!(%item_id, %colour, x = position.x, y = position.y, "spawning item");
                self.pending_spawns
                    .push_back(item_spawn(&item_id, colour, position, 0.0));
            }
        }
        self.pending_spawns.push_back(item_spawn(
            READY_MARKER,
            Colour::Red,
            Position::ORIGIN,
            READY_MARKER_Z,
        ));

        self.seeded = true;
        info!(
            clusters = self.world.clusters.len(),
            items = self.world.items.len(),
            "arena seeded"
        );
        Ok(())
    }

    /// Sends queued spawns in order, stopping at the first one the backend cannot take.
    async fn flush_spawns(&mut self) -> Result<(), BackendError> {
        while let Some(request) = self.pending_spawns.front() {
            match self.backend.spawn_entity(request.clone()).await {
                Ok(()) => {}
                Err(BackendError::Rejected(reason)) => {
                    warn!(name = %request.name, %reason, "spawn rejected, not retrying");
                }
                Err(error) => return Err(error),
            }
            self.pending_spawns.pop_front();
        }
        Ok(())
    }

    /// Starts tracking robots the backend reports that are not known yet.
    async fn discover_robots(&mut self) -> Result<(), BackendError> {
        let names = self.backend.list_entities().await?;
        for name in names
            .iter()
            .filter(|name| name.contains(ROBOT_NAME_PATTERN))
        {
            if self.world.add_robot(name, Position::ORIGIN) {
                info!(robot_id = %name, "tracking new robot");
            }
        }
        Ok(())
    }

    /// Mirrors robot poses and keeps every carried item stuck to its robot.
    ///
    /// A robot the backend refuses to answer for is skipped; only an
    /// unavailable backend aborts the tick.
    async fn sync_poses(&mut self) -> Result<(), BackendError> {
        let robot_ids: Vec<String> = self.world.robots.keys().cloned().collect();
        for robot_id in robot_ids {
            match self.sync_robot(&robot_id).await {
                Ok(()) => {}
                Err(error) if error.is_retryable() => return Err(error),
                Err(error) => warn!(%robot_id, %error, "robot not synced"),
            }
        }
        Ok(())
    }

    async fn sync_robot(&mut self, robot_id: &str) -> Result<(), BackendError> {
        let pose = self.backend.get_entity_pose(robot_id).await?;
        let position = Position::new(pose.x, pose.y).rounded();

        let Some(robot) = self.world.robots.get_mut(robot_id) else {
            return Ok(());
        };
        robot.position = position;
        let Some(item_id) = robot.item_held.clone() else {
            return Ok(());
        };

        if let Some(item) = self.world.items.get_mut(&item_id) {
            item.position = position;
        }
        debug!(robot_id, %item_id, x = position.x, y = position.y, "carrying item");
        self.backend
            .set_entity_pose(
                &item_id,
                &ReferenceFrame::Entity(robot_id.to_string()),
                Pose::new(0.0, 0.0, HELD_ITEM_HEIGHT),
            )
            .await
    }
}

fn item_spawn(name: &str, colour: Colour, position: Position, z: f64) -> SpawnRequest {
    SpawnRequest {
        name: name.to_string(),
        shape: colour.item_model(),
        pose: Pose::new(position.x, position.y, z),
        reference_frame: ReferenceFrame::World,
    }
}
