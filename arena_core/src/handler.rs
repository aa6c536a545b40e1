//! Pick-up and offload requests.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    arena::Arena,
    backend::{Pose, ReferenceFrame},
    error::ArenaError,
    zone::{allowed_drop, get_robot_zone},
};

/// A robot picks up items closer than this.
pub const PICK_UP_DISTANCE: f64 = 0.35;

/// Outcome of a request. Failures here are the caller's; backend trouble is an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResponse {
    pub success: bool,
    pub message: String,
}

impl ItemResponse {
    pub fn success(message: impl Into<String>) -> Self {
        ItemResponse {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ItemResponse {
            success: false,
            message: message.into(),
        }
    }
}

impl Arena {
    /// Hands the robot the first free item within reach.
    ///
    /// Only the world changes; the item follows its carrier from the next tick on.
    pub fn pick_up_item(&mut self, robot_id: &str) -> ItemResponse {
        info!(robot_id, "incoming pick_up_item request");

        let Some(robot) = self.world.robots.get(robot_id) else {
            return ItemResponse::failure(format!("Unable to find robot_id '{robot_id}'"));
        };
        if robot.item_held.is_some() {
            return ItemResponse::failure(format!(
                "Robot '{robot_id}' is already holding an item"
            ));
        }

        let position = robot.position;
        let found = self
            .world
            .items_by_age()
            .into_iter()
            .filter(|(item_id, _)| self.world.holder_of(item_id).is_none())
            .find(|(_, item)| item.position.distance(&position) < PICK_UP_DISTANCE)
            .map(|(item_id, _)| item_id.clone());

        match found {
            Some(item_id) => {
                info!(robot_id, %item_id, "item collected");
                if let Some(robot) = self.world.robots.get_mut(robot_id) {
                    robot.item_held = Some(item_id);
                }
                ItemResponse::success(format!(
                    "Robot '{robot_id}' collected item successfully"
                ))
            }
            None => ItemResponse::failure(format!("Robot '{robot_id}' unable to pick any item.")),
        }
    }

    /// Releases the robot's item, scoring it if the robot stands in a zone that accepts it.
    ///
    /// Rejected or zone-less drops leave the item on the floor under the robot.
    /// Accepted items are counted and respawned inside their own cluster. The
    /// world only changes once the backend confirmed the move.
    pub async fn offload_item(&mut self, robot_id: &str) -> Result<ItemResponse, ArenaError> {
        info!(robot_id, "incoming offload_item request");

        let Some(robot) = self.world.robots.get(robot_id) else {
            return Ok(ItemResponse::failure(format!(
                "Unable to find robot_id '{robot_id}'"
            )));
        };
        let Some(item_id) = robot.item_held.clone() else {
            return Ok(ItemResponse::failure(format!(
                "Robot '{robot_id}' does not hold any items, so unable to offload."
            )));
        };
        let robot_position = robot.position;
        let Some(item) = self.world.items.get(&item_id) else {
            return Ok(ItemResponse::failure(format!(
                "Robot '{robot_id}' holds unknown item '{item_id}'"
            )));
        };
        let (colour, cluster_id) = (item.colour, item.cluster_id.clone());

        let zone = get_robot_zone(&self.world, &robot_position);
        info!(robot_id, %item_id, ?zone, "robot is trying to offload");

        let accepted = zone.filter(|_| allowed_drop(&self.world, zone, colour));
        let message = match accepted {
            None => {
                self.backend
                    .set_entity_pose(
                        &item_id,
                        &ReferenceFrame::Entity(robot_id.to_string()),
                        Pose::default(),
                    )
                    .await?;
                if let Some(item) = self.world.items.get_mut(&item_id) {
                    item.position = robot_position;
                }
                format!(
                    "Item '{item_id}' held by robot '{robot_id}' has been offloaded in the arena."
                )
            }
            Some(location) => {
                let target =
                    self.placement
                        .generate_item_position(&self.world, &cluster_id, Some(&item_id))?;
                self.backend
                    .set_entity_pose(
                        &item_id,
                        &ReferenceFrame::World,
                        Pose::new(target.x, target.y, 0.0),
                    )
                    .await?;
                if let Some(zone) = self.world.zones.get_mut(&location) {
                    zone.record_return(colour);
                }
                if let Some(item) = self.world.items.get_mut(&item_id) {
                    item.position = target;
                }
                info!(%item_id, %location, %colour, "item returned to zone");
                format!(
                    "Item '{item_id}' held by robot '{robot_id}' has been offloaded at zone '{location}'."
                )
            }
        };

        if let Some(robot) = self.world.robots.get_mut(robot_id) {
            robot.item_held = None;
            robot.previous_item_held = Some(item_id);
        }
        Ok(ItemResponse::success(message))
    }
}
