//! Records published after every tick. Pure projections of the world.

use serde::{Deserialize, Serialize};

use crate::{Colour, EntityId, world::World};

/// What one robot is carrying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHolder {
    pub robot_id: EntityId,
    pub holding_item: bool,
    /// Colour name, empty when not holding.
    pub item_colour: String,
    /// Point value, zero when not holding.
    pub item_value: u32,
}

/// Items returned to zones, summed over every zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLog {
    pub red_count: u32,
    pub green_count: u32,
    pub blue_count: u32,
    pub total_count: u32,
    pub red_value: u32,
    pub green_value: u32,
    pub blue_value: u32,
    pub total_value: u32,
}

impl ItemLog {
    pub fn from_world(world: &World) -> Self {
        let red_count = world.returned(Colour::Red);
        let green_count = world.returned(Colour::Green);
        let blue_count = world.returned(Colour::Blue);

        let red_value = red_count * Colour::Red.value();
        let green_value = green_count * Colour::Green.value();
        let blue_value = blue_count * Colour::Blue.value();

        ItemLog {
            red_count,
            green_count,
            blue_count,
            total_count: red_count + green_count + blue_count,
            red_value,
            green_value,
            blue_value,
            total_value: red_value + green_value + blue_value,
        }
    }
}

/// Holder records for every tracked robot plus the aggregate log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub holders: Vec<ItemHolder>,
    pub log: ItemLog,
}

impl Telemetry {
    pub fn from_world(world: &World) -> Self {
        let holders = world
            .robots
            .iter()
            .map(|(robot_id, robot)| match world.held_colour(robot) {
                Some(colour) => ItemHolder {
                    robot_id: robot_id.clone(),
                    holding_item: true,
                    item_colour: colour.name().to_string(),
                    item_value: colour.value(),
                },
                None => ItemHolder {
                    robot_id: robot_id.clone(),
                    ..ItemHolder::default()
                },
            })
            .collect();

        Telemetry {
            holders,
            log: ItemLog::from_world(world),
        }
    }
}
