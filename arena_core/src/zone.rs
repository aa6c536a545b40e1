//! Drop-off zones and the rule deciding which colours a zone accepts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Colour, Position, ZoneLocation, world::World};

/// Half-length of the square around a zone center.
pub const ZONE_HALF_EXTENT: f64 = 0.5;

/// Represents a drop-off zone and the items returned to it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub location: ZoneLocation,
    pub center: Position,
    items_returned: BTreeMap<Colour, u32>,
}

impl Zone {
    /// Creates an empty zone at its fixed corner.
    pub fn new(location: ZoneLocation) -> Self {
        Zone {
            location,
            center: location.center(),
            items_returned: Colour::ALL.into_iter().map(|colour| (colour, 0)).collect(),
        }
    }

    /// Items of `colour` returned here.
    pub fn returned(&self, colour: Colour) -> u32 {
        self.items_returned.get(&colour).copied().unwrap_or(0)
    }

    /// Colour this zone has committed to, if any item was deposited yet.
    pub fn locked_colour(&self) -> Option<Colour> {
        self.items_returned
            .iter()
            .find(|(_, count)| **count >= 1)
            .map(|(colour, _)| *colour)
    }

    /// Whether `position` lies inside the zone square, edges included.
    pub fn contains(&self, position: &Position) -> bool {
        position.x <= self.center.x + ZONE_HALF_EXTENT
            && position.x >= self.center.x - ZONE_HALF_EXTENT
            && position.y <= self.center.y + ZONE_HALF_EXTENT
            && position.y >= self.center.y - ZONE_HALF_EXTENT
    }

    /// An empty zone accepts anything; afterwards only its first colour.
    pub fn allowed_drop(&self, colour: Colour) -> bool {
        match self.locked_colour() {
            None => true,
            Some(locked) => locked == colour,
        }
    }

    pub(crate) fn record_return(&mut self, colour: Colour) {
        *self.items_returned.entry(colour).or_insert(0) += 1;
    }
}

/// Zone the position falls in. Zones are disjoint, so the first match wins.
pub fn get_robot_zone(world: &World, position: &Position) -> Option<ZoneLocation> {
    world
        .zones
        .values()
        .find(|zone| zone.contains(position))
        .map(|zone| zone.location)
}

/// Whether an item of `colour` may be deposited at `zone`. No zone means no.
pub fn allowed_drop(world: &World, zone: Option<ZoneLocation>, colour: Colour) -> bool {
    zone.and_then(|location| world.zones.get(&location))
        .is_some_and(|zone| zone.allowed_drop(colour))
}
