use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Colour, EntityId, Position, ZoneLocation, config::ZoneFlags, zone::Zone};

/// Robot tracked by the arena. Poses are mirrored from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub position: Position,
    pub item_held: Option<EntityId>,
    pub previous_item_held: Option<EntityId>,
}

impl Robot {
    /// Creates a robot at `position` holding nothing.
    pub fn new(position: Position) -> Self {
        Robot {
            position,
            item_held: None,
            previous_item_held: None,
        }
    }
}

/// Represents an item lying in the arena or carried by a robot.
///
/// An item always belongs to the cluster it was spawned in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub position: Position,
    pub colour: Colour,
    pub cluster_id: EntityId,
}

/// Represents a group of same-coloured items around a center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub position: Position,
    pub colour: Colour,
}

/// Registry of everything in the arena.
///
/// Ordered maps keep iteration deterministic, so the same seed always yields
/// the same arena. Pick-up scans items in creation order, see [`World::items_by_age`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub robots: BTreeMap<EntityId, Robot>,
    pub items: BTreeMap<EntityId, Item>,
    pub clusters: BTreeMap<EntityId, Cluster>,
    pub zones: BTreeMap<ZoneLocation, Zone>,
    cluster_counter: usize,
    item_counter: usize,
}

impl World {
    /// Creates an empty world with the enabled zones.
    pub fn new(zones: &ZoneFlags) -> Self {
        World {
            robots: BTreeMap::new(),
            items: BTreeMap::new(),
            clusters: BTreeMap::new(),
            zones: zones
                .enabled()
                .map(|location| (location, Zone::new(location)))
                .collect(),
            cluster_counter: 0,
            item_counter: 0,
        }
    }

    /// Starts tracking a robot. Returns `false` if it was already known.
    pub fn add_robot(&mut self, robot_id: &str, position: Position) -> bool {
        if self.robots.contains_key(robot_id) {
            return false;
        }
        self.robots
            .insert(robot_id.to_string(), Robot::new(position));
        true
    }

    /// Registers a cluster and returns its generated id.
    pub fn add_cluster(&mut self, position: Position, colour: Colour) -> EntityId {
        let cluster_id = format!("cluster{}", self.cluster_counter);
        self.cluster_counter += 1;
        self.clusters
            .insert(cluster_id.clone(), Cluster { position, colour });
        cluster_id
    }

    /// Registers an item in `cluster_id`, taking the cluster's colour.
    ///
    /// Returns `None` when the cluster does not exist.
    pub fn add_item(&mut self, position: Position, cluster_id: &str) -> Option<EntityId> {
        let colour = self.clusters.get(cluster_id)?.colour;
        let item_id = format!("item{}", self.item_counter);
        self.item_counter += 1;
        self.items.insert(
            item_id.clone(),
            Item {
                position,
                colour,
                cluster_id: cluster_id.to_string(),
            },
        );
        Some(item_id)
    }

    /// Looks up a tracked robot.
    pub fn robot(&self, robot_id: &str) -> Option<&Robot> {
        self.robots.get(robot_id)
    }

    /// Looks up an item.
    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.get(item_id)
    }

    /// Items in the order they were added.
    ///
    /// Generated ids share the `item` prefix, so a shorter id is an older one.
    pub fn items_by_age(&self) -> Vec<(&EntityId, &Item)> {
        let mut items: Vec<_> = self.items.iter().collect();
        items.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        items
    }

    /// Robot currently carrying `item_id`, if any.
    pub fn holder_of(&self, item_id: &str) -> Option<&str> {
        self.robots
            .iter()
            .find(|(_, robot)| robot.item_held.as_deref() == Some(item_id))
            .map(|(robot_id, _)| robot_id.as_str())
    }

    /// Colour of the item held by `robot`, if it holds one.
    pub fn held_colour(&self, robot: &Robot) -> Option<Colour> {
        robot
            .item_held
            .as_deref()
            .and_then(|item_id| self.items.get(item_id))
            .map(|item| item.colour)
    }

    /// Items returned across all zones for `colour`.
    pub fn returned(&self, colour: Colour) -> u32 {
        self.zones.values().map(|zone| zone.returned(colour)).sum()
    }

    /// Number of clusters of `colour`.
    pub fn clusters_of(&self, colour: Colour) -> usize {
        self.clusters
            .values()
            .filter(|cluster| cluster.colour == colour)
            .count()
    }

    /// Items belonging to `cluster_id`, with their ids.
    pub fn items_in_cluster<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> impl Iterator<Item = (&'a EntityId, &'a Item)> + 'a {
        self.items
            .iter()
            .filter(move |(_, item)| item.cluster_id == cluster_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_by_age_follows_creation_order() {
        let mut world = World::new(&ZoneFlags::default());
        let cluster = world.add_cluster(Position::ORIGIN, Colour::Blue);
        for _ in 0..12 {
            world.add_item(Position::ORIGIN, &cluster).unwrap();
        }
        let ids: Vec<&str> = world
            .items_by_age()
            .into_iter()
            .map(|(item_id, _)| item_id.as_str())
            .collect();
        let expected: Vec<String> = (0..12).map(|index| format!("item{index}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn zones_follow_flags_and_start_empty() {
        let flags = ZoneFlags {
            bottom_left: false,
            ..ZoneFlags::default()
        };
        let world = World::new(&flags);
        assert_eq!(world.zones.len(), 3);
        assert!(!world.zones.contains_key(&ZoneLocation::BottomLeft));
        for zone in world.zones.values() {
            for colour in Colour::ALL {
                assert_eq!(zone.returned(colour), 0);
            }
        }
    }

    #[test]
    fn ids_are_sequential() {
        let mut world = World::new(&ZoneFlags::default());
        let c0 = world.add_cluster(Position::new(-2.0, 0.0), Colour::Red);
        let c1 = world.add_cluster(Position::new(2.0, 0.0), Colour::Blue);
        assert_eq!((c0.as_str(), c1.as_str()), ("cluster0", "cluster1"));

        let i0 = world.add_item(Position::new(-2.1, 0.0), &c0).unwrap();
        let i1 = world.add_item(Position::new(2.1, 0.0), &c1).unwrap();
        assert_eq!((i0.as_str(), i1.as_str()), ("item0", "item1"));
        assert_eq!(world.item(&i1).unwrap().colour, Colour::Blue);
        assert!(world.add_item(Position::ORIGIN, "cluster9").is_none());
    }

    #[test]
    fn robots_are_added_once() {
        let mut world = World::new(&ZoneFlags::default());
        assert!(world.add_robot("robot1", Position::ORIGIN));
        world.robots.get_mut("robot1").unwrap().position = Position::new(1.0, 1.0);
        assert!(!world.add_robot("robot1", Position::ORIGIN));
        assert_eq!(world.robot("robot1").unwrap().position, Position::new(1.0, 1.0));
    }

    #[test]
    fn holder_lookup() {
        let mut world = World::new(&ZoneFlags::default());
        let cluster = world.add_cluster(Position::ORIGIN, Colour::Green);
        let item = world.add_item(Position::ORIGIN, &cluster).unwrap();
        world.add_robot("robot1", Position::ORIGIN);
        assert_eq!(world.holder_of(&item), None);

        world.robots.get_mut("robot1").unwrap().item_held = Some(item.clone());
        assert_eq!(world.holder_of(&item), Some("robot1"));
        let robot = world.robot("robot1").unwrap();
        assert_eq!(world.held_colour(robot), Some(Colour::Green));
    }
}
