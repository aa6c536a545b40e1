use serde::{Deserialize, Serialize};

pub mod arena;
pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod placement;
pub mod service;
pub mod sim;
pub mod sync;
pub mod telemetry;
pub mod world;
pub mod zone;

pub use arena::Arena;
pub use backend::{Backend, Pose, ReferenceFrame, RetryingBackend, SpawnRequest};
pub use config::{ArenaConfig, RetryPolicy, ZoneFlags};
pub use error::{ArenaError, BackendError, PlacementError};
pub use handler::ItemResponse;
pub use service::{ArenaHandle, ArenaService};
pub use sim::SimBackend;
pub use telemetry::{ItemHolder, ItemLog, Telemetry};
pub use world::World;

/// Stable string identity of robots, items and clusters.
pub type EntityId = String;

/// Represents a 2D coordinate on the arena floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Both coordinates rounded to two decimals.
    pub fn rounded(&self) -> Position {
        Position {
            x: round2(self.x),
            y: round2(self.y),
        }
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Colour of an item or cluster. Each colour carries a fixed point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Colour {
    Red,
    Green,
    Blue,
}

impl Colour {
    pub const ALL: [Colour; 3] = [Colour::Red, Colour::Green, Colour::Blue];

    /// Points scored for one item of this colour.
    pub fn value(self) -> u32 {
        match self {
            Colour::Red => 5,
            Colour::Green => 10,
            Colour::Blue => 15,
        }
    }

    /// Upper-case name used in published telemetry.
    pub fn name(self) -> &'static str {
        match self {
            Colour::Red => "RED",
            Colour::Green => "GREEN",
            Colour::Blue => "BLUE",
        }
    }

    /// Material name of the spawned item model.
    pub fn material(self) -> &'static str {
        match self {
            Colour::Red => "red_outlined",
            Colour::Green => "green_outlined",
            Colour::Blue => "blue_outlined",
        }
    }

    /// Shape descriptor handed to the backend when spawning an item of this colour.
    pub fn item_model(self) -> String {
        format!(
            concat!(
                "<?xml version=\"1.0\"?>",
                "<sdf version=\"1.6\"><model name=\"item\"><static>true</static>",
                "<link name=\"link\"><visual name=\"visual\">",
                "<geometry><cylinder><radius>0.05</radius><length>0.1</length></cylinder></geometry>",
                "<material><script><name>{}</name></script></material>",
                "</visual></link></model></sdf>"
            ),
            self.material()
        )
    }
}

impl std::fmt::Display for Colour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the four corner drop-off zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZoneLocation {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl ZoneLocation {
    pub const ALL: [ZoneLocation; 4] = [
        ZoneLocation::TopLeft,
        ZoneLocation::TopRight,
        ZoneLocation::BottomRight,
        ZoneLocation::BottomLeft,
    ];

    /// Fixed center of the zone in world coordinates.
    pub fn center(self) -> Position {
        match self {
            ZoneLocation::TopLeft => Position::new(2.57, 2.5),
            ZoneLocation::TopRight => Position::new(2.57, -2.46),
            ZoneLocation::BottomRight => Position::new(-3.42, -2.46),
            ZoneLocation::BottomLeft => Position::new(-3.42, 2.5),
        }
    }
}

impl std::fmt::Display for ZoneLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ZoneLocation::TopLeft => "TOP_LEFT",
            ZoneLocation::TopRight => "TOP_RIGHT",
            ZoneLocation::BottomRight => "BOTTOM_RIGHT",
            ZoneLocation::BottomLeft => "BOTTOM_LEFT",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_values_are_fixed() {
        assert_eq!(Colour::Red.value(), 5);
        assert_eq!(Colour::Green.value(), 10);
        assert_eq!(Colour::Blue.value(), 15);
    }

    #[test]
    fn item_model_names_material() {
        assert!(Colour::Green.item_model().contains("<name>green_outlined</name>"));
        assert!(!Colour::Green.item_model().contains("red_outlined"));
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.005001), -0.01);
        assert_eq!(Position::new(0.129, 2.0).rounded(), Position::new(0.13, 2.0));
    }
}
