//! Rejection sampling of cluster centers and item positions.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Colour, Position, error::PlacementError, round2, world::World};

/// Grid cells occupied by fixed obstacles.
pub const OBSTACLES: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Cluster centers closer than this (inclusive) clash.
pub const MIN_CLUSTER_SEPARATION: f64 = 1.0;
/// Items of one cluster must be at least this far apart.
pub const MIN_ITEM_SEPARATION: f64 = 0.3;
/// Items are scattered within this radius around their cluster center.
pub const ITEM_SPREAD: f64 = 0.5;
/// Fresh layouts tried before seeding gives up.
pub const LAYOUT_ATTEMPTS: u32 = 16;

/// Inclusive horizontal band reserved for clusters of each colour.
fn colour_band(colour: Colour) -> (i32, i32) {
    match colour {
        Colour::Red => (-2, -1),
        Colour::Green => (-1, 1),
        Colour::Blue => (1, 2),
    }
}

/// Seeded generator for every random choice made while building the arena.
#[derive(Debug)]
pub struct PlacementGenerator {
    rng: StdRng,
    max_attempts: u32,
}

impl PlacementGenerator {
    pub fn new(seed: u64, max_attempts: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Number of items to spawn in a new cluster.
    pub fn item_count(&mut self, min: usize, max: usize) -> usize {
        self.rng.random_range(min..=max)
    }

    /// Colour for the next cluster, given how many clusters of each colour exist.
    ///
    /// Colours already at `per_colour` are resampled unless every colour is.
    fn cluster_colour(&mut self, counts: &[usize; 3], per_colour: usize) -> Colour {
        let saturated = counts.iter().all(|count| *count >= per_colour);
        loop {
            let index = self.rng.random_range(0..Colour::ALL.len());
            if saturated || counts[index] < per_colour {
                return Colour::ALL[index];
            }
        }
    }

    /// Colours and centers for `clusters` new clusters.
    ///
    /// Greedy placement can paint itself into a corner, so a layout that cannot
    /// be completed is discarded and sampled again, up to `LAYOUT_ATTEMPTS` times.
    pub fn generate_layout(
        &mut self,
        world: &World,
        clusters: usize,
        per_colour: usize,
    ) -> Result<Vec<(Colour, Position)>, PlacementError> {
        let mut counts = [0usize; 3];
        for (index, colour) in Colour::ALL.iter().enumerate() {
            counts[index] = world.clusters_of(*colour);
        }
        let existing: Vec<Position> = world.clusters.values().map(|c| c.position).collect();

        let mut last_error = None;
        for _ in 0..LAYOUT_ATTEMPTS {
            match self.try_layout(&existing, counts, clusters, per_colour) {
                Ok(layout) => return Ok(layout),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or(PlacementError::ClusterExhausted {
            colour: Colour::Red,
            attempts: self.max_attempts,
        }))
    }

    fn try_layout(
        &mut self,
        existing: &[Position],
        mut counts: [usize; 3],
        clusters: usize,
        per_colour: usize,
    ) -> Result<Vec<(Colour, Position)>, PlacementError> {
        let mut taken = existing.to_vec();
        let mut layout = Vec::with_capacity(clusters);
        for _ in 0..clusters {
            let colour = self.cluster_colour(&counts, per_colour);
            let position = self.cluster_location_among(&taken, colour)?;
            counts[colour as usize] += 1;
            taken.push(position);
            layout.push((colour, position));
        }
        Ok(layout)
    }

    /// Picks a free integer cell in `colour`'s band, away from obstacles and other clusters.
    pub fn generate_cluster_location(
        &mut self,
        world: &World,
        colour: Colour,
    ) -> Result<Position, PlacementError> {
        let taken: Vec<Position> = world.clusters.values().map(|c| c.position).collect();
        self.cluster_location_among(&taken, colour)
    }

    fn cluster_location_among(
        &mut self,
        taken: &[Position],
        colour: Colour,
    ) -> Result<Position, PlacementError> {
        let (min_x, max_x) = colour_band(colour);
        for _ in 0..self.max_attempts {
            let y = self.rng.random_range(-2..=2);
            let x = self.rng.random_range(min_x..=max_x);

            if OBSTACLES.contains(&(x, y)) {
                continue;
            }

            let candidate = Position::new(x as f64, y as f64);
            let clashes = taken.iter().any(|center| {
                *center == candidate || center.distance(&candidate) <= MIN_CLUSTER_SEPARATION
            });
            if !clashes {
                return Ok(candidate);
            }
        }
        Err(PlacementError::ClusterExhausted {
            colour,
            attempts: self.max_attempts,
        })
    }

    /// Picks a position around the cluster center, spaced from the cluster's other items.
    ///
    /// `moving` names an item being relocated; its current position is ignored.
    pub fn generate_item_position(
        &mut self,
        world: &World,
        cluster_id: &str,
        moving: Option<&str>,
    ) -> Result<Position, PlacementError> {
        let center = world
            .clusters
            .get(cluster_id)
            .ok_or_else(|| PlacementError::UnknownCluster(cluster_id.to_string()))?
            .position;

        for _ in 0..self.max_attempts {
            let radius = self.rng.random_range(0.0..ITEM_SPREAD);
            let angle = self.rng.random_range(0.0..360.0_f64).to_radians();
            let candidate = Position::new(
                center.x + round2(radius * angle.cos()),
                center.y + round2(radius * angle.sin()),
            );

            let crowded = world
                .items_in_cluster(cluster_id)
                .filter(|(item_id, _)| Some(item_id.as_str()) != moving)
                .any(|(_, item)| item.position.distance(&candidate) < MIN_ITEM_SEPARATION);
            if !crowded {
                return Ok(candidate);
            }
        }
        Err(PlacementError::ItemExhausted {
            cluster_id: cluster_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}
