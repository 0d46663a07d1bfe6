//! Tiered spawn placement.
//!
//! [`locate`] tries, in order, until a candidate passes the caller's
//! validity check:
//!
//! 1. [`SAFE_ZONE_ATTEMPTS`] uniform draws inside a uniformly chosen
//!    [`SAFE_ZONES`] rectangle.
//! 2. [`FULL_GRID_ATTEMPTS`] uniform draws over the whole grid.
//! 3. A row-major scan returning the first valid cell.
//! 4. A uniformly random cell, reported as [`SpawnTier::Degraded`]. The
//!    caller decides what to do with a position that failed validation.

use imperion_types::Position;
use rand::Rng;
use tracing::{debug, error};

use crate::grid::{MAP_SIZE, positions};

/// Random draws inside the safe zones before widening the search.
pub const SAFE_ZONE_ATTEMPTS: u32 = 100;

/// Random draws over the full grid before falling back to a scan.
pub const FULL_GRID_ATTEMPTS: u32 = 50;

/// An inclusive rectangle of grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    /// Left column.
    pub min_x: i32,
    /// Top row.
    pub min_y: i32,
    /// Right column, inclusive.
    pub max_x: i32,
    /// Bottom row, inclusive.
    pub max_y: i32,
}

impl Zone {
    const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Whether `position` lies inside this zone.
    pub const fn contains(&self, position: Position) -> bool {
        position.x >= self.min_x
            && position.x <= self.max_x
            && position.y >= self.min_y
            && position.y <= self.max_y
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position::new(
            rng.random_range(self.min_x..=self.max_x),
            rng.random_range(self.min_y..=self.max_y),
        )
    }
}

/// The four quadrant zones and the central overlap zone.
pub const SAFE_ZONES: [Zone; 5] = [
    Zone::new(0, 0, 20, 20),
    Zone::new(30, 0, 49, 20),
    Zone::new(0, 30, 20, 49),
    Zone::new(30, 30, 49, 49),
    Zone::new(15, 15, 35, 35),
];

/// Which tier produced a spawn position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnTier {
    /// Random draw inside a safe zone.
    SafeZone,
    /// Random draw anywhere on the grid.
    FullGrid,
    /// Exhaustive row-major scan.
    Scan,
    /// Nothing validated; the position is an unvalidated random cell.
    Degraded,
}

/// A chosen spawn position and how it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnOutcome {
    /// The chosen position.
    pub position: Position,
    /// The tier that produced it.
    pub tier: SpawnTier,
}

impl SpawnTier {
    /// Name used in logs and wire output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SafeZone => "safeZone",
            Self::FullGrid => "fullGrid",
            Self::Scan => "scan",
            Self::Degraded => "degraded",
        }
    }
}

impl SpawnOutcome {
    /// Whether every tier failed and `position` did not pass validation.
    pub const fn is_degraded(&self) -> bool {
        matches!(self.tier, SpawnTier::Degraded)
    }
}

fn random_cell<R: Rng + ?Sized>(rng: &mut R) -> Position {
    Position::new(rng.random_range(0..MAP_SIZE), rng.random_range(0..MAP_SIZE))
}

/// Find a spawn position accepted by `is_valid`.
pub fn locate<R, F>(rng: &mut R, is_valid: F) -> SpawnOutcome
where
    R: Rng + ?Sized,
    F: Fn(Position) -> bool,
{
    for _ in 0..SAFE_ZONE_ATTEMPTS {
        let zone = SAFE_ZONES
            .get(rng.random_range(0..SAFE_ZONES.len()))
            .copied()
            .unwrap_or(Zone::new(0, 0, MAP_SIZE.saturating_sub(1), MAP_SIZE.saturating_sub(1)));
        let candidate = zone.sample(rng);
        if is_valid(candidate) {
            return SpawnOutcome {
                position: candidate,
                tier: SpawnTier::SafeZone,
            };
        }
    }

    for _ in 0..FULL_GRID_ATTEMPTS {
        let candidate = random_cell(rng);
        if is_valid(candidate) {
            debug!(x = candidate.x, y = candidate.y, "Spawn found outside safe zones");
            return SpawnOutcome {
                position: candidate,
                tier: SpawnTier::FullGrid,
            };
        }
    }

    if let Some(position) = positions().find(|&candidate| is_valid(candidate)) {
        debug!(x = position.x, y = position.y, "Spawn found by exhaustive scan");
        return SpawnOutcome {
            position,
            tier: SpawnTier::Scan,
        };
    }

    let position = random_cell(rng);
    error!(
        x = position.x,
        y = position.y,
        "No valid spawn position on the grid, returning an unvalidated cell"
    );
    SpawnOutcome {
        position,
        tier: SpawnTier::Degraded,
    }
}
