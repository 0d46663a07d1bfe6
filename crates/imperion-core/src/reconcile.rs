//! Orphan cleanup across players, entities, and the tile grid.

use std::collections::BTreeSet;

use imperion_types::{EntityId, PlayerId, now_ms};
use tracing::{debug, info};

use crate::world::World;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Empires with no usable owner.
    pub unowned_empires: usize,
    /// Players with no empire.
    pub players_without_empire: usize,
    /// Empires whose owner no longer resolves.
    pub orphaned_empires: usize,
    /// Saved positions dropped because their player no longer resolves or
    /// the record expired.
    pub stale_positions: usize,
}

impl ReconcileReport {
    /// Total players and entities removed. Saved positions are not counted.
    pub const fn removed(&self) -> usize {
        self.unowned_empires
            .saturating_add(self.players_without_empire)
            .saturating_add(self.orphaned_empires)
    }
}

impl World {
    /// Restore cross-reference invariants and return how many records were
    /// removed.
    ///
    /// Passes, in order:
    /// 1. drop empires whose owner is absent, empty, or neutral;
    /// 2. drop players that own no empire, with their saved position;
    /// 3. drop empires whose owner is neither a live player nor a retained
    ///    offline owner;
    /// 4. drop saved positions of players that no longer resolve, and any
    ///    older than the position TTL.
    ///
    /// The tile grid is then rebuilt and a save requested. A second call
    /// with no mutation in between removes nothing.
    pub fn reconcile(&mut self) -> usize {
        self.reconcile_report().removed()
    }

    /// Same as [`World::reconcile`], with per-pass counts.
    pub fn reconcile_report(&mut self) -> ReconcileReport {
        self.reconcile_report_at(now_ms())
    }

    /// [`World::reconcile_report`] with position expiry evaluated at `now`.
    pub fn reconcile_report_at(&mut self, now: i64) -> ReconcileReport {
        let unowned: Vec<EntityId> = self
            .entities
            .values()
            .filter(|entity| entity.is_empire() && entity.claimed_owner().is_none())
            .map(|entity| entity.id.clone())
            .collect();
        for id in &unowned {
            self.entities.remove(id);
        }

        let owners: BTreeSet<PlayerId> = self
            .entities
            .values()
            .filter(|entity| entity.is_empire())
            .filter_map(|entity| entity.claimed_owner().cloned())
            .collect();
        let homeless: Vec<PlayerId> = self
            .players
            .keys()
            .filter(|id| !owners.contains(*id))
            .cloned()
            .collect();
        for id in &homeless {
            self.players.remove(id);
            self.positions.remove(id);
        }

        let orphaned: Vec<EntityId> = self
            .entities
            .values()
            .filter(|entity| {
                entity.is_empire()
                    && entity
                        .claimed_owner()
                        .is_some_and(|owner| !self.owner_resolves(owner))
            })
            .map(|entity| entity.id.clone())
            .collect();
        for id in &orphaned {
            self.entities.remove(id);
        }

        let ttl = self.config.position_ttl_ms;
        let stale: Vec<PlayerId> = self
            .positions
            .iter()
            .filter(|(id, record)| {
                !self.owner_resolves(id) || now.saturating_sub(record.timestamp) > ttl
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.positions.remove(id);
        }

        let report = ReconcileReport {
            unowned_empires: unowned.len(),
            players_without_empire: homeless.len(),
            orphaned_empires: orphaned.len(),
            stale_positions: stale.len(),
        };

        self.sync_entities_to_map();
        self.request_save();

        if report.removed() > 0 {
            info!(
                room_id = %self.room_id,
                unowned_empires = report.unowned_empires,
                players_without_empire = report.players_without_empire,
                orphaned_empires = report.orphaned_empires,
                stale_positions = report.stale_positions,
                "Reconciliation removed orphans"
            );
        } else if report.stale_positions > 0 {
            debug!(
                room_id = %self.room_id,
                stale_positions = report.stale_positions,
                "Reconciliation dropped saved positions"
            );
        } else {
            debug!(room_id = %self.room_id, "Reconciliation found nothing to remove");
        }
        report
    }
}
