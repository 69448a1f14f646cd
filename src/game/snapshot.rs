//! World snapshot building

use crate::ws::protocol::{ScoreEntry, ServerMsg};

use super::player::PlayerStore;

/// Builds the periodic scoreboard snapshot.
///
/// Positions are deliberately left out: movement already streams through
/// `player_moved`, and the snapshot only feeds scoreboard/UI views.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot message covering every registered player
    pub fn build(&mut self, players: &PlayerStore) -> ServerMsg {
        let entries: Vec<ScoreEntry> = players.iter().map(|p| p.score_entry()).collect();
        let msg = ServerMsg::WorldSnapshot {
            player_count: entries.len(),
            players: entries,
        };

        let bytes = serde_json::to_vec(&msg).map(|b| b.len()).unwrap_or(0);
        self.stats.record(players.len(), bytes);

        msg
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

/// Snapshot size stats for debugging
#[derive(Debug, Default, Clone)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub last_bytes: usize,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;
        self.last_bytes = bytes;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}
