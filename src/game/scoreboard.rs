//! Team scoring, driven purely by kill notifications

use std::collections::BTreeMap;

use crate::ws::protocol::ServerMsg;

use super::lifecycle::KillEvent;
use super::spawn::ModeKind;

/// Something that reacts to kills without touching player state
pub trait KillListener: Send {
    /// Observe a kill; returns messages to broadcast to everyone
    fn on_kill(&mut self, kill: &KillEvent, now: u64) -> Vec<ServerMsg>;

    /// Periodic check for time-based conditions
    fn tick(&mut self, _now: u64) -> Vec<ServerMsg> {
        Vec::new()
    }
}

/// Team kill totals with a score limit and a time limit
#[derive(Debug)]
pub struct TeamScoreboard {
    scores: BTreeMap<String, u32>,
    score_limit: u32,
    time_limit_ms: u64,
    /// Set by the first counted kill of a match
    started_at: Option<u64>,
}

impl TeamScoreboard {
    pub fn new(score_limit: u32, time_limit_secs: u64) -> Self {
        Self {
            scores: BTreeMap::new(),
            score_limit,
            time_limit_ms: time_limit_secs.saturating_mul(1000),
            started_at: None,
        }
    }

    pub fn scores(&self) -> &BTreeMap<String, u32> {
        &self.scores
    }

    fn leader(&self) -> Option<String> {
        let top = self.scores.values().copied().max()?;
        let mut leaders = self.scores.iter().filter(|(_, s)| **s == top);
        match (leaders.next(), leaders.next()) {
            (Some((team, _)), None) => Some(team.clone()),
            _ => None,
        }
    }

    fn finish(&mut self, team: Option<String>) -> ServerMsg {
        let scores = std::mem::take(&mut self.scores);
        self.started_at = None;
        ServerMsg::MatchWon { team, scores }
    }
}

impl KillListener for TeamScoreboard {
    fn on_kill(&mut self, kill: &KillEvent, now: u64) -> Vec<ServerMsg> {
        if ModeKind::classify(&kill.game_mode) != ModeKind::Team {
            return Vec::new();
        }
        let team = kill.killer_team.trim().to_ascii_lowercase();
        if team.is_empty() || team == kill.victim_team.trim().to_ascii_lowercase() {
            return Vec::new();
        }

        self.started_at.get_or_insert(now);
        let score = self.scores.entry(team.clone()).or_insert(0);
        *score += 1;
        let reached_limit = self.score_limit > 0 && *score >= self.score_limit;

        let mut out = vec![ServerMsg::TeamScore {
            scores: self.scores.clone(),
        }];
        if reached_limit {
            out.push(self.finish(Some(team)));
        }
        out
    }

    fn tick(&mut self, now: u64) -> Vec<ServerMsg> {
        match self.started_at {
            Some(start) if self.time_limit_ms > 0 && now.saturating_sub(start) >= self.time_limit_ms => {
                let leader = self.leader();
                vec![self.finish(leader)]
            }
            _ => Vec::new(),
        }
    }
}
