use std::collections::HashMap;

use crate::canvas::OwnerTag;
use crate::constants::{player_color, BASE_SPEED, DEFAULT_BRUSH_SIZE};
use crate::rng::Rng;
use crate::timers::TimerToken;
use crate::types::{ActiveEffect, EffectKind, PlayerPatch, PlayerView, ScoreEntry};

#[derive(Clone, Debug)]
pub struct Player {
    pub view: PlayerView,
    pub tag: OwnerTag,
    effect_timers: HashMap<EffectKind, TimerToken>,
}

impl Player {
    pub fn id(&self) -> &str {
        &self.view.id
    }

    pub fn score_entry(&self) -> ScoreEntry {
        ScoreEntry {
            id: self.view.id.clone(),
            name: self.view.name.clone(),
            color: self.view.color.clone(),
            score: self.view.score,
        }
    }

    /// Field-by-field application of a partial update.
    pub fn apply_patch(&mut self, patch: &PlayerPatch) {
        if let Some(x) = patch.x {
            self.view.x = x;
        }
        if let Some(y) = patch.y {
            self.view.y = y;
        }
        if let Some(score) = patch.score {
            self.view.score = score;
        }
        if let Some(brush_size) = patch.brush_size {
            self.view.brush_size = brush_size;
        }
        if let Some(speed) = patch.speed {
            self.view.speed = speed;
        }
        if let Some(has_shield) = patch.has_shield {
            self.view.has_shield = has_shield;
        }
        if let Some(is_frozen) = patch.is_frozen {
            self.view.is_frozen = is_frozen;
        }
    }

    /// Records a timed effect and hands back the expiry timer it replaces, if
    /// any, so the caller can cancel it.
    pub fn start_effect(
        &mut self,
        kind: EffectKind,
        ends_at_ms: u64,
        timer: TimerToken,
    ) -> Option<TimerToken> {
        self.view.active_effects.retain(|effect| effect.kind != kind);
        self.view
            .active_effects
            .push(ActiveEffect { kind, ends_at_ms });
        self.effect_timers.insert(kind, timer)
    }

    /// Forgets an effect. Only the timer that currently owns the effect may
    /// end it; a superseded timer gets `false`.
    pub fn end_effect(&mut self, kind: EffectKind, timer: TimerToken) -> bool {
        if self.effect_timers.get(&kind) != Some(&timer) {
            return false;
        }
        self.effect_timers.remove(&kind);
        self.view.active_effects.retain(|effect| effect.kind != kind);
        true
    }

    /// Drops every effect (flags included) and returns the expiry timers that
    /// were still pending.
    pub fn clear_effects(&mut self) -> Vec<TimerToken> {
        self.view.active_effects.clear();
        self.view.has_shield = false;
        self.view.is_frozen = false;
        self.view.speed = BASE_SPEED;
        self.view.brush_size = DEFAULT_BRUSH_SIZE;
        self.effect_timers.drain().map(|(_, timer)| timer).collect()
    }

    pub fn pending_effect_timers(&self) -> Vec<TimerToken> {
        self.effect_timers.values().copied().collect()
    }
}

/// Players of one room, kept in join order.
#[derive(Clone, Debug)]
pub struct PlayerDirectory {
    players: Vec<Player>,
    width: f64,
    height: f64,
    next_tag: OwnerTag,
    joins: usize,
}

impl PlayerDirectory {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            players: Vec::new(),
            width: f64::from(width),
            height: f64::from(height),
            next_tag: 1,
            joins: 0,
        }
    }

    pub fn add(&mut self, id: &str, name: &str, rng: &mut Rng) -> &Player {
        let (x, y) = self.random_position(rng);
        let tag = self.next_tag;
        self.next_tag += 1;
        let color = player_color(self.joins);
        self.joins += 1;

        self.players.push(Player {
            view: PlayerView {
                id: id.to_string(),
                name: name.to_string(),
                color: color.to_string(),
                x,
                y,
                score: 0,
                brush_size: DEFAULT_BRUSH_SIZE,
                speed: BASE_SPEED,
                has_shield: false,
                is_frozen: false,
                active_effects: Vec::new(),
            },
            tag,
            effect_timers: HashMap::new(),
        });
        &self.players[self.players.len() - 1]
    }

    pub fn remove(&mut self, id: &str) -> Option<Player> {
        let idx = self.players.iter().position(|player| player.id() == id)?;
        Some(self.players.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id() == id)
    }

    pub fn by_tag_mut(&mut self, tag: OwnerTag) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.tag == tag)
    }

    /// Join order.
    pub fn all(&self) -> &[Player] {
        &self.players
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Earliest-joined surviving player.
    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host().map(Player::id)
    }

    pub fn is_shielded(&self, tag: OwnerTag) -> bool {
        self.players
            .iter()
            .any(|player| player.tag == tag && player.view.has_shield)
    }

    pub fn color_of(&self, tag: OwnerTag) -> Option<&str> {
        self.players
            .iter()
            .find(|player| player.tag == tag)
            .map(|player| player.view.color.as_str())
    }

    /// Returns `false` when the patch names a player who is gone.
    pub fn apply_patch(&mut self, patch: &PlayerPatch) -> bool {
        match self.get_mut(&patch.id) {
            Some(player) => {
                player.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    pub fn views(&self) -> Vec<PlayerView> {
        self.players.iter().map(|player| player.view.clone()).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.players
            .iter()
            .map(|player| player.id().to_string())
            .collect()
    }

    pub fn random_position(&self, rng: &mut Rng) -> (f64, f64) {
        (rng.range(0.0, self.width), rng.range(0.0, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory_with(names: &[&str]) -> PlayerDirectory {
        let mut rng = Rng::new(11);
        let mut directory = PlayerDirectory::new(800, 600);
        for (idx, name) in names.iter().enumerate() {
            directory.add(&format!("client_{}", idx + 1), name, &mut rng);
        }
        directory
    }

    #[test]
    fn add_assigns_defaults_and_in_bounds_spawn() {
        let directory = directory_with(&["Ann"]);
        let player = directory.get("client_1").expect("player added");
        assert_eq!(player.view.name, "Ann");
        assert_eq!(player.view.color, "#FF6B6B");
        assert_eq!(player.view.brush_size, DEFAULT_BRUSH_SIZE);
        assert_eq!(player.view.speed, BASE_SPEED);
        assert!((0.0..800.0).contains(&player.view.x));
        assert!((0.0..600.0).contains(&player.view.y));
    }

    #[test]
    fn colors_follow_join_order_even_after_leaves() {
        let mut directory = directory_with(&["A", "B"]);
        directory.remove("client_1");
        let mut rng = Rng::new(3);
        let third = directory.add("client_3", "C", &mut rng);
        assert_eq!(third.view.color, "#FFE66D");
        assert_eq!(third.tag, 3);
    }

    #[test]
    fn host_is_earliest_surviving_joiner() {
        let mut directory = directory_with(&["A", "B", "C"]);
        assert_eq!(directory.host_id(), Some("client_1"));
        directory.remove("client_2");
        assert_eq!(directory.host_id(), Some("client_1"));
        directory.remove("client_1");
        assert_eq!(directory.host_id(), Some("client_3"));
        directory.remove("client_3");
        assert_eq!(directory.host_id(), None);
        assert!(directory.is_empty());
    }

    #[test]
    fn all_preserves_join_order() {
        let directory = directory_with(&["A", "B", "C"]);
        let names: Vec<&str> = directory
            .all()
            .iter()
            .map(|player| player.view.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn patch_touches_only_named_fields() {
        let mut directory = directory_with(&["A"]);
        let mut patch = PlayerPatch::new("client_1");
        patch.speed = Some(2);
        patch.brush_size = Some(25);
        assert!(directory.apply_patch(&patch));

        let player = directory.get("client_1").expect("player exists");
        assert_eq!(player.view.speed, 2);
        assert_eq!(player.view.brush_size, 25);
        assert!(!player.view.has_shield);
        assert!(!directory.apply_patch(&PlayerPatch::new("client_9")));
    }

    #[test]
    fn restarting_an_effect_returns_the_superseded_timer() {
        let mut table = crate::timers::TimerTable::new();
        let first = table.schedule_once(0, 8_000, ());
        let second = table.schedule_once(1_000, 8_000, ());

        let mut directory = directory_with(&["A"]);
        let player = directory.get_mut("client_1").expect("player exists");
        assert_eq!(player.start_effect(EffectKind::Shield, 8_000, first), None);
        assert_eq!(
            player.start_effect(EffectKind::Shield, 9_000, second),
            Some(first)
        );
        assert_eq!(player.view.active_effects.len(), 1);
        assert!(!player.end_effect(EffectKind::Shield, first));
        assert!(player.end_effect(EffectKind::Shield, second));
        assert!(player.view.active_effects.is_empty());
    }

    #[test]
    fn is_shielded_checks_the_owner_tag() {
        let mut directory = directory_with(&["A", "B"]);
        let mut patch = PlayerPatch::new("client_2");
        patch.has_shield = Some(true);
        directory.apply_patch(&patch);
        assert!(!directory.is_shielded(1));
        assert!(directory.is_shielded(2));
        assert!(!directory.is_shielded(99));
    }
}
