use super::*;

use crate::constants::{
    BASE_SPEED, BOMB_RADIUS, BOOSTED_BRUSH_SIZE, DEFAULT_BRUSH_SIZE, ERASER_RADIUS,
    FREEZE_DURATION_MS, SHIELD_DURATION_MS, SPEED_DURATION_MS, SPEED_MULTIPLIER,
};
use crate::types::{PlayerPatch, PowerupType};

impl GameSession {
    /// Applies one `move`: reposition, paint, collect. Returns `false` when
    /// the move was dropped (wrong phase, unknown or frozen player, bad
    /// coordinates); a dropped move produces no events.
    pub fn handle_move(&mut self, player_id: &str, x: f64, y: f64, now_ms: u64) -> bool {
        if self.phase != Phase::Playing || !x.is_finite() || !y.is_finite() {
            return false;
        }
        let (tag, brush_size) = match self.directory.get(player_id) {
            Some(player) if !player.view.is_frozen => (player.tag, player.view.brush_size),
            _ => return false,
        };

        let x = x.clamp(0.0, f64::from(self.canvas.width()) - 1.0);
        let y = y.clamp(0.0, f64::from(self.canvas.height()) - 1.0);
        let mut position = PlayerPatch::new(player_id);
        position.x = Some(x);
        position.y = Some(y);
        self.directory.apply_patch(&position);

        let directory = &self.directory;
        let changed = self
            .canvas
            .paint(tag, x, y, brush_size, |owner| directory.is_shielded(owner));

        let reach = f64::from(brush_size) / 2.0;
        let mut collected = Vec::new();
        self.powerups.retain(|powerup| {
            let hit = (powerup.x - x).hypot(powerup.y - y) <= powerup.radius + reach;
            if hit {
                collected.push(powerup.clone());
            }
            !hit
        });
        for powerup in &collected {
            self.apply_powerup(player_id, powerup, now_ms);
        }

        if let Some(player) = self.directory.get(player_id) {
            let moved = ServerEvent::PlayerMoved {
                id: player.view.id.clone(),
                x: player.view.x,
                y: player.view.y,
                brush_size: player.view.brush_size,
                speed: player.view.speed,
                has_shield: player.view.has_shield,
                is_frozen: player.view.is_frozen,
            };
            self.emit(Audience::RoomExcept(player_id.to_string()), moved);
        }
        let pixels = self.pixel_changes(&changed);
        self.emit(Audience::Room, ServerEvent::CanvasUpdate { pixels });
        true
    }

    pub(super) fn spawn_powerup(&mut self) {
        let powerup = self.spawner.spawn(&mut self.rng);
        debug!(room = %self.code, kind = ?powerup.kind, "power-up spawned");
        self.powerups.push(powerup.clone());
        self.emit(Audience::Room, ServerEvent::PowerupSpawned { powerup });
    }

    fn apply_powerup(&mut self, collector_id: &str, powerup: &PowerupView, now_ms: u64) {
        let Some(collector) = self.directory.get(collector_id) else {
            return;
        };
        let tag = collector.tag;
        let color = collector.view.color.clone();
        let (px, py) = (collector.view.x, collector.view.y);

        match powerup.kind {
            PowerupType::Bomb => {
                let changed = self.canvas.fill_circle(tag, powerup.x, powerup.y, BOMB_RADIUS);
                let pixels = self.pixel_changes(&changed);
                self.emit(Audience::Room, ServerEvent::CanvasUpdate { pixels });
                self.emit(
                    Audience::Room,
                    ServerEvent::BombExploded {
                        x: powerup.x,
                        y: powerup.y,
                        color,
                    },
                );
            }
            PowerupType::Shield => {
                let mut patch = PlayerPatch::new(collector_id);
                patch.has_shield = Some(true);
                self.start_timed_effect(EffectKind::Shield, SHIELD_DURATION_MS, patch, now_ms);
            }
            PowerupType::Eraser => {
                let changed = self.canvas.clear_circle(px, py, ERASER_RADIUS, tag);
                let pixels = self.pixel_changes(&changed);
                self.emit(Audience::Room, ServerEvent::CanvasUpdate { pixels });
                self.emit(Audience::Room, ServerEvent::EraserUsed { x: px, y: py });
            }
            PowerupType::Speed => {
                let mut patch = PlayerPatch::new(collector_id);
                patch.speed = Some(BASE_SPEED * SPEED_MULTIPLIER);
                patch.brush_size = Some(BOOSTED_BRUSH_SIZE);
                self.start_timed_effect(EffectKind::Speed, SPEED_DURATION_MS, patch, now_ms);
            }
            PowerupType::Freeze => {
                let others: Vec<String> = self
                    .recipients(&Audience::RoomExcept(collector_id.to_string()));
                for other in others {
                    let mut patch = PlayerPatch::new(&other);
                    patch.is_frozen = Some(true);
                    self.start_timed_effect(EffectKind::Frozen, FREEZE_DURATION_MS, patch, now_ms);
                }
                self.emit(
                    Audience::Room,
                    ServerEvent::FreezeActivated {
                        by_player_id: collector_id.to_string(),
                    },
                );
            }
        }

        self.emit(
            Audience::Room,
            ServerEvent::PowerupCollected {
                powerup_id: powerup.id.clone(),
                player_id: collector_id.to_string(),
                powerup_type: powerup.kind,
            },
        );
    }

    /// Sets an effect's flags and (re)arms its expiry. Collecting an effect
    /// that is already running restarts the full duration.
    fn start_timed_effect(
        &mut self,
        kind: EffectKind,
        duration_ms: u64,
        patch: PlayerPatch,
        now_ms: u64,
    ) {
        let Some(tag) = self.directory.get(&patch.id).map(|player| player.tag) else {
            return;
        };
        let timer = self.timers.schedule_once(
            now_ms,
            duration_ms,
            SessionTimer::EffectExpiry {
                player: tag,
                effect: kind,
            },
        );
        if let Some(player) = self.directory.get_mut(&patch.id) {
            player.apply_patch(&patch);
            let replaced = player.start_effect(kind, now_ms + duration_ms, timer);
            self.timers.cancel(replaced);
        }
        self.emit(Audience::Room, ServerEvent::PlayerUpdate(patch));
    }

    pub(super) fn effect_expired(&mut self, token: TimerToken, tag: OwnerTag, kind: EffectKind) {
        let patch = {
            let Some(player) = self.directory.by_tag_mut(tag) else {
                debug!(room = %self.code, tag, "effect expiry for departed player");
                return;
            };
            if !player.end_effect(kind, token) {
                return;
            }
            let mut patch = PlayerPatch::new(player.id());
            match kind {
                EffectKind::Shield => patch.has_shield = Some(false),
                EffectKind::Speed => {
                    patch.speed = Some(BASE_SPEED);
                    patch.brush_size = Some(DEFAULT_BRUSH_SIZE);
                }
                EffectKind::Frozen => patch.is_frozen = Some(false),
            }
            player.apply_patch(&patch);
            patch
        };
        self.emit(Audience::Room, ServerEvent::PlayerUpdate(patch));
    }
}
