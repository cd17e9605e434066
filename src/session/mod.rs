use tracing::{debug, info};

use crate::canvas::{CanvasStore, CellChange, OwnerTag};
use crate::config::GameSettings;
use crate::constants::{COUNTDOWN_STEP_MS, GAME_TICK_MS};
use crate::directory::{Player, PlayerDirectory};
use crate::error::RequestRejected;
use crate::rng::Rng;
use crate::spawner::PowerupSpawner;
use crate::timers::{TimerTable, TimerToken};
use crate::types::{
    EffectKind, Phase, PixelChange, PlayerView, PowerupView, ScoreEntry, ServerEvent, Theme,
};

mod powerup_system;

/// Who inside the room an event is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    Player(String),
    Room,
    RoomExcept(String),
}

#[derive(Clone, Debug)]
pub struct Envelope {
    pub audience: Audience,
    pub event: ServerEvent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionTimer {
    CountdownTick,
    GameTick,
    PowerupSpawn,
    EffectExpiry { player: OwnerTag, effect: EffectKind },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Removal {
    pub new_host_id: Option<String>,
    pub room_empty: bool,
}

/// One room: its players, canvas, power-ups and every timer that drives the
/// match. All mutation goes through `&mut self`, so a room is only ever
/// touched by one handler at a time.
#[derive(Clone, Debug)]
pub struct GameSession {
    code: String,
    settings: GameSettings,
    phase: Phase,
    countdown: u32,
    time_remaining: u32,
    theme: Theme,
    directory: PlayerDirectory,
    canvas: CanvasStore,
    powerups: Vec<PowerupView>,
    spawner: PowerupSpawner,
    timers: TimerTable<SessionTimer>,
    countdown_timer: Option<TimerToken>,
    game_timer: Option<TimerToken>,
    rng: Rng,
    outbox: Vec<Envelope>,
}

impl GameSession {
    pub fn new(code: String, settings: GameSettings, seed: u32) -> Self {
        Self {
            code,
            phase: Phase::Waiting,
            countdown: settings.countdown_start,
            time_remaining: settings.game_duration_secs,
            theme: Theme::default(),
            directory: PlayerDirectory::new(settings.canvas_width, settings.canvas_height),
            canvas: CanvasStore::new(settings.canvas_width, settings.canvas_height),
            powerups: Vec::new(),
            spawner: PowerupSpawner::new(
                settings.powerup_interval_ms,
                settings.canvas_width,
                settings.canvas_height,
            ),
            timers: TimerTable::new(),
            countdown_timer: None,
            game_timer: None,
            rng: Rng::new(seed),
            outbox: Vec::new(),
            settings,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn host_id(&self) -> Option<&str> {
        self.directory.host_id()
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_id() == Some(player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.directory.get(player_id)
    }

    pub fn players(&self) -> &[Player] {
        self.directory.all()
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.directory.views()
    }

    pub fn player_count(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    pub fn canvas(&self) -> &CanvasStore {
        &self.canvas
    }

    pub fn powerups(&self) -> &[PowerupView] {
        &self.powerups
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_due()
    }

    pub fn emit(&mut self, audience: Audience, event: ServerEvent) {
        self.outbox.push(Envelope { audience, event });
    }

    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    /// Resolves an audience against the current roster.
    pub fn recipients(&self, audience: &Audience) -> Vec<String> {
        match audience {
            Audience::Player(id) => vec![id.clone()],
            Audience::Room => self.directory.ids(),
            Audience::RoomExcept(excluded) => self
                .directory
                .all()
                .iter()
                .map(Player::id)
                .filter(|id| id != excluded)
                .map(str::to_string)
                .collect(),
        }
    }

    /// Whether a new player could join right now.
    pub fn check_admission(&self) -> Result<(), RequestRejected> {
        if self.phase != Phase::Waiting {
            return Err(RequestRejected::GameInProgress);
        }
        if self.directory.len() >= self.settings.max_players {
            return Err(RequestRejected::RoomFull);
        }
        Ok(())
    }

    pub fn add_player(
        &mut self,
        player_id: &str,
        name: &str,
    ) -> Result<PlayerView, RequestRejected> {
        self.check_admission()?;
        let player = self.directory.add(player_id, name, &mut self.rng);
        Ok(player.view.clone())
    }

    /// Takes a player out of the room in any phase. Painted cells stay on the
    /// canvas; the player's effect timers are cancelled. An emptied room tears
    /// down all of its timers and broadcasts nothing.
    pub fn remove_player(&mut self, player_id: &str) -> Option<Removal> {
        let was_host = self.is_host(player_id);
        let player = self.directory.remove(player_id)?;
        for timer in player.pending_effect_timers() {
            self.timers.cancel(Some(timer));
        }

        if self.directory.is_empty() {
            self.shutdown();
            return Some(Removal {
                new_host_id: None,
                room_empty: true,
            });
        }

        self.emit(
            Audience::Room,
            ServerEvent::PlayerLeft {
                player_id: player_id.to_string(),
            },
        );

        let new_host_id = if was_host {
            self.host_id().map(str::to_string)
        } else {
            None
        };
        if let Some(new_host_id) = &new_host_id {
            info!(room = %self.code, host = %new_host_id, "host migrated");
            self.emit(
                Audience::Room,
                ServerEvent::HostChanged {
                    new_host_id: new_host_id.clone(),
                },
            );
        }

        Some(Removal {
            new_host_id,
            room_empty: false,
        })
    }

    pub fn change_theme(&mut self, requested_by: &str, theme: &str) -> Result<(), RequestRejected> {
        if !self.is_host(requested_by) {
            return Err(RequestRejected::NotHost);
        }
        let theme = Theme::parse(theme).ok_or(RequestRejected::InvalidTheme)?;
        self.theme = theme;
        self.emit(Audience::Room, ServerEvent::ThemeChanged { theme });
        Ok(())
    }

    pub fn start_game(&mut self, requested_by: &str, now_ms: u64) -> Result<(), RequestRejected> {
        if !self.is_host(requested_by) {
            return Err(RequestRejected::NotHost);
        }
        if self.phase != Phase::Waiting {
            return Err(RequestRejected::GameInProgress);
        }
        if self.directory.len() < self.settings.min_players_to_start {
            return Err(RequestRejected::NotEnoughPlayers(
                self.settings.min_players_to_start,
            ));
        }

        self.reset_round();
        self.phase = Phase::Countdown;
        self.countdown = self.settings.countdown_start;
        info!(room = %self.code, players = self.directory.len(), "countdown started");
        self.emit(Audience::Room, ServerEvent::GameCountdown { n: self.countdown });
        self.countdown_timer = Some(self.timers.schedule_repeating(
            now_ms,
            COUNTDOWN_STEP_MS,
            SessionTimer::CountdownTick,
        ));
        Ok(())
    }

    pub fn play_again(&mut self, requested_by: &str) -> Result<(), RequestRejected> {
        if !self.is_host(requested_by) {
            return Err(RequestRejected::NotHost);
        }
        if self.phase != Phase::Finished {
            return Err(RequestRejected::NotFinished);
        }
        self.phase = Phase::Waiting;
        let players = self.directory.views();
        self.emit(Audience::Room, ServerEvent::BackToLobby { players });
        Ok(())
    }

    /// Runs every timer due at `now_ms`, one at a time, in deadline order.
    /// Timers armed from a callback count from the deadline that fired, not
    /// from `now_ms`.
    pub fn fire_due(&mut self, now_ms: u64) {
        while let Some((token, due_ms, timer)) = self.timers.pop_due(now_ms) {
            match timer {
                SessionTimer::CountdownTick => self.countdown_tick(token, due_ms),
                SessionTimer::GameTick => self.game_tick(token),
                SessionTimer::PowerupSpawn => self.spawn_tick(token),
                SessionTimer::EffectExpiry { player, effect } => {
                    self.effect_expired(token, player, effect);
                }
            }
        }
    }

    /// Recomputes every player's score from canvas ownership. Cells owned by
    /// players who have left count for nobody.
    pub fn calculate_scores(&mut self) -> Vec<ScoreEntry> {
        let counts = self.canvas.ownership_counts();
        for player in self.directory.all_mut() {
            player.view.score = counts.get(&player.tag).copied().unwrap_or(0);
        }
        self.directory
            .all()
            .iter()
            .map(Player::score_entry)
            .collect()
    }

    /// Score descending; ties keep join order.
    pub fn standings(&self) -> Vec<ScoreEntry> {
        let mut results: Vec<ScoreEntry> = self
            .directory
            .all()
            .iter()
            .map(Player::score_entry)
            .collect();
        results.sort_by(|a, b| b.score.cmp(&a.score));
        results
    }

    fn countdown_tick(&mut self, token: TimerToken, due_ms: u64) {
        if self.phase != Phase::Countdown || self.countdown_timer != Some(token) {
            debug!(room = %self.code, "stale countdown tick ignored");
            return;
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            self.emit(Audience::Room, ServerEvent::GameCountdown { n: self.countdown });
            return;
        }
        self.timers.cancel(self.countdown_timer.take());
        self.begin_playing(due_ms);
    }

    fn begin_playing(&mut self, started_ms: u64) {
        self.phase = Phase::Playing;
        self.time_remaining = self.settings.game_duration_secs;
        info!(room = %self.code, seconds = self.time_remaining, "game started");
        let players = self.directory.views();
        self.emit(
            Audience::Room,
            ServerEvent::GameStarted {
                time_remaining: self.time_remaining,
                players,
                theme: self.theme,
            },
        );
        self.game_timer = Some(self.timers.schedule_repeating(
            started_ms,
            GAME_TICK_MS,
            SessionTimer::GameTick,
        ));
        self.spawner
            .start(&mut self.timers, started_ms, SessionTimer::PowerupSpawn);
    }

    fn game_tick(&mut self, token: TimerToken) {
        if self.phase != Phase::Playing || self.game_timer != Some(token) {
            debug!(room = %self.code, "stale game tick ignored");
            return;
        }
        let scores = self.calculate_scores();
        self.time_remaining = self.time_remaining.saturating_sub(1);
        self.emit(
            Audience::Room,
            ServerEvent::TimeUpdate {
                time_remaining: self.time_remaining,
                scores,
            },
        );
        if self.time_remaining == 0 {
            self.finish();
        }
    }

    fn spawn_tick(&mut self, token: TimerToken) {
        if self.phase != Phase::Playing || !self.spawner.owns(token) {
            debug!(room = %self.code, "stale spawn tick ignored");
            return;
        }
        self.spawn_powerup();
    }

    /// Playing → Finished. Every session timer is gone before the phase flips.
    fn finish(&mut self) {
        self.timers.cancel(self.game_timer.take());
        self.spawner.stop(&mut self.timers);
        for player in self.directory.all_mut() {
            for timer in player.clear_effects() {
                self.timers.cancel(Some(timer));
            }
        }
        self.powerups.clear();
        self.calculate_scores();

        self.phase = Phase::Finished;
        let results = self.standings();
        info!(
            room = %self.code,
            winner = results.first().map(|entry| entry.name.as_str()).unwrap_or(""),
            "game finished"
        );
        self.emit(Audience::Room, ServerEvent::GameEnded { results });
    }

    /// Fresh round: blank canvas, no power-ups, players back to defaults at
    /// new random spots.
    fn reset_round(&mut self) {
        self.canvas.reset();
        self.powerups.clear();
        let width = f64::from(self.canvas.width());
        let height = f64::from(self.canvas.height());
        for player in self.directory.all_mut() {
            for timer in player.clear_effects() {
                self.timers.cancel(Some(timer));
            }
            player.view.score = 0;
            player.view.x = self.rng.range(0.0, width);
            player.view.y = self.rng.range(0.0, height);
        }
    }

    fn shutdown(&mut self) {
        self.countdown_timer = None;
        self.game_timer = None;
        self.spawner.stop(&mut self.timers);
        self.timers.clear();
        self.powerups.clear();
        debug!(room = %self.code, "session timers torn down");
    }

    fn pixel_changes(&self, changes: &[CellChange]) -> Vec<PixelChange> {
        changes
            .iter()
            .map(|change| PixelChange {
                x: change.x,
                y: change.y,
                color: change
                    .owner
                    .and_then(|owner| self.directory.color_of(owner))
                    .map(str::to_string),
            })
            .collect()
    }
}
