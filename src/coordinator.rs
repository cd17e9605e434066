//! Room registry and request routing.
//!
//! The coordinator is the only owner of game state. Every inbound request and
//! every timer callback runs against `&mut SessionCoordinator`, so the
//! transport serializes all room mutation by holding one lock around it.
//! Rooms speak in audiences (`Room`, `RoomExcept`, `Player`); after each
//! operation the coordinator resolves those against the current roster and
//! queues concrete `Delivery` values for the transport to send.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::GameSettings;
use crate::error::RequestRejected;
use crate::server_protocol::ParsedClientMessage;
use crate::server_utils::{
    generate_unique_room_code, is_valid_room_code, normalize_room_code, sanitize_name,
};
use crate::session::{Audience, GameSession};
use crate::types::ServerEvent;

/// One outbound event and the connections it goes to.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub recipients: Vec<String>,
    pub event: ServerEvent,
}

pub struct SessionCoordinator {
    settings: GameSettings,
    rooms: HashMap<String, GameSession>,
    membership: HashMap<String, String>,
    deliveries: Vec<Delivery>,
    rng: StdRng,
}

impl SessionCoordinator {
    pub fn new(settings: GameSettings) -> Self {
        Self::with_rng(settings, StdRng::from_os_rng())
    }

    /// Deterministic room codes and session seeds, for tests and the simulator.
    pub fn with_seed(settings: GameSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: GameSettings, rng: StdRng) -> Self {
        Self {
            settings,
            rooms: HashMap::new(),
            membership: HashMap::new(),
            deliveries: Vec::new(),
            rng,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room(&self, code: &str) -> Option<&GameSession> {
        self.rooms.get(code)
    }

    pub fn room_of(&self, connection_id: &str) -> Option<&str> {
        self.membership.get(connection_id).map(String::as_str)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.rooms
            .values()
            .filter_map(GameSession::next_deadline)
            .min()
    }

    pub fn drain_deliveries(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.deliveries)
    }

    /// Dispatches one parsed message. A rejected request turns into an
    /// `error` event for the requester alone.
    pub fn handle(&mut self, connection_id: &str, message: ParsedClientMessage, now_ms: u64) {
        let result = match message {
            ParsedClientMessage::CreateRoom { player_name } => self
                .create_room(connection_id, &player_name)
                .map(|_| ()),
            ParsedClientMessage::JoinRoom {
                room_code,
                player_name,
            } => self.join_room(connection_id, &room_code, &player_name),
            ParsedClientMessage::ChangeTheme { room_code, theme } => {
                self.change_theme(connection_id, &room_code, &theme)
            }
            ParsedClientMessage::StartGame { room_code } => {
                self.start_game(connection_id, &room_code, now_ms)
            }
            ParsedClientMessage::Move { room_code, x, y } => {
                self.move_player(connection_id, &room_code, x, y, now_ms);
                Ok(())
            }
            ParsedClientMessage::PlayAgain { room_code } => {
                self.play_again(connection_id, &room_code)
            }
        };

        if let Err(rejection) = result {
            debug!(connection = %connection_id, %rejection, "request rejected");
            self.send_error(connection_id, rejection.to_string());
        }
    }

    pub fn send_error(&mut self, connection_id: &str, message: impl Into<String>) {
        self.deliveries.push(Delivery {
            recipients: vec![connection_id.to_string()],
            event: ServerEvent::Error {
                message: message.into(),
            },
        });
    }

    pub fn create_room(
        &mut self,
        connection_id: &str,
        player_name: &str,
    ) -> Result<String, RequestRejected> {
        self.leave_current_room(connection_id);

        let rooms = &self.rooms;
        let code = generate_unique_room_code(&mut self.rng, |code| rooms.contains_key(code));
        let mut session = GameSession::new(code.clone(), self.settings, self.rng.random());
        let player = session.add_player(connection_id, &sanitize_name(player_name))?;
        let theme = session.theme();
        session.emit(
            Audience::Player(connection_id.to_string()),
            ServerEvent::RoomCreated {
                room_code: code.clone(),
                player,
                is_host: true,
                theme,
            },
        );

        info!(room = %code, host = %connection_id, "room created");
        self.rooms.insert(code.clone(), session);
        self.membership
            .insert(connection_id.to_string(), code.clone());
        self.flush(&code);
        Ok(code)
    }

    pub fn join_room(
        &mut self,
        connection_id: &str,
        raw_code: &str,
        player_name: &str,
    ) -> Result<(), RequestRejected> {
        let code = normalize_room_code(raw_code);
        if !is_valid_room_code(&code) {
            return Err(RequestRejected::InvalidRoomCode);
        }
        if self.room_of(connection_id) == Some(code.as_str()) {
            return self.resend_room_joined(connection_id, &code);
        }
        self.rooms
            .get(&code)
            .ok_or(RequestRejected::RoomNotFound)?
            .check_admission()?;

        self.leave_current_room(connection_id);

        let session = self
            .rooms
            .get_mut(&code)
            .ok_or(RequestRejected::RoomNotFound)?;
        let player = session.add_player(connection_id, &sanitize_name(player_name))?;
        let joined = ServerEvent::RoomJoined {
            room_code: code.clone(),
            player: player.clone(),
            is_host: session.is_host(connection_id),
            players: session.player_views(),
            theme: session.theme(),
        };
        session.emit(
            Audience::Player(connection_id.to_string()),
            joined,
        );
        session.emit(
            Audience::RoomExcept(connection_id.to_string()),
            ServerEvent::PlayerJoined { player },
        );

        info!(
            room = %code,
            player = %connection_id,
            players = session.player_count(),
            "player joined"
        );
        self.membership
            .insert(connection_id.to_string(), code.clone());
        self.flush(&code);
        Ok(())
    }

    pub fn change_theme(
        &mut self,
        connection_id: &str,
        raw_code: &str,
        theme: &str,
    ) -> Result<(), RequestRejected> {
        let code = self.existing_room(raw_code)?;
        if let Some(session) = self.rooms.get_mut(&code) {
            session.change_theme(connection_id, theme)?;
        }
        self.flush(&code);
        Ok(())
    }

    pub fn start_game(
        &mut self,
        connection_id: &str,
        raw_code: &str,
        now_ms: u64,
    ) -> Result<(), RequestRejected> {
        let code = self.existing_room(raw_code)?;
        if let Some(session) = self.rooms.get_mut(&code) {
            session.start_game(connection_id, now_ms)?;
        }
        self.flush(&code);
        Ok(())
    }

    pub fn play_again(&mut self, connection_id: &str, raw_code: &str) -> Result<(), RequestRejected> {
        let code = self.existing_room(raw_code)?;
        if let Some(session) = self.rooms.get_mut(&code) {
            session.play_again(connection_id)?;
        }
        self.flush(&code);
        Ok(())
    }

    /// Moves for a room the connection is not in are dropped without a reply.
    pub fn move_player(&mut self, connection_id: &str, raw_code: &str, x: f64, y: f64, now_ms: u64) {
        let code = normalize_room_code(raw_code);
        if self.room_of(connection_id) != Some(code.as_str()) {
            return;
        }
        let applied = self
            .rooms
            .get_mut(&code)
            .map(|session| session.handle_move(connection_id, x, y, now_ms))
            .unwrap_or(false);
        if applied {
            self.flush(&code);
        }
    }

    pub fn disconnect(&mut self, connection_id: &str) {
        self.leave_current_room(connection_id);
    }

    /// Runs every room's due timers and queues what they produced.
    pub fn fire_due(&mut self, now_ms: u64) {
        let due: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, session)| {
                session
                    .next_deadline()
                    .is_some_and(|deadline| deadline <= now_ms)
            })
            .map(|(code, _)| code.clone())
            .collect();
        for code in due {
            if let Some(session) = self.rooms.get_mut(&code) {
                session.fire_due(now_ms);
            }
            self.flush(&code);
        }
    }

    fn existing_room(&self, raw_code: &str) -> Result<String, RequestRejected> {
        let code = normalize_room_code(raw_code);
        if self.rooms.contains_key(&code) {
            Ok(code)
        } else {
            Err(RequestRejected::RoomNotFound)
        }
    }

    fn resend_room_joined(&mut self, connection_id: &str, code: &str) -> Result<(), RequestRejected> {
        let session = self
            .rooms
            .get_mut(code)
            .ok_or(RequestRejected::RoomNotFound)?;
        let player = session
            .player(connection_id)
            .map(|player| player.view.clone())
            .ok_or(RequestRejected::RoomNotFound)?;
        let joined = ServerEvent::RoomJoined {
            room_code: code.to_string(),
            player,
            is_host: session.is_host(connection_id),
            players: session.player_views(),
            theme: session.theme(),
        };
        session.emit(
            Audience::Player(connection_id.to_string()),
            joined,
        );
        self.flush(code);
        Ok(())
    }

    fn leave_current_room(&mut self, connection_id: &str) {
        let Some(code) = self.membership.remove(connection_id) else {
            return;
        };
        let Some(session) = self.rooms.get_mut(&code) else {
            debug!(room = %code, connection = %connection_id, "membership pointed at a deleted room");
            return;
        };
        let Some(removal) = session.remove_player(connection_id) else {
            return;
        };
        info!(room = %code, player = %connection_id, "player left");

        if removal.room_empty {
            self.rooms.remove(&code);
            info!(room = %code, "room deleted");
            return;
        }
        self.flush(&code);
    }

    fn flush(&mut self, code: &str) {
        let Some(session) = self.rooms.get_mut(code) else {
            return;
        };
        for envelope in session.drain_outbox() {
            let recipients = session.recipients(&envelope.audience);
            if recipients.is_empty() {
                continue;
            }
            self.deliveries.push(Delivery {
                recipients,
                event: envelope.event,
            });
        }
    }
}
