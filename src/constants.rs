use crate::types::PowerupType;

pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 600;
pub const GAME_DURATION_SECS: u32 = 90;
pub const POWERUP_SPAWN_INTERVAL_MS: u64 = 5_000;
pub const COUNTDOWN_START: u32 = 3;
pub const COUNTDOWN_STEP_MS: u64 = 1_000;
pub const GAME_TICK_MS: u64 = 1_000;

pub const MAX_PLAYERS: usize = 8;
pub const MIN_PLAYERS_TO_START: usize = 2;

pub const DEFAULT_BRUSH_SIZE: u32 = 15;
pub const BOOSTED_BRUSH_SIZE: u32 = 25;
pub const BASE_SPEED: u32 = 1;
pub const SPEED_MULTIPLIER: u32 = 2;

pub const SHIELD_DURATION_MS: u64 = 8_000;
pub const SPEED_DURATION_MS: u64 = 6_000;
pub const FREEZE_DURATION_MS: u64 = 3_000;

pub const BOMB_RADIUS: u32 = 50;
pub const ERASER_RADIUS: u32 = 40;
pub const POWERUP_RADIUS: f64 = 20.0;
pub const POWERUP_EDGE_MARGIN: f64 = 50.0;

pub const ROOM_CODE_LEN: usize = 5;
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const MAX_NAME_LEN: usize = 16;

pub const PLAYER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#FFE66D", "#95E1D3", "#F38181", "#AA96DA", "#FF9F43", "#26DE81",
];

pub const POWERUP_TYPES: [PowerupType; 5] = [
    PowerupType::Bomb,
    PowerupType::Shield,
    PowerupType::Eraser,
    PowerupType::Speed,
    PowerupType::Freeze,
];

pub fn player_color(join_index: usize) -> &'static str {
    PLAYER_COLORS[join_index % PLAYER_COLORS.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_wraps_around() {
        assert_eq!(player_color(0), "#FF6B6B");
        assert_eq!(player_color(7), "#26DE81");
        assert_eq!(player_color(8), "#FF6B6B");
    }

    #[test]
    fn room_code_alphabet_has_no_ambiguous_characters() {
        for ambiguous in [b'0', b'O', b'1', b'I'] {
            assert!(!ROOM_CODE_ALPHABET.contains(&ambiguous));
        }
    }
}
