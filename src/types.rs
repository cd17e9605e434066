use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Countdown,
    Playing,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupType {
    Bomb,
    Shield,
    Eraser,
    Speed,
    Freeze,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Shield,
    Speed,
    Frozen,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    NeonNight,
    OceanDepths,
    SunsetValley,
    ForestMist,
    CosmicVoid,
    CandyLand,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "neon-night" => Some(Self::NeonNight),
            "ocean-depths" => Some(Self::OceanDepths),
            "sunset-valley" => Some(Self::SunsetValley),
            "forest-mist" => Some(Self::ForestMist),
            "cosmic-void" => Some(Self::CosmicVoid),
            "candy-land" => Some(Self::CandyLand),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeonNight => "neon-night",
            Self::OceanDepths => "ocean-depths",
            Self::SunsetValley => "sunset-valley",
            Self::ForestMist => "forest-mist",
            Self::CosmicVoid => "cosmic-void",
            Self::CandyLand => "candy-land",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEffect {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub ends_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub score: u32,
    pub brush_size: u32,
    pub speed: u32,
    pub has_shield: bool,
    pub is_frozen: bool,
    pub active_effects: Vec<ActiveEffect>,
}

/// Partial player update. Every mutable player field is listed; `None` means
/// "unchanged" and is left off the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brush_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_shield: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_frozen: Option<bool>,
}

impl PlayerPatch {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerupView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PowerupType,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PixelChange {
    pub x: u32,
    pub y: u32,
    /// `None` marks an erased (unowned) cell.
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    pub id: String,
    pub name: String,
    pub color: String,
    pub score: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomCreated {
        room_code: String,
        player: PlayerView,
        is_host: bool,
        theme: Theme,
    },
    RoomJoined {
        room_code: String,
        player: PlayerView,
        is_host: bool,
        players: Vec<PlayerView>,
        theme: Theme,
    },
    PlayerJoined {
        player: PlayerView,
    },
    PlayerLeft {
        player_id: String,
    },
    HostChanged {
        new_host_id: String,
    },
    GameCountdown {
        n: u32,
    },
    GameStarted {
        time_remaining: u32,
        players: Vec<PlayerView>,
        theme: Theme,
    },
    TimeUpdate {
        time_remaining: u32,
        scores: Vec<ScoreEntry>,
    },
    CanvasUpdate {
        pixels: Vec<PixelChange>,
    },
    PlayerMoved {
        id: String,
        x: f64,
        y: f64,
        brush_size: u32,
        speed: u32,
        has_shield: bool,
        is_frozen: bool,
    },
    PlayerUpdate(PlayerPatch),
    PowerupSpawned {
        powerup: PowerupView,
    },
    PowerupCollected {
        powerup_id: String,
        player_id: String,
        powerup_type: PowerupType,
    },
    BombExploded {
        x: f64,
        y: f64,
        color: String,
    },
    EraserUsed {
        x: f64,
        y: f64,
    },
    FreezeActivated {
        by_player_id: String,
    },
    GameEnded {
        results: Vec<ScoreEntry>,
    },
    BackToLobby {
        players: Vec<PlayerView>,
    },
    ThemeChanged {
        theme: Theme,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Events that a later event of the same kind fully supersedes, so a slow
    /// client may miss one without being disconnected. `canvasUpdate` is a
    /// diff and never qualifies.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::PlayerMoved { .. } | Self::TimeUpdate { .. })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn events_are_tagged_with_camel_case_type() {
        let value = serde_json::to_value(ServerEvent::HostChanged {
            new_host_id: "client_2".to_string(),
        })
        .expect("event serializes");
        assert_eq!(value, json!({ "type": "hostChanged", "newHostId": "client_2" }));
    }

    #[test]
    fn player_patch_omits_unchanged_fields() {
        let mut patch = PlayerPatch::new("client_1");
        patch.has_shield = Some(false);
        let value = serde_json::to_value(ServerEvent::PlayerUpdate(patch)).expect("serializes");
        assert_eq!(
            value,
            json!({ "type": "playerUpdate", "id": "client_1", "hasShield": false })
        );
    }

    #[test]
    fn erased_pixels_serialize_null_color() {
        let value = serde_json::to_value(ServerEvent::CanvasUpdate {
            pixels: vec![PixelChange {
                x: 3,
                y: 4,
                color: None,
            }],
        })
        .expect("serializes");
        assert_eq!(
            value,
            json!({ "type": "canvasUpdate", "pixels": [{ "x": 3, "y": 4, "color": null }] })
        );
    }

    #[test]
    fn only_superseding_events_are_droppable() {
        assert!(ServerEvent::TimeUpdate {
            time_remaining: 5,
            scores: Vec::new(),
        }
        .is_droppable());
        assert!(!ServerEvent::CanvasUpdate { pixels: Vec::new() }.is_droppable());
        assert!(!ServerEvent::Error {
            message: "x".to_string(),
        }
        .is_droppable());
    }

    #[test]
    fn theme_parse_matches_wire_names() {
        for theme in [
            Theme::NeonNight,
            Theme::OceanDepths,
            Theme::SunsetValley,
            Theme::ForestMist,
            Theme::CosmicVoid,
            Theme::CandyLand,
        ] {
            assert_eq!(Theme::parse(theme.as_str()), Some(theme));
            assert_eq!(
                serde_json::to_value(theme).expect("serializes"),
                json!(theme.as_str())
            );
        }
        assert_eq!(Theme::parse("vaporwave"), None);
    }
}
