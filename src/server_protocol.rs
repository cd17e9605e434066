use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedClientMessage {
    CreateRoom {
        player_name: String,
    },
    JoinRoom {
        room_code: String,
        player_name: String,
    },
    ChangeTheme {
        room_code: String,
        theme: String,
    },
    StartGame {
        room_code: String,
    },
    Move {
        room_code: String,
        x: f64,
        y: f64,
    },
    PlayAgain {
        room_code: String,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "createRoom" => Some(ParsedClientMessage::CreateRoom {
            player_name: optional_string(object, "playerName")?,
        }),
        "joinRoom" => Some(ParsedClientMessage::JoinRoom {
            room_code: required_string(object, "roomCode")?,
            player_name: optional_string(object, "playerName")?,
        }),
        "changeTheme" => Some(ParsedClientMessage::ChangeTheme {
            room_code: required_string(object, "roomCode")?,
            theme: required_string(object, "theme")?,
        }),
        "startGame" => Some(ParsedClientMessage::StartGame {
            room_code: required_string(object, "roomCode")?,
        }),
        "move" => {
            let x = object.get("x")?.as_f64()?;
            let y = object.get("y")?.as_f64()?;
            if !x.is_finite() || !y.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Move {
                room_code: required_string(object, "roomCode")?,
                x,
                y,
            })
        }
        "playAgain" => Some(ParsedClientMessage::PlayAgain {
            room_code: required_string(object, "roomCode")?,
        }),
        _ => None,
    }
}

fn required_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    Some(object.get(key)?.as_str()?.to_string())
}

/// Absent means empty; present but not a string is malformed.
fn optional_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => Some(String::new()),
        Some(value) => Some(value.as_str()?.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create_room_message() {
        let parsed = parse_client_message(r#"{"type":"createRoom","playerName":"Ann"}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::CreateRoom {
                player_name: "Ann".to_string()
            })
        );
    }

    #[test]
    fn parse_create_room_without_name_defaults_to_empty() {
        let parsed = parse_client_message(r#"{"type":"createRoom"}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::CreateRoom {
                player_name: String::new()
            })
        );
    }

    #[test]
    fn parse_join_room_requires_code() {
        assert!(parse_client_message(r#"{"type":"joinRoom","playerName":"Bo"}"#).is_none());
        let parsed =
            parse_client_message(r#"{"type":"joinRoom","roomCode":"abcde","playerName":"Bo"}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::JoinRoom {
                room_code: "abcde".to_string(),
                player_name: "Bo".to_string(),
            })
        );
    }

    #[test]
    fn parse_move_message() {
        let parsed = parse_client_message(r#"{"type":"move","roomCode":"ABCDE","x":12.5,"y":40}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Move {
                room_code: "ABCDE".to_string(),
                x: 12.5,
                y: 40.0,
            })
        );
    }

    #[test]
    fn parse_move_rejects_non_numeric_coordinates() {
        assert!(
            parse_client_message(r#"{"type":"move","roomCode":"ABCDE","x":"1","y":2}"#).is_none()
        );
        assert!(parse_client_message(r#"{"type":"move","roomCode":"ABCDE","x":1}"#).is_none());
    }

    #[test]
    fn parse_change_theme_keeps_raw_theme() {
        let parsed =
            parse_client_message(r#"{"type":"changeTheme","roomCode":"ABCDE","theme":"nope"}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::ChangeTheme { theme, .. }) if theme == "nope"
        ));
    }

    #[test]
    fn parse_rejects_unknown_and_malformed_messages() {
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message(r#"["createRoom"]"#).is_none());
        assert!(parse_client_message(r#"{"type":"teleport"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"createRoom","playerName":7}"#).is_none());
    }

    #[test]
    fn parse_host_commands() {
        assert!(matches!(
            parse_client_message(r#"{"type":"startGame","roomCode":"ABCDE"}"#),
            Some(ParsedClientMessage::StartGame { .. })
        ));
        assert!(matches!(
            parse_client_message(r#"{"type":"playAgain","roomCode":"ABCDE"}"#),
            Some(ParsedClientMessage::PlayAgain { .. })
        ));
    }
}
