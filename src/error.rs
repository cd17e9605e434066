/// A client request that cannot be honored. The `Display` text is what the
/// requester sees in its `error` event; the room is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestRejected {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("Need at least {0} players to start")]
    NotEnoughPlayers(usize),
    #[error("Only the host can do that")]
    NotHost,
    #[error("Unknown theme")]
    InvalidTheme,
    #[error("Invalid room code")]
    InvalidRoomCode,
    #[error("Game has not finished")]
    NotFinished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_client_strings() {
        assert_eq!(RequestRejected::RoomNotFound.to_string(), "Room not found");
        assert_eq!(
            RequestRejected::NotEnoughPlayers(2).to_string(),
            "Need at least 2 players to start"
        );
        assert_eq!(
            RequestRejected::GameInProgress.to_string(),
            "Game already in progress"
        );
    }
}
