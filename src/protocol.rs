//! Protocol module - JSON message types exchanged over the WebSocket.
//!
//! Client control frames carry only `{"type": <name>}`. Server frames carry
//! `{"type": <name>, "data": {...}}`. The server may coalesce several frames
//! into one text message separated by `\n`; clients split before parsing.
//!
//! Piece types travel as integer ordinals 0..=6 (I..L). The zero ordinal is
//! a valid piece (I), never "missing".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::snapshot::{GameSnapshot, PieceSnapshot};

/// Error code attached to `error` frames for bad input.
pub const ERROR_CODE_BAD_REQUEST: u16 = 400;

/// Control commands accepted from clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    MoveLeft,
    MoveRight,
    MoveDown,
    Rotate,
    HardDrop,
    Pause,
    Resume,
    TogglePause,
    Restart,
    Pong,
}

impl ControlMessage {
    /// Wire name of the command.
    pub fn name(self) -> &'static str {
        match self {
            ControlMessage::MoveLeft => "move_left",
            ControlMessage::MoveRight => "move_right",
            ControlMessage::MoveDown => "move_down",
            ControlMessage::Rotate => "rotate",
            ControlMessage::HardDrop => "hard_drop",
            ControlMessage::Pause => "pause",
            ControlMessage::Resume => "resume",
            ControlMessage::TogglePause => "toggle_pause",
            ControlMessage::Restart => "restart",
            ControlMessage::Pong => "pong",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "move_left" => Some(ControlMessage::MoveLeft),
            "move_right" => Some(ControlMessage::MoveRight),
            "move_down" => Some(ControlMessage::MoveDown),
            "rotate" => Some(ControlMessage::Rotate),
            "hard_drop" => Some(ControlMessage::HardDrop),
            "pause" => Some(ControlMessage::Pause),
            "resume" => Some(ControlMessage::Resume),
            "toggle_pause" => Some(ControlMessage::TogglePause),
            "restart" => Some(ControlMessage::Restart),
            "pong" => Some(ControlMessage::Pong),
            _ => None,
        }
    }

    /// Encode as a control frame, `{"type": <name>}`.
    pub fn encode(self) -> String {
        serde_json::json!({ "type": self.name() }).to_string()
    }
}

/// Why an inbound frame was rejected. The reason text is echoed back to the
/// client in an `error` frame; the connection stays up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid message format")]
    InvalidFormat,
    #[error("missing message type")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// Parse a client control frame. Unknown top-level fields are ignored.
pub fn parse_control(raw: &str) -> Result<ControlMessage, ProtocolError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ProtocolError::InvalidFormat)?;
    let name = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if name.is_empty() {
        return Err(ProtocolError::MissingType);
    }
    ControlMessage::from_name(name).ok_or_else(|| ProtocolError::UnknownType(name.to_string()))
}

/// Split a text message that may hold several `\n`-separated frames.
pub fn split_frames(payload: &str) -> impl Iterator<Item = &str> {
    payload.split('\n').filter(|frame| !frame.trim().is_empty())
}

/// Piece information as serialized to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceData {
    /// Ordinal 0..=6 for I,O,T,S,Z,J,L.
    #[serde(rename = "type")]
    pub kind: u8,
    pub color: String,
    pub x: i32,
    pub y: i32,
    pub rotation: u8,
}

impl From<&PieceSnapshot> for PieceData {
    fn from(piece: &PieceSnapshot) -> Self {
        Self {
            kind: piece.kind.ordinal(),
            color: piece.kind.color().to_string(),
            x: piece.x,
            y: piece.y,
            rotation: piece.rotation,
        }
    }
}

/// Payload of a `state` frame.
///
/// `board[row][col]` is the cell's color hex string, `""` for empty. The
/// current piece is not composited into the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateData {
    pub board: Vec<Vec<String>>,
    pub current_piece: PieceData,
    pub next_piece: PieceData,
    pub state: String,
    pub score: u64,
    pub level: u32,
    pub lines: u32,
    pub drop_interval_ms: u64,
}

impl From<&GameSnapshot> for StateData {
    fn from(snapshot: &GameSnapshot) -> Self {
        Self {
            board: snapshot.board.clone(),
            current_piece: PieceData::from(&snapshot.current),
            next_piece: PieceData::from(&snapshot.next),
            state: snapshot.status.as_str().to_string(),
            score: snapshot.score,
            level: snapshot.level,
            lines: snapshot.lines,
            drop_interval_ms: snapshot.drop_interval.as_millis() as u64,
        }
    }
}

/// Payload of an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub error: String,
    pub code: u16,
}

/// Payload of a `ping` frame. Timestamp is seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingData {
    pub timestamp: i64,
}

/// Payload of a `game_over` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverData {
    pub score: u64,
    pub level: u32,
    pub lines: u32,
}

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    State(StateData),
    Error(ErrorData),
    Ping(PingData),
    GameOver(GameOverData),
}

impl ServerMessage {
    pub fn state(snapshot: &GameSnapshot) -> Self {
        ServerMessage::State(StateData::from(snapshot))
    }

    pub fn error(message: impl Into<String>, code: u16) -> Self {
        ServerMessage::Error(ErrorData {
            error: message.into(),
            code,
        })
    }

    pub fn ping(timestamp: i64) -> Self {
        ServerMessage::Ping(PingData { timestamp })
    }

    pub fn game_over(snapshot: &GameSnapshot) -> Self {
        ServerMessage::GameOver(GameOverData {
            score: snapshot.score,
            level: snapshot.level,
            lines: snapshot.lines,
        })
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
