use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const FRAME_HEADER_BYTES: usize = 4;
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Maps logical coordinates to device pixels for the given pixel ratio.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            start: self.start.scaled(factor),
            end: self.end.scaled(factor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub has_submitted: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            has_submitted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    pub lyrics: String,
    pub image: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub cover: String,
    pub verses: Vec<Verse>,
    pub genre: String,
    pub short_genre: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingPayload {
    pub player_id: String,
    pub nickname: String,
    pub image_data: Vec<u8>,
}

/// Events sent from a client to the coordinator.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ClientEvent {
    JoinLobby { player_id: String, nickname: String },
    Draw { segment: Segment },
    SubmitDrawing { image_data: Vec<u8> },
}

/// Events pushed from the coordinator to connected clients.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ServerEvent {
    LobbyUpdate { players: Vec<Player> },
    AdminJoined,
    JoinRejected { reason: String },
    Kicked,
    DisplaySong { song: Song },
    Error { message: String },
    AllDrawingsSubmitted,
    DrawingSubmitted { drawing: DrawingPayload },
    DrawingUpdate { drawing: DrawingPayload },
    Draw { segment: Segment },
}

/// Encodes a value as a length-prefixed frame for the stream transport.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    let payload = bincode::serialize(value)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(Box::new(bincode::ErrorKind::SizeLimit));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_BYTES + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes a frame payload (the bytes following the length prefix).
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(payload)
}

/// Parses a frame header, rejecting lengths beyond the frame size limit.
pub fn frame_len(header: [u8; FRAME_HEADER_BYTES]) -> Option<usize> {
    let len = u32::from_le_bytes(header) as usize;
    if len <= MAX_FRAME_BYTES {
        Some(len)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_point_scaling() {
        let point = Point::new(10.0, 20.0);
        let scaled = point.scaled(2.0);
        assert_approx_eq!(scaled.x, 20.0, 0.0001);
        assert_approx_eq!(scaled.y, 40.0, 0.0001);
    }

    #[test]
    fn test_segment_scaling() {
        let segment = Segment::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0));
        let scaled = segment.scaled(1.5);
        assert_approx_eq!(scaled.start.x, 1.5, 0.0001);
        assert_approx_eq!(scaled.start.y, 3.0, 0.0001);
        assert_approx_eq!(scaled.end.x, 4.5, 0.0001);
        assert_approx_eq!(scaled.end.y, 6.0, 0.0001);
    }

    #[test]
    fn test_player_defaults_not_submitted() {
        let player = Player::new("p1", "Ava");
        assert_eq!(player.id, "p1");
        assert_eq!(player.nickname, "Ava");
        assert!(!player.has_submitted);
    }

    #[test]
    fn test_event_serialization_join() {
        let event = ClientEvent::JoinLobby {
            player_id: "p1".to_string(),
            nickname: "Ava".to_string(),
        };
        let serialized = bincode::serialize(&event).unwrap();
        let deserialized: ClientEvent = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            ClientEvent::JoinLobby {
                player_id,
                nickname,
            } => {
                assert_eq!(player_id, "p1");
                assert_eq!(nickname, "Ava");
            }
            _ => panic!("Wrong event type after deserialization"),
        }
    }

    #[test]
    fn test_event_serialization_draw() {
        let event = ClientEvent::Draw {
            segment: Segment::new(Point::new(10.0, 10.0), Point::new(20.0, 20.0)),
        };
        let serialized = bincode::serialize(&event).unwrap();
        let deserialized: ClientEvent = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            ClientEvent::Draw { segment } => {
                assert_eq!(segment.start, Point::new(10.0, 10.0));
                assert_eq!(segment.end, Point::new(20.0, 20.0));
            }
            _ => panic!("Wrong event type after deserialization"),
        }
    }

    #[test]
    fn test_event_serialization_lobby_update() {
        let event = ServerEvent::LobbyUpdate {
            players: vec![Player::new("p1", "Ava"), Player::new("p2", "Ben")],
        };
        let serialized = bincode::serialize(&event).unwrap();
        let deserialized: ServerEvent = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            ServerEvent::LobbyUpdate { players } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].id, "p1");
                assert_eq!(players[1].nickname, "Ben");
            }
            _ => panic!("Wrong event type after deserialization"),
        }
    }

    #[test]
    fn test_event_serialization_song() {
        let event = ServerEvent::DisplaySong {
            song: Song {
                title: "Test Song".to_string(),
                cover: "cover.png".to_string(),
                verses: vec![Verse {
                    lyrics: "la la la".to_string(),
                    image: "verse.png".to_string(),
                    author: "p1".to_string(),
                }],
                genre: "Synthpop".to_string(),
                short_genre: "pop".to_string(),
                url: "https://example.com/song".to_string(),
            },
        };
        let serialized = bincode::serialize(&event).unwrap();
        let deserialized: ServerEvent = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            ServerEvent::DisplaySong { song } => {
                assert_eq!(song.title, "Test Song");
                assert_eq!(song.verses.len(), 1);
                assert_eq!(song.verses[0].author, "p1");
            }
            _ => panic!("Wrong event type after deserialization"),
        }
    }

    #[test]
    fn test_frame_roundtrip() {
        let event = ClientEvent::SubmitDrawing {
            image_data: vec![1, 2, 3, 4],
        };
        let frame = encode_frame(&event).unwrap();

        let mut header = [0u8; FRAME_HEADER_BYTES];
        header.copy_from_slice(&frame[..FRAME_HEADER_BYTES]);
        let len = frame_len(header).unwrap();
        assert_eq!(len, frame.len() - FRAME_HEADER_BYTES);

        let decoded: ClientEvent = decode_payload(&frame[FRAME_HEADER_BYTES..]).unwrap();
        match decoded {
            ClientEvent::SubmitDrawing { image_data } => assert_eq!(image_data, vec![1, 2, 3, 4]),
            _ => panic!("Wrong event type after frame decode"),
        }
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let event = ServerEvent::Kicked;
        let frame = encode_frame(&event).unwrap();
        let payload = &frame[FRAME_HEADER_BYTES..];

        // Truncated payload
        if payload.len() > 1 {
            let result: Result<ServerEvent, _> = decode_payload(&payload[..payload.len() - 1]);
            assert!(result.is_err(), "Should fail to decode truncated payload");
        }

        // Corrupted discriminant
        let mut corrupted = payload.to_vec();
        corrupted[0] = 0xFF;
        let result: Result<ServerEvent, _> = decode_payload(&corrupted);
        assert!(result.is_err(), "Should fail to decode corrupted payload");

        // Empty payload
        let result: Result<ServerEvent, _> = decode_payload(&[]);
        assert!(result.is_err(), "Should fail to decode empty payload");
    }

    #[test]
    fn test_frame_len_rejects_oversized() {
        let header = (MAX_FRAME_BYTES as u32 + 1).to_le_bytes();
        assert_eq!(frame_len(header), None);

        let header = (MAX_FRAME_BYTES as u32).to_le_bytes();
        assert_eq!(frame_len(header), Some(MAX_FRAME_BYTES));
    }
}
