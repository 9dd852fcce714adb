//! Session state mirror and protocol event application
//!
//! [`SessionStore`] holds the client's view of the shared session: the
//! roster pushed by the coordinator, the local join lifecycle, the drawing
//! submission lifecycle, and the gallery of per-player drawings. All
//! mutation flows through [`SessionStore::update`], which shallow-merges a
//! partial delta so near-simultaneous events never clobber unrelated
//! fields, and every applied mutation advances a generation counter that
//! presentation code can watch.

use crate::connection::SessionEvent;
use log::{debug, info};
use shared::{DrawingPayload, Player, ServerEvent, Song};
use tokio::sync::watch;

/// Error message surfaced after a forced removal.
pub const KICKED_MESSAGE: &str = "You were kicked";

/// Per-player accumulated drawing state, in-progress or finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingRecord {
    pub player_id: String,
    pub nickname: String,
    pub image_data: Vec<u8>,
    pub submitted: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Most recent full roster from the coordinator, in coordinator order.
    pub players: Vec<Player>,
    /// Set by an explicit coordinator event and never cleared afterwards.
    pub is_admin: bool,
    pub player_id: Option<String>,
    pub nickname: Option<String>,
    pub has_joined: bool,
    pub join_error: Option<String>,
    pub is_submitting_drawing: bool,
    pub has_submitted_drawing: bool,
    pub waiting_for_others: bool,
    pub all_players_submitted: bool,
    pub submit_error: Option<String>,
    pub song: Option<Song>,
    /// Gallery of drawings keyed by player id, in first-seen order.
    pub drawings: Vec<DrawingRecord>,
}

/// Partial state delta for [`SessionStore::update`].
///
/// Absent fields leave the corresponding state untouched; the doubly-wrapped
/// `Option<Option<_>>` fields distinguish "clear the value" from "leave it
/// alone".
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub players: Option<Vec<Player>>,
    pub is_admin: Option<bool>,
    pub player_id: Option<Option<String>>,
    pub nickname: Option<Option<String>>,
    pub has_joined: Option<bool>,
    pub join_error: Option<Option<String>>,
    pub is_submitting_drawing: Option<bool>,
    pub has_submitted_drawing: Option<bool>,
    pub waiting_for_others: Option<bool>,
    pub all_players_submitted: Option<bool>,
    pub submit_error: Option<Option<String>>,
    pub song: Option<Option<Song>>,
}

pub struct SessionStore {
    state: SessionState,
    generation: u64,
    notify: watch::Sender<u64>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(0);
        SessionStore {
            state: SessionState::default(),
            generation: 0,
            notify,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Change feed: receivers observe the generation counter advancing on
    /// every applied mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    fn bump(&mut self) {
        self.generation += 1;
        let _ = self.notify.send(self.generation);
    }

    /// Shallow-merges the supplied fields into the session state. Fields
    /// absent from the delta are never implicitly cleared.
    pub fn update(&mut self, update: StateUpdate) {
        let state = &mut self.state;
        if let Some(players) = update.players {
            state.players = players;
        }
        if let Some(is_admin) = update.is_admin {
            state.is_admin = is_admin;
        }
        if let Some(player_id) = update.player_id {
            state.player_id = player_id;
        }
        if let Some(nickname) = update.nickname {
            state.nickname = nickname;
        }
        if let Some(has_joined) = update.has_joined {
            state.has_joined = has_joined;
        }
        if let Some(join_error) = update.join_error {
            state.join_error = join_error;
        }
        if let Some(is_submitting) = update.is_submitting_drawing {
            state.is_submitting_drawing = is_submitting;
        }
        if let Some(has_submitted) = update.has_submitted_drawing {
            state.has_submitted_drawing = has_submitted;
        }
        if let Some(waiting) = update.waiting_for_others {
            state.waiting_for_others = waiting;
        }
        if let Some(all_submitted) = update.all_players_submitted {
            state.all_players_submitted = all_submitted;
        }
        if let Some(submit_error) = update.submit_error {
            state.submit_error = submit_error;
        }
        if let Some(song) = update.song {
            state.song = song;
        }
        self.bump();
    }

    /// Records the locally generated identity for this connection attempt.
    pub fn set_identity(&mut self, player_id: &str, nickname: &str) {
        self.update(StateUpdate {
            player_id: Some(Some(player_id.to_string())),
            nickname: Some(Some(nickname.to_string())),
            ..Default::default()
        });
    }

    /// Marks a drawing submission as in flight.
    pub fn begin_submit(&mut self) {
        self.update(StateUpdate {
            is_submitting_drawing: Some(true),
            submit_error: Some(None),
            ..Default::default()
        });
    }

    /// Restores the all-default state, as on kick or navigation away.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.bump();
    }

    pub fn apply_session_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Server(server_event) => self.apply_server_event(server_event),
            SessionEvent::Joined | SessionEvent::Rejoined => self.update(StateUpdate {
                has_joined: Some(true),
                join_error: Some(None),
                ..Default::default()
            }),
            SessionEvent::ConnectError { message } => self.update(StateUpdate {
                join_error: Some(Some(message.clone())),
                ..Default::default()
            }),
            SessionEvent::RetriesExhausted => self.update(StateUpdate {
                has_joined: Some(false),
                ..Default::default()
            }),
            SessionEvent::Closed => {}
        }
    }

    pub fn apply_server_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::LobbyUpdate { players } => {
                debug!("Roster replaced: {} players", players.len());
                self.update(StateUpdate {
                    players: Some(players.clone()),
                    ..Default::default()
                });
            }
            ServerEvent::AdminJoined => self.update(StateUpdate {
                is_admin: Some(true),
                ..Default::default()
            }),
            ServerEvent::JoinRejected { reason } => {
                info!("Join rejected: {}", reason);
                self.update(StateUpdate {
                    join_error: Some(Some(reason.clone())),
                    has_joined: Some(false),
                    ..Default::default()
                });
            }
            ServerEvent::Kicked => {
                info!("Kicked from session; resetting state");
                self.reset();
                self.update(StateUpdate {
                    join_error: Some(Some(KICKED_MESSAGE.to_string())),
                    ..Default::default()
                });
            }
            ServerEvent::DisplaySong { song } => self.update(StateUpdate {
                song: Some(Some(song.clone())),
                ..Default::default()
            }),
            ServerEvent::Error { message } => self.update(StateUpdate {
                submit_error: Some(Some(message.clone())),
                is_submitting_drawing: Some(false),
                ..Default::default()
            }),
            ServerEvent::AllDrawingsSubmitted => self.update(StateUpdate {
                waiting_for_others: Some(false),
                all_players_submitted: Some(true),
                ..Default::default()
            }),
            ServerEvent::DrawingSubmitted { drawing } => {
                let is_local = self.state.player_id.as_deref() == Some(drawing.player_id.as_str());
                self.upsert_drawing(drawing, true);
                if is_local {
                    self.update(StateUpdate {
                        is_submitting_drawing: Some(false),
                        has_submitted_drawing: Some(true),
                        waiting_for_others: Some(true),
                        ..Default::default()
                    });
                }
            }
            ServerEvent::DrawingUpdate { drawing } => self.upsert_drawing(drawing, false),
            // In-flight peer strokes are replayed by the drawing engine and
            // leave the session mirror untouched.
            ServerEvent::Draw { .. } => {}
        }
    }

    /// Insert-or-update by player id. Existing records keep their position
    /// so a gallery renders in stable order. Submission is monotone: an
    /// in-progress snapshot never downgrades a finalized record.
    fn upsert_drawing(&mut self, drawing: &DrawingPayload, submitted: bool) {
        match self
            .state
            .drawings
            .iter_mut()
            .find(|record| record.player_id == drawing.player_id)
        {
            Some(record) => {
                record.nickname = drawing.nickname.clone();
                record.image_data = drawing.image_data.clone();
                record.submitted = record.submitted || submitted;
            }
            None => self.state.drawings.push(DrawingRecord {
                player_id: drawing.player_id.clone(),
                nickname: drawing.nickname.clone(),
                image_data: drawing.image_data.clone(),
                submitted,
            }),
        }
        self.bump();
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
