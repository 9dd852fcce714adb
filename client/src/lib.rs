//! # Session Client Library
//!
//! This library provides the complete client-side implementation for the
//! shared drawing session. It maintains the player's connection to the
//! session coordinator, mirrors the authoritative session state the
//! coordinator pushes, and replicates the freehand drawing surface across
//! participants stroke-by-stroke.
//!
//! ## Architecture Overview
//!
//! ### Authoritative State Mirroring
//! The coordinator holds the canonical session state. The client never
//! merges rosters or adjudicates membership locally: every lobby update
//! replaces the player list wholesale, and admin rights, rejections, and
//! kicks are applied exactly as pushed.
//!
//! ### Local-First Drawing
//! Stroke segments are drawn on the local surface the moment the pointer
//! moves, then transmitted fire-and-forget. Remote segments are replayed as
//! they arrive, without acknowledgment or ordering beyond the transport's
//! own in-order delivery. The author never waits on the network.
//!
//! ### Reconnection-Safe Membership
//! The player identity is generated locally once per connection attempt and
//! re-sent verbatim after every reconnect, so the coordinator can restore
//! the player's membership in place. Transient connectivity errors retry
//! with bounded backoff in the background; rejections and kicks are
//! terminal.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Coordinator endpoint selection (flag or environment) and the reconnect
//! policy: connect timeout, bounded attempt count, backoff schedule.
//!
//! ### Connection Module (`connection`)
//! Transport lifecycle on a background task: dialing, the join handshake,
//! rejoin-on-reconnect, terminal teardown, and the session event feed the
//! application loop consumes.
//!
//! ### Session Module (`session`)
//! The mutable session mirror: partial-merge updates, exhaustive protocol
//! event application, drawing-record upserts, and a watch-based change
//! feed for presentation code.
//!
//! ### Drawing Module (`drawing`)
//! Pointer input to stroke segments: local-first rendering, exact-payload
//! transmission, remote replay, and submission capture.
//!
//! ### Canvas Module (`canvas`)
//! The rendering seam: the surface operations the engine needs, plus the
//! macroquad-backed implementation used by the binary.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::config::ClientConfig;
//! use client::connection::ConnectionManager;
//! use client::session::SessionStore;
//!
//! # async fn run() {
//! let mut store = SessionStore::new();
//! let mut connection = ConnectionManager::connect(ClientConfig::from_env(), "Ava");
//! store.set_identity(connection.player_id(), connection.nickname());
//!
//! while let Some(event) = connection.next_event().await {
//!     store.apply_session_event(&event);
//! }
//! # }
//! ```

pub mod canvas;
pub mod config;
pub mod connection;
pub mod drawing;
pub mod session;
