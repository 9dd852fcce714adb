use clap::Parser;
use client::canvas::MacroquadCanvas;
use client::config::ClientConfig;
use client::connection::{ConnectionManager, ConnectionState, SessionEvent};
use client::drawing::DrawingSyncEngine;
use client::session::{SessionState, SessionStore, StateUpdate};
use log::{error, info};
use macroquad::prelude::*;
use shared::{Point, ServerEvent};
use std::time::Duration;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Coordinator address to connect to (falls back to SKETCHJAM_SERVER)
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Nickname to join the lobby with
    #[arg(short = 'n', long, default_value = "Player")]
    nickname: String,

    /// Canvas width in logical pixels
    #[arg(short = 'w', long, default_value = "800")]
    width: f32,

    /// Canvas height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: f32,

    /// Device pixel ratio applied to the drawing surface
    #[arg(long, default_value = "1.0")]
    scale: f32,

    /// Stroke width in logical pixels
    #[arg(long, default_value = "3.0")]
    stroke_width: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = match &args.server {
        Some(addr) => ClientConfig::new(addr.clone()),
        None => ClientConfig::from_env(),
    };

    info!("Starting session client...");
    if let Some(addr) = &config.server_addr {
        info!("Connecting to: {}", addr);
    }
    info!("Draw with the mouse, C to clear, Enter to submit");

    run(config, args).await
}

async fn run(config: ClientConfig, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = SessionStore::new();
    let mut connection = ConnectionManager::connect(config, &args.nickname);
    store.set_identity(connection.player_id(), connection.nickname());

    let surface = MacroquadCanvas::new(args.width, args.height, args.scale);
    let mut engine = DrawingSyncEngine::new(surface, connection.sender());
    engine.surface_mut().set_stroke(args.stroke_width, BLACK);

    let mut input_interval = interval(Duration::from_millis(16));
    let mut render_interval = interval(Duration::from_millis(16));

    loop {
        tokio::select! {
            event = connection.next_event() => match event {
                Some(event) => {
                    if let SessionEvent::Server(ServerEvent::Draw { segment }) = &event {
                        engine.on_remote_segment(segment);
                    }
                    store.apply_session_event(&event);

                    if connection.state() == ConnectionState::Kicked {
                        info!("Removed from session; returning to entry screen");
                        break;
                    }
                }
                None => {
                    info!("Connection closed");
                    break;
                }
            },

            _ = input_interval.tick() => {
                handle_input(&mut engine, &mut store);
            },

            _ = render_interval.tick() => {
                render_frame(&engine, store.state(), args.width, args.height);
            },
        }
    }

    connection.disconnect();
    Ok(())
}

fn handle_input(engine: &mut DrawingSyncEngine<MacroquadCanvas>, store: &mut SessionStore) {
    let (x, y) = mouse_position();
    let point = Point::new(x, y);

    if is_mouse_button_pressed(MouseButton::Left) {
        engine.begin_stroke(point);
    } else if is_mouse_button_down(MouseButton::Left) {
        engine.continue_stroke(point);
    }
    if is_mouse_button_released(MouseButton::Left) {
        engine.end_stroke();
    }

    if is_key_pressed(KeyCode::C) {
        engine.clear();
    }

    if is_key_pressed(KeyCode::Enter) && !store.state().has_submitted_drawing {
        store.begin_submit();
        if let Err(e) = engine.submit() {
            error!("Failed to capture drawing: {}", e);
            store.update(StateUpdate {
                is_submitting_drawing: Some(false),
                submit_error: Some(Some(e.to_string())),
                ..Default::default()
            });
        }
    }
}

fn render_frame(
    engine: &DrawingSyncEngine<MacroquadCanvas>,
    state: &SessionState,
    width: f32,
    height: f32,
) {
    clear_background(Color::from_rgba(26, 26, 26, 255));

    draw_texture_ex(
        engine.surface().texture(),
        0.0,
        0.0,
        WHITE,
        DrawTextureParams {
            dest_size: Some(vec2(width, height)),
            ..Default::default()
        },
    );

    draw_status(state);
}

fn draw_status(state: &SessionState) {
    let mut lines: Vec<String> = Vec::new();

    match &state.join_error {
        Some(message) => lines.push(message.clone()),
        None if state.has_joined => {
            lines.push(format!("{} players in lobby", state.players.len()));
        }
        None => lines.push("Connecting...".to_string()),
    }

    if state.is_submitting_drawing {
        lines.push("Submitting drawing...".to_string());
    }
    if state.waiting_for_others {
        lines.push("Waiting for the other players...".to_string());
    }
    if state.all_players_submitted {
        lines.push("All drawings are in".to_string());
    }
    if let Some(message) = &state.submit_error {
        lines.push(message.clone());
    }
    if let Some(song) = &state.song {
        lines.push(format!("Now playing: {} ({})", song.title, song.short_genre));
    }

    for (i, line) in lines.iter().enumerate() {
        draw_text(line, 10.0, 20.0 + i as f32 * 18.0, 16.0, WHITE);
    }
}
