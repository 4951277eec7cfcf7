//! Headless run of a small level with scripted input.
//!
//! Run with:
//!   cargo run --example headless_run -p floe-engine
//!   cargo run --example headless_run -p floe-engine -- level.json [config.json]
//!
//! With no arguments a built-in level is used. Set `RUST_LOG=debug` to see
//! every room transition and warp.

use anyhow::Context;
use floe_engine::prelude::*;
use serde_json::json;
use tracing::info;

const MAX_FRAMES: u64 = 3_600;

fn builtin_level() -> anyhow::Result<RoomDefinition> {
    let def = serde_json::from_value(json!({
        "name": "demo",
        "width": 1280,
        "height": 480,
        "music": "demo.ogg",
        "tiles": [
            { "shape": "solid", "x": 0, "y": 448, "width": 1280, "height": 32 },
            { "shape": "slope_top_left", "x": 320, "y": 416, "width": 64, "height": 32 },
            { "shape": "solid", "x": 384, "y": 416, "width": 192, "height": 32 },
            { "shape": "level_end", "x": 1152, "y": 384, "width": 32, "height": 64 }
        ],
        "spawns": [
            { "tag": "player", "x": 64, "y": 416 },
            { "tag": "coin", "x": 160, "y": 416 },
            { "tag": "coin", "x": 192, "y": 416 },
            { "tag": "walking_snowball", "x": 700, "y": 416 },
            { "tag": "spring", "x": 880, "y": 416 }
        ],
        "timeline": {
            "name": "demo_intro",
            "steps": { "0": ["play_music intro.ogg"], "120": ["setattr music demo.ogg"] }
        }
    }))?;
    Ok(def)
}

/// Run right and hop every so often.
fn scripted_input(frame: u64) -> PlayerInput {
    PlayerInput {
        right: true,
        jump: frame % 50 < 12,
        ..PlayerInput::default()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let def = match args.first() {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading level {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing level {path}"))?
        }
        None => builtin_level()?,
    };
    let cfg = match args.get(1) {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
            EngineConfig::from_json_str(&text)?
        }
        None => EngineConfig::default(),
    };

    let level = def.name.clone();
    let mut game = Game::new_game(cfg, [def], Levelset::new([level.clone()]))?;
    let start_hash = game.state_hash()?;

    let mut sounds = 0usize;
    while game.frame_count() < MAX_FRAMES && *game.screen() != Screen::Finished {
        let record = game.frame(&[scripted_input(game.frame_count())]);
        sounds += record.sounds().count();
    }

    let diag = game.diagnostics();
    info!(
        level = %level,
        frames = game.frame_count(),
        score = game.score(),
        cleared = game.cleared_levels().count(),
        sounds,
        last_frame_us = diag.total_time.as_micros() as u64,
        "run finished"
    );
    let end_hash = game.state_hash()?;
    info!(start = %start_hash, end = %end_hash, "state hashes");
    Ok(())
}
