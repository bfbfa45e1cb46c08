//! Headless demo
//!
//! Runs a walled arena with bouncing balls through the full host lifecycle
//! (create, resume, run, pause, destroy) and prints a summary. Balls that
//! escape through the gap in the right-hand wall are despawned; a repeating
//! alarm keeps spawning new ones.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use tile_engine::core::config::EngineConfig;
use tile_engine::core::error::Result;
use tile_engine::core::types::{Rect, TileCode, Vec2};
use tile_engine::ecs::World;
use tile_engine::engine::{
    frame_channel, AudioSink, Engine, Game, HostSurface, InputEvent, Orientation, TouchPhase,
};
use tile_engine::entity::{Body, Entity, EntityKind, UpdateContext};
use tile_engine::simulation::{Alarm, AlarmContext};

const BALL: EntityKind = EntityKind("ball");
const PADDLE: EntityKind = EntityKind("paddle");
const WALL: TileCode = 1;
const EMPTY: TileCode = -1;

/// Headless tile engine demo
#[derive(Parser, Debug)]
#[command(name = "tile-engine")]
#[command(about = "Run a headless bouncing-ball arena and print a run summary")]
struct Args {
    /// Ticks to run before pausing
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Target ticks per second (0 = as fast as possible)
    #[arg(long)]
    tps: Option<u32>,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Balls spawned at startup
    #[arg(long, default_value_t = 16)]
    balls: usize,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RunSummary {
    seed: u64,
    ticks: u64,
    entities: usize,
    balls: usize,
    frames_rendered: u64,
    frames_dropped: u64,
    avg_tick_ms: f32,
    max_tick_ms: f32,
    wall_time_ms: u128,
}

struct Ball {
    body: Body,
    velocity: Vec2,
}

impl Ball {
    fn boxed(velocity: Vec2) -> Box<dyn Entity> {
        Box::new(Ball {
            body: Body::new(6.0, 6.0),
            velocity,
        })
    }

    fn random(rng: &mut StdRng) -> Box<dyn Entity> {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let speed = rng.gen_range(1.0f32..4.0);
        Ball::boxed(Vec2::new(angle.cos() * speed, angle.sin() * speed))
    }
}

impl Entity for Ball {
    fn kind(&self) -> EntityKind {
        BALL
    }

    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let bounds = self.body.bounds();
        if !ctx.tiles_in_rect(bounds.translate(Vec2::new(self.velocity.x, 0.0))).is_empty() {
            self.velocity.x = -self.velocity.x;
        }
        if !ctx.tiles_in_rect(bounds.translate(Vec2::new(0.0, self.velocity.y))).is_empty() {
            self.velocity.y = -self.velocity.y;
        }
        self.body.translate(self.velocity);

        if !self.body.bounds().intersects(&ctx.tiles.bounds()) {
            tracing::trace!(id = ?ctx.id, tick = ctx.tick, "ball escaped");
            self.body.destroy();
        }
    }
}

/// Slides left and right along the bottom; the viewport follows it
struct Paddle {
    body: Body,
    speed: f32,
    min_x: f32,
    max_x: f32,
}

impl Entity for Paddle {
    fn kind(&self) -> EntityKind {
        PADDLE
    }

    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn update(&mut self, _ctx: &mut UpdateContext<'_>) {
        let x = self.body.position.x + self.speed;
        if x < self.min_x || x > self.max_x {
            self.speed = -self.speed;
        }
        self.body.translate(Vec2::new(self.speed, 0.0));
    }
}

struct Arena {
    rng: StdRng,
    initial_balls: usize,
}

impl Arena {
    fn map(cols: usize, rows: usize) -> Vec<Vec<TileCode>> {
        (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| {
                        let edge = row == 0 || row == rows - 1 || col == 0 || col == cols - 1;
                        let gap = col == cols - 1 && (rows / 2 - 1..=rows / 2 + 1).contains(&row);
                        if edge && !gap {
                            WALL
                        } else {
                            EMPTY
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

impl Game for Arena {
    fn initialize(&mut self, world: &mut World) -> Result<()> {
        world.load_tile_map(Arena::map(20, 15), 0.0, 0.0)?;
        let center = world.tile_grid().bounds().center();
        let (width, height) = (world.map_width(), world.map_height());

        world.add_player(
            Box::new(Paddle {
                body: Body::new(40.0, 8.0),
                speed: 2.0,
                min_x: 40.0,
                max_x: width - 80.0,
            }),
            center.x,
            height - 48.0,
            1.0,
        );

        for _ in 0..self.initial_balls {
            world.add_entity_at_layer(Ball::random(&mut self.rng), center.x, center.y, 0.5);
        }

        let mut rng = StdRng::seed_from_u64(self.rng.gen());
        world.add_alarm(Alarm::repeating(30, move |ctx: &mut AlarmContext<'_>| {
            ctx.commands
                .spawn_at_layer(Ball::random(&mut rng), center.x, center.y, 0.5);
        }));

        tracing::info!(balls = self.initial_balls, "arena ready");
        Ok(())
    }

    fn update(&mut self, world: &mut World) {
        if world.current_tick % 120 == 0 {
            tracing::debug!(
                tick = world.current_tick,
                balls = world.entities_of_kind(BALL).len(),
                "arena status"
            );
        }
    }

    fn on_input(&mut self, world: &mut World, event: InputEvent) {
        if let InputEvent::Touch {
            x,
            y,
            phase: TouchPhase::Down,
        } = event
        {
            world.add_entity_at_layer(Ball::random(&mut self.rng), x, y, 0.5);
        }
    }
}

struct HeadlessSurface;

impl HostSurface for HeadlessSurface {
    fn request_fullscreen(&mut self) {
        tracing::debug!("fullscreen requested");
    }

    fn request_orientation(&mut self, orientation: Orientation) {
        tracing::debug!(?orientation, "orientation requested");
    }

    fn screen_size(&self) -> (u32, u32) {
        (1280, 720)
    }
}

struct SilentAudio;

impl AudioSink for SilentAudio {
    fn resume(&mut self) {
        tracing::debug!("audio resumed");
    }

    fn pause(&mut self) {
        tracing::debug!("audio paused");
    }

    fn release(&mut self) {
        tracing::debug!("audio released");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tile_engine=info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(tps) = args.tps {
        config.game_loop.target_tps = tps;
    }

    let (signal, frames) = frame_channel();
    let game = Arena {
        rng: StdRng::seed_from_u64(seed),
        initial_balls: args.balls,
    };
    let mut engine = Engine::new(config, game)?
        .with_surface(Box::new(HeadlessSurface))
        .with_audio(Box::new(SilentAudio))
        .with_render_target(Arc::new(signal));

    engine.on_create()?;
    tracing::info!(
        width = engine.screen_width(),
        height = engine.screen_height(),
        "surface configured"
    );

    // Renderer: reads the world between ticks, on its own thread
    let done = Arc::new(AtomicBool::new(false));
    let rendered = Arc::new(AtomicU64::new(0));
    let renderer = {
        let world = engine.world().clone();
        let done = Arc::clone(&done);
        let rendered = Arc::clone(&rendered);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let Ok(frame) = frames.recv_timeout(Duration::from_millis(50)) else {
                    continue;
                };
                rendered.fetch_add(1, Ordering::Relaxed);
                if frame.tick % 60 != 0 {
                    continue;
                }
                let Ok(world) = world.read() else {
                    break;
                };
                let view = world
                    .player_position()
                    .map(|anchor| Rect::from_xywh(anchor.x - 160.0, anchor.y - 120.0, 320.0, 240.0));
                tracing::info!(
                    tick = frame.tick,
                    entities = world.entity_count(),
                    visible = view.map_or(0, |view| world.find_entities_in_rect(view).len()),
                    zoom = world.render.zoom,
                    "frame"
                );
            }
            frames.dropped()
        })
    };

    let started = Instant::now();
    engine.on_resume()?;
    engine.dispatch_input(InputEvent::Touch {
        x: 100.0,
        y: 100.0,
        phase: TouchPhase::Down,
    })?;

    while engine.world().read()?.current_tick < args.ticks {
        thread::sleep(Duration::from_millis(2));
    }
    engine.on_pause()?;
    let wall_time_ms = started.elapsed().as_millis();

    let metrics = engine.tick_metrics();
    let summary = {
        let world = engine.world().read()?;
        RunSummary {
            seed,
            ticks: world.current_tick,
            entities: world.entity_count(),
            balls: world.entities_of_kind(BALL).len(),
            frames_rendered: 0,
            frames_dropped: 0,
            avg_tick_ms: metrics.avg_tick_time_ms(),
            max_tick_ms: metrics.max_tick_time_ms(),
            wall_time_ms,
        }
    };

    engine.on_destroy()?;
    done.store(true, Ordering::Relaxed);
    let frames_dropped = renderer.join().unwrap_or_default();
    let summary = RunSummary {
        frames_rendered: rendered.load(Ordering::Relaxed),
        frames_dropped,
        ..summary
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::error!(%err, "failed to serialize summary"),
        }
    } else {
        println!("=== RUN SUMMARY ===");
        println!("Seed:            {}", summary.seed);
        println!("Ticks:           {}", summary.ticks);
        println!("Entities:        {} ({} balls)", summary.entities, summary.balls);
        println!(
            "Frames:          {} rendered, {} dropped",
            summary.frames_rendered, summary.frames_dropped
        );
        println!(
            "Tick time:       {:.3} ms avg, {:.3} ms max",
            summary.avg_tick_ms, summary.max_tick_ms
        );
        println!("Wall time:       {} ms", summary.wall_time_ms);
    }

    Ok(())
}
