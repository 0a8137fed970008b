//! Headless terrain streaming run.
//!
//! Loads `config.ron` (CLI flags override it), flies a viewer across the
//! terrain at a fixed 60 Hz step and reports what the stream produced.
//! Run with `cargo run -p strata-app -- --ticks 600 --speed 120`.

mod flight;
mod reload;
mod stats_sink;

use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::Vec2;
use strata_config::{CliArgs, Config, ValidatedTerrain, default_config_dir};
use strata_stream::{ChunkStore, StreamStats};
use strata_work::{SpawnError, WorkQueue};
use tracing::{debug, info, warn};

use crate::flight::{FIXED_DT, Flight};
use crate::reload::settings_updates;
use crate::stats_sink::{SinkSummary, StatsSink};

/// How long to wait for outstanding generation after the last tick.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

struct RunReport {
    ticks: u32,
    viewer: Vec2,
    elapsed: Duration,
    stream: StreamStats,
    sink: SinkSummary,
    settled: bool,
}

/// The file contents before CLI overrides, used to notice edits on disk.
struct ReloadState<'a> {
    config_dir: &'a Path,
    args: &'a CliArgs,
    on_disk: Config,
}

impl ReloadState<'_> {
    /// Check the config file and return the new validated terrain, if it changed.
    fn poll(&mut self) -> Option<ValidatedTerrain> {
        let reloaded = match self.on_disk.reload(self.config_dir) {
            Ok(Some(config)) => config,
            Ok(None) => return None,
            Err(e) => {
                warn!("Config reload failed: {e}");
                return None;
            }
        };
        self.on_disk = reloaded.clone();

        let mut merged = reloaded;
        merged.apply_cli_overrides(self.args);
        match merged.terrain.validate() {
            Ok(terrain) => Some(terrain),
            Err(e) => {
                warn!("Ignoring edited config: {e}");
                None
            }
        }
    }
}

fn log_stats(tick: u32, viewer: Vec2, stats: &StreamStats) {
    info!(
        tick,
        viewer = %viewer,
        chunks = stats.chunks,
        visible = stats.visible,
        in_flight = stats.in_flight,
        backlog = stats.backlog,
        meshes = stats.meshes_generated,
        colliders = stats.colliders_attached,
        evicted = stats.chunks_evicted,
        "stream"
    );
}

fn run(
    config: &Config,
    terrain: ValidatedTerrain,
    mut reload: ReloadState<'_>,
) -> Result<RunReport, SpawnError> {
    let queue = WorkQueue::new(config.workers.threads, config.workers.queue_capacity)?;
    info!(
        workers = queue.worker_count(),
        chunk_size = terrain.mesh.active_chunk_size().cells(),
        view_distance = terrain.stream.max_view_distance(),
        "Starting terrain stream"
    );
    for info in terrain.stream.lod_table.levels() {
        debug!(lod = info.lod, visible_distance = info.visible_distance, "LOD level");
    }

    let mut current = terrain.clone();
    let sink = StatsSink::new(&terrain.height.elevation);
    let mut store = ChunkStore::new(terrain.stream, terrain.height, terrain.mesh, sink, queue);

    let demo = &config.demo;
    let mut flight = Flight::new(Vec2::ZERO, demo.speed, demo.heading_degrees);
    let started = Instant::now();

    // --- Fixed-step flight ---
    store.tick(flight.position());
    for tick in 1..=demo.ticks {
        let viewer = flight.step(FIXED_DT);
        store.tick(viewer);

        if demo.stats_interval > 0 && tick % demo.stats_interval == 0 {
            log_stats(tick, viewer, &store.stats());

            if let Some(next) = reload.poll() {
                let updates = settings_updates(&current, &next);
                if next.stream != current.stream {
                    warn!("Stream policy changes take effect on restart");
                }
                for update in updates {
                    store.apply_settings(update);
                }
                current = next;
            }
        }
    }

    // --- Settle ---
    let viewer = flight.position();
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while !store.is_idle() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
        store.tick(viewer);
    }
    let settled = store.is_idle();
    if !settled {
        warn!(in_flight = store.stats().in_flight, "Generation still outstanding at exit");
    }
    store.queue().shutdown();

    Ok(RunReport {
        ticks: demo.ticks,
        viewer,
        elapsed: started.elapsed(),
        stream: store.stats(),
        sink: store.sink().summary(),
        settled,
    })
}

fn print_report(report: &RunReport) {
    let stream = &report.stream;
    let sink = &report.sink;
    println!("strata: {} ticks in {:.2?}", report.ticks, report.elapsed);
    println!("  viewer:      ({:.1}, {:.1})", report.viewer.x, report.viewer.y);
    println!("  chunks:      {} tracked, {} visible", stream.chunks, stream.visible);
    println!(
        "  generated:   {} height fields, {} meshes",
        stream.height_fields_generated, stream.meshes_generated
    );
    println!(
        "  attached:    {} meshes ({} LOD swaps), {} colliders",
        sink.mesh_attachments, sink.lod_swaps, stream.colliders_attached
    );
    println!(
        "  resident:    {} meshes, {} vertices, {} triangles",
        sink.resident_meshes, sink.resident_vertices, sink.resident_triangles
    );
    println!(
        "  elevation:   {:.1} to {:.1}",
        sink.elevation_range.0, sink.elevation_range.1
    );
    println!(
        "  evicted:     {} chunks, {} failed deliveries",
        stream.chunks_evicted, stream.failed_deliveries
    );
    if !report.settled {
        println!("  (generation did not finish before exit)");
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let Some(config_dir) = args.config.clone().or_else(default_config_dir) else {
        eprintln!("Failed to resolve config directory, pass --config");
        return ExitCode::FAILURE;
    };

    // Load or create config, then apply CLI overrides
    let on_disk = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    let mut config = on_disk.clone();
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    strata_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let terrain = match config.terrain.validate() {
        Ok(terrain) => terrain,
        Err(e) => {
            tracing::error!("Invalid terrain config: {e}");
            eprintln!("Invalid terrain config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let reload = ReloadState {
        config_dir: &config_dir,
        args: &args,
        on_disk,
    };
    match run(&config, terrain, reload) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
