// ============================================
// Terrain Demo - Стриминг вокруг наблюдателя + одна правка
// ============================================
//
// Использование: terrain-demo [config.json]
// Уровень логов: RUST_LOG=debug terrain-demo

use std::process::ExitCode;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use ultraviolet::Vec3;

use voxel_terrain::terrain::mesh::TerrainVertex;
use voxel_terrain::{Brush, BrushMode, ChunkCoord, ChunkStreamer, ConfigError, Mesh, TerrainConfig};

const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

fn load_config() -> Result<TerrainConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading terrain config from {}", path);
            TerrainConfig::load_from_file(path)
        }
        None => {
            let config = TerrainConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn run(config: TerrainConfig) -> Result<(), ConfigError> {
    let mut streamer = ChunkStreamer::new(&config)?;
    let observer = Vec3::new(0.0, config.chunk_size as f32, 0.0);

    let started = Instant::now();
    let update = streamer.update(observer);
    if !streamer.wait_idle(IDLE_TIMEOUT) {
        warn!("Streaming did not settle in {:?}", IDLE_TIMEOUT);
    }
    info!(
        "Initial working set: {} requested, {} skipped as empty, {} resident in {:.2?}",
        update.requested,
        update.skipped_empty,
        streamer.resident_count(),
        started.elapsed()
    );

    // копаем яму под наблюдателем: высота поверхности по мешам его колонны
    let column = ChunkCoord::containing(observer, config.chunk_size);
    let surface_y = streamer
        .resident_chunks()
        .filter(|chunk| chunk.lod() == 0 && chunk.coord().x == column.x && chunk.coord().z == column.z)
        .filter_map(|chunk| {
            let origin = chunk.world_origin(config.chunk_size);
            chunk.mesh.bounds().map(|(_, max)| origin.y + max.y)
        })
        .fold(f32::NEG_INFINITY, f32::max);
    if surface_y.is_finite() {
        let radius = (config.chunk_size as f32 * 0.25).min(config.brush.max_radius);
        let brush = Brush::new(
            Vec3::new(observer.x, surface_y, observer.z),
            radius,
            config.brush.max_intensity,
            BrushMode::Subtract,
            &config.brush,
        )?;
        let edits = streamer.apply_brush(brush);
        if !streamer.wait_idle(IDLE_TIMEOUT) {
            warn!("Edits did not settle in {:?}", IDLE_TIMEOUT);
        }
        info!("Brush at y = {:.1} touched {} chunks", surface_y, edits);
    } else {
        warn!("No surface near the observer, skipping the brush edit");
    }

    let mut triangles = 0usize;
    let mut vertex_bytes = 0usize;
    for chunk in streamer.resident_chunks() {
        triangles += chunk.mesh.triangle_count();
        let vertices = chunk.mesh.to_vertices(chunk.world_origin(config.chunk_size));
        vertex_bytes += Mesh::vertex_bytes(&vertices).len() + chunk.mesh.index_bytes().len();
    }
    let stats = streamer.scheduler().stats();
    info!(
        "Resident chunks: {}, triangles: {}, GPU payload: {:.1} MiB ({} B per vertex)",
        streamer.resident_count(),
        triangles,
        vertex_bytes as f64 / (1024.0 * 1024.0),
        TerrainVertex::STRIDE
    );
    info!(
        "Scheduler: {} enqueued, {} completed, {} cancelled, {} failed, {} deduplicated, {} superseded",
        stats.enqueued, stats.completed, stats.cancelled, stats.failed, stats.deduplicated, stats.superseded
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = load_config().and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("terrain-demo failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
