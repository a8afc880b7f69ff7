// ============================================
// Chunk Streamer - Рабочий набор вокруг наблюдателя
// ============================================
//
// 1. Наблюдатель -> кольца LOD (Chebyshev по XZ) x вертикальная полоса
// 2. Новые/изменённые чанки -> параллельный пре-тест пустоты (rayon)
// 3. Запросы генерации, отмена ушедших, сбор готовых handle
// 4. Кисти -> правки всех задетых резидентных чанков LOD 0

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;
use ultraviolet::Vec3;

use crate::terrain::cache::{ChunkContext, ChunkCoord};
use crate::terrain::config::{StreamingConfig, TerrainConfig};
use crate::terrain::edit::{affected_chunks, Brush};
use crate::terrain::error::{ConfigError, JobError};
use crate::terrain::lod::{LodPolicy, RingLodPolicy};
use crate::terrain::voxel::ChunkData;

use super::handle::CompletionHandle;
use super::scheduler::ChunkScheduler;
use super::types::EditPayload;

/// Итог одного пересчёта рабочего набора
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamUpdate {
    pub requested: usize,
    pub cancelled: usize,
    pub dropped: usize,
    /// Отброшены пре-тестом пустоты
    pub skipped_empty: usize,
}

impl StreamUpdate {
    pub fn is_empty(&self) -> bool {
        *self == StreamUpdate::default()
    }
}

/// Стриминг чанков поверх планировщика
pub struct ChunkStreamer {
    scheduler: ChunkScheduler,
    policy: Box<dyn LodPolicy>,
    streaming: StreamingConfig,
    chunk_size: u32,
    observer: Option<ChunkCoord>,
    /// Рабочий набор: координата -> LOD
    wanted: HashMap<ChunkCoord, u8>,
    /// Пустые по пре-тесту (без генерации)
    empty: HashSet<ChunkContext>,
    requested: HashMap<ChunkCoord, CompletionHandle>,
    resident: HashMap<ChunkCoord, Arc<ChunkData>>,
    edits: HashMap<ChunkCoord, CompletionHandle>,
    /// Кисти, ждущие окончания предыдущей правки того же чанка
    deferred: HashMap<ChunkCoord, VecDeque<Brush>>,
}

impl ChunkStreamer {
    pub fn new(config: &TerrainConfig) -> Result<Self, ConfigError> {
        let policy = RingLodPolicy::new(config.lod.levels.clone())?;
        let scheduler = ChunkScheduler::new(config)?;
        Ok(Self::with_scheduler(config, scheduler, Box::new(policy)))
    }

    pub fn with_scheduler(config: &TerrainConfig, scheduler: ChunkScheduler, policy: Box<dyn LodPolicy>) -> Self {
        Self {
            scheduler,
            policy,
            streaming: config.streaming,
            chunk_size: config.chunk_size,
            observer: None,
            wanted: HashMap::new(),
            empty: HashSet::new(),
            requested: HashMap::new(),
            resident: HashMap::new(),
            edits: HashMap::new(),
            deferred: HashMap::new(),
        }
    }

    pub fn scheduler(&self) -> &ChunkScheduler {
        &self.scheduler
    }

    /// Требуемый набор (координата -> LOD) для чанка наблюдателя.
    ///
    /// Квадродерево по XZ: ячейка верхнего уровня = чанк самого грубого LOD.
    /// Ячейка берётся целиком, если её ближайшая к наблюдателю колонна
    /// не требует большей детализации, иначе делится на 4. Чанки набора
    /// не пересекаются по объёму.
    pub fn working_set(&self, center: ChunkCoord) -> HashMap<ChunkCoord, u8> {
        let top = self.policy.max_lod().min(self.scheduler.pipeline().max_lod());
        let size = 1i32 << top;
        let radius = self.policy.max_distance();

        let mut cells = Vec::new();
        let (x0, x1) = ((center.x - radius).div_euclid(size), (center.x + radius).div_euclid(size));
        let (z0, z1) = ((center.z - radius).div_euclid(size), (center.z + radius).div_euclid(size));
        for cz in z0..=z1 {
            for cx in x0..=x1 {
                self.split_cell(center, cx * size, cz * size, top, &mut cells);
            }
        }

        let mut set = HashMap::new();
        for (x, z, lod) in cells {
            for y in self.streaming.min_chunk_y..=self.streaming.max_chunk_y {
                set.insert(ChunkCoord::new(x, y, z).snapped_to_lod(lod), lod);
            }
        }
        set
    }

    fn split_cell(&self, center: ChunkCoord, x: i32, z: i32, lod: u8, out: &mut Vec<(i32, i32, u8)>) {
        let span = 1i32 << lod;
        let nearest = axis_gap(center.x, x, span).max(axis_gap(center.z, z, span));
        match self.policy.lod_for_distance(nearest) {
            None => {}
            Some(desired) if desired >= lod || lod == 0 => out.push((x, z, lod)),
            Some(_) => {
                let half = span / 2;
                for (ox, oz) in [(0, 0), (half, 0), (0, half), (half, half)] {
                    self.split_cell(center, x + ox, z + oz, lod - 1, out);
                }
            }
        }
    }

    /// Обновить положение наблюдателя и рабочий набор
    pub fn update(&mut self, position: Vec3) -> StreamUpdate {
        self.scheduler.set_observer_position(position);
        let center = ChunkCoord::containing(position, self.chunk_size);
        if self.observer == Some(center) {
            return StreamUpdate::default();
        }
        self.observer = Some(center);

        let target = self.working_set(center);
        let mut update = StreamUpdate::default();

        // ушедшие из набора
        let leaving: Vec<ChunkCoord> = self.wanted.keys().filter(|c| !target.contains_key(*c)).copied().collect();
        for coord in leaving {
            if let Some(lod) = self.wanted.remove(&coord) {
                self.empty.remove(&ChunkContext::new(coord, lod));
            }
            if self.requested.remove(&coord).is_some() && self.scheduler.cancel_generation(coord) {
                update.cancelled += 1;
            }
            if self.resident.remove(&coord).is_some() {
                update.dropped += 1;
            }
            // незавершённая правка не должна вернуться вместе с координатой
            self.edits.remove(&coord);
            self.deferred.remove(&coord);
        }

        // новые или сменившие LOD
        let candidates: Vec<ChunkContext> = target
            .iter()
            .filter(|(coord, lod)| self.wanted.get(*coord) != Some(*lod))
            .map(|(coord, lod)| ChunkContext::new(*coord, *lod))
            .collect();

        let pipeline = self.scheduler.pipeline();
        let verdicts: Vec<(ChunkContext, bool)> = candidates
            .into_par_iter()
            .filter_map(|ctx| match pipeline.should_generate(&ctx) {
                Ok(generate) => Some((ctx, generate)),
                Err(err) => {
                    warn!("Chunk {} left out of the working set: {}", ctx.coord, err);
                    None
                }
            })
            .collect();

        for (ctx, generate) in verdicts {
            if let Some(old) = self.wanted.insert(ctx.coord, ctx.lod) {
                self.empty.remove(&ChunkContext::new(ctx.coord, old));
                // правка LOD 0 к новому LOD не относится
                self.edits.remove(&ctx.coord);
                self.deferred.remove(&ctx.coord);
            }
            if generate {
                // старый резидент живёт до прихода замены
                let handle = self.scheduler.request_generation(ctx.coord, ctx.lod);
                self.requested.insert(ctx.coord, handle);
                update.requested += 1;
            } else {
                if self.requested.remove(&ctx.coord).is_some() && self.scheduler.cancel_generation(ctx.coord) {
                    update.cancelled += 1;
                }
                if self.resident.remove(&ctx.coord).is_some() {
                    update.dropped += 1;
                }
                self.empty.insert(ctx);
                update.skipped_empty += 1;
            }
        }

        info!(
            "Observer at chunk {}: {} wanted, {} requested, {} skipped as empty, {} cancelled, {} dropped",
            center,
            self.wanted.len(),
            update.requested,
            update.skipped_empty,
            update.cancelled,
            update.dropped
        );
        update
    }

    /// Собрать готовые результаты; возвращает чанки, ставшие резидентными
    pub fn poll(&mut self) -> Vec<ChunkContext> {
        let mut ready = Vec::new();

        let finished: Vec<(ChunkCoord, CompletionHandle)> = self
            .requested
            .iter()
            .filter(|(_, handle)| handle.is_done())
            .map(|(coord, handle)| (*coord, handle.clone()))
            .collect();
        for (coord, handle) in finished {
            self.requested.remove(&coord);
            if let Some(data) = self.accept(&handle) {
                ready.push(data.context);
                self.resident.insert(coord, data);
            }
        }

        let finished_edits: Vec<(ChunkCoord, CompletionHandle)> = self
            .edits
            .iter()
            .filter(|(_, handle)| handle.is_done())
            .map(|(coord, handle)| (*coord, handle.clone()))
            .collect();
        for (coord, handle) in finished_edits {
            self.edits.remove(&coord);
            if let Some(data) = self.accept(&handle) {
                ready.push(data.context);
                self.resident.insert(coord, data);
            }
            let next = self.deferred.get_mut(&coord).and_then(VecDeque::pop_front);
            if let Some(brush) = next {
                self.submit_edit(coord, brush);
            }
        }

        ready
    }

    /// Результат handle, если он всё ещё нужен рабочему набору
    fn accept(&self, handle: &CompletionHandle) -> Option<Arc<ChunkData>> {
        match handle.try_result()? {
            Ok(data) if self.wanted.get(&data.coord()) == Some(&data.lod()) => Some(data),
            Ok(data) => {
                debug!("Discarding stale result for chunk {} at LOD {}", data.coord(), data.lod());
                None
            }
            Err(err) if err.is_cancelled() => None,
            Err(JobError::Failed { coord, lod, .. }) => {
                warn!("Chunk {} at LOD {} stays unloaded after a failed job", coord, lod);
                None
            }
            Err(_) => None,
        }
    }

    /// Разослать кисть по всем задетым резидентным чанкам LOD 0.
    /// Возвращает число поставленных (или отложенных) правок.
    pub fn apply_brush(&mut self, brush: Brush) -> usize {
        let mut submitted = 0;
        for coord in affected_chunks(&brush, self.chunk_size) {
            let loaded = self.resident.get(&coord).is_some_and(|data| data.lod() == 0);
            if !loaded {
                debug!("Brush skips chunk {}: not resident at LOD 0", coord);
                continue;
            }
            if self.edits.contains_key(&coord) {
                self.deferred.entry(coord).or_default().push_back(brush);
            } else {
                self.submit_edit(coord, brush);
            }
            submitted += 1;
        }
        submitted
    }

    fn submit_edit(&mut self, coord: ChunkCoord, brush: Brush) {
        let Some(data) = self.resident.get(&coord) else {
            return;
        };
        // резидент остаётся видимым, правка работает над копией
        let payload = EditPayload::new(ChunkData::clone(data), brush);
        match self.scheduler.request_modification(coord, payload) {
            Ok(handle) => {
                self.edits.insert(coord, handle);
            }
            Err(err) => warn!("Edit for chunk {} rejected: {}", coord, err),
        }
    }

    /// Ждать, пока все запросы и правки завершатся
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.requested.is_empty() && self.edits.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    pub fn resident(&self, coord: ChunkCoord) -> Option<&Arc<ChunkData>> {
        self.resident.get(&coord)
    }

    pub fn resident_chunks(&self) -> impl Iterator<Item = &Arc<ChunkData>> {
        self.resident.values()
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn wanted_count(&self) -> usize {
        self.wanted.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.requested.len() + self.edits.len()
    }

    pub fn is_known_empty(&self, ctx: &ChunkContext) -> bool {
        self.empty.contains(ctx)
    }
}

/// Дистанция от `c` до отрезка [start, start + span) по одной оси
#[inline]
fn axis_gap(c: i32, start: i32, span: i32) -> i32 {
    if c < start {
        start - c
    } else if c >= start + span {
        c - (start + span - 1)
    } else {
        0
    }
}
