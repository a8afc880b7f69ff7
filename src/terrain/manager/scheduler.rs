// ============================================
// Chunk Scheduler - Очередь задач + пул воркеров
// ============================================
//
// Главный инвариант: не более одной генерации "в полёте" (в очереди
// или выполняется) на координату. Проверка дубликата и постановка
// в очередь атомарны: обе под одним локом состояния.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use parking_lot::{Condvar, Mutex};
use ultraviolet::Vec3;

use crate::terrain::cache::{ChunkContext, ChunkCoord};
use crate::terrain::config::TerrainConfig;
use crate::terrain::error::{ConfigError, JobError, TerrainError};

use super::handle::{CompletionHandle, JobOutcome};
use super::pipeline::ChunkPipeline;
use super::queue::{observer_chunk, JobQueue, Priority};
use super::types::{EditPayload, GenerationJob, JobState, SchedulerStats};
use super::worker::spawn_workers;

/// Задача в полёте (в очереди или у воркера)
struct JobRecord {
    context: ChunkContext,
    cancel: Arc<AtomicBool>,
    handle: CompletionHandle,
}

struct SchedulerState {
    queue: JobQueue,
    /// Все задачи в полёте, включая правки
    jobs: HashMap<u64, JobRecord>,
    /// Генерации: координата -> id задачи
    by_coord: HashMap<ChunkCoord, u64>,
    next_id: u64,
    observer: ChunkCoord,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
    deduplicated: AtomicU64,
    superseded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
        }
    }
}

/// Состояние, разделяемое планировщиком и воркерами
pub(super) struct Shared {
    pipeline: ChunkPipeline,
    state: Mutex<SchedulerState>,
    available: Condvar,
    shutdown: AtomicBool,
    poll_interval: Duration,
    stats: Counters,
}

impl Shared {
    #[inline]
    pub fn pipeline(&self) -> &ChunkPipeline {
        &self.pipeline
    }

    /// Следующая живая задача; None - планировщик остановлен
    pub fn next_job(&self) -> Option<GenerationJob> {
        let mut state = self.state.lock();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            while let Some(job) = state.queue.pop() {
                if job.cancel.load(Ordering::Relaxed) || !job.handle.mark_running() {
                    trace!("Skipping cancelled job for chunk {} at LOD {}", job.context.coord, job.context.lod);
                    continue;
                }
                trace!("Dequeued job #{} for chunk {} at LOD {}", job.id, job.context.coord, job.context.lod);
                return Some(job);
            }
            // ограниченное ожидание: shutdown виден даже без notify
            self.available.wait_for(&mut state, self.poll_interval);
        }
    }

    /// Завершить задачу: снять запись и разрешить handle
    pub fn finish(&self, job: &GenerationJob, outcome: JobOutcome) {
        let mut state = self.state.lock();
        state.jobs.remove(&job.id);
        // запись по координате снимаем только если она всё ещё наша
        if state.by_coord.get(&job.context.coord) == Some(&job.id) {
            state.by_coord.remove(&job.context.coord);
        }
        let counter = match &outcome {
            Ok(_) => &self.stats.completed,
            Err(JobError::Failed { .. }) => &self.stats.failed,
            Err(_) => &self.stats.cancelled,
        };
        if job.handle.resolve(outcome) {
            Counters::bump(counter);
        } else {
            trace!("Job #{} for chunk {} finished after its handle was resolved", job.id, job.context.coord);
        }
    }

    fn enqueue_locked(&self, state: &mut SchedulerState, context: ChunkContext, edit: Option<EditPayload>) -> CompletionHandle {
        let id = state.next_id;
        state.next_id += 1;

        let cancel = Arc::new(AtomicBool::new(false));
        let handle = CompletionHandle::new(context);
        let is_edit = edit.is_some();
        let priority = Priority::compute(&context, is_edit, state.observer, id);

        state.jobs.insert(
            id,
            JobRecord { context, cancel: Arc::clone(&cancel), handle: handle.clone() },
        );
        if !is_edit {
            state.by_coord.insert(context.coord, id);
        }
        state.queue.push(priority, GenerationJob { id, context, cancel, handle: handle.clone(), edit });

        Counters::bump(&self.stats.enqueued);
        debug!(
            "Enqueued {} #{} for chunk {} at LOD {} (tier {}, distance {:.1})",
            if is_edit { "edit" } else { "generation" },
            id,
            context.coord,
            context.lod,
            priority.tier,
            priority.distance
        );
        self.available.notify_one();
        handle
    }

    /// Отменить генерацию по координате; handle разрешается сразу
    fn cancel_locked(&self, state: &mut SchedulerState, coord: ChunkCoord) -> bool {
        let Some(id) = state.by_coord.remove(&coord) else {
            return false;
        };
        let Some(record) = state.jobs.remove(&id) else {
            return false;
        };
        record.cancel.store(true, Ordering::Relaxed);
        state.queue.remove(id);
        if record.handle.resolve(Err(JobError::Cancelled)) {
            Counters::bump(&self.stats.cancelled);
        }
        debug!("Cancelled job #{} for chunk {} at LOD {}", id, coord, record.context.lod);
        true
    }
}

/// Планировщик генерации чанков: приоритетная очередь + фиксированный пул
pub struct ChunkScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    chunk_size: u32,
}

impl ChunkScheduler {
    pub fn new(config: &TerrainConfig) -> Result<Self, ConfigError> {
        let pipeline = ChunkPipeline::from_config(config)?;
        Self::with_pipeline(config, pipeline)
    }

    /// Планировщик с готовым пайплайном (например, своя функция высоты)
    pub fn with_pipeline(config: &TerrainConfig, pipeline: ChunkPipeline) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            pipeline,
            state: Mutex::new(SchedulerState {
                queue: JobQueue::default(),
                jobs: HashMap::new(),
                by_coord: HashMap::new(),
                next_id: 0,
                observer: ChunkCoord::default(),
            }),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            stats: Counters::default(),
        });

        let workers = match spawn_workers(config.worker_threads, &shared) {
            Ok(workers) => workers,
            Err(err) => {
                // уже запущенные воркеры увидят флаг и выйдут сами
                shared.shutdown.store(true, Ordering::Release);
                shared.available.notify_all();
                return Err(ConfigError::Io(err));
            }
        };

        info!(
            "Chunk scheduler started: {} workers, chunk size {}, ISO {}",
            workers.len(),
            config.chunk_size,
            config.iso_level
        );
        Ok(Self { shared, workers, chunk_size: config.chunk_size })
    }

    #[inline]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn pipeline(&self) -> &ChunkPipeline {
        &self.shared.pipeline
    }

    /// Запросить генерацию. Тот же LOD - существующий handle,
    /// другой LOD - старая задача отменяется и ставится новая.
    /// LOD вне таблицы сразу разрешается в `JobError::Failed`.
    pub fn request_generation(&self, coord: ChunkCoord, lod: u8) -> CompletionHandle {
        let context = ChunkContext::new(coord, lod);
        if let Err(err) = self.shared.pipeline.check_lod(lod) {
            warn!("Rejecting generation request for chunk {}: {}", coord, err);
            let handle = CompletionHandle::new(context);
            if handle.resolve(Err(JobError::Failed { coord, lod, reason: err.to_string() })) {
                Counters::bump(&self.shared.stats.failed);
            }
            return handle;
        }
        let mut state = self.shared.state.lock();

        if self.shared.shutdown.load(Ordering::Acquire) {
            let handle = CompletionHandle::new(context);
            handle.resolve(Err(JobError::Shutdown));
            return handle;
        }

        let existing = state
            .by_coord
            .get(&coord)
            .and_then(|id| state.jobs.get(id))
            .map(|record| (record.context.lod, record.handle.clone()));

        if let Some((existing_lod, handle)) = existing {
            if existing_lod == lod {
                Counters::bump(&self.shared.stats.deduplicated);
                trace!("Reusing pending job for chunk {} at LOD {}", coord, lod);
                return handle;
            }
            debug!("Chunk {} re-requested at LOD {} (was {}), superseding", coord, lod, existing_lod);
            self.shared.cancel_locked(&mut state, coord);
            Counters::bump(&self.shared.stats.superseded);
        }

        self.shared.enqueue_locked(&mut state, context, None)
    }

    /// Правка чанка LOD 0: высший приоритет, без дедупликации
    pub fn request_modification(&self, coord: ChunkCoord, payload: EditPayload) -> Result<CompletionHandle, TerrainError> {
        if payload.chunk.lod() != 0 {
            return Err(TerrainError::EditLod(payload.chunk.lod()));
        }
        if payload.chunk.coord() != coord {
            return Err(TerrainError::Fault(format!(
                "edit for chunk {} carries data of chunk {}",
                coord,
                payload.chunk.coord()
            )));
        }
        let expected = self.chunk_size + 1;
        if payload.chunk.grid.samples() != expected {
            return Err(TerrainError::GridMismatch { expected, actual: payload.chunk.grid.samples() });
        }

        let mut state = self.shared.state.lock();
        if self.shared.shutdown.load(Ordering::Acquire) {
            let handle = CompletionHandle::new(ChunkContext::new(coord, 0));
            handle.resolve(Err(JobError::Shutdown));
            return Ok(handle);
        }
        Ok(self.shared.enqueue_locked(&mut state, ChunkContext::new(coord, 0), Some(payload)))
    }

    /// Отменить генерацию по координате. Выполняющаяся задача
    /// увидит флаг и не доставит результат.
    pub fn cancel_generation(&self, coord: ChunkCoord) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.cancel_locked(&mut state, coord)
    }

    /// Новое положение наблюдателя: пересчёт приоритетов очереди
    pub fn set_observer_position(&self, position: Vec3) {
        let observer = observer_chunk(position, self.chunk_size);
        let mut state = self.shared.state.lock();
        if state.observer != observer {
            state.observer = observer;
            state.queue.reprioritize(observer);
        }
    }

    /// Синхронный пре-тест: стоит ли вообще генерировать чанк
    pub fn should_generate_chunk(&self, coord: ChunkCoord, lod: u8) -> Result<bool, TerrainError> {
        self.shared.pipeline.should_generate(&ChunkContext::new(coord, lod))
    }

    /// Состояние генерации по координате
    pub fn job_state(&self, coord: ChunkCoord) -> JobState {
        let state = self.shared.state.lock();
        state
            .by_coord
            .get(&coord)
            .and_then(|id| state.jobs.get(id))
            .map(|record| record.handle.state())
            .unwrap_or(JobState::Unscheduled)
    }

    /// Генераций в полёте (по координатам)
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().by_coord.len()
    }

    /// Задач, ещё не взятых воркерами
    pub fn queued_len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.stats.snapshot()
    }
}

impl Drop for ChunkScheduler {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        {
            let mut state = self.shared.state.lock();
            let queued = state.queue.drain();
            for job in &queued {
                job.cancel.store(true, Ordering::Relaxed);
            }
            let jobs: Vec<JobRecord> = state.jobs.drain().map(|(_, record)| record).collect();
            for record in jobs {
                record.cancel.store(true, Ordering::Relaxed);
                if record.handle.resolve(Err(JobError::Shutdown)) {
                    Counters::bump(&self.shared.stats.cancelled);
                }
            }
            state.by_coord.clear();
        }
        self.shared.available.notify_all();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Terrain worker panicked outside of a job");
            }
        }
        info!("Chunk scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::terrain::config::DensityConfig;
    use crate::terrain::edit::{Brush, BrushMode};
    use crate::terrain::generation::{DensityField, DensitySource};
    use crate::terrain::voxel::ChunkData;

    const TIMEOUT: Duration = Duration::from_secs(20);

    fn config(workers: usize) -> TerrainConfig {
        TerrainConfig {
            chunk_size: 16,
            worker_threads: workers,
            poll_interval_ms: 5,
            density: DensityConfig::Flat { height: 8.0 },
            ..TerrainConfig::default()
        }
    }

    /// Один воркер; все задачи ждут открытия "ворот"
    fn gated_scheduler() -> (ChunkScheduler, Arc<AtomicBool>) {
        let gate = Arc::new(AtomicBool::new(false));
        let open = Arc::clone(&gate);
        let height = move |_x: f32, _z: f32| {
            while !open.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
            8.0
        };
        let config = config(1);
        let field = DensityField::new(DensitySource::heightfield(height), config.iso_level);
        let pipeline = ChunkPipeline::with_field(&config, field).unwrap();
        (ChunkScheduler::with_pipeline(&config, pipeline).unwrap(), gate)
    }

    fn wait_for_state(handle: &CompletionHandle, expected: JobState) {
        let start = Instant::now();
        while handle.state() != expected {
            assert!(start.elapsed() < TIMEOUT, "handle stuck in {:?}", handle.state());
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Занять единственного воркера задачей-блокером
    fn occupy_worker(scheduler: &ChunkScheduler) -> CompletionHandle {
        let blocker = scheduler.request_generation(ChunkCoord::new(100, 0, 100), 0);
        wait_for_state(&blocker, JobState::Running);
        blocker
    }

    fn wait(handle: &CompletionHandle) -> JobOutcome {
        handle.wait_timeout(TIMEOUT).expect("job did not finish in time")
    }

    #[test]
    fn test_generation_completes() {
        let scheduler = ChunkScheduler::new(&config(2)).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);
        let handle = scheduler.request_generation(coord, 0);
        let data = wait(&handle).unwrap();
        assert_eq!(data.coord(), coord);
        assert!(!data.mesh.is_empty());
        assert_eq!(handle.state(), JobState::Completed);
        assert_eq!(scheduler.job_state(coord), JobState::Unscheduled);
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.stats().completed, 1);
    }

    #[test]
    fn test_same_lod_request_is_deduplicated() {
        let (scheduler, gate) = gated_scheduler();
        let blocker = occupy_worker(&scheduler);

        let coord = ChunkCoord::new(0, 0, 0);
        let a = scheduler.request_generation(coord, 0);
        let b = scheduler.request_generation(coord, 0);
        assert!(a.same_job(&b));
        assert_eq!(scheduler.job_state(coord), JobState::Queued);
        assert_eq!(scheduler.stats().deduplicated, 1);
        assert_eq!(scheduler.queued_len(), 1);

        gate.store(true, Ordering::Release);
        assert!(wait(&a).is_ok());
        assert!(wait(&blocker).is_ok());
    }

    #[test]
    fn test_different_lod_supersedes() {
        let (scheduler, gate) = gated_scheduler();
        let blocker = occupy_worker(&scheduler);

        let coord = ChunkCoord::new(0, 0, 0);
        let first = scheduler.request_generation(coord, 0);
        let second = scheduler.request_generation(coord, 1);
        assert!(!first.same_job(&second));
        // старый handle разрешён сразу
        assert_eq!(first.try_result(), Some(Err(JobError::Cancelled)));
        assert_eq!(scheduler.pending_count(), 2);
        assert_eq!(scheduler.queued_len(), 1);
        assert_eq!(scheduler.stats().superseded, 1);

        gate.store(true, Ordering::Release);
        let data = wait(&second).unwrap();
        assert_eq!(data.lod(), 1);
        assert_eq!(first.state(), JobState::Cancelled);
        assert!(wait(&blocker).is_ok());
    }

    #[test]
    fn test_cancel_queued_and_running_jobs() {
        let (scheduler, gate) = gated_scheduler();
        let blocker = occupy_worker(&scheduler);

        let coord = ChunkCoord::new(0, 0, 0);
        let queued = scheduler.request_generation(coord, 0);
        assert!(scheduler.cancel_generation(coord));
        assert!(!scheduler.cancel_generation(coord));
        assert_eq!(queued.try_result(), Some(Err(JobError::Cancelled)));
        assert_eq!(scheduler.queued_len(), 0);

        // выполняющаяся задача не доставит результат
        assert!(scheduler.cancel_generation(blocker.coord()));
        gate.store(true, Ordering::Release);
        assert_eq!(wait(&blocker), Err(JobError::Cancelled));

        // пул продолжает работать
        let next = scheduler.request_generation(coord, 0);
        assert!(wait(&next).is_ok());
        assert_eq!(scheduler.stats().cancelled, 2);
    }

    #[test]
    fn test_fault_is_isolated_to_its_job() {
        let config = config(1);
        let height = |x: f32, _z: f32| {
            if x >= 1000.0 {
                panic!("height function exploded at x = {}", x);
            }
            8.0
        };
        let field = DensityField::new(DensitySource::heightfield(height), config.iso_level);
        let pipeline = ChunkPipeline::with_field(&config, field).unwrap();
        let scheduler = ChunkScheduler::with_pipeline(&config, pipeline).unwrap();

        let bad = scheduler.request_generation(ChunkCoord::new(100, 0, 0), 0);
        match wait(&bad) {
            Err(JobError::Failed { coord, lod, reason }) => {
                assert_eq!(coord, ChunkCoord::new(100, 0, 0));
                assert_eq!(lod, 0);
                assert!(reason.contains("exploded"));
            }
            other => panic!("unexpected outcome: {:?}", other.map(|d| d.coord())),
        }
        assert_eq!(bad.state(), JobState::Failed);

        let good = scheduler.request_generation(ChunkCoord::new(0, 0, 0), 0);
        assert!(wait(&good).is_ok());
        let stats = scheduler.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_edit_remeshes_and_is_never_deduplicated() {
        let config = config(2);
        let scheduler = ChunkScheduler::new(&config).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);
        let data = wait(&scheduler.request_generation(coord, 0)).unwrap();
        let before = data.mesh.clone();

        let brush = Brush::new(Vec3::new(8.0, 8.0, 8.0), 3.0, 1.0, BrushMode::Subtract, &config.brush).unwrap();
        let pending = scheduler.request_generation(coord, 0);
        let edit = scheduler
            .request_modification(coord, EditPayload::new(ChunkData::into_owned(data), brush))
            .unwrap();
        assert!(!edit.same_job(&pending));

        let edited = wait(&edit).unwrap();
        assert_ne!(edited.mesh, before);
        assert!(edited.mesh.is_consistent());
        assert!(wait(&pending).is_ok());
        assert_eq!(scheduler.stats().deduplicated, 0);
    }

    #[test]
    fn test_edit_rejects_coarse_or_foreign_chunk() {
        let config = config(1);
        let scheduler = ChunkScheduler::new(&config).unwrap();
        let coarse = wait(&scheduler.request_generation(ChunkCoord::new(0, 0, 0), 1)).unwrap();
        let brush = Brush::new(Vec3::zero(), 2.0, 1.0, BrushMode::Add, &config.brush).unwrap();

        let payload = EditPayload::new(ChunkData::into_owned(coarse), brush);
        assert!(matches!(
            scheduler.request_modification(ChunkCoord::new(0, 0, 0), payload),
            Err(TerrainError::EditLod(1))
        ));

        let near = wait(&scheduler.request_generation(ChunkCoord::new(0, 0, 0), 0)).unwrap();
        let payload = EditPayload::new(ChunkData::into_owned(near), brush);
        assert!(scheduler.request_modification(ChunkCoord::new(1, 0, 0), payload).is_err());
    }

    #[test]
    fn test_should_generate_chunk_query() {
        let scheduler = ChunkScheduler::new(&config(1)).unwrap();
        assert!(scheduler.should_generate_chunk(ChunkCoord::new(0, 0, 0), 0).unwrap());
        assert!(!scheduler.should_generate_chunk(ChunkCoord::new(0, 3, 0), 0).unwrap());
        assert!(!scheduler.should_generate_chunk(ChunkCoord::new(0, -3, 0), 0).unwrap());
        assert!(matches!(
            scheduler.should_generate_chunk(ChunkCoord::new(0, 0, 0), 9),
            Err(TerrainError::LodOutOfRange { lod: 9, max: 3 })
        ));
    }

    #[test]
    fn test_lod_beyond_table_fails_without_queueing() {
        let scheduler = ChunkScheduler::new(&config(1)).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);
        for lod in [4, 31, 200, u8::MAX] {
            let handle = scheduler.request_generation(coord, lod);
            assert_eq!(handle.state(), JobState::Failed);
            assert!(matches!(wait(&handle), Err(JobError::Failed { lod: l, .. }) if l == lod));
        }
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.stats().enqueued, 0);
        assert_eq!(scheduler.stats().failed, 4);

        // координата остаётся свободной для корректного запроса
        let handle = scheduler.request_generation(coord, 3);
        assert!(wait(&handle).is_ok());
    }

    #[test]
    fn test_invalid_config_fails_before_workers_start() {
        let config = TerrainConfig { worker_threads: 0, ..config(1) };
        assert!(matches!(ChunkScheduler::new(&config), Err(ConfigError::NoWorkers)));
    }

    #[test]
    fn test_drop_resolves_pending_handles_to_shutdown() {
        let (scheduler, gate) = gated_scheduler();
        let blocker = occupy_worker(&scheduler);
        let queued = scheduler.request_generation(ChunkCoord::new(0, 0, 0), 0);

        let opener = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.store(true, Ordering::Release);
        });
        drop(scheduler);
        opener.join().unwrap();

        assert_eq!(queued.try_result(), Some(Err(JobError::Shutdown)));
        assert_eq!(blocker.try_result(), Some(Err(JobError::Shutdown)));
    }
}
