// ============================================
// Completion Handle - Результат задачи чанка
// ============================================
//
// Первый записавший побеждает: после разрешения (успех, отмена, сбой)
// последующие попытки игнорируются. Отменённая задача не может
// доставить результат.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::terrain::cache::{ChunkContext, ChunkCoord};
use crate::terrain::error::JobError;
use crate::terrain::voxel::ChunkData;

use super::types::JobState;

/// Итог задачи
pub type JobOutcome = Result<Arc<ChunkData>, JobError>;

struct Slot {
    state: JobState,
    outcome: Option<JobOutcome>,
}

struct Inner {
    context: ChunkContext,
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Future-подобный handle задачи (клонируется, разделяется между вызывающими)
#[derive(Clone)]
pub struct CompletionHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("context", &self.inner.context)
            .field("state", &self.state())
            .finish()
    }
}

impl CompletionHandle {
    pub(crate) fn new(context: ChunkContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                context,
                slot: Mutex::new(Slot { state: JobState::Queued, outcome: None }),
                ready: Condvar::new(),
            }),
        }
    }

    #[inline]
    pub fn context(&self) -> ChunkContext {
        self.inner.context
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.inner.context.coord
    }

    #[inline]
    pub fn lod(&self) -> u8 {
        self.inner.context.lod
    }

    pub fn state(&self) -> JobState {
        self.inner.slot.lock().state
    }

    pub fn is_done(&self) -> bool {
        self.inner.slot.lock().outcome.is_some()
    }

    /// Тот же самый handle (та же задача)?
    #[inline]
    pub fn same_job(&self, other: &CompletionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Результат без ожидания
    pub fn try_result(&self) -> Option<JobOutcome> {
        self.inner.slot.lock().outcome.clone()
    }

    /// Блокирующее ожидание результата
    pub fn wait(&self) -> JobOutcome {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(outcome) = &slot.outcome {
                return outcome.clone();
            }
            self.inner.ready.wait(&mut slot);
        }
    }

    /// Ожидание с таймаутом; None - не успели
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(outcome) = &slot.outcome {
                return Some(outcome.clone());
            }
            if self.inner.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.outcome.clone();
            }
        }
    }

    /// Queued -> Running; false если уже разрешён
    pub(crate) fn mark_running(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.outcome.is_some() {
            return false;
        }
        slot.state = JobState::Running;
        true
    }

    /// Разрешить handle; false если кто-то успел раньше
    pub(crate) fn resolve(&self, outcome: JobOutcome) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.outcome.is_some() {
            return false;
        }
        slot.state = match &outcome {
            Ok(_) => JobState::Completed,
            Err(JobError::Failed { .. }) => JobState::Failed,
            Err(JobError::Cancelled) | Err(JobError::Shutdown) => JobState::Cancelled,
        };
        slot.outcome = Some(outcome);
        self.inner.ready.notify_all();
        true
    }
}
