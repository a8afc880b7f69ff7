use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::terrain::cache::ChunkContext;
use crate::terrain::edit::Brush;
use crate::terrain::voxel::ChunkData;

use super::handle::CompletionHandle;

/// Состояние задачи чанка
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    Unscheduled,
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled | JobState::Failed)
    }
}

/// Правка чанка: данные передаются задаче во владение
#[derive(Debug)]
pub struct EditPayload {
    pub chunk: ChunkData,
    pub brush: Brush,
}

impl EditPayload {
    pub fn new(chunk: ChunkData, brush: Brush) -> Self {
        Self { chunk, brush }
    }
}

/// Задача в очереди планировщика
pub(super) struct GenerationJob {
    pub id: u64,
    pub context: ChunkContext,
    pub cancel: Arc<AtomicBool>,
    pub handle: CompletionHandle,
    pub edit: Option<EditPayload>,
}

impl GenerationJob {
    #[inline]
    pub fn is_edit(&self) -> bool {
        self.edit.is_some()
    }
}

/// Снимок счётчиков планировщика
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub enqueued: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub failed: u64,
    /// Повторные запросы, вернувшие существующий handle
    pub deduplicated: u64,
    /// Задачи, отменённые запросом с другим LOD
    pub superseded: u64,
}
