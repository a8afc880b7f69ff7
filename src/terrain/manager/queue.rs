// ============================================
// Job Queue - Приоритетная очередь задач
// ============================================
//
// Порядок: tier (правки -> LOD 0 -> грубые LOD), затем XZ-дистанция
// до наблюдателя (только для LOD 0), затем порядок поступления.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ultraviolet::Vec3;

use crate::terrain::cache::{ChunkContext, ChunkCoord};

use super::types::GenerationJob;

/// Уровни приоритета (меньше = раньше)
pub(super) const TIER_EDIT: u8 = 0;
pub(super) const TIER_NEAR: u8 = 1;
pub(super) const TIER_COARSE: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Priority {
    pub tier: u8,
    pub distance: f32,
    pub seq: u64,
}

impl Priority {
    /// Приоритет задачи относительно наблюдателя (в чанках)
    pub fn compute(context: &ChunkContext, is_edit: bool, observer: ChunkCoord, seq: u64) -> Self {
        if is_edit {
            return Self { tier: TIER_EDIT, distance: 0.0, seq };
        }
        if context.lod == 0 {
            let distance = context.coord.horizontal_distance(&observer);
            return Self { tier: TIER_NEAR, distance, seq };
        }
        // все грубые LOD - один общий уровень, FIFO
        Self { tier: TIER_COARSE, distance: 0.0, seq }
    }

    fn rank(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| self.distance.total_cmp(&other.distance))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

pub(super) struct QueueEntry {
    pub priority: Priority,
    pub job: GenerationJob,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority.rank(&other.priority) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// BinaryHeap - max-heap, поэтому "лучший" приоритет = наибольший
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.rank(&self.priority)
    }
}

/// Очередь задач с пересчётом приоритетов при движении наблюдателя
#[derive(Default)]
pub(super) struct JobQueue {
    heap: BinaryHeap<QueueEntry>,
}

impl JobQueue {
    pub fn push(&mut self, priority: Priority, job: GenerationJob) {
        self.heap.push(QueueEntry { priority, job });
    }

    pub fn pop(&mut self) -> Option<GenerationJob> {
        self.heap.pop().map(|entry| entry.job)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Убрать задачу из очереди (вернуть её, если была)
    pub fn remove(&mut self, job_id: u64) -> Option<GenerationJob> {
        let mut removed = None;
        let entries = std::mem::take(&mut self.heap).into_vec();
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.job.id == job_id {
                removed = Some(entry.job);
            } else {
                kept.push(entry);
            }
        }
        self.heap = BinaryHeap::from(kept);
        removed
    }

    /// Пересчитать дистанции LOD 0 для нового положения наблюдателя
    pub fn reprioritize(&mut self, observer: ChunkCoord) {
        let entries = std::mem::take(&mut self.heap).into_vec();
        self.heap = entries
            .into_iter()
            .map(|mut entry| {
                entry.priority = Priority::compute(
                    &entry.job.context,
                    entry.job.is_edit(),
                    observer,
                    entry.priority.seq,
                );
                entry
            })
            .collect();
    }

    /// Забрать все задачи (остановка планировщика)
    pub fn drain(&mut self) -> Vec<GenerationJob> {
        self.heap.drain().map(|entry| entry.job).collect()
    }
}

/// Позиция наблюдателя в координатах чанков
#[inline]
pub(super) fn observer_chunk(position: Vec3, chunk_size: u32) -> ChunkCoord {
    ChunkCoord::containing(position, chunk_size)
}
