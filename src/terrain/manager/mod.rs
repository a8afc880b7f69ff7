// ============================================
// Manager Module - Планирование и стриминг чанков
// ============================================
//
// ChunkScheduler: приоритетная очередь + пул воркеров, handle на задачу
// ChunkPipeline:  синтез -> меш -> цвет (и правка -> пересборка)
// ChunkStreamer:  рабочий набор вокруг наблюдателя

mod handle;
mod pipeline;
mod queue;
mod scheduler;
mod streamer;
mod types;
mod worker;

pub use handle::{CompletionHandle, JobOutcome};
pub use pipeline::ChunkPipeline;
pub use scheduler::ChunkScheduler;
pub use streamer::{ChunkStreamer, StreamUpdate};
pub use types::{EditPayload, JobState, SchedulerStats};
