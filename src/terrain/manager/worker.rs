// ============================================
// Worker - Долгоживущий поток пула
// ============================================

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, trace};

use crate::terrain::error::JobError;

use super::scheduler::Shared;
use super::types::GenerationJob;

pub(super) fn spawn_workers(count: usize, shared: &Arc<Shared>) -> std::io::Result<Vec<JoinHandle<()>>> {
    (0..count)
        .map(|index| {
            let shared = Arc::clone(shared);
            thread::Builder::new()
                .name(format!("terrain-worker-{}", index))
                .spawn(move || worker_loop(index, &shared))
        })
        .collect()
}

fn worker_loop(index: usize, shared: &Shared) {
    trace!("Worker {} started", index);
    while let Some(job) = shared.next_job() {
        run_job(shared, job);
    }
    trace!("Worker {} stopped", index);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Выполнить задачу; сбой и паника остаются локальными для задачи
fn run_job(shared: &Shared, mut job: GenerationJob) {
    let ctx = job.context;
    let pipeline = shared.pipeline();
    let edit = job.edit.take();
    let is_edit = edit.is_some();

    let result = panic::catch_unwind(AssertUnwindSafe(|| match edit {
        Some(payload) => pipeline.edit(payload, &job.cancel),
        None => pipeline.generate(&ctx, &job.cancel),
    }));

    let outcome = match result {
        Ok(Ok(_)) if job.cancel.load(Ordering::Relaxed) => Err(JobError::Cancelled),
        Ok(Ok(data)) => Ok(Arc::new(data)),
        Ok(Err(err)) if err.is_cancelled() => {
            debug!("Job for chunk {} at LOD {} observed cancellation", ctx.coord, ctx.lod);
            Err(JobError::Cancelled)
        }
        Ok(Err(err)) => {
            error!("Job for chunk {} at LOD {} failed: {}", ctx.coord, ctx.lod, err);
            Err(JobError::Failed { coord: ctx.coord, lod: ctx.lod, reason: err.to_string() })
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(
                "Job for chunk {} at LOD {} panicked{}: {}",
                ctx.coord,
                ctx.lod,
                if is_edit { " (edit)" } else { "" },
                reason
            );
            Err(JobError::Failed { coord: ctx.coord, lod: ctx.lod, reason })
        }
    };

    shared.finish(&job, outcome);
}
