//! Job scheduling seam.
//!
//! Jobs are handed over as unstarted futures; a scheduler decides when each
//! one is polled. Only the sequential policy exists: one encoder at a time.

use futures::future::LocalBoxFuture;
use futures::FutureExt;

pub trait Scheduler {
    /// Drive every job to completion, returning results in submission order
    fn run_all<'a, T: 'a>(&'a self, jobs: Vec<LocalBoxFuture<'a, T>>) -> LocalBoxFuture<'a, Vec<T>>;
}

/// Awaits jobs strictly one after the other
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialScheduler;

impl Scheduler for SequentialScheduler {
    fn run_all<'a, T: 'a>(&'a self, jobs: Vec<LocalBoxFuture<'a, T>>) -> LocalBoxFuture<'a, Vec<T>> {
        async move {
            let mut results = Vec::with_capacity(jobs.len());
            for job in jobs {
                results.push(job.await);
            }
            results
        }
        .boxed_local()
    }
}
