//! Execution substrates that enumerate a 2D domain as independent work units.
//!
//! The kernel only sees [`ParallelDispatcher`]; whether units run on a rayon
//! pool or one after another on the calling thread is chosen by the caller.

use std::fmt;
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::error::Result;

/// Describes where a dispatch runs. Printed before the kernel launches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    pub name: String,
    pub workers: usize,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.workers == 1 { "" } else { "s" };
        write!(f, "{} ({} worker{plural})", self.name, self.workers)
    }
}

/// Runs one unit of work per `(row, col)` of a `rows x cols` domain.
///
/// Implementations must call `unit` exactly once for every coordinate, may
/// do so in any order and on any thread, and must not return until every
/// unit has finished and its writes are visible to the caller.
pub trait ParallelDispatcher {
    fn for_each_2d<F>(&self, rows: usize, cols: usize, unit: F)
    where
        F: Fn(usize, usize) + Sync + Send;

    fn context(&self) -> ExecutionContext;
}

/// Dispatches units onto a rayon thread pool.
///
/// Without an explicit thread count the global pool is used.
#[derive(Clone, Debug, Default)]
pub struct RayonDispatcher {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dedicated pool with `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("scatter-{i}"))
            .build()?;
        debug!("built rayon pool with {} threads", pool.current_num_threads());
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }
}

impl ParallelDispatcher for RayonDispatcher {
    fn for_each_2d<F>(&self, rows: usize, cols: usize, unit: F)
    where
        F: Fn(usize, usize) + Sync + Send,
    {
        if rows == 0 || cols == 0 {
            return;
        }
        let run = || {
            (0..rows * cols)
                .into_par_iter()
                .for_each(|linear| unit(linear / cols, linear % cols));
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    fn context(&self) -> ExecutionContext {
        let workers = match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        };
        ExecutionContext {
            name: "CPU thread pool".to_string(),
            workers,
        }
    }
}

/// Runs every unit on the calling thread in row-major order.
#[derive(Copy, Clone, Debug, Default)]
pub struct SequentialDispatcher;

impl ParallelDispatcher for SequentialDispatcher {
    fn for_each_2d<F>(&self, rows: usize, cols: usize, unit: F)
    where
        F: Fn(usize, usize) + Sync + Send,
    {
        for row in 0..rows {
            for col in 0..cols {
                unit(row, col);
            }
        }
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext {
            name: "CPU sequential".to_string(),
            workers: 1,
        }
    }
}

/// Either substrate, selected at runtime from configuration.
#[derive(Clone, Debug)]
pub enum Dispatcher {
    Rayon(RayonDispatcher),
    Sequential(SequentialDispatcher),
}

impl ParallelDispatcher for Dispatcher {
    fn for_each_2d<F>(&self, rows: usize, cols: usize, unit: F)
    where
        F: Fn(usize, usize) + Sync + Send,
    {
        match self {
            Dispatcher::Rayon(d) => d.for_each_2d(rows, cols, unit),
            Dispatcher::Sequential(d) => d.for_each_2d(rows, cols, unit),
        }
    }

    fn context(&self) -> ExecutionContext {
        match self {
            Dispatcher::Rayon(d) => d.context(),
            Dispatcher::Sequential(d) => d.context(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn visit_counts<D: ParallelDispatcher>(dispatcher: &D, rows: usize, cols: usize) -> Vec<usize> {
        let counts: Vec<AtomicUsize> = (0..rows * cols).map(|_| AtomicUsize::new(0)).collect();
        dispatcher.for_each_2d(rows, cols, |r, c| {
            counts[r * cols + c].fetch_add(1, Ordering::Relaxed);
        });
        counts.into_iter().map(AtomicUsize::into_inner).collect()
    }

    #[test]
    fn test_rayon_visits_each_coordinate_once() {
        let counts = visit_counts(&RayonDispatcher::new(), 37, 53);
        assert!(counts.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_dedicated_pool_visits_each_coordinate_once() {
        let dispatcher = RayonDispatcher::with_threads(3).expect("pool");
        assert_eq!(dispatcher.context().workers, 3);
        let counts = visit_counts(&dispatcher, 16, 9);
        assert!(counts.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_sequential_visits_row_major() {
        let order = std::sync::Mutex::new(Vec::new());
        SequentialDispatcher.for_each_2d(2, 3, |r, c| order.lock().unwrap().push((r, c)));
        assert_eq!(
            order.into_inner().unwrap(),
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn test_empty_domain_runs_nothing() {
        assert!(visit_counts(&RayonDispatcher::new(), 0, 10).is_empty());
        assert!(visit_counts(&SequentialDispatcher, 10, 0).is_empty());
    }

    #[test]
    fn test_context_display() {
        let ctx = ExecutionContext {
            name: "CPU sequential".to_string(),
            workers: 1,
        };
        assert_eq!(ctx.to_string(), "CPU sequential (1 worker)");
    }
}
