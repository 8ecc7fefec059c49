// src/engine/pool.rs
//
// Global worker pool and the row-band fan-out every parallel pass uses.
//
// A single rayon pool is built lazily on first use and reused for the life of
// the process. Thread count comes from RASTER_CMD_THREADS when set to a
// positive integer, otherwise from std::thread::available_parallelism() (which
// respects cgroup/CPU quota).
//
// **IMPORTANT**:
// - Changes to RASTER_CMD_THREADS after the first parallel pass have NO effect
// - If the pool cannot be built, passes run on rayon's implicit global pool
// - The row threshold installed by with_min_rows is per calling thread

use super::limits;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::cell::Cell;
use std::sync::OnceLock;

/// Minimum number of worker threads
const MIN_THREADS: usize = 1;

pub(crate) static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

thread_local! {
    static MIN_ROWS_FLOOR: Cell<usize> = const { Cell::new(0) };
}

/// Run `op` with every fan-out started on this thread requiring at least
/// `min_rows` rows (or items) before it goes parallel. The previous floor is
/// restored afterwards, also on unwind.
pub(crate) fn with_min_rows<R>(min_rows: usize, op: impl FnOnce() -> R) -> R {
    struct Restore(usize);
    impl Drop for Restore {
        fn drop(&mut self) {
            MIN_ROWS_FLOOR.with(|floor| floor.set(self.0));
        }
    }
    let _restore = Restore(MIN_ROWS_FLOOR.with(|floor| floor.replace(min_rows)));
    op()
}

fn min_rows_floor() -> usize {
    MIN_ROWS_FLOOR.with(Cell::get)
}

/// The shared pool, or None when it could not be created.
pub fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let num_threads = limits::configured_threads().unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(MIN_THREADS)
            });
            match rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads.max(MIN_THREADS))
                .thread_name(|i| format!("raster-cmd-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!(
                        target: "raster_cmd::pool",
                        threads = num_threads,
                        error = %e,
                        "failed to build worker pool, using rayon global pool"
                    );
                    None
                }
            }
        })
        .as_ref()
}

/// Number of workers parallel passes fan out to.
pub fn worker_count() -> usize {
    match get_pool() {
        Some(pool) => pool.current_num_threads(),
        None => rayon::current_num_threads(),
    }
    .max(MIN_THREADS)
}

/// Run `op` inside the shared pool.
pub(crate) fn install<R, F>(op: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match get_pool() {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

/// Split `data` (rows of `row_len` bytes) into disjoint bands of whole rows
/// and call `f(first_row, band)` for each, blocking until all are done.
///
/// The band count is `min(worker_count(), rows)`. Buffers shorter than
/// `min_rows` rows (or the floor set by [`with_min_rows`], whichever is
/// larger), or a single-worker pool, run inline as one band.
pub(crate) fn for_each_row_band<F>(data: &mut [u8], row_len: usize, min_rows: usize, f: F)
where
    F: Fn(usize, &mut [u8]) + Sync + Send,
{
    if row_len == 0 || data.is_empty() {
        return;
    }
    let rows = data.len() / row_len;
    let bands = worker_count().min(rows);
    if rows < min_rows.max(min_rows_floor()).max(1) || bands <= 1 {
        f(0, data);
        return;
    }
    let rows_per_band = rows.div_ceil(bands);
    install(|| {
        data.par_chunks_mut(rows_per_band * row_len)
            .enumerate()
            .for_each(|(i, band)| f(i * rows_per_band, band));
    });
}

/// Build `len` values in parallel on the shared pool, or inline when `len`
/// is below the [`with_min_rows`] floor.
pub(crate) fn par_collect<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if len < min_rows_floor() {
        return (0..len).map(&f).collect();
    }
    install(|| (0..len).into_par_iter().map(&f).collect())
}
