use crate::config::ExecutionMode;
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::prelude::*;
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::ThreadPool;
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use std::sync::OnceLock;

/// Best-effort Rayon thread pool for aggregation folds.
///
/// Rayon normally uses a **global** thread pool. Global pool initialization can fail under resource
/// pressure (many test binaries on one host), and Rayon then panics on first use. We build a
/// crate-local pool instead; if none can be created, folds run on the calling thread.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
static RAYON_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn desired_rayon_threads() -> usize {
    let from_env = std::env::var("RAYON_NUM_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0);
    from_env.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn build_rayon_pool() -> Option<ThreadPool> {
    let requested = desired_rayon_threads().max(1);
    let try_build = |n| rayon::ThreadPoolBuilder::new().num_threads(n).build();

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(err) if requested > 1 => {
            log::warn!("failed to build a {requested}-thread pool ({err}); retrying with 1 thread");
            try_build(1).ok()
        }
        Err(err) => {
            log::warn!("failed to build a thread pool ({err}); folding sequentially");
            None
        }
    }
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn rayon_pool() -> Option<&'static ThreadPool> {
    RAYON_POOL.get_or_init(build_rayon_pool).as_ref()
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn map_on_pool<T, R, F>(items: &[T], f: &F) -> Option<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    let pool = rayon_pool()?;
    Some(pool.install(|| items.par_iter().map(f).collect()))
}

#[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
fn map_on_pool<T, R, F>(_items: &[T], _f: &F) -> Option<Vec<R>>
where
    F: Fn(&T) -> R,
{
    None
}

/// Apply `f` to every item, preserving input order in the output.
///
/// Items are independent units of work (first-pass chunks or dependent-pass groups); in
/// [`ExecutionMode::Parallel`] they are spread over the pool.
pub(crate) fn map_ordered<T, R, F>(items: &[T], mode: ExecutionMode, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if mode == ExecutionMode::Parallel && items.len() > 1 {
        if let Some(out) = map_on_pool(items, &f) {
            return out;
        }
    }
    items.iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_order_matches_input_in_both_modes() {
        let items: Vec<u64> = (0..1000).collect();
        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
            let out = map_ordered(&items, mode, |v| v * 2);
            assert_eq!(out, items.iter().map(|v| v * 2).collect::<Vec<_>>());
        }
    }
}
