//! Common utilities.
//!
//! Parallelism configuration for batch classification. Training itself is
//! single-threaded by contract; only query-time evaluation fans out, one
//! tester and accumulator per worker over the shared frozen model.

use rayon::prelude::*;

/// Whether parallel execution is allowed.
///
/// Components receive this flag instead of managing thread pools; the pool
/// itself is set up at the model API level via `n_threads`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    /// Sequential iteration only.
    Sequential,
    /// Rayon parallel iterators allowed.
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if the rayon pool has multiple threads)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns true if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map over items, in parallel when allowed.
    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, iter: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map(f).collect()
        } else {
            iter.into_iter().map(f).collect()
        }
    }

    /// Map with per-thread scratch state, reused across iterations on the
    /// same worker.
    #[inline]
    pub fn maybe_par_map_init<T, B, I, INIT, S, F>(self, iter: I, init: INIT, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        INIT: Fn() -> S + Sync + Send,
        F: Fn(&mut S, T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map_init(init, f).collect()
        } else {
            let mut state = init();
            iter.into_iter().map(|item| f(&mut state, item)).collect()
        }
    }
}

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics: `0` = auto (all cores), `1` = sequential,
/// `n > 1` = exactly `n` threads.
#[inline]
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .expect("Failed to create thread pool");
            pool.install(|| f(Parallelism::Parallel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallelism_from_threads() {
        assert!(Parallelism::from_threads(0).is_parallel());
        assert!(!Parallelism::from_threads(1).is_parallel());
        assert!(Parallelism::from_threads(2).is_parallel());
    }

    #[test]
    fn maybe_par_map_matches_sequential() {
        let seq: Vec<_> = Parallelism::Sequential.maybe_par_map(0..5usize, |i| i * 2);
        let par: Vec<_> = Parallelism::Parallel.maybe_par_map(0..5usize, |i| i * 2);
        assert_eq!(seq, par);
        assert_eq!(seq, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn maybe_par_map_init_reuses_state() {
        let out: Vec<usize> = Parallelism::Sequential.maybe_par_map_init(
            0..4usize,
            Vec::<usize>::new,
            |scratch, i| {
                scratch.push(i);
                scratch.len()
            },
        );
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn run_with_threads_sequential_and_auto() {
        assert_eq!(run_with_threads(1, |_| 42), 42);
        assert_eq!(run_with_threads(0, |_| 42), 42);
    }

    #[test]
    fn run_with_threads_explicit() {
        let n = run_with_threads(2, |_| rayon::current_num_threads());
        assert_eq!(n, 2);
    }
}
