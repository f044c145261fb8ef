/// How folds are scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    /// Fold first-pass chunks and dependent-pass groups on the crate's thread pool.
    ///
    /// Falls back to sequential execution when the `parallel` feature is disabled, on WASM, or
    /// when no thread pool could be created.
    #[default]
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineOptions {
    pub execution: ExecutionMode,
    /// Number of references folded per first-pass chunk.
    ///
    /// Chunk boundaries are the same in both execution modes, so sequential and parallel runs over
    /// the same reference order produce bit-identical results.
    pub chunk_rows: usize,
    /// Drop groups with no records from pass output instead of reporting them with `count == 0`.
    pub skip_empty_groups: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::default(),
            chunk_rows: 65_536,
            skip_empty_groups: false,
        }
    }
}

impl PipelineOptions {
    pub fn sequential() -> Self {
        Self {
            execution: ExecutionMode::Sequential,
            ..Self::default()
        }
    }

    /// Defaults overridden by `STRATA_AGG_EXECUTION` (`sequential` / `parallel`) and
    /// `STRATA_AGG_CHUNK_ROWS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        match lookup("STRATA_AGG_EXECUTION")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("sequential") => options.execution = ExecutionMode::Sequential,
            Some("parallel") => options.execution = ExecutionMode::Parallel,
            Some(other) => log::warn!("ignoring unknown STRATA_AGG_EXECUTION value {other:?}"),
            None => {}
        }

        if let Some(rows) = lookup("STRATA_AGG_CHUNK_ROWS")
            .and_then(|v| v.replace('_', "").parse::<usize>().ok())
            .filter(|&v| v > 0)
        {
            options.chunk_rows = rows;
        }

        options
    }
}
