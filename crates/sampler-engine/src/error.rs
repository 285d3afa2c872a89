//! Facade-level error type (§7). Resource acquisition (`load*`) is the only
//! fallible surface; nothing in the render path can fail.

/// Errors the Control API surface can return. Wraps [`sampler_cache::Error`]
/// for sample-load failures and adds facade-only variants for misuse of the
/// program bank API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `load_program`/`load_bank` was called with zero regions.
    #[error("instrument has no regions")]
    EmptyProgram,

    /// `select_program` was called with an index past the end of the bank.
    #[error("program index {index} out of range (bank has {len} programs)")]
    ProgramIndexOutOfRange { index: usize, len: usize },

    /// A sample referenced by a region failed to load.
    #[error("failed to load sample: {0}")]
    Sample(#[from] sampler_cache::Error),
}

/// Convenience result type for the Control API surface.
pub type Result<T> = std::result::Result<T, Error>;
