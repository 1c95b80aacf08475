//! # jetfeat-core
//!
//! This is an internal crate used by `jetfeat`.
#![warn(clippy::perf, clippy::style)]
#![allow(clippy::excessive_precision)]

use thiserror::Error;

/// Dataset assembly: sizing the output arrays and filling them event by event.
pub mod assembler;
/// Angular association of particle-flow candidates to jets.
pub mod association;
/// The [`BasisEvaluator`](crate::basis::BasisEvaluator) interface and energy-flow polynomials.
pub mod basis;
/// Run configuration shared by every stage of the conversion.
pub mod config;
/// Methods for loading [`Event`](crate::data::Event)s and persisting feature tables.
pub mod data;
/// Fixed-length jet and event feature vectors.
pub mod features;
/// Fixed-capacity constituent arrays.
pub mod packing;
/// Selection files mapping event sources to event indices.
pub mod selection;
/// Jet shape observables built from the weighted spread of constituents.
pub mod shapes;
/// Utility functions and four-vectors
pub mod utils;
/// Useful traits for all crate structs
pub mod traits {
    pub use crate::basis::BasisEvaluator;
    pub use crate::data::EventSource;
}

pub use crate::assembler::{AssemblerState, DatasetAssembler, FeatureDataset};
pub use crate::association::{associate, AssociationCuts};
pub use crate::basis::EnergyFlowBasis;
pub use crate::config::ConverterConfig;
pub use crate::data::{Candidate, CandidateKind, Event, Jet, MissingEt};
pub use crate::selection::{EventRange, SelectionIndex};
pub use crate::shapes::{jet_shape, JetShape};
pub use crate::utils::vectors::{Vec3, Vec4};

/// The sentinel written into any slot which has no physical value.
pub const SENTINEL: f64 = -1.0;

pub type JetFeatResult<T> = Result<T, JetFeatError>;

/// The error type used by all `jetfeat` internal methods
#[derive(Error, Debug)]
pub enum JetFeatError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`parquet::errors::ParquetError`].
    #[error("Parquet Error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),
    /// An alias for [`arrow::error::ArrowError`].
    #[error("Arrow Error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// A line of a selection file could not be parsed.
    #[error("Failed to parse selection line {line} (\"{content}\"): {reason}")]
    SelectionParseError {
        /// One-based line number within the selection file
        line: usize,
        /// The offending line
        content: String,
        /// What was wrong with it
        reason: String,
    },
    /// A selection refers to an event source which was never registered.
    #[error("No registered event source with name \"{name}\"!")]
    MissingSource {
        /// Identifier of the source which failed lookup
        name: String,
    },
    /// The same event source was registered twice.
    #[error("An event source by the name \"{name}\" is already registered!")]
    DuplicateSource {
        /// Identifier of the source which is already registered
        name: String,
    },
    /// An event index does not exist in its source.
    #[error("Event index {index} is out of range for source \"{source_id}\" with {n_entries} entries")]
    IndexOutOfRange {
        /// Identifier of the source
        source_id: String,
        /// The requested index
        index: usize,
        /// The number of entries in the source
        n_entries: usize,
    },
    /// A required column is absent from an input file.
    #[error("Missing column \"{name}\"")]
    MissingColumn {
        /// Name of the column
        name: String,
    },
    /// A column has a data type which cannot be read as numbers.
    #[error("Column \"{name}\" has unsupported data type {datatype}")]
    InvalidColumnType {
        /// Name of the column
        name: String,
        /// The data type which was found
        datatype: String,
    },
    /// A column which must hold at least one value for every row is empty.
    #[error("Column \"{name}\" has no value at row {row}")]
    MissingValue {
        /// Name of the column
        name: String,
        /// Row within the file
        row: usize,
    },
    /// An [`DatasetAssembler`] method was called in the wrong state.
    #[error("Assembler is in state {found} but {expected} was required")]
    InvalidState {
        /// State required by the call
        expected: AssemblerState,
        /// State the assembler was actually in
        found: AssemblerState,
    },
    /// A configuration value is out of its allowed range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration
        reason: String,
    },
    /// A custom fallback error for errors too complex or too infrequent to warrant their own error
    /// category.
    #[error("{0}")]
    Custom(String),
}
