//! `jetfeat` turns simulated collider events into fixed-shape jet feature tables which can be fed
//! straight into machine-learning pipelines.
//!
//! # Table of Contents
//! - [Overview](#overview)
//! - [Quick Start](#quick-start)
//! - [Feature Layout](#feature-layout)
//! - [Command Line](#command-line)
//!
//! # Overview
//! For every selected event, the leading jets are matched to the particle-flow candidates
//! (tracks, neutral hadrons and photons) within an angular radius $`\Delta R`$:
//! ```math
//! \Delta R^2 = (\eta_c - \eta_j)^2 + \Delta\phi(j, c)^2 < R^2
//! ```
//! A candidate only takes part if it clears its type's threshold ($`p_T > 0.1`$ for tracks,
//! $`E_T > 0.5`$ for neutral hadrons and $`E_T > 0.2`$ for photons), and it is given to every jet
//! close enough to it. The associated constituents feed the jet shape observables
//! $`p_T D`$ and $`\sigma_2`$ (the minor axis of the $`p_T^2`$-weighted spread), an optional
//! fixed-capacity table of the hardest constituents, and an optional set of energy-flow
//! polynomials.
//!
//! # Quick Start
//! ```rust,no_run
//! use jetfeat::{
//!     ConverterConfig, DatasetAssembler, EventRange, JetFeatResult, ParquetEventSource,
//!     SelectionIndex,
//! };
//!
//! fn main() -> JetFeatResult<()> {
//!     let selection = SelectionIndex::from_file("selection.txt")?;
//!     let config = ConverterConfig::default()
//!         .with_jet_radius(0.8)
//!         .with_constituents(100)
//!         .with_basis_degree(Some(3));
//!     let mut assembler = DatasetAssembler::new(config)?;
//!     for source in selection.sources() {
//!         assembler.register_source(source, ParquetEventSource::open(source)?)?;
//!     }
//!     let dataset = assembler.convert(&selection, EventRange::default())?;
//!     jetfeat::io::write_feature_parquet(&dataset, "signal_data.parquet")
//! }
//! ```
//!
//! # Feature Layout
//! Each output row belongs to one selected event, in the order the sources were registered and
//! then in selection-file order:
//!
//! | Array | Shape | Fields |
//! |-------|-------|--------|
//! | `event_feature_data` | `[rows, 5]` | `MET, METEta, METPhi, Mjj, MT` |
//! | `jet_feature_data` | `[rows, n_jets * 9]` | `Eta, Phi, Pt, M, ChargedFraction, PTD, Axis2, Flavor, Energy` |
//! | `jet_constituent_data` | `[rows, n_jets, K, 5]` | `Eta, Phi, PT, Rapidity, Energy` |
//! | `energy_flow_data` | `[rows, n_jets, basis_size]` | `v0, v1, ...` |
//!
//! Any slot without a physical value holds [`SENTINEL`] (`-1`): the charged fraction of a jet
//! with no multiplicity information, unused constituent rows, jet slots beyond the jets present
//! in an event, and `Mjj` and `MT` for events with fewer than two jets. Energy-flow values of a
//! missing jet are `0`.
//!
//! # Command Line
//! The `jetfeat-convert` binary wraps the whole pipeline:
//! ```shell
//! jetfeat-convert <outputdir> <selection> <name> <dr> <nc> <rmin> <rmax> <constituents> <basis_n>
//! ```
//! and writes `<outputdir>/<name>_data.parquet`. Set `RUST_LOG=debug` to see every event.
#![warn(clippy::perf, clippy::style, missing_docs)]

/// Event sources and the event data model.
pub mod data {
    pub use jetfeat_core::data::{
        Candidate, CandidateKind, Event, EventSource, Jet, MissingEt, ParquetEventSource,
    };
}
/// Reading and writing event files and feature tables.
pub mod io {
    pub use jetfeat_core::data::io::{
        feature_output_path, read_feature_parquet, write_event_parquet, write_feature_parquet,
    };
}
/// Per-jet and per-event feature vectors.
pub mod features {
    pub use jetfeat_core::features::*;
    pub use jetfeat_core::packing::*;
    pub use jetfeat_core::shapes::*;
}
/// Utility functions and four-vectors
pub mod utils {
    pub use jetfeat_core::utils::*;
}
/// Useful traits for all crate structs
pub mod traits {
    pub use jetfeat_core::traits::*;
}

pub use jetfeat_core::assembler::{AssemblerState, DatasetAssembler, FeatureDataset};
pub use jetfeat_core::association::{associate, AssociationCuts};
pub use jetfeat_core::basis::{BasisEvaluator, EnergyFlowBasis};
pub use jetfeat_core::config::{ConverterConfig, MAX_BASIS_DEGREE};
pub use jetfeat_core::data::{
    Candidate, CandidateKind, Event, EventSource, Jet, MissingEt, ParquetEventSource,
};
pub use jetfeat_core::selection::{EventRange, SelectionIndex};
pub use jetfeat_core::shapes::{jet_shape, JetShape};
pub use jetfeat_core::utils::vectors::{Vec3, Vec4};
pub use jetfeat_core::{JetFeatError, JetFeatResult, SENTINEL};
