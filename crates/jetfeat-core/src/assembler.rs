use std::fmt::Display;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    association::associate,
    basis::{BasisEvaluator, EnergyFlowBasis},
    config::ConverterConfig,
    data::{Event, EventSource},
    features::{
        event_features, jet_features, missing_jet_features, EVENT_FEATURE_NAMES,
        JET_FEATURE_NAMES, N_EVENT_FEATURES, N_JET_FEATURES,
    },
    packing::{pack_into, JET_CONSTITUENT_NAMES, N_CONSTITUENT_FIELDS},
    selection::{EventRange, SelectionIndex},
    shapes::jet_shape,
    utils::indexed_names,
    JetFeatError, JetFeatResult, SENTINEL,
};

/// The lifecycle of a [`DatasetAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Sources may be registered; nothing is allocated.
    Idle,
    /// Output arrays are allocated for a known number of rows.
    Sized,
    /// Some, but not all, rows have been written.
    Filling,
    /// Every row has been written.
    Complete,
}

impl Display for AssemblerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblerState::Idle => write!(f, "Idle"),
            AssemblerState::Sized => write!(f, "Sized"),
            AssemblerState::Filling => write!(f, "Filling"),
            AssemblerState::Complete => write!(f, "Complete"),
        }
    }
}

/// Fixed-shape feature arrays with one row per selected event.
///
/// Every array is stored flat and row-major:
/// - `event_features`: `[rows, 5]`
/// - `jet_features`: `[rows, n_jets * 9]`
/// - `jet_constituents`: `[rows, n_jets, constituent_capacity, 5]` (if saved)
/// - `energy_flow`: `[rows, n_jets, basis_size]` (if enabled)
///
/// `source_index` and `event_index` record which event of which source produced each row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDataset {
    /// The number of jet slots per row.
    pub n_jets: usize,
    /// Constituent rows per jet (zero if constituents are not saved).
    pub constituent_capacity: usize,
    /// Energy-flow values per jet (zero if the basis is disabled).
    pub basis_size: usize,
    /// Source names, indexed by `source_index`.
    pub source_names: Vec<String>,
    pub event_features: Vec<f64>,
    pub jet_features: Vec<f64>,
    pub jet_constituents: Option<Vec<f64>>,
    pub energy_flow: Option<Vec<f64>>,
    pub source_index: Vec<u64>,
    pub event_index: Vec<u64>,
}

impl FeatureDataset {
    /// Allocate `n_rows` rows. Feature slots start as [`SENTINEL`] and energy-flow slots as `0`.
    pub fn new(
        n_jets: usize,
        constituent_capacity: Option<usize>,
        basis_size: Option<usize>,
        source_names: Vec<String>,
        n_rows: usize,
    ) -> Self {
        let capacity = constituent_capacity.unwrap_or(0);
        let size = basis_size.unwrap_or(0);
        Self {
            n_jets,
            constituent_capacity: capacity,
            basis_size: size,
            source_names,
            event_features: vec![SENTINEL; n_rows * N_EVENT_FEATURES],
            jet_features: vec![SENTINEL; n_rows * n_jets * N_JET_FEATURES],
            jet_constituents: constituent_capacity
                .map(|_| vec![SENTINEL; n_rows * n_jets * capacity * N_CONSTITUENT_FIELDS]),
            energy_flow: basis_size.map(|_| vec![0.0; n_rows * n_jets * size]),
            source_index: vec![0; n_rows],
            event_index: vec![0; n_rows],
        }
    }

    pub fn n_rows(&self) -> usize {
        self.event_features.len() / N_EVENT_FEATURES
    }
    pub fn jet_row_len(&self) -> usize {
        self.n_jets * N_JET_FEATURES
    }
    pub fn constituent_row_len(&self) -> usize {
        self.n_jets * self.constituent_capacity * N_CONSTITUENT_FIELDS
    }
    pub fn energy_flow_row_len(&self) -> usize {
        self.n_jets * self.basis_size
    }

    pub fn event_feature_names(&self) -> Vec<String> {
        EVENT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }
    pub fn jet_feature_names(&self) -> Vec<String> {
        JET_FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }
    pub fn jet_constituent_names(&self) -> Vec<String> {
        JET_CONSTITUENT_NAMES.iter().map(|s| s.to_string()).collect()
    }
    /// Generated names `v0, v1, ...` for the energy-flow values of one jet.
    pub fn energy_flow_names(&self) -> Vec<String> {
        indexed_names("v", self.basis_size)
    }

    /// The event features of a row.
    pub fn event_row(&self, row: usize) -> &[f64] {
        &self.event_features[row * N_EVENT_FEATURES..(row + 1) * N_EVENT_FEATURES]
    }
    /// The features of one jet slot of a row.
    pub fn jet_row(&self, row: usize, jet: usize) -> &[f64] {
        let start = row * self.jet_row_len() + jet * N_JET_FEATURES;
        &self.jet_features[start..start + N_JET_FEATURES]
    }
    /// The packed `(capacity, 5)` constituents of one jet slot of a row.
    pub fn constituent_rows(&self, row: usize, jet: usize) -> Option<&[f64]> {
        let len = self.constituent_capacity * N_CONSTITUENT_FIELDS;
        let start = row * self.constituent_row_len() + jet * len;
        self.jet_constituents
            .as_ref()
            .map(|values| &values[start..start + len])
    }
    /// The energy-flow values of one jet slot of a row.
    pub fn energy_flow_row(&self, row: usize, jet: usize) -> Option<&[f64]> {
        let start = row * self.energy_flow_row_len() + jet * self.basis_size;
        self.energy_flow
            .as_ref()
            .map(|values| &values[start..start + self.basis_size])
    }
}

/// Drives the conversion of selected events into a [`FeatureDataset`].
///
/// Sources are registered up front (in the order their rows will appear), the output is sized
/// from a [`SelectionIndex`] and an [`EventRange`], and then rows are filled one event at a time:
/// `Idle → Sized → Filling → Complete`. All selection and index errors surface while sizing,
/// before any row is written.
pub struct DatasetAssembler {
    config: ConverterConfig,
    sources: IndexMap<String, Box<dyn EventSource>>,
    basis: Option<Box<dyn BasisEvaluator>>,
    state: AssemblerState,
    dataset: Option<FeatureDataset>,
    next_row: usize,
    event_n: usize,
}

impl DatasetAssembler {
    /// Create an assembler, building the energy-flow basis if the config asks for one.
    pub fn new(config: ConverterConfig) -> JetFeatResult<Self> {
        config.validate()?;
        let basis = match config.basis_degree {
            Some(degree) => {
                let basis = EnergyFlowBasis::new(degree)?;
                info!(
                    "using energy-flow basis with degree d <= {} ({} values per jet)",
                    basis.max_degree(),
                    basis.basis_size()
                );
                Some(Box::new(basis) as Box<dyn BasisEvaluator>)
            }
            None => None,
        };
        Ok(Self {
            config,
            sources: IndexMap::new(),
            basis,
            state: AssemblerState::Idle,
            dataset: None,
            next_row: 0,
            event_n: 0,
        })
    }

    /// Replace the basis evaluator.
    pub fn with_basis(mut self, basis: Box<dyn BasisEvaluator>) -> Self {
        self.basis = Some(basis);
        self
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn require(&self, expected: AssemblerState) -> JetFeatResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(JetFeatError::InvalidState {
                expected,
                found: self.state,
            })
        }
    }

    /// Register an already-opened source under the name used in selection files.
    pub fn register_source<S: EventSource + 'static>(
        &mut self,
        name: &str,
        source: S,
    ) -> JetFeatResult<()> {
        self.require(AssemblerState::Idle)?;
        if self.sources.contains_key(name) {
            return Err(JetFeatError::DuplicateSource {
                name: name.to_string(),
            });
        }
        self.sources.insert(name.to_string(), Box::new(source));
        Ok(())
    }

    /// Resolve the selection against the registered sources and allocate every output array.
    ///
    /// The range is clamped against the largest source and applied half-open. Returns the
    /// number of rows.
    pub fn size(&mut self, selection: &SelectionIndex, range: EventRange) -> JetFeatResult<usize> {
        self.require(AssemblerState::Idle)?;
        if let Some(missing) = selection
            .sources()
            .find(|name| !self.sources.contains_key(*name))
        {
            return Err(JetFeatError::MissingSource {
                name: missing.to_string(),
            });
        }
        let sizes: Vec<usize> = self.sources.values().map(|s| s.n_entries()).collect();
        let total_events: usize = sizes.iter().sum();
        info!("Found {} sources", self.sources.len());
        info!("Found {} total events", total_events);
        info!(
            "found {} selected events, out of a total of {}",
            selection.n_selected(),
            total_events
        );
        let range = range.clamp(sizes.iter().copied().max().unwrap_or(0));
        info!("selecting on range {}", range);

        let mut rows = Vec::new();
        for (source_n, (name, source)) in self.sources.iter().enumerate() {
            let Some(indices) = selection.indices(name) else {
                continue;
            };
            for index in range.filter(indices) {
                let index = index as usize;
                if index >= source.n_entries() {
                    return Err(JetFeatError::IndexOutOfRange {
                        source_id: name.clone(),
                        index,
                        n_entries: source.n_entries(),
                    });
                }
                rows.push((source_n as u64, index as u64));
            }
        }

        let capacity = Some(self.config.stored_capacity()).filter(|&capacity| capacity > 0);
        let basis_size = self.basis.as_ref().map(|b| b.basis_size());
        let mut dataset = FeatureDataset::new(
            self.config.n_jets,
            capacity,
            basis_size,
            self.sources.keys().cloned().collect(),
            rows.len(),
        );
        for (row, (source_n, index)) in rows.into_iter().enumerate() {
            dataset.source_index[row] = source_n;
            dataset.event_index[row] = index;
        }
        let n_rows = dataset.n_rows();
        info!("event feature shapes: [{}, {}]", n_rows, N_EVENT_FEATURES);
        info!("jet feature shapes: [{}, {}]", n_rows, dataset.jet_row_len());
        if capacity.is_some() {
            info!(
                "jet constituent shapes: [{}, {}, {}, {}]",
                n_rows, dataset.n_jets, dataset.constituent_capacity, N_CONSTITUENT_FIELDS
            );
        } else {
            info!("ignoring jet constituents");
        }
        if basis_size.is_some() {
            info!(
                "eflow bases shapes: [{}, {}, {}]",
                n_rows, dataset.n_jets, dataset.basis_size
            );
        }
        self.dataset = Some(dataset);
        self.next_row = 0;
        self.event_n = 0;
        self.state = if n_rows == 0 {
            AssemblerState::Complete
        } else {
            AssemblerState::Sized
        };
        Ok(n_rows)
    }

    /// Read and convert the next selected event. Returns `false` once every row is written.
    pub fn fill_next(&mut self) -> JetFeatResult<bool> {
        match self.state {
            AssemblerState::Sized | AssemblerState::Filling => {}
            AssemblerState::Complete => return Ok(false),
            found => {
                return Err(JetFeatError::InvalidState {
                    expected: AssemblerState::Sized,
                    found,
                })
            }
        }
        let dataset = self.dataset.as_mut().ok_or(JetFeatError::InvalidState {
            expected: AssemblerState::Sized,
            found: self.state,
        })?;
        let row = self.next_row;
        let source_n = dataset.source_index[row] as usize;
        let index = dataset.event_index[row] as usize;
        if row > 0 && dataset.source_index[row - 1] as usize == source_n {
            self.event_n += 1;
        } else {
            self.event_n = 0;
        }
        debug!(
            "source {}, event {}, index {}, total count {}",
            source_n, self.event_n, index, row
        );
        let (name, source) = self.sources.get_index(source_n).ok_or_else(|| {
            JetFeatError::MissingSource {
                name: format!("#{}", source_n),
            }
        })?;
        let event = source.read_event(index)?;
        if event.jets.len() < 2 {
            warn!(
                "event {} of \"{}\" has {} jets; writing sentinel dijet features",
                index,
                name,
                event.jets.len()
            );
        }
        fill_row(dataset, row, &event, &self.config, self.basis.as_deref());
        self.next_row += 1;
        self.state = if self.next_row == dataset.n_rows() {
            AssemblerState::Complete
        } else {
            AssemblerState::Filling
        };
        Ok(true)
    }

    /// Fill every remaining row.
    pub fn fill(&mut self) -> JetFeatResult<()> {
        while self.fill_next()? {}
        Ok(())
    }

    /// Take the finished dataset.
    pub fn finish(mut self) -> JetFeatResult<FeatureDataset> {
        self.require(AssemblerState::Complete)?;
        self.dataset.take().ok_or(JetFeatError::InvalidState {
            expected: AssemblerState::Complete,
            found: AssemblerState::Idle,
        })
    }

    /// Size, fill, and finish in one call.
    pub fn convert(
        mut self,
        selection: &SelectionIndex,
        range: EventRange,
    ) -> JetFeatResult<FeatureDataset> {
        self.size(selection, range)?;
        self.fill()?;
        self.finish()
    }
}

/// Write every feature of one event into its row. Jet slots without a jet get sentinel features
/// and constituents and an all-zero energy-flow vector. `Mjj` and `MT` always use the two
/// leading jets of the event, however many jet slots are kept.
fn fill_row(
    dataset: &mut FeatureDataset,
    row: usize,
    event: &Event,
    config: &ConverterConfig,
    basis: Option<&dyn BasisEvaluator>,
) {
    let jets = event.leading_jets(config.n_jets);
    let constituents = associate(jets, event, &config.cuts, config.jet_radius);

    let event_row =
        &mut dataset.event_features[row * N_EVENT_FEATURES..(row + 1) * N_EVENT_FEATURES];
    event_row.copy_from_slice(&event_features(event.leading_jets(2), &event.missing_et));

    let jet_len = dataset.n_jets * N_JET_FEATURES;
    let jet_row = &mut dataset.jet_features[row * jet_len..(row + 1) * jet_len];
    for (jet_n, slot) in jet_row.chunks_exact_mut(N_JET_FEATURES).enumerate() {
        let features = match (jets.get(jet_n), constituents.get(jet_n)) {
            (Some(jet), Some(jet_constituents)) => {
                jet_features(jet, &jet_shape(&jet.p4, jet_constituents))
            }
            _ => missing_jet_features(),
        };
        slot.copy_from_slice(&features);
    }

    let capacity = dataset.constituent_capacity;
    if let Some(values) = dataset.jet_constituents.as_mut() {
        let jet_len = capacity * N_CONSTITUENT_FIELDS;
        let row_len = dataset.n_jets * jet_len;
        let packed_row = &mut values[row * row_len..(row + 1) * row_len];
        for (jet_n, slot) in packed_row.chunks_exact_mut(jet_len).enumerate() {
            match constituents.get(jet_n) {
                Some(jet_constituents) => pack_into(slot, jet_constituents, capacity),
                None => slot.fill(SENTINEL),
            }
        }
    }

    let basis_size = dataset.basis_size;
    if let (Some(values), Some(basis)) = (dataset.energy_flow.as_mut(), basis) {
        let row_len = dataset.n_jets * basis_size;
        let basis_row = &mut values[row * row_len..(row + 1) * row_len];
        for (jet_n, slot) in basis_row.chunks_exact_mut(basis_size).enumerate() {
            match constituents.get(jet_n) {
                Some(jet_constituents) => basis.evaluate_into(slot, jet_constituents),
                None => slot.fill(0.0),
            }
        }
    }
}
