//! Parquet readers and writers for simulated events and assembled feature tables.

use std::{
    collections::HashMap,
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{
        Array, ArrayRef, FixedSizeListArray, Float32Array, Float64Array, Int32Array, Int64Array,
        ListArray, UInt64Array,
    },
    datatypes::{DataType, Field, Float64Type, Int32Type, Schema},
    record_batch::RecordBatch,
};
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use tracing::info;

use super::{Candidate, CandidateKind, Event, EventSource, Jet, MissingEt};
use crate::{
    assembler::FeatureDataset,
    features::{N_EVENT_FEATURES, N_JET_FEATURES},
    packing::N_CONSTITUENT_FIELDS,
    JetFeatError, JetFeatResult, Vec4,
};

/// The number of rows written per record batch.
const BATCH_SIZE: usize = 10_000;

const JET_PT: &str = "Jet.PT";
const JET_ETA: &str = "Jet.Eta";
const JET_PHI: &str = "Jet.Phi";
const JET_MASS: &str = "Jet.Mass";
const JET_FLAVOR: &str = "Jet.Flavor";
const JET_N_CHARGED: &str = "Jet.NCharged";
const JET_N_NEUTRAL: &str = "Jet.NNeutrals";
const TRACK_COLUMNS: [&str; 4] = [
    "EFlowTrack.PT",
    "EFlowTrack.Eta",
    "EFlowTrack.Phi",
    "EFlowTrack.Mass",
];
const NEUTRAL_HADRON_COLUMNS: [&str; 4] = [
    "EFlowNeutralHadron.ET",
    "EFlowNeutralHadron.Eta",
    "EFlowNeutralHadron.Phi",
    "EFlowNeutralHadron.E",
];
const PHOTON_COLUMNS: [&str; 4] = [
    "EFlowPhoton.ET",
    "EFlowPhoton.Eta",
    "EFlowPhoton.Phi",
    "EFlowPhoton.E",
];
const MISSING_ET_COLUMNS: [&str; 3] = ["MissingET.MET", "MissingET.Eta", "MissingET.Phi"];

const EVENT_FEATURE_DATA: &str = "event_feature_data";
const JET_FEATURE_DATA: &str = "jet_feature_data";
const JET_CONSTITUENT_DATA: &str = "jet_constituent_data";
const ENERGY_FLOW_DATA: &str = "energy_flow_data";
const SOURCE_INDEX: &str = "source_index";
const EVENT_INDEX: &str = "event_index";

fn canonicalize_input_path(file_path: &str) -> JetFeatResult<PathBuf> {
    Ok(Path::new(&*shellexpand::full(file_path)?).canonicalize()?)
}

fn expand_output_path(file_path: &str) -> JetFeatResult<PathBuf> {
    Ok(PathBuf::from(&*shellexpand::full(file_path)?))
}

fn required_columns() -> Vec<&'static str> {
    let mut columns = vec![
        JET_PT,
        JET_ETA,
        JET_PHI,
        JET_MASS,
        JET_FLAVOR,
        JET_N_CHARGED,
        JET_N_NEUTRAL,
    ];
    columns.extend(TRACK_COLUMNS);
    columns.extend(NEUTRAL_HADRON_COLUMNS);
    columns.extend(PHOTON_COLUMNS);
    columns.extend(MISSING_ET_COLUMNS);
    columns
}

/// An [`EventSource`] backed by a Parquet file with one row per event and one list-valued
/// column per simulation branch (`Jet.PT`, `EFlowTrack.Eta`, `MissingET.MET`, ...).
///
/// The file is read once when opened; events are decoded on demand.
#[derive(Debug, Clone)]
pub struct ParquetEventSource {
    name: String,
    batches: Vec<RecordBatch>,
    batch_starts: Vec<usize>,
    n_entries: usize,
}

impl ParquetEventSource {
    /// Open an event file, checking that every required column is present.
    pub fn open(file_path: &str) -> JetFeatResult<Self> {
        let path = canonicalize_input_path(file_path)?;
        let file = File::open(&path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        for column in required_columns() {
            if schema.column_with_name(column).is_none() {
                return Err(JetFeatError::MissingColumn {
                    name: column.to_string(),
                });
            }
        }
        let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
        let mut batch_starts = Vec::with_capacity(batches.len());
        let mut n_entries = 0;
        for batch in &batches {
            batch_starts.push(n_entries);
            n_entries += batch.num_rows();
        }
        info!("Opened {} with {} events", path.display(), n_entries);
        Ok(Self {
            name: file_path.to_string(),
            batches,
            batch_starts,
            n_entries,
        })
    }

    /// The identifier this source was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, index: usize) -> JetFeatResult<(&RecordBatch, usize)> {
        if index >= self.n_entries {
            return Err(JetFeatError::IndexOutOfRange {
                source_id: self.name.clone(),
                index,
                n_entries: self.n_entries,
            });
        }
        let batch = self.batch_starts.partition_point(|&start| start <= index) - 1;
        Ok((&self.batches[batch], index - self.batch_starts[batch]))
    }
}

impl EventSource for ParquetEventSource {
    fn n_entries(&self) -> usize {
        self.n_entries
    }

    fn read_event(&self, index: usize) -> JetFeatResult<Event> {
        let (batch, row) = self.locate(index)?;
        let reader = RowReader { batch, row, index };
        let jet_columns = reader.columns(&[
            JET_PT,
            JET_ETA,
            JET_PHI,
            JET_MASS,
            JET_FLAVOR,
            JET_N_CHARGED,
            JET_N_NEUTRAL,
        ])?;
        let jets = (0..jet_columns[0].len())
            .map(|i| {
                Jet::new(
                    Vec4::from_pt_eta_phi_m(
                        jet_columns[0][i],
                        jet_columns[1][i],
                        jet_columns[2][i],
                        jet_columns[3][i],
                    ),
                    jet_columns[4][i] as i32,
                    jet_columns[5][i] as u32,
                    jet_columns[6][i] as u32,
                )
            })
            .collect();
        let tracks = reader.candidates(&TRACK_COLUMNS, |[pt, eta, phi, mass]| {
            Candidate::track(pt, eta, phi, mass)
        })?;
        let neutral_hadrons = reader.candidates(&NEUTRAL_HADRON_COLUMNS, |[et, eta, phi, e]| {
            Candidate::tower(CandidateKind::NeutralHadron, et, eta, phi, e)
        })?;
        let photons = reader.candidates(&PHOTON_COLUMNS, |[et, eta, phi, e]| {
            Candidate::tower(CandidateKind::Photon, et, eta, phi, e)
        })?;
        let met = reader.first(MISSING_ET_COLUMNS[0])?;
        let met_eta = reader.first(MISSING_ET_COLUMNS[1])?;
        let met_phi = reader.first(MISSING_ET_COLUMNS[2])?;
        Ok(Event {
            jets,
            tracks,
            neutral_hadrons,
            photons,
            missing_et: MissingEt::new(met, met_eta, met_phi),
        })
    }
}

/// Decodes the list cells of a single row.
struct RowReader<'a> {
    batch: &'a RecordBatch,
    row: usize,
    index: usize,
}

impl RowReader<'_> {
    fn values(&self, name: &str) -> JetFeatResult<Vec<f64>> {
        let column = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| JetFeatError::MissingColumn {
                name: name.to_string(),
            })?;
        let list = column
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| JetFeatError::InvalidColumnType {
                name: name.to_string(),
                datatype: column.data_type().to_string(),
            })?;
        if list.is_null(self.row) {
            return Ok(Vec::new());
        }
        numeric_values(name, list.value(self.row).as_ref())
    }

    /// Several list cells which must all have the same length.
    fn columns<const N: usize>(&self, names: &[&str; N]) -> JetFeatResult<Vec<Vec<f64>>> {
        let columns = names
            .iter()
            .map(|name| self.values(name))
            .collect::<JetFeatResult<Vec<_>>>()?;
        let expected = columns[0].len();
        if let Some((name, column)) = names
            .iter()
            .zip(&columns)
            .find(|(_, column)| column.len() != expected)
        {
            return Err(JetFeatError::Custom(format!(
                "Column \"{}\" has {} values at row {} but \"{}\" has {}",
                name,
                column.len(),
                self.index,
                names[0],
                expected
            )));
        }
        Ok(columns)
    }

    fn candidates<F>(&self, names: &[&str; 4], build: F) -> JetFeatResult<Vec<Candidate>>
    where
        F: Fn([f64; 4]) -> Candidate,
    {
        let columns = self.columns(names)?;
        Ok((0..columns[0].len())
            .map(|i| build([columns[0][i], columns[1][i], columns[2][i], columns[3][i]]))
            .collect())
    }

    fn first(&self, name: &str) -> JetFeatResult<f64> {
        self.values(name)?
            .first()
            .copied()
            .ok_or_else(|| JetFeatError::MissingValue {
                name: name.to_string(),
                row: self.index,
            })
    }
}

fn numeric_values(name: &str, array: &dyn Array) -> JetFeatResult<Vec<f64>> {
    let invalid = || JetFeatError::InvalidColumnType {
        name: name.to_string(),
        datatype: array.data_type().to_string(),
    };
    let values = match array.data_type() {
        DataType::Float32 => array
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(invalid)?
            .values()
            .iter()
            .map(|&v| v as f64)
            .collect(),
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(invalid)?
            .values()
            .to_vec(),
        DataType::Int32 => array
            .as_any()
            .downcast_ref::<Int32Array>()
            .ok_or_else(invalid)?
            .values()
            .iter()
            .map(|&v| v as f64)
            .collect(),
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(invalid)?
            .values()
            .iter()
            .map(|&v| v as f64)
            .collect(),
        _ => return Err(invalid()),
    };
    Ok(values)
}

fn float_list_column<F>(events: &[Event], extract: F) -> ArrayRef
where
    F: Fn(&Event) -> Vec<f64>,
{
    Arc::new(ListArray::from_iter_primitive::<Float64Type, _, _>(
        events
            .iter()
            .map(|event| Some(extract(event).into_iter().map(Some))),
    ))
}

fn int_list_column<F>(events: &[Event], extract: F) -> ArrayRef
where
    F: Fn(&Event) -> Vec<i32>,
{
    Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(
        events
            .iter()
            .map(|event| Some(extract(event).into_iter().map(Some))),
    ))
}

fn candidate_columns(
    events: &[Event],
    names: &[&'static str; 4],
    select: fn(&Event) -> &[Candidate],
    last: fn(&Candidate) -> f64,
) -> Vec<(&'static str, ArrayRef)> {
    vec![
        (
            names[0],
            float_list_column(events, |e| select(e).iter().map(|c| c.intensity).collect()),
        ),
        (
            names[1],
            float_list_column(events, |e| select(e).iter().map(|c| c.p4.eta()).collect()),
        ),
        (
            names[2],
            float_list_column(events, |e| select(e).iter().map(|c| c.p4.phi()).collect()),
        ),
        (
            names[3],
            float_list_column(events, |e| select(e).iter().map(last).collect()),
        ),
    ]
}

/// Write events in the layout read by [`ParquetEventSource`].
pub fn write_event_parquet(events: &[Event], file_path: &str) -> JetFeatResult<()> {
    let path = expand_output_path(file_path)?;
    let mut columns: Vec<(&str, ArrayRef)> = vec![
        (
            JET_PT,
            float_list_column(events, |e| e.jets.iter().map(|j| j.p4.pt()).collect()),
        ),
        (
            JET_ETA,
            float_list_column(events, |e| e.jets.iter().map(|j| j.p4.eta()).collect()),
        ),
        (
            JET_PHI,
            float_list_column(events, |e| e.jets.iter().map(|j| j.p4.phi()).collect()),
        ),
        (
            JET_MASS,
            float_list_column(events, |e| e.jets.iter().map(|j| j.p4.m()).collect()),
        ),
        (
            JET_FLAVOR,
            int_list_column(events, |e| e.jets.iter().map(|j| j.flavor).collect()),
        ),
        (
            JET_N_CHARGED,
            int_list_column(events, |e| {
                e.jets.iter().map(|j| j.n_charged as i32).collect()
            }),
        ),
        (
            JET_N_NEUTRAL,
            int_list_column(events, |e| {
                e.jets.iter().map(|j| j.n_neutral as i32).collect()
            }),
        ),
    ];
    columns.extend(candidate_columns(
        events,
        &TRACK_COLUMNS,
        |e| e.tracks.as_slice(),
        |c| c.p4.m(),
    ));
    columns.extend(candidate_columns(
        events,
        &NEUTRAL_HADRON_COLUMNS,
        |e| e.neutral_hadrons.as_slice(),
        |c| c.p4.e(),
    ));
    columns.extend(candidate_columns(
        events,
        &PHOTON_COLUMNS,
        |e| e.photons.as_slice(),
        |c| c.p4.e(),
    ));
    columns.push((
        MISSING_ET_COLUMNS[0],
        float_list_column(events, |e| vec![e.missing_et.met]),
    ));
    columns.push((
        MISSING_ET_COLUMNS[1],
        float_list_column(events, |e| vec![e.missing_et.eta]),
    ));
    columns.push((
        MISSING_ET_COLUMNS[2],
        float_list_column(events, |e| vec![e.missing_et.phi]),
    ));
    let batch = RecordBatch::try_from_iter(columns)?;
    let file = File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn join_names<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| name.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_names(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split('\n').map(str::to_string).collect()
    }
}

fn format_shape(shape: &[usize]) -> String {
    format!(
        "[{}]",
        shape
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn list_field(name: &str, size: usize) -> Field {
    Field::new(
        name,
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float64, false)),
            size as i32,
        ),
        false,
    )
}

fn build_feature_schema(dataset: &FeatureDataset) -> Schema {
    let rows = dataset.n_rows();
    let mut fields = vec![
        list_field(EVENT_FEATURE_DATA, N_EVENT_FEATURES),
        list_field(JET_FEATURE_DATA, dataset.jet_row_len()),
    ];
    let mut metadata = HashMap::from([
        (
            "event_feature_names".to_string(),
            join_names(&dataset.event_feature_names()),
        ),
        (
            "event_feature_shape".to_string(),
            format_shape(&[rows, N_EVENT_FEATURES]),
        ),
        (
            "jet_feature_names".to_string(),
            join_names(&dataset.jet_feature_names()),
        ),
        (
            "jet_feature_shape".to_string(),
            format_shape(&[rows, dataset.jet_row_len()]),
        ),
        ("source_names".to_string(), join_names(&dataset.source_names)),
        ("n_jets".to_string(), dataset.n_jets.to_string()),
        (
            "constituent_capacity".to_string(),
            dataset.constituent_capacity.to_string(),
        ),
        ("basis_size".to_string(), dataset.basis_size.to_string()),
    ]);
    if dataset.jet_constituents.is_some() {
        fields.push(list_field(JET_CONSTITUENT_DATA, dataset.constituent_row_len()));
        metadata.insert(
            "jet_constituent_names".to_string(),
            join_names(&dataset.jet_constituent_names()),
        );
        metadata.insert(
            "jet_constituent_shape".to_string(),
            format_shape(&[
                rows,
                dataset.n_jets,
                dataset.constituent_capacity,
                N_CONSTITUENT_FIELDS,
            ]),
        );
    }
    if dataset.energy_flow.is_some() {
        fields.push(list_field(ENERGY_FLOW_DATA, dataset.energy_flow_row_len()));
        metadata.insert(
            "energy_flow_names".to_string(),
            join_names(&dataset.energy_flow_names()),
        );
        metadata.insert(
            "energy_flow_shape".to_string(),
            format_shape(&[rows, dataset.n_jets, dataset.basis_size]),
        );
    }
    fields.push(Field::new(SOURCE_INDEX, DataType::UInt64, false));
    fields.push(Field::new(EVENT_INDEX, DataType::UInt64, false));
    Schema::new(fields).with_metadata(metadata)
}

fn fixed_size_list(
    values: &[f64],
    row_len: usize,
    start: usize,
    end: usize,
) -> JetFeatResult<ArrayRef> {
    Ok(Arc::new(FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float64, false)),
        row_len as i32,
        Arc::new(Float64Array::from(
            values[start * row_len..end * row_len].to_vec(),
        )),
        None,
    )?))
}

fn feature_range_to_record_batch(
    dataset: &FeatureDataset,
    start: usize,
    end: usize,
    schema: Arc<Schema>,
) -> JetFeatResult<RecordBatch> {
    let mut columns: Vec<ArrayRef> = vec![
        fixed_size_list(&dataset.event_features, N_EVENT_FEATURES, start, end)?,
        fixed_size_list(&dataset.jet_features, dataset.jet_row_len(), start, end)?,
    ];
    if let Some(constituents) = &dataset.jet_constituents {
        columns.push(fixed_size_list(
            constituents,
            dataset.constituent_row_len(),
            start,
            end,
        )?);
    }
    if let Some(energy_flow) = &dataset.energy_flow {
        columns.push(fixed_size_list(
            energy_flow,
            dataset.energy_flow_row_len(),
            start,
            end,
        )?);
    }
    columns.push(Arc::new(UInt64Array::from(
        dataset.source_index[start..end].to_vec(),
    )));
    columns.push(Arc::new(UInt64Array::from(
        dataset.event_index[start..end].to_vec(),
    )));
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// The file written for a conversion run named `name`: `<outputdir>/<name>_data.parquet`.
///
/// `outputdir` is shell-expanded and created if it does not exist yet.
pub fn feature_output_path(outputdir: &str, name: &str) -> JetFeatResult<PathBuf> {
    let dir = expand_output_path(outputdir)?;
    fs::create_dir_all(&dir)?;
    Ok(dir.join(format!("{name}_data.parquet")))
}

/// Persist a [`FeatureDataset`] with one row per selected event.
///
/// Array names, source names and logical array shapes are stored in the schema metadata.
pub fn write_feature_parquet(dataset: &FeatureDataset, file_path: &str) -> JetFeatResult<()> {
    let path = expand_output_path(file_path)?;
    let schema = Arc::new(build_feature_schema(dataset));
    let file = File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None)?;
    let n_rows = dataset.n_rows();
    let mut start = 0usize;
    while start < n_rows {
        let end = (start + BATCH_SIZE).min(n_rows);
        let batch = feature_range_to_record_batch(dataset, start, end, schema.clone())?;
        writer.write(&batch)?;
        start = end;
    }
    writer.close()?;
    info!("Saved {} rows to {}", n_rows, path.display());
    Ok(())
}

fn metadata_usize(metadata: &HashMap<String, String>, key: &str) -> JetFeatResult<usize> {
    metadata
        .get(key)
        .ok_or_else(|| JetFeatError::Custom(format!("Missing metadata entry \"{key}\"")))?
        .parse()
        .map_err(|err| JetFeatError::Custom(format!("Invalid metadata entry \"{key}\": {err}")))
}

fn append_fixed_size_list(
    batch: &RecordBatch,
    name: &str,
    out: &mut Vec<f64>,
) -> JetFeatResult<()> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| JetFeatError::MissingColumn {
            name: name.to_string(),
        })?;
    let invalid = || JetFeatError::InvalidColumnType {
        name: name.to_string(),
        datatype: column.data_type().to_string(),
    };
    let list = column
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(invalid)?;
    let values = list
        .values()
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(invalid)?;
    let row_len = list.value_length() as usize;
    let start = list.offset() * row_len;
    out.extend_from_slice(&values.values()[start..start + list.len() * row_len]);
    Ok(())
}

fn append_u64(batch: &RecordBatch, name: &str, out: &mut Vec<u64>) -> JetFeatResult<()> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| JetFeatError::MissingColumn {
            name: name.to_string(),
        })?;
    let values = column
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| JetFeatError::InvalidColumnType {
            name: name.to_string(),
            datatype: column.data_type().to_string(),
        })?;
    out.extend_from_slice(values.values());
    Ok(())
}

/// Load a [`FeatureDataset`] written by [`write_feature_parquet`].
pub fn read_feature_parquet(file_path: &str) -> JetFeatResult<FeatureDataset> {
    let path = canonicalize_input_path(file_path)?;
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let metadata = builder.schema().metadata().clone();
    let n_jets = metadata_usize(&metadata, "n_jets")?;
    let constituent_capacity = metadata_usize(&metadata, "constituent_capacity")?;
    let basis_size = metadata_usize(&metadata, "basis_size")?;
    let has_constituents = metadata.contains_key("jet_constituent_names");
    let has_energy_flow = metadata.contains_key("energy_flow_names");
    let source_names = split_names(metadata.get("source_names").map_or("", String::as_str));

    let mut dataset = FeatureDataset::new(
        n_jets,
        has_constituents.then_some(constituent_capacity),
        has_energy_flow.then_some(basis_size),
        source_names,
        0,
    );
    for batch in builder.build()? {
        let batch = batch?;
        append_fixed_size_list(&batch, EVENT_FEATURE_DATA, &mut dataset.event_features)?;
        append_fixed_size_list(&batch, JET_FEATURE_DATA, &mut dataset.jet_features)?;
        if let Some(constituents) = dataset.jet_constituents.as_mut() {
            append_fixed_size_list(&batch, JET_CONSTITUENT_DATA, constituents)?;
        }
        if let Some(energy_flow) = dataset.energy_flow.as_mut() {
            append_fixed_size_list(&batch, ENERGY_FLOW_DATA, energy_flow)?;
        }
        append_u64(&batch, SOURCE_INDEX, &mut dataset.source_index)?;
        append_u64(&batch, EVENT_INDEX, &mut dataset.event_index)?;
    }
    if dataset.jet_features.len() != dataset.n_rows() * n_jets * N_JET_FEATURES {
        return Err(JetFeatError::Custom(format!(
            "Jet feature data does not match {} jets per row",
            n_jets
        )));
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use std::env;

    use approx::assert_relative_eq;

    use super::*;
    use crate::tests::dijet_event;

    fn make_temp_dir() -> PathBuf {
        let dir = env::temp_dir().join(format!("jetfeat_io_test_{}", fastrand::u64(..)));
        fs::create_dir(&dir).expect("Failed to create temp dir");
        dir
    }

    fn assert_vec4_close(a: &Vec4, b: &Vec4) {
        assert_relative_eq!(a.px(), b.px(), epsilon = 1e-9, max_relative = 1e-9);
        assert_relative_eq!(a.py(), b.py(), epsilon = 1e-9, max_relative = 1e-9);
        assert_relative_eq!(a.pz(), b.pz(), epsilon = 1e-9, max_relative = 1e-9);
        assert_relative_eq!(a.e(), b.e(), epsilon = 1e-9, max_relative = 1e-9);
    }

    #[test]
    fn test_event_parquet_roundtrip() {
        let dir = make_temp_dir();
        let path = dir.join("events.parquet");
        let path_str = path.to_str().expect("path should be valid UTF-8");
        let mut flavored = dijet_event();
        flavored.jets[0].flavor = 21;
        let events = vec![flavored, Event::default(), dijet_event()];
        write_event_parquet(&events, path_str).expect("write should succeed");

        let source = ParquetEventSource::open(path_str).expect("open should succeed");
        assert_eq!(source.n_entries(), 3);
        let event = source.read_event(0).expect("event 0 should exist");
        assert_eq!(event.jets.len(), 2);
        assert_eq!(event.jets[0].flavor, 21);
        assert_eq!(event.jets[0].n_charged, 3);
        assert_eq!(event.jets[1].n_neutral, 2);
        assert_eq!(event.tracks.len(), 4);
        assert_eq!(event.neutral_hadrons.len(), 2);
        assert_eq!(event.photons.len(), 2);
        for (read, written) in event.jets.iter().zip(&events[0].jets) {
            assert_vec4_close(&read.p4, &written.p4);
        }
        for (read, written) in event.tracks.iter().zip(&events[0].tracks) {
            assert_vec4_close(&read.p4, &written.p4);
            assert_relative_eq!(read.intensity, written.intensity, epsilon = 1e-12);
        }
        for (read, written) in event.photons.iter().zip(&events[0].photons) {
            assert_eq!(read.kind, CandidateKind::Photon);
            assert_vec4_close(&read.p4, &written.p4);
        }
        assert_relative_eq!(event.missing_et.met, 50.0);

        let empty = source.read_event(1).expect("event 1 should exist");
        assert!(empty.jets.is_empty());
        assert!(empty.tracks.is_empty());

        assert!(matches!(
            source.read_event(3),
            Err(JetFeatError::IndexOutOfRange { index: 3, n_entries: 3, .. })
        ));
        fs::remove_dir_all(&dir).expect("Failed to remove temp dir");
    }

    #[test]
    fn test_open_rejects_missing_columns() {
        let dir = make_temp_dir();
        let path = dir.join("partial.parquet");
        let batch = RecordBatch::try_from_iter(vec![(
            JET_PT,
            float_list_column(&[dijet_event()], |e| vec![e.jets[0].p4.pt()]),
        )])
        .expect("batch should build");
        let file = File::create(&path).expect("file should be created");
        let mut writer =
            ArrowWriter::try_new(file, batch.schema(), None).expect("writer should build");
        writer.write(&batch).expect("write should succeed");
        writer.close().expect("close should succeed");
        assert!(matches!(
            ParquetEventSource::open(path.to_str().unwrap()),
            Err(JetFeatError::MissingColumn { .. })
        ));
        fs::remove_dir_all(&dir).expect("Failed to remove temp dir");
    }

    #[test]
    fn test_numeric_values_accepts_integers_and_floats() {
        let ints = Int64Array::from(vec![1, -2]);
        assert_eq!(numeric_values("x", &ints).unwrap(), vec![1.0, -2.0]);
        let floats = Float32Array::from(vec![0.5_f32]);
        assert_eq!(numeric_values("x", &floats).unwrap(), vec![0.5]);
        let unsupported = UInt64Array::from(vec![1_u64]);
        assert!(matches!(
            numeric_values("x", &unsupported),
            Err(JetFeatError::InvalidColumnType { .. })
        ));
    }

    #[test]
    fn test_feature_parquet_roundtrip() {
        let dir = make_temp_dir();
        let path = dir.join("features.parquet");
        let path_str = path.to_str().expect("path should be valid UTF-8");
        let mut dataset = FeatureDataset::new(
            2,
            Some(3),
            Some(4),
            vec!["a.parquet".to_string(), "b.parquet".to_string()],
            2,
        );
        for (i, v) in dataset.event_features.iter_mut().enumerate() {
            *v = i as f64;
        }
        for (i, v) in dataset.jet_features.iter_mut().enumerate() {
            *v = -(i as f64);
        }
        if let Some(energy_flow) = dataset.energy_flow.as_mut() {
            energy_flow.fill(0.25);
        }
        dataset.source_index = vec![0, 1];
        dataset.event_index = vec![7, 3];
        write_feature_parquet(&dataset, path_str).expect("write should succeed");

        let read = read_feature_parquet(path_str).expect("read should succeed");
        assert_eq!(read.n_rows(), 2);
        assert_eq!(read.n_jets, 2);
        assert_eq!(read.constituent_capacity, 3);
        assert_eq!(read.basis_size, 4);
        assert_eq!(read.source_names, dataset.source_names);
        assert_eq!(read.event_features, dataset.event_features);
        assert_eq!(read.jet_features, dataset.jet_features);
        assert_eq!(read.jet_constituents, dataset.jet_constituents);
        assert_eq!(read.energy_flow, dataset.energy_flow);
        assert_eq!(read.source_index, vec![0, 1]);
        assert_eq!(read.event_index, vec![7, 3]);
        fs::remove_dir_all(&dir).expect("Failed to remove temp dir");
    }

    #[test]
    fn test_feature_parquet_metadata() {
        let dir = make_temp_dir();
        let path = dir.join("features.parquet");
        let dataset = FeatureDataset::new(2, None, None, vec!["only".to_string()], 1);
        write_feature_parquet(&dataset, path.to_str().unwrap()).expect("write should succeed");
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .expect("reader should build");
        let metadata = builder.schema().metadata();
        assert_eq!(metadata["event_feature_names"], "MET\nMETEta\nMETPhi\nMjj\nMT");
        assert_eq!(metadata["jet_feature_shape"], "[1, 18]");
        assert!(!metadata.contains_key("jet_constituent_names"));
        assert!(builder.schema().column_with_name(ENERGY_FLOW_DATA).is_none());
        let read = read_feature_parquet(path.to_str().unwrap()).expect("read should succeed");
        assert!(read.jet_constituents.is_none());
        assert!(read.energy_flow.is_none());
        fs::remove_dir_all(&dir).expect("Failed to remove temp dir");
    }

    #[test]
    fn test_feature_output_path_creates_directory() {
        let dir = make_temp_dir();
        let out = dir.join("nested");
        let path = feature_output_path(out.to_str().unwrap(), "signal").unwrap();
        assert!(out.is_dir());
        assert_eq!(path, out.join("signal_data.parquet"));
        fs::remove_dir_all(&dir).expect("Failed to remove temp dir");
    }
}
