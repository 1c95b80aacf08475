use std::fmt::Display;

use crate::{utils::vectors::Vec4, JetFeatError, JetFeatResult};

/// Event file I/O and feature table persistence.
pub mod io;

pub use io::{
    feature_output_path, read_feature_parquet, write_event_parquet, write_feature_parquet,
    ParquetEventSource,
};

/// The physical type of a particle-flow candidate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    /// A charged track, whose intensity is its transverse momentum.
    Track,
    /// A neutral-hadron calorimeter deposit, whose intensity is its transverse energy.
    NeutralHadron,
    /// A photon candidate, whose intensity is its transverse energy.
    Photon,
}

impl Display for CandidateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateKind::Track => write!(f, "Track"),
            CandidateKind::NeutralHadron => write!(f, "Neutral Hadron"),
            CandidateKind::Photon => write!(f, "Photon"),
        }
    }
}

/// A reconstructed particle-flow object which may be associated to a jet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// The type of the candidate.
    pub kind: CandidateKind,
    /// The four-momentum of the candidate.
    pub p4: Vec4,
    /// The value compared against the per-type cutoff ($`p_T`$ for tracks, $`E_T`$ otherwise).
    pub intensity: f64,
}

impl Candidate {
    /// A track built from $`(p_T, \eta, \phi, m)`$.
    pub fn track(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        Self {
            kind: CandidateKind::Track,
            p4: Vec4::from_pt_eta_phi_m(pt, eta, phi, mass),
            intensity: pt,
        }
    }
    /// A calorimeter-tower candidate built from $`(E_T, \eta, \phi, E)`$.
    pub fn tower(kind: CandidateKind, et: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self {
            kind,
            p4: Vec4::from_pt_eta_phi_e(et, eta, phi, e),
            intensity: et,
        }
    }
}

/// A reconstructed jet with its flavor and constituent multiplicities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet {
    /// The four-momentum of the jet.
    pub p4: Vec4,
    /// The flavor code assigned by the simulation.
    pub flavor: i32,
    /// The number of charged constituents.
    pub n_charged: u32,
    /// The number of neutral constituents.
    pub n_neutral: u32,
}

impl Jet {
    pub fn new(p4: Vec4, flavor: i32, n_charged: u32, n_neutral: u32) -> Self {
        Self {
            p4,
            flavor,
            n_charged,
            n_neutral,
        }
    }
}

/// The missing-transverse-energy record of an event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MissingEt {
    /// The magnitude of the missing transverse energy.
    pub met: f64,
    /// The pseudorapidity of the missing-energy vector.
    pub eta: f64,
    /// The azimuth of the missing-energy vector.
    pub phi: f64,
}

impl MissingEt {
    pub fn new(met: f64, eta: f64, phi: f64) -> Self {
        Self { met, eta, phi }
    }
    /// The transverse components $`(E_x, E_y)`$.
    pub fn transverse(&self) -> (f64, f64) {
        (self.met * self.phi.cos(), self.met * self.phi.sin())
    }
}

/// A single simulated collision event.
///
/// Jets are ordered leading-$`p_T`$ first. The three candidate collections are kept separate
/// since each type has its own intensity cutoff during association.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Reconstructed jets, leading first.
    pub jets: Vec<Jet>,
    /// Charged-track candidates.
    pub tracks: Vec<Candidate>,
    /// Neutral-hadron candidates.
    pub neutral_hadrons: Vec<Candidate>,
    /// Photon candidates.
    pub photons: Vec<Candidate>,
    /// The missing-transverse-energy record.
    pub missing_et: MissingEt,
}

impl Event {
    /// The leading `n_jets` jets (or all of them if there are fewer).
    pub fn leading_jets(&self, n_jets: usize) -> &[Jet] {
        &self.jets[..self.jets.len().min(n_jets)]
    }
    /// The three candidate collections in association order.
    pub fn candidate_collections(&self) -> [&[Candidate]; 3] {
        [&self.tracks, &self.neutral_hadrons, &self.photons]
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event:")?;
        writeln!(f, "  jets:")?;
        for jet in &self.jets {
            writeln!(
                f,
                "    {} flavor = {} charged = {} neutral = {}",
                jet.p4, jet.flavor, jet.n_charged, jet.n_neutral
            )?;
        }
        writeln!(
            f,
            "  candidates: {} tracks, {} neutral hadrons, {} photons",
            self.tracks.len(),
            self.neutral_hadrons.len(),
            self.photons.len()
        )?;
        writeln!(
            f,
            "  missing ET: {} (eta = {}, phi = {})",
            self.missing_et.met, self.missing_et.eta, self.missing_et.phi
        )
    }
}

/// A random-access collection of [`Event`]s, such as a simulation file.
///
/// Sources are opened once and then handed to a
/// [`DatasetAssembler`](crate::assembler::DatasetAssembler); nothing is re-initialized per event.
pub trait EventSource {
    /// The number of events in the source.
    fn n_entries(&self) -> usize;
    /// Read the event at `index`, failing if it does not exist.
    fn read_event(&self, index: usize) -> JetFeatResult<Event>;
}

impl EventSource for Vec<Event> {
    fn n_entries(&self) -> usize {
        self.len()
    }

    fn read_event(&self, index: usize) -> JetFeatResult<Event> {
        self.get(index)
            .cloned()
            .ok_or_else(|| JetFeatError::IndexOutOfRange {
                source_id: "<memory>".to_string(),
                index,
                n_entries: self.len(),
            })
    }
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn n_entries(&self) -> usize {
        (**self).n_entries()
    }

    fn read_event(&self, index: usize) -> JetFeatResult<Event> {
        (**self).read_event(index)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::tests::dijet_event;

    #[test]
    fn test_event_creation() {
        let event = dijet_event();
        assert_eq!(event.jets.len(), 2);
        assert_eq!(event.tracks.len(), 4);
        assert_relative_eq!(event.missing_et.met, 50.0);
    }

    #[test]
    fn test_leading_jets_truncates() {
        let event = dijet_event();
        assert_eq!(event.leading_jets(1).len(), 1);
        assert_eq!(event.leading_jets(2).len(), 2);
        assert_eq!(event.leading_jets(5).len(), 2);
        assert_relative_eq!(event.leading_jets(1)[0].p4.pt(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_candidate_intensity() {
        let track = Candidate::track(12.0, 0.5, 1.0, 0.13957);
        assert_eq!(track.kind, CandidateKind::Track);
        assert_relative_eq!(track.intensity, 12.0);
        let photon = Candidate::tower(CandidateKind::Photon, 3.0, 0.0, 0.0, 3.0);
        assert_relative_eq!(photon.intensity, 3.0);
        assert_relative_eq!(photon.p4.m(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_et_transverse() {
        let met = MissingEt::new(10.0, 0.0, std::f64::consts::FRAC_PI_2);
        let (x, y) = met.transverse();
        assert_relative_eq!(x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(y, 10.0);
    }

    #[test]
    fn test_memory_source() {
        let events = vec![dijet_event(), Event::default()];
        assert_eq!(events.n_entries(), 2);
        assert_eq!(events.read_event(1).unwrap(), Event::default());
        assert!(matches!(
            events.read_event(2),
            Err(JetFeatError::IndexOutOfRange { index: 2, .. })
        ));
    }
}
