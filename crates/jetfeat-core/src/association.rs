use crate::{
    data::{Candidate, CandidateKind, Event, Jet},
    Vec4,
};

/// Minimum intensities a candidate must exceed to be considered for association.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationCuts {
    /// Minimum track $`p_T`$.
    pub track_min_pt: f64,
    /// Minimum neutral-hadron $`E_T`$.
    pub neutral_hadron_min_et: f64,
    /// Minimum photon $`E_T`$.
    pub photon_min_et: f64,
}

impl Default for AssociationCuts {
    fn default() -> Self {
        Self {
            track_min_pt: 0.1,
            neutral_hadron_min_et: 0.5,
            photon_min_et: 0.2,
        }
    }
}

impl AssociationCuts {
    /// The cutoff for a given candidate type.
    pub fn cutoff(&self, kind: CandidateKind) -> f64 {
        match kind {
            CandidateKind::Track => self.track_min_pt,
            CandidateKind::NeutralHadron => self.neutral_hadron_min_et,
            CandidateKind::Photon => self.photon_min_et,
        }
    }
    /// Whether the candidate's intensity is strictly above its type's cutoff.
    pub fn passes(&self, candidate: &Candidate) -> bool {
        candidate.intensity > self.cutoff(candidate.kind)
    }
}

/// Associate the candidates of an [`Event`] to the given jets.
///
/// Candidates are visited tracks first, then neutral hadrons, then photons, each in source order.
/// A candidate passing its cutoff is appended to every jet within `radius` of it, so overlapping
/// jets may share constituents. The returned lists are index-aligned with `jets`.
pub fn associate(
    jets: &[Jet],
    event: &Event,
    cuts: &AssociationCuts,
    radius: f64,
) -> Vec<Vec<Vec4>> {
    let mut constituents = vec![Vec::new(); jets.len()];
    let radius2 = radius * radius;
    for collection in event.candidate_collections() {
        for candidate in collection.iter().filter(|c| cuts.passes(c)) {
            for (jet, jet_constituents) in jets.iter().zip(constituents.iter_mut()) {
                if within_radius(&jet.p4, &candidate.p4, radius2) {
                    jet_constituents.push(candidate.p4);
                }
            }
        }
    }
    constituents
}

fn within_radius(jet: &Vec4, candidate: &Vec4, radius2: f64) -> bool {
    let deta = candidate.eta() - jet.eta();
    let dphi = jet.delta_phi(candidate);
    deta * deta + dphi * dphi < radius2
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::tests::{dijet_event, jet, tower, track};

    #[test]
    fn test_default_cuts() {
        let cuts = AssociationCuts::default();
        assert_relative_eq!(cuts.cutoff(CandidateKind::Track), 0.1);
        assert_relative_eq!(cuts.cutoff(CandidateKind::NeutralHadron), 0.5);
        assert_relative_eq!(cuts.cutoff(CandidateKind::Photon), 0.2);
    }

    #[test]
    fn test_cutoff_is_strict() {
        let cuts = AssociationCuts::default();
        assert!(!cuts.passes(&track(0.1, 0.0, 0.0)));
        assert!(cuts.passes(&track(0.1001, 0.0, 0.0)));
        assert!(!cuts.passes(&tower(CandidateKind::NeutralHadron, 0.5, 0.0, 0.0)));
        assert!(cuts.passes(&tower(CandidateKind::Photon, 0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_dijet_association() {
        let event = dijet_event();
        let constituents = associate(&event.jets, &event, &AssociationCuts::default(), 0.5);
        assert_eq!(constituents.len(), 2);
        // two tracks + one neutral hadron near the leading jet
        assert_eq!(constituents[0].len(), 3);
        assert_eq!(constituents[0][0], event.tracks[0].p4);
        assert_eq!(constituents[0][1], event.tracks[1].p4);
        assert_eq!(constituents[0][2], event.neutral_hadrons[0].p4);
        // one track + one photon near the subleading jet
        assert_eq!(constituents[1].len(), 2);
        assert_eq!(constituents[1][0], event.tracks[3].p4);
        assert_eq!(constituents[1][1], event.photons[0].p4);
    }

    #[test]
    fn test_candidates_below_cutoff_never_associated() {
        let event = dijet_event();
        let constituents = associate(&event.jets, &event, &AssociationCuts::default(), 10.0);
        let soft = [event.tracks[2].p4, event.neutral_hadrons[1].p4];
        for jet_constituents in &constituents {
            for p4 in &soft {
                assert!(!jet_constituents.contains(p4));
            }
        }
    }

    #[test]
    fn test_overlapping_jets_share_candidates() {
        let jets = [jet(50.0, 0.0, 0.0, 5.0), jet(40.0, 0.2, 0.1, 4.0)];
        let event = Event {
            jets: jets.to_vec(),
            tracks: vec![track(10.0, 0.1, 0.05)],
            ..Default::default()
        };
        let constituents = associate(&jets, &event, &AssociationCuts::default(), 0.4);
        assert_eq!(constituents[0].len(), 1);
        assert_eq!(constituents[1].len(), 1);
    }

    #[test]
    fn test_association_wraps_azimuth() {
        let jets = [jet(50.0, 0.0, 3.1, 5.0)];
        let event = Event {
            jets: jets.to_vec(),
            tracks: vec![track(10.0, 0.0, -3.1)],
            ..Default::default()
        };
        let constituents = associate(&jets, &event, &AssociationCuts::default(), 0.4);
        assert_eq!(constituents[0].len(), 1);
    }

    #[test]
    fn test_no_jets_no_constituents() {
        let event = dijet_event();
        let constituents = associate(&[], &event, &AssociationCuts::default(), 0.5);
        assert!(constituents.is_empty());
    }
}
