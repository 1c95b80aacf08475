use crate::{
    data::{Jet, MissingEt},
    shapes::JetShape,
    SENTINEL,
};

/// Names of the per-jet features, in emitted order.
pub const JET_FEATURE_NAMES: [&str; 9] = [
    "Eta",
    "Phi",
    "Pt",
    "M",
    "ChargedFraction",
    "PTD",
    "Axis2",
    "Flavor",
    "Energy",
];

/// Names of the per-event features, in emitted order.
pub const EVENT_FEATURE_NAMES: [&str; 5] = ["MET", "METEta", "METPhi", "Mjj", "MT"];

/// The number of features per jet.
pub const N_JET_FEATURES: usize = JET_FEATURE_NAMES.len();
/// The number of features per event.
pub const N_EVENT_FEATURES: usize = EVENT_FEATURE_NAMES.len();

/// The fraction of charged constituents, or [`SENTINEL`] if the jet has none at all.
pub fn charged_fraction(n_charged: u32, n_neutral: u32) -> f64 {
    let n_total = n_charged as f64 + n_neutral as f64;
    if n_total > 0.0 {
        n_charged as f64 / n_total
    } else {
        SENTINEL
    }
}

/// The feature vector `[η, φ, pT, M, chargedFraction, ptD, axis2, flavor, E]` of a jet.
///
/// The multiplicities come in explicitly so that the fraction never depends on which jet of
/// which event happens to be loaded elsewhere.
pub fn jet_features(jet: &Jet, shape: &JetShape) -> [f64; N_JET_FEATURES] {
    let p4 = &jet.p4;
    [
        p4.eta(),
        p4.phi(),
        p4.pt(),
        p4.m(),
        charged_fraction(jet.n_charged, jet.n_neutral),
        shape.ptd,
        shape.axis2,
        jet.flavor as f64,
        p4.e(),
    ]
}

/// The feature vector of a jet slot with no jet in it.
pub fn missing_jet_features() -> [f64; N_JET_FEATURES] {
    [SENTINEL; N_JET_FEATURES]
}

/// The dijet invariant mass and missing-energy-aware transverse mass of the two leading jets.
///
/// ```math
/// M_T = \sqrt{M_{jj}^2 + 2\left(\sqrt{M_{jj}^2 + p_{T,jj}^2}\,E_T^{miss} - \vec{p}_{T,jj}\cdot\vec{E}_T^{miss}\right)}
/// ```
/// Returns [`None`] if fewer than two jets are given.
pub fn dijet_masses(jets: &[Jet], missing_et: &MissingEt) -> Option<(f64, f64)> {
    let [jet0, jet1, ..] = jets else {
        return None;
    };
    let dijet = jet0.p4 + jet1.p4;
    let mjj = dijet.m();
    let mjj2 = mjj * mjj;
    let ptjj = dijet.pt();
    let (metx, mety) = missing_et.transverse();
    let pt_met = dijet.px() * metx + dijet.py() * mety;
    let mt2 = mjj2 + 2.0 * ((mjj2 + ptjj * ptjj).sqrt() * missing_et.met - pt_met);
    Some((mjj, mt2.max(0.0).sqrt()))
}

/// The feature vector `[MET, METη, METφ, Mjj, MT]` of an event.
///
/// With fewer than two jets the missing-energy fields are still filled and `Mjj` and `MT` are
/// [`SENTINEL`].
pub fn event_features(jets: &[Jet], missing_et: &MissingEt) -> [f64; N_EVENT_FEATURES] {
    let (mjj, mt) = dijet_masses(jets, missing_et).unwrap_or((SENTINEL, SENTINEL));
    [missing_et.met, missing_et.eta, missing_et.phi, mjj, mt]
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{tests::jet, Vec4};

    #[test]
    fn test_charged_fraction() {
        assert_eq!(charged_fraction(0, 0), SENTINEL);
        assert_relative_eq!(charged_fraction(3, 1), 0.75);
        assert_relative_eq!(charged_fraction(0, 4), 0.0);
        assert_relative_eq!(charged_fraction(5, 0), 1.0);
    }

    #[test]
    fn test_jet_feature_order() {
        let mut j = jet(100.0, 1.0, 0.5, 10.0);
        j.flavor = 21;
        j.n_charged = 2;
        j.n_neutral = 2;
        let shape = JetShape {
            ptd: 0.4,
            axis2: 0.03,
        };
        let features = jet_features(&j, &shape);
        assert_relative_eq!(features[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(features[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(features[2], 100.0, epsilon = 1e-9);
        assert_relative_eq!(features[3], 10.0, epsilon = 1e-8);
        assert_relative_eq!(features[4], 0.5);
        assert_relative_eq!(features[5], 0.4);
        assert_relative_eq!(features[6], 0.03);
        assert_relative_eq!(features[7], 21.0);
        assert_relative_eq!(features[8], j.p4.e());
    }

    #[test]
    fn test_dijet_event_features() {
        let jets = [jet(100.0, 1.0, 0.0, 10.0), jet(80.0, -1.0, 0.1, 8.0)];
        let met = MissingEt::new(50.0, 0.1, 0.2);
        let features = event_features(&jets, &met);
        assert_relative_eq!(features[0], 50.0);
        assert_relative_eq!(features[1], 0.1);
        assert_relative_eq!(features[2], 0.2);

        // independent computation of the dijet system
        let p0 = Vec4::from_pt_eta_phi_m(100.0, 1.0, 0.0, 10.0);
        let p1 = Vec4::from_pt_eta_phi_m(80.0, -1.0, 0.1, 8.0);
        let e = p0.e() + p1.e();
        let px = p0.px() + p1.px();
        let py = p0.py() + p1.py();
        let pz = p0.pz() + p1.pz();
        let mjj = (e * e - px * px - py * py - pz * pz).sqrt();
        assert_relative_eq!(features[3], mjj, max_relative = 1e-6);

        let ptjj2 = px * px + py * py;
        let pt_met = px * 50.0 * 0.2_f64.cos() + py * 50.0 * 0.2_f64.sin();
        let mt = (mjj * mjj + 2.0 * ((mjj * mjj + ptjj2).sqrt() * 50.0 - pt_met)).sqrt();
        assert_relative_eq!(features[4], mt, max_relative = 1e-6);
        assert!(features[4] >= features[3]);
    }

    #[test]
    fn test_under_populated_event_features() {
        let met = MissingEt::new(20.0, -0.3, 1.2);
        let features = event_features(&[jet(40.0, 0.0, 0.0, 4.0)], &met);
        assert_eq!(features, [20.0, -0.3, 1.2, SENTINEL, SENTINEL]);
        let features = event_features(&[], &met);
        assert_eq!(features, [20.0, -0.3, 1.2, SENTINEL, SENTINEL]);
    }

    #[test]
    fn test_missing_jet_features() {
        assert!(missing_jet_features().iter().all(|&v| v == SENTINEL));
    }
}
