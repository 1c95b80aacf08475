use crate::{Vec4, SENTINEL};

/// Names of the per-constituent fields, in emitted order.
pub const JET_CONSTITUENT_NAMES: [&str; 5] = ["Eta", "Phi", "PT", "Rapidity", "Energy"];

/// The number of fields per packed constituent.
pub const N_CONSTITUENT_FIELDS: usize = JET_CONSTITUENT_NAMES.len();

/// The row `[η, φ, pT, y, E]` of a single constituent.
pub fn constituent_row(p4: &Vec4) -> [f64; N_CONSTITUENT_FIELDS] {
    [p4.eta(), p4.phi(), p4.pt(), p4.rapidity(), p4.e()]
}

/// Pack constituents into a flat, row-major `(capacity, 5)` slice.
///
/// Constituents are ordered by descending $`p_T`$ (stable, so ties keep their association
/// order) and only the leading `capacity` are kept. Unused rows are filled with [`SENTINEL`].
///
/// # Panics
///
/// Panics if `out` is not exactly `capacity * 5` long.
pub fn pack_into(out: &mut [f64], constituents: &[Vec4], capacity: usize) {
    assert_eq!(out.len(), capacity * N_CONSTITUENT_FIELDS);
    let mut ordered: Vec<&Vec4> = constituents.iter().collect();
    ordered.sort_by(|a, b| b.pt().total_cmp(&a.pt()));
    let mut rows = out.chunks_exact_mut(N_CONSTITUENT_FIELDS);
    for (p4, row) in ordered.into_iter().zip(rows.by_ref()) {
        row.copy_from_slice(&constituent_row(p4));
    }
    for row in rows {
        row.fill(SENTINEL);
    }
}

/// Pack constituents into a new `(capacity, 5)` array, see [`pack_into`].
pub fn pack_constituents(constituents: &[Vec4], capacity: usize) -> Vec<f64> {
    let mut out = vec![SENTINEL; capacity * N_CONSTITUENT_FIELDS];
    pack_into(&mut out, constituents, capacity);
    out
}
