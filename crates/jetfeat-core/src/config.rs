use crate::{association::AssociationCuts, JetFeatError, JetFeatResult};

/// The largest energy-flow polynomial degree which can be requested.
///
/// Up to degree 5 every polynomial reduces to matrix products, costing at most $`O(N^3)`$ per
/// jet of $`N`$ constituents. Degree 6 adds the complete graph on four vertices, which has
/// treewidth 3 and is summed in $`O(N^4)`$.
pub const MAX_BASIS_DEGREE: usize = 6;

/// Settings for a single conversion run.
///
/// # Example
/// ```
/// use jetfeat_core::ConverterConfig;
///
/// let config = ConverterConfig::default()
///     .with_jet_radius(0.8)
///     .with_constituents(50)
///     .with_basis_degree(Some(3));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterConfig {
    /// The number of leading jets kept per event.
    pub n_jets: usize,
    /// The association radius $`\Delta R`$.
    pub jet_radius: f64,
    /// The number of constituent rows stored per jet.
    pub constituent_capacity: usize,
    /// Whether packed constituents are part of the output.
    pub save_constituents: bool,
    /// The maximum energy-flow polynomial degree, or [`None`] to skip the basis.
    pub basis_degree: Option<usize>,
    /// Per-type candidate intensity cutoffs.
    pub cuts: AssociationCuts,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            n_jets: 2,
            jet_radius: 0.5,
            constituent_capacity: 100,
            save_constituents: false,
            basis_degree: None,
            cuts: AssociationCuts::default(),
        }
    }
}

impl ConverterConfig {
    pub fn with_n_jets(mut self, n_jets: usize) -> Self {
        self.n_jets = n_jets;
        self
    }
    pub fn with_jet_radius(mut self, jet_radius: f64) -> Self {
        self.jet_radius = jet_radius;
        self
    }
    /// Save packed constituents with the given capacity per jet.
    pub fn with_constituents(mut self, capacity: usize) -> Self {
        self.constituent_capacity = capacity;
        self.save_constituents = true;
        self
    }
    pub fn with_basis_degree(mut self, basis_degree: Option<usize>) -> Self {
        self.basis_degree = basis_degree;
        self
    }
    pub fn with_cuts(mut self, cuts: AssociationCuts) -> Self {
        self.cuts = cuts;
        self
    }

    /// Check that every setting is in range.
    pub fn validate(&self) -> JetFeatResult<()> {
        if self.n_jets == 0 {
            return Err(JetFeatError::InvalidConfig {
                reason: "at least one jet must be kept per event".to_string(),
            });
        }
        if !self.jet_radius.is_finite() || self.jet_radius <= 0.0 {
            return Err(JetFeatError::InvalidConfig {
                reason: format!("jet radius must be positive, got {}", self.jet_radius),
            });
        }
        if self.save_constituents && self.constituent_capacity == 0 {
            return Err(JetFeatError::InvalidConfig {
                reason: "constituent capacity must be positive when constituents are saved"
                    .to_string(),
            });
        }
        if let Some(degree) = self.basis_degree {
            if degree > MAX_BASIS_DEGREE {
                return Err(JetFeatError::InvalidConfig {
                    reason: format!(
                        "energy-flow degree {} exceeds the maximum of {}",
                        degree, MAX_BASIS_DEGREE
                    ),
                });
            }
        }
        Ok(())
    }

    /// The number of constituent rows actually stored per jet (zero if constituents are not saved).
    pub fn stored_capacity(&self) -> usize {
        if self.save_constituents {
            self.constituent_capacity
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConverterConfig::default();
        assert_eq!(config.n_jets, 2);
        assert_eq!(config.constituent_capacity, 100);
        assert!(!config.save_constituents);
        assert_eq!(config.stored_capacity(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ConverterConfig::default()
            .with_n_jets(3)
            .with_jet_radius(0.4)
            .with_constituents(20)
            .with_basis_degree(Some(2));
        assert_eq!(config.n_jets, 3);
        assert_eq!(config.stored_capacity(), 20);
        assert_eq!(config.basis_degree, Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let bad = [
            ConverterConfig::default().with_n_jets(0),
            ConverterConfig::default().with_jet_radius(0.0),
            ConverterConfig::default().with_jet_radius(f64::NAN),
            ConverterConfig::default().with_constituents(0),
            ConverterConfig::default().with_basis_degree(Some(MAX_BASIS_DEGREE + 1)),
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(JetFeatError::InvalidConfig { .. })
            ));
        }
    }
}
