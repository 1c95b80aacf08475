use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use nalgebra::{DMatrix, DVector};
use tracing::info;

use crate::{config::MAX_BASIS_DEGREE, utils::wrap_phi, JetFeatError, JetFeatResult, Vec4};

/// A fixed-length vector of substructure observables computed from the constituents of one jet.
///
/// The length is fixed when the evaluator is constructed, so the
/// [`DatasetAssembler`](crate::assembler::DatasetAssembler) can allocate
/// `(n_jets, basis_size)` slots per event before reading any events.
pub trait BasisEvaluator {
    /// The number of values produced per jet.
    fn basis_size(&self) -> usize;
    /// Evaluate the basis on the four-momenta of a jet's constituents.
    fn evaluate(&self, constituents: &[Vec4]) -> Vec<f64>;
    /// Evaluate the basis into a slice of length [`BasisEvaluator::basis_size`].
    fn evaluate_into(&self, out: &mut [f64], constituents: &[Vec4]) {
        out.copy_from_slice(&self.evaluate(constituents));
    }
}

/// A loopless multigraph with vertices `0..n_vertices`.
///
/// Edges are stored as sorted `(a, b)` pairs with `a < b`; a repeated pair is a multi-edge.
/// The derived ordering (vertex count, then edge list) orders graphs with equal edge counts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Multigraph {
    n_vertices: usize,
    edges: Vec<(usize, usize)>,
}

impl Multigraph {
    fn single_edge() -> Self {
        Self {
            n_vertices: 2,
            edges: vec![(0, 1)],
        }
    }

    fn n_edges(&self) -> usize {
        self.edges.len()
    }

    fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.n_vertices];
        for &(a, b) in &self.edges {
            degrees[a] += 1;
            degrees[b] += 1;
        }
        degrees
    }

    fn with_edge(&self, a: usize, b: usize, n_vertices: usize) -> Self {
        let mut edges = self.edges.clone();
        edges.push((a.min(b), a.max(b)));
        edges.sort_unstable();
        Self { n_vertices, edges }
    }

    /// Every graph with one more edge which stays connected: either a new edge between existing
    /// vertices or a new vertex hanging off an existing one.
    fn extensions(&self) -> Vec<Self> {
        let n = self.n_vertices;
        let mut extended = Vec::with_capacity(n * (n + 1) / 2);
        for a in 0..n {
            for b in (a + 1)..n {
                extended.push(self.with_edge(a, b, n));
            }
            extended.push(self.with_edge(a, n, n + 1));
        }
        extended
    }

    /// The smallest edge list over all relabelings which sort vertices by descending degree.
    ///
    /// Isomorphisms preserve degrees, so two graphs are isomorphic exactly when their canonical
    /// forms are equal.
    fn canonical(&self) -> Self {
        let degrees = self.degrees();
        let mut target = degrees.clone();
        target.sort_unstable_by(|a, b| b.cmp(a));
        let mut search = CanonicalSearch {
            graph: self,
            degrees: &degrees,
            target: &target,
            relabel: vec![0; self.n_vertices],
            used: vec![false; self.n_vertices],
            best: None,
        };
        search.assign(0);
        Self {
            n_vertices: self.n_vertices,
            edges: search.best.unwrap_or_else(|| self.edges.clone()),
        }
    }
}

struct CanonicalSearch<'a> {
    graph: &'a Multigraph,
    degrees: &'a [usize],
    target: &'a [usize],
    relabel: Vec<usize>,
    used: Vec<bool>,
    best: Option<Vec<(usize, usize)>>,
}

impl CanonicalSearch<'_> {
    fn assign(&mut self, position: usize) {
        if position == self.graph.n_vertices {
            let mut edges: Vec<(usize, usize)> = self
                .graph
                .edges
                .iter()
                .map(|&(a, b)| {
                    let (a, b) = (self.relabel[a], self.relabel[b]);
                    (a.min(b), a.max(b))
                })
                .collect();
            edges.sort_unstable();
            if self.best.as_ref().map_or(true, |best| edges < *best) {
                self.best = Some(edges);
            }
            return;
        }
        for vertex in 0..self.graph.n_vertices {
            if !self.used[vertex] && self.degrees[vertex] == self.target[position] {
                self.used[vertex] = true;
                self.relabel[vertex] = position;
                self.assign(position + 1);
                self.used[vertex] = false;
            }
        }
    }
}

/// All connected multigraphs with `1..=max_degree` edges, up to isomorphism, ordered by edge
/// count, then vertex count, then canonical edge list.
fn connected_multigraphs(max_degree: usize) -> Vec<Multigraph> {
    let mut graphs = Vec::new();
    if max_degree == 0 {
        return graphs;
    }
    let mut current = BTreeSet::from([Multigraph::single_edge()]);
    for degree in 1..=max_degree {
        let next = if degree < max_degree {
            current
                .iter()
                .flat_map(Multigraph::extensions)
                .map(|graph| graph.canonical())
                .collect()
        } else {
            BTreeSet::new()
        };
        graphs.extend(current);
        current = next;
    }
    graphs
}

/// A basis element: the product of connected graphs (indices into the connected list). The empty
/// product is the constant degree-zero element.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BasisElement {
    n_edges: usize,
    n_vertices: usize,
    components: Vec<usize>,
}

fn collect_products(
    graphs: &[Multigraph],
    start: usize,
    remaining: usize,
    current: &mut Vec<usize>,
    elements: &mut Vec<BasisElement>,
) {
    for (index, graph) in graphs.iter().enumerate().skip(start) {
        if graph.n_edges() > remaining {
            break;
        }
        current.push(index);
        elements.push(BasisElement {
            n_edges: current.iter().map(|&i| graphs[i].n_edges()).sum(),
            n_vertices: current.iter().map(|&i| graphs[i].n_vertices).sum(),
            components: current.clone(),
        });
        collect_products(graphs, index, remaining - graph.n_edges(), current, elements);
        current.pop();
    }
}

/// Constituent weights $`z_i = p_{T,i} / \sum_j p_{T,j}`$ and pairwise angles
/// $`\theta_{ij} = \sqrt{\Delta y_{ij}^2 + \Delta\phi_{ij}^2}`$.
struct Measure {
    z: DVector<f64>,
    theta: DMatrix<f64>,
}

impl Measure {
    fn new(constituents: &[Vec4]) -> Option<Self> {
        let particles: Vec<&Vec4> = constituents.iter().filter(|p4| p4.pt() > 0.0).collect();
        let sum_pt: f64 = particles.iter().map(|p4| p4.pt()).sum();
        if particles.is_empty() || sum_pt <= 0.0 {
            return None;
        }
        let z = DVector::from_iterator(particles.len(), particles.iter().map(|p4| p4.pt() / sum_pt));
        let rapidities: Vec<f64> = particles.iter().map(|p4| p4.rapidity()).collect();
        let phis: Vec<f64> = particles.iter().map(|p4| p4.phi()).collect();
        let theta = DMatrix::from_fn(particles.len(), particles.len(), |i, j| {
            let dy = rapidities[i] - rapidities[j];
            let dphi = wrap_phi(phis[i] - phis[j]);
            (dy * dy + dphi * dphi).sqrt()
        });
        Some(Self { z, theta })
    }
}

/// A graph being contracted. Each live vertex carries a weight vector over particles and each
/// adjacent pair `(a, b)` with `a < b` carries a matrix with rows indexed by `a`'s particle.
struct Contraction {
    weights: Vec<Option<DVector<f64>>>,
    links: BTreeMap<(usize, usize), DMatrix<f64>>,
}

impl Contraction {
    fn new(graph: &Multigraph, measure: &Measure) -> Self {
        let mut contraction = Self {
            weights: vec![Some(measure.z.clone()); graph.n_vertices],
            links: BTreeMap::new(),
        };
        for &(a, b) in &graph.edges {
            contraction.put_link(a, b, measure.theta.clone());
        }
        contraction
    }

    /// Attach a link, multiplying elementwise into any link already joining the pair.
    fn put_link(&mut self, a: usize, b: usize, matrix: DMatrix<f64>) {
        let (key, matrix) = if a < b {
            ((a, b), matrix)
        } else {
            ((b, a), matrix.transpose())
        };
        match self.links.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().component_mul_assign(&matrix),
            Entry::Vacant(entry) => {
                entry.insert(matrix);
            }
        }
    }

    /// Remove a link, oriented so rows belong to `a`.
    fn take_link(&mut self, a: usize, b: usize) -> Option<DMatrix<f64>> {
        if a < b {
            self.links.remove(&(a, b))
        } else {
            self.links.remove(&(b, a)).map(|m| m.transpose())
        }
    }

    fn neighbors(&self, vertex: usize) -> Vec<usize> {
        self.links
            .keys()
            .filter_map(|&(a, b)| {
                if a == vertex {
                    Some(b)
                } else if b == vertex {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    fn live_vertices(&self) -> Vec<usize> {
        (0..self.weights.len())
            .filter(|&v| self.weights[v].is_some())
            .collect()
    }

    /// Fold a vertex with a single neighbor into that neighbor's weights.
    fn eliminate_leaf(&mut self, leaf: usize, parent: usize) -> Option<()> {
        let link = self.take_link(parent, leaf)?;
        let leaf_weights = self.weights[leaf].take()?;
        let folded = link * leaf_weights;
        self.weights[parent].as_mut()?.component_mul_assign(&folded);
        Some(())
    }

    /// Replace a vertex with exactly two neighbors by a single link between them.
    fn eliminate_series(&mut self, vertex: usize, a: usize, b: usize) -> Option<()> {
        let mut left = self.take_link(a, vertex)?;
        let right = self.take_link(vertex, b)?;
        let weights = self.weights[vertex].take()?;
        for (mut column, w) in left.column_iter_mut().zip(weights.iter()) {
            column *= *w;
        }
        self.put_link(a, b, left * right);
        Some(())
    }

    /// Explicit sum over every assignment of particles to the remaining vertices, costing
    /// $`O(N^k)`$ for a core of `k` vertices. Only the four-vertex complete graph reaches this
    /// point for degrees up to [`MAX_BASIS_DEGREE`].
    fn exhaustive_sum(&self, vertices: &[usize]) -> f64 {
        let n_particles = self.weights[vertices[0]]
            .as_ref()
            .map_or(0, |w| w.len());
        let position: BTreeMap<usize, usize> =
            vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let weights: Vec<&DVector<f64>> = vertices
            .iter()
            .filter_map(|&v| self.weights[v].as_ref())
            .collect();
        let links: Vec<(usize, usize, &DMatrix<f64>)> = self
            .links
            .iter()
            .map(|(&(a, b), m)| (position[&a], position[&b], m))
            .collect();
        let mut assignment = vec![0; vertices.len()];
        let mut total = 0.0;
        loop {
            let mut term: f64 = weights
                .iter()
                .zip(&assignment)
                .map(|(w, &i)| w[i])
                .product();
            for &(a, b, m) in &links {
                term *= m[(assignment[a], assignment[b])];
            }
            total += term;
            // odometer increment
            let mut digit = 0;
            loop {
                if digit == assignment.len() {
                    return total;
                }
                assignment[digit] += 1;
                if assignment[digit] < n_particles {
                    break;
                }
                assignment[digit] = 0;
                digit += 1;
            }
        }
    }

    /// Contract the whole graph to a single number.
    ///
    /// Leaves and degree-two vertices are removed first, which reduces trees to weighted sums
    /// and single cycles to a matrix trace. Whatever core survives is summed explicitly.
    fn value(mut self) -> f64 {
        loop {
            let live = self.live_vertices();
            if live.len() == 1 {
                return self.weights[live[0]].as_ref().map_or(0.0, |w| w.sum());
            }
            let reducible = live.iter().find_map(|&v| {
                let neighbors = self.neighbors(v);
                (neighbors.len() <= 2).then_some((v, neighbors))
            });
            let reduced = match reducible {
                Some((v, neighbors)) => match neighbors[..] {
                    [parent] => self.eliminate_leaf(v, parent),
                    [a, b] => self.eliminate_series(v, a, b),
                    _ => None,
                },
                None => return self.exhaustive_sum(&live),
            };
            if reduced.is_none() {
                return 0.0;
            }
        }
    }
}

/// The energy-flow polynomials of all multigraphs with at most `max_degree` edges, including the
/// empty graph (the constant `1` of a normalized measure) as element `0`.
///
/// For a graph $`G`$ with vertices $`V`$ and edges $`E`$,
/// ```math
/// \text{EFP}_G = \sum_{i_1 \ldots i_{|V|}} z_{i_1} \cdots z_{i_{|V|}} \prod_{(k,l) \in E} \theta_{i_k i_l}
/// ```
/// with $`z_i = p_{T,i} / \sum_j p_{T,j}`$ and $`\theta_{ij}`$ the rapidity-azimuth distance
/// ($`\beta = 1`$). Disconnected graphs are products of their connected components.
///
/// Elements are ordered by edge count, then vertex count, then canonical graph form.
#[derive(Debug, Clone)]
pub struct EnergyFlowBasis {
    max_degree: usize,
    graphs: Vec<Multigraph>,
    elements: Vec<BasisElement>,
}

impl EnergyFlowBasis {
    /// Enumerate the basis for polynomials of degree `d <= max_degree`.
    pub fn new(max_degree: usize) -> JetFeatResult<Self> {
        if max_degree > MAX_BASIS_DEGREE {
            return Err(JetFeatError::InvalidConfig {
                reason: format!(
                    "energy-flow degree {} exceeds the maximum of {}",
                    max_degree, MAX_BASIS_DEGREE
                ),
            });
        }
        let graphs = connected_multigraphs(max_degree);
        let mut elements = vec![BasisElement {
            n_edges: 0,
            n_vertices: 0,
            components: Vec::new(),
        }];
        collect_products(&graphs, 0, max_degree, &mut Vec::new(), &mut elements);
        elements.sort_by(|a, b| {
            (a.n_edges, a.n_vertices, &a.components).cmp(&(b.n_edges, b.n_vertices, &b.components))
        });
        info!(
            "Created energy-flow basis with degree d <= {} ({} polynomials, {} connected)",
            max_degree,
            elements.len(),
            graphs.len()
        );
        Ok(Self {
            max_degree,
            graphs,
            elements,
        })
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

}

impl BasisEvaluator for EnergyFlowBasis {
    fn basis_size(&self) -> usize {
        self.elements.len()
    }

    /// Jets without any constituent of positive $`p_T`$ give all zeros, constant included.
    fn evaluate(&self, constituents: &[Vec4]) -> Vec<f64> {
        let Some(measure) = Measure::new(constituents) else {
            return vec![0.0; self.elements.len()];
        };
        let connected: Vec<f64> = self
            .graphs
            .iter()
            .map(|graph| Contraction::new(graph, &measure).value())
            .collect();
        self.elements
            .iter()
            .map(|element| element.components.iter().map(|&i| connected[i]).product())
            .collect()
    }
}
