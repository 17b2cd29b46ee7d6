//! The undirected contact graph over the population.
//!
//! The graph is built once per episode from a [`Topology`] and is immutable
//! afterwards. Adjacency lists are sorted and free of duplicates and self
//! edges. Whether an edge can carry infection also depends on the isolation
//! state of its endpoints, which `ContextNetworkExt::is_edge_active` checks.
use std::path::Path;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use crate::context::Context;
use crate::error::SimulationError;
use crate::parameters::Topology;
use crate::population::{ContextPopulationExt, PersonId};
use crate::random::ContextRandomExt;
use crate::{define_data_plugin, define_rng};

define_rng!(NetworkRng);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactGraph {
    adjacency: Vec<Vec<PersonId>>,
    edge_count: usize,
}

static EMPTY_GRAPH: ContactGraph = ContactGraph {
    adjacency: Vec::new(),
    edge_count: 0,
};

#[derive(Deserialize, Debug)]
struct EdgeRecord {
    v1: usize,
    v2: usize,
}

impl ContactGraph {
    /// Builds a graph over `population` nodes from undirected edges. Repeated
    /// edges are merged.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for a self edge or an endpoint outside
    /// the population.
    pub fn from_edges(
        population: usize,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<ContactGraph, SimulationError> {
        let mut checked = Vec::new();
        for (a, b) in edges {
            if a == b {
                return Err(SimulationError::ConfigurationError(format!(
                    "cannot make an edge from person {a} to themselves"
                )));
            }
            if a >= population || b >= population {
                return Err(SimulationError::ConfigurationError(format!(
                    "edge ({a}, {b}) refers to a person outside the population of {population}"
                )));
            }
            checked.push((a, b));
        }
        Ok(Self::build(population, checked))
    }

    // Edges passed here are already known to be in range and free of self loops.
    fn build(population: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> ContactGraph {
        let mut adjacency: Vec<Vec<PersonId>> = vec![Vec::new(); population];
        for (a, b) in edges {
            adjacency[a].push(PersonId(b));
            adjacency[b].push(PersonId(a));
        }

        let mut degree_sum = 0;
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
            neighbors.dedup();
            degree_sum += neighbors.len();
        }
        ContactGraph {
            adjacency,
            edge_count: degree_sum / 2,
        }
    }

    /// Connects every pair independently with probability
    /// `mean_degree / population`. A mean degree above `population - 1` is
    /// treated as `population - 1`.
    #[allow(clippy::cast_precision_loss)]
    pub fn random<R: Rng + ?Sized>(population: usize, mean_degree: f64, rng: &mut R) -> ContactGraph {
        let mut edges = Vec::new();
        if population > 1 {
            let mean_degree = mean_degree.min((population - 1) as f64);
            let p = (mean_degree / population as f64).clamp(0.0, 1.0);
            for a in 0..population {
                for b in (a + 1)..population {
                    if rng.random_bool(p) {
                        edges.push((a, b));
                    }
                }
            }
        }
        Self::build(population, edges)
    }

    /// Configuration model: every node gets `degree` stubs, the stubs are
    /// paired at random, and self loops and repeated edges are discarded.
    pub fn regular<R: Rng + ?Sized>(population: usize, degree: usize, rng: &mut R) -> ContactGraph {
        let mut stubs: Vec<usize> = (0..population)
            .flat_map(|node| std::iter::repeat(node).take(degree))
            .collect();
        stubs.shuffle(rng);
        let edges = stubs
            .chunks_exact(2)
            .filter(|pair| pair[0] != pair[1])
            .map(|pair| (pair[0], pair[1]));
        Self::build(population, edges)
    }

    /// Reads an edge list from a CSV file with `v1,v2` columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains an invalid edge.
    pub fn from_csv_file(population: usize, path: &Path) -> Result<ContactGraph, SimulationError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut edges = Vec::new();
        for record in reader.deserialize() {
            let record: EdgeRecord = record?;
            edges.push((record.v1, record.v2));
        }
        debug!("read {} edges from {}", edges.len(), path.display());
        Self::from_edges(population, edges)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Neighbors of `id` in increasing id order. Unknown ids have no neighbors.
    #[must_use]
    pub fn neighbors(&self, id: PersonId) -> &[PersonId] {
        self.adjacency.get(id.0).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has_edge(&self, a: PersonId, b: PersonId) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_degree(&self) -> f64 {
        if self.adjacency.is_empty() {
            return 0.0;
        }
        (2 * self.edge_count) as f64 / self.adjacency.len() as f64
    }

    /// Every edge once, as `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (PersonId, PersonId)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(a, neighbors)| {
                neighbors
                    .iter()
                    .filter(move |b| b.0 > a)
                    .map(move |b| (PersonId(a), *b))
            })
    }
}

define_data_plugin!(NetworkPlugin, Option<ContactGraph>, None);

pub trait ContextNetworkExt {
    /// Builds the contact graph of `population` nodes described by `topology`
    /// using the `NetworkRng` stream.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit or file edge list is invalid.
    fn generate_contact_graph(
        &mut self,
        population: usize,
        topology: &Topology,
    ) -> Result<(), SimulationError>;

    fn set_contact_graph(&mut self, graph: ContactGraph);

    /// The episode's contact graph; empty before one is set.
    fn get_contact_graph(&self) -> &ContactGraph;

    fn get_neighbors(&self, id: PersonId) -> &[PersonId];

    /// True when `a` and `b` are connected and neither of them is isolated.
    fn is_edge_active(&self, a: PersonId, b: PersonId) -> bool;
}

impl ContextNetworkExt for Context {
    fn generate_contact_graph(
        &mut self,
        population: usize,
        topology: &Topology,
    ) -> Result<(), SimulationError> {
        let graph = match topology {
            Topology::Random { mean_degree } => {
                self.sample(NetworkRng, |rng| {
                    ContactGraph::random(population, *mean_degree, rng)
                })
            }
            Topology::Regular { degree } => {
                self.sample(NetworkRng, |rng| ContactGraph::regular(population, *degree, rng))
            }
            Topology::Edges { edges } => ContactGraph::from_edges(population, edges.iter().copied())?,
            Topology::EdgeListFile { path } => ContactGraph::from_csv_file(population, path)?,
        };
        debug!(
            "contact graph has {} nodes, {} edges, average degree {:.2}",
            graph.node_count(),
            graph.edge_count(),
            graph.average_degree()
        );
        self.set_contact_graph(graph);
        Ok(())
    }

    fn set_contact_graph(&mut self, graph: ContactGraph) {
        *self.get_data_mut(NetworkPlugin) = Some(graph);
    }

    fn get_contact_graph(&self) -> &ContactGraph {
        self.get_data(NetworkPlugin)
            .and_then(Option::as_ref)
            .unwrap_or(&EMPTY_GRAPH)
    }

    fn get_neighbors(&self, id: PersonId) -> &[PersonId] {
        self.get_contact_graph().neighbors(id)
    }

    fn is_edge_active(&self, a: PersonId, b: PersonId) -> bool {
        if !self.get_contact_graph().has_edge(a, b) {
            return false;
        }
        let is_free = |id| {
            self.get_individual(id)
                .is_ok_and(|individual| !individual.is_isolated())
        };
        is_free(a) && is_free(b)
    }
}
