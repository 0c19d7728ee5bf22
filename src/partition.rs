//! Element-to-process assignment.
use crate::elem::{Elem, FaceNeighbor};
use crate::reorder::cuthill_mckee;
use log::debug;
use nalgebra_sparse::pattern::SparsityPattern;
use serde::{Deserialize, Serialize};

/// The rank of the local process within the group of processes sharing a mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessGroup {
    rank: usize,
    size: usize,
}

impl Default for ProcessGroup {
    fn default() -> Self {
        Self::serial()
    }
}

impl ProcessGroup {
    pub fn new(rank: usize, size: usize) -> Self {
        assert!(size > 0, "A process group must contain at least one process.");
        assert!(rank < size, "Rank {rank} is out of range for a group of {size} processes.");
        Self { rank, size }
    }

    pub fn serial() -> Self {
        Self { rank: 0, size: 1 }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Assigns elements to processes, given the dual graph of the mesh.
pub trait ElementPartitioner {
    /// Returns the process of every element. `num_parts` is always at least 2.
    fn partition(&self, dual_graph: &SparsityPattern, num_parts: usize) -> Vec<usize>;
}

/// Orders the dual graph by Cuthill-McKee and cuts the ordering into contiguous blocks whose
/// sizes differ by at most one element.
#[derive(Debug, Copy, Clone, Default)]
pub struct DualGraphPartitioner;

impl ElementPartitioner for DualGraphPartitioner {
    fn partition(&self, dual_graph: &SparsityPattern, num_parts: usize) -> Vec<usize> {
        let num_elements = dual_graph.major_dim();
        let ordering = cuthill_mckee(dual_graph);

        let base = num_elements / num_parts;
        let remainder = num_elements % num_parts;
        let mut partition = vec![0; num_elements];
        let mut position = 0;
        for part in 0..num_parts {
            let block_size = base + usize::from(part < remainder);
            for &iel in &ordering.perm()[position..position + block_size] {
                partition[iel] = part;
            }
            position += block_size;
        }
        partition
    }
}

/// A precomputed assignment, for instance produced by an external graph partitioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPartition(pub Vec<usize>);

impl ElementPartitioner for FixedPartition {
    fn partition(&self, _dual_graph: &SparsityPattern, _num_parts: usize) -> Vec<usize> {
        self.0.clone()
    }
}

/// Face-sharing adjacency of the elements, without self-loops.
pub fn dual_graph(elem: &Elem) -> SparsityPattern {
    let num_elements = elem.num_elements();
    let mut offsets = Vec::with_capacity(num_elements + 1);
    let mut indices = Vec::new();
    offsets.push(0);
    for iel in 0..num_elements {
        let mut neighbors: Vec<usize> = elem
            .face_neighbors(iel)
            .iter()
            .filter_map(|neighbor| match neighbor {
                FaceNeighbor::Element(jel) => Some(*jel),
                FaceNeighbor::Boundary(_) => None,
            })
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        indices.extend(neighbors);
        offsets.push(indices.len());
    }
    SparsityPattern::try_from_offsets_and_indices(num_elements, num_elements, offsets, indices)
        .expect("Internal error: Dual graph must be a valid sparsity pattern.")
}

/// Partitions the elements of `elem` into `num_parts` parts.
///
/// A single part is the trivial partition and does not invoke the partitioner.
///
/// # Panics
///
/// Panics if the partitioner returns an assignment of the wrong length or with entries
/// outside `0..num_parts`.
pub fn partition_elements(elem: &Elem, partitioner: &dyn ElementPartitioner, num_parts: usize) -> Vec<usize> {
    assert!(num_parts > 0, "Cannot partition into zero parts.");
    if num_parts == 1 {
        return vec![0; elem.num_elements()];
    }

    let partition = partitioner.partition(&dual_graph(elem), num_parts);
    assert_eq!(
        partition.len(),
        elem.num_elements(),
        "Partitioner must assign every element to a process."
    );
    if let Some(&invalid) = partition.iter().find(|&&part| part >= num_parts) {
        panic!("Partitioner assigned an element to part {invalid}, but only {num_parts} parts exist.");
    }

    let mut counts = vec![0; num_parts];
    for &part in &partition {
        counts[part] += 1;
    }
    debug!("Partitioned {} elements into {:?}", elem.num_elements(), counts);
    partition
}
