use core::fmt;
use nalgebra_sparse::pattern::SparsityPattern;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::error::Error;
use std::marker::PhantomData;

/// A representation of an index permutation.
///
/// More precisely, given `n` objects stored contiguously, the permutation internally
/// stores a permutation array `perm` such that for *target index* `i` in `0 .. n`,
/// the corresponding *source index* is given by
///
/// ```ignore
/// target[i] = source[perm[i]]
/// ```
///
/// The inverse map (source index to target index) is stored alongside, since relabelling
/// connectivity needs it as often as reordering storage needs the forward map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permutation {
    perm: Vec<usize>,
    inverse: Vec<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidPermutation {
    marker: PhantomData<()>,
}

impl fmt::Display for InvalidPermutation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid permutation")
    }
}

impl Error for InvalidPermutation {}

fn invert(perm: &[usize]) -> Result<Vec<usize>, InvalidPermutation> {
    let mut inverse = vec![usize::MAX; perm.len()];
    for (target_idx, &source_idx) in perm.iter().enumerate() {
        match inverse.get_mut(source_idx) {
            Some(entry) if *entry == usize::MAX => *entry = target_idx,
            _ => {
                return Err(InvalidPermutation {
                    marker: PhantomData,
                })
            }
        }
    }
    Ok(inverse)
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Self {
            perm: (0..n).collect(),
            inverse: (0..n).collect(),
        }
    }

    /// Creates a permutation from the source index of every target index.
    pub fn from_vec(perm: Vec<usize>) -> Result<Self, InvalidPermutation> {
        let inverse = invert(&perm)?;
        Ok(Self { perm, inverse })
    }

    /// Creates a permutation from the *new* (target) index of every *old* (source) index.
    pub fn from_old_to_new(old_to_new: Vec<usize>) -> Result<Self, InvalidPermutation> {
        let perm = invert(&old_to_new)?;
        Ok(Self {
            perm,
            inverse: old_to_new,
        })
    }

    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// The new index of every old index.
    pub fn old_to_new(&self) -> &[usize] {
        &self.inverse
    }


    pub fn source_index(&self, target_index: usize) -> usize {
        self.perm[target_index]
    }

    pub fn target_index(&self, source_index: usize) -> usize {
        self.inverse[source_index]
    }

    pub fn inverse(&self) -> Permutation {
        Self {
            perm: self.inverse.clone(),
            inverse: self.perm.clone(),
        }
    }

    /// Returns the permutation equivalent to applying `self` first and `next` afterwards.
    pub fn then(&self, next: &Permutation) -> Permutation {
        assert_eq!(self.len(), next.len(), "Permutations must have the same size.");
        let perm = next
            .perm()
            .iter()
            .map(|&intermediate| self.perm[intermediate])
            .collect();
        Self::from_vec(perm).expect("Internal error: Composition of permutations must be a permutation.")
    }

    pub fn apply_to_slice<T: Clone>(&self, slice: &[T]) -> Vec<T> {
        assert_eq!(slice.len(), self.len(), "Slice and permutation must have the same size.");
        self.perm()
            .iter()
            .map(|source_idx| slice[*source_idx].clone())
            .collect()
    }
}

/// Create a vertex permutation for a sparse symmetric matrix using the Cuthill-McKee algorithm.
pub fn cuthill_mckee(sparsity_pattern: &SparsityPattern) -> Permutation {
    assert_eq!(
        sparsity_pattern.major_dim(),
        sparsity_pattern.minor_dim(),
        "Matrix must be square."
    );

    let adjacent_vertices = |vertex_idx| sparsity_pattern.lane(vertex_idx);
    let vertex_degree = |vertex_idx| adjacent_vertices(vertex_idx).len();

    let mut queue = VecDeque::new();
    let mut permutation = Vec::with_capacity(sparsity_pattern.major_dim());
    let mut visited = vec![false; sparsity_pattern.major_dim()];

    let mut adjacency_workspace = Vec::new();

    // Disconnected graphs are handled by restarting from the least-degree vertex
    // among those not yet visited.
    while visited.iter().any(|entry| !entry) {
        let least_degree_vertex = (0..sparsity_pattern.major_dim())
            .filter(|vertex_idx| !visited[*vertex_idx])
            .min_by_key(|vertex_idx| vertex_degree(*vertex_idx));

        if let Some(start_vertex) = least_degree_vertex {
            queue.push_back(start_vertex);
            visited[start_vertex] = true;

            while let Some(vertex) = queue.pop_front() {
                adjacency_workspace.clear();
                adjacency_workspace.extend(adjacent_vertices(vertex));
                adjacency_workspace.sort_by_key(|idx| vertex_degree(*idx));

                permutation.push(vertex);

                // Breadth-first search, visiting neighbors from lowest to highest degree
                for &adjacent_vertex in &adjacency_workspace {
                    if !visited[adjacent_vertex] {
                        visited[adjacent_vertex] = true;
                        queue.push_back(adjacent_vertex);
                    }
                }
            }
        }
    }

    assert_eq!(
        permutation.len(),
        sparsity_pattern.major_dim(),
        "Internal error: Permutation has invalid length"
    );
    Permutation::from_vec(permutation).expect("Internal error: Constructed permutation is invalid")
}
