//! Process-contiguous numbering of the five dof families.
//!
//! The biquadratic family is the master numbering: after [`DofMap::build`] the node indices of
//! the connectivity *are* biquadratic dofs. The linear and quadratic families are derived from
//! it, and the element-based families are laid out from the element offsets.
use crate::elem::Elem;
use crate::reorder::Permutation;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;

/// A dof family ("solution type").
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SolutionType {
    Linear,
    Quadratic,
    Biquadratic,
    /// Piecewise constant, one dof per element.
    Constant,
    /// Piecewise linear discontinuous, `dim + 1` dofs per element.
    LinearDiscontinuous,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidSolutionType(pub usize);

impl fmt::Display for InvalidSolutionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid solution type {} (expected 0..5)", self.0)
    }
}

impl std::error::Error for InvalidSolutionType {}

impl SolutionType {
    pub const ALL: [SolutionType; 5] = [
        Self::Linear,
        Self::Quadratic,
        Self::Biquadratic,
        Self::Constant,
        Self::LinearDiscontinuous,
    ];

    pub const LAGRANGE: [SolutionType; 3] = [Self::Linear, Self::Quadratic, Self::Biquadratic];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_lagrange(self) -> bool {
        self.index() < 3
    }
}

impl TryFrom<usize> for SolutionType {
    type Error = InvalidSolutionType;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::ALL.get(index).copied().ok_or(InvalidSolutionType(index))
    }
}

/// Ownership ranges and ghost lists of one dof family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofLayout {
    family: SolutionType,
    offsets: Vec<usize>,
    original_own_sizes: Vec<usize>,
    ghosts: Vec<Vec<usize>>,
    owned_ghosts: BTreeMap<usize, usize>,
}

impl DofLayout {
    pub fn family(&self) -> SolutionType {
        self.family
    }

    pub fn num_processes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of dofs over all processes.
    pub fn total(&self) -> usize {
        self.offsets[self.num_processes()]
    }

    /// The monotone offset table, with `num_processes() + 1` entries.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn offset(&self, process: usize) -> usize {
        self.offsets[process]
    }

    pub fn owned_range(&self, process: usize) -> Range<usize> {
        self.offsets[process]..self.offsets[process + 1]
    }

    pub fn own_size(&self, process: usize) -> usize {
        self.offsets[process + 1] - self.offsets[process]
    }

    /// Owned size before owned ghosts were appended. Equal to [`Self::own_size`] for every
    /// family but the linear and quadratic ones.
    pub fn original_own_size(&self, process: usize) -> usize {
        self.original_own_sizes[process]
    }

    /// Dofs referenced by elements of `process` but owned by another process.
    pub fn ghosts(&self, process: usize) -> &[usize] {
        &self.ghosts[process]
    }

    /// Dof of a biquadratic node that was numbered as an owned ghost in this family.
    pub fn owned_ghost(&self, biquadratic_node: usize) -> Option<usize> {
        self.owned_ghosts.get(&biquadratic_node).copied()
    }

    pub fn owned_ghosts(&self) -> &BTreeMap<usize, usize> {
        &self.owned_ghosts
    }

    fn element_based(family: SolutionType, own_sizes: &[usize]) -> Self {
        let offsets = offsets_from_sizes(own_sizes);
        Self {
            family,
            offsets,
            original_own_sizes: own_sizes.to_vec(),
            ghosts: vec![Vec::new(); own_sizes.len()],
            owned_ghosts: BTreeMap::new(),
        }
    }
}

fn offsets_from_sizes(sizes: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(sizes.len() + 1);
    offsets.push(0);
    let mut sum = 0;
    for size in sizes {
        sum += size;
        offsets.push(sum);
    }
    offsets
}

/// The element and node relabelling performed by [`DofMap::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMapReordering {
    pub elements: Permutation,
    pub nodes: Permutation,
}

/// The dof layouts of all five families of a mesh level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofMap {
    dimension: usize,
    element_offsets: Vec<usize>,
    layouts: Vec<DofLayout>,
}

enum GhostResolution {
    /// The owner numbers the node in this family; the value is its dof.
    Natural(usize),
    /// A previous process already numbered the node as an owned ghost.
    Existing(usize),
    /// The node needs a fresh dof, owned by the process that references it.
    New,
}

impl DofMap {
    /// Reorders the elements and nodes of `elem` for the given element partition and builds the
    /// layouts of all families.
    ///
    /// Elements are grouped by process, and within every process sorted by material, group and
    /// previous index. Nodes are numbered by the first process (in rank order) that references
    /// them, linear nodes first, then quadratic, then biquadratic ones.
    ///
    /// # Panics
    ///
    /// Panics if `partition` does not have one entry per element, if an entry is not smaller
    /// than `num_processes`, or if a node is not referenced by any element.
    pub fn build(elem: &mut Elem, partition: &[usize], num_processes: usize) -> (DofMap, DofMapReordering) {
        assert!(num_processes > 0, "At least one process is required.");
        assert_eq!(
            partition.len(),
            elem.num_elements(),
            "Partition must have one entry per element."
        );
        if let Some(&invalid) = partition.iter().find(|&&process| process >= num_processes) {
            panic!("Partition entry {invalid} is out of range for {num_processes} processes.");
        }

        let dimension = elem.dimension();
        let (element_offsets, element_permutation) = reorder_elements(elem, partition, num_processes);

        let (node_permutation, own_sizes) = compute_node_mapping(elem, &element_offsets);
        elem.reorder_nodes(&node_permutation);

        let biquadratic_offsets = offsets_from_sizes(&own_sizes[2]);
        let ghosts: Vec<Vec<Vec<usize>>> = (0..3)
            .map(|k| find_ghost_nodes(elem, &element_offsets, &biquadratic_offsets, SolutionType::LAGRANGE[k]))
            .collect();

        let biquadratic = DofLayout {
            family: SolutionType::Biquadratic,
            offsets: biquadratic_offsets,
            original_own_sizes: own_sizes[2].clone(),
            ghosts: ghosts[2].clone(),
            owned_ghosts: BTreeMap::new(),
        };
        let linear = complete_with_owned_ghosts(SolutionType::Linear, &own_sizes[0], ghosts[0].clone(), &biquadratic);
        let quadratic =
            complete_with_owned_ghosts(SolutionType::Quadratic, &own_sizes[1], ghosts[1].clone(), &biquadratic);

        let element_counts: Vec<usize> = element_offsets.windows(2).map(|w| w[1] - w[0]).collect();
        let discontinuous_counts: Vec<usize> = element_counts.iter().map(|n| n * (dimension + 1)).collect();
        let constant = DofLayout::element_based(SolutionType::Constant, &element_counts);
        let discontinuous = DofLayout::element_based(SolutionType::LinearDiscontinuous, &discontinuous_counts);

        debug!(
            "Built dof map for {} elements on {} processes: {} / {} / {} Lagrange dofs",
            elem.num_elements(),
            num_processes,
            linear.total(),
            quadratic.total(),
            biquadratic.total()
        );

        let dofmap = DofMap {
            dimension,
            element_offsets,
            layouts: vec![linear, quadratic, biquadratic, constant, discontinuous],
        };
        let reordering = DofMapReordering {
            elements: element_permutation,
            nodes: node_permutation,
        };
        (dofmap, reordering)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_processes(&self) -> usize {
        self.element_offsets.len() - 1
    }

    pub fn element_offsets(&self) -> &[usize] {
        &self.element_offsets
    }

    pub fn element_range(&self, process: usize) -> Range<usize> {
        self.element_offsets[process]..self.element_offsets[process + 1]
    }

    pub fn layout(&self, family: SolutionType) -> &DofLayout {
        &self.layouts[family.index()]
    }

    pub fn total(&self, family: SolutionType) -> usize {
        self.layout(family).total()
    }

    /// Finds the process owning `dof` by bisection over the offset table, starting the search
    /// at process `start`.
    ///
    /// # Panics
    ///
    /// Panics if `dof` is not smaller than the total dof count of the family.
    pub fn isdom_bisection_search(&self, dof: usize, family: SolutionType, start: usize) -> usize {
        let offsets = self.layout(family).offsets();
        let total = offsets[offsets.len() - 1];
        assert!(dof < total, "Dof {dof} is out of range for {family:?} with {total} dofs.");
        bisection_search(offsets, dof, start)
    }

    /// Dof of a biquadratic node in one of the Lagrange families.
    ///
    /// # Panics
    ///
    /// Panics for element-based families, and if the node has no identity in the requested
    /// family, which means the dof map is inconsistent.
    pub fn node_dof(&self, biquadratic_node: usize, family: SolutionType, start: usize) -> usize {
        match family {
            SolutionType::Biquadratic => biquadratic_node,
            SolutionType::Linear | SolutionType::Quadratic => {
                let owner = self.isdom_bisection_search(biquadratic_node, SolutionType::Biquadratic, start);
                let biquadratic_start = self.layout(SolutionType::Biquadratic).offset(owner);
                let layout = self.layout(family);
                if biquadratic_node < biquadratic_start + layout.original_own_size(owner) {
                    biquadratic_node - biquadratic_start + layout.offset(owner)
                } else {
                    layout.owned_ghost(biquadratic_node).unwrap_or_else(|| {
                        panic!("Internal error: Biquadratic node {biquadratic_node} has no {family:?} dof.")
                    })
                }
            }
            _ => panic!("{family:?} dofs are not node-based."),
        }
    }

    /// Dof `local_dof` of element `iel` in the piecewise linear discontinuous family.
    ///
    /// Every process stores its coefficients of one local monomial contiguously, so the dof
    /// is `offset * (dim + 1) + local_dof * own_elements + (iel - offset)` where `offset` is the
    /// first element of the owning process.
    pub fn discontinuous_dof(&self, iel: usize, local_dof: usize, start: usize) -> usize {
        let owner = self.isdom_bisection_search(iel, SolutionType::Constant, start);
        let range = self.element_range(owner);
        range.start * (self.dimension + 1) + local_dof * range.len() + (iel - range.start)
    }
}

/// Groups elements by process, then sorts every process block by material, group and index.
fn reorder_elements(elem: &mut Elem, partition: &[usize], num_processes: usize) -> (Vec<usize>, Permutation) {
    let num_elements = elem.num_elements();
    let mut element_offsets = vec![0; num_processes + 1];
    let mut old_to_new = vec![0; num_elements];
    let mut counter = 0;
    for process in 0..num_processes {
        for (iel, &element_process) in partition.iter().enumerate() {
            if element_process == process {
                old_to_new[iel] = counter;
                counter += 1;
            }
        }
        element_offsets[process + 1] = counter;
    }
    let by_process =
        Permutation::from_old_to_new(old_to_new).expect("Internal error: Process ordering must be a permutation.");
    elem.reorder_elements(&by_process);

    // Repeated adjacent-pair passes, each ending at the position of the last swap
    let mut order: Vec<usize> = (0..num_elements).collect();
    for process in 0..num_processes {
        let start = element_offsets[process];
        let mut n = element_offsets[process + 1] - start;
        while n > 1 {
            let mut last_swap = 0;
            for j in start + 1..start + n {
                let (iel, jel) = (order[j - 1], order[j]);
                let key = |e: usize| (elem.material(e), elem.group(e), e);
                if key(jel) < key(iel) {
                    order.swap(j - 1, j);
                    last_swap = j - start;
                }
            }
            n = last_swap;
        }
    }
    let by_tags = Permutation::from_vec(order).expect("Internal error: Tag ordering must be a permutation.");
    elem.reorder_elements(&by_tags);

    (element_offsets, by_process.then(&by_tags))
}

/// Assigns every node to the first process referencing it and counts, per family, how many
/// nodes every process owns.
fn compute_node_mapping(elem: &Elem, element_offsets: &[usize]) -> (Permutation, [Vec<usize>; 3]) {
    let num_processes = element_offsets.len() - 1;
    let mut owner = vec![num_processes; elem.num_nodes()];
    let mut old_to_new = vec![usize::MAX; elem.num_nodes()];
    let mut own_sizes = [vec![0; num_processes], vec![0; num_processes], vec![0; num_processes]];

    let mut counter = 0;
    for process in 0..num_processes {
        for (k, family) in SolutionType::LAGRANGE.into_iter().enumerate() {
            for iel in element_offsets[process]..element_offsets[process + 1] {
                let node_start = match k {
                    0 => 0,
                    _ => elem.element_dof_number(iel, SolutionType::LAGRANGE[k - 1]),
                };
                let node_end = elem.element_dof_number(iel, family);
                for &node in &elem.element_nodes(iel)[node_start..node_end] {
                    if owner[node] > process {
                        owner[node] = process;
                        old_to_new[node] = counter;
                        counter += 1;
                        for sizes in &mut own_sizes[k..] {
                            sizes[process] += 1;
                        }
                    }
                }
            }
        }
    }

    if let Some(node) = old_to_new.iter().position(|&new| new == usize::MAX) {
        panic!("Node {node} is not referenced by any element.");
    }
    let permutation =
        Permutation::from_old_to_new(old_to_new).expect("Internal error: Node mapping must be a permutation.");
    (permutation, own_sizes)
}

/// Per process, the sorted nodes of the first `dof_count(family)` positions of its elements
/// that lie below its biquadratic range.
fn find_ghost_nodes(
    elem: &Elem,
    element_offsets: &[usize],
    biquadratic_offsets: &[usize],
    family: SolutionType,
) -> Vec<Vec<usize>> {
    (0..element_offsets.len() - 1)
        .map(|process| {
            let mut ghosts = BTreeSet::new();
            for iel in element_offsets[process]..element_offsets[process + 1] {
                let num_dofs = elem.element_dof_number(iel, family);
                ghosts.extend(
                    elem.element_nodes(iel)[..num_dofs]
                        .iter()
                        .copied()
                        .filter(|&node| node < biquadratic_offsets[process]),
                );
            }
            ghosts.into_iter().collect()
        })
        .collect()
}

/// Builds the linear or quadratic layout from the natural owned sizes and the biquadratic
/// ghost lists of that family.
///
/// Ghosts the owner numbers in this family are translated to the owner's numbering. The
/// others get a fresh dof appended to the referencing process ("owned ghosts"), shared through
/// a map keyed by biquadratic node so that later processes reuse it.
fn complete_with_owned_ghosts(
    family: SolutionType,
    natural_own_sizes: &[usize],
    mut ghosts: Vec<Vec<usize>>,
    biquadratic: &DofLayout,
) -> DofLayout {
    let num_processes = natural_own_sizes.len();
    let mut offsets = vec![0; num_processes + 1];
    let mut owned_ghosts = BTreeMap::new();
    let mut counter = 0;

    for process in 0..num_processes {
        counter += natural_own_sizes[process];

        // Classify every ghost against the state left by previous processes
        let resolutions: Vec<GhostResolution> = ghosts[process]
            .iter()
            .map(|&node| {
                let owner = bisection_search(biquadratic.offsets(), node, process);
                let owner_start = biquadratic.offset(owner);
                if node < owner_start + natural_own_sizes[owner] {
                    GhostResolution::Natural(node - owner_start + offsets[owner])
                } else if let Some(&dof) = owned_ghosts.get(&node) {
                    GhostResolution::Existing(dof)
                } else {
                    GhostResolution::New
                }
            })
            .collect();

        let mut remaining = Vec::with_capacity(resolutions.len());
        for (node, resolution) in ghosts[process].iter().zip(resolutions) {
            match resolution {
                GhostResolution::Natural(dof) | GhostResolution::Existing(dof) => remaining.push(dof),
                GhostResolution::New => {
                    owned_ghosts.insert(*node, counter);
                    counter += 1;
                }
            }
        }

        ghosts[process] = remaining;
        offsets[process + 1] = counter;
    }

    DofLayout {
        family,
        offsets,
        original_own_sizes: natural_own_sizes.to_vec(),
        ghosts,
        owned_ghosts,
    }
}

/// The unique `p` with `offsets[p] <= dof < offsets[p + 1]`, searched from `start`.
fn bisection_search(offsets: &[usize], dof: usize, start: usize) -> usize {
    let num_processes = offsets.len() - 1;
    let mut lower = 0;
    let mut upper = num_processes;
    let mut process = start.min(num_processes - 1);
    while dof < offsets[process] || dof >= offsets[process + 1] {
        if dof < offsets[process] {
            upper = process;
        } else {
            lower = process + 1;
        }
        process = (lower + upper) / 2;
    }
    process
}
