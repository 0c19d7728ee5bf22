//! Ghosted vectors and the per-level topology fields (coordinates, refinement and solid markers).
use crate::dofmap::{DofLayout, DofMap, SolutionType};
use crate::elem::Elem;
use nalgebra::Point3;
use rustc_hash::FxHashMap;
use std::ops::Range;

/// Material tag of elements belonging to the solid part of a fluid-structure mesh.
pub const SOLID_MATERIAL: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum InsertMode {
    Insert,
    Add,
}

/// The local part of a distributed vector: the owned range of one process plus its ghosts.
///
/// Writes are buffered by [`Self::set`] and [`Self::add`] and only become visible after
/// [`Self::close`], in the order they were issued. Writes to entries that are neither owned
/// nor ghosts are discarded on close.
#[derive(Debug, Clone)]
pub struct GhostedVector {
    len: usize,
    owned: Range<usize>,
    ghosts: Vec<usize>,
    ghost_positions: FxHashMap<usize, usize>,
    values: Vec<f64>,
    pending: Vec<(usize, f64, InsertMode)>,
}

impl GhostedVector {
    /// A zero vector laid out like `layout` on `process`.
    pub fn new(layout: &DofLayout, process: usize) -> Self {
        Self::from_parts(layout.total(), layout.owned_range(process), layout.ghosts(process).to_vec())
    }

    pub fn from_parts(len: usize, owned: Range<usize>, ghosts: Vec<usize>) -> Self {
        assert!(owned.end <= len, "Owned range must lie inside the vector.");
        let ghost_positions = ghosts
            .iter()
            .enumerate()
            .map(|(position, &ghost)| {
                assert!(ghost < len && !owned.contains(&ghost), "Ghost {ghost} must be a remote entry.");
                (ghost, owned.len() + position)
            })
            .collect();
        let values = vec![0.0; owned.len() + ghosts.len()];
        Self {
            len,
            owned,
            ghosts,
            ghost_positions,
            values,
            pending: Vec::new(),
        }
    }

    /// A vector whose owned and ghost entries are `f(global index)`.
    pub fn from_fn(layout: &DofLayout, process: usize, mut f: impl FnMut(usize) -> f64) -> Self {
        let mut vector = Self::new(layout, process);
        let indices: Vec<usize> = vector.owned.clone().chain(vector.ghosts.iter().copied()).collect();
        for (value, index) in vector.values.iter_mut().zip(indices) {
            *value = f(index);
        }
        vector
    }

    /// Global size.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn owned_range(&self) -> Range<usize> {
        self.owned.clone()
    }

    pub fn ghosts(&self) -> &[usize] {
        &self.ghosts
    }

    fn local_position(&self, index: usize) -> Option<usize> {
        if self.owned.contains(&index) {
            Some(index - self.owned.start)
        } else {
            self.ghost_positions.get(&index).copied()
        }
    }

    pub fn is_local(&self, index: usize) -> bool {
        self.local_position(index).is_some()
    }

    /// Reads an owned or ghost entry.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not stored locally.
    pub fn get(&self, index: usize) -> f64 {
        let position = self
            .local_position(index)
            .unwrap_or_else(|| panic!("Entry {index} is neither owned nor a ghost of this process."));
        self.values[position]
    }

    pub fn owned_values(&self) -> &[f64] {
        &self.values[..self.owned.len()]
    }

    pub fn set(&mut self, index: usize, value: f64) {
        assert!(index < self.len, "Entry {index} is out of bounds for a vector of size {}.", self.len);
        self.pending.push((index, value, InsertMode::Insert));
    }

    pub fn add(&mut self, index: usize, value: f64) {
        assert!(index < self.len, "Entry {index} is out of bounds for a vector of size {}.", self.len);
        self.pending.push((index, value, InsertMode::Add));
    }

    /// Flushes buffered writes.
    pub fn close(&mut self) {
        for (index, value, mode) in std::mem::take(&mut self.pending) {
            if let Some(position) = self.local_position(index) {
                match mode {
                    InsertMode::Insert => self.values[position] = value,
                    InsertMode::Add => self.values[position] += value,
                }
            }
        }
    }

    pub fn zero(&mut self) {
        self.pending.clear();
        self.values.iter_mut().for_each(|value| *value = 0.0);
    }
}

/// A named field of the topology.
#[derive(Debug, Clone)]
pub struct TopologyField {
    name: &'static str,
    family: SolutionType,
    values: GhostedVector,
}

impl TopologyField {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn family(&self) -> SolutionType {
        self.family
    }

    pub fn values(&self) -> &GhostedVector {
        &self.values
    }
}

/// Fields every mesh level carries: the coordinates `X`, `Y`, `Z` and the solid marker
/// `solidMrk` (biquadratic), and the refinement marker `AMR` (piecewise constant).
#[derive(Debug, Clone)]
pub struct Topology {
    fields: Vec<TopologyField>,
}

impl Topology {
    pub const COORDINATE_NAMES: [&'static str; 3] = ["X", "Y", "Z"];

    /// Allocates and fills the fields for `process`. `coordinates` must already be in
    /// biquadratic dof order.
    pub fn build(dofmap: &DofMap, elem: &Elem, coordinates: &[Point3<f64>], process: usize) -> Self {
        let biquadratic = dofmap.layout(SolutionType::Biquadratic);
        assert_eq!(
            coordinates.len(),
            biquadratic.total(),
            "One coordinate per biquadratic dof is required."
        );

        let mut fields = Vec::with_capacity(5);
        for (axis, name) in Self::COORDINATE_NAMES.into_iter().enumerate() {
            fields.push(TopologyField {
                name,
                family: SolutionType::Biquadratic,
                values: GhostedVector::from_fn(biquadratic, process, |node| coordinates[node][axis]),
            });
        }

        fields.push(TopologyField {
            name: "AMR",
            family: SolutionType::Constant,
            values: GhostedVector::new(dofmap.layout(SolutionType::Constant), process),
        });

        // Every process sees the whole connectivity, so the marks that remote processes would
        // send on close are set here directly
        let mut solid_marker = GhostedVector::new(biquadratic, process);
        for iel in 0..elem.num_elements() {
            if elem.material(iel) == SOLID_MATERIAL {
                for &node in elem.element_nodes(iel) {
                    solid_marker.set(node, 1.0);
                }
            }
        }
        solid_marker.close();
        fields.push(TopologyField {
            name: "solidMrk",
            family: SolutionType::Biquadratic,
            values: solid_marker,
        });

        Self { fields }
    }

    pub fn fields(&self) -> &[TopologyField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&TopologyField> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn field_values_mut(&mut self, name: &str) -> &mut GhostedVector {
        &mut self
            .fields
            .iter_mut()
            .find(|field| field.name == name)
            .unwrap_or_else(|| panic!("Internal error: Topology field {name} must exist."))
            .values
    }

    fn values(&self, name: &str) -> &GhostedVector {
        &self
            .field(name)
            .unwrap_or_else(|| panic!("Internal error: Topology field {name} must exist."))
            .values
    }

    pub fn coordinate(&self, axis: usize) -> &GhostedVector {
        self.values(Self::COORDINATE_NAMES[axis])
    }

    pub fn amr(&self) -> &GhostedVector {
        self.values("AMR")
    }

    pub fn amr_mut(&mut self) -> &mut GhostedVector {
        self.field_values_mut("AMR")
    }

    pub fn solid_marker(&self) -> &GhostedVector {
        self.values("solidMrk")
    }
}
