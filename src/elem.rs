use crate::connectivity::GeometryType;
use crate::dofmap::SolutionType;
use crate::reorder::Permutation;
use mlmesh_nested_vec::NestedVec;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// What lies on the other side of an element face.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceNeighbor {
    Element(usize),
    /// The face is on the domain boundary, tagged with a boundary group.
    Boundary(usize),
}

/// The coarse element an element was refined from, and which of its children it is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub element: usize,
    pub child: usize,
}

/// Per-element connectivity, tags and neighbor relations of one mesh level.
///
/// Every element stores the full biquadratic node list of its geometry, so the linear and
/// quadratic node lists are prefixes of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elem {
    num_nodes: usize,
    geometry: Vec<GeometryType>,
    material: Vec<usize>,
    group: Vec<usize>,
    nodes: NestedVec<usize>,
    face_neighbors: NestedVec<FaceNeighbor>,
    parents: Vec<ParentRef>,
    children: NestedVec<usize>,
}

/// Key identifying a face independently of which element it is seen from.
pub fn face_key(vertices: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut key: Vec<usize> = vertices.into_iter().collect();
    key.sort_unstable();
    key
}

impl Elem {
    /// Creates the connectivity store. Faces are initially all boundary faces of group 0.
    ///
    /// # Panics
    ///
    /// Panics if the tag arrays do not have one entry per element, if an element does not
    /// carry exactly the biquadratic node count of its geometry, or if a node index is not
    /// smaller than `num_nodes`.
    pub fn new(
        num_nodes: usize,
        geometry: Vec<GeometryType>,
        material: Vec<usize>,
        group: Vec<usize>,
        nodes: NestedVec<usize>,
    ) -> Self {
        let num_elements = geometry.len();
        assert_eq!(material.len(), num_elements, "One material tag per element is required.");
        assert_eq!(group.len(), num_elements, "One group tag per element is required.");
        assert_eq!(nodes.len(), num_elements, "One node list per element is required.");
        for (iel, (element_nodes, geometry)) in nodes.iter().zip(&geometry).enumerate() {
            assert_eq!(
                element_nodes.len(),
                geometry.num_nodes(),
                "Element {iel} of type {geometry:?} must have {} nodes.",
                geometry.num_nodes()
            );
            assert!(
                element_nodes.iter().all(|&node| node < num_nodes),
                "Element {iel} references a node outside of 0..{num_nodes}."
            );
        }

        let mut face_neighbors = NestedVec::with_capacity(num_elements, 0);
        for geometry in &geometry {
            let mut faces = face_neighbors.begin_array();
            for _ in 0..geometry.num_faces() {
                faces.push_single(FaceNeighbor::Boundary(0));
            }
        }

        Self {
            num_nodes,
            geometry,
            material,
            group,
            nodes,
            face_neighbors,
            parents: Vec::new(),
            children: NestedVec::new(),
        }
    }

    pub fn num_elements(&self) -> usize {
        self.geometry.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// The largest dimension among the element geometries.
    pub fn dimension(&self) -> usize {
        self.geometry
            .iter()
            .map(|geometry| geometry.dimension())
            .max()
            .unwrap_or(0)
    }

    pub fn geometry_type(&self, iel: usize) -> GeometryType {
        self.geometry[iel]
    }

    pub fn material(&self, iel: usize) -> usize {
        self.material[iel]
    }

    pub fn group(&self, iel: usize) -> usize {
        self.group[iel]
    }

    pub fn geometry_types(&self) -> &[GeometryType] {
        &self.geometry
    }

    pub fn materials(&self) -> &[usize] {
        &self.material
    }

    pub fn groups(&self) -> &[usize] {
        &self.group
    }

    pub fn element_nodes(&self, iel: usize) -> &[usize] {
        &self.nodes[iel]
    }

    pub fn element_dof_number(&self, iel: usize, family: SolutionType) -> usize {
        self.geometry[iel].dof_count(family)
    }

    pub fn element_dof_index(&self, iel: usize, local_node: usize) -> usize {
        self.nodes[iel][local_node]
    }

    pub fn face_neighbors(&self, iel: usize) -> &[FaceNeighbor] {
        &self.face_neighbors[iel]
    }

    pub fn face_neighbor(&self, iel: usize, face: usize) -> FaceNeighbor {
        self.face_neighbors[iel][face]
    }

    /// Global vertex indices of an element face.
    pub fn face_vertex_indices(&self, iel: usize, face: usize) -> impl '_ + Iterator<Item = usize> {
        let nodes = &self.nodes[iel];
        self.geometry[iel]
            .face_vertices(face)
            .iter()
            .map(move |&local| nodes[local])
    }

    /// Matches faces shared by two elements and tags the remaining boundary faces.
    ///
    /// Faces are identified by their sorted vertex indices. Boundary faces missing from
    /// `boundary_groups` get group 0.
    pub fn build_face_neighbors(&mut self, boundary_groups: &FxHashMap<Vec<usize>, usize>) {
        let mut open_faces: FxHashMap<Vec<usize>, (usize, usize)> = FxHashMap::default();
        let mut matched = Vec::new();

        for iel in 0..self.num_elements() {
            for face in 0..self.geometry[iel].num_faces() {
                let key = face_key(self.face_vertex_indices(iel, face));
                if let Some((jel, jface)) = open_faces.remove(&key) {
                    matched.push(((iel, face), (jel, jface)));
                } else {
                    open_faces.insert(key, (iel, face));
                }
            }
        }

        for ((iel, iface), (jel, jface)) in matched {
            self.face_neighbors[iel][iface] = FaceNeighbor::Element(jel);
            self.face_neighbors[jel][jface] = FaceNeighbor::Element(iel);
        }
        for (key, (iel, face)) in open_faces {
            let group = boundary_groups.get(&key).copied().unwrap_or(0);
            self.face_neighbors[iel][face] = FaceNeighbor::Boundary(group);
        }
    }

    /// Physically reorders all per-element data so that element `i` moves to
    /// `permutation.target_index(i)`. Neighbor and child indices are relabelled accordingly.
    pub fn reorder_elements(&mut self, permutation: &Permutation) {
        assert_eq!(
            permutation.len(),
            self.num_elements(),
            "Element permutation must have one entry per element."
        );
        let old_to_new = permutation.old_to_new();

        self.geometry = permutation.apply_to_slice(&self.geometry);
        self.material = permutation.apply_to_slice(&self.material);
        self.group = permutation.apply_to_slice(&self.group);
        self.nodes = self.nodes.reordered(old_to_new);
        self.face_neighbors = self.face_neighbors.reordered(old_to_new);
        for neighbor in self.face_neighbors.array_elements_mut() {
            if let FaceNeighbor::Element(jel) = neighbor {
                *jel = old_to_new[*jel];
            }
        }
        if !self.parents.is_empty() {
            self.parents = permutation.apply_to_slice(&self.parents);
        }
        for child in self.children.array_elements_mut() {
            *child = old_to_new[*child];
        }
    }

    /// Rewrites every node index `i` to `permutation.target_index(i)`.
    pub fn reorder_nodes(&mut self, permutation: &Permutation) {
        assert_eq!(
            permutation.len(),
            self.num_nodes,
            "Node permutation must have one entry per node."
        );
        for node in self.nodes.array_elements_mut() {
            *node = permutation.target_index(*node);
        }
    }

    /// Records the coarse element and child slot of every element, and rebuilds the
    /// coarse-to-children index from it.
    pub fn set_parents(&mut self, parents: Vec<ParentRef>, num_coarse_elements: usize) {
        assert_eq!(parents.len(), self.num_elements(), "One parent per element is required.");
        let mut children: Vec<Vec<(usize, usize)>> = vec![Vec::new(); num_coarse_elements];
        for (iel, parent) in parents.iter().enumerate() {
            children[parent.element].push((parent.child, iel));
        }

        self.children = NestedVec::with_capacity(num_coarse_elements, parents.len());
        for mut slots in children {
            slots.sort_unstable();
            let mut array = self.children.begin_array();
            for (expected_slot, (slot, iel)) in slots.into_iter().enumerate() {
                assert_eq!(slot, expected_slot, "Child slots of a coarse element must be complete.");
                array.push_single(iel);
            }
        }
        self.parents = parents;
    }

    /// Forgets the coarser level, turning this into a level-0 connectivity.
    pub fn clear_parents(&mut self) {
        self.parents = Vec::new();
        self.children = NestedVec::new();
    }

    pub fn has_parents(&self) -> bool {
        !self.parents.is_empty()
    }

    pub fn parent(&self, iel: usize) -> Option<ParentRef> {
        self.parents.get(iel).copied()
    }

    /// Number of elements of the coarser level, or zero on level 0.
    pub fn num_coarse_elements(&self) -> usize {
        self.children.len()
    }

    /// The elements refined from a coarse element, in child-slot order.
    pub fn children(&self, coarse_element: usize) -> Option<&[usize]> {
        self.children.get(coarse_element)
    }

    pub fn child_element(&self, coarse_element: usize, child: usize) -> usize {
        self.children[coarse_element][child]
    }

    /// Biquadratic node of local node `local_node` of a child of a coarse element.
    pub fn child_element_dof(&self, coarse_element: usize, child: usize, local_node: usize) -> usize {
        self.nodes[self.child_element(coarse_element, child)][local_node]
    }

    pub fn shrink_to_fit(&mut self) {
        self.geometry.shrink_to_fit();
        self.material.shrink_to_fit();
        self.group.shrink_to_fit();
        self.nodes.shrink_to_fit();
        self.face_neighbors.shrink_to_fit();
        self.parents.shrink_to_fit();
        self.children.shrink_to_fit();
    }
}
