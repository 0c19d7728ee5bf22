//! Uniform refinement of a mesh level.
//!
//! Every element is split into the children listed by [`GeometryType::children`]. Fine nodes
//! are identified by labels built from coarse node indices, so that neighboring elements
//! agree on shared nodes without communication.
use crate::basis::lagrange_basis;
use crate::connectivity::{GeometryType, NodeKind};
use crate::dofmap::SolutionType;
use crate::elem::{face_key, Elem, FaceNeighbor, ParentRef};
use crate::mesh::Mesh;
use log::debug;
use mlmesh_nested_vec::NestedVec;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

/// Globally consistent identity of a fine node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeLabel {
    /// A child vertex, which is a coarse node.
    Node(usize),
    /// Midpoint of a child edge, given by the coarse nodes at its ends.
    Edge([usize; 2]),
    /// Center of a face of a three-dimensional child, given by the sorted coarse nodes at
    /// its vertices.
    Face(Vec<usize>),
    /// Interior node of a fine element.
    Interior(usize),
}

fn node_label(geometry: GeometryType, child_vertex_nodes: &[usize], fine_element: usize, local: usize) -> NodeLabel {
    match geometry.node_kind(local) {
        NodeKind::Vertex(v) => NodeLabel::Node(child_vertex_nodes[v]),
        NodeKind::Edge([a, b]) => {
            let (a, b) = (child_vertex_nodes[a], child_vertex_nodes[b]);
            NodeLabel::Edge([a.min(b), a.max(b)])
        }
        NodeKind::Face(face) => NodeLabel::Face(face_key(
            geometry
                .face_vertices(face)
                .iter()
                .map(|&v| child_vertex_nodes[v]),
        )),
        NodeKind::Interior => NodeLabel::Interior(fine_element),
    }
}

/// Refines every element of `coarse` once and builds the next level.
///
/// Children inherit material, group and owning process from their parent. Child faces that
/// lie on a boundary face of the parent inherit its boundary group.
pub fn refine_uniformly(coarse: &Mesh) -> Mesh {
    let coarse_elem = coarse.elem();
    let mut label_to_index: FxHashMap<NodeLabel, usize> = FxHashMap::default();
    let mut coordinates: Vec<Point3<f64>> = Vec::new();

    let num_fine_elements: usize = coarse_elem
        .geometry_types()
        .iter()
        .map(|geometry| geometry.num_children())
        .sum();
    let mut geometry = Vec::with_capacity(num_fine_elements);
    let mut material = Vec::with_capacity(num_fine_elements);
    let mut group = Vec::with_capacity(num_fine_elements);
    let mut parents = Vec::with_capacity(num_fine_elements);
    let mut partition = Vec::with_capacity(num_fine_elements);
    let mut nodes = NestedVec::with_capacity(num_fine_elements, 0);
    let mut boundary_groups: FxHashMap<Vec<usize>, usize> = FxHashMap::default();

    // Local buffers
    let mut child_vertex_nodes = Vec::new();
    let mut fine_nodes = Vec::new();
    let mut basis_values = Vec::new();

    for iel in 0..coarse_elem.num_elements() {
        let element_geometry = coarse_elem.geometry_type(iel);
        let coarse_nodes = coarse_elem.element_nodes(iel);
        let basis = lagrange_basis(element_geometry, SolutionType::Biquadratic);
        let process = coarse.isdom_bisection_search(iel, SolutionType::Constant);
        basis_values.resize(basis.num_functions(), 0.0);

        for (child, child_vertices) in element_geometry.children().iter().enumerate() {
            let fine_element = geometry.len();
            child_vertex_nodes.clear();
            child_vertex_nodes.extend(child_vertices.iter().map(|&local| coarse_nodes[local]));

            fine_nodes.clear();
            for local in 0..element_geometry.num_nodes() {
                let label = node_label(element_geometry, &child_vertex_nodes, fine_element, local);
                let index = *label_to_index.entry(label).or_insert_with(|| {
                    let x = element_geometry.child_node_parent_coordinates(child, local);
                    basis.populate_values(&mut basis_values, &x);
                    let position = coarse_nodes
                        .iter()
                        .zip(&basis_values)
                        .fold(Vector3::zeros(), |sum, (&node, &phi)| {
                            sum + coarse.coordinates()[node].coords * phi
                        });
                    coordinates.push(Point3::from(position));
                    coordinates.len() - 1
                });
                fine_nodes.push(index);
            }

            for face in 0..element_geometry.num_faces() {
                let child_face_locals = element_geometry
                    .face_vertices(face)
                    .iter()
                    .map(|&v| child_vertices[v]);
                let parent_face = (0..element_geometry.num_faces()).find(|&parent_face| {
                    let parent_face_nodes = element_geometry.face_nodes(parent_face);
                    child_face_locals.clone().all(|local| parent_face_nodes.contains(&local))
                });
                if let Some(parent_face) = parent_face {
                    if let FaceNeighbor::Boundary(boundary_group) = coarse_elem.face_neighbor(iel, parent_face) {
                        let key = face_key(
                            element_geometry
                                .face_vertices(face)
                                .iter()
                                .map(|&v| fine_nodes[v]),
                        );
                        boundary_groups.insert(key, boundary_group);
                    }
                }
            }

            geometry.push(element_geometry);
            material.push(coarse_elem.material(iel));
            group.push(coarse_elem.group(iel));
            parents.push(ParentRef { element: iel, child });
            partition.push(process);
            nodes.push(&fine_nodes);
        }
    }

    let mut elem = Elem::new(coordinates.len(), geometry, material, group, nodes);
    elem.build_face_neighbors(&boundary_groups);
    elem.set_parents(parents, coarse_elem.num_elements());
    debug!(
        "Refined level {} into {} elements and {} nodes",
        coarse.level(),
        elem.num_elements(),
        elem.num_nodes()
    );

    Mesh::build(coarse.level() + 1, elem, coordinates, &partition, coarse.process())
}
