//! Synthesis of the face and volume centers that quadratic mesh files do not provide.
use crate::connectivity::{GeometryType, NodeKind};
use crate::elem::face_key;
use crate::io::CoarseMeshData;
use log::debug;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

const ONE_NINTH: f64 = 1.0 / 9.0;
const FOUR_NINTHS: f64 = 4.0 / 9.0;

/// The fixed combination of known local nodes that places a missing node.
///
/// Triangle centers (triangles, triangular faces, and the mid-plane triangle of a wedge)
/// weigh their vertices with `-1/9` and their edge midpoints with `4/9`; the tetrahedron
/// center weighs its vertices with `-1/8` and its edge midpoints with `1/4`.
fn interpolation_weights(geometry: GeometryType, local_node: usize) -> Vec<(usize, f64)> {
    let triangle_center = |vertices: [usize; 3], edges: [usize; 3]| -> Vec<(usize, f64)> {
        vertices
            .into_iter()
            .map(|v| (v, -ONE_NINTH))
            .chain(edges.into_iter().map(|e| (e, FOUR_NINTHS)))
            .collect()
    };
    match (geometry, geometry.node_kind(local_node)) {
        (GeometryType::Tri, NodeKind::Interior) => triangle_center([0, 1, 2], [3, 4, 5]),
        (GeometryType::Tet | GeometryType::Wedge, NodeKind::Face(face)) => {
            let nodes = geometry.face_nodes(face);
            triangle_center([nodes[0], nodes[1], nodes[2]], [nodes[3], nodes[4], nodes[5]])
        }
        (GeometryType::Tet, NodeKind::Interior) => (0..4)
            .map(|v| (v, -0.125))
            .chain((4..10).map(|e| (e, 0.25)))
            .collect(),
        (GeometryType::Wedge, NodeKind::Interior) => triangle_center([12, 13, 14], [15, 16, 17]),
        _ => panic!("Local node {local_node} of {geometry:?} is never synthesized."),
    }
}

/// The local nodes a reader may leave unassigned: triangular face centers first, then the
/// interior node.
fn missing_slots(geometry: GeometryType) -> std::ops::Range<usize> {
    let num_nodes = geometry.num_nodes();
    num_nodes - geometry.num_missing_biquadratic_nodes()..num_nodes
}

/// Assigns node indices to all unassigned slots and computes their coordinates. Returns the
/// number of new nodes.
///
/// Triangular face centers are shared between the elements whose faces have the same vertex
/// set and numbered in element order; interior nodes are numbered afterwards, one per element.
/// Coordinates are summed in ascending node order, so every element sharing a face center
/// would compute the same value.
///
/// # Panics
///
/// Panics if an element does not have the node count of its geometry, or if a slot other
/// than a missing face or interior node is unassigned.
pub fn synthesize_missing_nodes(data: &mut CoarseMeshData) -> usize {
    for (iel, element) in data.elements.iter().enumerate() {
        assert_eq!(
            element.nodes.len(),
            element.geometry.num_nodes(),
            "Element {iel} of type {:?} must have {} node slots.",
            element.geometry,
            element.geometry.num_nodes()
        );
        let missing = missing_slots(element.geometry);
        if let Some(slot) = (0..missing.start).find(|&slot| element.nodes[slot].is_none()) {
            panic!("Element {iel} has no node in slot {slot}, which cannot be synthesized.");
        }
    }

    let first_new_node = data.coordinates.len();
    let mut next_node = first_new_node;
    let mut new_slots: Vec<Vec<usize>> = vec![Vec::new(); data.elements.len()];

    let mut face_centers: FxHashMap<Vec<usize>, usize> = FxHashMap::default();
    for (element, new_slots) in data.elements.iter_mut().zip(&mut new_slots) {
        let geometry = element.geometry;
        if geometry.dimension() != 3 {
            continue;
        }
        for face in geometry.num_quadrilateral_faces()..geometry.num_faces() {
            let slot = geometry.num_vertices() + geometry.edges().len() + face;
            if element.nodes[slot].is_some() {
                continue;
            }
            let key = face_key(
                geometry
                    .face_vertices(face)
                    .iter()
                    .map(|&v| element.nodes[v].expect("Internal error: Vertices were checked above.")),
            );
            let node = *face_centers.entry(key).or_insert_with(|| {
                next_node += 1;
                next_node - 1
            });
            element.nodes[slot] = Some(node);
            new_slots.push(slot);
        }
    }
    let num_face_nodes = next_node - first_new_node;

    for (element, new_slots) in data.elements.iter_mut().zip(&mut new_slots) {
        let geometry = element.geometry;
        if geometry.num_missing_biquadratic_nodes() == 0 {
            continue;
        }
        let slot = geometry.num_nodes() - 1;
        if element.nodes[slot].is_none() {
            element.nodes[slot] = Some(next_node);
            next_node += 1;
            new_slots.push(slot);
        }
    }

    let mut written = vec![false; next_node - first_new_node];
    data.coordinates.resize(next_node, Point3::origin());
    for (element, new_slots) in data.elements.iter().zip(&new_slots) {
        for &slot in new_slots {
            let node = element.nodes[slot].expect("Internal error: Slot was just assigned.");
            if written[node - first_new_node] {
                continue;
            }
            let mut terms: Vec<(usize, f64)> = interpolation_weights(element.geometry, slot)
                .into_iter()
                .map(|(local, weight)| {
                    let known = element.nodes[local].expect("Internal error: Known nodes are assigned.");
                    (known, weight)
                })
                .collect();
            terms.sort_by_key(|&(known, _)| known);
            let position = terms.iter().fold(Vector3::zeros(), |sum, &(known, weight)| {
                sum + data.coordinates[known].coords * weight
            });
            data.coordinates[node] = Point3::from(position);
            written[node - first_new_node] = true;
        }
    }

    let num_new_nodes = next_node - first_new_node;
    if num_new_nodes > 0 {
        debug!(
            "Synthesized {} face and {} interior nodes",
            num_face_nodes,
            num_new_nodes - num_face_nodes
        );
    }
    num_new_nodes
}
