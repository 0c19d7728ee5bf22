use crate::serial_box_mesh;
use matrixcompare::assert_scalar_eq;
use mlmesh::connectivity::{FaceType, GeometryType};
use mlmesh::mesh::procedural::{create_box_mesh_data, BoxMeshParams};
use mlmesh::partition::{DualGraphPartitioner, FixedPartition, ProcessGroup};
use mlmesh::topology::SOLID_MATERIAL;
use mlmesh::{Mesh, SolutionType};
use util::assert_panics;

mod refinement;

#[test]
fn wedge_face_queries() {
    let mesh = serial_box_mesh(GeometryType::Wedge, [1, 1, 1]);
    assert_eq!(mesh.element_type(0), GeometryType::Wedge);
    assert_eq!(mesh.element_face_number(0), 5);
    assert_eq!(mesh.element_quadrilateral_face_number(0), 3);
    assert_eq!(mesh.element_face_type(0, 0), FaceType::Quad);
    assert_eq!(mesh.element_face_type(0, 4), FaceType::Tri);
    assert_eq!(mesh.element_face_dof_number(0, 0, SolutionType::Quadratic), 8);
    assert_eq!(mesh.element_face_dof_number(0, 3, SolutionType::Biquadratic), 7);
    assert_eq!(mesh.element_face_dof_number(0, 3, SolutionType::Linear), 3);
    assert_eq!(mesh.local_face_vertex_index(0, 3, 1), 2);
    assert_eq!(mesh.local_face_vertex_index(0, 0, 8), 15);
}

#[test]
fn element_dof_numbers_and_node_coordinates() {
    let mesh = serial_box_mesh(GeometryType::Tet, [1, 1, 1]);
    let expected = [4, 10, 15, 1, 4];
    for (family, count) in SolutionType::ALL.into_iter().zip(expected) {
        assert_eq!(mesh.element_dof_number(0, family), count);
    }
    for family in SolutionType::LAGRANGE {
        let coordinates = mesh.element_node_coordinates(3, family);
        assert_eq!(coordinates.len(), mesh.element_dof_number(3, family));
        let nodes = mesh.elem().element_nodes(3);
        assert_eq!(coordinates[0], mesh.coordinates()[nodes[0]]);
    }
    assert_panics!(mesh.element_node_coordinates(0, SolutionType::Constant));
}

#[test]
fn characteristic_length_of_unit_boxes() {
    let cube = serial_box_mesh(GeometryType::Hex, [2, 1, 1]);
    assert_scalar_eq!(cube.characteristic_length(), 3.0f64.sqrt(), comp = abs, tol = 1e-14);
    let line = serial_box_mesh(GeometryType::Line, [3, 0, 0]);
    assert_scalar_eq!(line.characteristic_length(), 1.0, comp = abs, tol = 1e-14);
}

#[test]
fn solid_marks_follow_the_solid_material() {
    let mut data = create_box_mesh_data(&BoxMeshParams::new(GeometryType::Quad, [2, 1, 0]));
    data.elements[1].material = SOLID_MATERIAL;
    let mesh = Mesh::from_coarse_data(data, ProcessGroup::serial(), &DualGraphPartitioner);

    let solid_element = (0..2)
        .find(|&iel| mesh.material(iel) == SOLID_MATERIAL)
        .unwrap();
    let fluid_element = 1 - solid_element;
    for &node in mesh.elem().element_nodes(solid_element) {
        assert!(mesh.solid_mark(node));
    }
    let num_fluid_only = mesh
        .elem()
        .element_nodes(fluid_element)
        .iter()
        .filter(|&&node| !mesh.solid_mark(node))
        .count();
    // The shared edge carries three nodes
    assert_eq!(num_fluid_only, 6);
}

#[test]
fn amr_markers_are_written_immediately() {
    let mut mesh = serial_box_mesh(GeometryType::Quad, [2, 2, 0]);
    assert!((0..4).all(|iel| mesh.amr_marker(iel) == 0.0));
    mesh.set_amr_marker(2, 1.0);
    assert_eq!(mesh.amr_marker(2), 1.0);
    assert_eq!(mesh.amr_marker(1), 0.0);
    assert_eq!(mesh.topology().amr().owned_values(), &[0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn amr_markers_of_remote_elements_are_not_stored() {
    let params = BoxMeshParams::new(GeometryType::Quad, [2, 1, 0]);
    let mut mesh = Mesh::generate_coarse_box_mesh(&params, ProcessGroup::new(0, 2), &FixedPartition(vec![0, 1]));
    mesh.set_amr_marker(1, 1.0);
    mesh.set_amr_marker(0, 0.5);
    assert_eq!(mesh.amr_marker(0), 0.5);
    assert_panics!(mesh.amr_marker(1));
}

#[test]
fn reading_a_missing_mesh_file_fails() {
    let path = std::env::temp_dir().join("mlmesh-mesh-does-not-exist.msh");
    let result = Mesh::read_coarse_mesh(&path, 1.0, ProcessGroup::serial(), &DualGraphPartitioner);
    assert!(result.is_err());
}

#[test]
fn solution_dof_of_child_requires_a_refined_level() {
    let mesh = serial_box_mesh(GeometryType::Quad, [1, 1, 0]);
    assert_panics!(mesh.solution_dof_of_child(0, 0, 0, SolutionType::Linear));
}
