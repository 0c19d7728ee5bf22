use crate::{serial_box_mesh, QuadraticMeshBuilder, UNIT_TET};
use matrixcompare::assert_scalar_eq;
use mlmesh::connectivity::GeometryType;
use mlmesh::elem::{FaceNeighbor, ParentRef};
use mlmesh::mesh::procedural::BoxMeshParams;
use mlmesh::mesh::refinement::refine_uniformly;
use mlmesh::partition::{DualGraphPartitioner, FixedPartition, ProcessGroup};
use mlmesh::{Mesh, SolutionType};
use std::collections::BTreeMap;

fn totals(mesh: &Mesh) -> [usize; 3] {
    SolutionType::LAGRANGE.map(|family| mesh.dofmap().total(family))
}

#[test]
fn refined_sizes() {
    let quad = serial_box_mesh(GeometryType::Quad, [1, 1, 0]);
    let once = refine_uniformly(&quad);
    assert_eq!(once.level(), 1);
    assert_eq!(once.num_elements(), 4);
    assert_eq!(totals(&once), [9, 21, 25]);
    let twice = refine_uniformly(&once);
    assert_eq!(twice.level(), 2);
    assert_eq!(twice.num_elements(), 16);
    assert_eq!(totals(&twice), [25, 65, 81]);

    let hex = refine_uniformly(&serial_box_mesh(GeometryType::Hex, [1, 1, 1]));
    assert_eq!(hex.num_elements(), 8);
    assert_eq!(totals(&hex), [27, 81, 125]);

    let tri = refine_uniformly(&serial_box_mesh(GeometryType::Tri, [1, 1, 0]));
    assert_eq!(tri.num_elements(), 8);
    assert_eq!(totals(&tri), [9, 25, 33]);

    let line = refine_uniformly(&serial_box_mesh(GeometryType::Line, [1, 0, 0]));
    assert_eq!(line.num_elements(), 2);
    assert_eq!(totals(&line), [3, 5, 5]);
}

#[test]
fn refined_single_tet() {
    let data = QuadraticMeshBuilder::with_vertices(&UNIT_TET)
        .element(GeometryType::Tet, &[0, 1, 2, 3])
        .build();
    let coarse = Mesh::from_coarse_data(data, ProcessGroup::serial(), &DualGraphPartitioner);
    assert_eq!(totals(&coarse), [4, 10, 15]);

    let fine = refine_uniformly(&coarse);
    assert_eq!(fine.num_elements(), 8);
    assert_eq!(totals(&fine), [10, 35, 67]);
    // Every fine node lies in the closed reference tetrahedron
    for point in fine.coordinates() {
        assert!(point.coords.iter().all(|&x| x >= -1e-12));
        assert!(point.x + point.y + point.z <= 1.0 + 1e-12);
    }
}

#[test]
fn children_inherit_tags_and_parents() {
    let coarse = serial_box_mesh(GeometryType::Wedge, [1, 1, 1]);
    let fine = refine_uniformly(&coarse);
    assert_eq!(fine.num_elements(), 16);
    assert_eq!(fine.elem().num_coarse_elements(), 2);

    for iel in 0..coarse.num_elements() {
        let children = fine.elem().children(iel).unwrap();
        assert_eq!(children.len(), 8);
        for (child, &jel) in children.iter().enumerate() {
            assert_eq!(fine.elem().parent(jel), Some(ParentRef { element: iel, child }));
            assert_eq!(fine.material(jel), coarse.material(iel));
            assert_eq!(fine.group(jel), coarse.group(iel));
            assert_eq!(fine.solution_dof_of_child(iel, child, 0, SolutionType::Constant), jel);
        }
        // The first child shares the first vertex of its parent
        let child_vertex = fine.element_node_coordinates(children[0], SolutionType::Linear)[0];
        let parent_vertex = coarse.element_node_coordinates(iel, SolutionType::Linear)[0];
        for axis in 0..3 {
            assert_scalar_eq!(child_vertex[axis], parent_vertex[axis], comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn refined_nodes_lie_on_the_fine_lattice() {
    let fine = refine_uniformly(&serial_box_mesh(GeometryType::Quad, [1, 1, 0]));
    for point in fine.coordinates() {
        for axis in 0..2 {
            let scaled = point[axis] * 4.0;
            assert_scalar_eq!(scaled, scaled.round(), comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn boundary_groups_are_inherited() {
    let fine = refine_uniformly(&serial_box_mesh(GeometryType::Quad, [1, 1, 0]));
    let mut faces_per_group = BTreeMap::new();
    let mut num_interior_faces = 0;
    for iel in 0..fine.num_elements() {
        for face in 0..fine.element_face_number(iel) {
            match fine.face_neighbor(iel, face) {
                FaceNeighbor::Boundary(group) => *faces_per_group.entry(group).or_insert(0) += 1,
                FaceNeighbor::Element(_) => num_interior_faces += 1,
            }
        }
    }
    assert_eq!(faces_per_group, (1..=4).map(|group| (group, 2)).collect());
    // Four interior edges, seen from both sides
    assert_eq!(num_interior_faces, 8);
}

#[test]
fn children_stay_on_the_process_of_their_parent() {
    let params = BoxMeshParams::new(GeometryType::Quad, [2, 1, 0]);
    for rank in 0..2 {
        let coarse = Mesh::generate_coarse_box_mesh(&params, ProcessGroup::new(rank, 2), &FixedPartition(vec![0, 1]));
        let fine = refine_uniformly(&coarse);
        assert_eq!(fine.process(), coarse.process());
        assert_eq!(fine.dofmap().element_offsets(), &[0, 4, 8]);
        for iel in 0..coarse.num_elements() {
            let owner = coarse.isdom_bisection_search(iel, SolutionType::Constant);
            for &jel in fine.elem().children(iel).unwrap() {
                assert_eq!(fine.isdom_bisection_search(jel, SolutionType::Constant), owner);
            }
        }
    }
}
