use crate::serial_box_mesh;
use mlmesh::connectivity::GeometryType;
use mlmesh::dofmap::DofMap;
use mlmesh::elem::Elem;
use mlmesh::mesh::procedural::{create_box_mesh_data, BoxMeshParams};
use mlmesh::partition::{DualGraphPartitioner, FixedPartition, ProcessGroup};
use mlmesh::proptest::{box_mesh_params, process_group};
use mlmesh::mlmesh_nested_vec::NestedVec;
use mlmesh::reorder::Permutation;
use mlmesh::{Mesh, SolutionType};
use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;
use util::{assert_contiguous_partition, assert_panics, prefix_sum};

fn two_quads_on_two_processes(rank: usize) -> Mesh {
    Mesh::generate_coarse_box_mesh(
        &BoxMeshParams::new(GeometryType::Quad, [2, 1, 0]),
        ProcessGroup::new(rank, 2),
        &FixedPartition(vec![0, 1]),
    )
}

#[test]
fn serial_four_triangles() {
    let mesh = serial_box_mesh(GeometryType::Tri, [2, 1, 0]);
    let dofmap = mesh.dofmap();

    assert_eq!(mesh.num_elements(), 4);
    assert_eq!(dofmap.element_offsets(), &[0, 4]);
    assert_eq!(dofmap.layout(SolutionType::Constant).offsets(), &[0, 4]);
    assert_eq!(dofmap.layout(SolutionType::LinearDiscontinuous).offsets(), &[0, 12]);
    assert_eq!(dofmap.total(SolutionType::Linear), 6);
    assert_eq!(dofmap.total(SolutionType::Quadratic), 15);
    assert_eq!(dofmap.total(SolutionType::Biquadratic), 19);
    for family in SolutionType::ALL {
        assert!(dofmap.layout(family).ghosts(0).is_empty());
        assert!(dofmap.layout(family).owned_ghosts().is_empty());
    }
}

#[test]
fn two_quads_on_two_processes_layouts() {
    let mesh = two_quads_on_two_processes(0);
    let dofmap = mesh.dofmap();

    assert_eq!(dofmap.element_offsets(), &[0, 1, 2]);
    assert_eq!(dofmap.layout(SolutionType::Linear).offsets(), &[0, 4, 6]);
    assert_eq!(dofmap.layout(SolutionType::Quadratic).offsets(), &[0, 8, 13]);
    assert_eq!(dofmap.layout(SolutionType::Biquadratic).offsets(), &[0, 9, 15]);
    assert_eq!(dofmap.layout(SolutionType::Constant).offsets(), &[0, 1, 2]);
    assert_eq!(dofmap.layout(SolutionType::LinearDiscontinuous).offsets(), &[0, 3, 6]);

    // The first process references only its own nodes
    for family in SolutionType::ALL {
        assert!(dofmap.layout(family).ghosts(0).is_empty());
    }
    assert_eq!(dofmap.layout(SolutionType::Linear).ghosts(1), &[1, 2]);
    assert_eq!(dofmap.layout(SolutionType::Quadratic).ghosts(1), &[1, 2, 5]);
    assert_eq!(dofmap.layout(SolutionType::Biquadratic).ghosts(1), &[1, 2, 5]);
    assert!(dofmap.layout(SolutionType::Constant).ghosts(1).is_empty());

    assert_eq!(mesh.elem().element_nodes(0), &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(mesh.elem().element_nodes(1), &[1, 9, 10, 2, 11, 12, 13, 5, 14]);
}

#[test]
fn two_quads_on_two_processes_solution_dofs() {
    for rank in 0..2 {
        let mesh = two_quads_on_two_processes(rank);

        let linear: Vec<_> = (0..4)
            .map(|i| mesh.solution_dof(i, 1, SolutionType::Linear))
            .collect();
        assert_eq!(linear, vec![1, 4, 5, 2]);
        let quadratic: Vec<_> = (0..8)
            .map(|i| mesh.solution_dof(i, 1, SolutionType::Quadratic))
            .collect();
        assert_eq!(quadratic, vec![1, 8, 9, 2, 10, 11, 12, 5]);
        assert_eq!(mesh.solution_dof(8, 1, SolutionType::Biquadratic), 14);
        assert_eq!(mesh.solution_dof(0, 1, SolutionType::Constant), 1);
        let discontinuous: Vec<_> = (0..3)
            .map(|i| mesh.solution_dof(i, 0, SolutionType::LinearDiscontinuous))
            .chain((0..3).map(|i| mesh.solution_dof(i, 1, SolutionType::LinearDiscontinuous)))
            .collect();
        assert_eq!(discontinuous, vec![0, 1, 2, 3, 4, 5]);

        assert_eq!(mesh.isdom_bisection_search(8, SolutionType::Biquadratic), 0);
        assert_eq!(mesh.isdom_bisection_search(9, SolutionType::Biquadratic), 1);
        assert_eq!(mesh.isdom_bisection_search(3, SolutionType::Linear), 0);
        assert_eq!(mesh.isdom_bisection_search(4, SolutionType::Linear), 1);
        assert_eq!(mesh.isdom_bisection_search(1, SolutionType::Constant), 1);
    }
}

/// One quad per process. The center node 8 of the first quad is a vertex of the other two,
/// so it has no linear or quadratic dof at its owner.
fn nonconforming_quads(num_processes: usize) -> (DofMap, Elem) {
    let mut nodes = vec![(0..9).collect::<Vec<usize>>()];
    for process in 1..num_processes {
        let first = 9 + 8 * (process - 1);
        nodes.push([8].into_iter().chain(first..first + 8).collect());
    }
    let num_nodes = 9 + 8 * (num_processes - 1);
    let mut elem = Elem::new(
        num_nodes,
        vec![GeometryType::Quad; num_processes],
        vec![2; num_processes],
        vec![1; num_processes],
        NestedVec::from(nodes),
    );
    let partition: Vec<usize> = (0..num_processes).collect();
    let (dofmap, reordering) = DofMap::build(&mut elem, &partition, num_processes);
    assert_eq!(reordering.nodes, Permutation::identity(num_nodes));
    (dofmap, elem)
}

#[test]
fn owned_ghosts_number_nodes_missing_at_their_owner() {
    let (dofmap, _) = nonconforming_quads(2);

    let linear = dofmap.layout(SolutionType::Linear);
    assert_eq!(linear.offsets(), &[0, 4, 8]);
    assert_eq!(linear.original_own_size(1), 3);
    assert_eq!(linear.owned_ghosts().iter().map(|(&k, &v)| (k, v)).collect::<Vec<_>>(), vec![(8, 7)]);
    assert!(linear.ghosts(1).is_empty());

    let quadratic = dofmap.layout(SolutionType::Quadratic);
    assert_eq!(quadratic.offsets(), &[0, 8, 16]);
    assert_eq!(quadratic.owned_ghost(8), Some(15));
    assert!(quadratic.ghosts(1).is_empty());

    let biquadratic = dofmap.layout(SolutionType::Biquadratic);
    assert_eq!(biquadratic.offsets(), &[0, 9, 17]);
    assert_eq!(biquadratic.ghosts(1), &[8]);
    assert!(biquadratic.owned_ghosts().is_empty());

    for start in 0..2 {
        assert_eq!(dofmap.node_dof(8, SolutionType::Linear, start), 7);
        assert_eq!(dofmap.node_dof(8, SolutionType::Quadratic, start), 15);
        assert_eq!(dofmap.node_dof(8, SolutionType::Biquadratic, start), 8);
        assert_eq!(dofmap.node_dof(3, SolutionType::Linear, start), 3);
        assert_eq!(dofmap.node_dof(9, SolutionType::Linear, start), 4);
        assert_eq!(dofmap.node_dof(12, SolutionType::Quadratic, start), 11);
    }
}

#[test]
fn owned_ghosts_are_reused_by_later_processes() {
    let (dofmap, elem) = nonconforming_quads(3);
    assert_eq!(elem.element_nodes(2)[0], 8);

    let linear = dofmap.layout(SolutionType::Linear);
    assert_eq!(linear.offsets(), &[0, 4, 8, 11]);
    assert_eq!(linear.owned_ghost(8), Some(7));
    assert_eq!(linear.owned_ghosts().len(), 1);
    assert!(linear.ghosts(1).is_empty());
    assert_eq!(linear.ghosts(2), &[7]);

    let quadratic = dofmap.layout(SolutionType::Quadratic);
    assert_eq!(quadratic.offsets(), &[0, 8, 16, 23]);
    assert_eq!(quadratic.owned_ghost(8), Some(15));
    assert_eq!(quadratic.ghosts(2), &[15]);

    let biquadratic = dofmap.layout(SolutionType::Biquadratic);
    assert_eq!(biquadratic.offsets(), &[0, 9, 17, 25]);
    assert_eq!(biquadratic.ghosts(2), &[8]);

    assert_eq!(dofmap.node_dof(17, SolutionType::Linear, 2), 8);
    assert_eq!(dofmap.node_dof(8, SolutionType::Linear, 2), 7);
}

#[test]
fn node_dof_rejects_nodes_without_an_identity_in_the_family() {
    let (dofmap, _) = nonconforming_quads(2);
    // Midside node of the first quad and center node of the second quad
    assert_panics!(dofmap.node_dof(5, SolutionType::Linear, 0));
    assert_panics!(dofmap.node_dof(16, SolutionType::Quadratic, 1));
    assert_panics!(dofmap.node_dof(8, SolutionType::Constant, 0));
}

#[test]
fn elements_are_sorted_by_material_within_a_process() {
    let mut data = create_box_mesh_data(&BoxMeshParams::new(GeometryType::Quad, [4, 1, 0]));
    data.elements[0].material = 5;
    data.elements[2].material = 5;
    let mesh = Mesh::from_coarse_data(data, ProcessGroup::serial(), &DualGraphPartitioner);

    assert_eq!(mesh.elem().materials(), &[2, 2, 5, 5]);
    // Ties keep the previous order: cells 1, 3, 0, 2 from left to right
    let left_x: Vec<f64> = (0..4)
        .map(|iel| mesh.element_node_coordinates(iel, SolutionType::Linear)[0].x)
        .collect();
    assert_scalar_eq!(left_x[0], 0.25, comp = abs, tol = 1e-14);
    assert_scalar_eq!(left_x[1], 0.75, comp = abs, tol = 1e-14);
    assert_scalar_eq!(left_x[2], 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(left_x[3], 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn solution_dof_rejects_out_of_range_local_dofs() {
    let mesh = serial_box_mesh(GeometryType::Quad, [1, 1, 0]);
    assert_panics!(mesh.solution_dof(4, 0, SolutionType::Linear));
    assert_panics!(mesh.solution_dof(3, 0, SolutionType::LinearDiscontinuous));
    assert_panics!(mesh.isdom_bisection_search(9, SolutionType::Biquadratic));
}

#[test]
fn dofmap_build_rejects_invalid_partitions() {
    let mesh = serial_box_mesh(GeometryType::Quad, [2, 1, 0]);
    assert_panics!({
        let mut elem = mesh.elem().clone();
        DofMap::build(&mut elem, &[0], 1)
    });
    assert_panics!({
        let mut elem = mesh.elem().clone();
        DofMap::build(&mut elem, &[0, 2], 2)
    });
}

fn check_dofmap_invariants(mesh: &Mesh) -> Result<(), TestCaseError> {
    let dofmap = mesh.dofmap();
    let num_processes = dofmap.num_processes();
    assert_contiguous_partition(dofmap.element_offsets(), mesh.num_elements());
    prop_assert_eq!(dofmap.layout(SolutionType::Constant).offsets(), dofmap.element_offsets());

    for family in SolutionType::ALL {
        let layout = dofmap.layout(family);
        assert_contiguous_partition(layout.offsets(), layout.total());
        let own_sizes = (0..num_processes).map(|process| layout.own_size(process));
        let expected_offsets: Vec<usize> = prefix_sum(own_sizes, 0).chain([layout.total()]).collect();
        prop_assert_eq!(layout.offsets(), &expected_offsets[..]);
        for dof in 0..layout.total() {
            for start in 0..num_processes {
                let owner = dofmap.isdom_bisection_search(dof, family, start);
                prop_assert!(layout.owned_range(owner).contains(&dof));
            }
        }
    }

    for process in 0..num_processes {
        let own_sizes: Vec<usize> = SolutionType::LAGRANGE
            .iter()
            .map(|&family| dofmap.layout(family).original_own_size(process))
            .collect();
        prop_assert!(own_sizes[0] <= own_sizes[1] && own_sizes[1] <= own_sizes[2]);

        let biquadratic = dofmap.layout(SolutionType::Biquadratic);
        let ghosts = biquadratic.ghosts(process);
        prop_assert!(ghosts.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(ghosts.iter().all(|&ghost| ghost < biquadratic.offset(process)));
    }

    for family in SolutionType::ALL {
        let layout = dofmap.layout(family);
        let mut referenced = BTreeSet::new();
        for process in 0..num_processes {
            for iel in dofmap.element_range(process) {
                for i in 0..mesh.element_dof_number(iel, family) {
                    let dof = mesh.solution_dof(i, iel, family);
                    prop_assert!(
                        layout.owned_range(process).contains(&dof) || layout.ghosts(process).contains(&dof),
                        "{:?} dof {} of element {} is neither owned nor a ghost of process {}",
                        family,
                        dof,
                        iel,
                        process
                    );
                    referenced.insert(dof);
                }
            }
        }
        prop_assert!(referenced.into_iter().eq(0..layout.total()));
    }

    let dim = dofmap.dimension();
    for process in 0..num_processes {
        let range = dofmap.element_range(process);
        for iel in range.clone() {
            for i in 0..=dim {
                let expected = range.start * (dim + 1) + i * range.len() + (iel - range.start);
                prop_assert_eq!(mesh.solution_dof(i, iel, SolutionType::LinearDiscontinuous), expected);
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn dofmap_invariants_hold_for_box_meshes(params in box_mesh_params(2), process in process_group(4)) {
        let mesh = Mesh::generate_coarse_box_mesh(&params, process, &DualGraphPartitioner);
        check_dofmap_invariants(&mesh)?;
    }
}
