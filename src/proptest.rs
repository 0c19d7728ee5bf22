use crate::connectivity::GeometryType;
use crate::mesh::procedural::BoxMeshParams;
use crate::partition::ProcessGroup;
use crate::reorder::Permutation;
use ::proptest::prelude::*;
use nalgebra::{Point3, Vector3};

pub fn point3() -> impl Strategy<Value = Point3<f64>> {
    // Keep coordinates small enough that mesh extents stay well conditioned
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range.clone()].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

impl Arbitrary for GeometryType {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        ::proptest::sample::select(GeometryType::ALL.to_vec()).boxed()
    }
}

/// Process groups with `1..=max_size` processes and an arbitrary rank.
pub fn process_group(max_size: usize) -> impl Strategy<Value = ProcessGroup> {
    (1..=max_size.max(1)).prop_flat_map(|size| (0..size).prop_map(move |rank| ProcessGroup::new(rank, size)))
}

/// Uniformly random permutations of `0..n`.
pub fn permutation(n: usize) -> impl Strategy<Value = Permutation> {
    Just((0..n).collect::<Vec<_>>())
        .prop_shuffle()
        .prop_map(|perm| Permutation::from_vec(perm).expect("Internal error: A shuffle is a permutation."))
}

/// Box meshes of the given geometry with at most `max_cells_per_axis` cells along every axis
/// the geometry spans, and a box with positive extents.
pub fn box_mesh_params_with_geometry(
    geometry: GeometryType,
    max_cells_per_axis: usize,
) -> impl Strategy<Value = BoxMeshParams> {
    let cells = 1..=max_cells_per_axis.max(1);
    let extent = 0.1..5.0;
    (
        [cells.clone(), cells.clone(), cells],
        point3(),
        [extent.clone(), extent.clone(), extent],
    )
        .prop_map(move |(cells, min, [dx, dy, dz])| {
            BoxMeshParams::new(geometry, cells).with_bounds(min, min + Vector3::new(dx, dy, dz))
        })
}

pub fn box_mesh_params(max_cells_per_axis: usize) -> impl Strategy<Value = BoxMeshParams> {
    any::<GeometryType>().prop_flat_map(move |geometry| box_mesh_params_with_geometry(geometry, max_cells_per_axis))
}
