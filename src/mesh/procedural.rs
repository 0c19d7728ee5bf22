//! Procedural generation of coarse box meshes.
use crate::connectivity::GeometryType;
use crate::io::{BoundaryFace, CoarseMeshData, RawElement};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Material of generated elements.
pub const BOX_MATERIAL: usize = 2;
/// Group of generated elements.
pub const BOX_GROUP: usize = 1;

/// An axis-aligned box subdivided into `nx * ny * nz` cells of one geometry.
///
/// Cells along axes beyond the dimension of the geometry are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxMeshParams {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub min: Point3<f64>,
    pub max: Point3<f64>,
    pub geometry: GeometryType,
}

impl Default for BoxMeshParams {
    fn default() -> Self {
        Self {
            nx: 1,
            ny: 1,
            nz: 1,
            min: Point3::origin(),
            max: Point3::new(1.0, 1.0, 1.0),
            geometry: GeometryType::Quad,
        }
    }
}

impl BoxMeshParams {
    pub fn new(geometry: GeometryType, cells: [usize; 3]) -> Self {
        Self {
            nx: cells[0],
            ny: cells[1],
            nz: cells[2],
            geometry,
            ..Self::default()
        }
    }

    pub fn with_bounds(self, min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max, ..self }
    }

    /// Cells per axis, with zero cells along the axes the geometry does not span.
    fn cells(&self) -> [usize; 3] {
        let dim = self.geometry.dimension();
        let cells = [self.nx, self.ny, self.nz];
        std::array::from_fn(|axis| if axis < dim { cells[axis] } else { 0 })
    }
}

/// Kuhn subdivision of the cube into six tetrahedra, one per axis ordering. Odd orderings
/// swap the two middle vertices to keep all tetrahedra positively oriented.
const KUHN_AXIS_ORDERS: [([usize; 3], bool); 6] = [
    ([0, 1, 2], false),
    ([0, 2, 1], true),
    ([1, 0, 2], true),
    ([1, 2, 0], false),
    ([2, 0, 1], false),
    ([2, 1, 0], true),
];

const QUAD_SPLIT: [[[usize; 2]; 3]; 2] = [[[0, 0], [2, 0], [2, 2]], [[0, 0], [2, 2], [0, 2]]];

/// Vertices of the elements of one cell, as lattice offsets from the cell origin.
fn cell_elements(geometry: GeometryType) -> Vec<Vec<[usize; 3]>> {
    let cube = |x: usize, y: usize, z: usize| [2 * x, 2 * y, 2 * z];
    match geometry {
        GeometryType::Line => vec![vec![[0, 0, 0], [2, 0, 0]]],
        GeometryType::Quad => vec![vec![cube(0, 0, 0), cube(1, 0, 0), cube(1, 1, 0), cube(0, 1, 0)]],
        GeometryType::Tri => QUAD_SPLIT
            .iter()
            .map(|triangle| triangle.iter().map(|&[x, y]| [x, y, 0]).collect())
            .collect(),
        GeometryType::Hex => vec![vec![
            cube(0, 0, 0),
            cube(1, 0, 0),
            cube(1, 1, 0),
            cube(0, 1, 0),
            cube(0, 0, 1),
            cube(1, 0, 1),
            cube(1, 1, 1),
            cube(0, 1, 1),
        ]],
        GeometryType::Wedge => QUAD_SPLIT
            .iter()
            .map(|triangle| {
                let bottom = triangle.iter().map(|&[x, y]| [x, y, 0]);
                let top = triangle.iter().map(|&[x, y]| [x, y, 2]);
                bottom.chain(top).collect()
            })
            .collect(),
        GeometryType::Tet => KUHN_AXIS_ORDERS
            .iter()
            .map(|&(axes, odd)| {
                let mut vertices = vec![[0; 3]];
                let mut current = [0; 3];
                for axis in axes {
                    current[axis] = 2;
                    vertices.push(current);
                }
                if odd {
                    vertices.swap(1, 2);
                }
                vertices
            })
            .collect(),
    }
}

/// Generates the coarse mesh data of a subdivided box.
///
/// Nodes live on a lattice with twice the cell resolution, so that vertices, edge midpoints
/// and quadrilateral face centers are lattice points. Triangular face centers and simplex or
/// wedge interiors are left unassigned for the missing-node synthesis. Unreferenced lattice
/// points are dropped. Boundary faces on the sides `x-, x+, y-, y+, z-, z+` get the groups
/// `1..=6`.
pub fn create_box_mesh_data(params: &BoxMeshParams) -> CoarseMeshData {
    let geometry = params.geometry;
    let dimension = geometry.dimension();
    let cells = params.cells();
    for (axis, &n) in cells.iter().enumerate().take(dimension) {
        assert!(n > 0, "Box mesh needs at least one cell along axis {axis}.");
        assert!(params.max[axis] > params.min[axis], "Box bounds along axis {axis} are empty.");
    }

    let lattice_size: [usize; 3] = cells.map(|n| 2 * n + 1);
    let to_lattice_index = |p: [usize; 3]| p[0] + lattice_size[0] * (p[1] + lattice_size[1] * p[2]);

    let mut lattice_node_of_elements = Vec::new();
    for cz in 0..cells[2].max(1) {
        for cy in 0..cells[1].max(1) {
            for cx in 0..cells[0].max(1) {
                let origin = [2 * cx, 2 * cy, 2 * cz];
                for vertices in cell_elements(geometry) {
                    let vertices: Vec<[usize; 3]> = vertices
                        .iter()
                        .map(|v| std::array::from_fn(|axis| origin[axis] + v[axis]))
                        .collect();
                    lattice_node_of_elements.push(lattice_nodes(geometry, &vertices));
                }
            }
        }
    }

    // Compact the referenced lattice points, in lattice order
    let num_lattice_nodes = lattice_size.iter().product();
    let mut referenced = vec![false; num_lattice_nodes];
    for point in lattice_node_of_elements.iter().flatten().flatten() {
        referenced[to_lattice_index(*point)] = true;
    }
    let mut new_index = vec![usize::MAX; num_lattice_nodes];
    let mut lattice_points = Vec::new();
    for (z, y, x) in itertools::iproduct!(0..lattice_size[2], 0..lattice_size[1], 0..lattice_size[0]) {
        let index = to_lattice_index([x, y, z]);
        if referenced[index] {
            new_index[index] = lattice_points.len();
            lattice_points.push([x, y, z]);
        }
    }

    let extents: Vector3<f64> = params.max - params.min;
    let coordinates = lattice_points
        .iter()
        .map(|point| {
            let mut coordinate = params.min;
            for axis in 0..dimension {
                coordinate[axis] += extents[axis] * point[axis] as f64 / (2 * cells[axis]) as f64;
            }
            coordinate
        })
        .collect();

    let mut elements = Vec::with_capacity(lattice_node_of_elements.len());
    let mut boundary_faces = Vec::new();
    for nodes in &lattice_node_of_elements {
        let node_index = |point: &[usize; 3]| new_index[to_lattice_index(*point)];
        elements.push(RawElement {
            geometry,
            material: BOX_MATERIAL,
            group: BOX_GROUP,
            nodes: nodes.iter().map(|node| node.as_ref().map(node_index)).collect(),
        });

        for face in 0..geometry.num_faces() {
            let vertices: Vec<[usize; 3]> = geometry
                .face_vertices(face)
                .iter()
                .map(|&v| nodes[v].expect("Internal error: Vertices are lattice points."))
                .collect();
            if let Some(group) = boundary_side(&vertices, &lattice_size, dimension) {
                boundary_faces.push(BoundaryFace {
                    vertices: vertices.iter().map(node_index).collect(),
                    group,
                });
            }
        }
    }

    CoarseMeshData {
        dimension,
        coordinates,
        elements,
        boundary_faces,
    }
}

/// Lattice points of all local nodes of an element, or `None` for nodes between lattice points.
fn lattice_nodes(geometry: GeometryType, vertices: &[[usize; 3]]) -> Vec<Option<[usize; 3]>> {
    let first_missing = geometry.num_nodes() - geometry.num_missing_biquadratic_nodes();
    (0..geometry.num_nodes())
        .map(|local_node| {
            if local_node >= first_missing {
                return None;
            }
            let node_vertices = geometry.node_vertices(local_node);
            let n = node_vertices.len();
            let sum = node_vertices.iter().fold([0; 3], |sum, &v| {
                std::array::from_fn(|axis| sum[axis] + vertices[v][axis])
            });
            assert!(
                sum.iter().all(|s| s % n == 0),
                "Internal error: Node {local_node} of a generated {geometry:?} must be a lattice point."
            );
            Some(sum.map(|s| s / n))
        })
        .collect()
}

/// The boundary group of a face whose vertices all lie on one side of the lattice.
fn boundary_side(vertices: &[[usize; 3]], lattice_size: &[usize; 3], dimension: usize) -> Option<usize> {
    (0..dimension).find_map(|axis| {
        if vertices.iter().all(|v| v[axis] == 0) {
            Some(2 * axis + 1)
        } else if vertices.iter().all(|v| v[axis] == lattice_size[axis] - 1) {
            Some(2 * axis + 2)
        } else {
            None
        }
    })
}
