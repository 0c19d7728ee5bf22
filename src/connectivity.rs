//! Local node numbering, face tables and refinement tables of the six canonical geometries.
//!
//! Every geometry stores its nodes in the order vertices, edge midpoints, face centers
//! (three-dimensional geometries only) and finally the interior node, so that the
//! linear and quadratic node sets are prefixes of the biquadratic one.
use crate::dofmap::SolutionType;
use serde::{Deserialize, Serialize};

/// The geometry of an element, numbered as in the mesh-file readers (`0..6`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryType {
    /// Hexahedron on the reference cube `[-1, 1]^3`.
    ///
    /// ```text
    ///        7_____14_____6
    ///       /|           /|
    ///     15 |   25    13 |
    ///     /  19       /   18
    ///    4_____12____5    |
    ///    |   |   26  |    |
    ///    |   3____10_|____2
    ///   16  /       17   /
    ///    | 11   24   |  9
    ///    |/          | /
    ///    0_____8_____1
    /// ```
    ///
    /// Face centers 20..25 lie on the faces `y = -1`, `x = 1`, `y = 1`, `x = -1`, `z = -1`
    /// and `z = 1` respectively.
    Hex,
    /// Tetrahedron on the unit simplex, with face centers 10..13 and the centroid 14.
    Tet,
    /// Wedge: the unit triangle extruded over `z` in `[-1, 1]`.
    Wedge,
    /// Quadrilateral on the reference square `[-1, 1]^2`.
    ///
    /// ```text
    /// 3____6____2
    /// |         |
    /// 7    8    5
    /// |         |
    /// 0____4____1
    /// ```
    Quad,
    /// Triangle on the unit simplex.
    ///
    /// ```text
    /// 2
    /// |`\
    /// 5  4
    /// | 6 `\
    /// 0--3--1
    /// ```
    Tri,
    /// Line segment on `[-1, 1]`, with its midpoint as node 2.
    Line,
}

/// The geometry of an element face.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceType {
    Quad,
    Tri,
    Line,
    Point,
}

/// Where a local node sits on its element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Vertex(usize),
    /// Midpoint of the edge between two local vertices.
    Edge([usize; 2]),
    /// Center of a face of a three-dimensional element.
    Face(usize),
    Interior,
}

const DOF_COUNTS: [[usize; 5]; 6] = [
    [8, 20, 27, 1, 4],
    [4, 10, 15, 1, 4],
    [6, 15, 21, 1, 4],
    [4, 8, 9, 1, 3],
    [3, 6, 7, 1, 3],
    [2, 3, 3, 1, 2],
];

const MISSING_BIQUADRATIC_NODES: [usize; 6] = [0, 5, 3, 0, 1, 0];

const HEX_VERTICES: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];
const TET_VERTICES: [[f64; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
const WEDGE_VERTICES: [[f64; 3]; 6] = [
    [0.0, 0.0, -1.0],
    [1.0, 0.0, -1.0],
    [0.0, 1.0, -1.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
];
const QUAD_VERTICES: [[f64; 3]; 4] = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]];
const TRI_VERTICES: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const LINE_VERTICES: [[f64; 3]; 2] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];

const HEX_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [4, 5],
    [5, 6],
    [6, 7],
    [7, 4],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];
const TET_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];
const WEDGE_EDGES: [[usize; 2]; 9] = [[0, 1], [1, 2], [2, 0], [3, 4], [4, 5], [5, 3], [0, 3], [1, 4], [2, 5]];
const QUAD_EDGES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];
const TRI_EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

// Face node lists: vertices, then edge midpoints, then the face center.
const HEX_FACES: [&[usize]; 6] = [
    &[0, 1, 5, 4, 8, 17, 12, 16, 20],
    &[1, 2, 6, 5, 9, 18, 13, 17, 21],
    &[2, 3, 7, 6, 10, 19, 14, 18, 22],
    &[3, 0, 4, 7, 11, 16, 15, 19, 23],
    &[0, 3, 2, 1, 11, 10, 9, 8, 24],
    &[4, 5, 6, 7, 12, 13, 14, 15, 25],
];
const TET_FACES: [&[usize]; 4] = [
    &[0, 2, 1, 6, 5, 4, 10],
    &[0, 1, 3, 4, 8, 7, 11],
    &[1, 2, 3, 5, 9, 8, 12],
    &[2, 0, 3, 6, 7, 9, 13],
];
const WEDGE_FACES: [&[usize]; 5] = [
    &[0, 1, 4, 3, 6, 13, 9, 12, 15],
    &[1, 2, 5, 4, 7, 14, 10, 13, 16],
    &[2, 0, 3, 5, 8, 12, 11, 14, 17],
    &[0, 2, 1, 8, 7, 6, 18],
    &[3, 4, 5, 9, 10, 11, 19],
];
const QUAD_FACES: [&[usize]; 4] = [&[0, 1, 4], &[1, 2, 5], &[2, 3, 6], &[3, 0, 7]];
const TRI_FACES: [&[usize]; 3] = [&[0, 1, 3], &[1, 2, 4], &[2, 0, 5]];
const LINE_FACES: [&[usize]; 2] = [&[0], &[1]];

// Children as lists of parent nodes, in the vertex order of the child geometry.
const HEX_CHILDREN: [&[usize]; 8] = [
    &[0, 8, 24, 11, 16, 20, 26, 23],
    &[8, 1, 9, 24, 20, 17, 21, 26],
    &[24, 9, 2, 10, 26, 21, 18, 22],
    &[11, 24, 10, 3, 23, 26, 22, 19],
    &[16, 20, 26, 23, 4, 12, 25, 15],
    &[20, 17, 21, 26, 12, 5, 13, 25],
    &[26, 21, 18, 22, 25, 13, 6, 14],
    &[23, 26, 22, 19, 15, 25, 14, 7],
];
const TET_CHILDREN: [&[usize]; 8] = [
    &[0, 4, 6, 7],
    &[4, 1, 5, 8],
    &[6, 5, 2, 9],
    &[7, 8, 9, 3],
    &[4, 9, 8, 5],
    &[4, 9, 7, 8],
    &[4, 9, 6, 7],
    &[4, 9, 5, 6],
];
const WEDGE_CHILDREN: [&[usize]; 8] = [
    &[0, 6, 8, 12, 15, 17],
    &[6, 1, 7, 15, 13, 16],
    &[8, 7, 2, 17, 16, 14],
    &[7, 8, 6, 16, 17, 15],
    &[12, 15, 17, 3, 9, 11],
    &[15, 13, 16, 9, 4, 10],
    &[17, 16, 14, 11, 10, 5],
    &[16, 17, 15, 10, 11, 9],
];
const QUAD_CHILDREN: [&[usize]; 4] = [&[0, 4, 8, 7], &[4, 1, 5, 8], &[8, 5, 2, 6], &[7, 8, 6, 3]];
const TRI_CHILDREN: [&[usize]; 4] = [&[0, 3, 5], &[3, 1, 4], &[5, 4, 2], &[4, 5, 3]];
const LINE_CHILDREN: [&[usize]; 2] = [&[0, 2], &[2, 1]];

impl GeometryType {
    pub const ALL: [GeometryType; 6] = [Self::Hex, Self::Tet, Self::Wedge, Self::Quad, Self::Tri, Self::Line];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn dimension(self) -> usize {
        match self {
            Self::Hex | Self::Tet | Self::Wedge => 3,
            Self::Quad | Self::Tri => 2,
            Self::Line => 1,
        }
    }

    /// Number of dofs an element of this geometry carries in the given family.
    pub fn dof_count(self, family: SolutionType) -> usize {
        DOF_COUNTS[self.index()][family.index()]
    }

    pub fn num_vertices(self) -> usize {
        self.dof_count(SolutionType::Linear)
    }

    pub fn num_nodes(self) -> usize {
        self.dof_count(SolutionType::Biquadratic)
    }

    /// Number of trailing biquadratic nodes that quadratic mesh files do not provide.
    pub fn num_missing_biquadratic_nodes(self) -> usize {
        MISSING_BIQUADRATIC_NODES[self.index()]
    }

    pub fn reference_vertices(self) -> &'static [[f64; 3]] {
        match self {
            Self::Hex => &HEX_VERTICES,
            Self::Tet => &TET_VERTICES,
            Self::Wedge => &WEDGE_VERTICES,
            Self::Quad => &QUAD_VERTICES,
            Self::Tri => &TRI_VERTICES,
            Self::Line => &LINE_VERTICES,
        }
    }

    pub fn edges(self) -> &'static [[usize; 2]] {
        match self {
            Self::Hex => &HEX_EDGES,
            Self::Tet => &TET_EDGES,
            Self::Wedge => &WEDGE_EDGES,
            Self::Quad => &QUAD_EDGES,
            Self::Tri => &TRI_EDGES,
            Self::Line => &[],
        }
    }

    fn face_table(self) -> &'static [&'static [usize]] {
        match self {
            Self::Hex => &HEX_FACES,
            Self::Tet => &TET_FACES,
            Self::Wedge => &WEDGE_FACES,
            Self::Quad => &QUAD_FACES,
            Self::Tri => &TRI_FACES,
            Self::Line => &LINE_FACES,
        }
    }

    pub fn num_faces(self) -> usize {
        self.face_table().len()
    }

    /// Number of quadrilateral faces. They always precede the triangular ones.
    pub fn num_quadrilateral_faces(self) -> usize {
        match self {
            Self::Hex => 6,
            Self::Wedge => 3,
            _ => 0,
        }
    }

    pub fn face_type(self, face: usize) -> FaceType {
        FaceType::from_num_nodes(self.face_table()[face].len())
    }

    /// The biquadratic local nodes of a face: vertices, edge midpoints, then center.
    pub fn face_nodes(self, face: usize) -> &'static [usize] {
        self.face_table()[face]
    }

    pub fn face_vertices(self, face: usize) -> &'static [usize] {
        let nodes = self.face_table()[face];
        &nodes[..FaceType::from_num_nodes(nodes.len()).num_vertices()]
    }

    pub fn face_dof_count(self, face: usize, family: SolutionType) -> usize {
        self.face_type(face).dof_count(family)
    }

    pub fn node_kind(self, local_node: usize) -> NodeKind {
        let num_vertices = self.num_vertices();
        let edges = self.edges();
        let num_face_centers = if self.dimension() == 3 { self.num_faces() } else { 0 };

        if local_node < num_vertices {
            NodeKind::Vertex(local_node)
        } else if local_node < num_vertices + edges.len() {
            NodeKind::Edge(edges[local_node - num_vertices])
        } else if local_node < num_vertices + edges.len() + num_face_centers {
            NodeKind::Face(local_node - num_vertices - edges.len())
        } else if local_node + 1 == self.num_nodes() {
            NodeKind::Interior
        } else {
            panic!("Local node {local_node} is out of bounds for geometry {self:?}.")
        }
    }

    /// The local vertices whose average is the given node.
    pub fn node_vertices(self, local_node: usize) -> Vec<usize> {
        match self.node_kind(local_node) {
            NodeKind::Vertex(v) => vec![v],
            NodeKind::Edge(edge) => edge.to_vec(),
            NodeKind::Face(face) => self.face_vertices(face).to_vec(),
            NodeKind::Interior => (0..self.num_vertices()).collect(),
        }
    }

    pub fn reference_coordinates(self, local_node: usize) -> [f64; 3] {
        let vertices = self.reference_vertices();
        average(self.node_vertices(local_node).iter().map(|&v| vertices[v]))
    }

    pub fn num_children(self) -> usize {
        self.children().len()
    }

    /// The children of a uniform refinement, each given as a list of parent local nodes.
    pub fn children(self) -> &'static [&'static [usize]] {
        match self {
            Self::Hex => &HEX_CHILDREN,
            Self::Tet => &TET_CHILDREN,
            Self::Wedge => &WEDGE_CHILDREN,
            Self::Quad => &QUAD_CHILDREN,
            Self::Tri => &TRI_CHILDREN,
            Self::Line => &LINE_CHILDREN,
        }
    }

    /// Reference coordinates, in the parent element, of a local node of one of its children.
    pub fn child_node_parent_coordinates(self, child: usize, local_node: usize) -> [f64; 3] {
        let child_vertices = self.children()[child];
        average(
            self.node_vertices(local_node)
                .iter()
                .map(|&v| self.reference_coordinates(child_vertices[v])),
        )
    }
}

fn average(points: impl Iterator<Item = [f64; 3]>) -> [f64; 3] {
    let mut sum = [0.0; 3];
    let mut count = 0;
    for point in points {
        for (s, x) in sum.iter_mut().zip(point) {
            *s += x;
        }
        count += 1;
    }
    sum.map(|s| s / count as f64)
}

impl FaceType {
    fn from_num_nodes(num_nodes: usize) -> Self {
        match num_nodes {
            9 => Self::Quad,
            7 => Self::Tri,
            3 => Self::Line,
            1 => Self::Point,
            _ => panic!("Internal error: No face type has {num_nodes} nodes."),
        }
    }

    pub fn num_vertices(self) -> usize {
        match self {
            Self::Quad => 4,
            Self::Tri => 3,
            Self::Line => 2,
            Self::Point => 1,
        }
    }

    /// Number of face dofs in a Lagrange family.
    ///
    /// # Panics
    ///
    /// Panics for the element-based families, which have no face dofs.
    pub fn dof_count(self, family: SolutionType) -> usize {
        let counts = match self {
            Self::Quad => [4, 8, 9],
            Self::Tri => [3, 6, 7],
            Self::Line => [2, 3, 3],
            Self::Point => [1, 1, 1],
        };
        assert!(
            family.is_lagrange(),
            "Face dof numbers are only defined for Lagrange families, got {family:?}."
        );
        counts[family.index()]
    }
}
