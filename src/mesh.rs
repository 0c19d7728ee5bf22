//! One level of a parallel multilevel mesh.
use crate::connectivity::{FaceType, GeometryType};
use crate::dofmap::{DofMap, SolutionType};
use crate::elem::{face_key, Elem, FaceNeighbor};
use crate::io::{read_coarse_mesh_data, CoarseMeshData};
use crate::partition::{partition_elements, ElementPartitioner, ProcessGroup};
use crate::projection::{build_family_interpolation, ProjectionMatrix};
use crate::topology::Topology;
use log::{debug, info, warn};
use mlmesh_nested_vec::NestedVec;
use nalgebra::Point3;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::OnceLock;

pub mod missing_nodes;
pub mod procedural;
pub mod refinement;

use missing_nodes::synthesize_missing_nodes;
use procedural::{create_box_mesh_data, BoxMeshParams};

/// A mesh level: connectivity, coordinates, the dof map of all families, the topology fields
/// and lazily built family projections. Prolongations between levels live in
/// [`crate::MultiLevelMesh`].
///
/// Every process holds the complete connectivity; `process` names the rank whose view
/// (owned rows, ghost entries) the topology fields and projections are built for.
#[derive(Debug)]
pub struct Mesh {
    level: usize,
    process: ProcessGroup,
    elem: Elem,
    coordinates: Vec<Point3<f64>>,
    dofmap: DofMap,
    topology: Topology,
    characteristic_length: f64,
    element_type_flags: [bool; 6],
    family_projections: [[OnceLock<ProjectionMatrix>; 3]; 3],
}

impl Mesh {
    /// Builds a level-0 mesh from reader output.
    ///
    /// Missing biquadratic nodes are synthesized and nodes no element references are
    /// dropped before the elements are partitioned.
    pub fn from_coarse_data(
        mut data: CoarseMeshData,
        process: ProcessGroup,
        partitioner: &dyn ElementPartitioner,
    ) -> Self {
        synthesize_missing_nodes(&mut data);
        let CoarseMeshData {
            dimension,
            coordinates,
            elements,
            boundary_faces,
        } = data;

        let mut referenced = vec![false; coordinates.len()];
        for element in &elements {
            for node in element.nodes.iter().flatten() {
                referenced[*node] = true;
            }
        }
        let mut new_index = vec![usize::MAX; coordinates.len()];
        let mut compacted = Vec::with_capacity(coordinates.len());
        for (node, point) in coordinates.into_iter().enumerate() {
            if referenced[node] {
                new_index[node] = compacted.len();
                compacted.push(point);
            }
        }
        if compacted.len() < referenced.len() {
            debug!("Dropped {} unreferenced nodes", referenced.len() - compacted.len());
        }

        let mut nodes = NestedVec::with_capacity(elements.len(), 0);
        for element in &elements {
            let mut array = nodes.begin_array();
            for node in &element.nodes {
                let node = node.expect("Internal error: All nodes must be assigned after synthesis.");
                array.push_single(new_index[node]);
            }
        }
        let mut elem = Elem::new(
            compacted.len(),
            elements.iter().map(|element| element.geometry).collect(),
            elements.iter().map(|element| element.material).collect(),
            elements.iter().map(|element| element.group).collect(),
            nodes,
        );
        if elem.dimension() != dimension {
            warn!(
                "Mesh data declares dimension {} but its elements have dimension {}.",
                dimension,
                elem.dimension()
            );
        }

        let boundary_groups: FxHashMap<Vec<usize>, usize> = boundary_faces
            .iter()
            .filter(|face| face.vertices.iter().all(|&v| new_index[v] != usize::MAX))
            .map(|face| (face_key(face.vertices.iter().map(|&v| new_index[v])), face.group))
            .collect();
        elem.build_face_neighbors(&boundary_groups);

        let partition = partition_elements(&elem, partitioner, process.size());
        Self::build(0, elem, compacted, &partition, process)
    }

    /// Reads a level-0 mesh from a file and divides its coordinates by `lref`.
    pub fn read_coarse_mesh(
        path: impl AsRef<Path>,
        lref: f64,
        process: ProcessGroup,
        partitioner: &dyn ElementPartitioner,
    ) -> eyre::Result<Self> {
        let data = read_coarse_mesh_data(path, lref)?;
        Ok(Self::from_coarse_data(data, process, partitioner))
    }

    /// Generates a level-0 box mesh.
    pub fn generate_coarse_box_mesh(
        params: &BoxMeshParams,
        process: ProcessGroup,
        partitioner: &dyn ElementPartitioner,
    ) -> Self {
        Self::from_coarse_data(create_box_mesh_data(params), process, partitioner)
    }

    /// Numbers the dofs of the given connectivity and fills the topology fields.
    pub(crate) fn build(
        level: usize,
        mut elem: Elem,
        coordinates: Vec<Point3<f64>>,
        partition: &[usize],
        process: ProcessGroup,
    ) -> Self {
        assert_eq!(coordinates.len(), elem.num_nodes(), "One coordinate per node is required.");
        let (dofmap, reordering) = DofMap::build(&mut elem, partition, process.size());
        let coordinates = reordering.nodes.apply_to_slice(&coordinates);
        elem.shrink_to_fit();

        let topology = Topology::build(&dofmap, &elem, &coordinates, process.rank());
        let mut element_type_flags = [false; 6];
        for geometry in elem.geometry_types() {
            element_type_flags[geometry.index()] = true;
        }

        let mesh = Self {
            level,
            process,
            characteristic_length: characteristic_length(&coordinates),
            elem,
            coordinates,
            dofmap,
            topology,
            element_type_flags,
            family_projections: Default::default(),
        };
        mesh.print_info();
        mesh
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn dimension(&self) -> usize {
        self.dofmap.dimension()
    }

    pub fn process(&self) -> ProcessGroup {
        self.process
    }

    pub fn elem(&self) -> &Elem {
        &self.elem
    }

    /// Node coordinates, indexed by biquadratic dof.
    pub fn coordinates(&self) -> &[Point3<f64>] {
        &self.coordinates
    }

    pub fn dofmap(&self) -> &DofMap {
        &self.dofmap
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn num_elements(&self) -> usize {
        self.elem.num_elements()
    }

    /// Number of biquadratic nodes.
    pub fn num_nodes(&self) -> usize {
        self.elem.num_nodes()
    }

    pub fn element_type(&self, iel: usize) -> GeometryType {
        self.elem.geometry_type(iel)
    }

    pub fn material(&self, iel: usize) -> usize {
        self.elem.material(iel)
    }

    pub fn group(&self, iel: usize) -> usize {
        self.elem.group(iel)
    }

    pub fn element_dof_number(&self, iel: usize, family: SolutionType) -> usize {
        self.elem.element_dof_number(iel, family)
    }

    /// Which of the six geometries occur on this level, indexed by [`GeometryType::index`].
    pub fn element_type_flags(&self) -> [bool; 6] {
        self.element_type_flags
    }

    /// Global dof of local dof `i` of element `iel`.
    ///
    /// The node-based families look up the biquadratic node of the element; the piecewise
    /// constant family is numbered by element; the discontinuous family stores every local
    /// monomial of a process contiguously.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not a local dof of the element in `family`.
    pub fn solution_dof(&self, i: usize, iel: usize, family: SolutionType) -> usize {
        let num_dofs = self.element_dof_number(iel, family);
        assert!(
            i < num_dofs,
            "Local dof {i} is out of range for element {iel} with {num_dofs} {family:?} dofs."
        );
        let rank = self.process.rank();
        match family {
            SolutionType::Linear | SolutionType::Quadratic | SolutionType::Biquadratic => {
                self.dofmap.node_dof(self.elem.element_dof_index(iel, i), family, rank)
            }
            SolutionType::Constant => iel,
            SolutionType::LinearDiscontinuous => self.dofmap.discontinuous_dof(iel, i, rank),
        }
    }

    /// Global dof of local dof `i` of child `child` of the coarse element `coarse_element`.
    ///
    /// # Panics
    ///
    /// Panics if this level was not refined from a coarser one.
    pub fn solution_dof_of_child(
        &self,
        coarse_element: usize,
        child: usize,
        i: usize,
        family: SolutionType,
    ) -> usize {
        assert!(self.elem.has_parents(), "the coarse mesh has not been set");
        self.solution_dof(i, self.elem.child_element(coarse_element, child), family)
    }

    /// Owner of `dof` in `family`, searched from the local rank.
    pub fn isdom_bisection_search(&self, dof: usize, family: SolutionType) -> usize {
        self.dofmap.isdom_bisection_search(dof, family, self.process.rank())
    }

    pub fn element_face_number(&self, iel: usize) -> usize {
        self.element_type(iel).num_faces()
    }

    pub fn element_quadrilateral_face_number(&self, iel: usize) -> usize {
        self.element_type(iel).num_quadrilateral_faces()
    }

    pub fn element_face_type(&self, iel: usize, face: usize) -> FaceType {
        self.element_type(iel).face_type(face)
    }

    /// Number of dofs on a face in one of the Lagrange families.
    pub fn element_face_dof_number(&self, iel: usize, face: usize, family: SolutionType) -> usize {
        self.element_type(iel).face_dof_count(face, family)
    }

    /// Element-local index of the `i`-th node of a face.
    pub fn local_face_vertex_index(&self, iel: usize, face: usize, i: usize) -> usize {
        self.element_type(iel).face_nodes(face)[i]
    }

    pub fn face_neighbor(&self, iel: usize, face: usize) -> FaceNeighbor {
        self.elem.face_neighbor(iel, face)
    }

    /// Coordinates of the nodes of an element in one of the Lagrange families.
    pub fn element_node_coordinates(&self, iel: usize, family: SolutionType) -> Vec<Point3<f64>> {
        assert!(family.is_lagrange(), "{family:?} dofs have no node coordinates.");
        self.elem.element_nodes(iel)[..self.element_dof_number(iel, family)]
            .iter()
            .map(|&node| self.coordinates[node])
            .collect()
    }

    /// Length of the diagonal of the bounding box of the nodes, with the origin always
    /// included in the box.
    pub fn characteristic_length(&self) -> f64 {
        self.characteristic_length
    }

    /// Whether a node belongs to a solid element.
    pub fn solid_mark(&self, node: usize) -> bool {
        self.topology.solid_marker().get(node) > 0.5
    }

    pub fn amr_marker(&self, iel: usize) -> f64 {
        self.topology.amr().get(iel)
    }

    pub fn set_amr_marker(&mut self, iel: usize, value: f64) {
        let amr = self.topology.amr_mut();
        amr.set(iel, value);
        amr.close();
    }

    /// Interpolation from Lagrange family `from` to family `to`: rows are `to` dofs, columns
    /// are `from` dofs. Built on first use.
    ///
    /// # Panics
    ///
    /// Panics if either family is not a Lagrange family.
    pub fn qi_to_qj_projection(&self, to: SolutionType, from: SolutionType) -> &ProjectionMatrix {
        assert!(
            to.is_lagrange() && from.is_lagrange(),
            "Family projections are only defined between Lagrange families, got {to:?} and {from:?}."
        );
        self.family_projections[to.index()][from.index()]
            .get_or_init(|| build_family_interpolation(self, to, from))
    }

    /// Turns this level into a level-0 mesh, dropping everything that refers to the coarser
    /// level.
    pub(crate) fn detach_from_coarse(&mut self) {
        self.elem.clear_parents();
        self.level = 0;
    }

    pub(crate) fn set_level(&mut self, level: usize) {
        self.level = level;
    }

    pub fn print_info(&self) {
        info!(" Mesh Level                  : {}", self.level);
        info!(" Number of elements          : {}", self.num_elements());
        info!(" Number of linear nodes      : {}", self.dofmap.total(SolutionType::Linear));
        info!(" Number of quadratic nodes   : {}", self.dofmap.total(SolutionType::Quadratic));
        info!(" Number of biquadratic nodes : {}", self.dofmap.total(SolutionType::Biquadratic));
    }
}

fn characteristic_length(coordinates: &[Point3<f64>]) -> f64 {
    let mut min = [0.0f64; 3];
    let mut max = [0.0f64; 3];
    for point in coordinates {
        for k in 0..3 {
            min[k] = min[k].min(point[k]);
            max[k] = max[k].max(point[k]);
        }
    }
    (0..3).map(|k| (max[k] - min[k]).powi(2)).sum::<f64>().sqrt()
}
