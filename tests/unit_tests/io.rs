use mlmesh::connectivity::GeometryType;
use mlmesh::io::{read_coarse_mesh_data, CoarseMeshData, MeshFileReader, MeshReaderRegistry, RawElement};
use mlmesh::mesh::procedural::{create_box_mesh_data, BoxMeshParams};
use mlmesh::partition::{DualGraphPartitioner, ProcessGroup};
use mlmesh::{Mesh, SolutionType};
use nalgebra::Point3;
use std::path::{Path, PathBuf};
use util::assert_panics;

const QUAD9_MSH: &str = "\
$MeshFormat
4.1 0 8
$EndMeshFormat
$Entities
0 0 1 0
1 0 0 0 2 2 0 0 0
$EndEntities
$Nodes
1 9 1 9
2 1 0 9
1
2
3
4
5
6
7
8
9
0 0 0
2 0 0
2 2 0
0 2 0
1 0 0
2 1 0
1 2 0
0 1 0
1 1 0
$EndNodes
$Elements
1 1 1 1
2 1 10 1
1 1 2 3 4 5 6 7 8 9
$EndElements
";

/// Writes `contents` to a fresh file in the system temp directory.
fn write_temp_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mlmesh-io-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

struct BoxReader;

impl MeshFileReader for BoxReader {
    fn extensions(&self) -> &[&str] {
        &["box", "msh"]
    }

    fn read(&self, _path: &Path) -> eyre::Result<CoarseMeshData> {
        Ok(create_box_mesh_data(&BoxMeshParams::new(GeometryType::Quad, [2, 2, 0])))
    }
}

#[test]
fn default_registry_knows_msh() {
    assert_eq!(MeshReaderRegistry::default().known_extensions(), vec!["msh"]);
    assert!(MeshReaderRegistry::empty().known_extensions().is_empty());
}

#[test]
fn unknown_extensions_are_errors() {
    let registry = MeshReaderRegistry::default();
    let error = registry.read(Path::new("mesh.neu")).unwrap_err();
    assert!(error.to_string().contains("unsupported mesh file extension .neu"));
    assert!(registry.read(Path::new("mesh")).is_err());
}

#[test]
fn missing_files_are_errors() {
    let path = std::env::temp_dir().join("mlmesh-io-does-not-exist.msh");
    assert!(read_coarse_mesh_data(&path, 1.0).is_err());
}

#[test]
fn registered_readers_take_precedence() {
    let mut registry = MeshReaderRegistry::default();
    registry.register(Box::new(BoxReader));
    assert_eq!(registry.known_extensions(), vec!["box", "msh"]);

    let data = registry.read(Path::new("anything.BOX")).unwrap();
    assert_eq!(data.elements.len(), 4);
    // The custom reader shadows the built-in one, so no file is opened
    let data = registry.read(Path::new("not-a-file.msh")).unwrap();
    assert_eq!(data.coordinates.len(), 25);
}

#[test]
fn read_msh_file_with_reference_length() {
    let path = write_temp_file("quad9.msh", QUAD9_MSH);
    let data = read_coarse_mesh_data(&path, 2.0).unwrap();
    assert_eq!(data.dimension, 2);
    assert_eq!(data.elements.len(), 1);
    assert_eq!(data.coordinates[2], Point3::new(1.0, 1.0, 0.0));
    assert_eq!(data.coordinates[8], Point3::new(0.5, 0.5, 0.0));

    let mesh = Mesh::read_coarse_mesh(&path, 2.0, ProcessGroup::serial(), &DualGraphPartitioner).unwrap();
    assert_eq!(mesh.num_elements(), 1);
    assert_eq!(mesh.dofmap().total(SolutionType::Linear), 4);
    assert_eq!(mesh.dofmap().total(SolutionType::Quadratic), 8);
    assert_eq!(mesh.dofmap().total(SolutionType::Biquadratic), 9);
    assert_eq!(mesh.characteristic_length(), 2.0f64.sqrt());
}

#[test]
fn raw_elements_from_leading_nodes() {
    let element = RawElement::from_leading_nodes(GeometryType::Tri, 2, 1, &[0, 1, 2, 3, 4, 5]);
    assert_eq!(element.nodes.len(), 7);
    assert_eq!(element.nodes[5], Some(5));
    assert_eq!(element.nodes[6], None);
    assert_panics!(RawElement::from_leading_nodes(GeometryType::Line, 2, 1, &[0, 1, 2, 3]));
}

#[test]
fn scale_coordinates_rejects_non_positive_lengths() {
    let data = create_box_mesh_data(&BoxMeshParams::new(GeometryType::Line, [1, 0, 0]));
    assert_panics!({
        let mut data = data.clone();
        data.scale_coordinates(0.0)
    });
}
