//! Reader for second-order Gmsh MSH files.
use crate::connectivity::GeometryType;
use crate::io::{BoundaryFace, CoarseMeshData, MeshFileReader, RawElement};
use eyre::{eyre, Context};
use log::warn;
use mshio::ElementType;
use nalgebra::Point3;
use std::path::Path;

/// Material assigned to all elements read from MSH files, which carry no material tags.
pub const DEFAULT_MATERIAL: usize = 2;

/// Reads `.msh` files (format 4.1) with second-order elements.
///
/// Elements of the highest entity dimension become mesh elements, tagged with their entity
/// tag as group. Elements one dimension lower become boundary faces, tagged with their
/// entity tag as boundary group.
#[derive(Debug, Copy, Clone, Default)]
pub struct MshReader;

impl MeshFileReader for MshReader {
    fn extensions(&self) -> &[&str] {
        &["msh"]
    }

    fn read(&self, path: &Path) -> eyre::Result<CoarseMeshData> {
        let msh_bytes = std::fs::read(path).wrap_err("failed to read file")?;
        load_msh_from_bytes(&msh_bytes).wrap_err("failed to load mesh from msh file")
    }
}

/// Parses the given bytes as a Gmsh MSH file.
pub fn load_msh_from_bytes(bytes: &[u8]) -> eyre::Result<CoarseMeshData> {
    let mut msh_file = mshio::parse_msh_bytes(bytes).map_err(|e| eyre!("failed to parse msh file: {}", e))?;

    let msh_nodes = msh_file
        .data
        .nodes
        .take()
        .ok_or(eyre!("MSH file does not contain nodes"))?;
    let msh_elements = msh_file
        .data
        .elements
        .take()
        .ok_or(eyre!("MSH file does not contain elements"))?;

    let mut coordinates = Vec::new();
    for node_block in &msh_nodes.node_blocks {
        // Ensure that node tags are consecutive
        if node_block.node_tags.is_some() {
            return Err(eyre!("node block tags are not consecutive in msh file"));
        }
        coordinates.extend(
            node_block
                .nodes
                .iter()
                .map(|node| Point3::new(node.x, node.y, node.z)),
        );
    }

    let mut dimension = 0;
    for block in &msh_elements.element_blocks {
        if geometry_of_element_type(block.element_type).is_some() {
            dimension = dimension.max(entity_dimension(block.entity_dim)?);
        }
    }
    if dimension == 0 {
        return Err(eyre!("MSH file does not contain any supported element block"));
    }

    let mut elements = Vec::new();
    let mut boundary_faces = Vec::new();
    for block in &msh_elements.element_blocks {
        let block_dimension = entity_dimension(block.entity_dim)?;
        let group = usize::try_from(block.entity_tag)
            .map_err(|_| eyre!("negative entity tag {} in msh file", block.entity_tag))?;

        if block_dimension == dimension {
            let (geometry, permutation) = geometry_of_element_type(block.element_type).ok_or_else(|| {
                eyre!(
                    "unsupported element type {:?} (second-order elements are required)",
                    block.element_type
                )
            })?;
            for element in &block.elements {
                if element.nodes.len() != permutation.len() {
                    return Err(eyre!(
                        "element {} has {} nodes, expected {}",
                        element.element_tag,
                        element.nodes.len(),
                        permutation.len()
                    ));
                }
                let nodes = permutation
                    .iter()
                    .map(|&gmsh_index| node_index(element.nodes[gmsh_index], coordinates.len()))
                    .collect::<eyre::Result<Vec<_>>>()?;
                elements.push(RawElement::from_leading_nodes(geometry, DEFAULT_MATERIAL, group, &nodes));
            }
        } else if block_dimension + 1 == dimension {
            let Some(num_vertices) = num_face_vertices(block.element_type) else {
                warn!("Ignoring boundary block of element type {:?}.", block.element_type);
                continue;
            };
            for element in &block.elements {
                let vertices = element
                    .nodes
                    .iter()
                    .take(num_vertices)
                    .map(|&tag| node_index(tag, coordinates.len()))
                    .collect::<eyre::Result<Vec<_>>>()?;
                boundary_faces.push(BoundaryFace { vertices, group });
            }
        }
    }

    Ok(CoarseMeshData {
        dimension,
        coordinates,
        elements,
        boundary_faces,
    })
}

fn entity_dimension(entity_dim: i32) -> eyre::Result<usize> {
    usize::try_from(entity_dim).map_err(|_| eyre!("invalid entity dimension {} in msh file", entity_dim))
}

fn node_index(tag: u64, num_nodes: usize) -> eyre::Result<usize> {
    usize::try_from(tag)
        .ok()
        .and_then(|tag| tag.checked_sub(1))
        .filter(|&index| index < num_nodes)
        .ok_or_else(|| eyre!("node tag {} is out of range", tag))
}

// Gmsh node positions, listed in our local node order.
const LINE3: [usize; 3] = [0, 1, 2];
const TRI6: [usize; 6] = [0, 1, 2, 3, 4, 5];
const QUAD9: [usize; 9] = [0, 1, 2, 3, 4, 5, 6, 7, 8];
const TET10: [usize; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 9, 8];
const HEX27: [usize; 27] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 11, 13, 9, 16, 18, 19, 17, 10, 12, 14, 15, 21, 23, 24, 22, 20, 25, 26,
];
const PRISM18: [usize; 18] = [0, 1, 2, 3, 4, 5, 6, 9, 7, 12, 14, 13, 8, 10, 11, 15, 17, 16];

/// The geometry of a supported element type and the Gmsh position of each of our nodes.
fn geometry_of_element_type(element_type: ElementType) -> Option<(GeometryType, &'static [usize])> {
    match element_type {
        ElementType::Lin3 => Some((GeometryType::Line, &LINE3)),
        ElementType::Tri6 => Some((GeometryType::Tri, &TRI6)),
        ElementType::Qua9 => Some((GeometryType::Quad, &QUAD9)),
        ElementType::Tet10 => Some((GeometryType::Tet, &TET10)),
        ElementType::Hex27 => Some((GeometryType::Hex, &HEX27)),
        ElementType::Pri18 => Some((GeometryType::Wedge, &PRISM18)),
        _ => None,
    }
}

fn num_face_vertices(element_type: ElementType) -> Option<usize> {
    match element_type {
        ElementType::Qua4 | ElementType::Qua9 => Some(4),
        ElementType::Tri3 | ElementType::Tri6 => Some(3),
        ElementType::Lin2 | ElementType::Lin3 => Some(2),
        _ => None,
    }
}
