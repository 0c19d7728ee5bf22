//! The array contract between mesh-file readers and the mesh builder.
use crate::connectivity::GeometryType;
use eyre::{eyre, WrapErr};
use log::debug;
use nalgebra::Point3;
use std::path::Path;

pub mod msh;

/// One element as delivered by a reader: every biquadratic slot of the geometry, with the
/// slots the file does not provide left as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    pub geometry: GeometryType,
    pub material: usize,
    pub group: usize,
    pub nodes: Vec<Option<usize>>,
}

impl RawElement {
    /// An element whose first `nodes.len()` slots are given and whose remaining slots are
    /// missing.
    pub fn from_leading_nodes(geometry: GeometryType, material: usize, group: usize, nodes: &[usize]) -> Self {
        assert!(
            nodes.len() <= geometry.num_nodes(),
            "{geometry:?} elements have at most {} nodes, got {}.",
            geometry.num_nodes(),
            nodes.len()
        );
        let mut slots: Vec<Option<usize>> = nodes.iter().copied().map(Some).collect();
        slots.resize(geometry.num_nodes(), None);
        Self {
            geometry,
            material,
            group,
            nodes: slots,
        }
    }
}

/// Vertices of a boundary face and the boundary group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryFace {
    pub vertices: Vec<usize>,
    pub group: usize,
}

/// Coordinates, connectivity and tags of a coarse mesh in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoarseMeshData {
    pub dimension: usize,
    pub coordinates: Vec<Point3<f64>>,
    pub elements: Vec<RawElement>,
    pub boundary_faces: Vec<BoundaryFace>,
}

impl CoarseMeshData {
    /// Divides all coordinates by the reference length `lref`.
    pub fn scale_coordinates(&mut self, lref: f64) {
        assert!(lref > 0.0, "Reference length must be positive, got {lref}.");
        for point in &mut self.coordinates {
            point.coords /= lref;
        }
    }
}

/// A reader producing [`CoarseMeshData`] from files with given extensions.
pub trait MeshFileReader: Send + Sync {
    /// Lower-case file extensions, without the leading dot.
    fn extensions(&self) -> &[&str];

    fn read(&self, path: &Path) -> eyre::Result<CoarseMeshData>;
}

/// Dispatches mesh files to readers by file extension.
pub struct MeshReaderRegistry {
    readers: Vec<Box<dyn MeshFileReader>>,
}

impl Default for MeshReaderRegistry {
    fn default() -> Self {
        Self {
            readers: vec![Box::new(msh::MshReader)],
        }
    }
}

impl MeshReaderRegistry {
    /// A registry without readers.
    pub fn empty() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registers a reader. Later readers take precedence for shared extensions.
    pub fn register(&mut self, reader: Box<dyn MeshFileReader>) {
        self.readers.insert(0, reader);
    }

    pub fn known_extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self
            .readers
            .iter()
            .flat_map(|reader| reader.extensions().iter().copied())
            .collect();
        extensions.sort_unstable();
        extensions.dedup();
        extensions
    }

    /// Reads `path` with the reader registered for its extension.
    pub fn read(&self, path: &Path) -> eyre::Result<CoarseMeshData> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase())
            .ok_or_else(|| eyre!("mesh file {} has no extension", path.display()))?;
        let reader = self
            .readers
            .iter()
            .find(|reader| reader.extensions().contains(&extension.as_str()))
            .ok_or_else(|| {
                eyre!(
                    "unsupported mesh file extension .{} (known extensions: {})",
                    extension,
                    self.known_extensions().join(", ")
                )
            })?;
        let data = reader
            .read(path)
            .wrap_err_with(|| format!("failed to read mesh file {}", path.display()))?;
        debug!(
            "Read {} nodes and {} elements from {}",
            data.coordinates.len(),
            data.elements.len(),
            path.display()
        );
        Ok(data)
    }
}

/// Reads a coarse mesh with the default readers and divides its coordinates by `lref`.
pub fn read_coarse_mesh_data(path: impl AsRef<Path>, lref: f64) -> eyre::Result<CoarseMeshData> {
    let mut data = MeshReaderRegistry::default().read(path.as_ref())?;
    data.scale_coordinates(lref);
    Ok(data)
}
