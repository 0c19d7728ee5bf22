//! Parallel multilevel finite element meshes.
//!
//! A [`Mesh`] level couples replicated element connectivity with the numbering of five dof
//! families (linear, quadratic and biquadratic Lagrange, piecewise constant and piecewise
//! linear discontinuous) distributed over a group of processes. A [`MultiLevelMesh`] holds
//! uniformly refined levels together with the prolongations between them.
pub mod basis;
pub mod connectivity;
pub mod dofmap;
pub mod elem;
pub mod io;
pub mod mesh;
pub mod multilevel;
pub mod partition;
pub mod projection;
pub mod reorder;
pub mod topology;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate mlmesh_nested_vec;
pub extern crate nalgebra;

pub use connectivity::GeometryType;
pub use dofmap::{DofLayout, DofMap, SolutionType};
pub use mesh::Mesh;
pub use multilevel::MultiLevelMesh;
pub use partition::ProcessGroup;
