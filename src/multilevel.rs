//! The hierarchy of uniformly refined mesh levels.
use crate::dofmap::SolutionType;
use crate::mesh::procedural::BoxMeshParams;
use crate::mesh::refinement::refine_uniformly;
use crate::mesh::Mesh;
use crate::partition::{ElementPartitioner, ProcessGroup};
use crate::projection::{build_prolongation, ProjectionMatrix, ProjectionScope};
use log::info;
use std::path::Path;
use std::sync::OnceLock;

/// Prolongations into one level, per scope and family.
type ProlongationCache = [[OnceLock<ProjectionMatrix>; 5]; 2];

/// Mesh levels ordered from coarsest to finest. Level `i + 1` is always the uniform
/// refinement of level `i`.
#[derive(Debug)]
pub struct MultiLevelMesh {
    levels: Vec<Mesh>,
    /// `prolongations[i]` holds the prolongations from level `i - 1` to level `i`. The entry
    /// of level 0 stays empty.
    prolongations: Vec<ProlongationCache>,
}

impl MultiLevelMesh {
    /// Starts a hierarchy from a level-0 mesh.
    ///
    /// # Panics
    ///
    /// Panics if `coarse` is not a level-0 mesh.
    pub fn from_coarse_mesh(coarse: Mesh) -> Self {
        assert_eq!(coarse.level(), 0, "The coarsest mesh of a hierarchy must be a level-0 mesh.");
        Self {
            levels: vec![coarse],
            prolongations: vec![ProlongationCache::default()],
        }
    }

    pub fn read_coarse_mesh(
        path: impl AsRef<Path>,
        lref: f64,
        process: ProcessGroup,
        partitioner: &dyn ElementPartitioner,
    ) -> eyre::Result<Self> {
        Mesh::read_coarse_mesh(path, lref, process, partitioner).map(Self::from_coarse_mesh)
    }

    pub fn generate_coarse_box_mesh(
        params: &BoxMeshParams,
        process: ProcessGroup,
        partitioner: &dyn ElementPartitioner,
    ) -> Self {
        Self::from_coarse_mesh(Mesh::generate_coarse_box_mesh(params, process, partitioner))
    }

    /// Appends `num_refinements` uniformly refined levels on top of the finest one.
    pub fn refine_uniformly(&mut self, num_refinements: usize) {
        for _ in 0..num_refinements {
            let fine = refine_uniformly(self.finest());
            self.levels.push(fine);
            self.prolongations.push(ProlongationCache::default());
        }
    }

    /// Drops the `num_levels` coarsest levels. The new coarsest level forgets its parents
    /// and the remaining levels are renumbered from zero.
    ///
    /// # Panics
    ///
    /// Panics if this would erase every level.
    pub fn erase_coarse_levels(&mut self, num_levels: usize) {
        assert!(
            num_levels < self.levels.len(),
            "Cannot erase {num_levels} of {} levels: at least one level must remain.",
            self.levels.len()
        );
        if num_levels == 0 {
            return;
        }
        self.levels.drain(..num_levels);
        self.prolongations.drain(..num_levels);
        self.levels[0].detach_from_coarse();
        self.prolongations[0] = ProlongationCache::default();
        for (level, mesh) in self.levels.iter_mut().enumerate() {
            mesh.set_level(level);
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> &Mesh {
        &self.levels[level]
    }

    pub fn level_mut(&mut self, level: usize) -> &mut Mesh {
        &mut self.levels[level]
    }

    pub fn levels(&self) -> &[Mesh] {
        &self.levels
    }

    pub fn finest(&self) -> &Mesh {
        self.levels
            .last()
            .expect("Internal error: A hierarchy always has a level.")
    }

    /// Prolongation of `family` from level `level - 1` to level `level`. Built on first use.
    ///
    /// # Panics
    ///
    /// Panics if `level` is zero, since level 0 has no coarse mesh.
    pub fn coarse_to_fine_projection(&self, level: usize, family: SolutionType) -> &ProjectionMatrix {
        self.prolongation(level, family, ProjectionScope::Fine)
    }

    /// Prolongation of `family` from level `level - 1` restricted to the fine dofs that
    /// coincide with coarse nodes.
    pub fn coarse_to_fine_projection_restricted(&self, level: usize, family: SolutionType) -> &ProjectionMatrix {
        self.prolongation(level, family, ProjectionScope::CoarseNodes)
    }

    fn prolongation(&self, level: usize, family: SolutionType, scope: ProjectionScope) -> &ProjectionMatrix {
        assert!(level > 0, "the coarse mesh has not been set");
        let (coarse, fine) = (&self.levels[level - 1], &self.levels[level]);
        self.prolongations[level][scope.index()][family.index()]
            .get_or_init(|| build_prolongation(fine, coarse, family, scope))
    }

    pub fn print_info(&self) {
        info!(" Number of mesh levels       : {}", self.levels.len());
        for mesh in &self.levels {
            mesh.print_info();
        }
    }
}
