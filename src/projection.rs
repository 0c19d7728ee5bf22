//! Inter-family and inter-level projection operators.
//!
//! A projection is assembled from per-element weight blocks. The blocks are computed in
//! parallel, then inserted in two passes: the first determines the sparsity pattern of every
//! owned row together with its diagonal and off-diagonal nonzero counts, the second fills in
//! the values.
use crate::basis::{discontinuous_monomials, lagrange_basis};
use crate::connectivity::GeometryType;
use crate::dofmap::SolutionType;
use crate::mesh::Mesh;
use crate::topology::GhostedVector;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ops::Range;

/// Weights with absolute value at most this are not stored.
pub const DROP_TOLERANCE: f64 = 1e-12;

/// Which fine dofs a coarse-to-fine projection produces rows for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProjectionScope {
    /// Every dof of the fine level.
    Fine,
    /// Only the fine dofs that coincide with a node of their parent element in the same
    /// family. For the element-based families this is the same as [`Self::Fine`].
    CoarseNodes,
}

impl ProjectionScope {
    pub const ALL: [ProjectionScope; 2] = [Self::Fine, Self::CoarseNodes];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// The rows of a projection matrix owned by one process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionMatrix {
    nrows: usize,
    ncols: usize,
    row_offset: usize,
    owned_columns: Range<usize>,
    local: CsrMatrix<f64>,
    nnz_diagonal: Vec<usize>,
    nnz_off_diagonal: Vec<usize>,
}

impl ProjectionMatrix {
    /// Global number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Global number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Columns owned by the same process as the rows.
    pub fn owned_columns(&self) -> Range<usize> {
        self.owned_columns.clone()
    }

    pub fn owned_rows(&self) -> Range<usize> {
        self.row_offset..self.row_offset + self.local.nrows()
    }

    /// The owned rows, indexed from zero, with global column indices.
    pub fn local_matrix(&self) -> &CsrMatrix<f64> {
        &self.local
    }

    /// Per owned row, the number of nonzeros in columns owned by the same process.
    pub fn nnz_diagonal(&self) -> &[usize] {
        &self.nnz_diagonal
    }

    /// Per owned row, the number of nonzeros in columns owned by other processes.
    pub fn nnz_off_diagonal(&self) -> &[usize] {
        &self.nnz_off_diagonal
    }

    /// The stored value at a global position, or `None` if the row is not owned.
    pub fn get_entry(&self, row: usize, col: usize) -> Option<f64> {
        if !self.owned_rows().contains(&row) || col >= self.ncols {
            return None;
        }
        self.local
            .get_entry(row - self.row_offset, col)
            .map(|entry| entry.into_value())
    }

    /// Computes the owned rows of `P * x`.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not store a column that an owned row references.
    pub fn apply(&self, x: &GhostedVector) -> DVector<f64> {
        assert_eq!(x.len(), self.ncols, "Vector size must match the number of columns.");
        let values = self.local.row_iter().map(|row| {
            row.col_indices()
                .iter()
                .zip(row.values())
                .map(|(&j, w)| w * x.get(j))
                .sum::<f64>()
        });
        DVector::from_iterator(self.local.nrows(), values)
    }

    /// Inserts element blocks of `(row, col, weight)` triplets, keeping only rows in
    /// `owned_rows`. Repeated positions keep the last inserted value.
    pub fn from_element_blocks(
        nrows: usize,
        ncols: usize,
        owned_rows: Range<usize>,
        owned_columns: Range<usize>,
        blocks: &[Vec<(usize, usize, f64)>],
    ) -> Self {
        assert!(owned_rows.end <= nrows, "Owned rows must lie inside the matrix.");
        let num_local_rows = owned_rows.len();

        let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); num_local_rows];
        for &(row, col, weight) in blocks.iter().flatten() {
            assert!(col < ncols, "Column {col} is out of bounds for {ncols} columns.");
            if owned_rows.contains(&row) && weight.abs() > DROP_TOLERANCE {
                rows[row - owned_rows.start].insert(col, weight);
            }
        }

        let mut offsets = Vec::with_capacity(num_local_rows + 1);
        let mut nnz_diagonal = Vec::with_capacity(num_local_rows);
        let mut nnz_off_diagonal = Vec::with_capacity(num_local_rows);
        offsets.push(0);
        for row in &rows {
            let diagonal = row.keys().filter(|col| owned_columns.contains(col)).count();
            nnz_diagonal.push(diagonal);
            nnz_off_diagonal.push(row.len() - diagonal);
            offsets.push(offsets[offsets.len() - 1] + row.len());
        }

        let nnz = offsets[num_local_rows];
        let mut col_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        for row in rows {
            for (col, weight) in row {
                col_indices.push(col);
                values.push(weight);
            }
        }

        let pattern = SparsityPattern::try_from_offsets_and_indices(num_local_rows, ncols, offsets, col_indices)
            .expect("Internal error: Projection rows must form a valid sparsity pattern.");
        let local = CsrMatrix::try_from_pattern_and_values(pattern, values)
            .expect("Internal error: Projection values must match the pattern.");

        Self {
            nrows,
            ncols,
            row_offset: owned_rows.start,
            owned_columns,
            local,
            nnz_diagonal,
            nnz_off_diagonal,
        }
    }
}

/// Produces the weight triplets contributed by single elements of a mesh.
pub trait ElementProjection: Sync {
    fn populate_element_weights(&self, iel: usize, triplets: &mut Vec<(usize, usize, f64)>);
}

fn assemble(
    projection: &dyn ElementProjection,
    elements: Range<usize>,
    nrows: usize,
    ncols: usize,
    owned_rows: Range<usize>,
    owned_columns: Range<usize>,
) -> ProjectionMatrix {
    let blocks: Vec<Vec<(usize, usize, f64)>> = elements
        .into_par_iter()
        .with_min_len(50)
        .map(|iel| {
            let mut triplets = Vec::new();
            projection.populate_element_weights(iel, &mut triplets);
            triplets
        })
        .collect();
    ProjectionMatrix::from_element_blocks(nrows, ncols, owned_rows, owned_columns, &blocks)
}

/// Local interpolation matrices `phi_{from, b}(xi_a)` of every geometry, where `a` runs over
/// the `to` nodes.
fn local_interpolation_matrices(to: SolutionType, from: SolutionType) -> Vec<DMatrix<f64>> {
    GeometryType::ALL
        .into_iter()
        .map(|geometry| {
            let basis = lagrange_basis(geometry, from);
            let n_to = geometry.dof_count(to);
            let mut matrix = DMatrix::zeros(n_to, basis.num_functions());
            for a in 0..n_to {
                let values = basis.values(&geometry.reference_coordinates(a));
                matrix.row_mut(a).copy_from_slice(&values);
            }
            matrix
        })
        .collect()
}

struct FamilyInterpolation<'a> {
    mesh: &'a Mesh,
    to: SolutionType,
    from: SolutionType,
    local: Vec<DMatrix<f64>>,
}

impl ElementProjection for FamilyInterpolation<'_> {
    fn populate_element_weights(&self, iel: usize, triplets: &mut Vec<(usize, usize, f64)>) {
        let local = &self.local[self.mesh.element_type(iel).index()];
        for a in 0..local.nrows() {
            let row = self.mesh.solution_dof(a, iel, self.to);
            for b in 0..local.ncols() {
                triplets.push((row, self.mesh.solution_dof(b, iel, self.from), local[(a, b)]));
            }
        }
    }
}

/// Builds the interpolation from Lagrange family `from` to family `to` on one level: rows are
/// `to` dofs, columns are `from` dofs.
pub(crate) fn build_family_interpolation(mesh: &Mesh, to: SolutionType, from: SolutionType) -> ProjectionMatrix {
    assert!(
        to.is_lagrange() && from.is_lagrange(),
        "Family projections are only defined between Lagrange families, got {to:?} and {from:?}."
    );
    let dofmap = mesh.dofmap();
    let rank = mesh.process().rank();
    let projection = FamilyInterpolation {
        mesh,
        to,
        from,
        local: local_interpolation_matrices(to, from),
    };
    let matrix = assemble(
        &projection,
        dofmap.element_range(rank),
        dofmap.total(to),
        dofmap.total(from),
        dofmap.layout(to).owned_range(rank),
        dofmap.layout(from).owned_range(rank),
    );
    debug!(
        "Built {to:?} <- {from:?} projection on level {} with {} local nonzeros",
        mesh.level(),
        matrix.local_matrix().nnz()
    );
    matrix
}

/// Weights of one child element in terms of its parent, with the rows a scope excludes
/// removed.
#[derive(Debug, Clone)]
struct ChildWeights {
    matrix: DMatrix<f64>,
    included_rows: Vec<bool>,
}

fn lagrange_child_weights(geometry: GeometryType, family: SolutionType, scope: ProjectionScope) -> Vec<ChildWeights> {
    let basis = lagrange_basis(geometry, family);
    let n = geometry.dof_count(family);
    (0..geometry.num_children())
        .map(|child| {
            let mut matrix = DMatrix::zeros(n, n);
            let mut included_rows = vec![true; n];
            for a in 0..n {
                let x = geometry.child_node_parent_coordinates(child, a);
                matrix.row_mut(a).copy_from_slice(&basis.values(&x));
                if scope == ProjectionScope::CoarseNodes {
                    included_rows[a] = (0..n).any(|b| {
                        let node = geometry.reference_coordinates(b);
                        node.iter().zip(&x).all(|(p, q)| (p - q).abs() <= DROP_TOLERANCE)
                    });
                }
            }
            ChildWeights { matrix, included_rows }
        })
        .collect()
}

/// Coefficients of the parent's monomials `1, xi_1, .., xi_d` re-expanded in the child's
/// monomials through the affine child map `F`: row 0 holds `m_l(F(0))`, row `k` holds
/// `m_l(F(e_k)) - m_l(F(0))`.
fn discontinuous_child_weights(geometry: GeometryType) -> Vec<ChildWeights> {
    let dim = geometry.dimension();
    let linear = lagrange_basis(geometry, SolutionType::Linear);
    (0..geometry.num_children())
        .map(|child| {
            let child_vertices: Vec<[f64; 3]> = geometry.children()[child]
                .iter()
                .map(|&node| geometry.reference_coordinates(node))
                .collect();
            let child_map = |x: &[f64; 3]| linear.map_reference_point(&child_vertices, x);

            let origin = discontinuous_monomials(dim, &child_map(&[0.0; 3]));
            let mut matrix = DMatrix::zeros(dim + 1, dim + 1);
            matrix.row_mut(0).copy_from_slice(&origin);
            for k in 1..=dim {
                let mut e_k = [0.0; 3];
                e_k[k - 1] = 1.0;
                let shifted = discontinuous_monomials(dim, &child_map(&e_k));
                for l in 0..=dim {
                    matrix[(k, l)] = shifted[l] - origin[l];
                }
            }
            ChildWeights {
                matrix,
                included_rows: vec![true; dim + 1],
            }
        })
        .collect()
}

struct Prolongation<'a> {
    fine: &'a Mesh,
    coarse: &'a Mesh,
    family: SolutionType,
    weights: Vec<Vec<ChildWeights>>,
}

impl ElementProjection for Prolongation<'_> {
    fn populate_element_weights(&self, iel: usize, triplets: &mut Vec<(usize, usize, f64)>) {
        let parent = self
            .fine
            .elem()
            .parent(iel)
            .expect("Internal error: Every element of a refined level must have a parent.");
        if self.family == SolutionType::Constant {
            triplets.push((iel, parent.element, 1.0));
            return;
        }

        let geometry = self.coarse.element_type(parent.element);
        let child = &self.weights[geometry.index()][parent.child];
        for a in 0..child.matrix.nrows() {
            if !child.included_rows[a] {
                continue;
            }
            let row = self.fine.solution_dof(a, iel, self.family);
            for b in 0..child.matrix.ncols() {
                let col = self.coarse.solution_dof(b, parent.element, self.family);
                triplets.push((row, col, child.matrix[(a, b)]));
            }
        }
    }
}

/// Builds the prolongation from `coarse` to its refinement `fine`: rows are fine dofs,
/// columns are coarse dofs.
pub(crate) fn build_prolongation(
    fine: &Mesh,
    coarse: &Mesh,
    family: SolutionType,
    scope: ProjectionScope,
) -> ProjectionMatrix {
    let weights = GeometryType::ALL
        .into_iter()
        .map(|geometry| match family {
            SolutionType::Constant => Vec::new(),
            SolutionType::LinearDiscontinuous => discontinuous_child_weights(geometry),
            _ => lagrange_child_weights(geometry, family, scope),
        })
        .collect();
    let projection = Prolongation {
        fine,
        coarse,
        family,
        weights,
    };
    let rank = fine.process().rank();
    let matrix = assemble(
        &projection,
        fine.dofmap().element_range(rank),
        fine.dofmap().total(family),
        coarse.dofmap().total(family),
        fine.dofmap().layout(family).owned_range(rank),
        coarse.dofmap().layout(family).owned_range(rank),
    );
    debug!(
        "Built {family:?} prolongation ({scope:?}) from level {} to level {} with {} local nonzeros",
        coarse.level(),
        fine.level(),
        matrix.local_matrix().nnz()
    );
    matrix
}
