//! Nodal Lagrange bases of the three node-based families on every reference geometry.
//!
//! Each basis is spanned by a fixed polynomial space and made nodal by inverting the
//! Vandermonde matrix at the reference coordinates of the element nodes.
use crate::connectivity::GeometryType;
use crate::dofmap::SolutionType;
use nalgebra::DMatrix;
use std::sync::OnceLock;

/// A polynomial in up to three reference coordinates, stored as `(coefficient, exponents)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    terms: Vec<(f64, [u8; 3])>,
}

impl Polynomial {
    pub fn monomial(exponents: [u8; 3]) -> Self {
        Self {
            terms: vec![(1.0, exponents)],
        }
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: vec![(value, [0, 0, 0])],
        }
    }

    pub fn terms(&self) -> &[(f64, [u8; 3])] {
        &self.terms
    }

    pub fn evaluate(&self, x: &[f64; 3]) -> f64 {
        self.terms
            .iter()
            .map(|(coefficient, exponents)| {
                exponents
                    .iter()
                    .zip(x)
                    .fold(*coefficient, |acc, (&e, &xi)| acc * xi.powi(i32::from(e)))
            })
            .sum()
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut terms = self.terms.clone();
        terms.extend_from_slice(&other.terms);
        Polynomial { terms }
    }

    pub fn scale(&self, factor: f64) -> Polynomial {
        Polynomial {
            terms: self.terms.iter().map(|&(c, e)| (factor * c, e)).collect(),
        }
    }

    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut terms = Vec::with_capacity(self.terms.len() * other.terms.len());
        for &(a, ea) in &self.terms {
            for &(b, eb) in &other.terms {
                terms.push((a * b, [ea[0] + eb[0], ea[1] + eb[1], ea[2] + eb[2]]));
            }
        }
        Polynomial { terms }
    }
}

fn monomials(exponents: &[[u8; 3]]) -> Vec<Polynomial> {
    exponents.iter().copied().map(Polynomial::monomial).collect()
}

/// Tensor products `a * b` of two monomial lists.
fn tensor(a: &[[u8; 3]], b: &[[u8; 3]]) -> Vec<[u8; 3]> {
    let mut result = Vec::with_capacity(a.len() * b.len());
    for eb in b {
        for ea in a {
            result.push([ea[0] + eb[0], ea[1] + eb[1], ea[2] + eb[2]]);
        }
    }
    result
}

const X: [u8; 3] = [1, 0, 0];
const Y: [u8; 3] = [0, 1, 0];
const Z: [u8; 3] = [0, 0, 1];
const ONE: [u8; 3] = [0, 0, 0];

const P1_1D: [[u8; 3]; 2] = [ONE, X];
const P2_1D: [[u8; 3]; 3] = [ONE, X, [2, 0, 0]];
const P1_2D: [[u8; 3]; 3] = [ONE, X, Y];
const P2_2D: [[u8; 3]; 6] = [ONE, X, Y, [2, 0, 0], [1, 1, 0], [0, 2, 0]];
const P1_3D: [[u8; 3]; 4] = [ONE, X, Y, Z];
const P2_3D: [[u8; 3]; 10] = [
    ONE,
    X,
    Y,
    Z,
    [2, 0, 0],
    [0, 2, 0],
    [0, 0, 2],
    [1, 1, 0],
    [0, 1, 1],
    [1, 0, 1],
];
const Z_POWERS_1: [[u8; 3]; 2] = [ONE, Z];
const Z_POWERS_2: [[u8; 3]; 3] = [ONE, Z, [0, 0, 2]];
const Y_POWERS_1: [[u8; 3]; 2] = [ONE, Y];
const Y_POWERS_2: [[u8; 3]; 3] = [ONE, Y, [0, 2, 0]];

/// Barycentric coordinates of the unit simplex: `1 - x - y - z`, `x`, `y`, `z`.
fn barycentric() -> [Polynomial; 4] {
    let one_minus = Polynomial::constant(1.0)
        .add(&Polynomial::monomial(X).scale(-1.0))
        .add(&Polynomial::monomial(Y).scale(-1.0))
        .add(&Polynomial::monomial(Z).scale(-1.0));
    [
        one_minus,
        Polynomial::monomial(X),
        Polynomial::monomial(Y),
        Polynomial::monomial(Z),
    ]
}

/// The polynomial space of a geometry and family, as a list of generators.
fn polynomial_space(geometry: GeometryType, family: SolutionType) -> Vec<Polynomial> {
    use GeometryType::*;
    use SolutionType::*;
    let lambda = barycentric();
    match (geometry, family) {
        (Line, Linear) => monomials(&P1_1D),
        (Line, _) => monomials(&P2_1D),
        (Quad, Linear) => monomials(&tensor(&P1_1D, &Y_POWERS_1)),
        (Quad, Quadratic) => {
            let mut space = monomials(&P2_2D);
            space.extend(monomials(&[[2, 1, 0], [1, 2, 0]]));
            space
        }
        (Quad, _) => monomials(&tensor(&P2_1D, &Y_POWERS_2)),
        (Tri, Linear) => monomials(&P1_2D),
        (Tri, Quadratic) => monomials(&P2_2D),
        (Tri, _) => {
            let mut space = monomials(&P2_2D);
            space.push(lambda[0].mul(&lambda[1]).mul(&lambda[2]));
            space
        }
        (Hex, Linear) => monomials(&tensor(&tensor(&P1_1D, &Y_POWERS_1), &Z_POWERS_1)),
        (Hex, Quadratic) => {
            let mut space = monomials(&P2_3D);
            space.extend(monomials(&[
                [2, 1, 0],
                [2, 0, 1],
                [1, 2, 0],
                [0, 2, 1],
                [1, 0, 2],
                [0, 1, 2],
                [1, 1, 1],
                [2, 1, 1],
                [1, 2, 1],
                [1, 1, 2],
            ]));
            space
        }
        (Hex, _) => monomials(&tensor(&tensor(&P2_1D, &Y_POWERS_2), &Z_POWERS_2)),
        (Tet, Linear) => monomials(&P1_3D),
        (Tet, Quadratic) => monomials(&P2_3D),
        (Tet, _) => {
            let mut space = monomials(&P2_3D);
            for face in [[0, 1, 2], [0, 1, 3], [1, 2, 3], [0, 2, 3]] {
                space.push(lambda[face[0]].mul(&lambda[face[1]]).mul(&lambda[face[2]]));
            }
            space.push(lambda[0].mul(&lambda[1]).mul(&lambda[2]).mul(&lambda[3]));
            space
        }
        (Wedge, Linear) => monomials(&tensor(&P1_2D, &Z_POWERS_1)),
        (Wedge, Quadratic) => {
            let mut space = monomials(&tensor(&P2_2D, &Z_POWERS_1));
            space.extend(monomials(&tensor(&P1_2D, &[[0, 0, 2]])));
            space
        }
        (Wedge, _) => {
            let bubble = lambda[0].mul(&lambda[1]).mul(&lambda[2]);
            let mut triangle = monomials(&P2_2D);
            triangle.push(bubble);
            let mut space = Vec::with_capacity(21);
            for z_power in Z_POWERS_2 {
                let z = Polynomial::monomial(z_power);
                space.extend(triangle.iter().map(|p| p.mul(&z)));
            }
            space
        }
    }
}

/// A nodal basis: `phi_b(x) = sum_m coefficients[(m, b)] * generators[m](x)`.
#[derive(Debug, Clone)]
pub struct LagrangeBasis {
    geometry: GeometryType,
    family: SolutionType,
    generators: Vec<Polynomial>,
    coefficients: DMatrix<f64>,
}

impl LagrangeBasis {
    fn new(geometry: GeometryType, family: SolutionType) -> Self {
        let generators = polynomial_space(geometry, family);
        let n = geometry.dof_count(family);
        assert_eq!(
            generators.len(),
            n,
            "Internal error: Polynomial space of {geometry:?} {family:?} has the wrong dimension."
        );
        let vandermonde =
            DMatrix::from_fn(n, n, |a, m| generators[m].evaluate(&geometry.reference_coordinates(a)));
        let coefficients = vandermonde
            .try_inverse()
            .expect("Internal error: Vandermonde matrix of a nodal basis must be invertible.");
        Self {
            geometry,
            family,
            generators,
            coefficients,
        }
    }

    pub fn geometry(&self) -> GeometryType {
        self.geometry
    }

    pub fn family(&self) -> SolutionType {
        self.family
    }

    pub fn num_functions(&self) -> usize {
        self.generators.len()
    }

    /// Writes the values of all basis functions at the reference point `x` into `values`.
    pub fn populate_values(&self, values: &mut [f64], x: &[f64; 3]) {
        assert_eq!(values.len(), self.num_functions(), "Output length must match the basis size.");
        values.iter_mut().for_each(|v| *v = 0.0);
        for (m, generator) in self.generators.iter().enumerate() {
            let p = generator.evaluate(x);
            if p != 0.0 {
                for (b, value) in values.iter_mut().enumerate() {
                    *value += self.coefficients[(m, b)] * p;
                }
            }
        }
    }

    pub fn values(&self, x: &[f64; 3]) -> Vec<f64> {
        let mut values = vec![0.0; self.num_functions()];
        self.populate_values(&mut values, x);
        values
    }

    /// Maps a reference point through the element whose nodes have the given coordinates.
    pub fn map_reference_point(&self, node_coordinates: &[[f64; 3]], x: &[f64; 3]) -> [f64; 3] {
        let mut result = [0.0; 3];
        for (phi, node) in self.values(x).into_iter().zip(node_coordinates) {
            for (r, c) in result.iter_mut().zip(node) {
                *r += phi * c;
            }
        }
        result
    }
}

/// The shared basis of a geometry in one of the Lagrange families.
///
/// # Panics
///
/// Panics for the element-based families.
pub fn lagrange_basis(geometry: GeometryType, family: SolutionType) -> &'static LagrangeBasis {
    static CATALOG: OnceLock<Vec<LagrangeBasis>> = OnceLock::new();
    assert!(family.is_lagrange(), "{family:?} has no nodal basis.");
    let catalog = CATALOG.get_or_init(|| {
        GeometryType::ALL
            .into_iter()
            .flat_map(|geometry| {
                SolutionType::LAGRANGE
                    .into_iter()
                    .map(move |family| LagrangeBasis::new(geometry, family))
            })
            .collect()
    });
    &catalog[3 * geometry.index() + family.index()]
}

/// The local monomials `1, x, y, z` (up to the element dimension) of the piecewise linear
/// discontinuous family.
pub fn discontinuous_monomials(dimension: usize, x: &[f64; 3]) -> Vec<f64> {
    std::iter::once(1.0).chain(x[..dimension].iter().copied()).collect()
}
