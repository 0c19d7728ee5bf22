use matrixcompare::{assert_scalar_eq, prop_assert_scalar_eq};
use mlmesh::basis::{discontinuous_monomials, lagrange_basis, Polynomial};
use mlmesh::connectivity::GeometryType;
use mlmesh::dofmap::SolutionType;
use proptest::prelude::*;
use util::assert_panics;

#[test]
fn lagrange_bases_are_nodal() {
    for geometry in GeometryType::ALL {
        for family in SolutionType::LAGRANGE {
            let basis = lagrange_basis(geometry, family);
            assert_eq!(basis.geometry(), geometry);
            assert_eq!(basis.family(), family);
            assert_eq!(basis.num_functions(), geometry.dof_count(family));
            for a in 0..basis.num_functions() {
                let values = basis.values(&geometry.reference_coordinates(a));
                for (b, value) in values.into_iter().enumerate() {
                    let expected = if a == b { 1.0 } else { 0.0 };
                    assert_scalar_eq!(value, expected, comp = abs, tol = 1e-12);
                }
            }
        }
    }
}

#[test]
fn lagrange_basis_requires_a_lagrange_family() {
    assert_panics!(lagrange_basis(GeometryType::Quad, SolutionType::Constant));
    assert_panics!(lagrange_basis(GeometryType::Tet, SolutionType::LinearDiscontinuous));
}

#[test]
fn map_reference_point_through_a_scaled_quad() {
    let basis = lagrange_basis(GeometryType::Quad, SolutionType::Linear);
    let nodes = [[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 2.0, 0.0], [0.0, 2.0, 0.0]];
    let mapped = basis.map_reference_point(&nodes, &[0.5, -0.5, 0.0]);
    assert_scalar_eq!(mapped[0], 3.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(mapped[1], 0.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(mapped[2], 0.0, comp = abs, tol = 1e-14);
}

#[test]
fn polynomial_arithmetic() {
    let x = Polynomial::monomial([1, 0, 0]);
    let y = Polynomial::monomial([0, 1, 0]);
    let p = x.add(&Polynomial::constant(2.0)).mul(&y.scale(3.0));
    assert_eq!(p.terms().len(), 2);
    assert_scalar_eq!(p.evaluate(&[2.0, 5.0, 7.0]), 60.0, comp = abs, tol = 1e-14);
}

#[test]
fn discontinuous_monomials_follow_the_dimension() {
    assert_eq!(discontinuous_monomials(1, &[0.5, 2.0, 3.0]), vec![1.0, 0.5]);
    assert_eq!(discontinuous_monomials(3, &[0.5, 2.0, 3.0]), vec![1.0, 0.5, 2.0, 3.0]);
}

fn reference_point() -> impl Strategy<Value = [f64; 3]> {
    let range = -1.0..1.0;
    [range.clone(), range.clone(), range]
}

fn geometry_and_family() -> impl Strategy<Value = (GeometryType, SolutionType)> {
    (any::<GeometryType>(), proptest::sample::select(SolutionType::LAGRANGE.to_vec()))
}

proptest! {
    #[test]
    fn lagrange_bases_are_partitions_of_unity((geometry, family) in geometry_and_family(), x in reference_point()) {
        let basis = lagrange_basis(geometry, family);
        let sum: f64 = basis.values(&x).iter().sum();
        prop_assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-10);
    }

    #[test]
    fn lagrange_bases_reproduce_linear_functions(
        (geometry, family) in geometry_and_family(),
        x in reference_point(),
        coefficients in [-2.0..2.0, -2.0..2.0, -2.0..2.0, -2.0..2.0f64]
    ) {
        let f = |p: &[f64; 3]| coefficients[0] + coefficients[1] * p[0] + coefficients[2] * p[1] + coefficients[3] * p[2];
        let basis = lagrange_basis(geometry, family);
        let interpolated: f64 = basis
            .values(&x)
            .iter()
            .enumerate()
            .map(|(b, phi)| phi * f(&geometry.reference_coordinates(b)))
            .sum();
        // Nodes of lower-dimensional geometries have zero trailing coordinates
        let mut x_restricted = x;
        for coordinate in &mut x_restricted[geometry.dimension()..] {
            *coordinate = 0.0;
        }
        prop_assert_scalar_eq!(interpolated, f(&x_restricted), comp = abs, tol = 1e-9);
    }
}
