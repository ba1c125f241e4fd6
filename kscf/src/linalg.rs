//! Dense complex Hermitian linear algebra on top of nalgebra.

use crate::error::{Result, ScfError};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use num_complex::Complex;

#[allow(non_camel_case_types)]
pub type c64 = Complex<f64>;

pub use cell::int1e::CMatrix;

const EIGEN_MAX_ITER: usize = 10_000;

pub fn scale(m: &CMatrix, x: f64) -> CMatrix {
    m.map(|z| z * x)
}

/// `(M + M^H) / 2`
pub fn hermitize(m: &CMatrix) -> CMatrix {
    (m + m.adjoint()).map(|z| z * 0.5)
}

/// `Re tr(A B)` without forming the product.
pub fn real_trace_product(a: &CMatrix, b: &CMatrix) -> f64 {
    let n = a.nrows();
    let mut acc = 0.0;
    for i in 0..n {
        for j in 0..n {
            acc += (a[(i, j)] * b[(j, i)]).re;
        }
    }
    acc
}

/// Diagonal of `A B` without forming the product.
pub fn diag_of_product(a: &CMatrix, b: &CMatrix) -> DVector<c64> {
    DVector::from_fn(a.nrows(), |i, _| {
        a.row(i)
            .iter()
            .zip(b.column(i).iter())
            .map(|(x, y)| x * y)
            .sum()
    })
}

/// Eigen-decomposition of a Hermitian matrix, eigenvalues ascending.
pub fn eigh(h: &CMatrix) -> Result<(DVector<f64>, CMatrix)> {
    let eig = SymmetricEigen::try_new(hermitize(h), f64::EPSILON, EIGEN_MAX_ITER).ok_or_else(|| {
        ScfError::NumericalInstability(format!(
            "Hermitian eigendecomposition of a {}x{} matrix did not converge",
            h.nrows(),
            h.ncols()
        ))
    })?;
    if eig.eigenvalues.iter().any(|e| !e.is_finite()) {
        return Err(ScfError::NumericalInstability(
            "eigenvalues are not finite".to_string(),
        ));
    }

    let mut indices: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    indices.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let values = DVector::from_fn(indices.len(), |i, _| eig.eigenvalues[indices[i]]);
    let vectors = eig.eigenvectors.select_columns(&indices);
    Ok((values, vectors))
}

/// Canonical orthogonalizer `X = U s^{-1/2}` of an overlap matrix, so that
/// `X^H S X = 1`. Fails when the smallest eigenvalue is below `lindep`.
pub fn orthogonalizer(s: &CMatrix, lindep: f64) -> Result<CMatrix> {
    let (values, vectors) = eigh(s)?;
    let smallest = values.iter().copied().fold(f64::INFINITY, f64::min);
    if smallest < lindep {
        return Err(ScfError::NumericalInstability(format!(
            "overlap matrix is not positive definite: smallest eigenvalue {smallest:.3e} below {lindep:.1e}"
        )));
    }
    let mut x = vectors;
    for (j, &v) in values.iter().enumerate() {
        let f = 1.0 / v.sqrt();
        x.column_mut(j).iter_mut().for_each(|z| *z *= f);
    }
    Ok(x)
}

/// Solve `F C = S C e` given an orthogonalizer `X` of `S`. Columns of `C`
/// are `S`-orthonormal and ordered by energy.
pub fn eigh_generalized(f: &CMatrix, x: &CMatrix) -> Result<(DVector<f64>, CMatrix)> {
    let f_prime = x.adjoint() * f * x;
    let (values, vectors) = eigh(&f_prime)?;
    Ok((values, align_phases(x * vectors)))
}

/// Fix the arbitrary phase of every column: the entry of largest modulus
/// becomes real and positive.
pub fn align_phases(mut vectors: CMatrix) -> CMatrix {
    for mut col in vectors.column_iter_mut() {
        let pivot = col
            .iter()
            .copied()
            .max_by(|a, b| a.norm_sqr().total_cmp(&b.norm_sqr()));
        if let Some(p) = pivot {
            if p.norm() > 0.0 {
                let phase = p.conj() / p.norm();
                col.iter_mut().for_each(|z| *z *= phase);
            }
        }
    }
    vectors
}

/// `M^power` of a Hermitian positive-definite matrix.
pub fn hermitian_power(m: &CMatrix, power: f64) -> Result<CMatrix> {
    let (values, vectors) = eigh(m)?;
    if let Some(bad) = values.iter().find(|&&v| v <= 0.0) {
        return Err(ScfError::NumericalInstability(format!(
            "matrix power of a non-positive-definite matrix (eigenvalue {bad:.3e})"
        )));
    }
    let diag = DMatrix::from_diagonal(&values.map(|v| c64::new(v.powf(power), 0.0)));
    Ok(&vectors * diag * vectors.adjoint())
}

/// `[[a, 0], [0, b]]`
pub fn block_diag(a: &CMatrix, b: &CMatrix) -> CMatrix {
    let (na, nb) = (a.nrows(), b.nrows());
    let mut out = CMatrix::zeros(na + nb, na + nb);
    out.view_mut((0, 0), (na, na)).copy_from(a);
    out.view_mut((na, na), (nb, nb)).copy_from(b);
    out
}

/// `sigma_c (x) m` with Pauli matrix `c` in {0: x, 1: y, 2: z}; spin is the outer index.
pub fn pauli_kron(c: usize, m: &CMatrix) -> CMatrix {
    let zero = c64::new(0.0, 0.0);
    let one = c64::new(1.0, 0.0);
    let i = c64::new(0.0, 1.0);
    let sigma = match c {
        0 => [[zero, one], [one, zero]],
        1 => [[zero, -i], [i, zero]],
        _ => [[one, zero], [zero, -one]],
    };
    let n = m.nrows();
    let mut out = CMatrix::zeros(2 * n, 2 * n);
    for (s, row) in sigma.iter().enumerate() {
        for (t, &factor) in row.iter().enumerate() {
            if factor != zero {
                out.view_mut((s * n, t * n), (n, n))
                    .copy_from(&m.map(|z| z * factor));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_hermitian(n: usize, rng: &mut StdRng) -> CMatrix {
        let m = CMatrix::from_fn(n, n, |_, _| c64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)));
        hermitize(&m)
    }

    fn random_overlap(n: usize, rng: &mut StdRng) -> CMatrix {
        let a = CMatrix::from_fn(n, n, |_, _| c64::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3)));
        CMatrix::identity(n, n) + &a * a.adjoint()
    }

    #[test]
    fn test_generalized_eigenproblem_residual() {
        let mut rng = StdRng::seed_from_u64(7);
        let f = random_hermitian(6, &mut rng);
        let s = random_overlap(6, &mut rng);
        let x = orthogonalizer(&s, 1e-10).unwrap();
        let (e, c) = eigh_generalized(&f, &x).unwrap();

        let lhs = &f * &c;
        let rhs = &s * &c * DMatrix::from_diagonal(&e.map(|v| c64::new(v, 0.0)));
        assert!((lhs - rhs).norm() < 1e-10, "F C != S C e");

        let metric = c.adjoint() * &s * &c;
        assert!((metric - CMatrix::identity(6, 6)).norm() < 1e-10);
        assert!(e.as_slice().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_orthogonalizer_rejects_indefinite_overlap() {
        let mut s = CMatrix::identity(3, 3);
        s[(2, 2)] = c64::new(-0.5, 0.0);
        match orthogonalizer(&s, 1e-10) {
            Err(ScfError::NumericalInstability(msg)) => assert!(msg.contains("not positive definite")),
            other => panic!("expected numerical instability, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_hermitian_power_inverse_sqrt() {
        let mut rng = StdRng::seed_from_u64(11);
        let s = random_overlap(5, &mut rng);
        let half = hermitian_power(&s, 0.5).unwrap();
        let inv_half = hermitian_power(&s, -0.5).unwrap();
        assert!((&half * &half - &s).norm() < 1e-10);
        assert!((&half * &inv_half - CMatrix::identity(5, 5)).norm() < 1e-10);
    }

    #[test]
    fn test_trace_helpers() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = random_hermitian(4, &mut rng);
        let b = random_hermitian(4, &mut rng);
        let product = &a * &b;
        assert!((real_trace_product(&a, &b) - product.trace().re).abs() < 1e-12);
        let diag = diag_of_product(&a, &b);
        for i in 0..4 {
            assert!((diag[i] - product[(i, i)]).norm() < 1e-12);
        }
    }

    #[test]
    fn test_pauli_matrices_are_hermitian() {
        let mut rng = StdRng::seed_from_u64(5);
        let m = random_hermitian(3, &mut rng);
        for c in 0..3 {
            let p = pauli_kron(c, &m);
            assert!((&p - p.adjoint()).norm() < 1e-14);
        }
        // sigma_z (x) m is diag(m, -m)
        let z = pauli_kron(2, &m);
        assert!((z - block_diag(&m, &scale(&m, -1.0))).norm() < 1e-14);
    }
}
