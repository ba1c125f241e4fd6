use crate::error::CellError;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Bravais lattice stored as row vectors `a1, a2, a3` in Bohr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    vectors: Matrix3<f64>,
}

impl Lattice {
    pub fn new(vectors: Matrix3<f64>) -> Result<Self, CellError> {
        if vectors.iter().any(|x| !x.is_finite()) {
            return Err(CellError::InvalidLattice(
                "lattice vectors contain non-finite values".to_string(),
            ));
        }
        let volume = vectors.determinant().abs();
        if volume < 1e-8 {
            return Err(CellError::InvalidLattice(format!(
                "lattice vectors are linearly dependent (volume {volume:.3e})"
            )));
        }
        Ok(Self { vectors })
    }

    /// Row `i` is lattice vector `a_i`.
    pub fn vectors(&self) -> &Matrix3<f64> {
        &self.vectors
    }

    pub fn volume(&self) -> f64 {
        self.vectors.determinant().abs()
    }

    /// Reciprocal vectors `b_i` as rows, with `a_i . b_j = 2 pi delta_ij`.
    pub fn reciprocal_vectors(&self) -> Matrix3<f64> {
        // `new` rejects singular lattices
        let inv = self
            .vectors
            .try_inverse()
            .unwrap_or_else(Matrix3::zeros);
        inv.transpose() * (2.0 * PI)
    }

    /// Cartesian position of the fractional coordinate `frac`.
    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.vectors.transpose() * frac
    }

    /// All lattice translations `L = n1 a1 + n2 a2 + n3 a3` with `|L| <= radius`,
    /// sorted by length. The zero translation always comes first.
    pub fn translations(&self, radius: f64) -> Vec<Vector3<f64>> {
        let recip = self.reciprocal_vectors();
        let bounds: Vec<i64> = (0..3)
            .map(|i| {
                // spacing between lattice planes orthogonal to b_i
                let spacing = 2.0 * PI / recip.row(i).norm();
                (radius / spacing).ceil() as i64
            })
            .collect();

        let mut images = Vec::new();
        for n1 in -bounds[0]..=bounds[0] {
            for n2 in -bounds[1]..=bounds[1] {
                for n3 in -bounds[2]..=bounds[2] {
                    let frac = Vector3::new(n1 as f64, n2 as f64, n3 as f64);
                    let l = self.to_cartesian(&frac);
                    if l.norm() <= radius + 1e-12 {
                        images.push(l);
                    }
                }
            }
        }
        images.sort_by(|a, b| a.norm().total_cmp(&b.norm()));
        images
    }
}
