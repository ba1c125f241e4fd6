use crate::error::CellError;
use crate::lattice::Lattice;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Ordered set of k-points in Cartesian reciprocal coordinates (1/Bohr)
/// with normalized weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KPoints {
    kpts: Vec<Vector3<f64>>,
    weights: Vec<f64>,
}

impl KPoints {
    /// The single Gamma point.
    pub fn gamma() -> Self {
        Self::from_cartesian(vec![Vector3::zeros()])
    }

    /// Uniform weights over explicitly given Cartesian k-points.
    pub fn from_cartesian(kpts: Vec<Vector3<f64>>) -> Self {
        let nk = kpts.len().max(1) as f64;
        let weights = vec![1.0 / nk; kpts.len()];
        Self { kpts, weights }
    }

    /// Monkhorst-Pack style mesh including Gamma. Fractional coordinates along
    /// axis `d` are `i / mesh[d]`; with `wrap_around` those at or beyond one half
    /// are folded to the negative side. The first axis varies slowest.
    pub fn from_mesh(
        lattice: &Lattice,
        mesh: [usize; 3],
        wrap_around: bool,
    ) -> Result<Self, CellError> {
        if mesh.iter().any(|&n| n == 0) {
            return Err(CellError::InvalidMesh(mesh));
        }
        let axis = |n: usize| -> Vec<f64> {
            (0..n)
                .map(|i| {
                    let f = i as f64 / n as f64;
                    if wrap_around && f >= 0.5 {
                        f - 1.0
                    } else {
                        f
                    }
                })
                .collect()
        };
        let (fx, fy, fz) = (axis(mesh[0]), axis(mesh[1]), axis(mesh[2]));
        let b = lattice.reciprocal_vectors();

        let mut kpts = Vec::with_capacity(mesh.iter().product());
        for &x in &fx {
            for &y in &fy {
                for &z in &fz {
                    kpts.push(b.transpose() * Vector3::new(x, y, z));
                }
            }
        }
        Ok(Self::from_cartesian(kpts))
    }

    pub fn len(&self) -> usize {
        self.kpts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kpts.is_empty()
    }

    pub fn kpts(&self) -> &[Vector3<f64>] {
        &self.kpts
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vector3<f64>, f64)> {
        self.kpts.iter().zip(self.weights.iter().copied())
    }

    /// True when every k-point is Gamma, so all Bloch sums are real.
    pub fn is_gamma_only(&self) -> bool {
        self.kpts.iter().all(|k| k.norm() < 1e-12)
    }
}
