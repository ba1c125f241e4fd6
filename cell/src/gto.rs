#![allow(non_snake_case)]
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One Cartesian factor `N (x - A)^l exp(-alpha (x - A)^2)`.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO1d {
    pub alpha: f64,
    pub l: i32,
    pub center: f64,
    pub norm: f64,
}

fn factorial(n: i32) -> f64 {
    (1..=n).fold(1.0, |acc, x| acc * x as f64)
}

impl GTO1d {
    pub fn new(alpha: f64, l: i32, center: f64) -> Self {
        let norm = GTO1d::compute_norm(alpha, l);
        Self {
            alpha,
            l,
            center,
            norm,
        }
    }

    /// N^2 = (2^(3l) l! alpha^l sqrt(2 alpha / pi)) / (2l)!
    pub fn compute_norm(alpha: f64, l: i32) -> f64 {
        let numerator = 2.0_f64.powi(3 * l) * factorial(l) * alpha.powi(l);
        let factor = (2.0 * alpha / PI).sqrt();
        (numerator * factor / factorial(2 * l)).sqrt()
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let x = x - self.center;
        self.norm * x.powi(self.l) * (-self.alpha * x.powi(2)).exp()
    }

    pub fn derivative(&self, x: f64) -> f64 {
        let x = x - self.center;
        let term1 = if self.l > 0 {
            self.l as f64 * x.powi(self.l - 1)
        } else {
            0.0
        };
        let term2 = -2.0 * self.alpha * x.powi(self.l + 1);
        self.norm * (term1 + term2) * (-self.alpha * x.powi(2)).exp()
    }
}

/// Obara-Saika table of one-dimensional Gaussian product integrals
///
/// `I[i][j] = int (x-A)^i (x-B)^j exp(-a (x-A)^2 - b (x-B)^2 - c (x-C)^2) dx`
///
/// for `i <= i_max`, `j <= j_max`. A zero `c` drops the third Gaussian.
pub fn overlap_table_1d(
    (a, A): (f64, f64),
    i_max: usize,
    (b, B): (f64, f64),
    j_max: usize,
    (c, C): (f64, f64),
) -> Vec<Vec<f64>> {
    let p = a + b + c;
    let P = (a * A + b * B + c * C) / p;
    let K = (-(a * b * (A - B).powi(2) + a * c * (A - C).powi(2) + b * c * (B - C).powi(2)) / p)
        .exp();
    let (PA, PB) = (P - A, P - B);
    let half_inv_p = 0.5 / p;

    let mut t = vec![vec![0.0; j_max + 1]; i_max + 1];
    t[0][0] = K * (PI / p).sqrt();
    for i in 0..i_max {
        let lower = if i > 0 { i as f64 * t[i - 1][0] } else { 0.0 };
        t[i + 1][0] = PA * t[i][0] + half_inv_p * lower;
    }
    for j in 0..j_max {
        for i in 0..=i_max {
            let mut lower = 0.0;
            if i > 0 {
                lower += i as f64 * t[i - 1][j];
            }
            if j > 0 {
                lower += j as f64 * t[i][j - 1];
            }
            t[i][j + 1] = PB * t[i][j] + half_inv_p * lower;
        }
    }
    t
}

/// Unnormalized Cartesian primitive `(x-A)^lx (y-A)^ly (z-A)^lz exp(-alpha |r-A|^2)`.
#[derive(Debug, Clone, Copy)]
pub struct CartesianPrimitive {
    pub alpha: f64,
    pub lmn: [usize; 3],
    pub center: Vector3<f64>,
}

/// Matrix elements of a primitive pair against an optional s-type weight
/// `exp(-gamma |r-C|^2)`.
///
/// `grad[i][j] = <d_i a | w | d_j b>`; kinetic energy is `grad.trace() / 2`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairElements {
    pub overlap: f64,
    pub grad: [[f64; 3]; 3],
}

impl PairElements {
    pub fn kinetic(&self) -> f64 {
        0.5 * (self.grad[0][0] + self.grad[1][1] + self.grad[2][2])
    }

    pub fn grad_trace(&self) -> f64 {
        self.grad[0][0] + self.grad[1][1] + self.grad[2][2]
    }

    /// `eps_cij <d_i a | w | d_j b>` for component `c`.
    pub fn curl(&self, c: usize) -> f64 {
        let (i, j) = ((c + 1) % 3, (c + 2) % 3);
        self.grad[i][j] - self.grad[j][i]
    }

    pub fn add_scaled(&mut self, other: &PairElements, factor: f64) {
        self.overlap += factor * other.overlap;
        for i in 0..3 {
            for j in 0..3 {
                self.grad[i][j] += factor * other.grad[i][j];
            }
        }
    }
}

/// Prefactor `exp(-(ab AB^2 + ac AC^2 + bc BC^2) / p)` of a three-Gaussian product,
/// used to screen negligible primitive products before building tables.
pub fn product_prefactor(
    (a, A): (f64, &Vector3<f64>),
    (b, B): (f64, &Vector3<f64>),
    (c, C): (f64, &Vector3<f64>),
) -> f64 {
    let p = a + b + c;
    (-(a * b * (A - B).norm_squared() + a * c * (A - C).norm_squared() + b * c * (B - C).norm_squared())
        / p)
        .exp()
}

/// 1D tables for every Cartesian component pair of two shells sharing one
/// primitive exponent each.
pub struct PairTables {
    alpha: f64,
    beta: f64,
    tables: [Vec<Vec<f64>>; 3],
}

impl PairTables {
    /// Tables cover angular momenta up to `la`/`lb` plus one for derivatives.
    pub fn new(
        (alpha, A, la): (f64, &Vector3<f64>, usize),
        (beta, B, lb): (f64, &Vector3<f64>, usize),
        weight: Option<(f64, Vector3<f64>)>,
    ) -> Self {
        let (gamma, C) = weight.unwrap_or((0.0, Vector3::zeros()));
        let tables = [0, 1, 2].map(|d| {
            overlap_table_1d((alpha, A[d]), la + 1, (beta, B[d]), lb + 1, (gamma, C[d]))
        });
        Self {
            alpha,
            beta,
            tables,
        }
    }

    pub fn elements(&self, lmn_a: [usize; 3], lmn_b: [usize; 3]) -> PairElements {
        // per dimension: plain, <d a|b>, <a|d b>, <d a|d b>
        let mut plain = [0.0; 3];
        let mut da = [0.0; 3];
        let mut db = [0.0; 3];
        let mut dadb = [0.0; 3];
        for d in 0..3 {
            let t = &self.tables[d];
            let (la, lb) = (lmn_a[d], lmn_b[d]);
            // d/dx (x-A)^l e^{-a(x-A)^2} = l (x-A)^{l-1} - 2a (x-A)^{l+1}
            let left = |j: usize| -> f64 {
                let down = if la > 0 { la as f64 * t[la - 1][j] } else { 0.0 };
                down - 2.0 * self.alpha * t[la + 1][j]
            };
            plain[d] = t[la][lb];
            da[d] = left(lb);
            let down = if lb > 0 { lb as f64 * t[la][lb - 1] } else { 0.0 };
            db[d] = down - 2.0 * self.beta * t[la][lb + 1];

            let mut both = -2.0 * self.beta * left(lb + 1);
            if lb > 0 {
                both += lb as f64 * left(lb - 1);
            }
            dadb[d] = both;
        }

        let mut grad = [[0.0; 3]; 3];
        for (i, row) in grad.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (0..3)
                    .map(|d| match (d == i, d == j) {
                        (true, true) => dadb[d],
                        (true, false) => da[d],
                        (false, true) => db[d],
                        (false, false) => plain[d],
                    })
                    .product();
            }
        }

        PairElements {
            overlap: plain[0] * plain[1] * plain[2],
            grad,
        }
    }
}

pub fn pair_elements(
    a: &CartesianPrimitive,
    b: &CartesianPrimitive,
    weight: Option<(f64, Vector3<f64>)>,
) -> PairElements {
    let la = a.lmn.iter().copied().max().unwrap_or(0);
    let lb = b.lmn.iter().copied().max().unwrap_or(0);
    PairTables::new((a.alpha, &a.center, la), (b.alpha, &b.center, lb), weight)
        .elements(a.lmn, b.lmn)
}

/// Cartesian exponents of angular momentum `l` in the order
/// xx, xy, xz, yy, yz, zz (x power descending, then y).
pub fn cartesian_components(l: usize) -> Vec<[usize; 3]> {
    (0..=l)
        .rev()
        .flat_map(|lx| (0..=l - lx).rev().map(move |ly| [lx, ly, l - lx - ly]))
        .collect()
}

/// Normalization of a Cartesian primitive as the product of 1D norms.
pub fn cartesian_norm(alpha: f64, lmn: [usize; 3]) -> f64 {
    lmn.iter()
        .map(|&l| GTO1d::compute_norm(alpha, l as i32))
        .product()
}
