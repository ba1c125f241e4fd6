use crate::error::CellError;
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};

/// Relative step between the exponents of the Gaussians that resolve one
/// `r^{2n} exp(-a r^2)` term.
const EXPONENT_STEP: f64 = 1e-2;

/// Local part of a Goedecker-Teter-Hutter pseudopotential,
///
/// `V(r) = -Z_ion/r erf(r / (sqrt(2) r_loc))
///        + exp(-(r/r_loc)^2 / 2) sum_i C_i (r/r_loc)^(2i-2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pseudopotential {
    pub family: String,
    pub z_ion: f64,
    pub r_loc: f64,
    /// `C_1..C_4`
    pub coefficients: [f64; 4],
}

// (symbol, valence charge, r_loc in Bohr, C1..C4) for the LDA (Pade) parametrization
const GTH_PADE: &[(&str, f64, f64, [f64; 4])] = &[
    ("H", 1.0, 0.2, [-4.0663326, 0.6778322, 0.0, 0.0]),
    ("He", 2.0, 0.2, [-9.1120234, 1.6983615, 0.0, 0.0]),
    ("Li", 3.0, 0.4, [-14.0093922, 9.5099073, -1.7532723, 0.0834586]),
    ("Be", 4.0, 0.325, [-24.0154804, 17.2183777, -3.3423162, 0.1651122]),
    ("B", 3.0, 0.43392956, [-5.57864161, 0.80425145, 0.0, 0.0]),
    ("C", 4.0, 0.33847124, [-8.80367398, 1.33921085, 0.0, 0.0]),
    ("N", 5.0, 0.28917923, [-12.23481988, 1.76640728, 0.0, 0.0]),
    ("O", 6.0, 0.24762086, [-16.58031797, 2.39570092, 0.0, 0.0]),
    ("F", 7.0, 0.21491544, [-21.30736112, 3.07286942, 0.0, 0.0]),
    ("Ne", 8.0, 0.19, [-27.69285182, 4.00590585, 0.0, 0.0]),
    ("Si", 4.0, 0.44, [-7.33610297, 0.0, 0.0, 0.0]),
];

impl Pseudopotential {
    /// Look up a pseudopotential family for an element. The LDA table is used
    /// for `gth-pade`, `gth-lda` and `gth-pbe`, whose local parts agree
    /// to within the accuracy of the local model.
    pub fn lookup(family: &str, element: &Element) -> Result<Self, CellError> {
        let key = family.to_lowercase().replace('_', "-");
        let table = match key.as_str() {
            "gth-pade" | "gth-lda" | "gth-pbe" => GTH_PADE,
            _ => {
                return Err(CellError::UnknownPseudo {
                    pseudo: family.to_string(),
                    element: element.get_symbol().to_string(),
                })
            }
        };
        table
            .iter()
            .find(|(sym, _, _, _)| *sym == element.get_symbol())
            .map(|&(_, z_ion, r_loc, coefficients)| Self {
                family: key.clone(),
                z_ion,
                r_loc,
                coefficients,
            })
            .ok_or_else(|| CellError::UnknownPseudo {
                pseudo: family.to_string(),
                element: element.get_symbol().to_string(),
            })
    }

    /// The short-range `C_i` terms as s-type Gaussians `[(c_j, g_j)]` with
    /// `sum_j c_j exp(-g_j r^2)` equal to the polynomial times Gaussian.
    ///
    /// `r^{2n} exp(-a r^2)` is resolved with the central difference
    /// `d^{-n} sum_j (-1)^j binom(n, j) exp(-(a + (j - n/2) d) r^2)`, which
    /// equals `exp(-a r^2) (2 sinh(d r^2 / 2) / d)^n` and so carries a relative
    /// error of `n (d r^2)^2 / 24`.
    pub fn local_gaussians(&self) -> Vec<(f64, f64)> {
        let a = 0.5 / (self.r_loc * self.r_loc);
        let d = EXPONENT_STEP * a;
        let mut terms = Vec::new();
        for (n, &c) in self.coefficients.iter().enumerate() {
            if c == 0.0 {
                continue;
            }
            // (r / r_loc)^{2n} = (2a)^n r^{2n}
            let scale = c * (2.0 * a / d).powi(n as i32);
            let mut binom = 1.0;
            for j in 0..=n {
                let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
                let gamma = a + (j as f64 - 0.5 * n as f64) * d;
                terms.push((sign * binom * scale, gamma));
                binom = binom * (n - j) as f64 / (j + 1) as f64;
            }
        }
        terms
    }

    /// `exp(-(r/r_loc)^2 / 2) sum_i C_i (r/r_loc)^(2i-2)`
    pub fn short_range(&self, r: f64) -> f64 {
        let x2 = (r / self.r_loc).powi(2);
        let poly = self
            .coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x2 + c);
        (-0.5 * x2).exp() * poly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carbon_pade() {
        let carbon = Element::from_symbol("C").unwrap();
        let pp = Pseudopotential::lookup("GTH-PADE", &carbon).unwrap();
        assert_eq!(pp.z_ion, 4.0);
        assert!((pp.r_loc - 0.33847124).abs() < 1e-12);
        assert_eq!(pp.coefficients, [-8.80367398, 1.33921085, 0.0, 0.0]);
    }

    #[test]
    fn test_local_gaussians_reproduce_short_range_part() {
        for symbol in ["C", "Li"] {
            let element = Element::from_symbol(symbol).unwrap();
            let pp = Pseudopotential::lookup("gth-pade", &element).unwrap();
            let terms = pp.local_gaussians();
            for r in [0.0, 0.1, 0.3, 0.6, 1.0, 1.5] {
                let exact = pp.short_range(r);
                let fitted: f64 = terms.iter().map(|&(c, g)| c * (-g * r * r).exp()).sum();
                assert!(
                    (fitted - exact).abs() < 1e-3 * (1.0 + exact.abs()),
                    "{symbol} at r = {r}: {fitted} vs {exact}"
                );
            }
        }
    }

    #[test]
    fn test_core_attraction_is_deepened() {
        let carbon = Element::from_symbol("C").unwrap();
        let pp = Pseudopotential::lookup("gth-pade", &carbon).unwrap();
        assert!((pp.short_range(0.0) - pp.coefficients[0]).abs() < 1e-12);
        assert!(pp.short_range(0.0) < 0.0);
        assert!(pp.short_range(10.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_family() {
        let carbon = Element::from_symbol("C").unwrap();
        assert!(matches!(
            Pseudopotential::lookup("hgh-nlcc", &carbon),
            Err(CellError::UnknownPseudo { .. })
        ));
    }

    #[test]
    fn test_missing_element() {
        let gold = Element::from_symbol("Au").unwrap();
        assert!(Pseudopotential::lookup("gth-pade", &gold).is_err());
    }
}
