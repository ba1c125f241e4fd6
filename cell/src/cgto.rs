/* Contracted Cartesian Gaussian shells and the built-in basis library,
   read from NWChem-format text embedded at compile time.
*/

use crate::error::CellError;
use crate::gto::{cartesian_components, cartesian_norm};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A contracted shell of angular momentum `l`, centre-free.
///
/// `coefficients` multiply normalized primitives and already include the
/// contraction normalization, so every Cartesian component has unit norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractedShell {
    pub l: usize,
    pub exponents: Vec<f64>,
    pub coefficients: Vec<f64>,
}

impl ContractedShell {
    pub fn new(l: usize, exponents: Vec<f64>, coefficients: Vec<f64>) -> Self {
        let mut shell = Self {
            l,
            exponents,
            coefficients,
        };
        shell.normalize();
        shell
    }

    /// Number of Cartesian components.
    pub fn ncart(&self) -> usize {
        (self.l + 1) * (self.l + 2) / 2
    }

    pub fn components(&self) -> Vec<[usize; 3]> {
        cartesian_components(self.l)
    }

    /// Coefficient of primitive `p` for component `lmn`, including the primitive norm.
    pub fn scaled_coefficient(&self, p: usize, lmn: [usize; 3]) -> f64 {
        self.coefficients[p] * cartesian_norm(self.exponents[p], lmn)
    }

    /// `scaled_coefficient` for every component (outer index) and primitive.
    pub fn component_coefficients(&self) -> Vec<Vec<f64>> {
        self.components()
            .into_iter()
            .map(|lmn| {
                (0..self.exponents.len())
                    .map(|p| self.scaled_coefficient(p, lmn))
                    .collect()
            })
            .collect()
    }

    /// Coefficient-weighted mean exponent, a single width for the shell's charge cloud.
    pub fn mean_exponent(&self) -> f64 {
        let total: f64 = self.coefficients.iter().map(|c| c.abs()).sum();
        if total == 0.0 {
            return self.exponents.iter().copied().fold(0.0, f64::max);
        }
        self.exponents
            .iter()
            .zip(&self.coefficients)
            .map(|(a, c)| a * c.abs())
            .sum::<f64>()
            / total
    }

    pub fn min_exponent(&self) -> f64 {
        self.exponents
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    fn normalize(&mut self) {
        // same-centre overlap of normalized primitives:
        // (2 sqrt(a b) / (a + b))^(l + 3/2), identical for every component
        let power = self.l as f64 + 1.5;
        let mut norm2 = 0.0;
        for (i, (ai, ci)) in self.exponents.iter().zip(&self.coefficients).enumerate() {
            for (j, (aj, cj)) in self.exponents.iter().zip(&self.coefficients).enumerate().skip(i) {
                let s = (2.0 * (ai * aj).sqrt() / (ai + aj)).powf(power);
                let factor = if i == j { 1.0 } else { 2.0 };
                norm2 += factor * ci * cj * s;
            }
        }
        if norm2 > 0.0 {
            let scale = 1.0 / norm2.sqrt();
            self.coefficients.iter_mut().for_each(|c| *c *= scale);
        }
    }
}

/// Basis functions per element symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisSet {
    pub name: String,
    shells: HashMap<String, Vec<ContractedShell>>,
}

const STO_3G: &str = include_str!("../data/sto-3g.nwchem");
const GTH_SZV: &str = include_str!("../data/gth-szv.nwchem");
const GTH_DZVP: &str = include_str!("../data/gth-dzvp.nwchem");

fn canonical_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase()
}

fn angular_momentum(label: char) -> Option<usize> {
    match label {
        'S' => Some(0),
        'P' => Some(1),
        'D' => Some(2),
        'F' => Some(3),
        _ => None,
    }
}

impl BasisSet {
    /// Look up a basis set from the built-in library.
    pub fn library(name: &str) -> Result<Self, CellError> {
        let text = match canonical_name(name).as_str() {
            "sto3g" => STO_3G,
            "gthszv" => GTH_SZV,
            "gthdzvp" => GTH_DZVP,
            _ => return Err(CellError::UnknownBasis(name.to_string())),
        };
        Self::parse_nwchem(name, text)
    }

    /// Parse NWChem text. Example:
    ///
    /// ```text
    /// C    S
    ///       71.6168370              0.15432897
    ///       13.0450960              0.53532814
    ///        3.5305122              0.44463454
    /// C    SP
    ///        2.9412494             -0.09996723             0.15591627
    /// ```
    ///
    /// `SP` blocks give one s and one p shell; plain blocks with several
    /// coefficient columns give one shell per column (general contraction).
    pub fn parse_nwchem(name: &str, input: &str) -> Result<Self, CellError> {
        let mut shells: HashMap<String, Vec<ContractedShell>> = HashMap::new();
        let mut current: Option<(String, String)> = None;
        let mut rows: Vec<Vec<f64>> = Vec::new();

        let mut flush = |current: &Option<(String, String)>,
                         rows: &mut Vec<Vec<f64>>|
         -> Result<(), CellError> {
            if let Some((element, label)) = current {
                let parsed = Self::parse_block(label, rows)?;
                shells.entry(element.clone()).or_default().extend(parsed);
            }
            rows.clear();
            Ok(())
        };

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("BASIS") {
                continue;
            }
            if line.starts_with("END") {
                flush(&current, &mut rows)?;
                current = None;
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let is_header = tokens.len() == 2
                && tokens[0].chars().all(|c| c.is_ascii_alphabetic())
                && tokens[1].chars().all(|c| angular_momentum(c).is_some());
            if is_header {
                flush(&current, &mut rows)?;
                current = Some((tokens[0].to_string(), tokens[1].to_string()));
                continue;
            }

            if current.is_none() {
                return Err(CellError::BasisParse(format!(
                    "primitive line outside a shell block: '{line}'"
                )));
            }
            let values = tokens
                .iter()
                .map(|t| t.replace(['D', 'd'], "E").parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CellError::BasisParse(format!("'{line}': {e}")))?;
            rows.push(values);
        }
        flush(&current, &mut rows)?;

        Ok(Self {
            name: name.to_string(),
            shells,
        })
    }

    fn parse_block(label: &str, rows: &[Vec<f64>]) -> Result<Vec<ContractedShell>, CellError> {
        let ncol = rows.first().map(|r| r.len()).unwrap_or(0);
        if ncol < 2 || rows.iter().any(|r| r.len() != ncol) {
            return Err(CellError::BasisParse(format!(
                "shell block {label} needs an exponent and at least one coefficient per row"
            )));
        }
        let ls: Vec<usize> = if label == "SP" {
            if ncol != 3 {
                return Err(CellError::BasisParse(
                    "SP block needs exactly two coefficient columns".to_string(),
                ));
            }
            vec![0, 1]
        } else {
            let l = label
                .chars()
                .next()
                .and_then(angular_momentum)
                .ok_or_else(|| CellError::BasisParse(format!("unknown shell label {label}")))?;
            vec![l; ncol - 1]
        };

        Ok(ls
            .into_iter()
            .enumerate()
            .map(|(col, l)| {
                // zero coefficients occur in general contractions; drop those primitives
                let (exponents, coefficients): (Vec<f64>, Vec<f64>) = rows
                    .iter()
                    .filter(|r| r[col + 1] != 0.0)
                    .map(|r| (r[0], r[col + 1]))
                    .unzip();
                ContractedShell::new(l, exponents, coefficients)
            })
            .collect())
    }

    pub fn shells(&self, symbol: &str) -> Option<&[ContractedShell]> {
        self.shells.get(symbol).map(|v| v.as_slice())
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.shells.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gto::{pair_elements, CartesianPrimitive};
    use nalgebra::Vector3;

    fn self_overlap(shell: &ContractedShell, lmn: [usize; 3]) -> f64 {
        let mut total = 0.0;
        for p in 0..shell.exponents.len() {
            for q in 0..shell.exponents.len() {
                let a = CartesianPrimitive {
                    alpha: shell.exponents[p],
                    lmn,
                    center: Vector3::zeros(),
                };
                let b = CartesianPrimitive {
                    alpha: shell.exponents[q],
                    lmn,
                    center: Vector3::zeros(),
                };
                total += shell.scaled_coefficient(p, lmn)
                    * shell.scaled_coefficient(q, lmn)
                    * pair_elements(&a, &b, None).overlap;
            }
        }
        total
    }

    #[test]
    fn test_parse_sp_block() {
        let text = "
C    S
     71.6168370    0.15432897
     13.0450960    0.53532814
      3.5305122    0.44463454
C    SP
      2.9412494   -0.09996723    0.15591627
      0.6834831    0.39951283    0.60768372
      0.2222899    0.70011547    0.39195739
END";
        let basis = BasisSet::parse_nwchem("test", text).unwrap();
        let shells = basis.shells("C").unwrap();
        assert_eq!(shells.len(), 3);
        assert_eq!(shells.iter().map(|s| s.l).collect::<Vec<_>>(), vec![0, 0, 1]);
        assert_eq!(shells[2].exponents.len(), 3);
    }

    #[test]
    fn test_general_contraction_columns() {
        let text = "
H    S
      8.3744350   -0.0283380    0.0
      1.8058681   -0.1333810    0.0
      0.4852532   -0.3995676    0.0
      0.1658236   -0.5531028    1.0
";
        let basis = BasisSet::parse_nwchem("test", text).unwrap();
        let shells = basis.shells("H").unwrap();
        assert_eq!(shells.len(), 2);
        assert_eq!(shells[1].exponents, vec![0.1658236]);
    }

    #[test]
    fn test_contractions_are_normalized() {
        let basis = BasisSet::library("gth-dzvp").unwrap();
        for shell in basis.shells("C").unwrap() {
            for lmn in shell.components() {
                let s = self_overlap(shell, lmn);
                assert!((s - 1.0).abs() < 1e-10, "l = {} {:?}: {}", shell.l, lmn, s);
            }
        }
    }

    #[test]
    fn test_library_lookup() {
        let sto3g = BasisSet::library("STO-3G").unwrap();
        assert_eq!(sto3g.shells("C").map(|s| s.len()), Some(3));
        assert_eq!(sto3g.shells("H").map(|s| s.len()), Some(1));
        let szv = BasisSet::library("gth_szv").unwrap();
        assert_eq!(szv.shells("C").map(|s| s.len()), Some(2));
        assert!(matches!(
            BasisSet::library("cc-pvqz"),
            Err(CellError::UnknownBasis(_))
        ));
    }

    #[test]
    fn test_malformed_row_reported() {
        let text = "C S\n 1.0 abc\n";
        assert!(matches!(
            BasisSet::parse_nwchem("bad", text),
            Err(CellError::BasisParse(_))
        ));
    }
}
