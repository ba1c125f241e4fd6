use crate::cgto::{BasisSet, ContractedShell};
use crate::error::CellError;
use crate::kpts::KPoints;
use crate::lattice::Lattice;
use crate::pseudo::Pseudopotential;
use nalgebra::{Matrix3, Vector3};
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Angstrom per Bohr.
pub const BOHR: f64 = 0.52917721092;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    Angstrom,
    Bohr,
}

impl Unit {
    fn to_bohr(self) -> f64 {
        match self {
            Unit::Angstrom => 1.0 / BOHR,
            Unit::Bohr => 1.0,
        }
    }
}

impl FromStr for Unit {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a" | "ang" | "angstrom" => Ok(Unit::Angstrom),
            "b" | "au" | "bohr" => Ok(Unit::Bohr),
            other => Err(CellError::InvalidLattice(format!("unknown length unit '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub symbol: String,
    pub atomic_number: usize,
    /// Cartesian position in Bohr.
    pub position: Vector3<f64>,
}

/// A basis shell placed on an atom of the reference cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedShell {
    pub atom: usize,
    pub center: Vector3<f64>,
    pub shell: ContractedShell,
    /// Index of the shell's first AO.
    pub ao_offset: usize,
}

/// Immutable periodic cell: lattice, atoms, basis functions and optional
/// pseudopotentials. Lengths are stored in Bohr.
#[derive(Debug, Clone)]
pub struct Cell {
    atoms: Vec<Atom>,
    lattice: Lattice,
    basis_name: String,
    pseudo: Option<Vec<Pseudopotential>>,
    shells: Vec<PlacedShell>,
    nao: usize,
    charge: i32,
    precision: f64,
}

impl Cell {
    pub fn builder() -> CellBuilder {
        CellBuilder::default()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn natm(&self) -> usize {
        self.atoms.len()
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn basis_name(&self) -> &str {
        &self.basis_name
    }

    pub fn has_pseudo(&self) -> bool {
        self.pseudo.is_some()
    }

    pub fn pseudopotential(&self, atom: usize) -> Option<&Pseudopotential> {
        self.pseudo.as_ref().and_then(|pp| pp.get(atom))
    }

    /// Charge of the ion core seen by the electrons: the pseudo-ion charge when
    /// a pseudopotential is attached, otherwise the nuclear charge.
    pub fn atom_charge(&self, atom: usize) -> f64 {
        match self.pseudopotential(atom) {
            Some(pp) => pp.z_ion,
            None => self.atoms[atom].atomic_number as f64,
        }
    }

    /// Number of electrons per cell.
    pub fn nelectron(&self) -> usize {
        let total: f64 = (0..self.natm()).map(|i| self.atom_charge(i)).sum();
        (total.round() as i64 - self.charge as i64).max(0) as usize
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn shells(&self) -> &[PlacedShell] {
        &self.shells
    }

    pub fn nao(&self) -> usize {
        self.nao
    }

    /// Atom index of every AO.
    pub fn ao_atom_map(&self) -> Vec<usize> {
        self.shells
            .iter()
            .flat_map(|s| std::iter::repeat(s.atom).take(s.shell.ncart()))
            .collect()
    }

    pub fn ao_labels(&self) -> Vec<String> {
        const AXES: [char; 3] = ['x', 'y', 'z'];
        const L: [char; 4] = ['s', 'p', 'd', 'f'];
        let mut labels = Vec::with_capacity(self.nao);
        for s in &self.shells {
            for lmn in s.shell.components() {
                let mut label = format!("{} {} {}", s.atom, self.atoms[s.atom].symbol, L[s.shell.l.min(3)]);
                for (axis, &power) in AXES.iter().zip(&lmn) {
                    (0..power).for_each(|_| label.push(*axis));
                }
                labels.push(label);
            }
        }
        labels
    }

    /// Target accuracy of lattice sums.
    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn make_kpts(&self, mesh: [usize; 3], wrap_around: bool) -> Result<KPoints, CellError> {
        KPoints::from_mesh(&self.lattice, mesh, wrap_around)
    }
}

/// Builder for [`Cell`]; geometry strings follow the usual
/// `"C 0 0 0; C 0.89 0.89 0.89"` form.
#[derive(Debug, Clone)]
pub struct CellBuilder {
    atom: Option<String>,
    a: Option<String>,
    lattice: Option<Matrix3<f64>>,
    basis: String,
    pseudo: Option<String>,
    unit: Unit,
    charge: i32,
    precision: f64,
}

impl Default for CellBuilder {
    fn default() -> Self {
        Self {
            atom: None,
            a: None,
            lattice: None,
            basis: "sto-3g".to_string(),
            pseudo: None,
            unit: Unit::Angstrom,
            charge: 0,
            precision: 1e-8,
        }
    }
}

impl CellBuilder {
    pub fn atom(mut self, atom: &str) -> Self {
        self.atom = Some(atom.to_string());
        self
    }

    /// Lattice vectors as nine numbers, one vector per row.
    pub fn a(mut self, a: &str) -> Self {
        self.a = Some(a.to_string());
        self
    }

    /// Lattice vectors as matrix rows, in the builder's unit.
    pub fn lattice(mut self, rows: Matrix3<f64>) -> Self {
        self.lattice = Some(rows);
        self
    }

    pub fn basis(mut self, basis: &str) -> Self {
        self.basis = basis.to_string();
        self
    }

    pub fn pseudo(mut self, pseudo: &str) -> Self {
        self.pseudo = Some(pseudo.to_string());
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    pub fn precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn build(self) -> Result<Cell, CellError> {
        let scale = self.unit.to_bohr();

        let atoms: Vec<Atom> = parse_atoms(self.atom.as_deref().unwrap_or(""), scale)?;
        if atoms.is_empty() {
            return Err(CellError::EmptyCell);
        }

        let rows = match (self.lattice, self.a.as_deref()) {
            (Some(rows), _) => rows,
            (None, Some(text)) => parse_lattice(text)?,
            (None, None) => {
                return Err(CellError::InvalidLattice(
                    "no lattice vectors given".to_string(),
                ))
            }
        };
        let lattice = Lattice::new(rows * scale)?;

        if !(self.precision > 0.0 && self.precision < 1.0) {
            return Err(CellError::InvalidLattice(format!(
                "lattice-sum precision must lie in (0, 1), got {}",
                self.precision
            )));
        }

        let basis = BasisSet::library(&self.basis)?;
        let mut shells = Vec::new();
        let mut nao = 0;
        for (i, atom) in atoms.iter().enumerate() {
            let atom_shells = basis.shells(&atom.symbol).ok_or_else(|| CellError::MissingBasis {
                basis: self.basis.clone(),
                element: atom.symbol.clone(),
            })?;
            for shell in atom_shells {
                shells.push(PlacedShell {
                    atom: i,
                    center: atom.position,
                    shell: shell.clone(),
                    ao_offset: nao,
                });
                nao += shell.ncart();
            }
        }

        let pseudo = match &self.pseudo {
            Some(family) => Some(
                atoms
                    .iter()
                    .map(|atom| {
                        let element = Element::from_symbol(&atom.symbol)
                            .ok_or_else(|| CellError::UnknownElement(atom.symbol.clone()))?;
                        Pseudopotential::lookup(family, &element)
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let cell = Cell {
            atoms,
            lattice,
            basis_name: self.basis,
            pseudo,
            shells,
            nao,
            charge: self.charge,
            precision: self.precision,
        };
        let total: f64 = (0..cell.natm()).map(|i| cell.atom_charge(i)).sum();
        if (self.charge as f64) > total {
            return Err(CellError::InvalidCharge(self.charge));
        }
        debug!(
            "Built cell: {} atoms, {} AOs, {} electrons, volume {:.6} Bohr^3",
            cell.natm(),
            cell.nao(),
            cell.nelectron(),
            cell.lattice().volume()
        );
        Ok(cell)
    }
}

fn canonical_symbol(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn parse_atoms(text: &str, scale: f64) -> Result<Vec<Atom>, CellError> {
    text.split([';', '\n'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let tokens: Vec<&str> = entry
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.len() != 4 {
                return Err(CellError::InvalidAtom(entry.to_string()));
            }
            let symbol = canonical_symbol(tokens[0]);
            let element = Element::from_symbol(&symbol)
                .ok_or_else(|| CellError::UnknownElement(tokens[0].to_string()))?;
            let coords = tokens[1..]
                .iter()
                .map(|t| t.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| CellError::InvalidAtom(entry.to_string()))?;
            Ok(Atom {
                symbol,
                atomic_number: element.get_atomic_number() as usize,
                position: Vector3::new(coords[0], coords[1], coords[2]) * scale,
            })
        })
        .collect()
}

fn parse_lattice(text: &str) -> Result<Matrix3<f64>, CellError> {
    let values = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CellError::InvalidLattice(format!("'{text}': {e}")))?;
    if values.len() != 9 {
        return Err(CellError::InvalidLattice(format!(
            "expected 9 numbers, found {}",
            values.len()
        )));
    }
    Ok(Matrix3::from_row_slice(&values))
}
