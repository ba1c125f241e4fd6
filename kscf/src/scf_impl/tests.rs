//! Tests for the Kohn-Sham SCF driver

use super::{Generalized, InitGuess, KohnShamScf, Restricted, ScfSettings, Smearing, SCF};
use crate::error::{ScfError, StopReason};
use crate::hamiltonian::{GaussianModel, HamiltonianBuilder, HamiltonianBuilderExt};
use crate::linalg::{scale, CMatrix};
use cell::Cell;

fn diamond_with(basis: &str, charge: i32) -> Cell {
    Cell::builder()
        .atom("C 0 0 0; C 0.8917 0.8917 0.8917")
        .a("0 1.7834 1.7834\n1.7834 0 1.7834\n1.7834 1.7834 0")
        .basis(basis)
        .pseudo("gth-pade")
        .charge(charge)
        .build()
        .unwrap()
}

fn diamond(charge: i32) -> Cell {
    diamond_with("gth-szv", charge)
}

fn model(mesh: [usize; 3]) -> GaussianModel {
    let cell = diamond(0);
    let kpts = cell.make_kpts(mesh, true).unwrap();
    GaussianModel::new(cell, kpts).unwrap()
}

fn tight() -> ScfSettings {
    ScfSettings::builder()
        .conv_tol(1e-10)
        .max_cycle(100)
        .build()
        .unwrap()
}

#[test]
fn test_kgks_matches_krks() {
    let model = model([2, 1, 1]);
    let mut krks = KohnShamScf::krks(&model, tight()).unwrap();
    let mut kgks = KohnShamScf::kgks(&model, tight()).unwrap();
    let e_r = krks.kernel().unwrap();
    let e_g = kgks.kernel().unwrap();

    assert!(krks.converged() && kgks.converged());
    assert!((e_r - e_g).abs() < 1e-8, "KRKS {e_r} vs KGKS {e_g}");
    assert_eq!(krks.method(), "KRKS");
    assert_eq!(kgks.method(), "KGKS");

    // every spatial level appears twice in the spinor spectrum
    let n = model.nao();
    let spatial = &krks.mo_energy()[1];
    let spinor = &kgks.mo_energy()[1];
    assert_eq!(spinor.len(), 2 * n);
    for i in 0..n {
        assert!((spinor[2 * i] - spatial[i]).abs() < 1e-6);
        assert!((spinor[2 * i + 1] - spatial[i]).abs() < 1e-6);
    }
}

#[test]
fn test_kgks_matches_krks_in_split_valence_basis() {
    let cell = diamond_with("gth-dzvp", 0);
    let kpts = cell.make_kpts([2, 1, 1], true).unwrap();
    let model = GaussianModel::new(cell, kpts).unwrap();
    let mut krks = KohnShamScf::krks(&model, tight()).unwrap();
    let mut kgks = KohnShamScf::kgks(&model, tight()).unwrap();
    let e_r = krks.kernel().unwrap();
    let e_g = kgks.kernel().unwrap();
    assert!((e_r - e_g).abs() < 1e-8, "KRKS {e_r:.12} vs KGKS {e_g:.12}");

    // no spin polarization develops in the spinor density
    let n = model.nao();
    for d in kgks.density() {
        let aa = d.view((0, 0), (n, n));
        let bb = d.view((n, n), (n, n));
        assert!((aa - bb).norm() < 1e-6);
        assert!(d.view((0, n), (n, n)).norm() < 1e-6);
    }
}

#[test]
fn test_converged_density_is_idempotent() {
    let model = model([2, 1, 1]);
    let mut scf = KohnShamScf::krks(&model, tight()).unwrap();
    scf.kernel().unwrap();

    for (d, s) in scf.density().iter().zip(model.overlap()) {
        let dsd = d * s * d;
        assert!((dsd - scale(d, 2.0)).norm() < 1e-8);
    }
    let count = scf.electron_count(scf.density());
    assert!((count - 8.0).abs() < 1e-8);

    let e = scf.energy_components();
    assert!((e.total() - scf.energy_tot()).abs() < 1e-12);
    assert_eq!(e.smearing, 0.0);
    assert!(e.nuclear == model.energy_nuc());
}

#[test]
fn test_diis_accelerates_convergence() {
    let model = model([2, 1, 1]);
    let mut accelerated = KohnShamScf::krks(&model, tight()).unwrap();
    let e_diis = accelerated.kernel().unwrap();

    let plain_settings = ScfSettings::builder()
        .conv_tol(1e-10)
        .max_cycle(100)
        .diis(false)
        .build()
        .unwrap();
    let mut plain = KohnShamScf::krks(&model, plain_settings).unwrap();
    let e_plain = plain.kernel().unwrap();

    assert!(accelerated.converged() && plain.converged());
    assert!((e_plain - e_diis).abs() < 1e-7);
    assert!(
        accelerated.cycles() < plain.cycles(),
        "DIIS took {} cycles, plain iteration {}",
        accelerated.cycles(),
        plain.cycles()
    );
    assert!(accelerated.history().iter().skip(1).any(|c| c.diis_error.is_some()));
}

#[test]
fn test_not_converged_reports_last_energy() {
    let model = model([1, 1, 1]);
    let settings = ScfSettings::builder()
        .conv_tol(1e-14)
        .conv_tol_density(1e-14)
        .max_cycle(2)
        .build()
        .unwrap();
    let mut scf = KohnShamScf::krks(&model, settings).unwrap();
    match scf.kernel() {
        Err(ScfError::NotConverged {
            reason,
            cycles,
            energy,
            ..
        }) => {
            assert_eq!(reason, StopReason::MaxCycles);
            assert_eq!(cycles, 2);
            assert!(energy.is_finite());
            assert_eq!(energy, scf.energy_tot());
        }
        other => panic!("expected NotConverged, got {other:?}"),
    }
    assert!(!scf.converged());
    assert_eq!(scf.history().len(), 2);

    // the next call restarts from the stored density
    let before = scf.density().to_vec();
    let _ = scf.kernel();
    assert_eq!(scf.history().len(), 2);
    assert!(before.iter().zip(scf.density()).any(|(a, b)| a != b));
}

#[test]
fn test_configuration_errors() {
    // seven valence electrons cannot be closed shell
    let cell = diamond(1);
    let kpts = cell.make_kpts([1, 1, 1], true).unwrap();
    let cation = GaussianModel::new(cell, kpts).unwrap();
    assert_eq!(cation.nelectron(), 7);
    assert!(matches!(
        KohnShamScf::krks(&cation, ScfSettings::default()),
        Err(ScfError::InvalidConfiguration(_))
    ));
    assert!(KohnShamScf::kgks(&cation, ScfSettings::default()).is_ok());

    // spin-orbit X2C has no restricted form
    let model = model([1, 1, 1]);
    let x2c = (&model).x2c1e(137.036).unwrap();
    assert!(matches!(
        KohnShamScf::krks(&x2c, ScfSettings::default()),
        Err(ScfError::InvalidConfiguration(_))
    ));

    // starting density of the wrong dimension
    let mut scf = KohnShamScf::kgks(&model, ScfSettings::default()).unwrap();
    let n = model.nao();
    assert!(matches!(
        scf.kernel_with(vec![CMatrix::zeros(n, n)]),
        Err(ScfError::InvalidConfiguration(_))
    ));

    // starting density with the wrong electron count
    assert!(matches!(
        scf.kernel_with(vec![CMatrix::zeros(2 * n, 2 * n)]),
        Err(ScfError::InvalidConfiguration(_))
    ));
    assert!(scf.history().is_empty());
}

#[test]
fn test_guesses_reach_the_same_state() {
    let model = model([1, 1, 1]);
    let mut atom = KohnShamScf::krks(&model, tight()).unwrap();
    let core_settings = ScfSettings::builder()
        .conv_tol(1e-10)
        .max_cycle(100)
        .init_guess(InitGuess::Core)
        .build()
        .unwrap();
    let mut core = KohnShamScf::krks(&model, core_settings).unwrap();
    let e_atom = atom.kernel().unwrap();
    let e_core = core.kernel().unwrap();
    assert!((e_atom - e_core).abs() < 1e-7, "{e_atom} vs {e_core}");

    // a converged density fed back in converges immediately
    let dm = atom.density().to_vec();
    let e_again = atom.kernel_with(dm).unwrap();
    assert!((e_again - e_atom).abs() < 1e-9);
    assert!(atom.cycles() <= 2);
}

#[test]
fn test_level_shift_and_damping_keep_the_solution() {
    let model = model([1, 1, 1]);
    let mut reference = KohnShamScf::krks(&model, tight()).unwrap();
    let e_ref = reference.kernel().unwrap();

    let settings = ScfSettings::builder()
        .conv_tol(1e-10)
        .max_cycle(200)
        .level_shift(0.2)
        .damping(0.3)
        .diis_start_cycle(3)
        .build()
        .unwrap();
    let mut shifted = KohnShamScf::krks(&model, settings).unwrap();
    let e_shifted = shifted.kernel().unwrap();
    assert!((e_shifted - e_ref).abs() < 1e-7);
}

#[test]
fn test_smeared_occupations() {
    let model = model([2, 1, 1]);
    let settings = ScfSettings::builder()
        .conv_tol(1e-10)
        .max_cycle(100)
        .smearing(Some(Smearing::FermiDirac(0.01)))
        .build()
        .unwrap();
    let mut krks = KohnShamScf::krks(&model, settings.clone()).unwrap();
    let mut kgks = KohnShamScf::kgks(&model, settings).unwrap();
    let e_r = krks.kernel().unwrap();
    let e_g = kgks.kernel().unwrap();
    assert!((e_r - e_g).abs() < 1e-8);

    let parts = krks.energy_components();
    assert!(parts.smearing >= 0.0);
    assert!((parts.free_energy() - e_r).abs() < 1e-12);
    assert!((krks.electron_count(krks.density()) - 8.0).abs() < 1e-6);
    assert!((krks.fermi_level() - kgks.fermi_level()).abs() < 1e-6);

    for occ in krks.mo_occ() {
        assert!(occ.iter().all(|&n| (0.0..=2.0).contains(&n)));
    }
}

#[test]
fn test_boxed_builder_runs() {
    let boxed: Box<dyn HamiltonianBuilder> = Box::new(model([1, 1, 1]));
    let mut scf = KohnShamScf::<_, Generalized>::new(boxed, tight()).unwrap();
    let e = scf.kernel().unwrap();

    let mut reference = KohnShamScf::<_, Restricted>::new(model([1, 1, 1]), tight()).unwrap();
    assert!((reference.kernel().unwrap() - e).abs() < 1e-8);
}
