//! Integration tests for the public solver API

use cell::Cell;
use kscf::{
    GaussianModel, HamiltonianBuilderExt, KohnShamScf, ScfError, ScfSettings, Smearing,
    StopReason, SCF,
};
use std::time::Duration;

fn hydrogen_chain() -> GaussianModel {
    let cell = Cell::builder()
        .atom("H 0 0 0; H 0.74 0 0")
        .a("4 0 0\n0 4 0\n0 0 4")
        .basis("sto-3g")
        .build()
        .unwrap();
    let kpts = cell.make_kpts([2, 1, 1], true).unwrap();
    GaussianModel::new(cell, kpts).unwrap()
}

#[test]
fn test_wall_time_budget_stops_the_run() {
    let model = hydrogen_chain();
    let settings = ScfSettings::builder()
        .conv_tol(1e-14)
        .conv_tol_density(1e-14)
        .max_cycle(1000)
        .max_wall_time(Some(Duration::from_nanos(1)))
        .build()
        .unwrap();
    let mut scf = KohnShamScf::krks(&model, settings).unwrap();
    match scf.kernel() {
        Err(ScfError::NotConverged { reason, cycles, .. }) => {
            assert_eq!(reason, StopReason::WallTime);
            assert_eq!(cycles, 1);
        }
        other => panic!("expected a wall-time stop, got {other:?}"),
    }
}

#[test]
fn test_gaussian_smearing_matches_between_layouts() {
    let model = hydrogen_chain();
    let settings = ScfSettings::builder()
        .conv_tol(1e-10)
        .max_cycle(100)
        .smearing(Some(Smearing::Gaussian(0.02)))
        .build()
        .unwrap();
    let mut krks = KohnShamScf::krks(&model, settings.clone()).unwrap();
    let mut kgks = KohnShamScf::kgks(&model, settings).unwrap();
    let e_r = krks.kernel().unwrap();
    let e_g = kgks.kernel().unwrap();
    assert!((e_r - e_g).abs() < 1e-8);
    assert!((krks.electron_count(krks.density()) - 2.0).abs() < 1e-6);
}

#[test]
fn test_decorated_hydrogen_converges() {
    let model = hydrogen_chain();
    let decorated = (&model).density_fit().unwrap().x2c1e(137.036).unwrap();
    let settings = ScfSettings::builder().conv_tol(1e-10).build().unwrap();

    let mut plain = KohnShamScf::kgks(&model, settings.clone()).unwrap();
    let mut scf = KohnShamScf::kgks(&decorated, settings).unwrap();
    let e_plain = plain.kernel().unwrap();
    let e = scf.kernel().unwrap();
    assert!(scf.converged());
    // hydrogen is barely relativistic; the fit error dominates the shift
    assert!((e - e_plain).abs() < 0.1);
}
