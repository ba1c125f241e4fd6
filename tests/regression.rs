//! End-to-end runs of the periodic Kohn-Sham solvers.

use kscf::app::{build_hamiltonian, run_calculation};
use kscf::config::Config;
use pbc_scf::{
    Cell, GaussianModel, HamiltonianBuilder, HamiltonianBuilderExt, KohnShamScf, ScfSettings, SCF,
};

const DIAMOND_ATOMS: &str = "C 0 0 0; C 0.8917 0.8917 0.8917";
const DIAMOND_LATTICE: &str = "0 1.7834 1.7834\n1.7834 0 1.7834\n1.7834 1.7834 0";

fn diamond(basis: &str, pseudo: Option<&str>) -> Cell {
    let mut builder = Cell::builder()
        .atom(DIAMOND_ATOMS)
        .a(DIAMOND_LATTICE)
        .basis(basis);
    if let Some(pp) = pseudo {
        builder = builder.pseudo(pp);
    }
    builder.build().unwrap()
}

fn settings() -> ScfSettings {
    ScfSettings::builder()
        .conv_tol(1e-10)
        .max_cycle(100)
        .build()
        .unwrap()
}

fn krks_and_kgks<H: HamiltonianBuilder>(builder: &H) -> (f64, f64) {
    let mut krks = KohnShamScf::krks(builder, settings()).unwrap();
    let mut kgks = KohnShamScf::kgks(builder, settings()).unwrap();
    (krks.kernel().unwrap(), kgks.kernel().unwrap())
}

#[test]
fn test_kgks_equals_krks_without_spin_coupling() {
    let cell = diamond("gth-dzvp", Some("gth-pade"));
    let kpts = cell.make_kpts([2, 1, 1], true).unwrap();
    let model = GaussianModel::new(cell, kpts).unwrap();

    let (e_r, e_g) = krks_and_kgks(&model);
    assert!((e_r - e_g).abs() < 1e-8, "KRKS {e_r:.12} vs KGKS {e_g:.12}");

    let decorated = (&model).density_fit().unwrap().sfx2c1e(137.036).unwrap();
    let (e_r, e_g) = krks_and_kgks(&decorated);
    assert!((e_r - e_g).abs() < 1e-8, "KRKS {e_r:.12} vs KGKS {e_g:.12}");
}

#[test]
fn test_second_kernel_is_idempotent() {
    let cell = diamond("gth-dzvp", Some("gth-pade"));
    let kpts = cell.make_kpts([2, 1, 1], true).unwrap();
    let model = GaussianModel::new(cell, kpts).unwrap();

    let mut scf = KohnShamScf::kgks(&model, settings()).unwrap();
    let first = scf.kernel().unwrap();
    let second = scf.kernel().unwrap();
    assert!((first - second).abs() < 1e-10);
    assert!(scf.converged());
}

#[test]
fn test_all_electron_x2c() {
    let cell = diamond("sto-3g", None);
    let kpts = cell.make_kpts([2, 1, 1], true).unwrap();
    let model = GaussianModel::new(cell, kpts).unwrap();
    let fitted = (&model).density_fit().unwrap();

    let run = |c: f64| {
        let mut sf = KohnShamScf::kgks((&fitted).sfx2c1e(c).unwrap(), settings()).unwrap();
        let mut so = KohnShamScf::kgks((&fitted).x2c1e(c).unwrap(), settings()).unwrap();
        (sf.kernel().unwrap(), so.kernel().unwrap())
    };

    let mut nonrel = KohnShamScf::kgks(&fitted, settings()).unwrap();
    let e_nr = nonrel.kernel().unwrap();

    let (sf_10, so_10) = run(10.0);
    assert!((sf_10 - so_10).abs() > 1e-6, "spin-orbit coupling has no effect");

    let (sf_far, so_far) = run(1e4);
    assert!((sf_far - e_nr).abs() < (sf_10 - e_nr).abs());
    assert!((so_far - e_nr).abs() < (so_10 - e_nr).abs());
    assert!((so_far - e_nr).abs() < 1e-4);
}

#[test]
fn test_run_from_yaml() {
    let yaml = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/diamond.yaml"))
        .unwrap();
    let config: Config = serde_yml::from_str::<Config>(&yaml).unwrap().with_defaults();

    let cell = config.cell.build().unwrap();
    let kpts = cell.make_kpts(config.kmesh(), true).unwrap();
    let builder = build_hamiltonian(cell, kpts, &config).unwrap();
    let summary = run_calculation(builder, config.spin(), config.settings().unwrap()).unwrap();

    assert!(summary.converged);
    assert_eq!(summary.method, "KGKS");
    assert_eq!(summary.bands.len(), 2);
    assert!(summary.description.contains("density-fitted"));
    for band in &summary.bands {
        assert!(band.homo.unwrap() < band.lumo.unwrap());
    }
}
