use crate::integrals_impl::{IntegralProvider, Integrals, SymmetricIntegrals};
use color_eyre::eyre::{ensure, Result, WrapErr};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// YAML layout of an integrals file.
///
/// `oei` is the row-major L x L one-electron table; `tei` holds `<ab|cd>` at
/// flat position `((a * L + b) * L + c) * L + d`. Without `irreps` all
/// orbitals belong to the single irrep of C1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegralsFile {
    pub n_sp: usize,
    pub n_electrons: usize,
    #[serde(default)]
    pub nuclear_repulsion: f64,
    #[serde(default)]
    pub n_irreps: Option<usize>,
    #[serde(default)]
    pub irreps: Option<Vec<usize>>,
    pub oei: Vec<f64>,
    pub tei: Vec<f64>,
}

impl IntegralsFile {
    pub fn into_integrals(self) -> Result<SymmetricIntegrals> {
        let l = self.n_sp;
        ensure!(
            self.oei.len() == l * l,
            "Expected {} one-electron integrals, found {}",
            l * l,
            self.oei.len()
        );
        ensure!(
            self.tei.len() == l * l * l * l,
            "Expected {} two-electron integrals, found {}",
            l * l * l * l,
            self.tei.len()
        );

        // row (a, b), column (c, d) is exactly the row-major flat layout
        let oei = DMatrix::from_row_slice(l, l, &self.oei);
        let tei = DMatrix::from_row_slice(l * l, l * l, &self.tei);
        let integrals =
            Integrals::from_tables(l, self.n_electrons, self.nuclear_repulsion, oei, tei)?;

        match self.irreps {
            Some(irreps) => {
                let n_irreps = self
                    .n_irreps
                    .unwrap_or_else(|| irreps.iter().max().map_or(1, |m| m + 1));
                SymmetricIntegrals::new(integrals, irreps, n_irreps)
            }
            None => Ok(SymmetricIntegrals::c1(integrals)),
        }
    }

    pub fn from_integrals(integrals: &SymmetricIntegrals) -> Self {
        let l = integrals.n_sp();
        let oei = integrals.integrals().oei();
        let tei = integrals.integrals().tei();

        IntegralsFile {
            n_sp: l,
            n_electrons: integrals.n_electrons(),
            nuclear_repulsion: integrals.nucl_rep(),
            n_irreps: Some(integrals.n_irreps()),
            irreps: Some(integrals.irreps().to_vec()),
            oei: (0..l * l).map(|idx| oei[(idx / l, idx % l)]).collect(),
            tei: (0..l * l * l * l)
                .map(|idx| tei[(idx / (l * l), idx % (l * l))])
                .collect(),
        }
    }
}

/// Load integrals from a YAML file.
pub fn load_integrals<P: AsRef<Path>>(path: P) -> Result<SymmetricIntegrals> {
    let path = path.as_ref();
    info!("Reading integrals from: {}", path.display());
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Unable to read integrals file: {}", path.display()))?;

    let file: IntegralsFile = serde_yml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse integrals file: {}", path.display()))?;

    let integrals = file.into_integrals()?;
    info!(
        "Loaded {} orbitals, {} electrons, {} irreps",
        integrals.n_sp(),
        integrals.n_electrons(),
        integrals.n_irreps()
    );

    Ok(integrals)
}

/// Write integrals as YAML, readable by [`load_integrals`].
pub fn save_integrals<P: AsRef<Path>>(path: P, integrals: &SymmetricIntegrals) -> Result<()> {
    let path = path.as_ref();
    let content = serde_yml::to_string(&IntegralsFile::from_integrals(integrals))
        .wrap_err("Failed to serialize integrals")?;
    fs::write(path, content)
        .wrap_err_with(|| format!("Unable to write integrals file: {}", path.display()))
}
