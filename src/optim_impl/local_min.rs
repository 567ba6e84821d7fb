//! Jacobi pair minimization of the orbital basis

use super::OrbitalOptimizer;
use crate::dm2_impl::DM2;
use crate::hamiltonian_impl::DOCIHamiltonian;
use crate::integrals_impl::{IntegralProvider, OrbitalTransform, SymmetricIntegrals, UnitaryMatrix};
use crate::io::{save_integrals, Checkpoints};
use color_eyre::eyre::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::f64::consts::FRAC_PI_2;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Environment variable with a comma separated list of the irreps whose
/// orbital pairs may be rotated.
pub const ALLOWED_IRREPS_ENV: &str = "DOCI_ALLOWED_IRREPS";

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSettings {
    /// Energy change below which an iteration counts as converged.
    pub conv_crit: f64,
    /// Consecutive converged iterations needed to stop.
    pub conv_steps: usize,
    pub max_iterations: usize,
    /// Draw the pair with a probability proportional to its energy gain
    /// instead of always taking the best one.
    pub dist_choice: bool,
    /// Seed of the pair drawing; from entropy when unset.
    pub seed: Option<u64>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        LocalSettings {
            conv_crit: 1e-6,
            conv_steps: 25,
            max_iterations: 1000,
            dist_choice: false,
            seed: None,
        }
    }
}

/// A candidate rotation and the energy it is predicted to give, without the
/// nuclear repulsion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairRotation {
    pub k: usize,
    pub l: usize,
    pub angle: f64,
    pub energy: f64,
}

/// Parse a comma separated list of irrep labels.
///
/// Entries that are not numbers or not below `n_irreps` are dropped; the
/// result is sorted.
pub fn parse_allowed_irreps(value: &str, n_irreps: usize) -> Vec<usize> {
    let mut irreps: Vec<usize> = value
        .split(',')
        .map(str::trim)
        .filter(|elem| !elem.is_empty())
        .filter_map(|elem| match elem.parse::<usize>() {
            Ok(irrep) if irrep < n_irreps => Some(irrep),
            Ok(irrep) => {
                warn!("Irrep {} does not exist, ignoring it", irrep);
                None
            }
            Err(_) => {
                warn!("Invalid value in {}: '{}'", ALLOWED_IRREPS_ENV, elem);
                None
            }
        })
        .collect();

    irreps.sort_unstable();
    irreps.dedup();
    irreps
}

/// Index of the candidate to rotate next; never the pair `prev` rotated last.
///
/// Without draws the first (best) candidate is taken. With draws, a draw that
/// hits `prev` is redrawn once and the pick falls back to the first candidate
/// after that. A pick equal to `prev` moves on to the next candidate, and
/// `None` means no other candidate is left.
pub fn select_pair<D>(
    candidates: &[PairRotation],
    prev: Option<(usize, usize)>,
    draws: D,
) -> Option<usize>
where
    D: IntoIterator<Item = usize>,
{
    let last = candidates.len().checked_sub(1)?;
    let is_prev = |idx: usize| prev == Some((candidates[idx].k, candidates[idx].l));

    let mut draws = draws.into_iter().map(|idx| idx.min(last));
    let mut idx = match draws.next() {
        Some(first) if !is_prev(first) => first,
        Some(_) => draws.next().filter(|&second| !is_prev(second)).unwrap_or(0),
        None => 0,
    };

    if is_prev(idx) {
        if idx == last {
            return None;
        }
        idx += 1;
    }

    Some(idx)
}

/// Orbital optimizer that repeatedly applies the single Jacobi rotation the
/// current 2-RDM predicts to lower the energy most.
pub struct LocalMinimizer {
    transform: OrbitalTransform,
    ham: DOCIHamiltonian<SymmetricIntegrals>,
    rdm: DM2,
    energy: f64,
    settings: LocalSettings,
    allowed_irreps: Vec<usize>,
    rng: StdRng,
    checkpoints: Option<Checkpoints>,
    iterations: usize,
}

impl LocalMinimizer {
    /// The allowed irreps are read from [`ALLOWED_IRREPS_ENV`]; all irreps
    /// when it is unset or empty.
    pub fn new(integrals: SymmetricIntegrals, settings: LocalSettings) -> Result<Self> {
        let allowed_irreps = match std::env::var(ALLOWED_IRREPS_ENV) {
            Ok(value) if !value.trim().is_empty() => {
                let irreps = parse_allowed_irreps(&value, integrals.n_irreps());
                info!("Allowed irreps: {:?}", irreps);
                irreps
            }
            _ => Vec::new(),
        };

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let transform = OrbitalTransform::new(integrals.clone());
        let ham = DOCIHamiltonian::new(integrals)?;
        let rdm = DM2::from_integrals(ham.integrals())?;

        Ok(LocalMinimizer {
            transform,
            ham,
            rdm,
            energy: 0.0,
            settings,
            allowed_irreps,
            rng,
            checkpoints: None,
            iterations: 0,
        })
    }

    pub fn settings(&self) -> &LocalSettings {
        &self.settings
    }

    /// Restrict the candidate pairs to these irreps; empty allows all.
    pub fn set_allowed_irreps(&mut self, mut irreps: Vec<usize>) {
        irreps.sort_unstable();
        irreps.dedup();
        self.allowed_irreps = irreps;
    }

    pub fn allowed_irreps(&self) -> &[usize] {
        &self.allowed_irreps
    }

    /// 2-RDM of the current ground state.
    pub fn rdm(&self) -> &DM2 {
        &self.rdm
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Rebuild and diagonalize the Hamiltonian in the current basis and
    /// refresh the 2-RDM; returns the energy without nuclear repulsion.
    pub fn calc_new_energy(&mut self) -> Result<f64> {
        self.ham.build()?;
        let (energy, eigv) = self.ham.diagonalize()?;
        info!("E = {:.10}", energy + self.ham.integrals().nucl_rep());

        self.rdm.build(self.ham.permutation(), &eigv)?;

        Ok(energy)
    }

    fn is_allowed(&self, irrep: usize) -> bool {
        self.allowed_irreps.is_empty() || self.allowed_irreps.binary_search(&irrep).is_ok()
    }

    /// Best rotation of every allowed pair of same-irrep orbitals.
    ///
    /// A pair is dropped when no minimum is found from either start angle or
    /// the angle exceeds pi/2.
    pub fn scan_orbitals(&self) -> Vec<PairRotation> {
        let start = Instant::now();
        let integrals = self.ham.integrals();
        let n_sp = integrals.n_sp();

        let pairs: Vec<(usize, usize)> = (0..n_sp)
            .flat_map(|k| ((k + 1)..n_sp).map(move |l| (k, l)))
            .filter(|&(k, l)| {
                let irrep = integrals.orbital_irrep(k);
                irrep == integrals.orbital_irrep(l) && self.is_allowed(irrep)
            })
            .collect();

        let rotations: Vec<PairRotation> = pairs
            .par_iter()
            .filter_map(|&(k, l)| {
                let mut found = self.rdm.find_min_angle(k, l, 0.3, integrals);
                if !found.1 {
                    // hit a maximum
                    found = self.rdm.find_min_angle(k, l, 0.01, integrals);
                }

                let (angle, is_minimum) = found;
                if !is_minimum || angle.abs() > FRAC_PI_2 {
                    return None;
                }

                Some(PairRotation {
                    k,
                    l,
                    angle,
                    energy: self.rdm.calc_rotate(k, l, angle, integrals),
                })
            })
            .collect();

        info!(
            "Orbital scanning took {:.3} s: {} of {} pairs usable",
            start.elapsed().as_secs_f64(),
            rotations.len(),
            pairs.len()
        );

        rotations
    }

    /// Draw an index with probability proportional to the energy gain of the
    /// candidate.
    pub fn choose_orbitalpair(&mut self, candidates: &[PairRotation]) -> usize {
        let choice: f64 = self.rng.gen();
        let norm: f64 = candidates.iter().map(|c| self.energy - c.energy).sum();

        let mut cum = 0.0;
        for (idx, candidate) in candidates.iter().enumerate() {
            cum += (self.energy - candidate.energy) / norm;
            if choice < cum {
                return idx;
            }
        }

        candidates.len().saturating_sub(1)
    }

    /// Run the pair rotations until the energy is stable; returns the final
    /// energy including nuclear repulsion.
    pub fn minimize(&mut self) -> Result<f64> {
        let nucl_rep = self.ham.integrals().nucl_rep();
        let dist_choice = self.settings.dist_choice;

        self.energy = self.calc_new_energy()?;

        let start = Instant::now();
        let mut converged = 0;
        let mut prev_pair: Option<(usize, usize)> = None;
        let mut iters = 1;

        while converged < self.settings.conv_steps {
            let mut candidates = self.scan_orbitals();
            if candidates.is_empty() {
                warn!("No orbital pair left to rotate, stopping");
                break;
            }

            candidates.sort_by(|a, b| a.energy.total_cmp(&b.energy));
            for c in &candidates {
                debug!("{}\t{}\t{:.10}\t{:.6}", c.k, c.l, c.energy + nucl_rep, c.angle);
            }

            let selected = if dist_choice {
                let draws = std::iter::repeat_with(|| self.choose_orbitalpair(&candidates));
                select_pair(&candidates, prev_pair, draws)
            } else {
                select_pair(&candidates, prev_pair, std::iter::empty())
            };
            let Some(idx) = selected else {
                info!("The only usable pair was rotated last, stopping");
                break;
            };

            let rot = candidates[idx];
            prev_pair = Some((rot.k, rot.l));
            if dist_choice {
                debug!("{} ({}) Chosen: {}", iters, converged, idx);
            }

            self.transform
                .rotate(self.ham.integrals_mut(), rot.k, rot.l, rot.angle)?;

            let new_energy = self.calc_new_energy()?;
            self.write_checkpoints(iters);

            let change = (self.energy - new_energy).abs();
            if change < self.settings.conv_crit {
                converged += 1;
            } else {
                converged = 0;
            }

            info!(
                "{} ({})\tRotation between {}  {} over {:.8} E_rot = {:.10}  E = {:.10}\t{:.3e}",
                iters,
                converged,
                rot.k,
                rot.l,
                rot.angle,
                rot.energy + nucl_rep,
                new_energy + nucl_rep,
                change
            );

            self.energy = new_energy;
            self.iterations = iters;
            iters += 1;

            if iters > self.settings.max_iterations {
                info!("Done {} steps, quitting", self.settings.max_iterations);
                break;
            }
        }

        info!("Minimization took {:.3} s", start.elapsed().as_secs_f64());

        if let Some(checkpoints) = &self.checkpoints {
            checkpoints.save("optimal-unitary.bin", |path| {
                self.transform.unitary().save_to_file(path)
            });
        }

        Ok(self.get_energy())
    }

    fn write_checkpoints(&self, iters: usize) {
        let Some(checkpoints) = &self.checkpoints else {
            return;
        };

        if iters % 10 == 0 {
            checkpoints.save(&format!("unitary-{}.bin", iters), |path| {
                self.transform.unitary().save_to_file(path)
            });
        }

        if iters % 25 == 0 {
            checkpoints.save(&format!("ham-{}.yaml", iters), |path| {
                save_integrals(path, self.ham.integrals())
            });
            checkpoints.save(&format!("rdm-{}.bin", iters), |path| {
                self.rdm.write_to_file(path)
            });
        }
    }
}

impl OrbitalOptimizer for LocalMinimizer {
    fn name(&self) -> &'static str {
        "local"
    }

    fn optimize(&mut self) -> Result<f64> {
        self.minimize()
    }

    fn get_energy(&self) -> f64 {
        self.energy + self.ham.integrals().nucl_rep()
    }

    fn transform(&self) -> &OrbitalTransform {
        &self.transform
    }

    fn hamiltonian(&self) -> &DOCIHamiltonian<SymmetricIntegrals> {
        &self.ham
    }

    fn hamiltonian_mut(&mut self) -> &mut DOCIHamiltonian<SymmetricIntegrals> {
        &mut self.ham
    }

    fn load_unitary(&mut self, unitary: UnitaryMatrix) -> Result<()> {
        self.transform.set_unitary(unitary)?;
        self.transform.fill_integrals(self.ham.integrals_mut());
        Ok(())
    }

    fn set_checkpoints(&mut self, checkpoints: Option<Checkpoints>) {
        self.checkpoints = checkpoints;
    }
}
