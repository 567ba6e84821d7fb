//! Simulated annealing over random orbital pair rotations

use super::OrbitalOptimizer;
use crate::hamiltonian_impl::DOCIHamiltonian;
use crate::integrals_impl::{IntegralProvider, OrbitalTransform, SymmetricIntegrals, UnitaryMatrix};
use crate::io::Checkpoints;
use color_eyre::eyre::{ensure, Result};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingSettings {
    pub start_temp: f64,
    /// Factor applied to the temperature after every step.
    pub delta_temp: f64,
    /// Largest rotation angle drawn at the start.
    pub max_angle: f64,
    /// Factor applied to the largest angle after every step.
    pub delta_angle: f64,
    pub max_steps: usize,
    /// Stop once more than this many steps have been rejected in total.
    pub max_unaccepted: usize,
    pub seed: Option<u64>,
}

impl Default for AnnealingSettings {
    fn default() -> Self {
        AnnealingSettings {
            start_temp: 0.1,
            delta_temp: 0.99,
            max_angle: 1.3,
            delta_angle: 0.999,
            max_steps: 20000,
            max_unaccepted: 1500,
            seed: None,
        }
    }
}

pub struct SimulatedAnnealing {
    transform: OrbitalTransform,
    ham: DOCIHamiltonian<SymmetricIntegrals>,
    settings: AnnealingSettings,
    energy: f64,
    lowest_energy: f64,
    rng: StdRng,
    checkpoints: Option<Checkpoints>,
    steps: usize,
    rejected: usize,
    // how often each pair was drawn, -1 for pairs of different irreps
    sampled: DMatrix<i64>,
}

impl SimulatedAnnealing {
    pub fn new(integrals: SymmetricIntegrals, settings: AnnealingSettings) -> Result<Self> {
        ensure!(
            settings.start_temp > 0.0,
            "Start temperature must be positive, got {}",
            settings.start_temp
        );

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let transform = OrbitalTransform::new(integrals.clone());
        let ham = DOCIHamiltonian::new(integrals)?;

        Ok(SimulatedAnnealing {
            transform,
            ham,
            settings,
            energy: 0.0,
            lowest_energy: 0.0,
            rng,
            checkpoints: None,
            steps: 0,
            rejected: 0,
            sampled: DMatrix::zeros(0, 0),
        })
    }

    pub fn settings(&self) -> &AnnealingSettings {
        &self.settings
    }

    /// Lowest energy seen so far, including nuclear repulsion.
    pub fn lowest_energy(&self) -> f64 {
        self.lowest_energy + self.ham.integrals().nucl_rep()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Rejected steps of the last run.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Symmetric count of how often each orbital pair was drawn in the last
    /// run; pairs of different irreps hold -1.
    pub fn sample_counts(&self) -> &DMatrix<i64> {
        &self.sampled
    }

    /// Transform the reference integrals with the current unitary and return
    /// the ground-state energy without nuclear repulsion.
    pub fn calc_new_energy(&mut self) -> Result<f64> {
        self.transform.fill_integrals(self.ham.integrals_mut());
        self.ham.build()?;
        self.ham.calc_energy()
    }

    /// Metropolis-like test of a step to `e_new` at temperature `temp`.
    fn accept(&mut self, e_new: f64, temp: f64) -> bool {
        if e_new < self.energy {
            return true;
        }

        let p = ((self.energy - e_new) / temp).exp();
        let r: f64 = self.rng.gen();

        r * (1.0 + p) <= p
    }

    /// Two distinct orbitals of the same irrep.
    fn draw_pair(&mut self, n_sp: usize) -> (usize, usize) {
        let integrals = self.ham.integrals();
        loop {
            let orb1 = self.rng.gen_range(0..n_sp);
            let orb2 = self.rng.gen_range(0..n_sp);
            if orb1 != orb2 && integrals.orbital_irrep(orb1) == integrals.orbital_irrep(orb2) {
                return (orb1, orb2);
            }
        }
    }

    pub fn anneal(&mut self) -> Result<f64> {
        let n_sp = self.ham.integrals().n_sp();
        let nucl_rep = self.ham.integrals().nucl_rep();

        let mut cur_temp = self.settings.start_temp;
        let mut cur_max_angle = self.settings.max_angle;
        let mut unaccepted = 0;

        let mut sampled = DMatrix::<i64>::zeros(n_sp, n_sp);
        {
            let integrals = self.ham.integrals();
            for a in 0..n_sp {
                for b in 0..n_sp {
                    if integrals.orbital_irrep(a) != integrals.orbital_irrep(b) {
                        sampled[(a, b)] = -1;
                    }
                }
            }
        }

        let has_pair = (0..n_sp).any(|a| (0..n_sp).any(|b| a != b && sampled[(a, b)] == 0));

        self.energy = self.calc_new_energy()?;
        self.lowest_energy = self.energy;
        info!("Starting energy = {:.10}", self.energy + nucl_rep);

        let start = Instant::now();
        let mut i = 0;

        if has_pair {
            while i < self.settings.max_steps {
                let (orb1, orb2) = self.draw_pair(n_sp);
                sampled[(orb1, orb2)] += 1;
                sampled[(orb2, orb1)] += 1;

                let u1: f64 = self.rng.gen();
                let u2: f64 = self.rng.gen();
                let angle = cur_max_angle * (u1 - u2);

                self.transform.unitary_mut().jacobi_rotation(orb1, orb2, angle);

                let new_energy = self.calc_new_energy()?;
                if new_energy < self.lowest_energy {
                    self.lowest_energy = new_energy;
                }

                let accepted = self.accept(new_energy, cur_temp);
                debug!(
                    "T={:.6} {}\t{}\t{}\t{:.6}\t{:.10}\t{:.10}\t{:.10}\t{:.3e}\t{}",
                    cur_temp,
                    i,
                    orb1,
                    orb2,
                    angle,
                    new_energy + nucl_rep,
                    self.lowest_energy + nucl_rep,
                    self.energy + nucl_rep,
                    new_energy - self.energy,
                    if accepted { "accepted" } else { "rejected" }
                );

                if accepted {
                    self.energy = new_energy;
                } else {
                    unaccepted += 1;
                    self.transform
                        .unitary_mut()
                        .jacobi_rotation(orb1, orb2, -angle);
                }

                cur_temp *= self.settings.delta_temp;
                cur_max_angle *= self.settings.delta_angle;
                i += 1;

                if unaccepted > self.settings.max_unaccepted {
                    info!("Too many unaccepted, stopping");
                    break;
                }
            }
        } else {
            info!("No pair of orbitals shares an irrep, nothing to anneal");
        }

        self.steps = i;
        self.rejected = unaccepted;
        info!(
            "Annealing took {:.3} s over {} steps",
            start.elapsed().as_secs_f64(),
            i
        );
        info!("Final energy = {:.10}", self.energy + nucl_rep);
        info!("Lowest energy = {:.10}", self.lowest_energy + nucl_rep);

        if let Some(checkpoints) = &self.checkpoints {
            checkpoints.save(&format!("unitary-final-{}.bin", i), |path| {
                self.transform.unitary().save_to_file(path)
            });
        }

        info!("Pair sample counts:\n{}", sampled);
        self.sampled = sampled;

        self.transform.fill_integrals(self.ham.integrals_mut());

        Ok(self.get_energy())
    }
}

impl OrbitalOptimizer for SimulatedAnnealing {
    fn name(&self) -> &'static str {
        "anneal"
    }

    fn optimize(&mut self) -> Result<f64> {
        self.anneal()
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
