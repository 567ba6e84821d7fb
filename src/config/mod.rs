//! Configuration management for DOCI calculations
//!
//! Every setting can come from the command line, from an optional YAML
//! configuration file or from the built-in defaults, in that order.
//!
//! ```yaml
//! mode: local
//! verbosity: 1
//! checkpoint_dir: /scratch/doci
//! local:
//!   conv_crit: 1.0e-6
//!   conv_steps: 25
//!   dist_choice: true
//! anneal:
//!   start_temp: 0.1
//!   max_steps: 20000
//! ```

mod args;

pub use args::Args;

use crate::optim_impl::{AnnealingSettings, LocalSettings, OptimizerSettings};
use serde::{Deserialize, Serialize};

/// Main configuration structure for DOCI calculations
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub mode: Option<String>,
    pub verbosity: Option<u8>,
    pub checkpoint_dir: Option<String>,
    pub seed: Option<u64>,
    pub local: Option<LocalParams>,
    pub anneal: Option<AnnealParams>,
}

/// Local (Jacobi pair) optimizer parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LocalParams {
    pub conv_crit: Option<f64>,
    pub conv_steps: Option<usize>,
    pub max_iterations: Option<usize>,
    pub dist_choice: Option<bool>,
}

impl Default for LocalParams {
    fn default() -> Self {
        let defaults = LocalSettings::default();
        LocalParams {
            conv_crit: Some(defaults.conv_crit),
            conv_steps: Some(defaults.conv_steps),
            max_iterations: Some(defaults.max_iterations),
            dist_choice: Some(defaults.dist_choice),
        }
    }
}

impl LocalParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.conv_crit.is_none() {
            self.conv_crit = defaults.conv_crit;
        }
        if self.conv_steps.is_none() {
            self.conv_steps = defaults.conv_steps;
        }
        if self.max_iterations.is_none() {
            self.max_iterations = defaults.max_iterations;
        }
        if self.dist_choice.is_none() {
            self.dist_choice = defaults.dist_choice;
        }
        self
    }
}

/// Simulated annealing parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnnealParams {
    pub start_temp: Option<f64>,
    pub delta_temp: Option<f64>,
    pub max_angle: Option<f64>,
    pub delta_angle: Option<f64>,
    pub max_steps: Option<usize>,
    pub max_unaccepted: Option<usize>,
}

impl Default for AnnealParams {
    fn default() -> Self {
        let defaults = AnnealingSettings::default();
        AnnealParams {
            start_temp: Some(defaults.start_temp),
            delta_temp: Some(defaults.delta_temp),
            max_angle: Some(defaults.max_angle),
            delta_angle: Some(defaults.delta_angle),
            max_steps: Some(defaults.max_steps),
            max_unaccepted: Some(defaults.max_unaccepted),
        }
    }
}

impl AnnealParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.start_temp.is_none() {
            self.start_temp = defaults.start_temp;
        }
        if self.delta_temp.is_none() {
            self.delta_temp = defaults.delta_temp;
        }
        if self.max_angle.is_none() {
            self.max_angle = defaults.max_angle;
        }
        if self.delta_angle.is_none() {
            self.delta_angle = defaults.delta_angle;
        }
        if self.max_steps.is_none() {
            self.max_steps = defaults.max_steps;
        }
        if self.max_unaccepted.is_none() {
            self.max_unaccepted = defaults.max_unaccepted;
        }
        self
    }
}

impl Config {
    /// Apply default values to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.local = Some(self.local.unwrap_or_default().with_defaults());
        self.anneal = Some(self.anneal.unwrap_or_default().with_defaults());
        self
    }

    /// Run mode, command line first; `diag` when neither sets it.
    pub fn mode(&self, args: &Args) -> String {
        args.mode
            .clone()
            .or_else(|| self.mode.clone())
            .unwrap_or_else(|| "diag".to_string())
    }

    pub fn verbosity(&self, args: &Args) -> u8 {
        args.verbose.max(self.verbosity.unwrap_or(0))
    }

    pub fn checkpoint_dir(&self, args: &Args) -> Option<String> {
        args.checkpoint_dir
            .clone()
            .or_else(|| self.checkpoint_dir.clone())
    }

    /// Optimizer settings from the command line, the configuration file and
    /// the defaults.
    pub fn optimizer_settings(&self, args: &Args) -> OptimizerSettings {
        let local = self.local.clone().unwrap_or_default().with_defaults();
        let anneal = self.anneal.clone().unwrap_or_default().with_defaults();
        let local_defaults = LocalSettings::default();
        let anneal_defaults = AnnealingSettings::default();
        let seed = args.seed.or(self.seed);

        OptimizerSettings {
            local: LocalSettings {
                conv_crit: args
                    .conv_crit
                    .or(local.conv_crit)
                    .unwrap_or(local_defaults.conv_crit),
                conv_steps: args
                    .conv_steps
                    .or(local.conv_steps)
                    .unwrap_or(local_defaults.conv_steps),
                max_iterations: args
                    .max_iterations
                    .or(local.max_iterations)
                    .unwrap_or(local_defaults.max_iterations),
                dist_choice: args.dist_choice
                    || local.dist_choice.unwrap_or(local_defaults.dist_choice),
                seed,
            },
            anneal: AnnealingSettings {
                start_temp: args
                    .start_temp
                    .or(anneal.start_temp)
                    .unwrap_or(anneal_defaults.start_temp),
                delta_temp: anneal.delta_temp.unwrap_or(anneal_defaults.delta_temp),
                max_angle: anneal.max_angle.unwrap_or(anneal_defaults.max_angle),
                delta_angle: anneal.delta_angle.unwrap_or(anneal_defaults.delta_angle),
                max_steps: args
                    .max_steps
                    .or(anneal.max_steps)
                    .unwrap_or(anneal_defaults.max_steps),
                max_unaccepted: anneal
                    .max_unaccepted
                    .unwrap_or(anneal_defaults.max_unaccepted),
                seed,
            },
        }
    }
}
