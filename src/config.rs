//! TOML run settings for the two driver programs. Every field has a default
//! matching the tutorial, so an empty file (or no file) reproduces it.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sweep::Sweep;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Initial membrane potential (mV)
    pub v_init: f64,
    /// Stop time (ms)
    pub tstop: f64,
    /// Time step (ms)
    pub dt: f64,
    /// Temperature (degC)
    pub celsius: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            v_init: -65.0,
            tstop: 25.0,
            dt: 0.025,
            celsius: 6.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub delay: f64,
    pub dur: f64,
    pub amp: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        StimulusConfig {
            delay: 5.0,
            dur: 1.0,
            amp: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicsConfig {
    /// Soma length and diameter (um)
    pub soma_size: f64,
    pub simulation: SimulationConfig,
    pub stimulus: StimulusConfig,
    pub output: PathBuf,
    /// Figure of the trace read back from `output`
    pub plot: PathBuf,
}

impl Default for BasicsConfig {
    fn default() -> Self {
        BasicsConfig {
            soma_size: 20.0,
            simulation: SimulationConfig {
                tstop: 40.0,
                ..SimulationConfig::default()
            },
            stimulus: StimulusConfig {
                delay: 2.0,
                dur: 0.1,
                amp: 0.9,
            },
            output: PathBuf::from("data.csv"),
            plot: PathBuf::from("data.svg"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallAndStickConfig {
    pub simulation: SimulationConfig,
    pub stimulus: StimulusConfig,
    pub sweep: Sweep,
    /// First run: `t,soma_v,dend_v`
    pub output: PathBuf,
    pub sweep_output: PathBuf,
    /// Soma trace of the first run
    pub plot: PathBuf,
    pub sweep_plot: PathBuf,
}

impl Default for BallAndStickConfig {
    fn default() -> Self {
        BallAndStickConfig {
            simulation: SimulationConfig::default(),
            stimulus: StimulusConfig::default(),
            sweep: Sweep::ball_and_stick(),
            output: PathBuf::from("ball_and_stick.csv"),
            sweep_output: PathBuf::from("ball_and_stick_sweep.csv"),
            plot: PathBuf::from("ball_and_stick.svg"),
            sweep_plot: PathBuf::from("ball_and_stick_sweep.svg"),
        }
    }
}

pub fn from_toml_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(toml::from_str(text)?)
}

/// Reads `path` when given, otherwise returns the defaults.
pub fn load<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => {
            info!("Loading config from {}", path.display());
            from_toml_str(&fs::read_to_string(path)?)
        }
        None => Ok(T::default()),
    }
}
