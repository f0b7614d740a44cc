use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use itertools::iproduct;
use log::info;
use serde::{Deserialize, Serialize};

use crate::cell::BallAndStick;
use crate::error::Result;
use crate::model::{ClampId, Model, RecordingId};

/// Stimulus amplitudes crossed with dendrite discretisations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sweep {
    /// Clamp amplitudes (nA)
    pub amps: Vec<f64>,
    /// Dendrite nseg values
    pub nsegs: Vec<usize>,
}

impl Sweep {
    pub fn ball_and_stick() -> Sweep {
        Sweep {
            amps: (1..5).map(|i| 0.075 * i as f64).collect(),
            nsegs: vec![1, 101],
        }
    }
}

impl Default for Sweep {
    fn default() -> Self {
        Sweep::ball_and_stick()
    }
}

/// Copy of the shared recording buffers taken right after one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTrace {
    pub amp: f64,
    pub nseg: usize,
    pub t: Vec<f64>,
    pub soma_v: Vec<f64>,
    pub dend_v: Vec<f64>,
}

impl SweepTrace {
    pub fn peak_soma_v(&self) -> f64 {
        self.soma_v.iter().cloned().fold(f64::MIN, f64::max)
    }

    pub fn peak_dend_v(&self) -> f64 {
        self.dend_v.iter().cloned().fold(f64::MIN, f64::max)
    }
}

/// Time, soma and dendrite recordings read back after every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRecordings {
    pub t: RecordingId,
    pub soma_v: RecordingId,
    pub dend_v: RecordingId,
}

impl SweepRecordings {
    /// Records `t` plus `v` at the middle of the soma and the dendrite.
    pub fn record(model: &mut Model, cell: &BallAndStick) -> Result<SweepRecordings> {
        Ok(SweepRecordings {
            t: model.record_time(),
            soma_v: model.record_voltage(cell.soma_at(0.5))?,
            dend_v: model.record_voltage(cell.dend_at(0.5))?,
        })
    }
}

#[derive(Debug, Serialize)]
struct SweepRow {
    amp: f64,
    nseg: usize,
    t: f64,
    soma_v: f64,
    dend_v: f64,
}

/// Runs the cell once per (amp, nseg) pair. The model records into one set
/// of buffers, so each run is snapshotted before the next one starts.
/// The clamp amplitude and dendrite nseg are left at the last pair.
pub fn run_sweep(
    model: &mut Model,
    cell: &BallAndStick,
    clamp: ClampId,
    recordings: &SweepRecordings,
    sweep: &Sweep,
    v_init: f64,
    tstop: f64,
) -> Result<Vec<SweepTrace>> {
    let mut traces = Vec::with_capacity(sweep.amps.len() * sweep.nsegs.len());
    for (&amp, &nseg) in iproduct!(&sweep.amps, &sweep.nsegs) {
        model.clamp_mut(clamp)?.amp = amp;
        model.section_mut(cell.dend())?.set_nseg(nseg)?;
        model.finitialize(v_init)?;
        model.continuerun(tstop)?;

        let trace = SweepTrace {
            amp,
            nseg,
            t: model.snapshot(recordings.t)?,
            soma_v: model.snapshot(recordings.soma_v)?,
            dend_v: model.snapshot(recordings.dend_v)?,
        };
        info!(
            "amp={:.3} nseg={}: soma peak {:.2} mV, dend peak {:.2} mV",
            amp,
            nseg,
            trace.peak_soma_v(),
            trace.peak_dend_v()
        );
        traces.push(trace);
    }
    Ok(traces)
}

/// Long format CSV with header `amp,nseg,t,soma_v,dend_v`.
pub fn write_sweep<P: AsRef<Path>>(path: P, traces: &[SweepTrace]) -> Result<()> {
    write_sweep_to(File::create(path.as_ref())?, traces)?;
    info!("Wrote {} runs to {}", traces.len(), path.as_ref().display());
    Ok(())
}

pub fn write_sweep_to<W: Write>(writer: W, traces: &[SweepTrace]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    for trace in traces {
        for ((&t, &soma_v), &dend_v) in trace.t.iter().zip(&trace.soma_v).zip(&trace.dend_v) {
            writer.serialize(SweepRow {
                amp: trace.amp,
                nseg: trace.nseg,
                t,
                soma_v,
                dend_v,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}
