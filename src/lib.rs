//! Small compartmental neuron simulator: sections with Hodgkin-Huxley or
//! passive membranes, current clamps, voltage recording, CSV traces and SVG
//! plots.

pub mod cell;
pub mod channels;
pub mod config;
pub mod error;
pub mod model;
pub mod plot;
pub mod recording;
pub mod sections;
mod solver;
pub mod stimulus;
pub mod swc_reader;
pub mod sweep;
pub mod trace;
pub mod units;

pub use cell::BallAndStick;
pub use channels::MechanismKind;
pub use error::{CableError, Result};
pub use model::{ClampId, Location, Model, RecordingId, SectionId};

/// Python bindings, built with `--features python`.
#[cfg(feature = "python")]
#[pyo3::pymodule]
mod cable_rs {
    use pyo3::prelude::*;

    use crate::cell::BallAndStick;
    use crate::model::{ClampId, Model};
    use crate::sweep::SweepRecordings;

    /// Writes a headerless `t,v` CSV.
    #[pyfunction]
    fn write_trace(path: &str, t: Vec<f64>, v: Vec<f64>) -> PyResult<()> {
        Ok(crate::trace::write_trace(path, &t, &v)?)
    }

    /// Reads a `t,v` CSV back into two lists.
    #[pyfunction]
    fn read_trace(path: &str) -> PyResult<(Vec<f64>, Vec<f64>)> {
        Ok(crate::trace::read_trace(path)?)
    }

    #[pyfunction]
    fn units(name: &str) -> Option<&'static str> {
        crate::units::units(name)
    }

    /// Ball and stick cell driven by a current clamp at the dendrite tip.
    #[pyclass]
    struct BallAndStickModel {
        model: Model,
        cell: BallAndStick,
        clamp: ClampId,
        recordings: SweepRecordings,
    }

    #[pymethods]
    impl BallAndStickModel {
        #[new]
        #[pyo3(signature = (delay=5.0, dur=1.0))]
        fn new(delay: f64, dur: f64) -> PyResult<Self> {
            let mut model = Model::new();
            let cell = BallAndStick::new(&mut model, 0)?;
            let clamp = model.iclamp(cell.dend_at(1.0))?;
            let c = model.clamp_mut(clamp)?;
            c.delay = delay;
            c.dur = dur;
            let recordings = SweepRecordings::record(&mut model, &cell)?;
            Ok(BallAndStickModel {
                model,
                cell,
                clamp,
                recordings,
            })
        }

        /// Returns `(t, soma_v, dend_v)` for one run.
        #[pyo3(signature = (amp, nseg=1, tstop=25.0, v_init=-65.0))]
        fn run(
            &mut self,
            amp: f64,
            nseg: usize,
            tstop: f64,
            v_init: f64,
        ) -> PyResult<(Vec<f64>, Vec<f64>, Vec<f64>)> {
            self.model.clamp_mut(self.clamp)?.amp = amp;
            self.model.section_mut(self.cell.dend())?.set_nseg(nseg)?;
            self.model.finitialize(v_init)?;
            self.model.continuerun(tstop)?;
            Ok((
                self.model.snapshot(self.recordings.t)?,
                self.model.snapshot(self.recordings.soma_v)?,
                self.model.snapshot(self.recordings.dend_v)?,
            ))
        }
    }
}
