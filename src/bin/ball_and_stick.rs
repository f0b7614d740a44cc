use std::env;
use std::fs::File;
use std::path::PathBuf;

use csv::Writer;
use log::info;

use cable_rs::config::{self, BallAndStickConfig};
use cable_rs::plot::{plot_sweep, plot_trace};
use cable_rs::sweep::{SweepRecordings, run_sweep, write_sweep};
use cable_rs::units::units;
use cable_rs::{BallAndStick, Model, Result};

// Builds two ball and stick cells, deletes one, drives the other through
// its dendrite tip and then sweeps stimulus amplitude against dendrite nseg.
fn main() -> Result<()> {
    env_logger::init();
    let config_path = env::args().nth(1).map(PathBuf::from);
    let config: BallAndStickConfig = config::load(config_path.as_deref())?;

    let mut model = Model::new();
    model.dt = config.simulation.dt;
    model.celsius = config.simulation.celsius;

    let cell = BallAndStick::new(&mut model, 0)?;
    let other = BallAndStick::new(&mut model, 1)?;
    print!("{}", model.topology());
    other.remove(&mut model)?;
    print!("{}", model.topology());

    // about 500 um2, the area of a sphere with the soma's diameter
    println!("{}", model.area(cell.soma_at(0.5))?);
    println!("{}", model.section(cell.soma())?.nseg());
    println!("{}", units("gnabar_hh").unwrap_or(""));

    for (id, section) in model.sections() {
        let info = model.psection(id)?;
        let mechs = info.density_mechs.keys().cloned().collect::<Vec<_>>();
        println!("{}: {}", section, mechs.join(", "));
        info!("{} area {:.2} um2", info.name, info.morphology.area);
    }

    let clamp = model.iclamp(cell.dend_at(1.0))?;
    {
        let c = model.clamp_mut(clamp)?;
        c.delay = config.stimulus.delay;
        c.dur = config.stimulus.dur;
        c.amp = config.stimulus.amp;
    }

    let recordings = SweepRecordings::record(&mut model, &cell)?;

    model.finitialize(config.simulation.v_init)?;
    model.continuerun(config.simulation.tstop)?;

    let mut writer = Writer::from_writer(File::create(&config.output)?);
    writer.write_record(["t", "soma_v", "dend_v"])?;
    for ((t, s), d) in model
        .trace(recordings.t)?
        .iter()
        .zip(model.trace(recordings.soma_v)?)
        .zip(model.trace(recordings.dend_v)?)
    {
        writer.serialize((t, s, d))?;
    }
    writer.flush()?;
    info!("Wrote first run to {}", config.output.display());
    plot_trace(
        &config.plot,
        "BallAndStick[0].soma(0.5)",
        model.trace(recordings.t)?,
        model.trace(recordings.soma_v)?,
    )?;

    let traces = run_sweep(
        &mut model,
        &cell,
        clamp,
        &recordings,
        &config.sweep,
        config.simulation.v_init,
        config.simulation.tstop,
    )?;
    write_sweep(&config.sweep_output, &traces)?;
    plot_sweep(&config.sweep_plot, &traces)?;

    for trace in &traces {
        println!(
            "amp={:.3} nseg={:>3}  soma peak {:>7.2} mV  dend peak {:>7.2} mV",
            trace.amp,
            trace.nseg,
            trace.peak_soma_v(),
            trace.peak_dend_v()
        );
    }
    Ok(())
}
