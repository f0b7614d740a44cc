use std::env;
use std::path::PathBuf;

use log::info;

use cable_rs::config::{self, BasicsConfig};
use cable_rs::plot::plot_trace;
use cable_rs::trace::{read_table, read_trace, write_trace};
use cable_rs::units::units;
use cable_rs::{Location, MechanismKind, Model, Result};

// Single soma with hh channels, kicked by a short current pulse.
// The voltage trace is written to a two column csv and read back two ways.
fn main() -> Result<()> {
    env_logger::init();
    let config_path = env::args().nth(1).map(PathBuf::from);
    let config: BasicsConfig = config::load(config_path.as_deref())?;

    let mut model = Model::new();
    model.dt = config.simulation.dt;
    model.celsius = config.simulation.celsius;

    let soma = model.create_section("soma");
    print!("{}", model.topology());
    let info = model.psection(soma)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    // a fresh section is 100 um long
    println!("{}", info.morphology.length);

    {
        let sec = model.section_mut(soma)?;
        sec.length = config.soma_size;
        sec.diam = config.soma_size;
    }
    model.insert(soma, MechanismKind::HodgkinHuxley)?;

    let centre = Location::new(soma, 0.5);
    if let Some(hh) = model.segment(centre)?.hh() {
        println!("gkbar = {} {}", hh.gkbar, units("gkbar_hh").unwrap_or(""));
    }

    let clamp = model.iclamp(centre)?;
    {
        let c = model.clamp_mut(clamp)?;
        c.delay = config.stimulus.delay;
        c.dur = config.stimulus.dur;
        c.amp = config.stimulus.amp;
    }
    println!("{}", serde_json::to_string_pretty(&model.psection(soma)?)?);

    let v = model.record_voltage(centre)?;
    let t = model.record_time();

    model.finitialize(config.simulation.v_init)?;
    model.continuerun(config.simulation.tstop)?;

    write_trace(&config.output, model.trace(t)?, model.trace(v)?)?;

    let (t_new, v_new) = read_trace(&config.output)?;
    info!("Read back {} rows by hand", t_new.len());

    let table = read_table(&config.output, &["t", "v"])?;
    info!("Read back {} rows as a table", table.len());
    plot_trace(
        &config.plot,
        "soma(0.5)",
        table.column("t").unwrap_or_default(),
        table.column("v").unwrap_or_default(),
    )?;

    let peak = v_new.iter().cloned().fold(f64::MIN, f64::max);
    println!(
        "{} samples up to t = {} ms, peak v = {:.2} mV",
        table.len(),
        t_new.last().copied().unwrap_or_default(),
        peak
    );
    Ok(())
}
