use std::fmt;

use log::debug;

use crate::channels::MechanismKind;
use crate::error::Result;
use crate::model::{Location, Model, SectionId};

/// Two compartment neuron: an active spherical-ish soma with a passive dendrite
/// hanging off its 1 end.
#[derive(Debug, Clone, PartialEq)]
pub struct BallAndStick {
    gid: u64,
    soma: SectionId,
    dend: SectionId,
}

impl BallAndStick {
    pub fn new(model: &mut Model, gid: u64) -> Result<BallAndStick> {
        let label = format!("BallAndStick[{}]", gid);
        let soma = model.create_cell_section(&label, "soma");
        let dend = model.create_cell_section(&label, "dend");
        let cell = BallAndStick { gid, soma, dend };
        cell.setup_morphology(model)?;
        cell.setup_biophysics(model)?;
        debug!("Built {}", cell);
        Ok(cell)
    }

    fn setup_morphology(&self, model: &mut Model) -> Result<()> {
        // dend starts where the soma ends
        model.connect(self.dend, self.soma, 1.0)?;
        let soma = model.section_mut(self.soma)?;
        // length equal to diameter gives the area of a sphere of that diameter
        soma.length = 12.6157;
        soma.diam = 12.6157;
        let dend = model.section_mut(self.dend)?;
        dend.length = 200.0;
        dend.diam = 1.0;
        Ok(())
    }

    fn setup_biophysics(&self, model: &mut Model) -> Result<()> {
        for id in self.all() {
            let sec = model.section_mut(id)?;
            sec.ra = 100.0;
            sec.cm = 1.0;
        }

        let soma = model.section_mut(self.soma)?;
        soma.insert(MechanismKind::HodgkinHuxley);
        for seg in soma.segments.iter_mut() {
            if let Some(hh) = seg.hh_mut() {
                hh.gnabar = 0.12;
                hh.gkbar = 0.036;
                hh.gl = 0.0003;
                hh.el = -54.3;
            }
        }

        let dend = model.section_mut(self.dend)?;
        dend.insert(MechanismKind::Passive);
        for seg in dend.segments.iter_mut() {
            if let Some(pas) = seg.pas_mut() {
                pas.g = 0.001;
                pas.e = -65.0;
            }
        }
        Ok(())
    }

    pub fn gid(&self) -> u64 {
        self.gid
    }

    pub fn soma(&self) -> SectionId {
        self.soma
    }

    pub fn dend(&self) -> SectionId {
        self.dend
    }

    pub fn all(&self) -> [SectionId; 2] {
        [self.soma, self.dend]
    }

    pub fn soma_at(&self, x: f64) -> Location {
        Location::new(self.soma, x)
    }

    pub fn dend_at(&self, x: f64) -> Location {
        Location::new(self.dend, x)
    }

    /// Deletes the cell's sections from the model.
    pub fn remove(self, model: &mut Model) -> Result<()> {
        for id in self.all() {
            model.delete_section(id)?;
        }
        debug!("Removed {}", self);
        Ok(())
    }
}

impl fmt::Display for BallAndStick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BallAndStick[{}]", self.gid)
    }
}

/// A lone soma section with `hh` inserted.
pub fn single_soma(model: &mut Model, length: f64, diam: f64) -> Result<SectionId> {
    let soma = model.create_section("soma");
    let sec = model.section_mut(soma)?;
    sec.length = length;
    sec.diam = diam;
    sec.insert(MechanismKind::HodgkinHuxley);
    Ok(soma)
}
