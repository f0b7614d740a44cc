use std::f64::consts::PI;
use std::fmt;

use crate::channels::{Channel, Dynamics, HodgkinHuxley, MechanismKind, Passive};
use crate::error::{CableError, Result};
use crate::model::SectionId;

/// Discretised piece of a section at which the membrane state is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Membrane potential (mV)
    pub v: f64,
    pub(crate) channels: Vec<Channel>,
}

impl Segment {
    fn new() -> Segment {
        Segment {
            v: -65.0,
            channels: Vec::new(),
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn has(&self, kind: MechanismKind) -> bool {
        self.channels.iter().any(|c| c.kind() == kind)
    }

    pub fn hh(&self) -> Option<&HodgkinHuxley> {
        self.channels.iter().find_map(|c| match c {
            Channel::HodgkinHuxley(hh) => Some(hh),
            _ => None,
        })
    }

    pub fn hh_mut(&mut self) -> Option<&mut HodgkinHuxley> {
        self.channels.iter_mut().find_map(|c| match c {
            Channel::HodgkinHuxley(hh) => Some(hh),
            _ => None,
        })
    }

    pub fn pas(&self) -> Option<&Passive> {
        self.channels.iter().find_map(|c| match c {
            Channel::Passive(pas) => Some(pas),
            _ => None,
        })
    }

    pub fn pas_mut(&mut self) -> Option<&mut Passive> {
        self.channels.iter_mut().find_map(|c| match c {
            Channel::Passive(pas) => Some(pas),
            _ => None,
        })
    }

    /// Total ionic current density (mA/cm2) at `v`.
    pub(crate) fn ionic_current(&self, v: f64) -> f64 {
        self.channels.iter().map(|c| c.current(v)).sum()
    }

    /// Total slope conductance (S/cm2) at `v`.
    pub(crate) fn ionic_conductance(&self, v: f64) -> f64 {
        self.channels.iter().map(|c| c.conductance(v)).sum()
    }
}

/// Unbranched cylindrical cable, e.g. a soma or a dendrite.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub(crate) name: String,
    /// Label of the owning cell, e.g. `BallAndStick[0]`
    pub(crate) cell: Option<String>,
    /// Length (um)
    pub length: f64,
    /// Diameter (um)
    pub diam: f64,
    /// Axial resistivity (ohm cm)
    pub ra: f64,
    /// Specific membrane capacitance (uF/cm2)
    pub cm: f64,
    /// Where this section's 0 end attaches: (parent, x on parent)
    pub(crate) parent: Option<(SectionId, f64)>,
    pub(crate) segments: Vec<Segment>,
}

impl Section {
    pub(crate) fn new(name: &str, cell: Option<&str>) -> Section {
        Section {
            name: name.to_owned(),
            cell: cell.map(str::to_owned),
            length: 100.0,
            diam: 500.0,
            ra: 35.4,
            cm: 1.0,
            parent: None,
            segments: vec![Segment::new()],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self) -> Option<&str> {
        self.cell.as_deref()
    }

    pub fn parent(&self) -> Option<(SectionId, f64)> {
        self.parent
    }

    pub fn nseg(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Changes the discretisation. Each new segment takes the mechanisms
    /// and voltage of the old segment covering its centre.
    pub fn set_nseg(&mut self, nseg: usize) -> Result<()> {
        if nseg == 0 {
            return Err(CableError::ZeroSegments);
        }
        if nseg == self.nseg() {
            return Ok(());
        }
        let old = std::mem::take(&mut self.segments);
        self.segments = (0..nseg)
            .map(|i| {
                let centre = (i as f64 + 0.5) / nseg as f64;
                let idx = ((centre * old.len() as f64) as usize).min(old.len() - 1);
                old[idx].clone()
            })
            .collect();
        Ok(())
    }

    /// Inserts a density mechanism into every segment. Inserting twice is a no-op.
    pub fn insert(&mut self, kind: MechanismKind) {
        for seg in self.segments.iter_mut().filter(|s| !s.has(kind)) {
            seg.channels.push(kind.instantiate());
        }
    }

    pub fn has(&self, kind: MechanismKind) -> bool {
        self.segments.iter().all(|s| s.has(kind))
    }

    /// Index of the segment containing `x`. The 0 and 1 ends map onto the
    /// first and last segment.
    pub fn segment_index(&self, x: f64) -> Result<usize> {
        if !(0.0..=1.0).contains(&x) {
            return Err(CableError::InvalidLocation(x));
        }
        let nseg = self.nseg();
        Ok(((x * nseg as f64) as usize).min(nseg - 1))
    }

    /// Centre of segment `idx` in normalised units.
    pub fn segment_centre(&self, idx: usize) -> f64 {
        (idx as f64 + 0.5) / self.nseg() as f64
    }

    pub fn segment_length(&self) -> f64 {
        self.length / self.nseg() as f64
    }

    /// Lateral membrane area of one segment (um2). End caps are not counted.
    pub fn segment_area(&self) -> f64 {
        PI * self.diam * self.segment_length()
    }

    /// Axial resistance (ohm) from a segment centre to its end.
    pub fn half_resistance(&self) -> f64 {
        let radius_cm = self.diam / 2.0 * 1e-4;
        let half_length_cm = self.segment_length() / 2.0 * 1e-4;
        self.ra * half_length_cm / (PI * radius_cm * radius_cm)
    }

    pub fn segment_mut(&mut self, x: f64) -> Result<&mut Segment> {
        let idx = self.segment_index(x)?;
        Ok(&mut self.segments[idx])
    }

    pub fn segment(&self, x: f64) -> Result<&Segment> {
        let idx = self.segment_index(x)?;
        Ok(&self.segments[idx])
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cell {
            Some(cell) => write!(f, "{}.{}", cell, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_soma_area() {
        let mut soma = Section::new("soma", None);
        soma.length = 12.6157;
        soma.diam = 12.6157;
        assert!((soma.segment_area() - 500.0).abs() < 0.01);
    }

    #[test]
    fn test_segment_index() {
        let mut dend = Section::new("dend", None);
        dend.set_nseg(5).unwrap();
        assert_eq!(dend.segment_index(0.0).unwrap(), 0);
        assert_eq!(dend.segment_index(0.5).unwrap(), 2);
        assert_eq!(dend.segment_index(1.0).unwrap(), 4);
        assert!(matches!(
            dend.segment_index(1.5),
            Err(CableError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut soma = Section::new("soma", None);
        soma.insert(MechanismKind::HodgkinHuxley);
        soma.insert(MechanismKind::HodgkinHuxley);
        assert_eq!(soma.segments()[0].channels().len(), 1);
        assert!(soma.has(MechanismKind::HodgkinHuxley));
        assert!(!soma.has(MechanismKind::Passive));
    }

    #[test]
    fn test_set_nseg_keeps_parameters() {
        let mut dend = Section::new("dend", None);
        dend.insert(MechanismKind::Passive);
        dend.segment_mut(0.5).unwrap().pas_mut().unwrap().e = -65.0;
        dend.set_nseg(101).unwrap();
        assert_eq!(dend.nseg(), 101);
        assert!(dend.segments().iter().all(|s| s.pas().unwrap().e == -65.0));
        assert!(matches!(dend.set_nseg(0), Err(CableError::ZeroSegments)));
    }

    #[test]
    fn test_display_with_cell() {
        let sec = Section::new("dend", Some("BallAndStick[3]"));
        assert_eq!(sec.to_string(), "BallAndStick[3].dend");
    }
}
