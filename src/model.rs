use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::channels::{Dynamics, MechanismKind};
use crate::error::{CableError, Result};
use crate::recording::{Recording, Source};
use crate::sections::{Section, Segment};
use crate::solver;
use crate::stimulus::IClamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClampId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingId(pub(crate) usize);

/// A point along a section, `x` running from 0 to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub section: SectionId,
    pub x: f64,
}

impl Location {
    pub fn new(section: SectionId, x: f64) -> Location {
        Location { section, x }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MorphologyInfo {
    #[serde(rename = "L")]
    pub length: f64,
    pub diam: f64,
    pub nseg: usize,
    pub parent: Option<String>,
    pub parent_x: Option<f64>,
    pub area: f64,
}

/// Snapshot of a section's properties, serialisable for pretty printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionInfo {
    pub name: String,
    pub cell: Option<String>,
    pub morphology: MorphologyInfo,
    #[serde(rename = "Ra")]
    pub ra: f64,
    pub cm: f64,
    /// mechanism -> parameter -> value per segment
    pub density_mechs: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    /// point process type -> count
    pub point_processes: BTreeMap<String, usize>,
    pub v: Vec<f64>,
}

/// Owns every section, point process and recording of a simulation plus the clock.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) sections: Vec<Option<Section>>,
    clamps: Vec<Option<IClamp>>,
    recordings: Vec<Option<Recording>>,
    /// Time step (ms)
    pub dt: f64,
    /// Temperature (degC)
    pub celsius: f64,
    t: f64,
    /// Solver node order, dropped whenever a section may have changed shape
    pub(crate) tree: Option<solver::Tree>,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

impl Model {
    pub fn new() -> Model {
        Model {
            sections: Vec::new(),
            clamps: Vec::new(),
            recordings: Vec::new(),
            dt: 0.025,
            celsius: 6.3,
            t: 0.0,
            tree: None,
        }
    }

    /// Current simulation time (ms).
    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn create_section(&mut self, name: &str) -> SectionId {
        self.push_section(Section::new(name, None))
    }

    pub fn create_cell_section(&mut self, cell: &str, name: &str) -> SectionId {
        self.push_section(Section::new(name, Some(cell)))
    }

    fn push_section(&mut self, section: Section) -> SectionId {
        let id = SectionId(self.sections.len());
        debug!("Created section {} as {:?}", section, id);
        self.sections.push(Some(section));
        self.tree = None;
        id
    }

    pub fn section(&self, id: SectionId) -> Result<&Section> {
        self.sections
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(CableError::SectionNotFound(id))
    }

    pub fn section_mut(&mut self, id: SectionId) -> Result<&mut Section> {
        self.tree = None;
        self.section_state_mut(id)
    }

    /// Mutable access for the solver, which only touches voltages and gates.
    pub(crate) fn section_state_mut(&mut self, id: SectionId) -> Result<&mut Section> {
        self.sections
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(CableError::SectionNotFound(id))
    }

    /// Live sections in creation order.
    pub fn sections(&self) -> impl Iterator<Item = (SectionId, &Section)> {
        self.sections
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (SectionId(i), s)))
    }

    /// Removes a section. Its children are left unattached and any point
    /// processes or recordings placed on it are dropped.
    pub fn delete_section(&mut self, id: SectionId) -> Result<()> {
        let section = self
            .sections
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(CableError::SectionNotFound(id))?;
        self.tree = None;

        for child in self.sections.iter_mut().flatten() {
            if matches!(child.parent, Some((parent, _)) if parent == id) {
                child.parent = None;
            }
        }
        for slot in self.clamps.iter_mut() {
            if slot.as_ref().is_some_and(|c| c.location.section == id) {
                warn!("Dropping current clamp on deleted section {}", section);
                *slot = None;
            }
        }
        for slot in self.recordings.iter_mut() {
            if matches!(slot.as_ref().map(|r| r.source), Some(Source::Voltage(loc)) if loc.section == id)
            {
                warn!("Dropping recording on deleted section {}", section);
                *slot = None;
            }
        }
        debug!("Deleted section {}", section);
        Ok(())
    }

    /// Attaches the 0 end of `child` to `parent(x)`.
    pub fn connect(&mut self, child: SectionId, parent: SectionId, x: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&x) {
            return Err(CableError::InvalidLocation(x));
        }
        self.section(child)?;
        self.section(parent)?;

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(CableError::ConnectionCycle {
                    child: self.section(child)?.to_string(),
                    parent: self.section(parent)?.to_string(),
                });
            }
            cursor = self.section(id)?.parent.map(|(p, _)| p);
        }

        self.section_mut(child)?.parent = Some((parent, x));
        Ok(())
    }

    pub fn insert(&mut self, id: SectionId, kind: MechanismKind) -> Result<()> {
        self.section_mut(id)?.insert(kind);
        Ok(())
    }

    pub fn segment(&self, loc: Location) -> Result<&Segment> {
        self.section(loc.section)?.segment(loc.x)
    }

    pub fn segment_mut(&mut self, loc: Location) -> Result<&mut Segment> {
        self.section_mut(loc.section)?.segment_mut(loc.x)
    }

    /// Membrane area (um2) of the segment containing `loc`.
    pub fn area(&self, loc: Location) -> Result<f64> {
        let section = self.section(loc.section)?;
        section.segment_index(loc.x)?;
        Ok(section.segment_area())
    }

    /// Places a current clamp at `loc`.
    pub fn iclamp(&mut self, loc: Location) -> Result<ClampId> {
        self.section(loc.section)?.segment_index(loc.x)?;
        let id = ClampId(self.clamps.len());
        self.clamps.push(Some(IClamp::new(loc)));
        Ok(id)
    }

    pub fn clamp(&self, id: ClampId) -> Result<&IClamp> {
        self.clamps
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(CableError::ClampNotFound(id))
    }

    pub fn clamp_mut(&mut self, id: ClampId) -> Result<&mut IClamp> {
        self.clamps
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(CableError::ClampNotFound(id))
    }

    pub(crate) fn clamps(&self) -> impl Iterator<Item = &IClamp> {
        self.clamps.iter().flatten()
    }

    /// Records the membrane potential at `loc` every step.
    pub fn record_voltage(&mut self, loc: Location) -> Result<RecordingId> {
        self.section(loc.section)?.segment_index(loc.x)?;
        Ok(self.push_recording(Source::Voltage(loc)))
    }

    /// Records the simulation time every step.
    pub fn record_time(&mut self) -> RecordingId {
        self.push_recording(Source::Time)
    }

    fn push_recording(&mut self, source: Source) -> RecordingId {
        let id = RecordingId(self.recordings.len());
        self.recordings.push(Some(Recording::new(source)));
        id
    }

    /// Borrowed view of a recording. The next `finitialize` overwrites it.
    pub fn trace(&self, id: RecordingId) -> Result<&[f64]> {
        self.recordings
            .get(id.0)
            .and_then(Option::as_ref)
            .map(Recording::values)
            .ok_or(CableError::RecordingNotFound(id))
    }

    /// Owned copy of a recording that survives later runs.
    pub fn snapshot(&self, id: RecordingId) -> Result<Vec<f64>> {
        Ok(self.trace(id)?.to_vec())
    }

    fn check_dt(&self) -> Result<()> {
        if self.dt.is_finite() && self.dt > 0.0 {
            Ok(())
        } else {
            Err(CableError::InvalidTimeStep(self.dt))
        }
    }

    /// Resets the clock to 0, sets every segment to `v_init`, puts channel
    /// states at steady state and restarts all recordings.
    pub fn finitialize(&mut self, v_init: f64) -> Result<()> {
        self.check_dt()?;
        self.t = 0.0;
        for section in self.sections.iter_mut().flatten() {
            for seg in section.segments.iter_mut() {
                seg.v = v_init;
                for channel in seg.channels.iter_mut() {
                    channel.init(v_init);
                }
            }
        }
        for recording in self.recordings.iter_mut().flatten() {
            recording.clear();
        }
        self.sample()
    }

    /// Advances one time step.
    pub fn fadvance(&mut self) -> Result<()> {
        self.check_dt()?;
        solver::step(self)?;
        self.t += self.dt;
        self.sample()
    }

    /// Advances until `t` reaches `tstop`.
    pub fn continuerun(&mut self, tstop: f64) -> Result<()> {
        self.check_dt()?;
        while self.t < tstop - self.dt / 2.0 {
            self.fadvance()?;
        }
        debug!("Ran to t = {} ms", self.t);
        Ok(())
    }

    fn sample(&mut self) -> Result<()> {
        let values = self
            .recordings
            .iter()
            .map(|slot| match slot.as_ref().map(|r| r.source) {
                Some(Source::Time) => Ok(Some(self.t)),
                Some(Source::Voltage(loc)) => self.segment(loc).map(|s| Some(s.v)),
                None => Ok(None),
            })
            .collect::<Result<Vec<Option<f64>>>>()?;

        for (slot, value) in self.recordings.iter_mut().zip(values) {
            if let (Some(recording), Some(value)) = (slot.as_mut(), value) {
                recording.push(value);
            }
        }
        Ok(())
    }

    /// ASCII rendering of the section tree, one dash per segment.
    pub fn topology(&self) -> String {
        let mut out = String::from("\n");
        let roots: Vec<SectionId> = self
            .sections()
            .filter(|(_, s)| s.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        for root in roots {
            self.draw(root, 0, &mut out);
        }
        out.push('\n');
        out
    }

    fn draw(&self, id: SectionId, indent: usize, out: &mut String) {
        let Ok(section) = self.section(id) else {
            return;
        };
        let lead = if section.parent.is_some() { '`' } else { '|' };
        out.push_str(&format!(
            "{}{}{}|       {}(0-1)\n",
            " ".repeat(indent),
            lead,
            "-".repeat(section.nseg()),
            section
        ));
        let children = self
            .sections()
            .filter_map(|(child, s)| match s.parent {
                Some((parent, x)) if parent == id => Some((child, x)),
                _ => None,
            })
            .collect::<Vec<_>>();
        for (child, x) in children {
            let offset = (x * section.nseg() as f64).round() as usize;
            self.draw(child, indent + 1 + offset, out);
        }
    }

    /// Properties of a section: geometry, mechanisms and point processes.
    pub fn psection(&self, id: SectionId) -> Result<SectionInfo> {
        let section = self.section(id)?;

        let mut density_mechs: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
        for seg in section.segments() {
            for channel in seg.channels() {
                let params = density_mechs
                    .entry(channel.kind().suffix().to_owned())
                    .or_default();
                for (name, value) in channel.parameters() {
                    params.entry(name.to_owned()).or_default().push(value);
                }
            }
        }

        let mut point_processes = BTreeMap::new();
        let clamps = self.clamps().filter(|c| c.location.section == id).count();
        if clamps > 0 {
            point_processes.insert("IClamp".to_owned(), clamps);
        }

        let parent = match section.parent {
            Some((p, _)) => Some(self.section(p)?.to_string()),
            None => None,
        };

        Ok(SectionInfo {
            name: section.to_string(),
            cell: section.cell.clone(),
            morphology: MorphologyInfo {
                length: section.length,
                diam: section.diam,
                nseg: section.nseg(),
                parent,
                parent_x: section.parent.map(|(_, x)| x),
                area: section.segment_area() * section.nseg() as f64,
            },
            ra: section.ra,
            cm: section.cm,
            density_mechs,
            point_processes,
            v: section.segments().iter().map(|s| s.v).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soma_model() -> (Model, SectionId) {
        let mut model = Model::new();
        let soma = model.create_section("soma");
        let sec = model.section_mut(soma).unwrap();
        sec.length = 20.0;
        sec.diam = 20.0;
        (model, soma)
    }

    #[test]
    fn test_connect_rejects_cycles() {
        let mut model = Model::new();
        let a = model.create_section("a");
        let b = model.create_section("b");
        model.connect(b, a, 1.0).unwrap();
        assert!(matches!(
            model.connect(a, b, 1.0),
            Err(CableError::ConnectionCycle { .. })
        ));
        assert!(matches!(
            model.connect(a, a, 0.5),
            Err(CableError::ConnectionCycle { .. })
        ));
        assert!(matches!(
            model.connect(b, a, 2.0),
            Err(CableError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_delete_section_detaches_dependents() {
        let mut model = Model::new();
        let soma = model.create_section("soma");
        let dend = model.create_section("dend");
        model.connect(dend, soma, 1.0).unwrap();
        let clamp = model.iclamp(Location::new(soma, 0.5)).unwrap();
        let rec = model.record_voltage(Location::new(soma, 0.5)).unwrap();

        model.delete_section(soma).unwrap();

        assert!(model.section(soma).is_err());
        assert_eq!(model.section(dend).unwrap().parent(), None);
        assert!(matches!(model.clamp(clamp), Err(CableError::ClampNotFound(_))));
        assert!(matches!(model.trace(rec), Err(CableError::RecordingNotFound(_))));
        assert_eq!(model.sections().count(), 1);
    }

    #[test]
    fn test_recording_starts_at_initialisation() {
        let (mut model, soma) = soma_model();
        let v = model.record_voltage(Location::new(soma, 0.5)).unwrap();
        let t = model.record_time();
        model.finitialize(-65.0).unwrap();
        assert_eq!(model.trace(t).unwrap(), &[0.0]);
        assert_eq!(model.trace(v).unwrap(), &[-65.0]);

        model.continuerun(40.0).unwrap();
        assert_eq!(model.trace(t).unwrap().len(), 1601);
        assert_eq!(model.trace(v).unwrap().len(), 1601);
        assert!((model.t() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_finitialize_overwrites_in_place() {
        let (mut model, soma) = soma_model();
        model.insert(soma, MechanismKind::Passive).unwrap();
        model.segment_mut(Location::new(soma, 0.5)).unwrap().pas_mut().unwrap().e = -65.0;
        let clamp = model.iclamp(Location::new(soma, 0.5)).unwrap();
        let v = model.record_voltage(Location::new(soma, 0.5)).unwrap();

        {
            let c = model.clamp_mut(clamp).unwrap();
            c.delay = 1.0;
            c.dur = 1.0;
            c.amp = 0.05;
        }
        model.finitialize(-65.0).unwrap();
        model.continuerun(5.0).unwrap();
        let first = model.snapshot(v).unwrap();

        model.clamp_mut(clamp).unwrap().amp = 0.2;
        model.finitialize(-65.0).unwrap();
        model.continuerun(5.0).unwrap();

        assert_eq!(first.len(), model.trace(v).unwrap().len());
        assert_ne!(first.as_slice(), model.trace(v).unwrap());
    }

    #[test]
    fn test_topology_lists_tree() {
        let mut model = Model::new();
        let soma = model.create_section("soma");
        let dend = model.create_section("dend");
        model.connect(dend, soma, 1.0).unwrap();
        model.section_mut(dend).unwrap().set_nseg(3).unwrap();

        let topology = model.topology();
        let lines: Vec<&str> = topology.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["|-|       soma(0-1)", "  `---|       dend(0-1)"]);
    }

    #[test]
    fn test_psection_reports_mechanisms() {
        let (mut model, soma) = soma_model();
        model.insert(soma, MechanismKind::HodgkinHuxley).unwrap();
        model.iclamp(Location::new(soma, 0.5)).unwrap();

        let info = model.psection(soma).unwrap();
        assert_eq!(info.morphology.length, 20.0);
        assert_eq!(info.density_mechs["hh"]["gkbar"], vec![0.036]);
        assert_eq!(info.point_processes["IClamp"], 1);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["morphology"]["L"], 20.0);
    }

    #[test]
    fn test_time_step_must_be_positive() {
        let (mut model, _) = soma_model();
        for dt in [0.0, -0.025, f64::NAN, f64::INFINITY] {
            model.dt = dt;
            assert!(matches!(
                model.finitialize(-65.0),
                Err(CableError::InvalidTimeStep(_))
            ));
            assert!(matches!(
                model.continuerun(1.0),
                Err(CableError::InvalidTimeStep(_))
            ));
            assert!(matches!(
                model.fadvance(),
                Err(CableError::InvalidTimeStep(_))
            ));
        }

        model.dt = 0.025;
        model.finitialize(-65.0).unwrap();
        model.dt = 0.0;
        assert!(model.continuerun(1.0).is_err());
        assert_eq!(model.t(), 0.0);
    }

    #[test]
    fn test_solver_tree_is_reused_until_shape_changes() {
        let mut model = Model::new();
        let soma = model.create_section("soma");
        let dend = model.create_section("dend");
        model.connect(dend, soma, 1.0).unwrap();
        model.finitialize(-65.0).unwrap();
        assert!(model.tree.is_none());

        model.fadvance().unwrap();
        assert_eq!(model.tree.as_ref().map(|t| t.nodes.len()), Some(2));
        model.continuerun(1.0).unwrap();
        assert_eq!(model.tree.as_ref().map(|t| t.nodes.len()), Some(2));

        model.section_mut(dend).unwrap().set_nseg(4).unwrap();
        assert!(model.tree.is_none());
        model.fadvance().unwrap();
        assert_eq!(model.tree.as_ref().map(|t| t.nodes.len()), Some(5));

        model.delete_section(dend).unwrap();
        assert!(model.tree.is_none());
        model.fadvance().unwrap();
        assert_eq!(model.tree.as_ref().map(|t| t.nodes.len()), Some(1));
    }

    #[test]
    fn test_fresh_section_reports_default_geometry() {
        let mut model = Model::new();
        let soma = model.create_section("soma");
        let info = model.psection(soma).unwrap();
        assert_eq!(info.morphology.length, 100.0);
        assert_eq!(info.morphology.diam, 500.0);
        assert!(info.density_mechs.is_empty());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["morphology"]["L"], 100.0);
    }

    #[test]
    fn test_area_of_segment() {
        let (model, soma) = soma_model();
        let area = model.area(Location::new(soma, 0.5)).unwrap();
        assert!((area - 400.0 * std::f64::consts::PI).abs() < 1e-9);
    }
}
