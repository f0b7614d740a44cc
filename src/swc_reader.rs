use itertools::Itertools;
use log::{info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{CableError, Result};
use crate::model::{Model, SectionId};

/// Structure types, as per: http://www.neuronland.org/NLMorphologyConverter/MorphologyFormats/SWC/Spec.html
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum StructureIdentifier {
    Undefined,
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
    ForkPoint,
    EndPoint,
    Custom,
}

impl From<u8> for StructureIdentifier {
    fn from(v: u8) -> Self {
        match v {
            0 => StructureIdentifier::Undefined,
            1 => StructureIdentifier::Soma,
            2 => StructureIdentifier::Axon,
            3 => StructureIdentifier::BasalDendrite,
            4 => StructureIdentifier::ApicalDendrite,
            5 => StructureIdentifier::ForkPoint,
            6 => StructureIdentifier::EndPoint,
            _ => StructureIdentifier::Custom,
        }
    }
}

impl StructureIdentifier {
    fn code(&self) -> u8 {
        match self {
            StructureIdentifier::Undefined => 0,
            StructureIdentifier::Soma => 1,
            StructureIdentifier::Axon => 2,
            StructureIdentifier::BasalDendrite => 3,
            StructureIdentifier::ApicalDendrite => 4,
            StructureIdentifier::ForkPoint => 5,
            StructureIdentifier::EndPoint => 6,
            StructureIdentifier::Custom => 7,
        }
    }

    /// Base name of the sections built from points of this type.
    fn section_name(&self) -> &'static str {
        match self {
            StructureIdentifier::Soma => "soma",
            StructureIdentifier::Axon => "axon",
            StructureIdentifier::ApicalDendrite => "apic",
            _ => "dend",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SwcPoint {
    pub id: u64,
    pub kind: StructureIdentifier,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    pub parent: Option<u64>,
}

impl SwcPoint {
    /// Assumes a straight line between the points
    fn distance(&self, other: &SwcPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwcOptions {
    /// Warn about zero-radius points
    pub emit_warnings: bool,
    /// Fail on zero-radius points that are not end points
    pub strict: bool,
}

impl Default for SwcOptions {
    fn default() -> Self {
        SwcOptions {
            emit_warnings: true,
            strict: false,
        }
    }
}

/// Unbranched run of points that becomes one section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSketch {
    pub name: String,
    pub kind: StructureIdentifier,
    pub points: Vec<u64>,
    /// Index of the parent sketch and the attachment point on it
    pub parent: Option<(usize, f64)>,
    pub length: f64,
    pub diam: f64,
}

/// Point tree in breadth first order from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    points: Vec<SwcPoint>,
}

fn parse_line(line_no: usize, line: &str) -> Result<SwcPoint> {
    let bad = |reason: String| CableError::MalformedSwc {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(bad(format!("expected 7 fields, found {}", fields.len())));
    }
    let float = |i: usize| {
        fields[i]
            .parse::<f64>()
            .map_err(|e| bad(format!("{:?}: {}", fields[i], e)))
    };

    let id = fields[0]
        .parse::<u64>()
        .map_err(|e| bad(format!("id {:?}: {}", fields[0], e)))?;
    let kind: StructureIdentifier = fields[1]
        .parse::<u8>()
        .map_err(|e| bad(format!("type {:?}: {}", fields[1], e)))?
        .into();
    let parent = fields[6]
        .parse::<i64>()
        .map_err(|e| bad(format!("parent {:?}: {}", fields[6], e)))?;

    Ok(SwcPoint {
        id,
        kind,
        x: float(2)?,
        y: float(3)?,
        z: float(4)?,
        radius: float(5)?,
        parent: if parent < 0 { None } else { Some(parent as u64) },
    })
}

/// Parses SWC text. Comment (`#`) and blank lines are skipped.
///
/// Zero radius points get a radius of 1 um (after a warning when
/// `emit_warnings` is set); in strict mode they are an error unless they are
/// end points. Points that cannot be reached from the first root are dropped.
pub fn parse_swc(text: &str, options: &SwcOptions) -> Result<Morphology> {
    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut point = parse_line(idx + 1, line)?;
        if point.radius == 0.0 {
            if options.emit_warnings {
                warn!(
                    "Zero-radius for point ID: {} of type: {:?}",
                    point.id, point.kind
                );
            }
            if options.strict && point.kind != StructureIdentifier::EndPoint {
                return Err(CableError::Morphology(format!(
                    "zero radius at non end point {}",
                    point.id
                )));
            }
            point.radius = 1.0;
        }
        points.push(point);
    }

    for (kind, count) in points.iter().map(|p| p.kind).counts() {
        info!("{:?} - #{}", kind, count);
    }

    let by_id: HashMap<u64, SwcPoint> = points.iter().map(|p| (p.id, *p)).collect();
    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
    for p in &points {
        if let Some(parent) = p.parent {
            if !by_id.contains_key(&parent) {
                return Err(CableError::Morphology(format!(
                    "point {} refers to missing parent {}",
                    p.id, parent
                )));
            }
            children.entry(parent).or_default().push(p.id);
        }
    }

    let root = points
        .iter()
        .find(|p| p.parent.is_none())
        .ok_or_else(|| CableError::Morphology("no root point (parent -1)".to_owned()))?;

    let mut sorted = Vec::with_capacity(points.len());
    let mut queue: VecDeque<u64> = VecDeque::from([root.id]);
    let mut visited: HashSet<u64> = HashSet::new();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            warn!("Cycle detected at {}", id);
            continue;
        }
        sorted.push(by_id[&id]);
        if let Some(kids) = children.get(&id) {
            queue.extend(kids.iter().filter(|k| !visited.contains(*k)));
        }
    }

    if sorted.len() < points.len() {
        warn!(
            "Dropped {} points not connected to root {}",
            points.len() - sorted.len(),
            root.id
        );
    }
    info!("Processed {} points", sorted.len());

    Ok(Morphology { points: sorted })
}

pub fn read_swc<P: AsRef<Path>>(path: P, options: &SwcOptions) -> Result<Morphology> {
    parse_swc(&fs::read_to_string(path)?, options)
}

impl Morphology {
    pub fn points(&self) -> &[SwcPoint] {
        &self.points
    }

    /// Splits the tree into unbranched sections. A new section starts at the
    /// root, after a branch point, where the structure type changes and
    /// where a neurite leaves the soma.
    pub fn sketch(&self) -> Vec<SectionSketch> {
        let by_id: HashMap<u64, &SwcPoint> = self.points.iter().map(|p| (p.id, p)).collect();
        let child_count = self.points.iter().filter_map(|p| p.parent).counts();

        let mut sketches: Vec<SectionSketch> = Vec::new();
        let mut section_of: HashMap<u64, usize> = HashMap::new();
        let mut soma: Option<usize> = None;
        let mut name_counts: HashMap<&'static str, usize> = HashMap::new();
        let mut diam_sums: Vec<f64> = Vec::new();

        for point in &self.points {
            let parent = point.parent.map(|id| by_id[&id]);
            let is_soma = point.kind == StructureIdentifier::Soma
                && parent.is_none_or(|p| p.kind == StructureIdentifier::Soma);

            let continues = match parent {
                Some(p) if !is_soma => {
                    let parent_sketch = section_of[&p.id];
                    let unbranched = child_count.get(&p.id).copied().unwrap_or(0) == 1;
                    (Some(parent_sketch) != soma && unbranched && p.kind == point.kind)
                        .then_some(parent_sketch)
                }
                _ => None,
            };

            let idx = match (is_soma, soma, continues) {
                (true, Some(soma_idx), _) => soma_idx,
                (_, _, Some(idx)) => idx,
                _ => {
                    let base = point.kind.section_name();
                    let name = if is_soma {
                        base.to_owned()
                    } else {
                        let n = name_counts.entry(base).or_insert(0);
                        *n += 1;
                        format!("{}[{}]", base, *n - 1)
                    };
                    let attach = parent.map(|p| {
                        let parent_sketch = section_of[&p.id];
                        let x = if Some(parent_sketch) == soma { 0.5 } else { 1.0 };
                        (parent_sketch, x)
                    });
                    sketches.push(SectionSketch {
                        name,
                        kind: point.kind,
                        points: Vec::new(),
                        parent: attach,
                        length: 0.0,
                        diam: 0.0,
                    });
                    diam_sums.push(0.0);
                    if is_soma {
                        soma = Some(sketches.len() - 1);
                    }
                    sketches.len() - 1
                }
            };

            let sketch = &mut sketches[idx];
            if let Some(p) = parent {
                // neurites are measured from their first point, not the soma centre
                let leaves_soma =
                    !is_soma && sketch.points.is_empty() && Some(section_of[&p.id]) == soma;
                if !leaves_soma {
                    sketch.length += point.distance(p);
                }
            }
            sketch.points.push(point.id);
            diam_sums[idx] += 2.0 * point.radius;
            section_of.insert(point.id, idx);
        }

        for (sketch, sum) in sketches.iter_mut().zip(diam_sums) {
            sketch.diam = sum / sketch.points.len() as f64;
            if sketch.length <= 0.0 {
                // single point sections become a cylinder as long as it is wide
                sketch.length = sketch.diam;
            }
        }
        sketches
    }

    /// Builds the sections of `cell` in `model`. Returned ids follow `sketch()` order.
    pub fn instantiate(&self, model: &mut Model, cell: &str) -> Result<Vec<SectionId>> {
        let sketches = self.sketch();
        let mut ids = Vec::with_capacity(sketches.len());
        for sketch in &sketches {
            let id = model.create_cell_section(cell, &sketch.name);
            let section = model.section_mut(id)?;
            section.length = sketch.length;
            section.diam = sketch.diam;
            if let Some((parent, x)) = sketch.parent {
                model.connect(id, ids[parent], x)?;
            }
            ids.push(id);
        }
        info!("Built {} sections for {}", ids.len(), cell);
        Ok(ids)
    }

    /// Writes the points renumbered 1..n in breadth first order.
    pub fn write_swc<W: Write>(&self, mut out: W) -> Result<()> {
        let new_ids: HashMap<u64, usize> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i + 1))
            .collect();
        writeln!(out, "# Processed SWC file")?;
        for point in &self.points {
            let parent = point.parent.map_or(-1, |p| new_ids[&p] as i64);
            writeln!(
                out,
                "{} {} {:.2} {:.2} {:.2} {} {}",
                new_ids[&point.id],
                point.kind.code(),
                point.x,
                point.y,
                point.z,
                point.radius,
                parent
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // soma (1) with a basal dendrite that forks (2 -> 3 -> {4, 5}) and an axon (6)
    const BASIC: &str = "\
# test cell
1 1 0 0 0 5 -1
2 3 10 0 0 1 1
3 3 20 0 0 1 2
4 3 30 10 0 0.5 3
5 3 30 -10 0 0.5 3
6 2 -10 0 0 0.5 1
";

    #[test]
    fn test_swc_reader_basic() {
        let morphology = parse_swc(BASIC, &SwcOptions::default()).unwrap();
        let ids: Vec<u64> = morphology.points().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 6, 3, 4, 5]);
        assert_eq!(morphology.points()[0].parent, None);
    }

    #[test]
    fn test_sketch_splits_at_branches() {
        let morphology = parse_swc(BASIC, &SwcOptions::default()).unwrap();
        let sketches = morphology.sketch();
        let names: Vec<&str> = sketches.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["soma", "dend[0]", "axon[0]", "dend[1]", "dend[2]"]);

        let soma = &sketches[0];
        assert_eq!(soma.length, 10.0);
        assert_eq!(soma.diam, 10.0);

        // 2 -> 3 is one unbranched run of 10 um
        let trunk = &sketches[1];
        assert_eq!(trunk.points, vec![2, 3]);
        assert_eq!(trunk.parent, Some((0, 0.5)));
        assert!((trunk.length - 10.0).abs() < 1e-12);

        let fork = &sketches[3];
        assert_eq!(fork.parent, Some((1, 1.0)));
        assert!((fork.length - 200.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_instantiate_builds_tree() {
        let morphology = parse_swc(BASIC, &SwcOptions::default()).unwrap();
        let mut model = Model::new();
        let ids = morphology.instantiate(&mut model, "Cell[0]").unwrap();
        assert_eq!(ids.len(), 5);
        assert_eq!(model.section(ids[4]).unwrap().parent(), Some((ids[1], 1.0)));
        assert!(model.topology().contains("Cell[0].dend[2]"));
    }

    #[test]
    fn test_strict_rejects_zero_radius() {
        let text = "1 1 0 0 0 5 -1\n2 3 10 0 0 0 1\n";
        let lenient = parse_swc(text, &SwcOptions::default()).unwrap();
        assert_eq!(lenient.points()[1].radius, 1.0);

        let strict = SwcOptions {
            emit_warnings: true,
            strict: true,
        };
        assert!(matches!(
            parse_swc(text, &strict),
            Err(CableError::Morphology(_))
        ));
    }

    #[test]
    fn test_malformed_line() {
        let text = "1 1 0 0 0 5 -1\n2 3 ten 0 0 1 1\n";
        assert!(matches!(
            parse_swc(text, &SwcOptions::default()),
            Err(CableError::MalformedSwc { line: 2, .. })
        ));
    }

    #[test]
    fn test_write_renumbers() {
        let text = "10 1 0 0 0 5 -1\n20 3 10 0 0 1 10\n";
        let morphology = parse_swc(text, &SwcOptions::default()).unwrap();
        let mut out = Vec::new();
        morphology.write_swc(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "# Processed SWC file\n1 1 0.00 0.00 0.00 5 -1\n2 3 10.00 0.00 0.00 1 1\n"
        );
    }
}
