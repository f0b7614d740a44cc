//! Fixed step backward Euler on a branched cable.
//!
//! Every segment is one node. Nodes are ordered so that a parent always comes
//! before its children, which lets the tree-shaped linear system be solved by
//! Hines elimination in a single sweep each way.
//!
//! Units inside a step: conductance mS, potential mV, current uA.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::channels::Dynamics;
use crate::error::Result;
use crate::model::{Model, SectionId};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub section: SectionId,
    pub segment: usize,
    pub parent: Option<usize>,
    /// Axial conductance to the parent node (mS)
    pub g_axial: f64,
}

/// Nodes in parent-first order plus the index of each section's first node.
/// Only depends on the cable geometry, so `Model` keeps it between steps.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    pub nodes: Vec<Node>,
    pub first_node: HashMap<SectionId, usize>,
}

pub(crate) fn build_tree(model: &Model) -> Result<Tree> {
    let mut children: HashMap<SectionId, Vec<(SectionId, f64)>> = HashMap::new();
    let mut queue: VecDeque<SectionId> = VecDeque::new();
    for (id, section) in model.sections() {
        match section.parent() {
            Some((parent, x)) => children.entry(parent).or_default().push((id, x)),
            None => queue.push_back(id),
        }
    }

    let mut nodes: Vec<Node> = Vec::new();
    let mut first_node: HashMap<SectionId, usize> = HashMap::new();

    while let Some(id) = queue.pop_front() {
        let section = model.section(id)?;
        let base = nodes.len();
        first_node.insert(id, base);

        let (parent, g_axial) = match section.parent() {
            Some((parent_id, x)) => {
                let parent = model.section(parent_id)?;
                let idx = first_node[&parent_id] + parent.segment_index(x)?;
                let r = section.half_resistance() + parent.half_resistance();
                (Some(idx), 1e3 / r)
            }
            None => (None, 0.0),
        };
        nodes.push(Node {
            section: id,
            segment: 0,
            parent,
            g_axial,
        });

        let g_within = 1e3 / (2.0 * section.half_resistance());
        for segment in 1..section.nseg() {
            nodes.push(Node {
                section: id,
                segment,
                parent: Some(base + segment - 1),
                g_axial: g_within,
            });
        }

        if let Some(kids) = children.get(&id) {
            queue.extend(kids.iter().map(|(child, _)| *child));
        }
    }

    debug!("Built solver tree with {} nodes", nodes.len());
    Ok(Tree { nodes, first_node })
}

/// Advances every segment voltage and channel state by one `dt`. Does not
/// touch the clock.
pub(crate) fn step(model: &mut Model) -> Result<()> {
    let tree = match model.tree.take() {
        Some(tree) => tree,
        None => build_tree(model)?,
    };
    let result = solve(model, &tree);
    model.tree = Some(tree);
    result
}

fn solve(model: &mut Model, tree: &Tree) -> Result<()> {
    let Tree { nodes, first_node } = tree;
    let n = nodes.len();
    let dt = model.dt;

    let mut diag = vec![0.0; n];
    let mut rhs = vec![0.0; n];

    for (i, node) in nodes.iter().enumerate() {
        let section = model.section(node.section)?;
        let seg = &section.segments()[node.segment];
        let area_cm2 = section.segment_area() * 1e-8;

        let c = section.cm * area_cm2 / dt;
        let g = seg.ionic_conductance(seg.v) * area_cm2 * 1e3;
        let i_ion = seg.ionic_current(seg.v) * area_cm2 * 1e3;

        diag[i] += c + g;
        rhs[i] += (c + g) * seg.v - i_ion;

        if let Some(p) = node.parent {
            diag[i] += node.g_axial;
            diag[p] += node.g_axial;
        }
    }

    // stimulus sampled at the step midpoint
    let t_mid = model.t() + dt / 2.0;
    for clamp in model.clamps() {
        let loc = clamp.location();
        let section = model.section(loc.section)?;
        let i = first_node[&loc.section] + section.segment_index(loc.x)?;
        rhs[i] += clamp.current_at(t_mid) * 1e-3;
    }

    for i in (0..n).rev() {
        if let Some(p) = nodes[i].parent {
            let factor = nodes[i].g_axial / diag[i];
            diag[p] -= nodes[i].g_axial * factor;
            rhs[p] += factor * rhs[i];
        }
    }

    let mut v = vec![0.0; n];
    for i in 0..n {
        v[i] = match nodes[i].parent {
            Some(p) => (rhs[i] + nodes[i].g_axial * v[p]) / diag[i],
            None => rhs[i] / diag[i],
        };
    }

    let celsius = model.celsius;
    for (node, v_new) in nodes.iter().zip(v) {
        let seg = &mut model.section_state_mut(node.section)?.segments[node.segment];
        seg.v = v_new;
        for channel in seg.channels.iter_mut() {
            channel.advance(v_new, dt, celsius);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MechanismKind;
    use crate::model::Location;

    fn passive_cable(nseg: usize) -> (Model, SectionId, SectionId) {
        let mut model = Model::new();
        let soma = model.create_section("soma");
        let dend = model.create_section("dend");
        model.connect(dend, soma, 1.0).unwrap();
        for (id, length, diam) in [(soma, 20.0, 20.0), (dend, 200.0, 1.0)] {
            let sec = model.section_mut(id).unwrap();
            sec.length = length;
            sec.diam = diam;
            sec.ra = 100.0;
            sec.set_nseg(nseg).unwrap();
            sec.insert(MechanismKind::Passive);
            for seg in sec.segments.iter_mut() {
                seg.pas_mut().unwrap().e = -65.0;
            }
        }
        (model, soma, dend)
    }

    #[test]
    fn test_tree_order_is_parent_first() {
        let (model, soma, dend) = passive_cable(3);
        let Tree {
            nodes,
            first_node: first,
        } = build_tree(&model).unwrap();
        assert_eq!(nodes.len(), 6);
        assert_eq!(first[&soma], 0);
        assert_eq!(first[&dend], 3);
        // dend(0) hangs off the last soma segment
        assert_eq!(nodes[3].parent, Some(2));
        for (i, node) in nodes.iter().enumerate() {
            if let Some(p) = node.parent {
                assert!(p < i);
            }
        }
    }

    #[test]
    fn test_rest_is_stationary() {
        let (mut model, soma, dend) = passive_cable(5);
        model.finitialize(-65.0).unwrap();
        model.continuerun(10.0).unwrap();
        for id in [soma, dend] {
            for seg in model.section(id).unwrap().segments() {
                assert!((seg.v + 65.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_current_spreads_and_attenuates() {
        let (mut model, soma, dend) = passive_cable(11);
        let clamp = model.iclamp(Location::new(dend, 1.0)).unwrap();
        {
            let c = model.clamp_mut(clamp).unwrap();
            c.delay = 1.0;
            c.dur = 2.0;
            c.amp = 0.1;
        }
        let far = model.record_voltage(Location::new(soma, 0.5)).unwrap();
        let near = model.record_voltage(Location::new(dend, 1.0)).unwrap();
        model.finitialize(-65.0).unwrap();
        model.continuerun(5.0).unwrap();

        let peak = |id| {
            model
                .trace(id)
                .unwrap()
                .iter()
                .cloned()
                .fold(f64::MIN, f64::max)
        };
        assert!(peak(far) > -65.0);
        assert!(peak(near) > peak(far));
    }

    #[test]
    fn test_hh_soma_fires() {
        let mut model = Model::new();
        let soma = model.create_section("soma");
        {
            let sec = model.section_mut(soma).unwrap();
            sec.length = 20.0;
            sec.diam = 20.0;
            sec.insert(MechanismKind::HodgkinHuxley);
        }
        let clamp = model.iclamp(Location::new(soma, 0.5)).unwrap();
        {
            let c = model.clamp_mut(clamp).unwrap();
            c.delay = 2.0;
            c.dur = 1.0;
            c.amp = 2.0;
        }
        let v = model.record_voltage(Location::new(soma, 0.5)).unwrap();
        model.finitialize(-65.0).unwrap();
        model.continuerun(20.0).unwrap();

        let trace = model.trace(v).unwrap();
        let peak = trace.iter().cloned().fold(f64::MIN, f64::max);
        assert!(peak > 0.0);
        // repolarises below rest
        assert!(*trace.last().unwrap() < -50.0);
    }
}
