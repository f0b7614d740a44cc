//! SVG figures of voltage traces.

use std::path::Path;

use log::info;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::error::Result;
use crate::sweep::SweepTrace;

const SIZE: (u32, u32) = (1000, 600);
const AMP_COLORS: [RGBColor; 4] = [GREEN, BLUE, RED, BLACK];

/// Time and voltage ranges covering every series, padded by 5% on v.
fn bounds<'a>(series: impl IntoIterator<Item = (&'a [f64], &'a [f64])>) -> (f64, f64, f64, f64) {
    let (mut t_max, mut v_min, mut v_max) = (f64::MIN, f64::MAX, f64::MIN);
    for (t, v) in series {
        t_max = t.iter().cloned().fold(t_max, f64::max);
        v_min = v.iter().cloned().fold(v_min, f64::min);
        v_max = v.iter().cloned().fold(v_max, f64::max);
    }
    if t_max <= 0.0 {
        t_max = 1.0;
    }
    if v_min > v_max {
        (v_min, v_max) = (-80.0, 40.0);
    }
    let pad = ((v_max - v_min) * 0.05).max(1.0);
    (0.0, t_max, v_min - pad, v_max + pad)
}

fn points(t: &[f64], v: &[f64]) -> Vec<(f64, f64)> {
    t.iter().cloned().zip(v.iter().cloned()).collect()
}

/// Plots one `v` against `t` line.
pub fn plot_trace<P: AsRef<Path>>(path: P, title: &str, t: &[f64], v: &[f64]) -> Result<()> {
    let (t_min, t_max, v_min, v_max) = bounds([(t, v)]);
    let root = SVGBackend::new(path.as_ref(), SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(t_min..t_max, v_min..v_max)?;

    chart
        .configure_mesh()
        .x_desc("t (ms)")
        .y_desc("v (mV)")
        .draw()?;

    chart.draw_series(LineSeries::new(points(t, v), BLUE.stroke_width(2)))?;

    root.present()?;
    info!("Plotted {} points to {}", t.len(), path.as_ref().display());
    Ok(())
}

fn rounded(amp: f64) -> f64 {
    (amp * 1e3).round() / 1e3
}

/// One colour per amplitude, thick lines for the first nseg and thin for
/// the rest. Soma traces are solid, dendrite traces dashed.
pub fn plot_sweep<P: AsRef<Path>>(path: P, traces: &[SweepTrace]) -> Result<()> {
    let mut amps: Vec<f64> = Vec::new();
    let mut nsegs: Vec<usize> = Vec::new();
    for trace in traces {
        if !amps.contains(&trace.amp) {
            amps.push(trace.amp);
        }
        if !nsegs.contains(&trace.nseg) {
            nsegs.push(trace.nseg);
        }
    }

    let (t_min, t_max, v_min, v_max) = bounds(traces.iter().flat_map(|s| {
        [
            (s.t.as_slice(), s.soma_v.as_slice()),
            (s.t.as_slice(), s.dend_v.as_slice()),
        ]
    }));
    let root = SVGBackend::new(path.as_ref(), SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Soma (solid) and dendrite (dashed)", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(t_min..t_max, v_min..v_max)?;

    chart
        .configure_mesh()
        .x_desc("t (ms)")
        .y_desc("v (mV)")
        .draw()?;

    for trace in traces {
        let amp_idx = amps.iter().position(|a| *a == trace.amp).unwrap_or(0);
        let color = AMP_COLORS[amp_idx % AMP_COLORS.len()];
        let coarsest = nsegs.first() == Some(&trace.nseg);
        let width = if coarsest { 2 } else { 1 };

        let soma = chart.draw_series(LineSeries::new(
            points(&trace.t, &trace.soma_v),
            color.stroke_width(width),
        ))?;
        if coarsest {
            soma.label(format!("amp={}", rounded(trace.amp)))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }
        chart.draw_series(DashedLineSeries::new(
            points(&trace.t, &trace.dend_v),
            6,
            4,
            color.stroke_width(width),
        ))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!("Plotted {} runs to {}", traces.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sweep_trace(amp: f64, nseg: usize) -> SweepTrace {
        SweepTrace {
            amp,
            nseg,
            t: vec![0.0, 0.025, 0.05],
            soma_v: vec![-65.0, -60.0, -64.0],
            dend_v: vec![-65.0, -50.0, -63.0],
        }
    }

    #[test]
    fn test_trace_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.svg");
        plot_trace(&path, "soma", &[0.0, 0.025, 0.05], &[-65.0, 20.0, -70.0]).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("t (ms)"));
    }

    #[test]
    fn test_empty_trace_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.svg");
        plot_trace(&path, "nothing", &[], &[]).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("<svg"));
    }

    #[test]
    fn test_sweep_legend_has_one_entry_per_amp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.svg");
        let traces = vec![
            sweep_trace(0.075, 1),
            sweep_trace(0.075, 101),
            sweep_trace(0.15000000000000002, 1),
            sweep_trace(0.15000000000000002, 101),
        ];
        plot_sweep(&path, &traces).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert_eq!(svg.matches("amp=0.075").count(), 1);
        assert_eq!(svg.matches("amp=0.15").count(), 1);
    }

    #[test]
    fn test_bounds_pad_voltage() {
        let (t0, t1, v0, v1) = bounds([(&[0.0, 10.0][..], &[-70.0, 30.0][..])]);
        assert_eq!((t0, t1), (0.0, 10.0));
        assert!((v0 + 75.0).abs() < 1e-9);
        assert!((v1 - 35.0).abs() < 1e-9);
    }
}
