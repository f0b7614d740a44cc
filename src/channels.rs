//!
//! The channels define the membrane dynamics that take place within a segment.
//! Kinetics follow the squid axon fits used by the classic `hh` and `pas` mechanisms:
//! https://nrn.readthedocs.io/en/9.0.0/tutorials/scripting-neuron-basics.html#Biophysical-mechanisms
//!
//! Voltages are in mV, times in ms, conductance densities in S/cm2 and
//! current densities in mA/cm2.

/// Temperature the rate constants were measured at (degC).
const HH_BASE_CELSIUS: f64 = 6.3;

/// Voltage offset used for the numeric `di/dv`.
const DV: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MechanismKind {
    HodgkinHuxley,
    Passive,
}

impl MechanismKind {
    /// Suffix used in parameter names, e.g. `gnabar_hh`.
    pub fn suffix(&self) -> &'static str {
        match self {
            MechanismKind::HodgkinHuxley => "hh",
            MechanismKind::Passive => "pas",
        }
    }

    pub(crate) fn instantiate(&self) -> Channel {
        match self {
            MechanismKind::HodgkinHuxley => Channel::HodgkinHuxley(HodgkinHuxley::default()),
            MechanismKind::Passive => Channel::Passive(Passive::default()),
        }
    }
}

pub trait Dynamics {
    /// Puts the state variables at their steady state for `v`.
    fn init(&mut self, v: f64);
    /// Membrane current density at `v` with the current gate states.
    fn current(&self, v: f64) -> f64;
    /// Integrates the state variables over `dt` holding `v` fixed.
    fn advance(&mut self, v: f64, dt: f64, celsius: f64);
    /// Range parameters (without the mechanism suffix) and their values.
    fn parameters(&self) -> Vec<(&'static str, f64)>;

    /// Slope conductance `di/dv`, states held fixed.
    fn conductance(&self, v: f64) -> f64 {
        (self.current(v + DV) - self.current(v)) / DV
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    HodgkinHuxley(HodgkinHuxley),
    Passive(Passive),
}

impl Channel {
    pub fn kind(&self) -> MechanismKind {
        match self {
            Channel::HodgkinHuxley(_) => MechanismKind::HodgkinHuxley,
            Channel::Passive(_) => MechanismKind::Passive,
        }
    }

    fn dynamics(&self) -> &dyn Dynamics {
        match self {
            Channel::HodgkinHuxley(hh) => hh,
            Channel::Passive(pas) => pas,
        }
    }

    fn dynamics_mut(&mut self) -> &mut dyn Dynamics {
        match self {
            Channel::HodgkinHuxley(hh) => hh,
            Channel::Passive(pas) => pas,
        }
    }
}

impl Dynamics for Channel {
    fn init(&mut self, v: f64) {
        self.dynamics_mut().init(v)
    }

    fn current(&self, v: f64) -> f64 {
        self.dynamics().current(v)
    }

    fn advance(&mut self, v: f64, dt: f64, celsius: f64) {
        self.dynamics_mut().advance(v, dt, celsius)
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        self.dynamics().parameters()
    }

    fn conductance(&self, v: f64) -> f64 {
        self.dynamics().conductance(v)
    }
}

/// `x / (exp(x / y) - 1)` with the removable singularity at `x = 0` patched.
fn vtrap(x: f64, y: f64) -> f64 {
    if (x / y).abs() < 1e-6 {
        y * (1.0 - x / y / 2.0)
    } else {
        x / ((x / y).exp() - 1.0)
    }
}

/// (alpha, beta) in 1/ms
pub(crate) fn rates_m(v: f64) -> (f64, f64) {
    (0.1 * vtrap(-(v + 40.0), 10.0), 4.0 * (-(v + 65.0) / 18.0).exp())
}

pub(crate) fn rates_h(v: f64) -> (f64, f64) {
    (
        0.07 * (-(v + 65.0) / 20.0).exp(),
        1.0 / ((-(v + 35.0) / 10.0).exp() + 1.0),
    )
}

pub(crate) fn rates_n(v: f64) -> (f64, f64) {
    (0.01 * vtrap(-(v + 55.0), 10.0), 0.125 * (-(v + 65.0) / 80.0).exp())
}

fn q10(celsius: f64) -> f64 {
    3.0_f64.powf((celsius - HH_BASE_CELSIUS) / 10.0)
}

fn steady_state((alpha, beta): (f64, f64)) -> f64 {
    alpha / (alpha + beta)
}

/// Exact solution of `dx/dt = alpha (1 - x) - beta x` over `dt`.
fn relax(x: f64, (alpha, beta): (f64, f64), dt: f64, q: f64) -> f64 {
    let inf = alpha / (alpha + beta);
    let tau = 1.0 / (q * (alpha + beta));
    inf + (x - inf) * (-dt / tau).exp()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HodgkinHuxley {
    /// Sodium conductance (S/cm2)
    pub gnabar: f64,
    /// Potassium conductance (S/cm2)
    pub gkbar: f64,
    /// Leak conductance (S/cm2)
    pub gl: f64,
    /// Leak reversal potential (mV)
    pub el: f64,
    pub ena: f64,
    pub ek: f64,
    pub m: f64,
    pub h: f64,
    pub n: f64,
}

impl Default for HodgkinHuxley {
    fn default() -> Self {
        let mut hh = HodgkinHuxley {
            gnabar: 0.12,
            gkbar: 0.036,
            gl: 0.0003,
            el: -54.3,
            ena: 50.0,
            ek: -77.0,
            m: 0.0,
            h: 0.0,
            n: 0.0,
        };
        hh.init(-65.0);
        hh
    }
}

impl HodgkinHuxley {
    pub fn sodium_current(&self, v: f64) -> f64 {
        self.gnabar * self.m.powi(3) * self.h * (v - self.ena)
    }

    pub fn potassium_current(&self, v: f64) -> f64 {
        self.gkbar * self.n.powi(4) * (v - self.ek)
    }

    pub fn leak_current(&self, v: f64) -> f64 {
        self.gl * (v - self.el)
    }
}

impl Dynamics for HodgkinHuxley {
    fn init(&mut self, v: f64) {
        self.m = steady_state(rates_m(v));
        self.h = steady_state(rates_h(v));
        self.n = steady_state(rates_n(v));
    }

    fn current(&self, v: f64) -> f64 {
        self.sodium_current(v) + self.potassium_current(v) + self.leak_current(v)
    }

    fn advance(&mut self, v: f64, dt: f64, celsius: f64) {
        let q = q10(celsius);
        self.m = relax(self.m, rates_m(v), dt, q);
        self.h = relax(self.h, rates_h(v), dt, q);
        self.n = relax(self.n, rates_n(v), dt, q);
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("gnabar", self.gnabar),
            ("gkbar", self.gkbar),
            ("gl", self.gl),
            ("el", self.el),
        ]
    }
}

/// Passive leak.
#[derive(Debug, Clone, PartialEq)]
pub struct Passive {
    /// Conductance (S/cm2)
    pub g: f64,
    /// Reversal potential (mV)
    pub e: f64,
}

impl Default for Passive {
    fn default() -> Self {
        Passive { g: 0.001, e: -70.0 }
    }
}

impl Dynamics for Passive {
    fn init(&mut self, _v: f64) {}

    fn current(&self, v: f64) -> f64 {
        self.g * (v - self.e)
    }

    fn advance(&mut self, _v: f64, _dt: f64, _celsius: f64) {}

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("g", self.g), ("e", self.e)]
    }

    fn conductance(&self, _v: f64) -> f64 {
        self.g
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hh_resting_gates() {
        let hh = HodgkinHuxley::default();
        assert!((hh.m - 0.0529).abs() < 1e-3);
        assert!((hh.h - 0.5961).abs() < 1e-3);
        assert!((hh.n - 0.3177).abs() < 1e-3);
    }

    #[test]
    fn test_hh_near_zero_current_at_rest() {
        let hh = HodgkinHuxley::default();
        assert!(hh.current(-65.0).abs() < 1e-3);
    }

    #[test]
    fn test_vtrap_is_continuous() {
        // alpha_m has a removable singularity at -40 mV
        let (at, _) = rates_m(-40.0);
        let (near, _) = rates_m(-40.0 + 1e-4);
        assert!((at - 1.0).abs() < 1e-9);
        assert!((at - near).abs() < 1e-4);
    }

    #[test]
    fn test_gates_relax_to_steady_state() {
        let mut hh = HodgkinHuxley::default();
        for _ in 0..10_000 {
            hh.advance(-20.0, 0.025, HH_BASE_CELSIUS);
        }
        assert!((hh.m - steady_state(rates_m(-20.0))).abs() < 1e-9);
        assert!((hh.n - steady_state(rates_n(-20.0))).abs() < 1e-9);
    }

    #[test]
    fn test_passive_current_and_conductance() {
        let pas = Passive { g: 0.001, e: -65.0 };
        assert_eq!(pas.current(-65.0), 0.0);
        assert!((pas.current(-55.0) - 0.01).abs() < 1e-12);
        assert_eq!(pas.conductance(-30.0), 0.001);
    }

    #[test]
    fn test_numeric_conductance_matches_leak() {
        let mut hh = HodgkinHuxley::default();
        hh.gnabar = 0.0;
        hh.gkbar = 0.0;
        assert!((hh.conductance(-65.0) - hh.gl).abs() < 1e-9);
    }

    #[test]
    fn test_channel_dispatch() {
        let mut channel = MechanismKind::Passive.instantiate();
        channel.init(-65.0);
        assert_eq!(channel.kind(), MechanismKind::Passive);
        assert_eq!(channel.parameters(), vec![("g", 0.001), ("e", -70.0)]);
    }
}
