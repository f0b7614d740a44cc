use crate::model::Location;

/// Current clamp point process: a square pulse of `amp` nA starting at
/// `delay` ms and lasting `dur` ms.
#[derive(Debug, Clone, PartialEq)]
pub struct IClamp {
    pub(crate) location: Location,
    pub delay: f64,
    pub dur: f64,
    pub amp: f64,
}

impl IClamp {
    pub(crate) fn new(location: Location) -> IClamp {
        IClamp {
            location,
            delay: 0.0,
            dur: 0.0,
            amp: 0.0,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Injected current (nA) at time `t`.
    pub fn current_at(&self, t: f64) -> f64 {
        if t >= self.delay && t < self.delay + self.dur {
            self.amp
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionId;

    #[test]
    fn test_pulse_window() {
        let mut clamp = IClamp::new(Location::new(SectionId(0), 0.5));
        clamp.delay = 2.0;
        clamp.dur = 0.1;
        clamp.amp = 0.9;
        assert_eq!(clamp.current_at(1.9875), 0.0);
        assert_eq!(clamp.current_at(2.0125), 0.9);
        assert_eq!(clamp.current_at(2.0875), 0.9);
        assert_eq!(clamp.current_at(2.1125), 0.0);
    }

    #[test]
    fn test_default_clamp_is_silent() {
        let clamp = IClamp::new(Location::new(SectionId(0), 0.5));
        assert_eq!(clamp.current_at(0.0), 0.0);
    }
}
