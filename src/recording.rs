use crate::model::Location;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    Time,
    Voltage(Location),
}

/// Buffer filled once per time step. `finitialize` clears it in place, so a
/// later run overwrites what an earlier run left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub(crate) source: Source,
    pub(crate) values: Vec<f64>,
}

impl Recording {
    pub(crate) fn new(source: Source) -> Recording {
        Recording {
            source,
            values: Vec::new(),
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    pub(crate) fn push(&mut self, value: f64) {
        self.values.push(value);
    }
}
