//! Pull-based gauge sampling.
//!
//! A [`GaugeSampler`] is polled by the metric pipeline whenever it collects
//! (a periodic export or a Prometheus scrape). Implementations must be
//! idempotent, free of side effects and must not block: they read a value,
//! they never drive one.

use std::ops::Range;

use opentelemetry::KeyValue;
use rand::Rng;

/// One gauge reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub value: f64,
    pub attributes: Vec<KeyValue>,
}

impl Observation {
    pub fn new(value: f64, attributes: Vec<KeyValue>) -> Self {
        Self { value, attributes }
    }
}

/// Source of readings for an observable gauge.
pub trait GaugeSampler: Send + Sync + 'static {
    /// Instrument name.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Current readings, one per attribute set.
    fn sample(&self) -> Vec<Observation>;
}

/// Gauge reporting a uniformly distributed value on every poll.
#[derive(Debug, Clone)]
pub struct UniformSampler {
    name: String,
    description: String,
    range: Range<f64>,
    attributes: Vec<KeyValue>,
}

impl UniformSampler {
    pub fn new(name: impl Into<String>, range: Range<f64>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            range,
            attributes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<KeyValue>) -> Self {
        self.attributes = attributes;
        self
    }
}

impl GaugeSampler for UniformSampler {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sample(&self) -> Vec<Observation> {
        let value = rand::thread_rng().gen_range(self.range.clone());
        vec![Observation::new(value, self.attributes.clone())]
    }
}
