//! A tiny in-process metric registry.
//!
//! Components obtain typed instruments (counters, gauges, histograms) from a
//! shared [`Registry`], keyed by a metric name plus a set of label
//! [`Attributes`]. There is no external exposition format here — that is the
//! job of a process-specific exporter built on top of [`Registry::report`].

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

/// An unordered set of string labels attached to one observation of a metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attributes(BTreeMap<&'static str, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }
}

impl<const N: usize> From<[(&'static str, &str); N]> for Attributes {
    fn from(pairs: [(&'static str, &str); N]) -> Self {
        let mut attrs = Self::new();
        for (k, v) in pairs {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct U64Counter(Arc<AtomicU64>);

impl U64Counter {
    pub fn inc(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Clone for U64Counter {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// A value that can move up or down, e.g. queue depth or in-flight count.
#[derive(Debug, Default)]
pub struct U64Gauge(Arc<AtomicI64>);

impl U64Gauge {
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn dec(&self, delta: i64) {
        self.0.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Clone for U64Gauge {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// A named instrument, recorded per [`Attributes`] combination seen so far.
#[derive(Debug)]
pub struct Metric<T> {
    name: &'static str,
    description: &'static str,
    values: Mutex<BTreeMap<Attributes, T>>,
}

impl<T: Default + Clone> Metric<T> {
    fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the instrument recorded under `attributes`, creating it if this is the first
    /// observation for that label set.
    pub fn recorder(&self, attributes: impl Into<Attributes>) -> T {
        let attributes = attributes.into();
        let mut values = self.values.lock();
        values.entry(attributes).or_default().clone()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

/// Process-wide collection of named instruments.
///
/// Cloning a [`Registry`] is cheap; all clones share the same underlying
/// instrument tables.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    counters: Mutex<BTreeMap<&'static str, Arc<Metric<U64Counter>>>>,
    gauges: Mutex<BTreeMap<&'static str, Arc<Metric<U64Gauge>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_counter(
        &self,
        name: &'static str,
        description: &'static str,
    ) -> Arc<Metric<U64Counter>> {
        let mut counters = self.inner.counters.lock();
        Arc::clone(
            counters
                .entry(name)
                .or_insert_with(|| Arc::new(Metric::new(name, description))),
        )
    }

    pub fn register_gauge(
        &self,
        name: &'static str,
        description: &'static str,
    ) -> Arc<Metric<U64Gauge>> {
        let mut gauges = self.inner.gauges.lock();
        Arc::clone(
            gauges
                .entry(name)
                .or_insert_with(|| Arc::new(Metric::new(name, description))),
        )
    }

    /// Snapshot of every counter's current value, for diagnostics endpoints.
    pub fn report_counters(&self) -> Vec<(&'static str, Attributes, u64)> {
        let counters = self.inner.counters.lock();
        let mut out = Vec::new();
        for metric in counters.values() {
            let values = metric.values.lock();
            for (attrs, counter) in values.iter() {
                out.push((metric.name, attrs.clone(), counter.fetch()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_per_attribute_set() {
        let registry = Registry::new();
        let metric = registry.register_counter("requests_total", "total requests sent");

        let w1 = metric.recorder([("worker", "w1")]);
        let w2 = metric.recorder([("worker", "w2")]);
        w1.inc(1);
        w1.inc(2);
        w2.inc(5);

        assert_eq!(metric.recorder([("worker", "w1")]).fetch(), 3);
        assert_eq!(metric.recorder([("worker", "w2")]).fetch(), 5);
    }

    #[test]
    fn gauge_tracks_up_and_down() {
        let registry = Registry::new();
        let metric = registry.register_gauge("queue_depth", "outstanding requests per worker");
        let g = metric.recorder(Attributes::new());
        g.inc(3);
        g.dec(1);
        assert_eq!(g.fetch(), 2);
    }

    #[test]
    fn same_name_returns_shared_metric() {
        let registry = Registry::new();
        let a = registry.register_counter("x", "");
        let b = registry.register_counter("x", "");
        a.recorder(Attributes::new()).inc(1);
        assert_eq!(b.recorder(Attributes::new()).fetch(), 1);
    }
}
