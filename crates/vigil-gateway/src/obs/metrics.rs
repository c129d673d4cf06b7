//! Request metric registry.
//!
//! Two families, both labeled by (route, method, status):
//! - `http_request_duration_ms`: latency histogram with cumulative buckets
//! - `http_requests_total`: request counter
//!
//! Series live in `DashMap`s keyed by their labels and are updated with atomics,
//! so writers never wait on a registry-wide lock. Series are created lazily and
//! never removed.
//!
//! The `route` label must be the matched route pattern (e.g. `/users/:id`),
//! never the raw request path, whenever a pattern matched. The raw path is only
//! acceptable for requests no route matched (404s). This keeps cardinality
//! bounded by the application's route table rather than by client input.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::schema::default_buckets_ms;

pub const REQUEST_DURATION: &str = "http_request_duration_ms";
pub const REQUESTS_TOTAL: &str = "http_requests_total";

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// One completed request, consumed immediately by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub route: String,
    pub method: String,
    pub status: u16,
    pub duration_ms: f64,
}

/// Label combination identifying one series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesLabels {
    pub route: String,
    pub method: String,
    pub status: u16,
}

impl SeriesLabels {
    pub fn new(route: &str, method: &str, status: u16) -> Self {
        Self {
            route: route.to_string(),
            method: method.to_string(),
            status,
        }
    }

    fn render(&self) -> String {
        format!(
            "route=\"{}\",method=\"{}\",status=\"{}\"",
            escape_label(&self.route),
            escape_label(&self.method),
            self.status
        )
    }
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<SeriesLabels, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: SeriesLabels) {
        let counter = self.map.entry(labels).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &SeriesLabels) -> u64 {
        self.map
            .get(labels)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format, series sorted by labels.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} counter", name);

        let mut rows: Vec<(SeriesLabels, u64)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        for (labels, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", name, labels.render(), val);
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    /// f64 bit pattern, updated with a CAS loop.
    sum: AtomicU64,
    buckets: Box<[AtomicU64]>,
}

impl AtomicHistogram {
    fn new(len: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn add_sum(&self, value: f64) {
        let mut current = self.sum.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .sum
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Point-in-time copy of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// (upper bound, cumulative count) per configured bucket.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

pub struct HistogramVec {
    bounds: Vec<f64>,
    map: DashMap<SeriesLabels, AtomicHistogram>,
}

impl HistogramVec {
    /// `bounds` must be ascending (validated with the config).
    pub fn new(bounds: Vec<f64>) -> Self {
        Self {
            bounds,
            map: DashMap::new(),
        }
    }

    /// Observe a value and increment cumulative buckets.
    pub fn observe(&self, labels: SeriesLabels, value: f64) {
        let hist = self
            .map
            .entry(labels)
            .or_insert_with(|| AtomicHistogram::new(self.bounds.len()));

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.add_sum(value);

        // Cumulative: every bucket whose bound is >= value
        for (i, &b) in self.bounds.iter().enumerate() {
            if value <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self, labels: &SeriesLabels) -> Option<HistogramSnapshot> {
        self.map.get(labels).map(|h| self.snapshot_of(&h))
    }

    fn snapshot_of(&self, hist: &AtomicHistogram) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self
                .bounds
                .iter()
                .zip(hist.buckets.iter())
                .map(|(&le, c)| (le, c.load(Ordering::Relaxed)))
                .collect(),
            sum: f64::from_bits(hist.sum.load(Ordering::Relaxed)),
            count: hist.count.load(Ordering::Relaxed),
        }
    }

    /// Render in Prometheus text exposition format, series sorted by labels.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} histogram", name);

        let mut rows: Vec<(SeriesLabels, HistogramSnapshot)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), self.snapshot_of(r.value())))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        for (labels, snap) in rows {
            let label_str = labels.render();
            for (le, count) in &snap.buckets {
                let _ = writeln!(out, "{}_bucket{{{},le=\"{}\"}} {}", name, label_str, le, count);
            }
            let _ = writeln!(out, "{}_bucket{{{},le=\"+Inf\"}} {}", name, label_str, snap.count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, label_str, snap.sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, label_str, snap.count);
        }
    }
}

/// Registry shared by the request instrumentor and the `/metrics` endpoint.
pub struct MetricRegistry {
    request_duration: HistogramVec,
    requests_total: CounterVec,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(default_buckets_ms())
    }
}

impl MetricRegistry {
    pub fn new(buckets_ms: Vec<f64>) -> Self {
        Self {
            request_duration: HistogramVec::new(buckets_ms),
            requests_total: CounterVec::default(),
        }
    }

    pub fn observe_latency(&self, route: &str, method: &str, status: u16, duration_ms: f64) {
        self.request_duration
            .observe(SeriesLabels::new(route, method, status), duration_ms);
    }

    pub fn increment_count(&self, route: &str, method: &str, status: u16) {
        self.requests_total
            .inc(SeriesLabels::new(route, method, status));
    }

    /// Feed one sample into both families.
    pub fn record(&self, sample: &MetricSample) {
        self.observe_latency(&sample.route, &sample.method, sample.status, sample.duration_ms);
        self.increment_count(&sample.route, &sample.method, sample.status);
    }

    pub fn request_count(&self, route: &str, method: &str, status: u16) -> u64 {
        self.requests_total
            .get(&SeriesLabels::new(route, method, status))
    }

    pub fn latency(&self, route: &str, method: &str, status: u16) -> Option<HistogramSnapshot> {
        self.request_duration
            .snapshot(&SeriesLabels::new(route, method, status))
    }

    /// Render every family. Output is sorted, so equal state renders equally.
    pub fn export(&self) -> String {
        let mut out = String::new();
        self.request_duration
            .render(REQUEST_DURATION, "Duration of HTTP requests in ms", &mut out);
        self.requests_total
            .render(REQUESTS_TOTAL, "Total number of HTTP requests", &mut out);
        out
    }
}
