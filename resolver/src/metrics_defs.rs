//! Metrics definitions for the resolution engine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

pub const SNAPSHOT_REFRESH: MetricDef = MetricDef {
    name: "snapshot.refresh",
    metric_type: MetricType::Counter,
    description: "Number of successful fetch-and-resolve cycles",
};

pub const SNAPSHOT_REFRESH_FAILED: MetricDef = MetricDef {
    name: "snapshot.refresh.failed",
    metric_type: MetricType::Counter,
    description: "Number of refresh cycles that failed and left the previous snapshot intact",
};

pub const SNAPSHOT_REFRESH_DURATION: MetricDef = MetricDef {
    name: "snapshot.refresh.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete one fetch-and-resolve cycle in seconds",
};

pub const SNAPSHOT_ROUTERS: MetricDef = MetricDef {
    name: "snapshot.routers",
    metric_type: MetricType::Gauge,
    description: "Routers in the current snapshot",
};

pub const SNAPSHOT_ENTRY_POINTS: MetricDef = MetricDef {
    name: "snapshot.entrypoints",
    metric_type: MetricType::Gauge,
    description: "Entrypoints in the current snapshot",
};

// New metrics must be added here so describe() covers them.
pub const ALL_METRICS: &[MetricDef] = &[
    SNAPSHOT_REFRESH,
    SNAPSHOT_REFRESH_FAILED,
    SNAPSHOT_REFRESH_DURATION,
    SNAPSHOT_ROUTERS,
    SNAPSHOT_ENTRY_POINTS,
];

/// Registers every metric's description with the installed recorder.
/// A no-op when no recorder is installed.
pub fn describe() {
    for def in ALL_METRICS {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

#[macro_export]
macro_rules! gauge {
    ($def:expr) => {
        metrics::gauge!($def.name)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}
