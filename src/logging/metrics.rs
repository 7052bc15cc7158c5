use once_cell::sync::OnceCell;

/// Metrics interface allowing pluggable sinks (default: no-op).
pub trait FilterMetrics: Send + Sync {
    /// Record that a candidate survived every middleware.
    fn record_kept(&self) {}
    /// Record that `middleware` excluded a candidate.
    fn record_dropped(&self, _middleware: &str) {}
    /// Record that a candidate could not report its path.
    fn record_missing_path(&self) {}
}

#[cfg_attr(test, allow(dead_code))]
struct NoopMetrics;

impl FilterMetrics for NoopMetrics {}

static METRICS_SINK: OnceCell<Box<dyn FilterMetrics>> = OnceCell::new();

fn metrics_sink() -> &'static dyn FilterMetrics {
    METRICS_SINK.get_or_init(default_sink).as_ref()
}

#[cfg(not(test))]
fn default_sink() -> Box<dyn FilterMetrics> {
    Box::new(NoopMetrics)
}

// Unit tests record from many threads; whichever test touches the sink
// first must still land events in the capturing sink.
#[cfg(test)]
fn default_sink() -> Box<dyn FilterMetrics> {
    Box::new(test_support::capturing().clone())
}

/// Install a custom metrics sink. Only the first installation wins.
pub fn install_metrics(metrics: Box<dyn FilterMetrics>) -> Result<(), Box<dyn FilterMetrics>> {
    METRICS_SINK.set(metrics)
}

pub fn record_kept() {
    metrics_sink().record_kept();
}

pub fn record_dropped(middleware: &str) {
    metrics_sink().record_dropped(middleware);
}

pub fn record_missing_path() {
    metrics_sink().record_missing_path();
}
