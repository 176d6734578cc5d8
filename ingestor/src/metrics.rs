use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref VITALS_RECEIVED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "vitals_received_total",
        "Total vital readings received over HTTP"
    ))
    .expect("valid metric options");
    pub static ref VITALS_REJECTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "vitals_rejected_total",
        "Total vital readings rejected by validation"
    ))
    .expect("valid metric options");
    pub static ref VITALS_STORED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "vitals_stored_total",
        "Total vital readings persisted"
    ))
    .expect("valid metric options");
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "vitals_db_failures_total",
        "Total database query or insert failures"
    ))
    .expect("valid metric options");
    pub static ref ANALYTICS_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "vitals_analytics_requests_total",
        "Total analytics computations requested"
    ))
    .expect("valid metric options");
    pub static ref ANALYTICS_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "vitals_analytics_latency_seconds",
            "Time taken to compute analytics for one device"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
    )
    .expect("valid metric options");
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(VITALS_RECEIVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VITALS_REJECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VITALS_STORED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ANALYTICS_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ANALYTICS_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
