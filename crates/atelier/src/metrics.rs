use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Core prometheus metrics.
pub struct CoreMetrics {
    /// Number of live sessions.
    pub sessions: IntGauge,
    /// Number of live drawings (album and competition).
    pub drawings: IntGauge,
    /// Number of registered connections.
    pub connections: IntGauge,
    /// Total client events accepted by the gateway.
    pub events_total: IntCounter,
    /// Total server events delivered to connections.
    pub broadcasts_total: IntCounter,
    /// Total client events rejected with an error.
    pub errors_total: IntCounter,
}

impl CoreMetrics {
    /// Create metrics and register them with the given prometheus registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let sessions = IntGauge::with_opts(Opts::new("atelier_sessions", "Number of live sessions"))?;
        let drawings = IntGauge::with_opts(Opts::new("atelier_drawings", "Number of live drawings"))?;
        let connections = IntGauge::with_opts(Opts::new(
            "atelier_connections",
            "Number of registered connections",
        ))?;
        let events_total = IntCounter::with_opts(Opts::new(
            "atelier_events_total",
            "Total client events accepted by the gateway",
        ))?;
        let broadcasts_total = IntCounter::with_opts(Opts::new(
            "atelier_broadcasts_total",
            "Total server events delivered to connections",
        ))?;
        let errors_total = IntCounter::with_opts(Opts::new(
            "atelier_errors_total",
            "Total client events rejected with an error",
        ))?;

        registry.register(Box::new(sessions.clone()))?;
        registry.register(Box::new(drawings.clone()))?;
        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(broadcasts_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            sessions,
            drawings,
            connections,
            events_total,
            broadcasts_total,
            errors_total,
        })
    }

    /// Create metrics without registering (for testing).
    pub fn unregistered() -> Self {
        Self {
            sessions: IntGauge::new("atelier_sessions", "sessions").expect("valid metric name"),
            drawings: IntGauge::new("atelier_drawings", "drawings").expect("valid metric name"),
            connections: IntGauge::new("atelier_connections", "connections")
                .expect("valid metric name"),
            events_total: IntCounter::new("atelier_events_total", "events")
                .expect("valid metric name"),
            broadcasts_total: IntCounter::new("atelier_broadcasts_total", "broadcasts")
                .expect("valid metric name"),
            errors_total: IntCounter::new("atelier_errors_total", "errors")
                .expect("valid metric name"),
        }
    }
}
