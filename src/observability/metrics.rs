use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub location_updates_total: IntCounter,
    pub ws_connections: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new(
                "order_transitions_total",
                "Order lifecycle transitions by kind",
            ),
            &["transition"],
        )
        .expect("valid order_transitions_total metric");

        let location_updates_total = IntCounter::new(
            "location_updates_total",
            "Partner location updates relayed to rooms",
        )
        .expect("valid location_updates_total metric");

        let ws_connections = IntGauge::new(
            "ws_connections",
            "Currently open realtime connections",
        )
        .expect("valid ws_connections metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(ws_connections.clone()))
            .expect("register ws_connections");

        Self {
            registry,
            order_transitions_total,
            location_updates_total,
            ws_connections,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
