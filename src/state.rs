use crate::observability::metrics::Metrics;
use crate::realtime::registry::RoomRegistry;
use crate::store::OrderStore;

pub struct AppState {
    pub store: OrderStore,
    pub rooms: RoomRegistry,
    pub metrics: Metrics,
    pub delivery_fee: f64,
}

impl AppState {
    pub fn new(delivery_fee: f64) -> Self {
        Self {
            store: OrderStore::new(),
            rooms: RoomRegistry::new(),
            metrics: Metrics::new(),
            delivery_fee,
        }
    }
}
