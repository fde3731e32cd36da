use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::realtime::protocol::ServerEvent;

pub type ConnId = Uuid;
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Maps an order id to the set of live connections watching it. Each member
/// is addressed through its unbounded outbox, so publishing never blocks on
/// a slow receiver. Rooms left empty stay in the map as inert entries.
pub struct RoomRegistry {
    rooms: DashMap<Uuid, HashMap<ConnId, Outbox>>,
    memberships: DashMap<ConnId, HashSet<Uuid>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    pub fn join(&self, conn_id: ConnId, order_id: Uuid, outbox: Outbox) {
        self.rooms
            .entry(order_id)
            .or_default()
            .insert(conn_id, outbox);
        self.memberships.entry(conn_id).or_default().insert(order_id);
        debug!(%conn_id, %order_id, "connection joined room");
    }

    pub fn leave(&self, conn_id: ConnId, order_id: Uuid) {
        if let Some(mut room) = self.rooms.get_mut(&order_id) {
            room.remove(&conn_id);
        }
        if let Some(mut joined) = self.memberships.get_mut(&conn_id) {
            joined.remove(&order_id);
        }
        debug!(%conn_id, %order_id, "connection left room");
    }

    /// Removes the connection from every room it had joined. Called on
    /// socket close; must leave no membership behind.
    pub fn disconnect(&self, conn_id: ConnId) {
        let joined = match self.memberships.remove(&conn_id) {
            Some((_, joined)) => joined,
            None => return,
        };

        for order_id in joined {
            if let Some(mut room) = self.rooms.get_mut(&order_id) {
                room.remove(&conn_id);
            }
        }
    }

    /// Best-effort fan-out to the room, at most once per member. A member
    /// whose outbox is gone is skipped without error. Returns the number of
    /// members the event was handed to.
    pub fn publish(&self, order_id: Uuid, event: ServerEvent, exclude: Option<ConnId>) -> usize {
        let room = match self.rooms.get(&order_id) {
            Some(room) => room,
            None => return 0,
        };

        let mut delivered = 0;
        for (member, outbox) in room.iter() {
            if Some(*member) == exclude {
                continue;
            }
            if outbox.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn room_size(&self, order_id: Uuid) -> usize {
        self.rooms
            .get(&order_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.memberships.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::{ConnId, RoomRegistry};
    use crate::realtime::protocol::ServerEvent;

    fn member(
        registry: &RoomRegistry,
        order_id: Uuid,
    ) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.join(conn_id, order_id, tx);
        (conn_id, rx)
    }

    fn location(latitude: f64, longitude: f64) -> ServerEvent {
        ServerEvent::DriverLocation {
            latitude,
            longitude,
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_member() {
        let registry = RoomRegistry::new();
        let order_id = Uuid::new_v4();

        let (_, mut rx_a) = member(&registry, order_id);
        let (_, mut rx_b) = member(&registry, order_id);
        let (_, mut rx_c) = member(&registry, order_id);

        let delivered = registry.publish(order_id, location(18.52, 73.86), None);
        assert_eq!(delivered, 3);

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            assert_eq!(rx.recv().await.unwrap(), location(18.52, 73.86));
        }
    }

    #[tokio::test]
    async fn publish_skips_the_sender() {
        let registry = RoomRegistry::new();
        let order_id = Uuid::new_v4();

        let (partner, mut partner_rx) = member(&registry, order_id);
        let (_, mut customer_rx) = member(&registry, order_id);

        registry.publish(order_id, location(18.52, 73.86), Some(partner));

        assert_eq!(customer_rx.recv().await.unwrap(), location(18.52, 73.86));
        assert!(partner_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn per_source_publish_order_is_preserved() {
        let registry = RoomRegistry::new();
        let order_id = Uuid::new_v4();
        let (_, mut rx) = member(&registry, order_id);

        for i in 0..5 {
            registry.publish(order_id, location(18.0 + i as f64, 73.0), None);
        }

        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), location(18.0 + i as f64, 73.0));
        }
    }

    #[tokio::test]
    async fn dropped_member_causes_no_error() {
        let registry = RoomRegistry::new();
        let order_id = Uuid::new_v4();

        let (_, mut live_rx) = member(&registry, order_id);
        let (_, dead_rx) = member(&registry, order_id);
        drop(dead_rx);

        let delivered = registry.publish(order_id, location(18.52, 73.86), None);
        assert_eq!(delivered, 1);
        assert_eq!(live_rx.recv().await.unwrap(), location(18.52, 73.86));
    }

    #[tokio::test]
    async fn late_joiner_sees_no_replay() {
        let registry = RoomRegistry::new();
        let order_id = Uuid::new_v4();
        let (_, _early_rx) = member(&registry, order_id);

        registry.publish(order_id, location(18.52, 73.86), None);

        let (_, mut late_rx) = member(&registry, order_id);
        assert!(late_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_removes_membership_from_all_rooms() {
        let registry = RoomRegistry::new();
        let order_a = Uuid::new_v4();
        let order_b = Uuid::new_v4();

        let conn_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.join(conn_id, order_a, tx.clone());
        registry.join(conn_id, order_b, tx);

        registry.disconnect(conn_id);

        assert_eq!(registry.room_size(order_a), 0);
        assert_eq!(registry.room_size(order_b), 0);
        assert_eq!(registry.connection_count(), 0);

        registry.publish(order_a, location(18.52, 73.86), None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_unknown_room_is_a_no_op() {
        let registry = RoomRegistry::new();
        assert_eq!(registry.publish(Uuid::new_v4(), location(0.0, 0.0), None), 0);
    }
}
