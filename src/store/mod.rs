use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{GeoPoint, Order, OrderItem, OrderStatus};

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub farmer_id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub delivery_address: String,
    pub delivery_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    pub total_earnings: f64,
    pub delivered_count: usize,
}

/// In-process order record keyed by order id. Transitions go through
/// `accept`/`complete`, which check the precondition and mutate under the
/// same shard lock so concurrent callers resolve to exactly one winner.
pub struct OrderStore {
    orders: DashMap<Uuid, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn create(&self, new_order: NewOrder) -> Result<Order, AppError> {
        if new_order.items.is_empty() {
            return Err(AppError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }

        let order = Order {
            id: Uuid::new_v4(),
            farmer_id: new_order.farmer_id,
            customer_id: new_order.customer_id,
            items: new_order.items,
            total_amount: new_order.total_amount,
            status: OrderStatus::Pending,
            delivery_partner_id: None,
            delivery_address: new_order.delivery_address,
            delivery_location: new_order.delivery_location,
            delivery_fee: 0.0,
            created_at: Utc::now(),
        };

        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    pub fn get(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.orders
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))
    }

    pub fn list_by_farmer(&self, farmer_id: Uuid) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.farmer_id == farmer_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn list_by_customer(&self, customer_id: Uuid) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.customer_id == customer_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn list_pending(&self) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.status == OrderStatus::Pending)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Claims a pending order for a delivery partner. The status check and
    /// the mutation happen while holding the entry's write lock, so of two
    /// concurrent accepts exactly one sees `pending`.
    pub fn accept(
        &self,
        order_id: Uuid,
        partner_id: Uuid,
        delivery_fee: f64,
    ) -> Result<Order, AppError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(
                "order is already assigned or delivered".to_string(),
            ));
        }

        order.status = OrderStatus::Assigned;
        order.delivery_partner_id = Some(partner_id);
        order.delivery_fee = delivery_fee;

        Ok(order.clone())
    }

    /// Marks an assigned order delivered. Only the partner bound at accept
    /// time may close the order.
    pub fn complete(&self, order_id: Uuid, partner_id: Uuid) -> Result<Order, AppError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

        match order.status {
            OrderStatus::Pending => {
                return Err(AppError::Conflict(
                    "order has not been assigned yet".to_string(),
                ));
            }
            OrderStatus::Delivered => {
                return Err(AppError::Conflict("order is already delivered".to_string()));
            }
            OrderStatus::Assigned => {}
        }

        if order.delivery_partner_id != Some(partner_id) {
            return Err(AppError::Forbidden(
                "order is assigned to a different delivery partner".to_string(),
            ));
        }

        order.status = OrderStatus::Delivered;
        Ok(order.clone())
    }

    pub fn partner_summary(&self, partner_id: Uuid) -> DeliverySummary {
        let delivered = self.orders.iter().filter(|entry| {
            entry.status == OrderStatus::Delivered
                && entry.delivery_partner_id == Some(partner_id)
        });

        let mut summary = DeliverySummary {
            total_earnings: 0.0,
            delivered_count: 0,
        };
        for order in delivered {
            summary.total_earnings += order.delivery_fee;
            summary.delivered_count += 1;
        }
        summary
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{NewOrder, OrderStore};
    use crate::error::AppError;
    use crate::models::order::{OrderItem, OrderStatus};

    fn item(name: &str, unit_price: f64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: format!("prod-{name}"),
            name: name.to_string(),
            unit_price,
            quantity,
            image: String::new(),
        }
    }

    fn new_order(items: Vec<OrderItem>, total_amount: f64) -> NewOrder {
        NewOrder {
            farmer_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            items,
            total_amount,
            delivery_address: "14 Canal Road, Pune".to_string(),
            delivery_location: None,
        }
    }

    #[test]
    fn create_rejects_empty_items() {
        let store = OrderStore::new();
        let err = store.create(new_order(vec![], 0.0)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn create_starts_pending_with_no_partner() {
        let store = OrderStore::new();
        let order = store
            .create(new_order(vec![item("tomatoes", 40.0, 2)], 80.0))
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.delivery_partner_id.is_none());
        assert_eq!(order.delivery_fee, 0.0);
        assert_eq!(store.get(order.id).unwrap().total_amount, 80.0);
    }

    #[test]
    fn accept_binds_partner_and_fee() {
        let store = OrderStore::new();
        let order = store
            .create(new_order(vec![item("spinach", 25.0, 4)], 100.0))
            .unwrap();
        let partner = Uuid::new_v4();

        let accepted = store.accept(order.id, partner, 30.0).unwrap();
        assert_eq!(accepted.status, OrderStatus::Assigned);
        assert_eq!(accepted.delivery_partner_id, Some(partner));
        assert_eq!(accepted.delivery_fee, 30.0);
    }

    #[test]
    fn accept_unknown_order_is_not_found() {
        let store = OrderStore::new();
        let err = store
            .accept(Uuid::new_v4(), Uuid::new_v4(), 30.0)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn second_accept_conflicts_and_keeps_first_partner() {
        let store = OrderStore::new();
        let order = store
            .create(new_order(vec![item("mangoes", 120.0, 1)], 120.0))
            .unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.accept(order.id, first, 30.0).unwrap();
        let err = store.accept(order.id, second, 30.0).unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.get(order.id).unwrap().delivery_partner_id, Some(first));
    }

    #[test]
    fn concurrent_accepts_have_exactly_one_winner() {
        let store = Arc::new(OrderStore::new());
        let order = store
            .create(new_order(vec![item("onions", 20.0, 5)], 100.0))
            .unwrap();

        let partners: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let handles: Vec<_> = partners
            .iter()
            .map(|&partner| {
                let store = store.clone();
                let order_id = order.id;
                std::thread::spawn(move || store.accept(order_id, partner, 30.0))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1);

        let final_order = store.get(order.id).unwrap();
        assert_eq!(final_order.status, OrderStatus::Assigned);
        assert_eq!(
            final_order.delivery_partner_id,
            winners[0].as_ref().ok().map(|o| o.delivery_partner_id.unwrap())
        );
    }

    #[test]
    fn complete_by_wrong_partner_is_forbidden_and_leaves_status() {
        let store = OrderStore::new();
        let order = store
            .create(new_order(vec![item("carrots", 35.0, 3)], 105.0))
            .unwrap();
        let bound = Uuid::new_v4();
        let intruder = Uuid::new_v4();

        store.accept(order.id, bound, 30.0).unwrap();
        let err = store.complete(order.id, intruder).unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(store.get(order.id).unwrap().status, OrderStatus::Assigned);
    }

    #[test]
    fn complete_before_accept_conflicts() {
        let store = OrderStore::new();
        let order = store
            .create(new_order(vec![item("okra", 45.0, 2)], 90.0))
            .unwrap();

        let err = store.complete(order.id, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn status_never_regresses_after_delivery() {
        let store = OrderStore::new();
        let order = store
            .create(new_order(vec![item("guavas", 60.0, 2)], 120.0))
            .unwrap();
        let partner = Uuid::new_v4();

        store.accept(order.id, partner, 30.0).unwrap();
        store.complete(order.id, partner).unwrap();

        assert!(matches!(
            store.accept(order.id, Uuid::new_v4(), 30.0),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store.complete(order.id, partner),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(store.get(order.id).unwrap().status, OrderStatus::Delivered);
    }

    #[test]
    fn partner_summary_counts_only_own_delivered_orders() {
        let store = OrderStore::new();
        let partner = Uuid::new_v4();
        let other = Uuid::new_v4();

        for _ in 0..2 {
            let order = store
                .create(new_order(vec![item("potatoes", 22.0, 10)], 220.0))
                .unwrap();
            store.accept(order.id, partner, 30.0).unwrap();
            store.complete(order.id, partner).unwrap();
        }

        let in_flight = store
            .create(new_order(vec![item("beans", 55.0, 2)], 110.0))
            .unwrap();
        store.accept(in_flight.id, partner, 30.0).unwrap();

        let theirs = store
            .create(new_order(vec![item("peas", 70.0, 1)], 70.0))
            .unwrap();
        store.accept(theirs.id, other, 30.0).unwrap();
        store.complete(theirs.id, other).unwrap();

        let summary = store.partner_summary(partner);
        assert_eq!(summary.delivered_count, 2);
        assert_eq!(summary.total_earnings, 60.0);
    }
}
