use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;

/// Messages a connected client may send over the tracking channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinOrder {
        order_id: Uuid,
    },
    LeaveOrder {
        order_id: Uuid,
    },
    UpdateLocation {
        order_id: Uuid,
        latitude: f64,
        longitude: f64,
    },
    UpdateStatus {
        order_id: Uuid,
        status: OrderStatus,
    },
}

/// Messages relayed to every member of an order's room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerEvent {
    DriverLocation {
        latitude: f64,
        longitude: f64,
    },
    OrderAccepted {
        order_id: Uuid,
        delivery_partner_id: Uuid,
    },
    StatusUpdate {
        order_id: Uuid,
        status: OrderStatus,
    },
}
