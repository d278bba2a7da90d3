use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    // Cancelled and Delivered are final states
    Cancelled,
}

/// Forward moves accepted under [`TransitionPolicy::ForwardOnly`].
const FORWARD_TRANSITIONS: &[(OrderStatus, OrderStatus)] = {
    use OrderStatus::*;
    &[
        (Pending, Confirmed),
        (Confirmed, Preparing),
        (Preparing, ReadyForPickup),
        (Preparing, OutForDelivery),
        (ReadyForPickup, OutForDelivery),
        (OutForDelivery, Delivered),
        (Pending, Cancelled),
        (Confirmed, Cancelled),
        (Preparing, Cancelled),
        (ReadyForPickup, Cancelled),
    ]
};

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Position in the delivery sequence; `None` for `Cancelled`.
    pub fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::ReadyForPickup => Some(3),
            OrderStatus::OutForDelivery => Some(4),
            OrderStatus::Delivered => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    /// Delivered and cancelled orders never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Cancellation is locked once the order left the vendor.
    pub fn is_cancellable(self) -> bool {
        !matches!(
            self,
            OrderStatus::OutForDelivery | OrderStatus::Delivered | OrderStatus::Cancelled
        )
    }

    /// Whether `(self, to)` is in the forward allow-list.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        FORWARD_TRANSITIONS.contains(&(self, to))
    }

    /// Next step of the regular delivery flow, skipping pickup.
    pub fn next_forward(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Preparing),
            OrderStatus::Preparing | OrderStatus::ReadyForPickup => {
                Some(OrderStatus::OutForDelivery)
            }
            OrderStatus::OutForDelivery => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// How strictly `update_order_status` checks moves between statuses.
///
/// Both policies refuse to touch delivered or cancelled orders and apply the
/// cancellation lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any move between non-final statuses, backward included.
    #[default]
    Permissive,
    /// Only moves listed in the forward allow-list.
    ForwardOnly,
}

/// One entry of the tracking timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingStep {
    pub status: OrderStatus,
    pub title: &'static str,
    pub completed: bool,
}

const TRACKED_STEPS: [(OrderStatus, &str); 5] = [
    (OrderStatus::Pending, "Order Placed"),
    (OrderStatus::Confirmed, "Order Confirmed"),
    (OrderStatus::Preparing, "Preparing"),
    (OrderStatus::OutForDelivery, "Out for Delivery"),
    (OrderStatus::Delivered, "Delivered"),
];

/// Build the timeline for an order currently in `status`.
///
/// A cancelled order only shows the placement step as completed and has no
/// current step.
pub fn tracking_steps(status: OrderStatus) -> (Vec<TrackingStep>, Option<usize>) {
    let steps: Vec<TrackingStep> = TRACKED_STEPS
        .into_iter()
        .map(|(step, title)| {
            let completed = match (status.rank(), step.rank()) {
                (Some(current), Some(step_rank)) => current >= step_rank,
                _ => step == OrderStatus::Pending,
            };
            TrackingStep {
                status: step,
                title,
                completed,
            }
        })
        .collect();

    let current = if status == OrderStatus::Cancelled {
        None
    } else {
        steps.iter().rposition(|step| step.completed)
    };

    (steps, current)
}
