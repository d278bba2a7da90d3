//! Order lifecycle state machine.
//!
//! Orders are created from a cart snapshot, advanced through the delivery
//! statuses and kept most-recent-first. Delivered and cancelled orders are
//! final.

use jiff::{SignedDuration, Timestamp};
use tracing::info;

use crate::cart::CartSnapshot;
use crate::location::DeliveryAddress;
use crate::model::{IdGenerator, OrderId, Vendor};
use crate::store::{self, KeyValueStore, Persister, StoreError, keys};

mod error;
pub use error::OrderError;

mod state;
pub use state::{Order, Pricing};

mod status;
pub use status::{OrderStatus, TrackingStep, TransitionPolicy, UnknownStatus, tracking_steps};

/// Default time between placing an order and its delivery estimate.
pub const DEFAULT_DELIVERY_ETA: SignedDuration = SignedDuration::from_mins(30);

/// Tracking view of one order, recomputed on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracking<'a> {
    pub order: &'a Order,
    pub steps: Vec<TrackingStep>,
    pub current_step: Option<usize>,
}

/// The order state machine.
#[derive(Debug)]
pub struct OrderBook {
    /// Most recent first
    orders: Vec<Order>,
    current: Option<OrderId>,
    ids: IdGenerator,
    delivery_eta: SignedDuration,
    policy: TransitionPolicy,
    persister: Persister,
    mutated: bool,
}

/// Public API
impl OrderBook {
    pub fn new(persister: Persister) -> Self {
        Self {
            orders: Vec::new(),
            current: None,
            ids: IdGenerator::new(),
            delivery_eta: DEFAULT_DELIVERY_ETA,
            policy: TransitionPolicy::default(),
            persister,
            mutated: false,
        }
    }

    pub fn with_delivery_eta(mut self, eta: SignedDuration) -> Self {
        self.delivery_eta = eta;
        self
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load stored orders, unless orders changed since start.
    pub async fn init(&mut self, store: &dyn KeyValueStore) -> Result<bool, StoreError> {
        match store::load::<Vec<Order>>(store, keys::ORDERS).await? {
            Some(orders) => Ok(self.restore(orders)),
            None => Ok(false),
        }
    }

    pub fn restore(&mut self, orders: Vec<Order>) -> bool {
        for order in &orders {
            self.ids.observe(order.id);
        }
        if self.mutated {
            info!("orders changed before stored list loaded, keeping live state");
            return false;
        }
        info!(orders = orders.len(), "orders restored");
        self.orders = orders;
        true
    }

    /// Place an order from a copy of the cart and delivery address.
    ///
    /// The new order is `pending`, goes first in the list and becomes the
    /// current order. The cart itself is left alone.
    pub fn create_order(
        &mut self,
        cart: &CartSnapshot,
        delivery_address: &DeliveryAddress,
        payment_method: &str,
    ) -> Result<Order, OrderError> {
        let result = self.create_at(cart, delivery_address, payment_method, Timestamp::now());
        match &result {
            Ok(order) => info!(
                order = order.id,
                vendor = %order.vendor.id,
                total = %order.total(),
                "create order applied"
            ),
            Err(e) => info!(reason = %e, "create order skipped"),
        }
        result
    }

    /// Overwrite the status of an order.
    ///
    /// Final orders are never changed and cancelling respects the
    /// cancellation lock. Other moves are checked against the configured
    /// [`TransitionPolicy`].
    pub fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), OrderError> {
        let policy = self.policy;
        let result = self.apply_status(id, status, |from| {
            if from.is_terminal() || (status == OrderStatus::Cancelled && !from.is_cancellable()) {
                return false;
            }
            match policy {
                TransitionPolicy::Permissive => true,
                TransitionPolicy::ForwardOnly => from.can_transition_to(status),
            }
        });
        Self::log_result("update status", id, Some(status), &result);
        result
    }

    /// Cancel an order that has not left the vendor yet.
    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), OrderError> {
        let result = self.apply_status(id, OrderStatus::Cancelled, OrderStatus::is_cancellable);
        Self::log_result("cancel", id, None, &result);
        result
    }

    /// Place a new order with the same contents as an earlier one.
    pub fn reorder(&mut self, id: OrderId) -> Result<Order, OrderError> {
        let original = self.get(id).ok_or(OrderError::NotFound(id))?;

        let cart = CartSnapshot {
            items: original.items.clone(),
            selected_vendor: Some(original.vendor.clone()),
            fees: original.pricing.fees,
        };
        let address = original.delivery_address.clone();
        let payment_method = original.payment_method.clone();

        info!(order = id, "reorder requested");
        self.create_order(&cart, &address, &payment_method)
    }

    pub fn track_order(&self, id: OrderId) -> Option<Tracking<'_>> {
        let order = self.get(id)?;
        let (steps, current_step) = tracking_steps(order.status);
        Some(Tracking {
            order,
            steps,
            current_step,
        })
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn current_order(&self) -> Option<&Order> {
        self.current.and_then(|id| self.get(id))
    }

    pub fn set_current_order(&mut self, id: Option<OrderId>) -> Result<(), OrderError> {
        if let Some(id) = id
            && self.get(id).is_none()
        {
            return Err(OrderError::NotFound(id));
        }
        self.current = id;
        Ok(())
    }

    /// All orders, newest first.
    pub fn order_history(&self) -> Vec<&Order> {
        let mut history: Vec<&Order> = self.orders.iter().collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        history
    }

    /// Orders that are neither delivered nor cancelled.
    pub fn active_orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.orders.iter().filter(|order| order.status.is_active())
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn delivery_eta(&self) -> SignedDuration {
        self.delivery_eta
    }
}

/// Private API
impl OrderBook {
    /// Small helper to log status change results
    fn log_result(
        op: &str,
        id: OrderId,
        status: Option<OrderStatus>,
        result: &Result<(), OrderError>,
    ) {
        match (result, status) {
            (Ok(()), Some(status)) => info!(order = id, status = %status, "{op} applied"),
            (Ok(()), None) => info!(order = id, "{op} applied"),
            (Err(e), Some(status)) => {
                info!(order = id, status = %status, reason = %e, "{op} skipped")
            }
            (Err(e), None) => info!(order = id, reason = %e, "{op} skipped"),
        }
    }

    fn create_at(
        &mut self,
        cart: &CartSnapshot,
        delivery_address: &DeliveryAddress,
        payment_method: &str,
        now: Timestamp,
    ) -> Result<Order, OrderError> {
        let Some(first) = cart.items.first() else {
            return Err(OrderError::EmptyCart);
        };

        let vendor = cart.selected_vendor.clone().unwrap_or_else(|| Vendor {
            id: first.vendor_id.clone(),
            name: first.vendor_name.clone(),
        });
        let estimated_delivery_time = now.checked_add(self.delivery_eta)?;

        let order = Order {
            id: self.ids.next_at(now),
            items: cart.items.clone(),
            vendor,
            delivery_address: delivery_address.clone(),
            payment_method: payment_method.to_string(),
            pricing: Pricing {
                subtotal: cart.subtotal(),
                fees: cart.fees,
            },
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            estimated_delivery_time,
        };

        self.orders.insert(0, order.clone());
        self.current = Some(order.id);
        self.touch();
        Ok(order)
    }

    /// Find the order, check the move with `allowed` and apply it.
    fn apply_status(
        &mut self,
        id: OrderId,
        to: OrderStatus,
        allowed: impl Fn(OrderStatus) -> bool,
    ) -> Result<(), OrderError> {
        let order = self
            .orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or(OrderError::NotFound(id))?;

        if !allowed(order.status) {
            return Err(OrderError::InvalidTransition {
                id,
                from: order.status,
                to,
            });
        }

        order.status = to;
        order.updated_at = Timestamp::now().max(order.updated_at);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.mutated = true;
        self.persister.save(keys::ORDERS, &self.orders);
    }
}
