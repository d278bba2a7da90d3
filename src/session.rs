//! Composition root: owns the four state machines and the storage writer.
//!
//! A session is created once per app run with [`Session::init`] and torn
//! down with [`Session::dispose`]. It also drives the machines from a stream
//! of [`Action`]s, which is how the binary replays scripted sessions.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::cart::Cart;
use crate::config::Config;
use crate::location::AddressBook;
use crate::model::{Options, OrderId, Product, ProductId};
use crate::notification::{NewNotification, NotificationKind, NotificationLog};
use crate::order::{Order, OrderBook, OrderError, OrderStatus};
use crate::store::{KeyValueStore, Persister, StoreError, keys};
use crate::{Amount, Error};

/// A user intent, as produced by the presentation layer or a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddItem {
        product: Product,
        quantity: u32,
        options: Options,
    },
    RemoveItem {
        product_id: ProductId,
        options: Options,
    },
    UpdateQuantity {
        product_id: ProductId,
        options: Options,
        quantity: i64,
    },
    UpdateFees {
        delivery_fee: Option<Amount>,
        service_fee: Option<Amount>,
        tax: Option<Amount>,
    },
    ClearCart,
    SetDeliveryAddress(String),
    Checkout {
        payment_method: String,
    },
    /// Move the current order one step along the delivery flow.
    AdvanceOrder,
    CancelOrder,
    Reorder,
}

pub struct Session {
    cart: Cart,
    orders: OrderBook,
    addresses: AddressBook,
    notifications: NotificationLog,
    store: Arc<dyn KeyValueStore>,
    persister: Persister,
    writer: JoinHandle<()>,
}

/// Public API
impl Session {
    /// Open the configured store and start a session on it.
    pub async fn open(config: &Config) -> Result<Self, Error> {
        let store = config.open_store().await?;
        Ok(Self::init(config, store).await)
    }

    /// Start the storage writer and load every machine's last snapshot.
    ///
    /// Unreadable snapshots are logged and the machine starts empty.
    pub async fn init(config: &Config, store: Arc<dyn KeyValueStore>) -> Self {
        let (persister, writer) = Persister::spawn(store.clone());

        let mut cart = Cart::new(persister.clone());
        let mut orders = OrderBook::new(persister.clone())
            .with_delivery_eta(config.delivery_eta)
            .with_policy(config.transition_policy);
        let mut addresses = AddressBook::new(persister.clone());

        if let Err(e) = cart.init(store.as_ref()).await {
            warn!(error = %e, "stored cart could not be loaded");
        }
        if let Err(e) = orders.init(store.as_ref()).await {
            warn!(error = %e, "stored orders could not be loaded");
        }
        if let Err(e) = addresses.init(store.as_ref()).await {
            warn!(error = %e, "stored addresses could not be loaded");
        }

        info!(
            cart_items = cart.items().len(),
            orders = orders.orders().len(),
            addresses = addresses.saved_addresses().len(),
            "session started"
        );

        Self {
            cart,
            orders,
            addresses,
            notifications: NotificationLog::new(),
            store,
            persister,
            writer,
        }
    }

    /// Flush pending writes and stop the storage writer.
    pub async fn dispose(self) -> Result<(), StoreError> {
        let Session {
            cart,
            orders,
            addresses,
            persister,
            writer,
            ..
        } = self;

        let flushed = persister.flush().await;

        // the writer exits once every handle is gone
        drop((cart, orders, addresses, persister));
        if let Err(e) = writer.await {
            warn!(error = %e, "storage writer did not shut down cleanly");
        }

        info!("session disposed");
        flushed
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn orders_mut(&mut self) -> &mut OrderBook {
        &mut self.orders
    }

    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    pub fn addresses_mut(&mut self) -> &mut AddressBook {
        &mut self.addresses
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationLog {
        &mut self.notifications
    }

    /// Wait until all queued snapshots reached the store.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.persister.flush().await
    }

    /// Place an order for the cart at the selected delivery address, then
    /// empty the cart.
    pub fn checkout(&mut self, payment_method: &str) -> Result<Order, Error> {
        let address = self
            .addresses
            .delivery_address()
            .cloned()
            .ok_or(Error::MissingDeliveryAddress)?;

        let order = self
            .orders
            .create_order(&self.cart.snapshot(), &address, payment_method)?;
        self.cart.clear_cart();
        self.notify_placed(&order);
        Ok(order)
    }

    /// Move an order to the next status of the delivery flow and notify.
    pub fn advance_order(&mut self, id: OrderId) -> Result<OrderStatus, Error> {
        let status = self.orders.get(id).ok_or(OrderError::NotFound(id))?.status;
        let next = status
            .next_forward()
            .ok_or(Error::OrderFinished(id, status))?;

        self.orders.update_order_status(id, next)?;
        self.notifications.send_order_notification(id, next, None);
        Ok(next)
    }

    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), Error> {
        self.orders.cancel_order(id)?;
        self.notifications
            .send_order_notification(id, OrderStatus::Cancelled, None);
        Ok(())
    }

    pub fn reorder(&mut self, id: OrderId) -> Result<Order, Error> {
        let order = self.orders.reorder(id)?;
        self.notify_placed(&order);
        Ok(order)
    }

    /// Erase every key this app writes, including profile entries, and start
    /// over with empty machines.
    pub async fn reset_storage(&mut self) -> Result<(), StoreError> {
        if let Err(e) = self.persister.flush().await {
            warn!(error = %e, "pending writes failed before reset");
        }

        self.cart = Cart::new(self.persister.clone());
        self.orders = OrderBook::new(self.persister.clone())
            .with_delivery_eta(self.orders.delivery_eta())
            .with_policy(self.orders.policy());
        self.addresses = AddressBook::new(self.persister.clone());
        self.notifications = NotificationLog::new();

        self.store.multi_remove(&keys::ALL).await?;
        info!("local storage reset");
        Ok(())
    }

    /// Apply a single action on top of the current session state
    pub fn apply(&mut self, action: Action) -> Result<(), Error> {
        match action {
            Action::AddItem {
                product,
                quantity,
                options,
            } => self.cart.add_item(&product, quantity, options)?,
            Action::RemoveItem {
                product_id,
                options,
            } => self.cart.remove_item(&product_id, &options),
            Action::UpdateQuantity {
                product_id,
                options,
                quantity,
            } => self.cart.update_quantity(&product_id, &options, quantity),
            Action::UpdateFees {
                delivery_fee,
                service_fee,
                tax,
            } => self.cart.update_fees(delivery_fee, service_fee, tax)?,
            Action::ClearCart => self.cart.clear_cart(),
            Action::SetDeliveryAddress(text) => {
                self.addresses.set_delivery_address(text.as_str())
            }
            Action::Checkout { payment_method } => {
                self.checkout(&payment_method)?;
            }
            Action::AdvanceOrder => {
                let id = self.current_order_id()?;
                self.advance_order(id)?;
            }
            Action::CancelOrder => {
                let id = self.current_order_id()?;
                self.cancel_order(id)?;
            }
            Action::Reorder => {
                let id = self.current_order_id()?;
                self.reorder(id)?;
            }
        }
        Ok(())
    }

    /// Run the session with the given action stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Action> + Unpin) {
        while let Some(action) = stream.next().await {
            // a failed action leaves state intact and must not stop the session
            if let Err(e) = self.apply(action) {
                info!(reason = %e, "action skipped");
            }
        }
    }
}

/// Private API
impl Session {
    fn current_order_id(&self) -> Result<OrderId, Error> {
        self.orders
            .current_order()
            .map(|order| order.id)
            .ok_or(Error::NoCurrentOrder)
    }

    fn notify_placed(&mut self, order: &Order) {
        self.notifications.add_notification(NewNotification {
            order_id: Some(order.id),
            ..NewNotification::new(
                "Order Placed",
                format!("Your order from {} has been placed.", order.vendor.name),
                NotificationKind::Success,
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tokio_stream::iter;

    // test utils

    fn burger() -> Product {
        Product::new("p1", "Burger", Amount::from_cents(1299), "v1", "Grill House")
    }

    fn fries() -> Product {
        Product::new("p2", "Fries", Amount::from_cents(399), "v1", "Grill House")
    }

    fn add(product: Product, quantity: u32) -> Action {
        Action::AddItem {
            product,
            quantity,
            options: Options::new(),
        }
    }

    async fn session() -> (Session, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let session = Session::init(&Config::default(), store.clone()).await;
        (session, store)
    }

    #[tokio::test]
    async fn checkout_requires_delivery_address() {
        let (mut session, _) = session().await;
        session.apply(add(burger(), 1)).unwrap();

        assert!(matches!(
            session.checkout("card"),
            Err(Error::MissingDeliveryAddress)
        ));
        assert_eq!(session.cart().item_count(), 1);
        assert!(session.orders().orders().is_empty());
    }

    #[tokio::test]
    async fn checkout_places_order_and_clears_cart() {
        let (mut session, _) = session().await;
        session.apply(add(burger(), 2)).unwrap();
        session.apply(add(fries(), 1)).unwrap();
        session
            .apply(Action::SetDeliveryAddress("1 Main St".into()))
            .unwrap();

        let order = session.checkout("card").unwrap();

        assert_eq!(order.pricing.subtotal, Amount::from_cents(2997));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(session.cart().is_empty());
        assert_eq!(session.orders().current_order().map(|o| o.id), Some(order.id));

        let placed = &session.notifications().notifications()[0];
        assert_eq!(placed.title, "Order Placed");
        assert_eq!(placed.order_id, Some(order.id));
    }

    #[tokio::test]
    async fn advance_walks_the_delivery_flow() {
        let (mut session, _) = session().await;
        let actions = vec![
            add(burger(), 1),
            Action::SetDeliveryAddress("1 Main St".into()),
            Action::Checkout {
                payment_method: "cash".into(),
            },
        ];
        session.run(iter(actions)).await;
        let id = session.orders().current_order().unwrap().id;

        let mut seen = Vec::new();
        while let Ok(status) = session.advance_order(id) {
            seen.push(status);
        }

        assert_eq!(
            seen,
            vec![
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::OutForDelivery,
                OrderStatus::Delivered,
            ]
        );
        assert!(matches!(
            session.advance_order(id),
            Err(Error::OrderFinished(_, OrderStatus::Delivered))
        ));
        assert_eq!(session.notifications().notifications()[0].title, "Order Delivered");
    }

    #[tokio::test]
    async fn cancel_is_locked_once_out_for_delivery() {
        let (mut session, _) = session().await;
        session.apply(add(burger(), 1)).unwrap();
        session
            .apply(Action::SetDeliveryAddress("1 Main St".into()))
            .unwrap();
        let order = session.checkout("card").unwrap();

        for _ in 0..3 {
            session.apply(Action::AdvanceOrder).unwrap();
        }
        assert!(session.apply(Action::CancelOrder).is_err());
        assert_eq!(
            session.orders().get(order.id).unwrap().status,
            OrderStatus::OutForDelivery
        );
    }

    #[tokio::test]
    async fn reorder_copies_current_order() {
        let (mut session, _) = session().await;
        session.apply(add(burger(), 2)).unwrap();
        session
            .apply(Action::SetDeliveryAddress("1 Main St".into()))
            .unwrap();
        let first = session.checkout("card").unwrap();
        session.apply(Action::CancelOrder).unwrap();

        session.apply(Action::Reorder).unwrap();

        let again = session.orders().current_order().unwrap();
        assert_ne!(again.id, first.id);
        assert_eq!(again.items, first.items);
        assert_eq!(again.status, OrderStatus::Pending);
        assert_eq!(session.orders().orders().len(), 2);
        assert_eq!(
            session.orders().get(first.id).unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn order_actions_need_a_current_order() {
        let (mut session, _) = session().await;
        for action in [Action::AdvanceOrder, Action::CancelOrder, Action::Reorder] {
            assert!(matches!(session.apply(action), Err(Error::NoCurrentOrder)));
        }
    }

    #[tokio::test]
    async fn run_skips_failed_actions() {
        let (mut session, _) = session().await;
        let other_vendor =
            Product::new("p9", "Sushi", Amount::from_cents(900), "v2", "Sushi Bar");
        let actions = vec![
            add(burger(), 1),
            add(other_vendor, 1),
            Action::CancelOrder,
            add(fries(), 2),
        ];

        session.run(iter(actions)).await;

        assert_eq!(session.cart().item_count(), 3);
        assert_eq!(session.cart().vendor().map(|v| v.id.as_str()), Some("v1"));
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let (mut session, store) = session().await;
        session.apply(add(burger(), 1)).unwrap();
        session
            .apply(Action::SetDeliveryAddress("1 Main St".into()))
            .unwrap();
        let order = session.checkout("card").unwrap();
        session.apply(add(fries(), 3)).unwrap();
        session.dispose().await.unwrap();

        let restored = Session::init(&Config::default(), store).await;

        assert_eq!(restored.cart().quantity_of("p2", &Options::new()), 3);
        assert_eq!(restored.orders().orders().len(), 1);
        assert_eq!(restored.orders().orders()[0].id, order.id);
        assert_eq!(
            restored.addresses().delivery_address().map(|a| a.text()),
            Some("1 Main St")
        );
        // notifications are not persisted
        assert!(restored.notifications().notifications().is_empty());
        restored.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn reset_storage_removes_every_key() {
        let (mut session, store) = session().await;
        store.set(keys::FAVORITES, "[\"p1\"]".into()).await.unwrap();
        session.apply(add(burger(), 1)).unwrap();
        session.flush().await.unwrap();
        assert!(store.len().await >= 2);

        session.reset_storage().await.unwrap();

        assert_eq!(store.len().await, 0);
        assert!(session.cart().is_empty());
        assert!(session.orders().orders().is_empty());
        session.dispose().await.unwrap();
        assert_eq!(store.len().await, 0);
    }
}
