pub mod amount;
pub mod cart;
pub mod config;
pub mod csv;
pub mod error;
pub mod location;
pub mod model;
pub mod notification;
pub mod order;
pub mod session;
pub mod store;

pub use amount::Amount;
pub use config::Config;
pub use error::Error;
pub use model::{OrderId, Product};
pub use session::{Action, Session};
