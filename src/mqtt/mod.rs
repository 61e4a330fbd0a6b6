mod connection;
mod message;
pub mod topics;

pub use connection::{Broker, Initiator};
pub use message::Incoming;
pub use topics::TopicLayout;
