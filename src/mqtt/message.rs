/// Things the broker sends to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Publish on one of the subscribed control topics.
    Control {
        topic: String,
        payload: Vec<u8>,
    },
}
