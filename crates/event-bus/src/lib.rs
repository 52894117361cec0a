//! Event bus broadcasting named events to interested observers.
//!
//! Strategy sessions announce on-chain changes here (for example
//! `protocol::aaveV2::refresh` after a confirmed transaction) so that every other
//! open view of the same protocol can reload its data.

pub mod channel;
pub mod envelope;
pub mod error;

pub use channel::{
    EventBus, EventBusBuilder, EventPublishResult, EventReceiver, EventSender, PublishMode,
};
pub use envelope::BusEvent;
pub use error::EventBusError;
