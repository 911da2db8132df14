//! # Event subscribers.
//!
//! ```text
//! TaskHandle / join sweep / Supervisor
//!        │ publish(Event)
//!        ▼
//!       Bus ──► supervisor listener ──► SubscriberSet::emit
//!                                           ├──► LogWriter (tracing)
//!                                           └──► custom Subscribe impls
//! ```
//!
//! Implement [`Subscribe`] and hand it to
//! [`SupervisorBuilder::with_subscribers`](crate::SupervisorBuilder::with_subscribers).

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
