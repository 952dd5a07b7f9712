//! Shared record types, the service-state machine, store timestamp
//! formatting, and task correlation ids.

pub mod id;
pub mod time;
pub mod types;
