//! Transport-agnostic messaging: inbound events and the outbound port.

pub mod port;
pub mod throttled;
pub mod types;
