//! Headless stdio host: command contract, routing and the JSON-lines bridge.

pub mod channel;
pub mod contract;
pub mod handler;
pub mod stdio;
