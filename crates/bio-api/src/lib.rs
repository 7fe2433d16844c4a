//! HTTP surface of the calculation engine.

pub mod server;
