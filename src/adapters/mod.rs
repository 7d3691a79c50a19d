// Adapters layer: concrete implementations of the domain ports.

pub mod earth_engine;
pub mod email;
pub mod memory;
pub mod postgres;
pub mod storage;
pub mod webhook;
