//! Memory Layer - In-Memory Coordination
//!
//! 进程内的并发闸门和按 key 的 single-flight 锁

mod concurrency_gate;
mod keyed_locks;

pub use concurrency_gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use keyed_locks::{KeyGuard, KeyedLocks};
