//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：缓存查询与统计

mod cache_queries;

pub mod handlers;

pub use cache_queries::*;
