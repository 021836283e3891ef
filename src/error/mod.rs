//! 错误处理模块
//!
//! 统一的错误类型、错误代码分类以及到 gRPC Status 的转换

pub mod balancer_error;
pub mod code;
pub mod grpc;

pub use balancer_error::{BalancerError, Result};
pub use code::{ErrorCategory, ErrorCode};
