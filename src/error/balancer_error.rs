//! 负载均衡与服务解析统一错误类型

use super::code::ErrorCode;
use std::time::Duration;
use thiserror::Error;

/// 负载均衡与服务解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalancerError {
    /// 启动阶段的服务发现超时，对建连方是致命错误
    #[error("discovery of {target} timed out after {timeout:?}")]
    DiscoveryTimeout { target: String, timeout: Duration },

    /// 当前节点快照为空
    #[error("no available node")]
    NoAvailableNode,

    /// 端点格式错误或协议不匹配
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// 目标地址格式错误
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// 服务发现后端错误
    #[error("discovery error: {0}")]
    Discovery(String),

    /// 解析器已关闭
    #[error("resolver canceled")]
    Canceled,

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),
}

impl BalancerError {
    /// 创建端点错误
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        BalancerError::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        BalancerError::Config(msg.into())
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            BalancerError::DiscoveryTimeout { .. } => ErrorCode::DiscoveryTimeout,
            BalancerError::NoAvailableNode => ErrorCode::NoAvailableNode,
            BalancerError::InvalidEndpoint { .. } => ErrorCode::InvalidEndpoint,
            BalancerError::InvalidTarget(_) => ErrorCode::InvalidTarget,
            BalancerError::Discovery(_) => ErrorCode::DiscoveryFailed,
            BalancerError::Canceled => ErrorCode::WatchCanceled,
            BalancerError::Config(_) => ErrorCode::ConfigurationError,
        }
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, BalancerError>;
