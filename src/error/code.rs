//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 服务发现相关错误
/// - 2000-2999: 负载均衡相关错误
/// - 3000-3999: 端点相关错误
/// - 6000-6999: 系统相关错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 服务发现相关错误 (1000-1999)
    // ============================================================
    DiscoveryTimeout = 1000,
    DiscoveryFailed = 1001,
    WatchCanceled = 1002,
    InvalidTarget = 1003,

    // ============================================================
    // 负载均衡相关错误 (2000-2999)
    // ============================================================
    NoAvailableNode = 2000,

    // ============================================================
    // 端点相关错误 (3000-3999)
    // ============================================================
    InvalidEndpoint = 3000,

    // ============================================================
    // 系统相关错误 (6000-6999)
    // ============================================================
    ConfigurationError = 6003,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DiscoveryTimeout => "DISCOVERY_TIMEOUT",
            ErrorCode::DiscoveryFailed => "DISCOVERY_FAILED",
            ErrorCode::WatchCanceled => "WATCH_CANCELED",
            ErrorCode::InvalidTarget => "INVALID_TARGET",
            ErrorCode::NoAvailableNode => "NO_AVAILABLE_NODE",
            ErrorCode::InvalidEndpoint => "INVALID_ENDPOINT",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::DiscoveryTimeout
            | ErrorCode::DiscoveryFailed
            | ErrorCode::WatchCanceled
            | ErrorCode::InvalidTarget => ErrorCategory::Discovery,
            ErrorCode::NoAvailableNode => ErrorCategory::Balancer,
            ErrorCode::InvalidEndpoint => ErrorCategory::Endpoint,
            ErrorCode::ConfigurationError => ErrorCategory::System,
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// `NoAvailableNode` 可能只是发现结果尚未到达，交由外层重试策略处理
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::DiscoveryTimeout | ErrorCode::DiscoveryFailed | ErrorCode::NoAvailableNode
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Discovery,
    Balancer,
    Endpoint,
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Discovery => write!(f, "DISCOVERY"),
            ErrorCategory::Balancer => write!(f, "BALANCER"),
            ErrorCategory::Endpoint => write!(f, "ENDPOINT"),
            ErrorCategory::System => write!(f, "SYSTEM"),
        }
    }
}
