//! 负载均衡配置

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{BalancerError, Result};

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 随机
    Random,
    /// 平滑加权轮询
    #[default]
    WeightedRoundRobin,
    /// 一致性哈希
    ConsistentHash,
}

impl std::str::FromStr for LoadBalanceStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random" => Ok(LoadBalanceStrategy::Random),
            "weighted_round_robin" | "weightedroundrobin" | "wrr" => {
                Ok(LoadBalanceStrategy::WeightedRoundRobin)
            }
            "consistent_hash" | "consistenthash" | "ketama" => Ok(LoadBalanceStrategy::ConsistentHash),
            _ => Err(format!("Unknown load balance strategy: {}", s)),
        }
    }
}

impl fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalanceStrategy::Random => write!(f, "random"),
            LoadBalanceStrategy::WeightedRoundRobin => write!(f, "weighted_round_robin"),
            LoadBalanceStrategy::ConsistentHash => write!(f, "consistent_hash"),
        }
    }
}

/// 负载均衡与解析器配置
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BalancerConfig {
    /// 选择算法
    pub strategy: LoadBalanceStrategy,

    /// 启动阶段服务发现超时（毫秒）
    pub discovery_timeout_ms: u64,

    /// `list()` 失败后的固定重试间隔（毫秒）
    pub retry_interval_ms: u64,

    /// 是否使用明文传输，为 false 时只接受 `grpcs` 端点
    pub insecure: bool,

    /// 传输协议基础名
    pub scheme: String,

    /// 子集大小，0 表示不启用
    pub subset_size: usize,

    /// 子集选择键（通常是客户端标识），缺省时每个解析器随机生成
    pub subset_key: Option<String>,

    /// 一致性哈希的虚拟节点数
    pub virtual_nodes: usize,

    /// 未声明权重的节点使用的权重
    pub default_weight: i64,

    /// 每次更新时打印实例列表
    pub debug_log: bool,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            strategy: LoadBalanceStrategy::default(),
            discovery_timeout_ms: 10_000,
            retry_interval_ms: 1_000,
            insecure: true,
            scheme: "grpc".to_string(),
            subset_size: 0,
            subset_key: None,
            virtual_nodes: 32,
            default_weight: 100,
            debug_log: true,
        }
    }
}

impl BalancerConfig {
    /// 从 TOML 文件加载
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BalancerError::config(format!("failed to read {}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BalancerConfig =
            toml::from_str(content).map_err(|e| BalancerError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.discovery_timeout_ms == 0 {
            return Err(BalancerError::config("discovery_timeout_ms must be greater than 0"));
        }
        if self.retry_interval_ms == 0 {
            return Err(BalancerError::config("retry_interval_ms must be greater than 0"));
        }
        if self.virtual_nodes == 0 {
            return Err(BalancerError::config("virtual_nodes must be greater than 0"));
        }
        if self.default_weight < 0 {
            return Err(BalancerError::config("default_weight must not be negative"));
        }
        if self.scheme.is_empty() {
            return Err(BalancerError::config("scheme must not be empty"));
        }
        Ok(())
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
