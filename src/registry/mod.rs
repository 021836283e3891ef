//! 服务注册中心抽象
//!
//! 解析器只依赖这里定义的 `Discovery` / `Watcher` 接口，etcd、Kubernetes 等具体后端
//! 在外部实现。`MemoryRegistry` 是进程内实现，用于静态端点列表和测试。

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use memory::MemoryRegistry;

/// 权重在元数据中的键
pub const WEIGHT_METADATA_KEY: &str = "weight";

/// 服务实例快照
///
/// 由注册中心产生，从 `Watcher::list` 返回后即视为不可变
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// 实例 ID（唯一标识）
    pub id: String,

    /// 服务名
    pub name: String,

    /// 版本
    #[serde(default)]
    pub version: String,

    /// 端点，如 `grpc://127.0.0.1:9000?isSecure=false`
    pub endpoint: String,

    /// 元数据
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Service {
    /// 创建新的服务实例
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// 设置版本
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 设置权重（写入 `metadata["weight"]`）
    pub fn with_weight(self, weight: i64) -> Self {
        self.with_metadata(WEIGHT_METADATA_KEY, weight.to_string())
    }

    /// 解析元数据中的权重
    ///
    /// 缺失、无法解析或为负数时返回 `None`
    pub fn weight(&self) -> Option<i64> {
        self.metadata
            .get(WEIGHT_METADATA_KEY)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|w| *w >= 0)
    }
}

/// 注册中心错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// watch 已被取消（解析器关闭或 watcher 停止）
    #[error("watch canceled")]
    Canceled,

    /// 后端错误，解析器会按固定间隔重试
    #[error("registry backend error: {0}")]
    Backend(String),
}

impl RegistryError {
    /// 是否属于取消类错误
    pub fn is_canceled(&self) -> bool {
        matches!(self, RegistryError::Canceled)
    }
}

/// 服务发现 trait
///
/// 注意：由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait Discovery: Send + Sync {
    /// 根据服务名创建 watcher
    async fn discover(&self, name: &str) -> Result<Box<dyn Watcher>, RegistryError>;
}

/// 服务成员监听器
#[async_trait]
pub trait Watcher: Send + Sync {
    /// 获取服务实例列表
    ///
    /// 第一次调用立即返回当前列表，之后阻塞直到成员发生变化。
    /// 实现需要在 `stop` 之后返回 `RegistryError::Canceled`。
    async fn list(&self) -> Result<Vec<Service>, RegistryError>;

    /// 停止监听
    async fn stop(&self) -> Result<(), RegistryError>;
}
