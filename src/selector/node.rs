//! 节点抽象

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::registry::Service;

/// 一个已发现后端实例的抽象
pub trait Node: Send + Sync + fmt::Debug {
    /// 传输协议，如 `grpc`
    fn scheme(&self) -> &str;

    /// 地址（`host:port`），在同一快照内唯一
    fn address(&self) -> &str;

    /// 服务名
    fn service_name(&self) -> &str;

    /// 权重提示，`None` 表示由 `WeightedNodeBuilder` 使用默认值
    fn initial_weight(&self) -> Option<i64>;

    /// 版本
    fn version(&self) -> &str;

    /// 元数据
    fn metadata(&self) -> &HashMap<String, String>;

    /// 原始服务实例
    fn service(&self) -> &Arc<Service>;
}

/// 基于 `Service` 的默认节点实现
#[derive(Debug, Clone)]
pub struct DefaultNode {
    scheme: String,
    address: String,
    weight: Option<i64>,
    service: Arc<Service>,
}

impl DefaultNode {
    /// 创建新的节点，权重从 `metadata["weight"]` 读取
    pub fn new(scheme: impl Into<String>, address: impl Into<String>, service: Arc<Service>) -> Self {
        Self {
            scheme: scheme.into(),
            address: address.into(),
            weight: service.weight(),
            service,
        }
    }
}

impl Node for DefaultNode {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn service_name(&self) -> &str {
        &self.service.name
    }

    fn initial_weight(&self) -> Option<i64> {
        self.weight
    }

    fn version(&self) -> &str {
        &self.service.version
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.service.metadata
    }

    fn service(&self) -> &Arc<Service> {
        &self.service
    }
}
