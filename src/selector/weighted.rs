//! 带权重的节点

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::node::Node;
use crate::registry::Service;

/// 未声明权重时使用的默认值
pub const DEFAULT_WEIGHT: i64 = 100;

/// 带有效权重的节点
pub trait WeightedNode: Node {
    /// 原始节点
    fn raw(&self) -> &Arc<dyn Node>;

    /// 有效权重，不小于 0
    fn weight(&self) -> i64;
}

/// 把 `Node` 转换为 `WeightedNode`
///
/// 每次刷新时在 `NodeSet::save` 中对每个节点调用一次，可替换为基于延迟等指标的实现
pub trait WeightedNodeBuilder: Send + Sync {
    fn build(&self, node: Arc<dyn Node>) -> Arc<dyn WeightedNode>;
}

/// 默认构建器：使用 `initial_weight()`，缺失时使用固定默认值
#[derive(Debug, Clone, Copy)]
pub struct DefaultWeightedBuilder {
    default_weight: i64,
}

impl DefaultWeightedBuilder {
    pub fn new(default_weight: i64) -> Self {
        Self {
            default_weight: default_weight.max(0),
        }
    }
}

impl Default for DefaultWeightedBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl WeightedNodeBuilder for DefaultWeightedBuilder {
    fn build(&self, node: Arc<dyn Node>) -> Arc<dyn WeightedNode> {
        let weight = node
            .initial_weight()
            .filter(|w| *w >= 0)
            .unwrap_or(self.default_weight);
        Arc::new(StaticWeightedNode { node, weight })
    }
}

/// 权重固定的节点
struct StaticWeightedNode {
    node: Arc<dyn Node>,
    weight: i64,
}

impl fmt::Debug for StaticWeightedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightedNode")
            .field("address", &self.node.address())
            .field("weight", &self.weight)
            .finish()
    }
}

impl Node for StaticWeightedNode {
    fn scheme(&self) -> &str {
        self.node.scheme()
    }

    fn address(&self) -> &str {
        self.node.address()
    }

    fn service_name(&self) -> &str {
        self.node.service_name()
    }

    fn initial_weight(&self) -> Option<i64> {
        self.node.initial_weight()
    }

    fn version(&self) -> &str {
        self.node.version()
    }

    fn metadata(&self) -> &HashMap<String, String> {
        self.node.metadata()
    }

    fn service(&self) -> &Arc<Service> {
        self.node.service()
    }
}

impl WeightedNode for StaticWeightedNode {
    fn raw(&self) -> &Arc<dyn Node> {
        &self.node
    }

    fn weight(&self) -> i64 {
        self.weight
    }
}
