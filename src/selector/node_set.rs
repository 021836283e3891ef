//! 节点集合与选择入口
//!
//! 单写者（解析器 watch 循环）整体替换快照，多读者（每个出站调用）并发 `pick`。
//! 读取只克隆一个 `Arc`，不会被刷新阻塞在网络调用上。

use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use super::balancer::Balancer;
use super::context::PickContext;
use super::filter::NodeFilter;
use super::node::Node;
use super::weighted::{DefaultWeightedBuilder, WeightedNode, WeightedNodeBuilder};
use crate::error::{BalancerError, Result};

type Snapshot = Arc<Vec<Arc<dyn WeightedNode>>>;

/// 当前节点快照 + 过滤器链 + 选择算法
pub struct NodeSet {
    nodes: RwLock<Snapshot>,
    builder: Arc<dyn WeightedNodeBuilder>,
    balancer: Arc<dyn Balancer>,
    filters: Vec<Arc<dyn NodeFilter>>,
}

impl NodeSet {
    /// 使用指定选择算法创建空集合
    pub fn new(balancer: Arc<dyn Balancer>) -> Self {
        Self {
            nodes: RwLock::new(Arc::new(Vec::new())),
            builder: Arc::new(DefaultWeightedBuilder::default()),
            balancer,
            filters: Vec::new(),
        }
    }

    /// 替换权重构建器
    pub fn with_node_builder(mut self, builder: Arc<dyn WeightedNodeBuilder>) -> Self {
        self.builder = builder;
        self
    }

    /// 注册默认过滤器，每次 `pick` 都会在调用方过滤器之前执行
    pub fn with_filter(mut self, filter: Arc<dyn NodeFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// 选择算法
    pub fn balancer(&self) -> &Arc<dyn Balancer> {
        &self.balancer
    }

    /// 整体替换节点快照
    ///
    /// 空列表不会覆盖已有快照，返回是否发生了替换
    pub fn save(&self, nodes: Vec<Arc<dyn Node>>) -> bool {
        if nodes.is_empty() {
            warn!("refusing to replace node set with an empty snapshot");
            return false;
        }

        let weighted: Vec<Arc<dyn WeightedNode>> =
            nodes.into_iter().map(|n| self.builder.build(n)).collect();
        debug!(
            balancer = self.balancer.name(),
            nodes = weighted.len(),
            "node set replaced"
        );

        let mut current = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        self.balancer.update(&weighted);
        *current = Arc::new(weighted);
        true
    }

    /// 当前快照
    pub fn nodes(&self) -> Arc<Vec<Arc<dyn WeightedNode>>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    /// 选择一个节点
    ///
    /// 依次执行默认过滤器和 `filters`。过滤结果为空时回退到未过滤的快照。
    pub fn pick(
        &self,
        ctx: &PickContext,
        filters: &[Arc<dyn NodeFilter>],
    ) -> Result<Arc<dyn WeightedNode>> {
        let snapshot = self.nodes();
        if snapshot.is_empty() {
            return Err(BalancerError::NoAvailableNode);
        }

        if self.filters.is_empty() && filters.is_empty() {
            return self.balancer.pick(ctx, &snapshot);
        }

        let mut candidates: Vec<Arc<dyn WeightedNode>> = snapshot.as_ref().clone();
        for filter in self.filters.iter().chain(filters) {
            candidates = filter.filter(ctx, candidates);
        }

        if candidates.is_empty() {
            // TODO: 与运维确认过滤器全部拒绝时是否应直接返回 NoAvailableNode
            debug!(
                nodes = snapshot.len(),
                "filters rejected every node, falling back to the unfiltered snapshot"
            );
            return self.balancer.pick(ctx, &snapshot);
        }

        self.balancer.pick(ctx, &candidates)
    }
}
