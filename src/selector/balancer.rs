//! 选择算法抽象

use std::sync::Arc;

use super::consistent_hash::ConsistentHashBalancer;
use super::context::PickContext;
use super::random::RandomBalancer;
use super::weighted::WeightedNode;
use super::wrr::WrrBalancer;
use crate::config::LoadBalanceStrategy;
use crate::error::Result;

/// 从候选集中选出一个节点
///
/// 实现自行维护算法状态，`pick` 会被多个调用方并发执行。
/// 候选集为空时返回 `BalancerError::NoAvailableNode`。
pub trait Balancer: Send + Sync {
    /// 算法名称，用于日志
    fn name(&self) -> &'static str;

    /// 节点快照整体替换时调用
    ///
    /// 只由 `NodeSet::save` 这一个写者调用，`pick` 期间不会修改算法的成员状态
    fn update(&self, _nodes: &[Arc<dyn WeightedNode>]) {}

    fn pick(
        &self,
        ctx: &PickContext,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<Arc<dyn WeightedNode>>;
}

impl LoadBalanceStrategy {
    /// 创建对应的选择算法实例
    ///
    /// 每次调用都返回独立的实例，多个客户端之间不共享算法状态
    pub fn build(self, virtual_nodes: usize) -> Arc<dyn Balancer> {
        match self {
            LoadBalanceStrategy::Random => Arc::new(RandomBalancer::new()),
            LoadBalanceStrategy::WeightedRoundRobin => Arc::new(WrrBalancer::new()),
            LoadBalanceStrategy::ConsistentHash => {
                Arc::new(ConsistentHashBalancer::with_replicas(virtual_nodes))
            }
        }
    }
}
