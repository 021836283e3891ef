//! 一致性哈希选择

use std::collections::HashSet;
use std::sync::Arc;

use super::balancer::Balancer;
use super::context::PickContext;
use super::random::RandomBalancer;
use super::ring::{HashRing, DEFAULT_REPLICAS};
use super::weighted::WeightedNode;
use crate::error::{BalancerError, Result};

/// 按 `PickContext::hash_key` 在哈希环上选择节点
///
/// 环成员只在快照替换时（`Balancer::update`）按地址同步，`pick` 只读环：
/// 从键的位置顺时针找到第一个属于本次候选集的节点，过滤后的候选集与完整快照并发选择时
/// 同一个键总是得到相同的结果。请求没有哈希键时退化为随机选择。
pub struct ConsistentHashBalancer {
    ring: HashRing<String>,
    fallback: RandomBalancer,
}

impl ConsistentHashBalancer {
    pub fn new() -> Self {
        Self::with_replicas(DEFAULT_REPLICAS)
    }

    pub fn with_replicas(replicas: usize) -> Self {
        Self {
            ring: HashRing::with_replicas(replicas),
            fallback: RandomBalancer::new(),
        }
    }

    /// 底层哈希环
    pub fn ring(&self) -> &HashRing<String> {
        &self.ring
    }
}

impl Default for ConsistentHashBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer for ConsistentHashBalancer {
    fn name(&self) -> &'static str {
        "consistent_hash"
    }

    fn update(&self, nodes: &[Arc<dyn WeightedNode>]) {
        let addresses: Vec<String> = nodes.iter().map(|n| n.address().to_string()).collect();
        self.ring.reconcile(&addresses);
    }

    fn pick(
        &self,
        ctx: &PickContext,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<Arc<dyn WeightedNode>> {
        if nodes.is_empty() {
            return Err(BalancerError::NoAvailableNode);
        }

        let Some(key) = ctx.hash_key() else {
            return self.fallback.pick(ctx, nodes);
        };

        let candidates: HashSet<&str> = nodes.iter().map(|n| n.address()).collect();
        let selected = self
            .ring
            .get_where(key, |address| candidates.contains(address.as_str()))
            .and_then(|address| nodes.iter().find(|n| n.address() == address));

        match selected {
            Some(node) => Ok(node.clone()),
            // 候选节点都不在环上（尚未通过 update 同步）
            None => self.fallback.pick(ctx, nodes),
        }
    }
}
