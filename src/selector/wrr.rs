//! 平滑加权轮询
//!
//! 每次选择时所有候选节点的当前权重加上各自的有效权重，取当前权重最大者，
//! 再从胜出者的当前权重中减去总权重。选择序列按权重交错分布，不会出现连续命中同一节点的突发。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use super::balancer::Balancer;
use super::context::PickContext;
use super::weighted::WeightedNode;
use crate::error::{BalancerError, Result};

/// 平滑加权轮询
///
/// 当前权重按地址保存。快照替换时（`Balancer::update`）清理已下线地址的状态，
/// 因此表的大小只随当前快照的节点数增长；同一地址下线后重新上线从 0 开始累积。
/// 权重按 `i128` 累加，任意非负 `i64` 权重都不会溢出。
#[derive(Default)]
pub struct WrrBalancer {
    current_weight: Mutex<HashMap<String, i128>>,
}

impl WrrBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前权重（用于观测）
    pub fn current_weight(&self, address: &str) -> Option<i128> {
        let weights = self
            .current_weight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        weights.get(address).copied()
    }
}

impl Balancer for WrrBalancer {
    fn name(&self) -> &'static str {
        "wrr"
    }

    fn update(&self, nodes: &[Arc<dyn WeightedNode>]) {
        let live: HashSet<&str> = nodes.iter().map(|n| n.address()).collect();
        let mut weights = self
            .current_weight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        weights.retain(|address, _| live.contains(address.as_str()));
    }

    fn pick(
        &self,
        _ctx: &PickContext,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<Arc<dyn WeightedNode>> {
        if nodes.is_empty() {
            return Err(BalancerError::NoAvailableNode);
        }

        let mut weights = self
            .current_weight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut total_weight: i128 = 0;
        let mut selected: Option<(&Arc<dyn WeightedNode>, i128)> = None;

        for node in nodes {
            let weight = i128::from(node.weight().max(0));
            total_weight += weight;

            let current = weights.entry(node.address().to_string()).or_insert(0);
            *current += weight;

            match selected {
                Some((_, best)) if best >= *current => {}
                _ => selected = Some((node, *current)),
            }
        }

        let (node, best) = selected.ok_or(BalancerError::NoAvailableNode)?;
        weights.insert(node.address().to_string(), best - total_weight);

        Ok(node.clone())
    }
}
