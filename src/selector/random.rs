//! 随机选择

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

use super::balancer::Balancer;
use super::context::PickContext;
use super::weighted::WeightedNode;
use crate::error::{BalancerError, Result};

/// 均匀随机选择
pub struct RandomBalancer {
    rng: Mutex<StdRng>,
}

impl RandomBalancer {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// 使用固定种子，结果可复现
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub(crate) fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..len)
    }
}

impl Default for RandomBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer for RandomBalancer {
    fn name(&self) -> &'static str {
        "random"
    }

    fn pick(
        &self,
        _ctx: &PickContext,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<Arc<dyn WeightedNode>> {
        if nodes.is_empty() {
            return Err(BalancerError::NoAvailableNode);
        }
        Ok(nodes[self.pick_index(nodes.len())].clone())
    }
}
