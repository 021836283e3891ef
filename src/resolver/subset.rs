//! 子集选择
//!
//! 每个客户端只使用发现结果中的一部分节点，限制连接扇出

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use xxhash_rust::xxh3::xxh3_64;

use super::sink::Address;

/// 子集选择策略
pub trait Subset: Send + Sync {
    fn select(&self, addresses: Vec<Address>) -> Vec<Address>;
}

/// 打乱后截断
///
/// 先按实例 ID 排序再用选择键作为种子打乱，同一个键在成员不变时得到相同的子集，
/// 不同客户端（不同的键）之间分散到不同节点
#[derive(Debug, Clone)]
pub struct ShuffleSubset {
    select_key: String,
    size: usize,
}

impl ShuffleSubset {
    pub fn new(select_key: impl Into<String>, size: usize) -> Self {
        Self {
            select_key: select_key.into(),
            size,
        }
    }

    /// 使用随机选择键
    pub fn with_random_key(size: usize) -> Self {
        Self::new(format!("{:016x}", rand::random::<u64>()), size)
    }

    pub fn select_key(&self) -> &str {
        &self.select_key
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Subset for ShuffleSubset {
    fn select(&self, mut addresses: Vec<Address>) -> Vec<Address> {
        if self.size == 0 || addresses.len() <= self.size {
            return addresses;
        }

        addresses.sort_by(|a, b| {
            a.service
                .id
                .cmp(&b.service.id)
                .then_with(|| a.addr.cmp(&b.addr))
        });
        let mut rng = StdRng::seed_from_u64(xxh3_64(self.select_key.as_bytes()));
        addresses.shuffle(&mut rng);
        addresses.truncate(self.size);
        addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Service;
    use std::sync::Arc;

    fn addresses(n: usize) -> Vec<Address> {
        (0..n)
            .map(|i| {
                let endpoint = format!("grpc://10.0.0.{i}:9000");
                let service = Service::new(format!("node-{i:02}"), "order", endpoint);
                Address::new("grpc", format!("10.0.0.{i}:9000"), Arc::new(service))
            })
            .collect()
    }

    fn addrs(selected: &[Address]) -> Vec<String> {
        selected.iter().map(|a| a.addr.clone()).collect()
    }

    #[test]
    fn test_subset_truncates_to_size() {
        let subset = ShuffleSubset::new("client-a", 3);
        assert_eq!(subset.select(addresses(10)).len(), 3);
        assert_eq!(subset.select(addresses(2)).len(), 2);
    }

    #[test]
    fn test_subset_is_stable_regardless_of_input_order() {
        let subset = ShuffleSubset::new("client-a", 4);
        let first = subset.select(addresses(12));
        let mut reversed = addresses(12);
        reversed.reverse();
        let second = subset.select(reversed);
        assert_eq!(addrs(&first), addrs(&second));
    }

    #[test]
    fn test_zero_size_disables_subset() {
        let subset = ShuffleSubset::new("client-a", 0);
        assert_eq!(subset.select(addresses(10)).len(), 10);
    }
}
