//! 一致性哈希环
//!
//! 每个真实节点在环上占 V 个虚拟位置（`hash(repr + index)`），虚拟位置按哈希值排序保存，
//! 查找时二分搜索第一个不小于 `hash(key)` 的位置，到达末尾时回绕。
//! 增删节点只影响约 `1/N` 的键。也可以单独用作分片原语。

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{PoisonError, RwLock};
use xxhash_rust::xxh3::xxh3_64;

/// 默认虚拟节点数
pub const DEFAULT_REPLICAS: usize = 32;

/// `add_with_weight` 的满权重
pub const TOP_WEIGHT: usize = 100;

/// 虚拟位置冲突时二次哈希使用的盐
const COLLISION_SALT: u32 = 16_777_619;

fn hash_bytes(data: &[u8]) -> u64 {
    xxh3_64(data)
}

/// 同一虚拟位置上有多个真实节点时，用加盐的键哈希在可用节点中确定性地选择
fn pick_in_slot<'a, T>(nodes: &'a [T], key: &str, accept: &impl Fn(&T) -> bool) -> Option<&'a T> {
    let n = nodes.iter().filter(|node| accept(*node)).count();
    match n {
        0 => None,
        1 => nodes.iter().find(|node| accept(*node)),
        n => {
            let inner = hash_bytes(format!("{COLLISION_SALT}:{key}").as_bytes());
            nodes
                .iter()
                .filter(|node| accept(*node))
                .nth((inner % n as u64) as usize)
        }
    }
}

struct RingState<T> {
    /// 有序的虚拟节点哈希
    keys: Vec<u64>,
    /// 虚拟节点哈希 -> 真实节点（冲突时多个）
    ring: HashMap<u64, Vec<T>>,
    /// 真实节点 repr -> 虚拟节点数
    members: HashMap<String, usize>,
}

impl<T: Clone + Display> RingState<T> {
    fn insert(&mut self, node: T, replicas: usize) {
        let repr = node.to_string();
        self.delete(&repr);

        for i in 0..replicas {
            let hash = hash_bytes(format!("{repr}{i}").as_bytes());
            self.keys.push(hash);
            self.ring.entry(hash).or_default().push(node.clone());
        }
        self.keys.sort_unstable();
        self.members.insert(repr, replicas);
    }

    fn delete(&mut self, repr: &str) -> bool {
        let Some(replicas) = self.members.remove(repr) else {
            return false;
        };

        for i in 0..replicas {
            let hash = hash_bytes(format!("{repr}{i}").as_bytes());
            if let Ok(index) = self.keys.binary_search(&hash) {
                self.keys.remove(index);
            }
            if let Some(nodes) = self.ring.get_mut(&hash) {
                nodes.retain(|n| n.to_string() != repr);
                if nodes.is_empty() {
                    self.ring.remove(&hash);
                }
            }
        }
        true
    }
}

/// 一致性哈希环
///
/// 一把读写锁同时保护有序数组和哈希表：`get` 持读锁，`add` / `remove` 持写锁
pub struct HashRing<T> {
    replicas: usize,
    state: RwLock<RingState<T>>,
}

impl<T: Clone + Display> HashRing<T> {
    /// 使用默认虚拟节点数创建
    pub fn new() -> Self {
        Self::with_replicas(DEFAULT_REPLICAS)
    }

    /// 指定每个节点的虚拟节点数，0 会被调整为默认值
    pub fn with_replicas(replicas: usize) -> Self {
        let replicas = if replicas == 0 { DEFAULT_REPLICAS } else { replicas };
        Self {
            replicas,
            state: RwLock::new(RingState {
                keys: Vec::new(),
                ring: HashMap::new(),
                members: HashMap::new(),
            }),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// 添加节点，已存在时先移除再重新加入
    pub fn add(&self, node: T) {
        self.add_with_replicas(node, self.replicas);
    }

    /// 以指定虚拟节点数添加，上限为环的虚拟节点数
    ///
    /// 虚拟节点数为 0 的节点无法被选中，等同于移除
    pub fn add_with_replicas(&self, node: T, replicas: usize) {
        let replicas = replicas.min(self.replicas);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if replicas == 0 {
            state.delete(&node.to_string());
            return;
        }
        state.insert(node, replicas);
    }

    /// 按权重添加，`weight` 为 `TOP_WEIGHT` 时占满虚拟节点数
    ///
    /// 非零权重至少占一个虚拟节点，权重为 0 时移除节点
    pub fn add_with_weight(&self, node: T, weight: usize) {
        let replicas = match weight {
            0 => 0,
            w => (self.replicas.saturating_mul(w) / TOP_WEIGHT).max(1),
        };
        self.add_with_replicas(node, replicas);
    }

    /// 移除节点，返回节点是否存在
    pub fn remove(&self, node: &T) -> bool {
        let repr = node.to_string();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.delete(&repr)
    }

    /// 查找负责 `key` 的节点
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_where(key, |_| true)
    }

    /// 从 `key` 的位置顺时针查找第一个满足 `accept` 的节点
    ///
    /// 只持读锁，不修改环成员。被拒绝的节点上的键落到顺时针方向的下一个可用节点，
    /// 与把这些节点从环上移除后的结果一致。
    pub fn get_where(&self, key: &str, accept: impl Fn(&T) -> bool) -> Option<T> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let len = state.keys.len();
        if len == 0 {
            return None;
        }

        let hash = hash_bytes(key.as_bytes());
        let start = state.keys.partition_point(|k| *k < hash);
        for offset in 0..len {
            let slot = state.keys[(start + offset) % len];
            let Some(nodes) = state.ring.get(&slot) else {
                continue;
            };
            if let Some(node) = pick_in_slot(nodes, key, &accept) {
                return Some(node.clone());
            }
        }
        None
    }

    /// 同步环成员：移除不在 `nodes` 中的节点，加入缺失的节点
    ///
    /// 成员未变化时只持读锁。返回是否发生了变更。
    pub fn reconcile(&self, nodes: &[T]) -> bool {
        let wanted: HashMap<String, &T> = nodes.iter().map(|n| (n.to_string(), n)).collect();
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.members.len() == wanted.len()
                && wanted.keys().all(|repr| state.members.contains_key(repr))
            {
                return false;
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<String> = state
            .members
            .keys()
            .filter(|repr| !wanted.contains_key(*repr))
            .cloned()
            .collect();
        for repr in &stale {
            state.delete(repr);
        }
        for (repr, node) in wanted {
            if !state.members.contains_key(&repr) {
                state.insert(node.clone(), self.replicas);
            }
        }
        true
    }

    /// 节点是否在环上
    pub fn contains(&self, node: &T) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.members.contains_key(&node.to_string())
    }

    /// 真实节点数
    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Display> Default for HashRing<T> {
    fn default() -> Self {
        Self::new()
    }
}
