//! 节点选择
//!
//! 节点抽象、权重、过滤器链、选择算法（随机、平滑加权轮询、一致性哈希）以及
//! 对外的 `NodeSet::pick` 入口

pub mod balancer;
pub mod consistent_hash;
pub mod context;
pub mod filter;
pub mod node;
pub mod node_set;
pub mod random;
pub mod ring;
pub mod weighted;
pub mod wrr;

pub use balancer::Balancer;
pub use consistent_hash::ConsistentHashBalancer;
pub use context::PickContext;
pub use filter::{filter_fn, metadata_filter, version_filter, NodeFilter};
pub use node::{DefaultNode, Node};
pub use node_set::NodeSet;
pub use random::RandomBalancer;
pub use ring::HashRing;
pub use weighted::{DefaultWeightedBuilder, WeightedNode, WeightedNodeBuilder, DEFAULT_WEIGHT};
pub use wrr::WrrBalancer;
