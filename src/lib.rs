//! Flare Balancer
//!
//! Client-side service discovery resolution and load balancing for outbound RPC calls:
//! a discovery watch loop keeps an in-process node set in sync with the registry, and
//! pluggable pickers (random, smooth weighted round robin, consistent hash) choose a node
//! per call after an optional filter chain.

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod selector;

// Re-exports
pub use client::{BalancedClient, BalancedClientBuilder};
pub use config::{BalancerConfig, LoadBalanceStrategy};
pub use error::{BalancerError, ErrorCategory, ErrorCode, Result};
pub use registry::{Discovery, MemoryRegistry, RegistryError, Service, Watcher};
pub use resolver::{
    Address, BalanceChannelSink, DiscoveryResolver, NodeSetSink, ResolverBuilder, ResolverState,
    ShuffleSubset, StateSink, Subset, Target,
};
pub use selector::{
    Balancer, ConsistentHashBalancer, DefaultNode, DefaultWeightedBuilder, HashRing, Node,
    NodeFilter, NodeSet, PickContext, RandomBalancer, WeightedNode, WeightedNodeBuilder,
    WrrBalancer,
};
