//! 负载均衡客户端
//!
//! 把服务发现、解析器、节点集合和选择算法组装在一起。选择算法在构建时注入，
//! 多个客户端实例之间互不影响。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::config::{BalancerConfig, LoadBalanceStrategy};
use crate::error::{BalancerError, Result};
use crate::registry::Discovery;
use crate::resolver::sink::endpoint_uri;
use crate::resolver::{DiscoveryResolver, NodeSetSink, ResolverBuilder, StateSink, Target};
use crate::selector::{
    Balancer, DefaultWeightedBuilder, NodeFilter, NodeSet, PickContext, WeightedNode,
    WeightedNodeBuilder,
};

/// 客户端构建器
pub struct BalancedClientBuilder {
    discovery: Option<Arc<dyn Discovery>>,
    target: Option<String>,
    config: BalancerConfig,
    balancer: Option<Arc<dyn Balancer>>,
    node_builder: Option<Arc<dyn WeightedNodeBuilder>>,
    filters: Vec<Arc<dyn NodeFilter>>,
    extra_sinks: Vec<Arc<dyn StateSink>>,
    connect_timeout: Duration,
    timeout: Duration,
}

impl BalancedClientBuilder {
    pub fn new() -> Self {
        Self {
            discovery: None,
            target: None,
            config: BalancerConfig::default(),
            balancer: None,
            node_builder: None,
            filters: Vec::new(),
            extra_sinks: Vec::new(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }

    /// 服务发现后端
    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// 目标，如 `discovery:///order`
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn config(mut self, config: BalancerConfig) -> Self {
        self.config = config;
        self
    }

    /// 选择算法策略（未显式设置 `balancer` 时生效）
    pub fn strategy(mut self, strategy: LoadBalanceStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// 直接注入选择算法实例
    pub fn balancer(mut self, balancer: Arc<dyn Balancer>) -> Self {
        self.balancer = Some(balancer);
        self
    }

    /// 替换权重构建器
    pub fn node_builder(mut self, builder: Arc<dyn WeightedNodeBuilder>) -> Self {
        self.node_builder = Some(builder);
        self
    }

    /// 注册默认过滤器
    pub fn filter(mut self, filter: Arc<dyn NodeFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// 额外的地址接收方（如 `BalanceChannelSink`）
    pub fn sink(mut self, sink: Arc<dyn StateSink>) -> Self {
        self.extra_sinks.push(sink);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 构建客户端，首次服务发现超时直接返回错误
    pub async fn build(self) -> Result<BalancedClient> {
        self.config.validate()?;
        let discovery = self
            .discovery
            .ok_or_else(|| BalancerError::config("discovery is required"))?;
        let target = self
            .target
            .ok_or_else(|| BalancerError::config("target is required"))?;
        let target = Target::parse(&target)?;

        let balancer = self
            .balancer
            .unwrap_or_else(|| self.config.strategy.build(self.config.virtual_nodes));
        let node_builder = self
            .node_builder
            .unwrap_or_else(|| Arc::new(DefaultWeightedBuilder::new(self.config.default_weight)));

        let mut node_set = NodeSet::new(balancer).with_node_builder(node_builder);
        for filter in self.filters {
            node_set = node_set.with_filter(filter);
        }
        let node_set = Arc::new(node_set);

        let node_set_sink: Arc<dyn StateSink> = Arc::new(NodeSetSink::new(node_set.clone()));
        let sink: Arc<dyn StateSink> = if self.extra_sinks.is_empty() {
            node_set_sink
        } else {
            let mut sinks = vec![node_set_sink];
            sinks.extend(self.extra_sinks);
            Arc::new(crate::resolver::FanoutSink::new(sinks))
        };

        let resolver = ResolverBuilder::from_config(discovery, &self.config)
            .build(&target, sink)
            .await?;

        Ok(BalancedClient {
            node_set,
            resolver,
            channels: Mutex::new(HashMap::new()),
            secure: !self.config.insecure,
            connect_timeout: self.connect_timeout,
            timeout: self.timeout,
        })
    }
}

impl Default for BalancedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 负载均衡客户端
pub struct BalancedClient {
    node_set: Arc<NodeSet>,
    resolver: DiscoveryResolver,
    // Channel 缓存：address -> Channel
    channels: Mutex<HashMap<String, Channel>>,
    secure: bool,
    connect_timeout: Duration,
    timeout: Duration,
}

impl BalancedClient {
    pub fn builder() -> BalancedClientBuilder {
        BalancedClientBuilder::new()
    }

    /// 选择一个节点
    pub fn pick(&self, ctx: &PickContext) -> Result<Arc<dyn WeightedNode>> {
        self.node_set.pick(ctx, &[])
    }

    /// 使用调用方过滤器选择节点
    pub fn pick_with(
        &self,
        ctx: &PickContext,
        filters: &[Arc<dyn NodeFilter>],
    ) -> Result<Arc<dyn WeightedNode>> {
        self.node_set.pick(ctx, filters)
    }

    /// 选择节点并返回其 Channel
    pub fn channel(&self, ctx: &PickContext) -> Result<(Arc<dyn WeightedNode>, Channel)> {
        let node = self.pick(ctx)?;
        let channel = self.channel_for(node.as_ref())?;
        Ok((node, channel))
    }

    /// 获取节点的 Channel，首次访问时惰性创建并缓存
    ///
    /// 需要在 tokio 运行时中调用
    pub fn channel_for(&self, node: &dyn WeightedNode) -> Result<Channel> {
        let address = node.address();
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(channel) = channels.get(address) {
            return Ok(channel.clone());
        }

        // 清理已不在快照中的地址
        let snapshot = self.node_set.nodes();
        channels.retain(|addr, _| snapshot.iter().any(|n| n.address() == addr.as_str()));

        let endpoint = Endpoint::from_shared(endpoint_uri(address, node.service(), self.secure))
            .map_err(|e| BalancerError::invalid_endpoint(address, e.to_string()))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout);
        let channel = endpoint.connect_lazy();
        debug!(address = %address, "created channel");

        channels.insert(address.to_string(), channel.clone());
        Ok(channel)
    }

    /// 已缓存的 Channel 数量
    pub fn cached_channels(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn node_set(&self) -> &Arc<NodeSet> {
        &self.node_set
    }

    pub fn resolver(&self) -> &DiscoveryResolver {
        &self.resolver
    }

    /// 关闭解析器
    pub async fn close(&self) -> Result<()> {
        self.resolver.close().await
    }
}
