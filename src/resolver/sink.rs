//! 地址列表的发布目标
//!
//! 解析器把过滤后的地址推送给 `StateSink`，节点集合和 tonic 的连接管理器都通过它接收更新

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tonic::transport::channel::Change;
use tonic::transport::{Channel, Endpoint};
use tracing::warn;

use super::endpoint::is_secure;
use crate::error::{BalancerError, Result};
use crate::registry::Service;
use crate::selector::{DefaultNode, Node, NodeSet};

/// 解析出的单个地址
#[derive(Debug, Clone)]
pub struct Address {
    /// 传输协议
    pub scheme: String,
    /// `host:port`
    pub addr: String,
    /// 原始服务实例，供后续读取权重和元数据
    pub service: Arc<Service>,
}

impl Address {
    pub fn new(scheme: impl Into<String>, addr: impl Into<String>, service: Arc<Service>) -> Self {
        Self {
            scheme: scheme.into(),
            addr: addr.into(),
            service,
        }
    }
}

/// 一次发布的完整地址列表
#[derive(Debug, Clone, Default)]
pub struct ResolverState {
    pub addresses: Vec<Address>,
}

/// 地址列表接收方
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn update_state(&self, state: ResolverState);
}

/// 把地址列表写入 `NodeSet`
pub struct NodeSetSink {
    node_set: Arc<NodeSet>,
}

impl NodeSetSink {
    pub fn new(node_set: Arc<NodeSet>) -> Self {
        Self { node_set }
    }
}

#[async_trait]
impl StateSink for NodeSetSink {
    async fn update_state(&self, state: ResolverState) {
        let nodes: Vec<Arc<dyn Node>> = state
            .addresses
            .into_iter()
            .map(|a| Arc::new(DefaultNode::new(a.scheme, a.addr, a.service)) as Arc<dyn Node>)
            .collect();
        self.node_set.save(nodes);
    }
}

/// 同时发布到多个接收方
pub struct FanoutSink {
    sinks: Vec<Arc<dyn StateSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn StateSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl StateSink for FanoutSink {
    async fn update_state(&self, state: ResolverState) {
        for sink in &self.sinks {
            sink.update_state(state.clone()).await;
        }
    }
}

/// 把地址列表转换为 `tonic::transport::channel::Change` 事件，驱动 tonic 的负载均衡 Channel
///
/// 内部记录已插入的地址，每次更新只发送增量
pub struct BalanceChannelSink {
    tx: mpsc::Sender<Change<String, Endpoint>>,
    secure: bool,
    connect_timeout: Option<Duration>,
    active: Mutex<HashSet<String>>,
}

impl BalanceChannelSink {
    /// 创建 tonic 负载均衡 Channel 及其更新器
    pub fn new(capacity: usize, secure: bool) -> (Channel, Self) {
        let (channel, tx) = Channel::balance_channel::<String>(capacity);
        (
            channel,
            Self {
                tx,
                secure,
                connect_timeout: None,
                active: Mutex::new(HashSet::new()),
            },
        )
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn endpoint(&self, address: &Address) -> Result<Endpoint> {
        let uri = endpoint_uri(&address.addr, &address.service, self.secure);
        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| BalancerError::invalid_endpoint(&address.addr, e.to_string()))?;
        Ok(match self.connect_timeout {
            Some(timeout) => endpoint.connect_timeout(timeout),
            None => endpoint,
        })
    }
}

#[async_trait]
impl StateSink for BalanceChannelSink {
    async fn update_state(&self, state: ResolverState) {
        let mut active = self.active.lock().await;
        let next: HashSet<String> = state.addresses.iter().map(|a| a.addr.clone()).collect();

        let removed: Vec<String> = active.difference(&next).cloned().collect();
        for addr in removed {
            if self.tx.send(Change::Remove(addr.clone())).await.is_err() {
                warn!("balance channel closed, dropping update");
                return;
            }
            active.remove(&addr);
        }

        for address in state.addresses {
            if active.contains(&address.addr) {
                continue;
            }
            let endpoint = match self.endpoint(&address) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!(address = %address.addr, error = %e, "skipping endpoint");
                    continue;
                }
            };
            if self
                .tx
                .send(Change::Insert(address.addr.clone(), endpoint))
                .await
                .is_err()
            {
                warn!("balance channel closed, dropping update");
                return;
            }
            active.insert(address.addr);
        }
    }
}

/// `host:port` 转换为 tonic 可用的 URI
///
/// 客户端强制加密，或实例端点声明了 `isSecure=true` 时使用 https
pub(crate) fn endpoint_uri(addr: &str, service: &Service, secure: bool) -> String {
    if secure || is_secure(&service.endpoint) {
        format!("https://{addr}")
    } else {
        format!("http://{addr}")
    }
}
