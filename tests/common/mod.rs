//! 集成测试公共工具

#![allow(dead_code)]

use async_trait::async_trait;
use flare_balancer::registry::Service;
use flare_balancer::resolver::{ResolverState, StateSink};
use flare_balancer::selector::{DefaultNode, DefaultWeightedBuilder, Node, WeightedNode, WeightedNodeBuilder};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// 初始化测试日志，重复调用无副作用
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// 创建 `grpc://` 端点的服务实例
pub fn service(id: &str, addr: &str) -> Service {
    Service::new(id, "order", format!("grpc://{addr}?isSecure=false"))
}

/// 创建带权重的服务实例
pub fn weighted_service(id: &str, addr: &str, weight: i64) -> Service {
    service(id, addr).with_weight(weight)
}

pub fn node(service: Service) -> Arc<dyn Node> {
    let addr = service
        .endpoint
        .trim_start_matches("grpc://")
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string();
    Arc::new(DefaultNode::new("grpc", addr, Arc::new(service)))
}

pub fn weighted(service: Service) -> Arc<dyn WeightedNode> {
    DefaultWeightedBuilder::default().build(node(service))
}

/// 记录每次推送的接收方
#[derive(Default)]
pub struct RecordingSink {
    states: Mutex<Vec<Vec<String>>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 已收到的推送，每次推送为排序后的地址列表
    pub fn updates(&self) -> Vec<Vec<String>> {
        self.states.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Vec<String>> {
        self.states.lock().unwrap().last().cloned()
    }

    /// 等待推送次数达到 `count`
    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for resolver update");
    }
}

#[async_trait]
impl StateSink for RecordingSink {
    async fn update_state(&self, state: ResolverState) {
        let mut addrs: Vec<String> = state.addresses.into_iter().map(|a| a.addr).collect();
        addrs.sort();
        self.states.lock().unwrap().push(addrs);
        self.notify.notify_waiters();
    }
}
