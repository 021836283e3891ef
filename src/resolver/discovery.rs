//! 基于服务发现的解析器
//!
//! `build` 在有界超时内完成首次 `discover`，之后由一个后台任务循环调用
//! `Watcher::list`，把校验、去重、子集选择后的地址推送给 `StateSink`。

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::endpoint::{parse_endpoint, scheme_for};
use super::sink::{Address, ResolverState, StateSink};
use super::subset::{ShuffleSubset, Subset};
use super::target::Target;
use crate::config::BalancerConfig;
use crate::error::{BalancerError, Result};
use crate::registry::{Discovery, Service, Watcher};

/// 解析器构建器
pub struct ResolverBuilder {
    discovery: Arc<dyn Discovery>,
    timeout: Duration,
    retry_interval: Duration,
    insecure: bool,
    scheme: String,
    subset: Option<Arc<dyn Subset>>,
    debug_log: bool,
}

impl ResolverBuilder {
    /// 使用默认配置创建
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self::from_config(discovery, &BalancerConfig::default())
    }

    /// 从配置创建
    pub fn from_config(discovery: Arc<dyn Discovery>, config: &BalancerConfig) -> Self {
        let subset: Option<Arc<dyn Subset>> = if config.subset_size > 0 {
            Some(match &config.subset_key {
                Some(key) => Arc::new(ShuffleSubset::new(key.clone(), config.subset_size)),
                None => Arc::new(ShuffleSubset::with_random_key(config.subset_size)),
            })
        } else {
            None
        };

        Self {
            discovery,
            timeout: config.discovery_timeout(),
            retry_interval: config.retry_interval(),
            insecure: config.insecure,
            scheme: config.scheme.clone(),
            subset,
            debug_log: config.debug_log,
        }
    }

    /// 启动阶段服务发现超时
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `list()` 失败后的固定重试间隔
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// 传输协议基础名
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// 设置子集选择策略
    pub fn subset(mut self, subset: Arc<dyn Subset>) -> Self {
        self.subset = Some(subset);
        self
    }

    pub fn debug_log(mut self, enabled: bool) -> Self {
        self.debug_log = enabled;
        self
    }

    /// 端点需要匹配的协议名
    pub fn expected_scheme(&self) -> String {
        scheme_for(&self.scheme, !self.insecure)
    }

    /// 创建解析器并启动后台 watch 任务
    ///
    /// 首次 `discover` 超时返回 `DiscoveryTimeout`，调用方应视为建连失败
    pub async fn build(&self, target: &Target, sink: Arc<dyn StateSink>) -> Result<DiscoveryResolver> {
        let name = target.endpoint();
        let watcher = match tokio::time::timeout(self.timeout, self.discovery.discover(name)).await {
            Ok(Ok(watcher)) => watcher,
            Ok(Err(e)) if e.is_canceled() => {
                warn!(service = %name, "discovery watcher creation canceled");
                return Err(BalancerError::Canceled);
            }
            Ok(Err(e)) => {
                error!(service = %name, error = %e, "failed to create discovery watcher");
                return Err(BalancerError::Discovery(e.to_string()));
            }
            Err(_) => {
                error!(service = %name, timeout = ?self.timeout, "discovery watcher creation timed out");
                return Err(BalancerError::DiscoveryTimeout {
                    target: target.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let inner = Arc::new(ResolverInner {
            service: name.to_string(),
            watcher: Arc::from(watcher),
            sink,
            scheme: self.expected_scheme(),
            subset: self.subset.clone(),
            debug_log: self.debug_log,
            retry_interval: self.retry_interval,
        });

        let cancel = CancellationToken::new();
        tokio::spawn(inner.clone().watch(cancel.clone()));
        info!(service = %name, scheme = %inner.scheme, "resolver started");

        Ok(DiscoveryResolver {
            inner,
            cancel,
            closed: AtomicBool::new(false),
        })
    }
}

struct ResolverInner {
    service: String,
    watcher: Arc<dyn Watcher>,
    sink: Arc<dyn StateSink>,
    scheme: String,
    subset: Option<Arc<dyn Subset>>,
    debug_log: bool,
    retry_interval: Duration,
}

impl ResolverInner {
    async fn watch(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = self.watcher.list() => result,
            };

            match result {
                Ok(services) => {
                    self.update(services).await;
                }
                Err(e) if e.is_canceled() => {
                    info!(service = %self.service, "watcher canceled, stopping resolver loop");
                    return;
                }
                Err(e) => {
                    // 固定间隔重试，不做指数退避
                    error!(service = %self.service, error = %e, "failed to watch discovery endpoint");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.retry_interval) => {}
                    }
                }
            }
        }
    }

    /// 发布一次成员变化，返回是否真正推送
    async fn update(&self, services: Vec<Service>) -> bool {
        let total = services.len();
        let dump = if self.debug_log {
            serde_json::to_string(&services).ok()
        } else {
            None
        };

        let mut seen = HashSet::with_capacity(total);
        let mut addresses = Vec::with_capacity(total);
        for service in services {
            let addr = match parse_endpoint(&service.endpoint, &self.scheme) {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(service = %self.service, instance = %service.id, error = %e, "dropping invalid endpoint");
                    continue;
                }
            };
            if !seen.insert(addr.clone()) {
                continue;
            }
            addresses.push(Address::new(self.scheme.clone(), addr, Arc::new(service)));
        }

        if let Some(subset) = &self.subset {
            addresses = subset.select(addresses);
        }

        if addresses.is_empty() {
            warn!(service = %self.service, instances = total, "zero endpoint found, refused to write");
            return false;
        }

        let published = addresses.len();
        self.sink.update_state(ResolverState { addresses }).await;

        if let Some(dump) = dump {
            info!(service = %self.service, published, instances = %dump, "update instances");
        }
        true
    }
}

/// 解析器句柄
///
/// 丢弃句柄同样会停止后台任务
pub struct DiscoveryResolver {
    inner: Arc<ResolverInner>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl DiscoveryResolver {
    /// 服务名
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// 立即重新解析
    ///
    /// watch 模式下成员变化由 watcher 推送，这里无需做任何事
    pub fn resolve_now(&self) {}

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 停止 watch 循环并停止 watcher，可重复调用
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.cancel.cancel();
        let result = self.inner.watcher.stop().await;
        info!(service = %self.inner.service, "resolver closed");
        result.map_err(|e| {
            if e.is_canceled() {
                BalancerError::Canceled
            } else {
                BalancerError::Discovery(e.to_string())
            }
        })
    }
}

impl Drop for DiscoveryResolver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
