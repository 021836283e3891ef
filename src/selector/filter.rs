//! 节点过滤器
//!
//! 过滤器按注册顺序依次执行，只能缩小候选集，不修改节点本身。
//! 这里只提供两个可选的辅助实现，区域亲和、灰度路由等策略由调用方自行实现。

use std::sync::Arc;

use super::context::PickContext;
use super::weighted::WeightedNode;

/// 节点过滤器
pub trait NodeFilter: Send + Sync {
    fn filter(
        &self,
        ctx: &PickContext,
        nodes: Vec<Arc<dyn WeightedNode>>,
    ) -> Vec<Arc<dyn WeightedNode>>;
}

impl<F> NodeFilter for F
where
    F: Fn(&PickContext, Vec<Arc<dyn WeightedNode>>) -> Vec<Arc<dyn WeightedNode>> + Send + Sync,
{
    fn filter(
        &self,
        ctx: &PickContext,
        nodes: Vec<Arc<dyn WeightedNode>>,
    ) -> Vec<Arc<dyn WeightedNode>> {
        self(ctx, nodes)
    }
}

/// 把闭包包装成过滤器
pub fn filter_fn<F>(f: F) -> Arc<dyn NodeFilter>
where
    F: Fn(&PickContext, Vec<Arc<dyn WeightedNode>>) -> Vec<Arc<dyn WeightedNode>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// 只保留指定版本的节点
pub fn version_filter(version: impl Into<String>) -> Arc<dyn NodeFilter> {
    let version = version.into();
    filter_fn(move |_ctx, nodes| {
        nodes
            .into_iter()
            .filter(|node| node.version() == version)
            .collect()
    })
}

/// 按元数据过滤
///
/// `value` 为 `None` 时只检查键是否存在
pub fn metadata_filter(key: impl Into<String>, value: Option<String>) -> Arc<dyn NodeFilter> {
    let key = key.into();
    filter_fn(move |_ctx, nodes| {
        nodes
            .into_iter()
            .filter(|node| match &value {
                Some(expected) => node.metadata().get(&key) == Some(expected),
                None => node.metadata().contains_key(&key),
            })
            .collect()
    })
}
