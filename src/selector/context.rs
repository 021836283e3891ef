//! 单次选择的上下文

use std::collections::HashMap;

/// 单次 `pick` 调用携带的上下文
///
/// 过滤器从中读取路由信息（如区域、灰度标记），一致性哈希从中读取哈希键
#[derive(Debug, Clone, Default)]
pub struct PickContext {
    hash_key: Option<String>,
    metadata: HashMap<String, String>,
}

impl PickContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置一致性哈希使用的键
    pub fn with_hash_key(mut self, key: impl Into<String>) -> Self {
        self.hash_key = Some(key.into());
        self
    }

    /// 添加请求元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn hash_key(&self) -> Option<&str> {
        self.hash_key.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
