//! 解析目标
//!
//! 格式：`discovery://<authority>/<service-name>`，authority 可以为空

use std::fmt;
use std::str::FromStr;

use crate::error::{BalancerError, Result};

/// 解析目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: String,
    authority: String,
    endpoint: String,
}

impl Target {
    /// 解析目标字符串
    pub fn parse(raw: &str) -> Result<Self> {
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| BalancerError::InvalidTarget(format!("{raw}: missing scheme")))?;
        if scheme.is_empty() {
            return Err(BalancerError::InvalidTarget(format!("{raw}: empty scheme")));
        }

        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let endpoint = path.trim_matches('/');
        if endpoint.is_empty() {
            return Err(BalancerError::InvalidTarget(format!("{raw}: missing service name")));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            endpoint: endpoint.to_string(),
        })
    }

    /// 服务发现方案名，如 `discovery`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// 服务名
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FromStr for Target {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self> {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.authority, self.endpoint)
    }
}
