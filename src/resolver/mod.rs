//! 服务解析
//!
//! 把注册中心的成员列表持续同步到节点集合和 RPC 框架的连接管理器

pub mod discovery;
pub mod endpoint;
pub mod sink;
pub mod subset;
pub mod target;

pub use discovery::{DiscoveryResolver, ResolverBuilder};
pub use endpoint::{is_secure, parse_endpoint, scheme_for};
pub use sink::{Address, BalanceChannelSink, FanoutSink, NodeSetSink, ResolverState, StateSink};
pub use subset::{ShuffleSubset, Subset};
pub use target::Target;
