//! gRPC 错误处理
//!
//! 提供 BalancerError 到 tonic::Status 的转换，供调用方直接返回给 RPC 层

use super::{BalancerError, ErrorCode};
use tonic::{Code, Status};

impl From<BalancerError> for Status {
    fn from(err: BalancerError) -> Self {
        let code = err.code();
        let mut status = Status::new(map_error_code_to_grpc(code), err.to_string());

        // 添加错误代码到 metadata
        if let Ok(value) = code.as_u32().to_string().parse() {
            status.metadata_mut().insert("error-code", value);
        }

        status
    }
}

/// 将错误代码映射到 gRPC 状态码
fn map_error_code_to_grpc(code: ErrorCode) -> Code {
    match code {
        ErrorCode::NoAvailableNode | ErrorCode::DiscoveryFailed => Code::Unavailable,
        ErrorCode::DiscoveryTimeout => Code::DeadlineExceeded,
        ErrorCode::InvalidTarget | ErrorCode::InvalidEndpoint => Code::InvalidArgument,
        ErrorCode::WatchCanceled => Code::Cancelled,
        ErrorCode::ConfigurationError => Code::Internal,
    }
}
