mod http_metrics;
mod request_id;
mod rpc_auth;

pub use http_metrics::http_metrics_middleware;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use rpc_auth::rpc_auth_middleware;
