//! Request correlation ids.

use axum::http::Request;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Generates time-ordered UUIDv7 request ids, so `x-request-id` values
/// sort by arrival in the logs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_v7_ids() {
        let req = Request::new(());
        let id = MakeRequestUuidV7.make_request_id(&req).unwrap();
        let parsed: Uuid = id.header_value().to_str().unwrap().parse().unwrap();
        assert!(leadforge_core::is_v7(&parsed));
    }
}
