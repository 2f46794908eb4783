//! Fixed-window request limits per client and bucket.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, ResponseError};
use moka::future::Cache;

use crate::error::ReportError;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Credential checks: login and e-signature PIN attempts.
    Auth,
    Upload,
    General,
}

impl Bucket {
    pub fn limit(&self) -> u32 {
        match self {
            Bucket::Auth => 5,
            Bucket::Upload => 10,
            Bucket::General => 100,
        }
    }

    /// Bucket for a request path. Paths outside `/api` are not limited.
    pub fn for_path(path: &str) -> Option<Bucket> {
        if path.starts_with("/api/auth") || path.ends_with("/sign") {
            Some(Bucket::Auth)
        } else if path.starts_with("/api/uploads") {
            Some(Bucket::Upload)
        } else if path.starts_with("/api/") {
            Some(Bucket::General)
        } else {
            None
        }
    }
}

/// Per-client counters. Clients are keyed by socket peer address; forwarded
/// headers are honored only when the peer is a configured proxy.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Cache<(Bucket, String), Arc<AtomicU32>>,
    trusted_proxies: Arc<Vec<IpAddr>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(WINDOW)
    }
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        // Entries expire a fixed time after creation, which is the window reset.
        let windows = Cache::builder()
            .time_to_live(window)
            .max_capacity(100_000)
            .build();
        Self {
            windows,
            trusted_proxies: Arc::new(Vec::new()),
        }
    }

    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = Arc::new(proxies);
        self
    }

    /// Key identifying the client behind a request.
    pub fn client_key(&self, req: &ServiceRequest) -> String {
        match req.peer_addr().map(|addr| addr.ip()) {
            Some(peer) if self.trusted_proxies.contains(&peer) => req
                .connection_info()
                .realip_remote_addr()
                .map(str::to_string)
                .unwrap_or_else(|| peer.to_string()),
            Some(peer) => peer.to_string(),
            None => "unknown".to_string(),
        }
    }

    /// Count one request; false once the client is over the bucket's limit.
    pub async fn check(&self, bucket: Bucket, client: &str) -> bool {
        let counter = self
            .windows
            .get_with((bucket, client.to_string()), async {
                Arc::new(AtomicU32::new(0))
            })
            .await;
        counter.fetch_add(1, Ordering::SeqCst) < bucket.limit()
    }
}

/// Middleware entry point, used with `middleware::from_fn`.
pub async fn enforce<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let limiter = req.app_data::<web::Data<RateLimiter>>().cloned();
    if let (Some(limiter), Some(bucket)) = (limiter, Bucket::for_path(req.path())) {
        let client = limiter.client_key(&req);
        if !limiter.check(bucket, &client).await {
            log::warn!("Rate limit exceeded for {} on {:?}", client, bucket);
            let response = ReportError::RateLimited.error_response();
            return Ok(req.into_response(response).map_into_right_body());
        }
    }
    next.call(req).await.map(ServiceResponse::map_into_left_body)
}
