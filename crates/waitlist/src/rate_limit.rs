use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use serde_json::json;
use tracing::warn;

const UNKNOWN_CLIENT: &str = "unknown";
/// Client tables are swept for expired entries once every this many checks.
const SWEEP_EVERY: u64 = 1024;

/// At most `max_requests` hits inside any sliding `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

impl Quota {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60 * 60))
    }

    pub fn per_day(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(24 * 60 * 60))
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.window.as_secs() {
            60 => "1 minute".to_string(),
            3600 => "1 hour".to_string(),
            86400 => "1 day".to_string(),
            secs => format!("{secs} seconds"),
        };
        write!(f, "{} per {unit}", self.max_requests)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { quota: Quota, retry_after: Duration },
}

/// One set of quotas sharing a hit log per client.
#[derive(Debug)]
struct Tier {
    quotas: Box<[Quota]>,
    longest: Duration,
    buckets: DashMap<String, Vec<Instant>>,
}

impl Tier {
    fn new(quotas: Vec<Quota>) -> Self {
        let longest = quotas
            .iter()
            .map(|quota| quota.window)
            .max()
            .unwrap_or_default();
        Self {
            quotas: quotas.into(),
            longest,
            buckets: DashMap::new(),
        }
    }

    fn exceeded(&self, hits: &[Instant], now: Instant) -> Option<RateDecision> {
        self.quotas.iter().find_map(|quota| {
            let in_window: Vec<&Instant> = hits
                .iter()
                .filter(|hit| now.saturating_duration_since(**hit) < quota.window)
                .collect();
            if in_window.len() < quota.max_requests as usize {
                return None;
            }
            let oldest = in_window.first().map(|hit| **hit).unwrap_or(now);
            let elapsed = now.saturating_duration_since(oldest);
            let retry_after = quota
                .window
                .saturating_sub(elapsed)
                .max(Duration::from_secs(1));
            Some(RateDecision::Limited {
                quota: *quota,
                retry_after,
            })
        })
    }

    fn sweep(&self, now: Instant) {
        self.buckets.retain(|_, hits| {
            hits.last()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.longest)
        });
    }
}

/// In-memory sliding-window limiter keyed by client address.
///
/// A limiter holds one or more tiers of quotas. A request is recorded in every tier only
/// when all of them allow it, so a rejected request consumes nothing. Counters live for the
/// process lifetime and are not shared between instances; expired clients are dropped.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tiers: Arc<[Arc<Tier>]>,
    checks: Arc<AtomicU64>,
}

impl RateLimiter {
    pub fn new(quotas: impl Into<Vec<Quota>>) -> Self {
        Self::from_tiers(vec![Arc::new(Tier::new(quotas.into()))])
    }

    /// Limiter for a single route. Its own `quotas` are checked first, and every accepted
    /// hit also counts against the quotas of `self`, whose counters stay shared.
    pub fn with_route_quotas(&self, quotas: impl Into<Vec<Quota>>) -> Self {
        let mut tiers = vec![Arc::new(Tier::new(quotas.into()))];
        tiers.extend(self.tiers.iter().cloned());
        Self::from_tiers(tiers)
    }

    fn from_tiers(tiers: Vec<Arc<Tier>>) -> Self {
        Self {
            tiers: tiers.into(),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let decision = self.decide(client, now);

        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.sweep_at(now);
        }
        decision
    }

    /// Drops clients whose every hit has aged out of the longest window.
    pub fn sweep_at(&self, now: Instant) {
        for tier in self.tiers.iter() {
            tier.sweep(now);
        }
    }

    /// Number of client entries held across all tiers.
    pub fn tracked_clients(&self) -> usize {
        self.tiers.iter().map(|tier| tier.buckets.len()).sum()
    }

    fn decide(&self, client: &str, now: Instant) -> RateDecision {
        let mut logs = Vec::with_capacity(self.tiers.len());
        let mut limited = None;

        for tier in self.tiers.iter() {
            let mut hits = tier.buckets.entry(client.to_string()).or_default();
            hits.retain(|hit| now.saturating_duration_since(*hit) < tier.longest);
            limited = tier.exceeded(&hits, now);
            logs.push(hits);
            if limited.is_some() {
                break;
            }
        }

        match limited {
            Some(decision) => {
                drop(logs);
                for tier in self.tiers.iter() {
                    tier.buckets.remove_if(client, |_, hits| hits.is_empty());
                }
                decision
            }
            None => {
                for hits in logs.iter_mut() {
                    hits.push(now);
                }
                RateDecision::Allowed
            }
        }
    }
}

/// Middleware rejecting requests over quota with `429` and `Retry-After`.
pub async fn enforce_rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    match limiter.check(&client) {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Limited { quota, retry_after } => {
            warn!(%client, %quota, path = %request.uri().path(), "rate limit exceeded");
            rate_limited(quota, retry_after)
        }
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn rate_limited(quota: Quota, retry_after: Duration) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": format!("{quota}") })),
    )
        .into_response();
    let seconds = retry_after.as_secs().max(1);
    if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotas_render_like_limit_strings() {
        assert_eq!(Quota::per_minute(5).to_string(), "5 per 1 minute");
        assert_eq!(Quota::per_hour(50).to_string(), "50 per 1 hour");
        assert_eq!(Quota::per_day(200).to_string(), "200 per 1 day");
        assert_eq!(
            Quota::new(3, Duration::from_secs(10)).to_string(),
            "3 per 10 seconds"
        );
    }

    #[test]
    fn sixth_request_within_a_minute_is_limited() {
        let limiter = RateLimiter::new(vec![Quota::per_minute(5)]);
        let start = Instant::now();

        for offset in 0..5 {
            let decision = limiter.check_at("10.0.0.1", start + Duration::from_secs(offset));
            assert_eq!(decision, RateDecision::Allowed);
        }

        match limiter.check_at("10.0.0.1", start + Duration::from_secs(10)) {
            RateDecision::Limited { quota, retry_after } => {
                assert_eq!(quota, Quota::per_minute(5));
                assert_eq!(retry_after, Duration::from_secs(50));
            }
            other => panic!("expected limit, got {other:?}"),
        }
    }

    #[test]
    fn window_slides_forward() {
        let limiter = RateLimiter::new(vec![Quota::per_minute(2)]);
        let start = Instant::now();

        assert_eq!(limiter.check_at("a", start), RateDecision::Allowed);
        assert_eq!(limiter.check_at("a", start), RateDecision::Allowed);
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(30)),
            RateDecision::Limited { .. }
        ));
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(61)),
            RateDecision::Allowed
        );
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(vec![Quota::per_minute(1)]);
        let now = Instant::now();
        assert_eq!(limiter.check_at("a", now), RateDecision::Allowed);
        assert_eq!(limiter.check_at("b", now), RateDecision::Allowed);
        assert!(matches!(
            limiter.check_at("a", now),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn rejected_requests_do_not_consume_quota() {
        let limiter = RateLimiter::new(vec![Quota::per_day(200), Quota::per_hour(2)]);
        let start = Instant::now();

        assert_eq!(limiter.check_at("a", start), RateDecision::Allowed);
        assert_eq!(limiter.check_at("a", start), RateDecision::Allowed);
        for _ in 0..10 {
            match limiter.check_at("a", start + Duration::from_secs(5)) {
                RateDecision::Limited { quota, .. } => assert_eq!(quota, Quota::per_hour(2)),
                other => panic!("expected hourly limit, got {other:?}"),
            }
        }

        let after_hour = start + Duration::from_secs(60 * 60 + 1);
        assert_eq!(limiter.check_at("a", after_hour), RateDecision::Allowed);
    }

    #[test]
    fn daily_quota_outlives_hourly_window() {
        let limiter = RateLimiter::new(vec![Quota::per_day(3), Quota::per_hour(2)]);
        let start = Instant::now();
        let hour = Duration::from_secs(60 * 60);

        assert_eq!(limiter.check_at("a", start), RateDecision::Allowed);
        assert_eq!(limiter.check_at("a", start), RateDecision::Allowed);
        assert_eq!(
            limiter.check_at("a", start + hour + Duration::from_secs(1)),
            RateDecision::Allowed
        );
        match limiter.check_at("a", start + hour * 2) {
            RateDecision::Limited { quota, .. } => assert_eq!(quota, Quota::per_day(3)),
            other => panic!("expected daily limit, got {other:?}"),
        }
    }

    #[test]
    fn route_rejections_leave_shared_quota_untouched() {
        let shared = RateLimiter::new(vec![Quota::per_hour(8)]);
        let route = shared.with_route_quotas(vec![Quota::per_minute(5)]);
        let start = Instant::now();

        for _ in 0..5 {
            assert_eq!(route.check_at("a", start), RateDecision::Allowed);
        }
        for _ in 0..3 {
            match route.check_at("a", start) {
                RateDecision::Limited { quota, .. } => assert_eq!(quota, Quota::per_minute(5)),
                other => panic!("expected route limit, got {other:?}"),
            }
        }

        for _ in 0..3 {
            assert_eq!(shared.check_at("a", start), RateDecision::Allowed);
        }
        match shared.check_at("a", start) {
            RateDecision::Limited { quota, .. } => assert_eq!(quota, Quota::per_hour(8)),
            other => panic!("expected shared limit, got {other:?}"),
        }
    }

    #[test]
    fn shared_quota_also_limits_the_route() {
        let shared = RateLimiter::new(vec![Quota::per_hour(2)]);
        let route = shared.with_route_quotas(vec![Quota::per_minute(5)]);
        let now = Instant::now();

        assert_eq!(shared.check_at("a", now), RateDecision::Allowed);
        assert_eq!(route.check_at("a", now), RateDecision::Allowed);
        match route.check_at("a", now) {
            RateDecision::Limited { quota, .. } => assert_eq!(quota, Quota::per_hour(2)),
            other => panic!("expected shared limit, got {other:?}"),
        }
    }

    #[test]
    fn sweep_drops_expired_clients() {
        let limiter = RateLimiter::new(vec![Quota::per_minute(5), Quota::per_hour(50)]);
        let start = Instant::now();

        for client in 0..100 {
            limiter.check_at(&format!("10.0.{}.{}", client / 256, client % 256), start);
        }
        assert_eq!(limiter.tracked_clients(), 100);

        limiter.sweep_at(start + Duration::from_secs(30 * 60));
        assert_eq!(limiter.tracked_clients(), 100);

        limiter.sweep_at(start + Duration::from_secs(60 * 60));
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn checks_periodically_sweep_stale_clients() {
        let limiter = RateLimiter::new(vec![Quota::per_hour(50)]);
        let start = Instant::now();

        for client in 0..(SWEEP_EVERY * 2 - 1) {
            limiter.check_at(&format!("client-{client}"), start);
        }
        assert_eq!(limiter.tracked_clients(), (SWEEP_EVERY * 2 - 1) as usize);

        let later = start + Duration::from_secs(60 * 60 + 1);
        assert_eq!(limiter.check_at("late", later), RateDecision::Allowed);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn limited_route_does_not_keep_empty_entries() {
        let shared = RateLimiter::new(vec![Quota::per_hour(1)]);
        let route = shared.with_route_quotas(vec![Quota::per_minute(5)]);
        let now = Instant::now();

        assert_eq!(shared.check_at("a", now), RateDecision::Allowed);
        assert!(matches!(
            route.check_at("a", now),
            RateDecision::Limited { .. }
        ));
        // only the shared tier holds "a"; the route tier entry was dropped
        assert_eq!(route.tracked_clients(), 1);
    }
}
