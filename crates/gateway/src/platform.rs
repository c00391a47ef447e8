//! REST implementation of [`PlatformGateway`].
//!
//! `HttpPlatform` talks to the connector process that holds the chat
//! platform connection.  Every trait method maps to one connector endpoint,
//! with retry + exponential back-off on transient (5xx / timeout) failures.
//! Calls that create something on the platform are only replayed when the
//! request never left this process.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use tv_domain::config::PlatformConfig;
use tv_domain::error::{Error, Result};
use tv_domain::ids::{ChannelId, GuildId, MemberId};
use tv_domain::trace::TraceEvent;
use tv_sessions::platform::{ChannelEdit, ChannelSnapshot, GuildInfo, PlatformGateway};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct CreateChannelRequest<'a> {
    name: &'a str,
    category_id: Option<ChannelId>,
}

#[derive(Deserialize)]
struct CreateChannelResponse {
    channel_id: ChannelId,
}

#[derive(Serialize)]
struct MoveMemberRequest {
    channel_id: ChannelId,
}

#[derive(Serialize)]
struct ControlSurfaceRequest {
    owner_id: Option<MemberId>,
}

#[derive(Deserialize)]
struct MemberLookupResponse {
    member_id: MemberId,
}

/// Which failures a request may be replayed after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Repeating the request cannot change the outcome.
    Safe,
    /// The connector may have acted already; only replay when the
    /// connection was never established.
    ConnectOnly,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connector REST client.
///
/// Created once at startup; the underlying `reqwest::Client` keeps a
/// connection pool.
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    http: Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
}

impl HttpPlatform {
    /// Build a client from `[platform]`.  The bearer token is read from the
    /// env var named by `token_env`; unset means no `Authorization` header.
    pub fn new(cfg: &PlatformConfig) -> Result<Self> {
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!(
                env_var = %cfg.token_env,
                "no connector token configured; requests are sent unauthenticated"
            );
        }
        Self::with_token(cfg, token)
    }

    pub fn with_token(cfg: &PlatformConfig, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::ExternalResource(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            token,
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb.header("X-Trace-Id", uuid::Uuid::new_v4().to_string());
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request, retrying 5xx responses and transport errors.
    ///
    /// With [`Replay::ConnectOnly`] only connection failures are retried;
    /// a 5xx or a timeout may mean the connector already acted.
    ///
    /// 404 becomes [`Error::NotFound`] so callers can treat it as "gone";
    /// every other 4xx is permanent and not retried.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        replay: Replay,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::PlatformCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        let err = Error::ExternalResource(format!(
                            "{endpoint} returned {status}: {body}"
                        ));
                        if replay == Replay::ConnectOnly {
                            return Err(err);
                        }
                        last_err = Some(err);
                        continue;
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(Error::NotFound(format!("{endpoint} returned 404")));
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::ExternalResource(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::PlatformCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    let replayable = replay == Replay::Safe || e.is_connect();
                    let err = from_reqwest(e);
                    if !replayable {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::ExternalResource(format!("{endpoint}: all retries exhausted"))
        }))
    }

    async fn parse<T: serde::de::DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(endpoint, body = %body, error = %e, "unparseable connector response");
            Error::Json(e)
        })
    }
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ExternalResource(format!("request timed out: {e}"))
    } else {
        Error::ExternalResource(e.to_string())
    }
}

/// `Ok(None)` for a 404, the value otherwise.
fn absent_on_404<T>(res: Result<T>) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl PlatformGateway for HttpPlatform {
    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        category_id: Option<ChannelId>,
    ) -> Result<ChannelId> {
        const EP: &str = "POST /v1/guilds/{g}/voice-channels";
        let url = self.url(&format!("/v1/guilds/{guild_id}/voice-channels"));
        let req = CreateChannelRequest { name, category_id };
        let resp = self
            .execute_with_retry(EP, Replay::ConnectOnly, || self.http.post(&url).json(&req))
            .await?;
        let created: CreateChannelResponse = Self::parse(EP, resp).await?;
        Ok(created.channel_id)
    }

    async fn delete_channel(&self, channel_id: ChannelId, reason: &str) -> Result<()> {
        let url = self.url(&format!("/v1/channels/{channel_id}"));
        // Already gone counts as deleted.
        absent_on_404(
            self.execute_with_retry("DELETE /v1/channels/{c}", Replay::Safe, || {
                self.http.delete(&url).header("X-Audit-Reason", reason)
            })
            .await,
        )?;
        Ok(())
    }

    async fn move_member(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let url = self.url(&format!("/v1/guilds/{guild_id}/members/{member_id}/move"));
        let req = MoveMemberRequest { channel_id };
        self.execute_with_retry("POST /v1/guilds/{g}/members/{m}/move", Replay::Safe, || {
            self.http.post(&url).json(&req)
        })
        .await?;
        Ok(())
    }

    async fn attach_control_surface(
        &self,
        channel_id: ChannelId,
        owner: Option<MemberId>,
    ) -> Result<()> {
        let url = self.url(&format!("/v1/channels/{channel_id}/control-surface"));
        let req = ControlSurfaceRequest { owner_id: owner };
        self.execute_with_retry("POST /v1/channels/{c}/control-surface", Replay::ConnectOnly, || {
            self.http.post(&url).json(&req)
        })
        .await?;
        Ok(())
    }

    async fn resolve_channel(&self, channel_id: ChannelId) -> Result<Option<ChannelSnapshot>> {
        const EP: &str = "GET /v1/channels/{c}";
        let url = self.url(&format!("/v1/channels/{channel_id}"));
        let Some(resp) =
            absent_on_404(self.execute_with_retry(EP, Replay::Safe, || self.http.get(&url)).await)?
        else {
            return Ok(None);
        };
        Self::parse(EP, resp).await.map(Some)
    }

    async fn update_channel(&self, channel_id: ChannelId, edit: &ChannelEdit) -> Result<()> {
        let url = self.url(&format!("/v1/channels/{channel_id}"));
        self.execute_with_retry("PATCH /v1/channels/{c}", Replay::Safe, || {
            self.http.patch(&url).json(edit)
        })
        .await?;
        Ok(())
    }

    async fn find_member_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<MemberId>> {
        const EP: &str = "GET /v1/guilds/{g}/members";
        let url = self.url(&format!("/v1/guilds/{guild_id}/members"));
        let Some(resp) = absent_on_404(
            self.execute_with_retry(EP, Replay::Safe, || self.http.get(&url).query(&[("name", name)]))
                .await,
        )?
        else {
            return Ok(None);
        };
        let found: MemberLookupResponse = Self::parse(EP, resp).await?;
        Ok(Some(found.member_id))
    }

    async fn list_guilds(&self) -> Result<Vec<GuildInfo>> {
        const EP: &str = "GET /v1/guilds";
        let url = self.url("/v1/guilds");
        let resp = self
            .execute_with_retry(EP, Replay::Safe, || self.http.get(&url))
            .await?;
        Self::parse(EP, resp).await
    }

    async fn leave_guild(&self, guild_id: GuildId) -> Result<()> {
        let url = self.url(&format!("/v1/guilds/{guild_id}/leave"));
        self.execute_with_retry("POST /v1/guilds/{g}/leave", Replay::Safe, || self.http.post(&url))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::{delete, get, patch, post};
    use axum::Router;

    use super::*;

    fn cfg(base_url: &str) -> PlatformConfig {
        PlatformConfig {
            base_url: base_url.into(),
            max_retries: 0,
            timeout_ms: 200,
            ..PlatformConfig::default()
        }
    }

    /// What the stub connector saw.
    #[derive(Clone, Default)]
    struct Seen {
        hits: Arc<AtomicUsize>,
        headers: Arc<Mutex<Vec<HeaderMap>>>,
    }

    impl Seen {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        /// Count the request; returns the 1-based attempt number.
        fn hit(&self, headers: HeaderMap) -> usize {
            self.headers.lock().unwrap().push(headers);
            self.hits.fetch_add(1, Ordering::SeqCst) + 1
        }

        fn header(&self, name: &str) -> Option<String> {
            self.headers
                .lock()
                .unwrap()
                .last()
                .and_then(|h| h.get(name))
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        }
    }

    /// Serve `app` on an ephemeral port and return a client for it.
    async fn connector(app: Router, retries: u32, token: Option<&str>) -> HttpPlatform {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let mut cfg = cfg(&format!("http://{addr}"));
        cfg.max_retries = retries;
        HttpPlatform::with_token(&cfg, token.map(str::to_owned)).unwrap()
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let p = HttpPlatform::with_token(&cfg("http://connector:3221/"), None).unwrap();
        assert_eq!(p.url("/v1/guilds"), "http://connector:3221/v1/guilds");
    }

    #[test]
    fn not_found_maps_to_none() {
        assert_eq!(
            absent_on_404::<u8>(Err(Error::NotFound("x".into()))).unwrap(),
            None
        );
        assert_eq!(absent_on_404(Ok(3u8)).unwrap(), Some(3));
        assert!(absent_on_404::<u8>(Err(Error::ExternalResource("x".into()))).is_err());
    }

    #[tokio::test]
    async fn unreachable_connector_is_external_resource() {
        // Port 9 (discard) is closed on test hosts; the connect fails fast.
        let p = HttpPlatform::with_token(&cfg("http://127.0.0.1:9"), None).unwrap();
        let err = p.list_guilds().await.unwrap_err();
        assert!(matches!(err, Error::ExternalResource(_)));
    }

    #[tokio::test]
    async fn server_error_is_retried_until_success() {
        let seen = Seen::default();
        let app = Router::new()
            .route(
                "/v1/guilds",
                get(|State(seen): State<Seen>, headers: HeaderMap| async move {
                    if seen.hit(headers) == 1 {
                        (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response()
                    } else {
                        axum::Json(serde_json::json!([{ "id": 7, "name": "Study Hall" }]))
                            .into_response()
                    }
                }),
            )
            .with_state(seen.clone());
        let p = connector(app, 2, None).await;

        let guilds = p.list_guilds().await.unwrap();
        assert_eq!(guilds.len(), 1);
        assert_eq!(guilds[0].id, GuildId(7));
        assert_eq!(seen.hits(), 2);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let seen = Seen::default();
        let app = Router::new()
            .route(
                "/v1/channels/:id",
                patch(|State(seen): State<Seen>, headers: HeaderMap| async move {
                    seen.hit(headers);
                    (StatusCode::BAD_REQUEST, "user_limit out of range")
                }),
            )
            .with_state(seen.clone());
        let p = connector(app, 2, None).await;

        let edit = ChannelEdit {
            name: None,
            user_limit: Some(5),
        };
        let err = p.update_channel(ChannelId(42), &edit).await.unwrap_err();
        assert!(matches!(err, Error::ExternalResource(ref m) if m.contains("400")));
        assert_eq!(seen.hits(), 1);
    }

    #[tokio::test]
    async fn missing_channel_and_member_resolve_to_none() {
        let app = Router::new()
            .route("/v1/channels/:id", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/v1/guilds/:id/members",
                get(|| async { StatusCode::NOT_FOUND }),
            );
        let p = connector(app, 2, None).await;

        assert_eq!(p.resolve_channel(ChannelId(42)).await.unwrap(), None);
        assert_eq!(p.find_member_by_name(GuildId(1), "alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn resolved_channel_is_parsed() {
        let app = Router::new().route(
            "/v1/channels/:id",
            get(|| async {
                axum::Json(serde_json::json!({
                    "id": 42, "guild_id": 1, "name": "Lounge", "occupants": 2, "user_limit": 5
                }))
            }),
        );
        let p = connector(app, 0, None).await;

        let snapshot = p.resolve_channel(ChannelId(42)).await.unwrap().unwrap();
        assert_eq!(snapshot.occupants, 2);
        assert_eq!(snapshot.user_limit, 5);
    }

    #[tokio::test]
    async fn delete_sends_reason_and_bearer_token() {
        let seen = Seen::default();
        let app = Router::new()
            .route(
                "/v1/channels/:id",
                delete(|State(seen): State<Seen>, headers: HeaderMap| async move {
                    seen.hit(headers);
                    StatusCode::NO_CONTENT
                }),
            )
            .with_state(seen.clone());
        let p = connector(app, 0, Some("connector-secret")).await;

        p.delete_channel(ChannelId(42), "temporary channel empty")
            .await
            .unwrap();
        assert_eq!(
            seen.header("x-audit-reason").as_deref(),
            Some("temporary channel empty")
        );
        assert_eq!(
            seen.header("authorization").as_deref(),
            Some("Bearer connector-secret")
        );
        assert!(seen.header("x-trace-id").is_some());
    }

    #[tokio::test]
    async fn deleting_a_missing_channel_succeeds() {
        let app = Router::new().route(
            "/v1/channels/:id",
            delete(|| async { StatusCode::NOT_FOUND }),
        );
        let p = connector(app, 0, None).await;
        p.delete_channel(ChannelId(42), "gone").await.unwrap();
    }

    #[tokio::test]
    async fn slow_channel_create_is_sent_once() {
        let seen = Seen::default();
        let app = Router::new()
            .route(
                "/v1/guilds/:id/voice-channels",
                post(|State(seen): State<Seen>, headers: HeaderMap| async move {
                    seen.hit(headers);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    axum::Json(serde_json::json!({ "channel_id": 1001 }))
                }),
            )
            .with_state(seen.clone());
        let p = connector(app, 2, None).await;

        let err = p
            .create_voice_channel(GuildId(1), "Lounge", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalResource(_)));
        assert_eq!(seen.hits(), 1);
    }

    #[tokio::test]
    async fn channel_create_is_not_replayed_after_server_error() {
        let seen = Seen::default();
        let app = Router::new()
            .route(
                "/v1/guilds/:id/voice-channels",
                post(|State(seen): State<Seen>, headers: HeaderMap| async move {
                    seen.hit(headers);
                    StatusCode::BAD_GATEWAY
                }),
            )
            .with_state(seen.clone());
        let p = connector(app, 2, None).await;

        assert!(p.create_voice_channel(GuildId(1), "Lounge", None).await.is_err());
        assert_eq!(seen.hits(), 1);
    }

    #[tokio::test]
    async fn malformed_response_is_a_json_error() {
        let app = Router::new().route(
            "/v1/guilds/:id/voice-channels",
            post(|| async { "not json" }),
        );
        let p = connector(app, 0, None).await;

        let err = p
            .create_voice_channel(GuildId(1), "Lounge", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
