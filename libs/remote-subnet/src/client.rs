//! Lease protocol client talking to a remote coordinator over HTTP/JSON.
//!
//! Each operation builds its address, encodes a body if it has one, runs the
//! request through the cancellable executor and interprets the reply. Only an
//! exact `200 OK` is success; every other status becomes a
//! [`RemoteError::Status`] carrying the full response body.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use tracing::{debug, trace};

use crate::context::Context;
use crate::cursor::Cursor;
use crate::endpoint::Endpoint;
use crate::error::{RemoteError, RemoteResult};
use crate::executor::execute;
use crate::manager::SubnetManager;
use crate::models::{self, Lease, LeaseAttrs, NetworkConfig, WatchResult};
use crate::transport::{HttpRequest, HttpTransport, Transport};

/// [`SubnetManager`] that forwards every operation to a coordinator.
///
/// Holds no mutable state: the endpoint is fixed at construction and the
/// transport is shared read-only, so one manager can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct RemoteManager {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
}

impl RemoteManager {
    /// Manager for a coordinator listening on `listen_addr` (`host:port`),
    /// over plain http with the default API version.
    pub fn new(listen_addr: &str) -> RemoteResult<Self> {
        Ok(Self::with_transport(
            Endpoint::from_listen_addr(listen_addr)?,
            Arc::new(HttpTransport::new()),
        ))
    }

    /// Manager for an explicit endpoint and transport.
    pub fn with_transport(endpoint: Endpoint, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    /// The coordinator base address.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetch the configuration of `network`.
    pub async fn get_network_config(
        &self,
        ctx: &Context,
        network: &str,
    ) -> RemoteResult<NetworkConfig> {
        let url = self.endpoint.url(network, &["config"]);
        let body = self.round_trip(ctx, HttpRequest::get(url)).await?;
        models::decode(&body)
    }

    /// Acquire a new lease carrying `attrs`.
    pub async fn acquire_lease(
        &self,
        ctx: &Context,
        network: &str,
        attrs: &LeaseAttrs,
    ) -> RemoteResult<Lease> {
        let url = self.endpoint.url(network, &["leases/"]);
        let body = models::encode(attrs)?;
        let body = self
            .round_trip(ctx, HttpRequest::json(Method::POST, url, body))
            .await?;
        models::decode(&body)
    }

    /// Renew `lease` in place.
    ///
    /// On success every field of `*lease` is replaced by the coordinator's
    /// authoritative copy; fields the reply omits fall back to their defaults
    /// rather than keeping the old value. On any error `*lease` is left
    /// exactly as it was.
    ///
    /// The caller must not renew the same lease concurrently. `&mut` enforces
    /// this within safe code, but a lease shared behind a lock must have its
    /// renewals serialized by the caller.
    pub async fn renew_lease(
        &self,
        ctx: &Context,
        network: &str,
        lease: &mut Lease,
    ) -> RemoteResult<()> {
        let key = lease.key();
        let url = self.endpoint.url(network, &["leases", &key]);
        let body = models::encode(&*lease)?;
        let body = self
            .round_trip(ctx, HttpRequest::json(Method::PUT, url, body))
            .await?;
        let renewed: Lease = models::decode(&body)?;
        *lease = renewed;
        Ok(())
    }

    /// Long-poll for lease changes after `cursor`.
    ///
    /// The request may legitimately block until the coordinator has something
    /// to report; bound it with `ctx`. A `200 OK` whose cursor is not a string
    /// is still a failure.
    pub async fn watch_leases(
        &self,
        ctx: &Context,
        network: &str,
        cursor: &Cursor,
    ) -> RemoteResult<WatchResult> {
        let url = self.endpoint.watch_url(network, cursor);
        let body = self.round_trip(ctx, HttpRequest::get(url)).await?;
        WatchResult::from_slice(&body)
    }

    /// Perform `request` and return the body of a `200 OK` reply.
    async fn round_trip(&self, ctx: &Context, request: HttpRequest) -> RemoteResult<Bytes> {
        let method = request.method.clone();
        let url = request.url.clone();
        debug!(%method, %url, "sending coordinator request");

        let transport = Arc::clone(&self.transport);
        let resp = execute(ctx, async move {
            transport
                .perform(request)
                .await
                .map_err(RemoteError::Transport)
        })
        .await?;

        let status = resp.status();
        trace!(%method, %url, %status, "coordinator replied");

        let body = resp.into_body();
        let body = execute(ctx, async move { body.await.map_err(RemoteError::Transport) }).await?;

        if status != StatusCode::OK {
            return Err(RemoteError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl SubnetManager for RemoteManager {
    async fn get_network_config(
        &self,
        ctx: &Context,
        network: &str,
    ) -> RemoteResult<NetworkConfig> {
        RemoteManager::get_network_config(self, ctx, network).await
    }

    async fn acquire_lease(
        &self,
        ctx: &Context,
        network: &str,
        attrs: &LeaseAttrs,
    ) -> RemoteResult<Lease> {
        RemoteManager::acquire_lease(self, ctx, network, attrs).await
    }

    async fn renew_lease(
        &self,
        ctx: &Context,
        network: &str,
        lease: &mut Lease,
    ) -> RemoteResult<()> {
        RemoteManager::renew_lease(self, ctx, network, lease).await
    }

    async fn watch_leases(
        &self,
        ctx: &Context,
        network: &str,
        cursor: &Cursor,
    ) -> RemoteResult<WatchResult> {
        RemoteManager::watch_leases(self, ctx, network, cursor).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::error::BoxError;
    use crate::models::LeaseUpdate;
    use crate::transport::{APPLICATION_JSON, HttpResponse};

    const BASE: &str = "http://127.0.0.1:8888/v1";

    /// What the scripted transport answers with.
    #[derive(Debug)]
    enum Reply {
        Status(StatusCode, String),
        Fail(&'static str),
        BodyFails(StatusCode, &'static str),
    }

    fn ok(body: impl Into<String>) -> Reply {
        Reply::Status(StatusCode::OK, body.into())
    }

    /// Transport answering from a script and recording every request.
    #[derive(Debug)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
            self.requests.lock().push(request);
            let reply = self
                .replies
                .lock()
                .pop_front()
                .expect("unexpected request");
            match reply {
                Reply::Status(status, body) => Ok(HttpResponse::from_bytes(status, body)),
                Reply::Fail(err) => Err(BoxError::from(err)),
                Reply::BodyFails(status, err) => Ok(HttpResponse::new(status, async move {
                    Err::<Bytes, _>(BoxError::from(err))
                })),
            }
        }
    }

    /// Transport that never answers, recording whether its future was dropped.
    #[derive(Debug, Default)]
    struct HangingTransport {
        dropped: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for HangingTransport {
        async fn perform(&self, _request: HttpRequest) -> Result<HttpResponse, BoxError> {
            let _guard = SetOnDrop(self.dropped.clone());
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn manager(transport: Arc<dyn Transport>) -> RemoteManager {
        RemoteManager::with_transport(Endpoint::new(BASE).unwrap(), transport)
    }

    fn lease_json(subnet: &str, public_ip: &str, expiration: &str) -> String {
        json!({
            "Subnet": subnet,
            "Attrs": {"PublicIP": public_ip, "BackendType": "vxlan"},
            "Expiration": expiration,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_get_config_empty_network() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"Network":"10.0.0.0/16"}"#)]);
        let mgr = manager(transport.clone());

        let config = mgr.get_network_config(&Context::new(), "").await.unwrap();
        assert_eq!(config.network.to_string(), "10.0.0.0/16");

        let reqs = transport.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, Method::GET);
        assert_eq!(reqs[0].url.as_str(), format!("{BASE}/_/config"));
        assert!(reqs[0].body.is_none());
    }

    #[tokio::test]
    async fn test_acquire_lease_posts_attrs() {
        let body = lease_json("10.1.2.0/24", "192.168.0.10", "2015-06-01T12:00:00Z");
        let transport = ScriptedTransport::new(vec![ok(body)]);
        let mgr = manager(transport.clone());

        let attrs = LeaseAttrs::new(Ipv4Addr::new(192, 168, 0, 10));
        let lease = mgr
            .acquire_lease(&Context::new(), "foo", &attrs)
            .await
            .unwrap();
        assert_eq!(lease.key(), "10.1.2.0-24");
        assert_eq!(lease.attrs.public_ip, attrs.public_ip);

        let reqs = transport.requests();
        assert_eq!(reqs[0].method, Method::POST);
        assert_eq!(reqs[0].url.as_str(), format!("{BASE}/foo/leases/"));
        assert_eq!(reqs[0].content_type, Some(APPLICATION_JSON));
        let sent: LeaseAttrs = serde_json::from_slice(reqs[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent, attrs);
    }

    #[tokio::test]
    async fn test_renew_overwrites_every_field() {
        // reply omits Attrs entirely, so they must reset rather than survive
        let transport = ScriptedTransport::new(vec![ok(
            r#"{"Subnet":"10.1.2.0/24","Expiration":"2015-06-01T13:00:00Z"}"#,
        )]);
        let mgr = manager(transport.clone());

        let mut lease: Lease = serde_json::from_str(&lease_json(
            "10.1.2.0/24",
            "192.168.0.10",
            "2015-06-01T12:00:00Z",
        ))
        .unwrap();
        let original = lease.clone();

        mgr.renew_lease(&Context::new(), "foo", &mut lease)
            .await
            .unwrap();

        assert_eq!(
            lease.expiration,
            Utc.with_ymd_and_hms(2015, 6, 1, 13, 0, 0).unwrap()
        );
        assert_eq!(lease.attrs, LeaseAttrs::default());

        let reqs = transport.requests();
        assert_eq!(reqs[0].method, Method::PUT);
        assert_eq!(reqs[0].url.as_str(), format!("{BASE}/foo/leases/10.1.2.0-24"));
        let sent: Lease = serde_json::from_slice(reqs[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent, original);
    }

    #[tokio::test]
    async fn test_renew_failure_leaves_lease_untouched() {
        let transport = ScriptedTransport::new(vec![
            Reply::Status(StatusCode::NOT_FOUND, "lease not found".into()),
            ok("{not json"),
            Reply::Fail("connection refused"),
        ]);
        let mgr = manager(transport);

        let mut lease: Lease = serde_json::from_str(&lease_json(
            "10.1.2.0/24",
            "192.168.0.10",
            "2015-06-01T12:00:00Z",
        ))
        .unwrap();
        let original = lease.clone();

        let err = mgr
            .renew_lease(&Context::new(), "", &mut lease)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(lease, original);

        let err = mgr
            .renew_lease(&Context::new(), "", &mut lease)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
        assert_eq!(lease, original);

        let err = mgr
            .renew_lease(&Context::new(), "", &mut lease)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
        assert_eq!(lease, original);
    }

    #[tokio::test]
    async fn test_watch_with_cursor() {
        let transport = ScriptedTransport::new(vec![
            ok(r#"{"cursor":"xyz"}"#),
            ok(r#"{"cursor":42}"#),
        ]);
        let mgr = manager(transport.clone());
        let ctx = Context::new();
        let cursor = Cursor::from("abc123");

        let wr = mgr.watch_leases(&ctx, "foo", &cursor).await.unwrap();
        assert_eq!(wr.cursor, Cursor::from("xyz"));
        assert_eq!(wr.update, LeaseUpdate::Events(vec![]));

        let err = mgr.watch_leases(&ctx, "foo", &cursor).await.unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)), "{err}");

        let reqs = transport.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(
            reqs[0].url.as_str(),
            format!("{BASE}/foo/leases?next=abc123")
        );
    }

    #[tokio::test]
    async fn test_watch_from_start_has_no_query() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"snapshot":[],"cursor":"1"}"#)]);
        let mgr = manager(transport.clone());
        let wr = mgr
            .watch_leases(&Context::new(), "", &Cursor::Start)
            .await
            .unwrap();
        assert_eq!(wr.update, LeaseUpdate::Snapshot(vec![]));
        assert_eq!(transport.requests()[0].url.as_str(), format!("{BASE}/_/leases"));
    }

    #[tokio::test]
    async fn test_non_string_cursor_never_reaches_network() {
        let transport = ScriptedTransport::new(vec![]);
        let mgr = manager(transport.clone());

        let result = match Cursor::try_from(json!(42)) {
            Ok(cursor) => mgr.watch_leases(&Context::new(), "foo", &cursor).await,
            Err(err) => Err(err),
        };

        assert!(matches!(result, Err(RemoteError::Protocol(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_only_exact_200_is_success() {
        for status in [
            StatusCode::CREATED,
            StatusCode::NO_CONTENT,
            StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let transport = ScriptedTransport::new(vec![Reply::Status(
                status,
                r#"{"Network":"10.0.0.0/16"}"#.into(),
            )]);
            let err = manager(transport)
                .get_network_config(&Context::new(), "foo")
                .await
                .unwrap_err();
            match err {
                RemoteError::Status { status: got, body } => {
                    assert_eq!(got, status);
                    assert_eq!(body, r#"{"Network":"10.0.0.0/16"}"#);
                }
                other => panic!("{status}: expected status error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_status_error_message() {
        let transport = ScriptedTransport::new(vec![Reply::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "subnet pool exhausted".into(),
        )]);
        let err = manager(transport)
            .acquire_lease(&Context::new(), "", &LeaseAttrs::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "500 Internal Server Error: subnet pool exhausted"
        );
    }

    #[tokio::test]
    async fn test_unreadable_error_body_reports_read_failure() {
        let transport = ScriptedTransport::new(vec![Reply::BodyFails(
            StatusCode::SERVICE_UNAVAILABLE,
            "unexpected eof",
        )]);
        let err = manager(transport)
            .get_network_config(&Context::new(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
        assert_eq!(err.to_string(), "unexpected eof");
    }

    #[tokio::test]
    async fn test_transport_error_is_verbatim() {
        let transport = ScriptedTransport::new(vec![Reply::Fail("dns lookup failed")]);
        let err = manager(transport)
            .get_network_config(&Context::new(), "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "dns lookup failed");
    }

    #[tokio::test]
    async fn test_bad_body_is_decode_error() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"Network":42}"#)]);
        let err = manager(transport)
            .get_network_config(&Context::new(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_deadline_abandons_hanging_watch() {
        let transport = Arc::new(HangingTransport::default());
        let dropped = transport.dropped.clone();
        let mgr = manager(transport);

        let ctx = Context::new().with_timeout(std::time::Duration::from_secs(30));
        let err = mgr
            .watch_leases(&ctx, "foo", &Cursor::Start)
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::DeadlineExceeded));
        assert!(dropped.load(Ordering::SeqCst));
        assert!(logs_contain("sending coordinator request"));
    }

    #[tokio::test]
    async fn test_cancelled_context_sends_nothing() {
        let transport = ScriptedTransport::new(vec![]);
        let mgr = manager(transport.clone());
        let ctx = Context::new();
        ctx.cancel();

        let err = mgr
            .acquire_lease(&ctx, "foo", &LeaseAttrs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Canceled));
        assert!(transport.requests().is_empty());
    }
}
