//! Session and method delegation

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use vk_transport::{HttpTransport, Transport};

use crate::error::{ApiError, ServerError};
use crate::request::CallRequest;
use crate::Result;

/// Origin of the VK API; method names are appended under `/method/`.
const VK_API_URL: &str = "https://api.vk.com";

/// Named arguments of one remote method, keyed by parameter name.
pub type Params = BTreeMap<String, Value>;

/// Application identifier, passed through unmodified and never validated.
/// VK hands these out as integers, but nothing here depends on that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppId::Number(n) => n.fmt(f),
            AppId::Text(s) => s.fmt(f),
        }
    }
}

impl From<i64> for AppId {
    fn from(id: i64) -> Self {
        AppId::Number(id)
    }
}

impl From<i32> for AppId {
    fn from(id: i32) -> Self {
        AppId::Number(id.into())
    }
}

impl From<String> for AppId {
    fn from(id: String) -> Self {
        AppId::Text(id)
    }
}

impl From<&str> for AppId {
    fn from(id: &str) -> Self {
        AppId::Text(id.to_string())
    }
}

/// Outcome of resolving an arbitrary name on a session: entry into a
/// recognized namespace, or the response of a direct remote call.
#[derive(Debug)]
pub enum Dispatch {
    Namespace(Session),
    Response(Value),
}

struct SessionInner {
    app_id: AppId,
    access_token: String,
    prefix: Option<String>,
    /// Memoized child sessions, one per namespace entered so far.
    children: RwLock<HashMap<String, Session>>,
    transport: Arc<dyn Transport>,
}

/// Handle on an authenticated VK API connection.
///
/// Cloning is cheap and clones share all state. A root session has no
/// namespace prefix; sessions produced by the namespace accessors carry
/// exactly the namespace they were created for and prepend it to every
/// method they call. Parent and children share credentials and transport,
/// so they are logically one connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

macro_rules! namespaces {
    ($($name:ident),* $(,)?) => {
        /// Namespace names recognized for delegation, in server spelling.
        /// Accessing one of these names always enters the namespace, even
        /// if the server also has a remote method of the same name.
        pub const NAMESPACES: &'static [&'static str] = &[$(stringify!($name)),*];

        $(
            #[doc = concat!("Memoized child session bound to the `", stringify!($name), "` namespace.")]
            pub fn $name(&self) -> Session {
                self.child(stringify!($name))
            }
        )*
    };
}

impl Session {
    /// Create a root session over the default HTTPS transport.
    ///
    /// `access_token` must be non-empty; `app_id` is stored verbatim and
    /// never validated. No network I/O happens here.
    pub fn new(app_id: impl Into<AppId>, access_token: impl Into<String>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(app_id, access_token, transport)
    }

    /// Create a root session over a caller-supplied transport.
    pub fn with_transport(
        app_id: impl Into<AppId>,
        access_token: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(ApiError::InvalidAccessToken);
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                app_id: app_id.into(),
                access_token,
                prefix: None,
                children: RwLock::new(HashMap::new()),
                transport,
            }),
        })
    }

    pub fn app_id(&self) -> &AppId {
        &self.inner.app_id
    }

    /// Namespace this session is bound to, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.inner.prefix.as_deref()
    }

    namespaces!(
        users,
        friends,
        photos,
        wall,
        audio,
        video,
        places,
        secure,
        language,
        notes,
        pages,
        offers,
        questions,
        messages,
        newsfeed,
        status,
        polls,
        subscriptions,
        likes,
    );

    /// Resolve an arbitrary name: a recognized namespace enters that
    /// namespace, anything else is treated as a remote method of the
    /// current namespace and called immediately. An unrecognized name is
    /// never a local error; the only failure paths are the call itself.
    pub async fn invoke(&self, name: &str, params: Params) -> Result<Dispatch> {
        if Self::NAMESPACES.contains(&name) {
            if !params.is_empty() {
                tracing::warn!(
                    namespace = name,
                    "arguments ignored: name resolves to a namespace, not a remote method"
                );
            }
            return Ok(Dispatch::Namespace(self.child(name)));
        }

        Ok(Dispatch::Response(self.call(name, params).await?))
    }

    /// Perform one remote call: exactly one HTTPS POST, no retries.
    ///
    /// `method` is lower-camel-cased and qualified with the session's
    /// namespace prefix. The access token is inserted into the outgoing
    /// fields under `access_token`, replacing any caller-supplied value.
    /// On success the `response` value of the reply is returned unmodified;
    /// a non-null `error` value fails with [`ApiError::Server`]. Transport
    /// failures and non-JSON bodies propagate as their own variants.
    pub async fn call(&self, method: &str, params: Params) -> Result<Value> {
        let request = CallRequest::build(
            VK_API_URL,
            self.inner.prefix.as_deref(),
            method,
            params,
            &self.inner.access_token,
        )?;

        tracing::debug!(method = %request.method, "calling remote method");

        let body = self
            .inner
            .transport
            .post_form(request.url.as_str(), &request.fields)
            .await?;

        let payload: Value = serde_json::from_str(&body)?;

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            return Err(ApiError::Server(ServerError {
                session: self.clone(),
                method: request.method,
                params: request.fields,
                error: error.clone(),
            }));
        }

        Ok(payload.get("response").cloned().unwrap_or(Value::Null))
    }

    /// Memoized namespace entry: the first access constructs the child,
    /// later accesses return the same one. The write lock makes racing
    /// first accesses agree on a single child.
    fn child(&self, namespace: &str) -> Session {
        let mut children = self.inner.children.write();
        children
            .entry(namespace.to_string())
            .or_insert_with(|| self.delegated(namespace))
            .clone()
    }

    fn delegated(&self, namespace: &str) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                app_id: self.inner.app_id.clone(),
                access_token: self.inner.access_token.clone(),
                prefix: Some(namespace.to_string()),
                children: RwLock::new(HashMap::new()),
                transport: Arc::clone(&self.inner.transport),
            }),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("app_id", &self.inner.app_id)
            .field("prefix", &self.inner.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Transport that records every request and replies with a fixed body.
    struct MockTransport {
        body: String,
        requests: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    }

    impl MockTransport {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(String, BTreeMap<String, String>)> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post_form(
            &self,
            url: &str,
            fields: &BTreeMap<String, String>,
        ) -> vk_transport::Result<String> {
            self.requests.lock().push((url.to_string(), fields.clone()));
            Ok(self.body.clone())
        }
    }

    fn session_with(body: &str) -> (Session, Arc<MockTransport>) {
        let transport = MockTransport::new(body);
        let session = Session::with_transport(1, "s3cret", transport.clone()).unwrap();
        (session, transport)
    }

    #[test]
    fn test_empty_token_rejected() {
        let transport = MockTransport::new("{}");

        let err = Session::with_transport(1, "", transport.clone()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidAccessToken));

        let err = Session::with_transport("app", "", transport).unwrap_err();
        assert!(matches!(err, ApiError::InvalidAccessToken));
    }

    #[test]
    fn test_root_session_has_no_prefix() {
        let (session, _) = session_with("{}");
        assert_eq!(session.prefix(), None);
        assert_eq!(session.app_id(), &AppId::Number(1));
    }

    #[test]
    fn test_namespace_access_is_memoized() {
        let (session, _) = session_with("{}");

        let first = session.friends();
        let second = session.friends();

        assert!(Arc::ptr_eq(&first.inner, &second.inner));
        assert_eq!(first.prefix(), Some("friends"));
    }

    #[test]
    fn test_racing_first_accesses_agree_on_one_child() {
        let (session, _) = session_with("{}");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                std::thread::spawn(move || session.friends())
            })
            .collect();

        let children: Vec<Session> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for child in &children[1..] {
            assert!(Arc::ptr_eq(&children[0].inner, &child.inner));
            assert_eq!(child.prefix(), Some("friends"));
        }
        assert!(Arc::ptr_eq(&children[0].inner, &session.friends().inner));
    }

    #[tokio::test]
    async fn test_every_namespace_delegates() {
        let (session, _) = session_with("{}");

        for namespace in Session::NAMESPACES {
            match session.invoke(namespace, Params::new()).await.unwrap() {
                Dispatch::Namespace(child) => assert_eq!(child.prefix(), Some(*namespace)),
                Dispatch::Response(_) => panic!("{namespace} should enter a namespace"),
            }
        }
    }

    #[tokio::test]
    async fn test_invoke_namespace_wins_over_method() {
        let (session, transport) = session_with(r#"{"response": []}"#);

        let mut params = Params::new();
        params.insert("uid".to_string(), json!(1));

        // A remote method literally named "friends" is reinterpreted as
        // namespace entry; nothing goes over the wire.
        match session.invoke("friends", params).await.unwrap() {
            Dispatch::Namespace(child) => {
                assert!(Arc::ptr_eq(&child.inner, &session.friends().inner));
            }
            Dispatch::Response(_) => panic!("namespace entry expected"),
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_falls_back_to_remote_call() {
        let (session, transport) = session_with(r#"{"response": []}"#);

        match session.invoke("get_profiles", Params::new()).await.unwrap() {
            Dispatch::Response(value) => assert_eq!(value, json!([])),
            Dispatch::Namespace(_) => panic!("remote call expected"),
        }

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "https://api.vk.com/method/getProfiles");
    }

    #[tokio::test]
    async fn test_call_returns_response_payload() {
        let (session, _) = session_with(r#"{"response": {"uid": "123"}}"#);

        let value = session.call("get_profiles", Params::new()).await.unwrap();
        assert_eq!(value, json!({"uid": "123"}));
    }

    #[tokio::test]
    async fn test_call_qualifies_method_with_prefix() {
        let (session, transport) = session_with(r#"{"response": 1}"#);

        session
            .friends()
            .call("get", Params::new())
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].0, "https://api.vk.com/method/friends.get");
    }

    #[tokio::test]
    async fn test_call_injects_access_token() {
        let (session, transport) = session_with(r#"{"response": 1}"#);

        let mut params = Params::new();
        params.insert("access_token".to_string(), json!("forged"));
        params.insert("uid".to_string(), json!(1));

        session.call("get", params).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].1.get("access_token").unwrap(), "s3cret");
        assert_eq!(requests[0].1.get("uid").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_server_error_carries_context() {
        let body = r#"{"error": {"error_code": 5, "error_msg": "bad token"}}"#;
        let (session, _) = session_with(body);

        let err = session
            .friends()
            .call("get", Params::new())
            .await
            .unwrap_err();

        match err {
            ApiError::Server(server) => {
                assert_eq!(server.method, "friends.get");
                assert_eq!(
                    server.error,
                    json!({"error_code": 5, "error_msg": "bad token"})
                );
                assert_eq!(server.params.get("access_token").unwrap(), "s3cret");
                assert!(server.to_string().contains("bad token"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_null_error_field_is_success() {
        let (session, _) = session_with(r#"{"error": null, "response": 7}"#);

        let value = session.call("get", Params::new()).await.unwrap();
        assert_eq!(value, json!(7));
    }

    #[tokio::test]
    async fn test_missing_response_is_null() {
        let (session, _) = session_with("{}");

        let value = session.call("get", Params::new()).await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_a_server_error() {
        let (session, _) = session_with("<html>gateway timeout</html>");

        let err = session.call("get", Params::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Json(_)));
    }
}
