//! Main client implementation

use parking_lot::RwLock;
use riak_core::escape::escape;
use riak_core::{Serializer, SerializerRegistry, CLIENT_ID};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::feature_detection::{Capabilities, ServerVersion};
use crate::http_backend::HttpBackend;
use crate::transport::{Request, Response, Transport};
use crate::{Bucket, ClientConfig, ClientError, Result};

/// Handle to a Riak node. Cloning is cheap and shares the transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    serializers: SerializerRegistry,
    server_version: RwLock<Option<ServerVersion>>,
}

/// Assembles a [`Client`] with a custom transport or serializers.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    serializers: SerializerRegistry,
}

impl ClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register a serializer that takes precedence over the built-ins.
    pub fn serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializers.register(serializer);
        self
    }

    pub fn serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    pub fn build(self) -> Result<Client> {
        self.config.validate()?;

        let server_version = match &self.config.server_version {
            Some(raw) => Some(ServerVersion::parse(raw).ok_or_else(|| {
                ClientError::Config(format!("unparsable server version '{}'", raw))
            })?),
            None => None,
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpBackend::new(&self.config)?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
                serializers: self.serializers,
                server_version: RwLock::new(server_version),
            }),
        })
    }
}

impl Client {
    /// Create a client speaking HTTP to the configured node.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Client::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            transport: None,
            serializers: SerializerRegistry::default(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.inner.serializers
    }

    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.clone(), name)
    }

    /// Escaped resource path of a bucket, or of a key within it.
    pub fn object_path(&self, bucket: &str, key: Option<&str>) -> String {
        let mut segments = vec![escape(bucket)];
        if let Some(key) = key {
            segments.push(escape(key));
        }
        join_path(&self.inner.config.prefix, &segments)
    }

    /// Absolute URL of a path on this node.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.base_url(), path)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(*self.inner.server_version.read())
    }

    /// Ask the node for its version (`GET /stats`) and use it for subsequent
    /// capability checks.
    pub async fn detect_server_version(&self) -> Result<ServerVersion> {
        let response = self.request(Request::get("/stats").expect(&[200])).await?;
        let stats: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::InvalidResponse(format!("stats body is not JSON: {}", e)))?;
        let raw = stats
            .get("riak_kv_version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ClientError::InvalidResponse("stats did not report riak_kv_version".to_string())
            })?;
        let version = ServerVersion::parse(raw).ok_or_else(|| {
            ClientError::InvalidResponse(format!("unparsable riak_kv_version '{}'", raw))
        })?;

        info!("Detected server version {}", version);
        *self.inner.server_version.write() = Some(version);
        Ok(version)
    }

    /// Send a request and check the status against `request.expect`.
    pub async fn request(&self, mut request: Request) -> Result<Response> {
        if request.header_value(CLIENT_ID).is_none() {
            request = request.header("X-Riak-ClientId", self.inner.config.client_id.clone());
        }
        let method = request.method;
        debug!("Sending {} {}", method, request.path_and_query());

        let response = self.inner.transport.perform(&request).await?;

        if request.accepts(response.status) {
            debug!("{} {} -> {}", method, request.path, response.status);
            Ok(response)
        } else {
            if response.status == 404 {
                debug!("{} {} -> not found", method, request.path);
            } else {
                warn!(
                    "{} {} -> {} (expected {:?})",
                    method, request.path, response.status, request.expect
                );
            }
            Err(ClientError::RequestFailed {
                method,
                path: request.path,
                expected: request.expect,
                status: response.status,
                headers: response.headers,
                body: response.body,
            })
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url())
            .field("prefix", &self.inner.config.prefix)
            .field("serializers", &self.inner.serializers)
            .finish()
    }
}

fn join_path(prefix: &str, segments: &[String]) -> String {
    let prefix = prefix.trim_matches('/');
    let mut path = String::from("/");
    if !prefix.is_empty() {
        path.push_str(prefix);
        path.push('/');
    }
    path.push_str(&segments.join("/"));
    path
}
