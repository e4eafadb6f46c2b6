//! hyper-based transport

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use riak_core::{Headers, HeadersExt};
use tracing::debug;

use crate::transport::{Method, Request, Response, Transport};
use crate::{ClientConfig, ClientError, Result};

/// HTTP/1.1 transport over hyper's pooled client.
pub struct HttpBackend {
    scheme: String,
    authority: String,
    client: HyperClient<HttpConnector, Full<Bytes>>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base: Uri = config
            .base_url()
            .parse()
            .map_err(|e| ClientError::Connection(format!("Invalid node address: {}", e)))?;
        let (scheme, authority) = match (base.scheme_str(), base.authority()) {
            (Some(scheme), Some(authority)) => (scheme.to_string(), authority.to_string()),
            _ => {
                return Err(ClientError::Connection(format!(
                    "node address {} has no host",
                    config.base_url()
                )))
            }
        };

        let client = HyperClient::builder(TokioExecutor::new()).build_http();
        Ok(HttpBackend {
            scheme,
            authority,
            client,
        })
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    fn uri(&self, request: &Request) -> Result<Uri> {
        Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.as_str())
            .path_and_query(request.path_and_query())
            .build()
            .map_err(|e| ClientError::Http(format!("Invalid request URI: {}", e)))
    }
}

fn hyper_method(method: Method) -> hyper::Method {
    match method {
        Method::Head => hyper::Method::HEAD,
        Method::Get => hyper::Method::GET,
        Method::Put => hyper::Method::PUT,
        Method::Post => hyper::Method::POST,
        Method::Delete => hyper::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpBackend {
    async fn perform(&self, request: &Request) -> Result<Response> {
        let uri = self.uri(request)?;

        let mut builder = hyper::Request::builder()
            .method(hyper_method(request.method))
            .uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let body = Full::new(request.body.clone().unwrap_or_default());
        let outgoing = builder
            .body(body)
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let incoming = self
            .client
            .request(outgoing)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let status = incoming.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in incoming.headers() {
            headers.append_value(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }

        let body = if request.method == Method::Head {
            Bytes::new()
        } else {
            incoming
                .into_body()
                .collect()
                .await
                .map_err(|e| ClientError::Http(e.to_string()))?
                .to_bytes()
        };

        debug!("{} {} -> {} ({} bytes)", request.method, request.path, status, body.len());
        Ok(Response { status, headers, body })
    }
}
