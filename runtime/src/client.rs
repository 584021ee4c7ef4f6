use bytes::Bytes;
use http::uri::{Scheme, Uri};
use hyper::client::connect::Connect;
use hyper::client::HttpConnector;
use hyper::{Body, Method, Request};

use crate::types::Diagnostic;
use crate::Error;

const API_VERSION: &str = "2018-06-01";

/// An HTTP client for the Lambda runtime interface.
#[derive(Debug)]
pub struct Client<C = HttpConnector> {
    base: Uri,
    client: hyper::Client<C>,
}

impl Client {
    /// Creates a client for the runtime API at `endpoint` (a `host:port`
    /// pair, the format of the `AWS_LAMBDA_RUNTIME_API` variable).
    pub fn new(endpoint: &str) -> Result<Self, Error> {
        let base = format!("http://{}", endpoint).parse::<Uri>()?;
        Ok(Client {
            base,
            client: hyper::Client::new(),
        })
    }
}

impl<C> Client<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    fn url(&self, path: &str) -> Result<Uri, Error> {
        let authority = self
            .base
            .authority()
            .ok_or("runtime API endpoint is missing an authority")?;
        let uri = Uri::builder()
            .scheme(self.base.scheme().cloned().unwrap_or(Scheme::HTTP))
            .authority(authority.clone())
            .path_and_query(path)
            .build()?;
        Ok(uri)
    }

    /// Polls the runtime API for the next invocation. The response body is
    /// the event payload; invocation metadata rides on the headers, ready
    /// for [`Context::try_from`](crate::Context).
    pub async fn next_invocation(&self) -> Result<hyper::Response<Body>, Error> {
        let uri = self.url(&format!("/{}/runtime/invocation/next", API_VERSION))?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())?;
        let res = self.client.request(req).await?;
        if !res.status().is_success() {
            return Err(format!("runtime API rejected poll: {}", res.status()).into());
        }
        Ok(res)
    }

    /// Posts the serialized result of an invocation to the response
    /// endpoint for `request_id`.
    pub async fn event_response(&self, request_id: &str, body: Bytes) -> Result<(), Error> {
        let uri = self.url(&format!(
            "/{}/runtime/invocation/{}/response",
            API_VERSION, request_id
        ))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))?;
        let res = self.client.request(req).await?;
        if !res.status().is_success() {
            return Err(format!("runtime API rejected response: {}", res.status()).into());
        }
        Ok(())
    }

    /// Posts a [`Diagnostic`] to the error endpoint for `request_id`.
    pub async fn event_error(&self, request_id: &str, diagnostic: &Diagnostic) -> Result<(), Error> {
        let uri = self.url(&format!(
            "/{}/runtime/invocation/{}/error",
            API_VERSION, request_id
        ))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(diagnostic)?))?;
        let res = self.client.request(req).await?;
        if !res.status().is_success() {
            return Err(format!("runtime API rejected error report: {}", res.status()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_against_the_endpoint() {
        let client = Client::new("127.0.0.1:9001").unwrap();
        let uri = client.url("/2018-06-01/runtime/invocation/next").unwrap();
        assert_eq!(
            uri.to_string(),
            "http://127.0.0.1:9001/2018-06-01/runtime/invocation/next"
        );
    }

    #[test]
    fn request_ids_appear_in_completion_urls() {
        let client = Client::new("127.0.0.1:9001").unwrap();
        let uri = client
            .url("/2018-06-01/runtime/invocation/8476a536-e9f4-11e8-9739-2dfe598c3fcd/response")
            .unwrap();
        assert!(uri.path().ends_with("/8476a536-e9f4-11e8-9739-2dfe598c3fcd/response"));
    }
}
