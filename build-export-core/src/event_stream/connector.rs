use std::pin::Pin;

use futures::{Stream, StreamExt};
use http::{header, Method, StatusCode};
use hyper::{client::HttpConnector, Body, Client, Request};
use hyper_tls::HttpsConnector;

use super::{SseDecoder, SseEvent, StreamFault};
use crate::auth::AuthHeader;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<SseEvent, StreamFault>> + Send>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    pub url: String,
    pub auth_header: AuthHeader,
    pub last_event_id: Option<String>,
}

/// Opens a single attempt at reading an event stream.
///
/// A returned stream ends with an `Err` item when the attempt breaks; reconnecting is
/// the caller's business.
#[async_trait::async_trait]
pub trait StreamConnector: std::fmt::Debug + Send + Sync {
    async fn connect(&self, request: &StreamRequest) -> Result<EventStream, StreamFault>;
}

#[derive(Clone, Debug)]
pub struct HyperConnector {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl Default for HyperConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperConnector {
    pub fn new() -> HyperConnector {
        let https = HttpsConnector::new();
        HyperConnector {
            client: Client::builder().build::<_, Body>(https),
        }
    }

    fn build_request(request: &StreamRequest) -> Result<Request<Body>, StreamFault> {
        let uri = request.url.parse::<hyper::Uri>().map_err(|e| {
            StreamFault::Transport(format!("Unable to parse url {}: {}", request.url, e))
        })?;

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::AUTHORIZATION, request.auth_header.value());

        if let Some(last_event_id) = request.last_event_id.as_ref() {
            builder = builder.header("Last-Event-ID", last_event_id.as_str());
        }

        builder.body(Body::empty()).map_err(|e| {
            StreamFault::Transport(format!("Unable to build request for {}: {}", request.url, e))
        })
    }
}

#[async_trait::async_trait]
impl StreamConnector for HyperConnector {
    async fn connect(&self, request: &StreamRequest) -> Result<EventStream, StreamFault> {
        let req = Self::build_request(request)?;

        let response = self.client.request(req).await.map_err(|e| {
            StreamFault::Transport(format!("couldn't connect to {}: {}", request.url, e))
        })?;

        if response.status() != StatusCode::OK {
            return Err(StreamFault::Status(response.status().as_u16()));
        }

        let mut body = response.into_body();
        let url = request.url.clone();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(StreamFault::Transport(format!(
                            "Error reading event stream {}: {}",
                            url, e
                        )));
                        return;
                    }
                };
                match decoder.decode(&chunk) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(fault) => {
                        yield Err(fault);
                        return;
                    }
                }
            }
            yield Err(StreamFault::Ended);
        };
        Ok(Box::pin(stream))
    }
}
