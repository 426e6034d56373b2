//! Incoming request representation.
//!
//! # Responsibilities
//! - Tag every request with a unique request ID for tracing
//! - Keep the request head shared between all handlers of one request
//! - Hand the body to whichever handler takes it first
//! - Carry the location annotation written during classification
//!
//! # Design Decisions
//! - The location is parsed from the raw request target, verbatim: no
//!   percent-decoding, no dot-segment removal, no case folding
//! - The annotation is written at most once per request

use std::net::SocketAddr;
use std::sync::{Mutex, OnceLock};

use axum::body::Body;
use axum::http::{header, request::Parts, uri::InvalidUri, HeaderMap, Method, Request, Uri};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Parsed components of a request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pathname: String,
    query: Option<String>,
}

impl Location {
    /// Split a request target into pathname and query.
    ///
    /// Absolute-form targets (`http://host/path`) keep only their path.
    pub fn parse(uri: &Uri) -> Self {
        Self {
            pathname: uri.path().to_string(),
            query: uri.query().map(str::to_string),
        }
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// Raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded `application/x-www-form-urlencoded` query pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match &self.query {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }
}

/// A request as seen by host handlers and dispatcher subscribers.
///
/// Shared as `Arc<IncomingRequest>` between every handler invoked for it.
#[derive(Debug)]
pub struct IncomingRequest {
    id: Uuid,
    head: Parts,
    body: Mutex<Option<Body>>,
    peer: Option<SocketAddr>,
    location: OnceLock<Location>,
}

impl IncomingRequest {
    /// Wrap a full HTTP request.
    pub fn new(request: Request<Body>) -> Self {
        let (head, body) = request.into_parts();
        Self::from_parts(head, body)
    }

    /// Build from an already split request.
    ///
    /// Reuses an `x-request-id` header when it holds a valid UUID.
    pub fn from_parts(head: Parts, body: Body) -> Self {
        let id = head
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or_else(Uuid::new_v4);

        Self {
            id,
            head,
            body: Mutex::new(Some(body)),
            peer: None,
            location: OnceLock::new(),
        }
    }

    /// A bodiless GET for the given target.
    pub fn get(target: &str) -> Result<Self, InvalidUri> {
        let uri = target.parse::<Uri>()?;
        let mut request = Request::new(Body::empty());
        *request.uri_mut() = uri;
        Ok(Self::new(request))
    }

    /// Attach the peer address of the underlying connection.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn head(&self) -> &Parts {
        &self.head
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// True if the request asks for a protocol switch
    /// (`Connection: upgrade` together with an `Upgrade` header).
    pub fn is_upgrade(&self) -> bool {
        wants_upgrade(&self.head.headers)
    }

    /// Take the request body. Only the first caller gets it.
    pub fn take_body(&self) -> Option<Body> {
        self.body.lock().ok().and_then(|mut body| body.take())
    }

    /// Location annotation, present once the request has been classified.
    pub fn location(&self) -> Option<&Location> {
        self.location.get()
    }

    /// Parse the location if not done yet and return it.
    pub(crate) fn annotate(&self) -> &Location {
        self.location.get_or_init(|| Location::parse(&self.head.uri))
    }
}

/// True if the headers request a protocol upgrade.
pub fn wants_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}
