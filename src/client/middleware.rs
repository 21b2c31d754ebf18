//! Tower middleware that stamps outgoing requests with a User-Agent.
use http::header::{InvalidHeaderValue, USER_AGENT};
use http::{HeaderValue, Request};
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// `bigrocks/<version>`, sent with every request.
pub fn default_user_agent() -> String {
    format!("bigrocks/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone, Debug)]
pub struct UserAgentLayer {
    user_agent: HeaderValue,
}

impl UserAgentLayer {
    /// Fails on agents that are not valid header values.
    pub fn new(user_agent: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            user_agent: HeaderValue::from_str(user_agent)?,
        })
    }
}

impl Default for UserAgentLayer {
    fn default() -> Self {
        Self::new(&default_user_agent()).unwrap_or(Self {
            user_agent: HeaderValue::from_static("bigrocks"),
        })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Wraps an HTTP service and adds the agent header to requests that carry
/// none. An agent set by the caller is kept.
#[derive(Clone, Debug)]
pub struct UserAgentService<S> {
    inner: S,
    user_agent: HeaderValue,
}

impl<S, ReqBody> Service<Request<ReqBody>> for UserAgentService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.headers_mut()
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        self.inner.call(req)
    }
}
