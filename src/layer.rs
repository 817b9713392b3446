use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use http::{Request, Response, StatusCode};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{adapter::SessionAdapter, config::CookieSessionConfig, signer::Keyring};

/// Layer that loads a [`Session`](crate::Session) from a signed cookie and writes it back.
///
/// The session is inserted into request extensions. After the inner service responds, a
/// modified session is reissued as a `Set-Cookie` header, an emptied one has its cookie removed,
/// and an untouched one leaves the client's cookie alone.
#[derive(Debug, Clone)]
pub struct CookieSessionManagerLayer {
    adapter: SessionAdapter,
}

impl CookieSessionManagerLayer {
    /// Sign sessions with `keys` (a single [`SecretKey`](crate::SecretKey) or a [`Keyring`]).
    #[must_use]
    pub fn signed(keys: impl Into<Keyring>) -> Self {
        Self {
            adapter: SessionAdapter::new(keys),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CookieSessionConfig) -> Self {
        self.adapter = self.adapter.with_config(config);
        self
    }

    pub fn adapter(&self) -> &SessionAdapter {
        &self.adapter
    }
}

impl From<SessionAdapter> for CookieSessionManagerLayer {
    fn from(adapter: SessionAdapter) -> Self {
        Self { adapter }
    }
}

#[derive(Debug, Clone)]
pub struct CookieSessionManager<S> {
    inner: S,
    adapter: SessionAdapter,
}

impl<S> Layer<S> for CookieSessionManagerLayer {
    type Service = CookieManager<CookieSessionManager<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(CookieSessionManager {
            inner,
            adapter: self.adapter.clone(),
        })
    }
}

fn internal_server_error<B: Default>() -> Response<B> {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for CookieSessionManager<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let adapter = self.adapter.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(cookies) = req.extensions().get::<Cookies>().cloned() else {
                tracing::error!("missing cookies request extension");
                return Ok(internal_server_error());
            };

            let config = adapter.config();
            let raw_cookie = cookies
                .get(config.name())
                .map(|cookie| cookie.value().to_owned());
            let session = adapter.begin_request(raw_cookie.as_deref());
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            if res.status().is_server_error() {
                return Ok(res);
            }

            if session.is_empty() {
                if raw_cookie.is_some() {
                    cookies.remove(config.removal_cookie());
                    tracing::debug!("removed session cookie");
                }
                return Ok(res);
            }

            match adapter.finalize_response(&session) {
                Ok(Some(token)) => cookies.add(config.build_cookie(token.into_string())),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(err = %err, "cookie session save failed");
                    return Ok(internal_server_error());
                }
            }

            Ok(res)
        })
    }
}
