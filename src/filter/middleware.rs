//! Request pipeline integration.

use http::{Request, Response, StatusCode};

use super::{Filter, Verdict};

/// The rest of the request pipeline.
///
/// Implemented for any `Fn(Request<B>) -> Response<R>`, so a closure wrapping
/// the host server's own handler is enough.
pub trait Next<B> {
    /// Response body produced by the pipeline.
    type Body;

    /// Handle a request the filter let through.
    fn handle(&self, req: Request<B>) -> Response<Self::Body>;
}

impl<B, R, F> Next<B> for F
where
    F: Fn(Request<B>) -> Response<R>,
{
    type Body = R;

    fn handle(&self, req: Request<B>) -> Response<R> {
        self(req)
    }
}

impl Filter {
    /// Classify `req` and either pass it on or answer it.
    ///
    /// Denied requests get `403 Forbidden`, requests whose client address
    /// cannot be parsed get `400 Bad Request`.
    pub fn serve<B, N>(&self, req: Request<B>, remote_addr: &str, next: &N) -> Response<N::Body>
    where
        N: Next<B> + ?Sized,
        N::Body: From<&'static str>,
    {
        match self.classify(req.headers(), remote_addr) {
            Verdict::Allow => next.handle(req),
            Verdict::Deny => error_response(StatusCode::FORBIDDEN, "Access denied"),
            Verdict::InvalidInput => error_response(StatusCode::BAD_REQUEST, "Invalid IP address"),
        }
    }
}

fn error_response<T: From<&'static str>>(status: StatusCode, message: &'static str) -> Response<T> {
    let mut response = Response::new(T::from(message));
    *response.status_mut() = status;
    response
}
