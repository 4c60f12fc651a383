use crate::{
    core::{Decision, ParsedResource, Policy},
    k8s::{DynamicObject, PipelineRun, Resource},
    metrics::AdmissionMetrics,
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};


/// Serves `PipelineRun` admission reviews.
#[derive(Clone, Debug)]
pub struct Admission {
    policy: Arc<Policy>,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] BoxError),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type Body = http_body_util::Full<bytes::Bytes>;
type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

// === impl Admission ===

impl<B> tower::Service<Request<B>> for Admission
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri());
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::Request(e.into()))?
                .to_bytes();
            json_response(admission.review(&bytes))
        })
    }
}

impl Admission {
    pub fn new(policy: Arc<Policy>, metrics: AdmissionMetrics) -> Self {
        Self { policy, metrics }
    }

    /// Decodes an `AdmissionReview` envelope and produces the review to send
    /// back. Envelopes that cannot be decoded are answered with an invalid
    /// response rather than an HTTP error.
    pub fn review(&self, body: &[u8]) -> AdmissionReview {
        let review: AdmissionReview = match serde_json::from_slice(body) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                self.metrics.invalid();
                return AdmissionResponse::invalid(error).into_review();
            }
        };
        trace!(?review);

        let rsp = match review.try_into() {
            Ok(req) => {
                debug!(?req);
                self.admit(req)
            }
            Err(error) => {
                warn!(%error, "Invalid admission request");
                self.metrics.invalid();
                AdmissionResponse::invalid(error)
            }
        };
        debug!(?rsp);
        rsp.into_review()
    }

    fn admit(&self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);

        if !is_kind::<PipelineRun>(&req) {
            self.metrics.invalid();
            return rsp.deny(format_args!(
                "unsupported resource type: {}.{}.{}",
                req.kind.group, req.kind.version, req.kind.kind
            ));
        }

        let AdmissionRequest {
            uid,
            name,
            namespace,
            user_info,
            object,
            ..
        } = req;
        let Some(obj) = object else {
            info!(%uid, %name, "Admission request missing object");
            self.metrics.invalid();
            return rsp.deny("admission request missing 'object'");
        };

        let requester = user_info.username.unwrap_or_default();
        let decision = self.policy.evaluate_parsed(
            &uid,
            &requester,
            ParsedResource::from_object(obj),
        );
        self.metrics.decided(&decision);

        let ns = namespace.unwrap_or_default();
        if decision.allowed {
            debug!(%uid, %ns, %name, %requester, "Admitted");
        } else {
            info!(
                %uid,
                %ns,
                %name,
                %requester,
                reason = %decision.reason,
                message = %decision.message,
                "Denied"
            );
        }

        into_response(rsp, decision)
    }
}

fn into_response(mut rsp: AdmissionResponse, decision: Decision) -> AdmissionResponse {
    if !decision.allowed {
        return rsp.deny(decision.message);
    }
    rsp.result.message = decision.message;
    rsp
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
