use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use futures::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::io::DuplexStream;
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::{reply, Filter, Rejection, Reply};

use super::types::{ApiError, AttachQuery, LifecycleQuery};
use crate::attach::types::{Acknowledgement, StreamProvisioner, StreamSet};
use crate::container_management::{ContainerService, LifecycleOperation};
use crate::error_handling::types::{ServiceError, WebError};
use crate::runtime::types::{OutputStream, StreamSlot};

/// Optional API version segment (`/v1.43/...`) accepted in front of every route.
pub const API_VERSION_PATTERN: &str = r"^v\d+\.\d+$";
pub const MULTIPLEXED_STREAM: &str = "application/vnd.docker.multiplexed-stream";
const ATTACH_PIPE_CAPACITY: usize = 32 * 1024;

/// Complete API: every route, with rejections turned into JSON errors.
pub fn api(
    service: Arc<ContainerService>,
) -> Result<impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone, WebError> {
    let version = api_version(Regex::new(API_VERSION_PATTERN)?);

    Ok(ping_route(version.clone())
        .or(attach_route(version.clone(), service.clone()))
        .or(lifecycle_route(version, service))
        .recover(handle_rejection))
}

/// Consumes a leading version segment when there is one.
fn api_version(pattern: Regex) -> impl Filter<Extract = (), Error = Infallible> + Clone {
    let versioned = warp::path::param::<String>()
        .and_then(move |segment: String| {
            let matched = pattern.is_match(&segment);
            async move {
                if matched {
                    Ok(())
                } else {
                    Err(warp::reject::not_found())
                }
            }
        })
        .untuple_one();

    versioned.or(warp::any()).unify()
}

fn with_service(
    service: Arc<ContainerService>,
) -> impl Filter<Extract = (Arc<ContainerService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// GET /_ping
pub fn ping_route(
    version: impl Filter<Extract = (), Error = Infallible> + Clone,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    version
        .and(warp::path!("_ping"))
        .and(warp::get().or(warp::head()).unify())
        .map(|| "OK")
}

/// POST /containers/:ref/{pause,unpause,stop,restart}
pub fn lifecycle_route(
    version: impl Filter<Extract = (), Error = Infallible> + Clone,
    service: Arc<ContainerService>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    version
        .and(warp::path!("containers" / String / LifecycleOperation))
        .and(warp::post())
        .and(warp::query::<LifecycleQuery>())
        .and(with_service(service))
        .and_then(
            |reference: String,
             operation: LifecycleOperation,
             query: LifecycleQuery,
             service: Arc<ContainerService>| async move {
                let request_id = Uuid::new_v4();
                info!("[{}] {} container {}", request_id, operation, reference);

                let response = match service
                    .apply(operation, &reference, &query.into_options())
                    .await
                {
                    Ok(()) => reply::with_status(reply(), StatusCode::NO_CONTENT).into_response(),
                    Err(e) => {
                        warn!("[{}] {} {} failed: {}", request_id, operation, reference, e);
                        error_response(&e)
                    }
                };
                Ok::<_, Rejection>(response)
            },
        )
}

/// POST /containers/:ref/attach
pub fn attach_route(
    version: impl Filter<Extract = (), Error = Infallible> + Clone,
    service: Arc<ContainerService>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    version
        .and(warp::path!("containers" / String / "attach"))
        .and(warp::post())
        .and(warp::query::<AttachQuery>())
        .and(with_service(service))
        .and_then(attach_handler)
}

async fn attach_handler(
    reference: String,
    query: AttachQuery,
    service: Arc<ContainerService>,
) -> Result<Response, Rejection> {
    let request_id = Uuid::new_v4();
    info!("[{}] attach container {}", request_id, reference);

    let (output, body) = tokio::io::duplex(ATTACH_PIPE_CAPACITY);
    let (ack_tx, ack_rx) = oneshot::channel();
    let options = query.into_options(Box::new(HttpStreams {
        output,
        ack: ack_tx,
    }));

    let cancel = CancellationToken::new();
    let session_cancel = cancel.clone();
    let session = tokio::spawn(async move {
        let result = service.attach(&session_cancel, &reference, options).await;
        match &result {
            Ok(()) => debug!("[{}] attach session on {} ended", request_id, reference),
            Err(e) => warn!("[{}] attach on {} failed: {}", request_id, reference, e),
        }
        result
    });

    // the response head goes out once the streams are acknowledged
    if ack_rx.await.is_ok() {
        return Ok(stream_response(body, cancel));
    }

    match session.await {
        Ok(Ok(())) => Ok(stream_response(body, cancel)),
        Ok(Err(e)) => Ok(error_response(&e)),
        Err(e) => {
            error!("[{}] attach task failed: {}", request_id, e);
            Ok(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "attach session aborted",
            ))
        }
    }
}

/// Streams handed out by the HTTP transport: one in-memory pipe towards the response body.
///
/// There is no connection upgrade, so the caller's stdin is never available.
struct HttpStreams {
    output: DuplexStream,
    ack: oneshot::Sender<()>,
}

impl StreamProvisioner for HttpStreams {
    fn provision(self: Box<Self>, cancel: &CancellationToken) -> io::Result<StreamSet> {
        if cancel.is_cancelled() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "client disconnected before the attach started",
            ));
        }

        let HttpStreams { output, ack } = *self;
        let stdout: OutputStream = Box::new(output);
        Ok(StreamSet {
            stdin: StreamSlot::Absent,
            stdout: StreamSlot::Present(stdout),
            stderr: StreamSlot::Absent,
            ack: Acknowledgement::new(move || {
                // the handler may already be gone
                let _ = ack.send(());
            }),
        })
    }
}

/// Response whose body is the read half of the attach pipe.
///
/// Dropping the body (client disconnect) cancels the attach session.
fn stream_response(body: DuplexStream, cancel: CancellationToken) -> Response {
    let guard = cancel.drop_guard();
    let chunks = ReaderStream::new(body).map(move |chunk| {
        let _guard = &guard;
        chunk
    });

    let mut response = Response::new(Body::wrap_stream(chunks));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(MULTIPLEXED_STREAM));
    response
}

/// HTTP status of a service error.
pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::NotModified(_) => StatusCode::NOT_MODIFIED,
        ServiceError::Ambiguous(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &ServiceError) -> Response {
    match status_for(err) {
        // a 304 carries no body
        StatusCode::NOT_MODIFIED => {
            reply::with_status(reply(), StatusCode::NOT_MODIFIED).into_response()
        }
        status => json_error(status, err.to_string()),
    }
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    reply::with_status(reply::json(&ApiError::new(message)), status).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let response = if err.is_not_found() {
        json_error(StatusCode::NOT_FOUND, "page not found")
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        json_error(StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else {
        warn!("unhandled rejection: {:?}", err);
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    };
    Ok(response)
}
