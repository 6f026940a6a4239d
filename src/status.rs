// src/status.rs
// Read-only HTTP view of the arena: live counters and the leaderboard.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::archive::ResultEntry;
use crate::dispatcher::ArenaState;
use crate::logging::{log_debug, log_error, log_info};
use crate::room::{Room, RoomCapacity};

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub created: String,
    pub players: Vec<String>,
    pub time_limit_seconds: u64,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id().to_string(),
            created: room.created_at_string(),
            players: room.members().iter().map(|m| m.name.clone()).collect(),
            time_limit_seconds: room.time_limit_seconds(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub capacity: RoomCapacity,
    pub round_seconds: u64,
    pub waiting: usize,
    pub connections: usize,
    pub pieces: u64,
    pub active_rooms: usize,
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopResponse {
    pub entries: Vec<ResultEntry>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn status_snapshot(state: &ArenaState) -> StatusResponse {
    let rooms: Vec<RoomSummary> = state
        .registry
        .active_rooms()
        .iter()
        .map(|room| RoomSummary::from(room.as_ref()))
        .collect();
    StatusResponse {
        capacity: state.registry.capacity(),
        round_seconds: state.registry.round_seconds(),
        waiting: state.registry.waiting_count(),
        connections: state.connections(),
        pieces: state.pieces.len(),
        active_rooms: rooms.len(),
        rooms,
    }
}

/// Serve the status endpoint until shutdown is signalled
pub async fn serve_status(listener: TcpListener, state: Arc<ArenaState>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let state = Arc::clone(&state);
                    let io = TokioIo::new(stream);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            log_debug(&format!("Status connection ended with an error: {err}"));
                        }
                    });
                }
                Err(e) => {
                    log_error(&format!("Error accepting status connection: {e}"));
                }
            }
        }
    }
    log_info("Status endpoint shutting down...");
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ArenaState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/status") => json_response(StatusCode::OK, &status_snapshot(&state)),
        (&Method::GET, "/top") => {
            let entries = state.leaderboard().await;
            json_response(StatusCode::OK, &TopResponse { entries })
        }
        (_, "/status") | (_, "/top") => error_response(StatusCode::METHOD_NOT_ALLOWED, "Only GET is supported"),
        _ => error_response(StatusCode::NOT_FOUND, "Endpoint not found"),
    };
    Ok(response)
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            log_error(&format!("Could not serialize status response: {e}"));
            let mut response = Response::new(Full::new(Bytes::from_static(b"{}")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &ErrorResponse { error: message.to_string() })
}
