//! Axum HTTP + WebSocket server: setup/login/terminal pages depending on auth state,
//! and `/ws` for the live browser terminal. One PTY session per socket, keyed by a
//! fresh client id minted on connect; disconnect tears the session down.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use futures_util::{SinkExt, StreamExt};

use shellbridge_core::auth::{self, SessionStore};
use shellbridge_core::config::{self, Config};
use shellbridge_core::log::prefix;
use shellbridge_core::pty;
use shellbridge_core::registry::{SessionRecord, SessionRegistry};
use shellbridge_core::sink::{DynSink, SocketSink};
use shellbridge_core::streamer;

const COOKIE_NAME: &str = "session";

#[derive(Clone)]
struct AppState {
    config: Arc<Mutex<Config>>,
    sessions: Arc<SessionRegistry>,
    auth: Arc<SessionStore>,
}

pub async fn run_web_server(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState {
        config: Arc::new(Mutex::new(config::load())),
        sessions: Arc::new(SessionRegistry::new()),
        auth: Arc::new(SessionStore::new()),
    };

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/setup-password", post(setup_password_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    eprintln!("{} event=listening addr={}", prefix("web"), addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn is_authenticated(state: &AppState, jar: &CookieJar) -> bool {
    jar.get(COOKIE_NAME)
        .map(|c| state.auth.is_valid(c.value()))
        .unwrap_or(false)
}

async fn index_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    let has_password = state.config.lock().unwrap().webui_password_hash.is_some();
    if !has_password {
        return Html(SETUP_PAGE).into_response();
    }
    if !is_authenticated(&state, &jar) {
        return Html(LOGIN_PAGE).into_response();
    }
    Html(TERMINAL_PAGE).into_response()
}

#[derive(serde::Deserialize)]
struct SetupForm {
    password: String,
    confirm: String,
}

async fn setup_password_handler(
    State(state): State<AppState>,
    Form(form): Form<SetupForm>,
) -> Response {
    {
        let cfg = state.config.lock().unwrap();
        if cfg.webui_password_hash.is_some() {
            return Redirect::to("/").into_response();
        }
    }
    if form.password.is_empty() || form.password != form.confirm {
        return (StatusCode::BAD_REQUEST, "password must be non-empty and match confirmation").into_response();
    }
    let hash = match auth::hash_password(&form.password) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("{} event=hash_failed error={}", prefix("web"), e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to store password").into_response();
        }
    };
    {
        let mut cfg = state.config.lock().unwrap();
        cfg.webui_password_hash = Some(hash);
        if let Err(e) = config::save(&cfg) {
            eprintln!("{} event=config_save_failed error={}", prefix("web"), e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to persist config").into_response();
        }
    }
    let token = state.auth.issue();
    (session_jar(token), Redirect::to("/")).into_response()
}

#[derive(serde::Deserialize)]
struct LoginForm {
    password: String,
}

async fn login_handler(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let hash = state.config.lock().unwrap().webui_password_hash.clone();
    let Some(hash) = hash else {
        return Redirect::to("/").into_response();
    };
    if !auth::verify_password(&form.password, &hash) {
        return (StatusCode::UNAUTHORIZED, "wrong password").into_response();
    }
    let token = state.auth.issue();
    (session_jar(token), Redirect::to("/")).into_response()
}

async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(COOKIE_NAME) {
        state.auth.revoke(cookie.value());
    }
    (jar.remove(Cookie::from(COOKIE_NAME)), Redirect::to("/")).into_response()
}

fn session_jar(token: String) -> CookieJar {
    let mut cookie = Cookie::new(COOKIE_NAME, token);
    cookie.set_http_only(true);
    cookie.set_same_site(axum_extra::extract::cookie::SameSite::Strict);
    cookie.set_path("/");
    CookieJar::new().add(cookie)
}

/// Allowed iff the Origin header is absent or matches the request's own Host with an
/// http/https scheme — a same-origin check that doesn't require the client to send a
/// CSRF token.
fn origin_is_allowed(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get("origin").and_then(|v| v.to_str().ok()) else {
        return true;
    };
    let Some(host) = headers.get("host").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    origin == format!("http://{host}") || origin == format!("https://{host}")
}

async fn ws_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !is_authenticated(&state, &jar) {
        return (StatusCode::UNAUTHORIZED, "not authenticated").into_response();
    }
    if !origin_is_allowed(&headers) {
        return (StatusCode::FORBIDDEN, "cross-origin upgrade rejected").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(serde::Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    rows: Option<u16>,
    #[serde(default)]
    cols: Option<u16>,
}

#[derive(serde::Serialize)]
struct ServerMessage<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    content: &'a str,
    #[serde(rename = "chatId")]
    chat_id: &'a str,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (text_tx, mut text_rx) = tokio::sync::mpsc::channel::<String>(64);
    let sink: DynSink = Arc::new(SocketSink::new(text_tx));

    let (pty, output_rx) = match pty::spawn() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ws_tx
                .send(Message::Text(error_frame(&client_id, &e.to_string()).into()))
                .await;
            return;
        }
    };
    let record = Arc::new(SessionRecord::new(pty.clone(), sink.clone(), "shell".to_string()));
    state.sessions.create_if_absent(&client_id, || record.clone());

    let streamer_pty = pty.clone();
    let streamer_client_id = client_id.clone();
    tokio::spawn(async move {
        streamer::socket::run(streamer_pty, output_rx, sink).await;
    });

    let writer_client_id = client_id.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(text) = text_rx.recv().await {
            let frame = serde_json::to_string(&ServerMessage {
                kind: "output",
                content: &text,
                chat_id: &writer_client_id,
            })
            .unwrap_or_default();
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        let Message::Text(raw) = msg else { continue };
        let Ok(parsed) = serde_json::from_str::<ClientMessage>(&raw) else {
            eprintln!("{} event=bad_frame raw={}", prefix("web.ws"), raw);
            continue;
        };
        dispatch_client_message(&state, &streamer_client_id, &record, parsed).await;
    }

    state.sessions.delete(&client_id);
    writer_task.abort();
}

async fn dispatch_client_message(
    state: &AppState,
    client_id: &str,
    record: &Arc<SessionRecord>,
    msg: ClientMessage,
) {
    match msg.kind.as_str() {
        "input" => {
            if let Some(content) = msg.content {
                record.pty.send_raw_input(content.as_bytes());
            }
        }
        "command" => {
            if let Some(content) = msg.content {
                record.pty.send_command(&content).await;
            }
        }
        "resize" => {
            if let (Some(rows), Some(cols)) = (msg.rows, msg.cols) {
                if rows > 0 && cols > 0 && record.is_active() {
                    record.pty.resize(rows, cols);
                }
            }
        }
        "stop" => {
            state.sessions.delete(client_id);
        }
        "status" => {
            let text = if record.is_active() { "active" } else { "inactive" };
            record.sink.send_status(text).await;
        }
        other => {
            eprintln!("{} event=unknown_message_type type={}", prefix("web.ws"), other);
        }
    }
}

fn error_frame(client_id: &str, message: &str) -> String {
    serde_json::to_string(&ServerMessage {
        kind: "error",
        content: message,
        chat_id: client_id,
    })
    .unwrap_or_default()
}

const SETUP_PAGE: &str = include_str!("../templates/setup.html");
const LOGIN_PAGE: &str = include_str!("../templates/login.html");
const TERMINAL_PAGE: &str = include_str!("../templates/terminal.html");
