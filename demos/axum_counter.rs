use std::net::SocketAddr;

use axum::{Router, routing::get};
use signed_session_cookie::{
    CookieSessionConfig, CookieSessionManagerLayer, Keyring, SameSite, SecretKey, Session,
};
use time::Duration;
use tracing_subscriber::EnvFilter;

async fn index(session: Session) -> String {
    let n: usize = session
        .get("n")
        .expect("session get succeeds")
        .unwrap_or(0);
    session
        .insert("n", n + 1)
        .expect("session insert succeeds");
    format!("n={n}")
}

async fn peek(session: Session) -> String {
    // Read-only: no Set-Cookie is emitted.
    let n: Option<usize> = session.get("n").expect("session get succeeds");
    format!("n={n:?}")
}

async fn reset(session: Session) -> &'static str {
    session.clear();
    "cleared"
}

fn keys() -> Keyring {
    // SESSION_KEY holds a base64 key of at least 32 bytes; SESSION_KEY_PREVIOUS an optional key
    // still accepted while rotating.
    let primary = match std::env::var("SESSION_KEY") {
        Ok(encoded) => SecretKey::from_base64(&encoded).expect("SESSION_KEY is a valid key"),
        Err(_) => {
            tracing::warn!("SESSION_KEY not set, sessions will not survive a restart");
            SecretKey::generate()
        }
    };
    let mut keys = Keyring::new(primary);
    if let Ok(encoded) = std::env::var("SESSION_KEY_PREVIOUS") {
        keys = keys.with_fallback(
            SecretKey::from_base64(&encoded).expect("SESSION_KEY_PREVIOUS is a valid key"),
        );
    }
    keys
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,signed_session_cookie=debug")),
        )
        .init();

    let session_config = CookieSessionConfig::default()
        // Default: "_app_session"
        .with_name("counter")
        // Default: true
        .with_http_only(true)
        // Default: SameSite::Lax
        .with_same_site(SameSite::Lax)
        // Default: none (browser-session cookie, no signed expiry)
        .with_max_age(Duration::hours(1))
        // Default: true (set to false for local HTTP development)
        .with_secure(false)
        // Default: "/"
        .with_path("/")
        // Default: None
        .without_domain()
        // Default: false
        .with_always_save(false)
        // Default: 3000
        .with_max_session_bytes(3000)
        // Default: 4096
        .with_max_token_bytes(4096);
    let session_layer = CookieSessionManagerLayer::signed(keys()).with_config(session_config);

    let app = Router::new()
        .route("/", get(index))
        .route("/peek", get(peek))
        .route("/reset", get(reset))
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    tracing::info!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
