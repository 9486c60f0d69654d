use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use dotenvy::dotenv;
use gauge_gamers::api::{normalize_pin, router, AppState};
use gauge_gamers::{establish_connection, initialize_schema};
use std::env;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env.");
    let admin_pin = env::var("ADMIN_PIN").expect("ADMIN_PIN must be set in .env.");
    if normalize_pin(&admin_pin).is_none() {
        panic!("ADMIN_PIN must be exactly 4 digits.");
    }

    // Apply the schema (idempotent) before the pool starts handing out
    // connections.
    let mut conn = establish_connection();
    initialize_schema(&mut conn).expect("Failed to initialize schema.");
    drop(conn);

    let manager = ConnectionManager::<SqliteConnection>::new(&database_url);
    let pool = Pool::builder()
        .build(manager)
        .expect("Failed to create pool.");

    let app = router(AppState { pool }).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "listening");
    let listener = TcpListener::bind(addr).await.expect("Failed to bind.");
    axum::serve(listener, app).await.expect("Server error.");
}
