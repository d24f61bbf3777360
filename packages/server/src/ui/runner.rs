//! Router construction and the server loop.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::ServerArgs,
    error::ServerError,
    ui::{
        handler::{clear_rooms, get_room_detail, get_rooms, health_check, websocket_handler},
        signal::shutdown_signal,
        state::AppState,
    },
    usecase::ClearRoomsUseCase,
};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/rooms", get(get_rooms))
        .route("/api/rooms/{room}", get(get_room_detail))
        .route("/clear-rooms", get(clear_rooms))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// Rooms are cleared before accepting connections and again once shutdown starts.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let clear = ClearRoomsUseCase::new(state.registry.clone(), state.index.clone());
    clear.execute().await;

    let app = build_router(state.clone());
    let graceful = async move {
        shutdown.await;
        state.shutdown.send_replace(true);
        clear.execute().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await
        .map_err(ServerError::Serve)
}

/// Bind to the configured address and run until Ctrl-C / SIGTERM
pub async fn run(args: ServerArgs) -> Result<(), ServerError> {
    let addr = args.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!("Listening on {}", addr);

    let state = Arc::new(AppState::in_memory());
    serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}
