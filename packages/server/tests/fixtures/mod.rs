//! Test server fixture.
//!
//! Starts the relay in-process on an ephemeral port and stops it on drop.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use syncroom_server::ui::{serve, state::AppState};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

pub struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let (stop, stopped) = oneshot::channel::<()>();

        let state = Arc::new(AppState::in_memory());
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = stopped.await;
            };
            serve(listener, state, shutdown)
                .await
                .expect("Test server failed");
        });

        Self {
            addr,
            stop: Some(stop),
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.abort();
    }
}
