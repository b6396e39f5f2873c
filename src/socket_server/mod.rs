pub mod config;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    net::{UnixListener, UnixStream},
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tokio_util::{
    codec::{Framed, LinesCodec},
    sync::CancellationToken,
};
use tracing::{debug, error, info, warn};

use crate::{
    protocol::{
        client_command::ClientCommand, parse_command, serialize_response,
        server_response::{ErrorCode, ServerResponse},
    },
    station_manager::{command::Command, StationManager},
    sync::event::UiEvent,
};
use config::SocketServerConfig;

type ClientStream = Framed<UnixStream, LinesCodec>;

pub struct SocketServer {
    config: SocketServerConfig,
    manager: Arc<StationManager>,
    shutdown: CancellationToken,
    acceptor: Option<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

/// Holds one of the `max_connections` slots until the client goes away.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn claim(active: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(active.clone()))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        let remaining = self.0.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!("Client disconnected. Active connections: {}", remaining);
    }
}

impl SocketServer {
    pub fn new(config: SocketServerConfig, manager: Arc<StationManager>) -> Self {
        Self {
            config,
            manager,
            shutdown: CancellationToken::new(),
            acceptor: None,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub async fn start(&mut self) -> Result<()> {
        if Path::new(&self.config.socket_path).exists() {
            tokio::fs::remove_file(&self.config.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.config.socket_path)?;
        info!("Socket server listening on: {}", self.config.socket_path);

        let manager = self.manager.clone();
        let shutdown = self.shutdown.clone();
        let active = self.active.clone();
        let max_connections = self.config.max_connections;
        let max_line = self.config.buffer_size;

        self.acceptor = Some(tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    },
                };

                let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(max_line));
                let Some(slot) = ConnectionSlot::claim(&active, max_connections) else {
                    warn!("Maximum connections reached ({}), refusing client", max_connections);
                    let refusal = ServerResponse::failure(
                        None,
                        ErrorCode::CommandFailed,
                        "Too many connections",
                    );
                    if let Ok(line) = serialize_response(&refusal) {
                        let _ = framed.send(line).await;
                    }
                    continue;
                };
                debug!("New client connected. Active connections: {}", active.load(Ordering::Acquire));

                let manager = manager.clone();
                let shutdown = shutdown.child_token();
                tokio::spawn(async move {
                    let _slot = slot;
                    if let Err(e) = Self::handle_client(framed, manager, shutdown).await {
                        error!("Client handler error: {}", e);
                    }
                });
            }
            info!("Socket server shutting down");
        }));

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.await?;
        }

        if Path::new(&self.config.socket_path).exists() {
            tokio::fs::remove_file(&self.config.socket_path).await?;
        }

        info!("Socket server shutdown complete");
        Ok(())
    }

    async fn handle_client(
        mut framed: ClientStream,
        manager: Arc<StationManager>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut events: Option<broadcast::Receiver<UiEvent>> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Shutdown signal received, closing client connection");
                    break;
                }
                line = framed.next() => match line {
                    Some(Ok(line)) => {
                        debug!("Received command: {}", line);
                        let response = Self::process_command(&line, &manager, &mut events).await;
                        framed.send(serialize_response(&response)?).await?;
                    }
                    Some(Err(e)) => {
                        error!("Error reading from client: {}", e);
                        break;
                    }
                    None => break,
                },
                event = Self::next_event(&mut events) => match event {
                    Ok(event) => {
                        framed.send(serialize_response(&ServerResponse::event(event))?).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Client lagging, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Event stream closed");
                        events = None;
                    }
                },
            }
        }

        Ok(())
    }

    /// Resolves with the next UI event, or never if the client has not
    /// subscribed.
    async fn next_event(
        events: &mut Option<broadcast::Receiver<UiEvent>>,
    ) -> Result<UiEvent, RecvError> {
        match events {
            Some(rx) => rx.recv().await,
            None => futures::future::pending().await,
        }
    }

    async fn process_command(
        line: &str,
        manager: &StationManager,
        events: &mut Option<broadcast::Receiver<UiEvent>>,
    ) -> ServerResponse {
        let command = match parse_command(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                return ServerResponse::failure(
                    None,
                    ErrorCode::InvalidCommand,
                    format!("Failed to parse command: {}", e),
                );
            }
        };

        let command_id = command.id().cloned();

        let result = match command {
            ClientCommand::Subscribe { .. } => {
                if events.is_none() {
                    *events = Some(manager.subscribe());
                }
                Ok(json!({"subscribed": true}))
            }
            ClientCommand::Unsubscribe { .. } => {
                *events = None;
                Ok(json!({"subscribed": false}))
            }
            command => Self::execute_command(command, manager).await,
        };

        ServerResponse::from_result(command_id, result)
    }

    async fn execute_command(
        command: ClientCommand,
        manager: &StationManager,
    ) -> Result<serde_json::Value> {
        match command {
            ClientCommand::Move {
                station,
                axis,
                target,
                enforce_limits,
                ..
            } => {
                manager
                    .request(|resp| Command::Move {
                        station,
                        axis,
                        target,
                        enforce_limits,
                        resp,
                    })
                    .await
            }
            ClientCommand::RunPreset {
                station, preset, ..
            } => {
                manager
                    .request(|resp| Command::RunPreset {
                        station,
                        preset,
                        resp,
                    })
                    .await
            }
            ClientCommand::Jog {
                station,
                axis,
                step,
                ..
            } => {
                manager
                    .request(|resp| Command::Jog {
                        station,
                        axis,
                        step,
                        resp,
                    })
                    .await
            }
            ClientCommand::StopAll { station, .. } => {
                manager
                    .request(|resp| Command::StopAll { station, resp })
                    .await
            }
            ClientCommand::StopAxis { station, axis, .. } => {
                manager
                    .request(|resp| Command::StopAxis {
                        station,
                        axis,
                        resp,
                    })
                    .await
            }
            ClientCommand::SetLimits {
                station,
                axis,
                low,
                high,
                ..
            } => {
                manager
                    .request(|resp| Command::SetLimits {
                        station,
                        axis,
                        low,
                        high,
                        resp,
                    })
                    .await
            }
            ClientCommand::ZeroOffset { station, axis, .. } => {
                manager
                    .request(|resp| Command::ZeroOffset {
                        station,
                        axis,
                        resp,
                    })
                    .await
            }
            ClientCommand::Snapshot { station, .. } => {
                manager
                    .request(|resp| Command::Snapshot { station, resp })
                    .await
            }
            ClientCommand::ListStations { .. } => {
                manager
                    .request(|resp| Command::ListStations { resp })
                    .await
            }
            ClientCommand::ListAxes { station, .. } => {
                manager
                    .request(|resp| Command::ListAxes { station, resp })
                    .await
            }
            ClientCommand::Ping { .. } => Ok(json!({
                "message": "pong",
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
            ClientCommand::Subscribe { .. } | ClientCommand::Unsubscribe { .. } => {
                Err(anyhow::anyhow!("Subscriptions are handled per connection"))
            }
        }
    }
}
