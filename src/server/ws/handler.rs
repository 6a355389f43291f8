use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::protocol::{ClientMessage, Envelope, ServerMessage};
use crate::core::errors::ApiError;
use crate::execution::ExecutionResult;
use crate::server::handlers::execute::CodeRequest;
use crate::server::handlers::help::help_text;
use crate::state::AppState;

type Sender = SplitSink<WebSocket, Message>;
type Incoming = mpsc::UnboundedReceiver<Result<ClientMessage, String>>;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, client_id: String) {
    tracing::info!("Client {} connected", client_id);
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Result<ClientMessage, String>>();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let parsed = serde_json::from_str::<ClientMessage>(&text)
                        .map_err(|e| format!("Invalid message: {}", e));
                    if tx.send(parsed).is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    while let Some(incoming) = rx.recv().await {
        let handled = match incoming {
            Ok(message) => handle_message(&mut sender, &state, &mut rx, message).await,
            Err(reason) => send_message(&mut sender, ServerMessage::error(reason)).await,
        };
        if let Err(err) = handled {
            tracing::debug!("Closing socket for {}: {}", client_id, err);
            break;
        }
    }

    reader.abort();
    tracing::info!("Client {} disconnected", client_id);
}

/// `Err` only when the socket can no longer be written to.
async fn handle_message(
    sender: &mut Sender,
    state: &Arc<AppState>,
    rx: &mut Incoming,
    message: ClientMessage,
) -> Result<(), ApiError> {
    match message {
        ClientMessage::Ping => send_message(sender, ServerMessage::Pong).await,
        ClientMessage::Stop => send_message(sender, ServerMessage::Stopped).await,
        ClientMessage::QuickHelp(request) => match help_text(state, &request).await {
            Ok(help) => send_message(sender, ServerMessage::QuickHelp { help }).await,
            Err(err) => send_message(sender, ServerMessage::error(err.to_string())).await,
        },
        ClientMessage::RunCode(request) => run_code(sender, state, rx, request).await,
    }
}

enum Interrupt {
    Stopped,
    Disconnected,
}

/// Answers messages that arrive while a run is in progress. Returns the
/// interrupt that should end the run, if any.
async fn while_busy(
    sender: &mut Sender,
    incoming: Option<Result<ClientMessage, String>>,
) -> Result<Option<Interrupt>, ApiError> {
    match incoming {
        None => Ok(Some(Interrupt::Disconnected)),
        Some(Ok(ClientMessage::Stop)) => Ok(Some(Interrupt::Stopped)),
        Some(Ok(ClientMessage::Ping)) => {
            send_message(sender, ServerMessage::Pong).await?;
            Ok(None)
        }
        Some(Ok(_)) => {
            send_message(
                sender,
                ServerMessage::error("A run is already in progress; send stop first"),
            )
            .await?;
            Ok(None)
        }
        Some(Err(reason)) => {
            send_message(sender, ServerMessage::error(reason)).await?;
            Ok(None)
        }
    }
}

async fn run_code(
    sender: &mut Sender,
    state: &Arc<AppState>,
    rx: &mut Incoming,
    request: CodeRequest,
) -> Result<(), ApiError> {
    let language = match request.language() {
        Ok(language) => language,
        Err(err) => {
            return send_message(
                sender,
                ServerMessage::ExecutionError {
                    message: err.to_string(),
                },
            )
            .await;
        }
    };

    send_message(sender, ServerMessage::status("Starting code execution...")).await?;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let executor = state.executor.clone();
    let code = request.code.clone();
    let mut execution =
        tokio::spawn(async move { executor.execute(&code, language, Some(out_tx)).await });

    enum ExecEvent {
        Output(crate::execution::ExecutionOutput),
        Done(Result<ExecutionResult, tokio::task::JoinError>),
        Client(Option<Result<ClientMessage, String>>),
    }

    let joined = loop {
        let event = tokio::select! {
            biased;
            Some(output) = out_rx.recv() => ExecEvent::Output(output),
            joined = &mut execution => ExecEvent::Done(joined),
            incoming = rx.recv() => ExecEvent::Client(incoming),
        };

        match event {
            ExecEvent::Output(data) => {
                send_message(sender, ServerMessage::ExecutionOutput { data }).await?;
            }
            ExecEvent::Done(joined) => break joined,
            ExecEvent::Client(incoming) => match while_busy(sender, incoming).await {
                Ok(None) => {}
                Ok(Some(interrupt)) => {
                    // Aborting drops the child handle, which kills the process.
                    execution.abort();
                    return finish_interrupted(sender, interrupt).await;
                }
                Err(err) => {
                    execution.abort();
                    return Err(err);
                }
            },
        }
    };

    while let Ok(data) = out_rx.try_recv() {
        send_message(sender, ServerMessage::ExecutionOutput { data }).await?;
    }

    let result = match joined {
        Ok(result) => result,
        Err(err) => {
            tracing::error!("Execution task failed: {}", err);
            return send_message(
                sender,
                ServerMessage::ExecutionError {
                    message: format!("Execution task failed: {}", err),
                },
            )
            .await;
        }
    };

    send_message(
        sender,
        ServerMessage::ExecutionComplete {
            result: result.clone(),
        },
    )
    .await?;
    send_message(sender, ServerMessage::status("Generating AI explanation...")).await?;

    let mut explanation = state.tutor.explain(&request.code, language, result);

    enum StreamEvent {
        Chunk(Option<crate::graph::StreamChunk>),
        Client(Option<Result<ClientMessage, String>>),
    }

    let interrupted = loop {
        let event = tokio::select! {
            chunk = explanation.next() => StreamEvent::Chunk(chunk),
            incoming = rx.recv() => StreamEvent::Client(incoming),
        };

        match event {
            StreamEvent::Chunk(Some(chunk)) => {
                send_message(
                    sender,
                    ServerMessage::RagExplanation {
                        data: chunk.text(),
                        kind: chunk.kind(),
                    },
                )
                .await?;
            }
            StreamEvent::Chunk(None) => break None,
            StreamEvent::Client(incoming) => {
                if let Some(interrupt) = while_busy(sender, incoming).await? {
                    break Some(interrupt);
                }
            }
        }
    };
    // Dropping the stream cancels any stage still pending.
    drop(explanation);

    match interrupted {
        None => send_message(sender, ServerMessage::status("Ready")).await,
        Some(interrupt) => finish_interrupted(sender, interrupt).await,
    }
}

async fn finish_interrupted(sender: &mut Sender, interrupt: Interrupt) -> Result<(), ApiError> {
    match interrupt {
        Interrupt::Stopped => send_message(sender, ServerMessage::Stopped).await,
        Interrupt::Disconnected => Ok(()),
    }
}

pub async fn send_message(sender: &mut Sender, message: ServerMessage) -> Result<(), ApiError> {
    let text = serde_json::to_string(&Envelope::now(message)).map_err(ApiError::internal)?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(ApiError::internal)?;
    Ok(())
}
