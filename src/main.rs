//! Demo peer for the `streamwire` protocol.
//!
//! `streamwire listen` runs an echo service over TCP; `streamwire send`
//! sends a single request to it and prints the reply.

mod cli;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::Parser;
use streamwire::{
    ReceiveRequest,
    RequestHandler,
    ResponseMessageStream,
    StreamingConfig,
    StreamingConnection,
    StreamingRequest,
    StreamingResponse,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::cli::{Cli, Command};

/// Answers every request with its own body.
struct Echo;

#[async_trait]
impl RequestHandler for Echo {
    async fn process_request(&self, request: ReceiveRequest) -> Option<StreamingResponse> {
        info!(verb = %request.verb, path = %request.path, "request");
        let mut response = StreamingResponse::ok();
        for stream in &request.streams {
            let content = stream.read_to_end().await;
            let mut echoed = ResponseMessageStream::new(content);
            if let Some(content_type) = stream.content_type() {
                echoed = echoed.with_content_type(content_type);
            }
            response.add_stream(echoed);
        }
        Some(response)
    }
}

/// Refuses every request; the sending side only issues requests.
struct Refuse;

#[async_trait]
impl RequestHandler for Refuse {
    async fn process_request(&self, _request: ReceiveRequest) -> Option<StreamingResponse> {
        Some(StreamingResponse::forbidden())
    }
}

async fn listen(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (socket, peer) = listener.accept().await?;
        tokio::spawn(async move {
            let connection =
                StreamingConnection::from_io(socket, Arc::new(Echo), StreamingConfig::default());
            if let Err(e) = connection.start() {
                warn!(%peer, error = %e, "failed to start connection");
                return;
            }
            info!(%peer, "peer connected");
            connection.closed().await;
            info!(%peer, "peer disconnected");
        });
    }
}

async fn send(
    addr: &str,
    verb: String,
    path: String,
    body: Option<String>,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let socket = TcpStream::connect(addr).await?;
    let config = StreamingConfig::builder()
        .response_timeout(Some(timeout))
        .build()?;
    let connection = StreamingConnection::from_io(socket, Arc::new(Refuse), config);
    connection.start()?;

    let mut request = StreamingRequest::new(verb, path);
    if let Some(body) = body {
        request.add_stream(ResponseMessageStream::new(body));
    }
    let response = connection.send(&request).await?;
    let body = response.read_body_as_string().await?;
    println!("{} {body}", response.status_code);
    connection.disconnect().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Command::Listen { addr } => listen(&addr).await,
        Command::Send {
            addr,
            verb,
            path,
            body,
            timeout,
        } => send(&addr, verb, path, body, Duration::from_secs(timeout)).await,
    }
}
