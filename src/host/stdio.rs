//! Stdin/stdout JSON bridge for the catalog host.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages, dispatches them
//! through the command channel, and writes one `ResponseEnvelope` JSON line
//! per command.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::error::{HostError, Result};
use crate::host::channel::{HostCommandClient, command_channel};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};
use crate::host::handler::CatalogHandler;

/// Request channel capacity for the stdio bridge.
const REQUEST_CAPACITY: usize = 64;

/// Run the bridge on the process's stdin/stdout until stdin closes or a
/// `stop` command is received.
pub async fn run_stdio_bridge(handler: CatalogHandler) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    run_bridge(handler, reader, writer).await
}

/// Run the bridge over arbitrary streams.
///
/// The command server runs on its own task; the reader loop runs on the
/// current one. When the reader finishes, the client is dropped and the
/// server drains and exits.
pub async fn run_bridge<R, W>(handler: CatalogHandler, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (client, server) = command_channel(REQUEST_CAPACITY, handler);
    let server_handle = tokio::spawn(server.run());

    let result = run_reader(client, reader, &mut writer).await;

    let _ = server_handle.await;
    result
}

async fn run_reader<R, W>(client: HostCommandClient, mut reader: R, writer: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| HostError::Channel(format!("failed to read from stdin: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("stdin closed (EOF); shutting down stdio bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse command envelope from stdin");
                let error_response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                write_line(writer, &serde_json::to_string(&error_response)?).await?;
                continue;
            }
        };

        let is_stop = envelope.command == CommandName::Stop;
        let response = client.send(envelope).await?;
        write_line(writer, &serde_json::to_string(&response)?).await?;

        if is_stop {
            tracing::info!("stop received; shutting down stdio bridge");
            break;
        }
    }

    Ok(())
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| HostError::Channel(format!("failed to write to stdout: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| HostError::Channel(format!("failed to write newline to stdout: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| HostError::Channel(format!("failed to flush stdout: {e}")))?;
    Ok(())
}
