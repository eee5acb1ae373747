use super::dispatch::Bridge;
use super::protocol::BridgeRequest;
use crate::error::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Serve JSON-line requests from `reader`.
///
/// Each request gets one response line on `writer`; events of the scanner
/// are interleaved as notification lines as they happen. At end of input any
/// running session is stopped and the function returns.
pub async fn serve_lines<R, W>(bridge: &Bridge, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut notifications = bridge.notifications();
    let mut requests = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Request input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                requests += 1;
                let response = bridge.handle_json(&line).await;
                write_line(&mut writer, &response).await?;
            }
            notification = notifications.next() => {
                let Some(notification) = notification else {
                    break;
                };
                write_line(&mut writer, &serde_json::to_string(&notification)?).await?;
            }
        }
    }

    bridge.handle(BridgeRequest::StopDecoding).await;
    writer.flush().await?;
    info!("Served {} bridge requests", requests);
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
