use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::DownloadError;
use crate::util::RingBytes;

#[derive(Debug)]
pub struct LineTap {
    pub line: String,
    pub stream: LineStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStream {
    Stdout,
    Stderr,
}

impl LineStream {
    fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Reads `rd` until EOF and forwards each line to `line_tx`.
///
/// Both `\n` and `\r` terminate a line, so carriage-return progress redraws
/// arrive as separate lines. When `ring` is set the raw bytes are kept too.
pub fn pump_lines<R>(
    mut rd: R,
    stream: LineStream,
    line_tx: mpsc::Sender<LineTap>,
    ring: Option<Arc<RingBytes>>,
) -> JoinHandle<Result<u64, DownloadError>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 16 * 1024];
        let mut total = 0u64;
        let mut line_buf: Vec<u8> = Vec::with_capacity(8 * 1024);

        loop {
            let n = rd
                .read(&mut buf)
                .await
                .map_err(|e| DownloadError::StreamIo {
                    stream: stream.label(),
                    source: e,
                })?;
            if n == 0 {
                break;
            }

            if let Some(ring) = &ring {
                ring.push(&buf[..n]);
            }
            total += n as u64;

            line_buf.extend_from_slice(&buf[..n]);
            while let Some(pos) = line_buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                let mut one = line_buf.drain(..=pos).collect::<Vec<u8>>();
                one.pop();
                if one.is_empty() {
                    continue;
                }
                let line = String::from_utf8_lossy(&one).into_owned();
                // Receiver gone means the task is being torn down; keep draining
                // so the child never blocks on a full pipe.
                let _ = line_tx.send(LineTap { line, stream }).await;
            }
        }

        // EOF flush: deliver the last partial line.
        if !line_buf.is_empty() {
            let line = String::from_utf8_lossy(&line_buf).into_owned();
            let _ = line_tx.send(LineTap { line, stream }).await;
        }

        Ok(total)
    })
}
