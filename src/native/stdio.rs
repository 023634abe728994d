//! Stdio host: one JSON message per line in, one response per line out

use crate::bridge::Outbox;
use crate::core::{Inbound, Response};
use futures::stream::{self, Stream};
use serde_json::Value;
use std::cell::RefCell;
use std::io::Write;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Requests for `target` read from `reader`, one JSON document per line.
///
/// Blank lines, unparseable lines (invalid UTF-8 included) and messages
/// for other targets are skipped. The stream ends at EOF or on a read error.
pub fn read_requests<R>(reader: R, target: impl Into<String>) -> Pin<Box<dyn Stream<Item = Inbound<Value>>>>
where
    R: AsyncBufRead + Unpin + 'static,
{
    let target = target.into();
    Box::pin(stream::unfold((reader.split(b'\n'), target), |(mut lines, target)| async move {
        loop {
            let line = match lines.next_segment().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!(error = %e, "stdin read failed");
                    return None;
                }
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // lines are raw bytes and may not be UTF-8
            let data: Value = match serde_json::from_slice(&line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring malformed message");
                    continue;
                }
            };
            match Inbound::from_json(&target, &data) {
                Some(inbound) => return Some((inbound, (lines, target))),
                None => tracing::debug!("ignoring message not addressed to bridge"),
            }
        }
    }))
}

/// Writes each response as a single JSON line and flushes
pub struct LineOutbox<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> LineOutbox<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: RefCell::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> Outbox for LineOutbox<W> {
    type Context = Value;

    fn post(&self, response: Response<Value>) {
        let line = match serde_json::to_string(&response) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "response not serializable");
                return;
            }
        };
        let mut w = self.writer.borrow_mut();
        if let Err(e) = writeln!(w, "{}", line).and_then(|_| w.flush()) {
            tracing::error!(error = %e, "failed to write response");
        }
    }
}
