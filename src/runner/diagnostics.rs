//! Diagnostic (stderr) capture.
//!
//! A dedicated task drains stderr for the whole life of the encoder and sends
//! each line over a bounded channel; the runner keeps only the last few lines
//! in a ring buffer for error reporting.

use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Capacity of the stderr line channel
pub const DIAGNOSTIC_CHANNEL_CAPACITY: usize = 256;
/// Lines retained for error reporting
pub const DIAGNOSTIC_TAIL_LINES: usize = 32;

const RELEVANT_KEYWORDS: &[&str] = &["error", "failed", "cannot"];

/// Spawn the drain task; it keeps reading even after the receiver is gone
pub fn spawn_drain<R>(stream: R, tx: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut forwarding = true;
        while let Ok(Some(line)) = lines.next_line().await {
            trace!(target: "encoder", "{}", line);
            if forwarding && tx.send(line).await.is_err() {
                forwarding = false;
            }
        }
    })
}

/// Bounded ring buffer of the most recent diagnostic lines
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: String) {
        let line = line.trim_end().to_string();
        if line.is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Last line mentioning "error", "failed" or "cannot"
    pub fn last_relevant(&self) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .find(|line| {
                let lower = line.to_lowercase();
                RELEVANT_KEYWORDS.iter().any(|k| lower.contains(k))
            })
            .map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    /// Best single line to show a user
    pub fn summary(&self) -> String {
        self.last_relevant()
            .or_else(|| self.last())
            .unwrap_or_default()
            .to_string()
    }
}

impl Default for DiagnosticTail {
    fn default() -> Self {
        Self::new(DIAGNOSTIC_TAIL_LINES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_keeps_last_lines() {
        let mut tail = DiagnosticTail::new(3);
        for i in 0..10 {
            tail.push(format!("line {}", i));
        }
        assert_eq!(tail.len(), 3);
        assert_eq!(tail.last(), Some("line 9"));
    }

    #[test]
    fn test_last_relevant_line() {
        let mut tail = DiagnosticTail::default();
        tail.push("Input #0, mov,mp4".to_string());
        tail.push("Error while decoding stream #0:0".to_string());
        tail.push("Conversion FAILED!".to_string());
        tail.push("frame=  100".to_string());
        assert_eq!(tail.last_relevant(), Some("Conversion FAILED!"));
        assert_eq!(tail.summary(), "Conversion FAILED!");
    }

    #[test]
    fn test_summary_falls_back_to_last_line() {
        let mut tail = DiagnosticTail::default();
        assert_eq!(tail.summary(), "");
        tail.push("  \n".to_string());
        assert!(tail.is_empty());
        tail.push("muxing overhead: 0.1%".to_string());
        assert_eq!(tail.summary(), "muxing overhead: 0.1%");
    }

    #[tokio::test]
    async fn test_drain_forwards_lines() {
        let data: &[u8] = b"first\nsecond\ncannot open output\n";
        let (tx, mut rx) = mpsc::channel(DIAGNOSTIC_CHANNEL_CAPACITY);
        let handle = spawn_drain(data, tx);

        let mut tail = DiagnosticTail::default();
        while let Some(line) = rx.recv().await {
            tail.push(line);
        }
        handle.await.unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail.last_relevant(), Some("cannot open output"));
    }

    #[tokio::test]
    async fn test_drain_survives_dropped_receiver() {
        let data: Vec<u8> = (0..1000).flat_map(|i| format!("line {}\n", i).into_bytes()).collect();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = spawn_drain(std::io::Cursor::new(data), tx);
        handle.await.unwrap();
    }
}
