//! Background writer for finished-desk records.
//!
//! Settlement hands the record to this actor and returns immediately; the
//! actor owns the only path to the durable result log.

use super::models::BattleRecord;
use crate::ledger::ResultLog;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Duration, sleep},
};

const INBOX_CAPACITY: usize = 256;
const WRITE_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Messages accepted by the recorder
#[derive(Debug)]
pub enum RecorderMessage {
    Record(Box<BattleRecord>),
    /// Reply once every earlier message has been handled
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle for submitting records
#[derive(Clone)]
pub struct RecorderHandle {
    sender: mpsc::Sender<RecorderMessage>,
}

impl RecorderHandle {
    /// Queue a record without waiting for the write
    pub fn submit(&self, record: BattleRecord) {
        let desk_id = record.desk_id.clone();
        match self.sender.try_send(RecorderMessage::Record(Box::new(record))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                log::warn!("Result recorder inbox full, deferring {}", desk_id);
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    if sender.send(message).await.is_err() {
                        log::error!("Result recorder closed, dropped {}", desk_id);
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::error!("Result recorder closed, dropped {}", desk_id);
            }
        }
    }

    /// Wait until everything submitted so far is written (or given up on)
    pub async fn flush(&self) -> Result<(), String> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RecorderMessage::Flush(tx))
            .await
            .map_err(|_| "Result recorder is closed".to_string())?;
        rx.await.map_err(|_| "Result recorder dropped flush".to_string())
    }
}

/// Single consumer writing records to the result log
pub struct ResultRecorder {
    results: Arc<dyn ResultLog>,
    inbox: mpsc::Receiver<RecorderMessage>,
}

impl ResultRecorder {
    /// Create a recorder and its handle
    pub fn new(results: Arc<dyn ResultLog>) -> (Self, RecorderHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        (Self { results, inbox }, RecorderHandle { sender })
    }

    /// Create a recorder and run it on the current runtime
    pub fn spawn(results: Arc<dyn ResultLog>) -> (RecorderHandle, JoinHandle<()>) {
        let (recorder, handle) = Self::new(results);
        let task = tokio::spawn(recorder.run());
        (handle, task)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        log::info!("Result recorder started");

        while let Some(message) = self.inbox.recv().await {
            match message {
                RecorderMessage::Record(record) => self.write(&record).await,
                RecorderMessage::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        log::info!("Result recorder stopped");
    }

    async fn write(&self, record: &BattleRecord) {
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.results.record(record).await {
                Ok(()) => {
                    log::info!(
                        "Recorded battle {} ({} players)",
                        record.desk_id,
                        record.roster.len()
                    );
                    return;
                }
                Err(e) if attempt < WRITE_ATTEMPTS => {
                    log::warn!(
                        "Recording battle {} failed (attempt {}): {}",
                        record.desk_id,
                        attempt,
                        e
                    );
                    sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    log::error!("Giving up on recording battle {}: {}", record.desk_id, e);
                }
            }
        }
    }
}
