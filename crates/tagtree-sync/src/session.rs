//! The replication session driver.
//!
//! A session runs over any duplex byte stream. After the `Hello` handshake it
//! proceeds in rounds. Each round both sides exchange their log lengths, push
//! the entries the peer is missing, settle, and then tell each other whether
//! anything changed. The session ends after a round in which neither side
//! changed.

use async_trait::async_trait;
use tagtree_log::{LogContainer, SignedEntry};
use tagtree_types::LogId;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::codec::SyncCodec;
use crate::error::{SyncError, SyncResult};
use crate::message::{capabilities, codes, SyncMessage, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
use crate::negotiation::NegotiationEngine;
use crate::types::{LogStatus, LogTransfer, ReplicateOptions, SessionSummary};
use crate::verifier::SyncVerifier;

/// Byte budget for the payloads of one `Entries` message.
const BATCH_BYTES: usize = MAX_MESSAGE_SIZE / 2;
/// Serialized size of an entry beyond its payload (seq, hash, signature, lengths).
const ENTRY_OVERHEAD: usize = 128;

/// Called after each round's entries have been applied.
///
/// Implementations give local readers a chance to consume the new entries and
/// open any logs they discover, so those logs are listed in the next round.
/// `settle` should return once local progress depends on the peer again.
#[async_trait]
pub trait SettleHook: Send + Sync {
    async fn settle(&self, container: &LogContainer);
}

/// A hook that returns immediately.
pub struct NoSettle;

#[async_trait]
impl SettleHook for NoSettle {
    async fn settle(&self, _container: &LogContainer) {}
}

/// Replicates every open log of a container with one peer.
pub struct ReplicationSession {
    container: LogContainer,
    is_initiator: bool,
    options: ReplicateOptions,
}

impl ReplicationSession {
    pub fn new(container: LogContainer, is_initiator: bool, options: ReplicateOptions) -> Self {
        Self {
            container,
            is_initiator,
            options,
        }
    }

    /// Run the session to completion without a settle hook.
    pub async fn run<T>(&self, io: T) -> SyncResult<SessionSummary>
    where
        T: AsyncRead + AsyncWrite + Send,
    {
        self.run_with(io, &NoSettle).await
    }

    /// Run the session to completion, settling with `hook` after each round.
    pub async fn run_with<T, H>(&self, io: T, hook: &H) -> SyncResult<SessionSummary>
    where
        T: AsyncRead + AsyncWrite + Send,
        H: SettleHook + ?Sized,
    {
        let (mut reader, mut writer) = tokio::io::split(io);
        self.handshake(&mut reader, &mut writer).await?;

        let mut summary = SessionSummary::default();
        loop {
            if summary.rounds >= self.options.max_rounds {
                return Err(SyncError::RoundLimit(self.options.max_rounds));
            }
            summary.rounds += 1;

            let local = self.status().await;
            let status = SyncMessage::Status { logs: local.clone() };
            let ((), remote) = tokio::try_join!(
                SyncCodec::write(&mut writer, &status),
                read_status(&mut reader),
            )?;

            let negotiation = NegotiationEngine::negotiate(&local, &remote);
            if !negotiation.unknown.is_empty() {
                debug!(count = negotiation.unknown.len(), "peer lists logs not open here");
            }

            let (sent, received) = tokio::try_join!(
                self.send_entries(&mut writer, &negotiation.sends),
                self.receive_entries(&mut reader),
            )?;
            summary.entries_sent += sent;
            summary.entries_received += received;

            hook.settle(&self.container).await;

            let more = self.status().await != local;
            let verdict = SyncMessage::Continue { more };
            let ((), peer_more) = tokio::try_join!(
                SyncCodec::write(&mut writer, &verdict),
                read_continue(&mut reader),
            )?;

            debug!(
                round = summary.rounds,
                sent,
                received,
                more,
                peer_more,
                "replication round complete"
            );
            if !more && !peer_more {
                break;
            }
        }

        info!(
            rounds = summary.rounds,
            sent = summary.entries_sent,
            received = summary.entries_received,
            "replication session complete"
        );
        Ok(summary)
    }

    async fn handshake<R, W>(&self, reader: &mut R, writer: &mut W) -> SyncResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let caps = vec![
            capabilities::SIGNED_ENTRIES.to_string(),
            capabilities::MULTI_ROUND.to_string(),
        ];

        if self.is_initiator {
            SyncCodec::write(
                writer,
                &SyncMessage::Hello {
                    version: PROTOCOL_VERSION,
                    capabilities: caps,
                },
            )
            .await?;
            match read_message(reader).await? {
                SyncMessage::HelloAck { version, .. } if version == PROTOCOL_VERSION => Ok(()),
                SyncMessage::HelloAck { version, .. } => Err(SyncError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: version,
                }),
                other => Err(unexpected("HelloAck", &other)),
            }
        } else {
            let version = match read_message(reader).await? {
                SyncMessage::Hello { version, .. } => version,
                other => return Err(unexpected("Hello", &other)),
            };
            if version != PROTOCOL_VERSION {
                SyncCodec::write(
                    writer,
                    &SyncMessage::Error {
                        code: codes::VERSION_MISMATCH,
                        message: format!("unsupported protocol version {version}"),
                    },
                )
                .await?;
                return Err(SyncError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: version,
                });
            }
            SyncCodec::write(
                writer,
                &SyncMessage::HelloAck {
                    version: PROTOCOL_VERSION,
                    capabilities: caps,
                },
            )
            .await
        }
    }

    async fn status(&self) -> Vec<LogStatus> {
        self.container
            .logs()
            .await
            .iter()
            .map(|log| LogStatus {
                log: log.id(),
                len: log.len(),
            })
            .collect()
    }

    async fn send_entries<W>(&self, writer: &mut W, sends: &[LogTransfer]) -> SyncResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let batch_size = self.options.batch_size.max(1);
        let mut sent = 0u64;

        for transfer in sends {
            let Some(log) = self.container.get_open(&transfer.log).await else {
                continue;
            };

            let mut batch: Vec<SignedEntry> = Vec::new();
            let mut bytes = 0usize;
            for entry in log.entries_from(transfer.from).await {
                let size = entry.payload.len() + ENTRY_OVERHEAD;
                if !batch.is_empty() && (batch.len() >= batch_size || bytes + size > BATCH_BYTES) {
                    sent += flush_batch(writer, transfer.log, &mut batch).await?;
                    bytes = 0;
                }
                bytes += size;
                batch.push(entry);
            }
            if !batch.is_empty() {
                sent += flush_batch(writer, transfer.log, &mut batch).await?;
            }
        }

        SyncCodec::write(writer, &SyncMessage::Done).await?;
        Ok(sent)
    }

    async fn receive_entries<R>(&self, reader: &mut R) -> SyncResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut received = 0u64;
        loop {
            match read_message(reader).await? {
                SyncMessage::Entries { log, entries } => {
                    received += self.apply_batch(log, entries).await? as u64;
                }
                SyncMessage::Done => return Ok(received),
                other => return Err(unexpected("Entries or Done", &other)),
            }
        }
    }

    async fn apply_batch(&self, id: LogId, entries: Vec<SignedEntry>) -> SyncResult<usize> {
        let Some(log) = self.container.get_open(&id).await else {
            warn!(log = %id.short_id(), count = entries.len(), "ignoring entries for a log not open here");
            return Ok(0);
        };

        let report = SyncVerifier::verify_received_entries(&id, &entries);
        if !report.chain_valid {
            warn!(log = %id.short_id(), violations = ?report.violations, "rejecting received entries");
            return Err(SyncError::VerificationFailed(format!(
                "{}: {}",
                id.short_id(),
                report.violations.join("; ")
            )));
        }

        log.apply_remote(entries).await.map_err(|e| match e {
            tagtree_log::LogError::Verification { .. } => SyncError::VerificationFailed(e.to_string()),
            other => SyncError::Log(other),
        })
    }
}

async fn flush_batch<W>(writer: &mut W, log: LogId, batch: &mut Vec<SignedEntry>) -> SyncResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let entries = std::mem::take(batch);
    let count = entries.len() as u64;
    SyncCodec::write(writer, &SyncMessage::Entries { log, entries }).await?;
    Ok(count)
}

async fn read_message<R>(reader: &mut R) -> SyncResult<SyncMessage>
where
    R: AsyncRead + Unpin,
{
    match SyncCodec::read(reader).await? {
        SyncMessage::Error { code, message } => Err(SyncError::Remote { code, message }),
        msg => Ok(msg),
    }
}

async fn read_status<R>(reader: &mut R) -> SyncResult<Vec<LogStatus>>
where
    R: AsyncRead + Unpin,
{
    match read_message(reader).await? {
        SyncMessage::Status { logs } => Ok(logs),
        other => Err(unexpected("Status", &other)),
    }
}

async fn read_continue<R>(reader: &mut R) -> SyncResult<bool>
where
    R: AsyncRead + Unpin,
{
    match read_message(reader).await? {
        SyncMessage::Continue { more } => Ok(more),
        other => Err(unexpected("Continue", &other)),
    }
}

fn unexpected(expected: &str, got: &SyncMessage) -> SyncError {
    SyncError::Protocol(format!("expected {expected}, got {}", got.type_name()))
}
