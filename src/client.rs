//! # Streaming client
//!
//! Owns the single background task that drives the per-block pipeline: receive
//! a raw frame, reconstruct the snapshot (full frames replace, delta frames
//! patch), validate per-block completeness, refresh the client-side graph
//! mirror, build the per-snapshot engine, and publish it downstream.
//!
//! Publication is warn-then-drop: when the bounded outbound channel is full
//! the snapshot is logged and discarded rather than blocking transport
//! ingestion. Transport-fatal errors go out on an unbounded channel and are
//! never dropped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::errors::{ClientError, StateError};
use crate::indexers::PoolRegistryIndex;
use crate::metrics;
use crate::resolver::ProtocolResolver;
use crate::route_engine::{ActivePoolPolicy, RouteEngine};
use crate::settings::Settings;
use crate::state_sync::{self, SchemaRegistry};
use crate::token_graph::GraphRegistry;
use crate::types::delta::{DeltaData, StateDelta};
use crate::types::snapshot::{BlockSnapshot, BlockSummary, StateData};
use crate::types::{PoolId, TokenId};

/// One raw per-block frame from the transport.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    /// A complete snapshot (stream head or resync point).
    Snapshot(Box<BlockSnapshot>),
    /// Changes relative to the previously delivered block.
    Delta(Box<StateDelta>),
}

/// What the transport yields: either a frame or a fatal condition.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Frame(StreamFrame),
    Fatal(String),
}

/// Source of raw frames. The client takes anything implementing this, so tests
/// and alternative transports plug in without touching the loop.
#[async_trait]
pub trait FrameSource: Send {
    /// Next event, or `None` once the source is exhausted.
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// Frame source backed by a pair of channels, matching the transport's
/// `(frames, fatals)` surface.
pub struct ChannelFrameSource {
    frames: mpsc::Receiver<StreamFrame>,
    fatals: mpsc::Receiver<String>,
}

impl ChannelFrameSource {
    pub fn new(frames: mpsc::Receiver<StreamFrame>, fatals: mpsc::Receiver<String>) -> Self {
        Self { frames, fatals }
    }
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn recv(&mut self) -> Option<TransportEvent> {
        tokio::select! {
            frame = self.frames.recv() => frame.map(TransportEvent::Frame),
            fatal = self.fatals.recv() => fatal.map(TransportEvent::Fatal),
        }
    }
}

/// What consumers receive per processed block.
#[derive(Clone)]
pub struct ProcessedSnapshot {
    pub block: BlockSummary,
    pub engine: Arc<RouteEngine>,
    pub resolver: Arc<ProtocolResolver>,
}

/// Consumer-facing ends of the client's outbound channels.
pub struct ClientChannels {
    pub snapshots: mpsc::Receiver<ProcessedSnapshot>,
    pub errors: mpsc::UnboundedReceiver<ClientError>,
}

/// The streaming client. Construct with [`StreamClient::new`], then hand a
/// frame source and a shutdown signal to [`run`](StreamClient::run) on its own
/// task.
pub struct StreamClient {
    schemas: SchemaRegistry,
    graph: Arc<GraphRegistry>,
    policy: ActivePoolPolicy,
    snapshot_tx: mpsc::Sender<ProcessedSnapshot>,
    error_tx: mpsc::UnboundedSender<ClientError>,
    current: Option<BlockSnapshot>,
    chain_id: Option<u64>,
    settings: Settings,
}

impl StreamClient {
    pub fn new(settings: Settings, schemas: SchemaRegistry) -> (Self, ClientChannels) {
        let (snapshot_tx, snapshot_rx) =
            mpsc::channel(settings.client.snapshot_channel_capacity.max(1));
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let graph = Arc::new(GraphRegistry::new(settings.graph.compaction_threshold));
        (
            Self {
                schemas,
                graph,
                policy: ActivePoolPolicy::default(),
                snapshot_tx,
                error_tx,
                current: None,
                chain_id: None,
                settings,
            },
            ClientChannels {
                snapshots: snapshot_rx,
                errors: error_rx,
            },
        )
    }

    /// The client-side graph mirror, updated once per processed block. Useful
    /// for topology queries between published snapshots.
    pub fn graph(&self) -> Arc<GraphRegistry> {
        Arc::clone(&self.graph)
    }

    /// Drives the pipeline until the source ends, a fatal transport error
    /// arrives, or `shutdown` fires. Outbound channels close on return.
    pub async fn run<S: FrameSource>(mut self, mut source: S, mut shutdown: watch::Receiver<bool>) {
        info!("stream client started");
        loop {
            tokio::select! {
                event = source.recv() => match event {
                    None => {
                        info!("frame source exhausted, stopping client");
                        break;
                    }
                    Some(TransportEvent::Fatal(message)) => {
                        error!(%message, "transport fatal, stopping client");
                        let _ = self.error_tx.send(ClientError::TransportFatal(message));
                        break;
                    }
                    Some(TransportEvent::Frame(frame)) => self.handle_frame(frame),
                },
                _ = shutdown.changed() => {
                    info!("shutdown requested, stopping client");
                    break;
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: StreamFrame) {
        match frame {
            StreamFrame::Snapshot(snapshot) => self.handle_full_snapshot(*snapshot),
            StreamFrame::Delta(delta) => self.handle_delta(*delta),
        }
    }

    fn handle_full_snapshot(&mut self, snapshot: BlockSnapshot) {
        if let Some((protocol, message)) = snapshot.first_error() {
            warn!(%protocol, %message, "snapshot carries an upstream protocol error, skipping");
            return;
        }
        if let Err(err) = state_sync::validate_completeness(&snapshot) {
            error!(%err, block = %snapshot.block.number, "incomplete snapshot, skipping");
            return;
        }
        if let Some(chain_id) = self.chain_id {
            if chain_id != snapshot.chain_id {
                warn!(
                    expected = chain_id,
                    got = snapshot.chain_id,
                    "snapshot for a different chain, skipping"
                );
                return;
            }
        } else {
            self.chain_id = Some(snapshot.chain_id);
            self.policy = self.settings.policy_for_chain(snapshot.chain_id);
        }
        self.rebuild_graph_mirror(&snapshot);
        self.current = Some(snapshot);
        self.publish();
    }

    fn handle_delta(&mut self, delta: StateDelta) {
        let Some(current) = self.current.as_ref() else {
            warn!(
                from_block = %delta.from_block,
                "delta received before any full snapshot, skipping"
            );
            return;
        };
        match state_sync::patch_snapshot(&self.schemas, current, &delta) {
            Ok(next) => {
                if let Err(err) = state_sync::validate_completeness(&next) {
                    error!(%err, block = %next.block.number, "patched snapshot incomplete, skipping");
                    return;
                }
                self.apply_delta_to_graph_mirror(&delta);
                self.current = Some(next);
                self.publish();
            }
            Err(StateError::BlockMismatch { snapshot, delta }) => {
                metrics::inc_patch_failures();
                warn!(
                    %snapshot,
                    %delta,
                    "delta does not extend the current block, waiting for a coherent frame"
                );
            }
            Err(err) => {
                metrics::inc_patch_failures();
                error!(%err, "patch failed, waiting for a coherent frame");
            }
        }
    }

    /// Pool membership changes carried by the delta, applied to the mirror as
    /// one batch per block.
    fn apply_delta_to_graph_mirror(&self, delta: &StateDelta) {
        let mut added: Vec<(PoolId, Vec<TokenId>)> = Vec::new();
        let mut removed: Vec<PoolId> = Vec::new();
        for protocol_delta in delta.protocols.values() {
            match &protocol_delta.data {
                DeltaData::V2Pools(d) => {
                    added.extend(
                        d.additions
                            .iter()
                            .map(|p| (p.id, vec![p.token0, p.token1])),
                    );
                    removed.extend(&d.deletions);
                }
                DeltaData::V3Pools(d) => {
                    added.extend(
                        d.additions
                            .iter()
                            .map(|p| (p.id, vec![p.token0, p.token1])),
                    );
                    removed.extend(&d.deletions);
                }
                _ => {}
            }
        }
        if !removed.is_empty() {
            self.graph.remove_pools(&removed);
        }
        if !added.is_empty() {
            self.graph.add_pools(&added);
        }
    }

    /// Resyncs the mirror to the pool membership of a full snapshot.
    fn rebuild_graph_mirror(&self, snapshot: &BlockSnapshot) {
        let mut batch: Vec<(PoolId, Vec<TokenId>)> = Vec::new();
        for state in snapshot.protocols.values() {
            match &*state.data {
                StateData::V2Pools(pools) => {
                    batch.extend(pools.iter().map(|p| (p.id, vec![p.token0, p.token1])));
                }
                StateData::V3Pools(pools) => {
                    batch.extend(pools.iter().map(|p| (p.id, vec![p.token0, p.token1])));
                }
                _ => {}
            }
        }
        let fresh: std::collections::HashSet<PoolId> = batch.iter().map(|(id, _)| *id).collect();
        let stale: Vec<PoolId> = self
            .graph
            .view()
            .pools
            .into_iter()
            .filter(|id| !fresh.contains(id))
            .collect();
        if !stale.is_empty() {
            self.graph.remove_pools(&stale);
        }
        self.graph.add_pools(&batch);
    }

    fn publish(&mut self) {
        let Some(snapshot) = self.current.as_ref() else {
            return;
        };
        let engine = match RouteEngine::from_snapshot(snapshot, self.policy) {
            Ok(engine) => Arc::new(engine),
            Err(err) => {
                error!(%err, block = %snapshot.block.number, "engine build failed, skipping publication");
                return;
            }
        };
        let resolver = match PoolRegistryIndex::from_snapshot(snapshot) {
            Ok(index) => Arc::new(ProtocolResolver::new(Arc::new(index))),
            Err(err) => {
                error!(%err, "pool registry missing from a complete snapshot");
                return;
            }
        };
        metrics::inc_engine_builds();
        let processed = ProcessedSnapshot {
            block: snapshot.block.clone(),
            engine,
            resolver,
        };
        match self.snapshot_tx.try_send(processed) {
            Ok(()) => {
                metrics::inc_snapshots_processed();
                debug!(
                    block = %snapshot.block.number,
                    hash = %hex::encode(snapshot.block.hash),
                    "published processed snapshot"
                );
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::inc_snapshots_dropped();
                warn!(
                    block = %snapshot.block.number,
                    "consumer is behind, dropping processed snapshot"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("no consumer attached, discarding processed snapshot");
            }
        }
    }
}
