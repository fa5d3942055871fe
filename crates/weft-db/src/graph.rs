//! The graph weight-reconciliation engine.
//!
//! Every stored record is a node in a DAG whose edges are the record's
//! links to its predecessors. A record's *own weight* (derived from its
//! proof of work) must reach the record itself and every ancestor it can
//! reach through links, exactly once each, no matter what order replicas
//! receive records in. At steady state a node's cumulative weight is the
//! sum of the own weights of all its descendants, itself included, which
//! makes the final weights (and the replica CRC computed from them) a
//! pure function of the record set.
//!
//! A node *settles* (propagates its weight) only once all of its
//! predecessors have settled. Settlement order is therefore a topological
//! order: when a node's turn comes, its entire ancestry is materialized
//! locally and one breadth-first traversal reaches all of it. Records whose
//! predecessors have not arrived sit in a pending table; a record that
//! never resolves simply keeps `has_pending` true.
//!
//! Node lifecycle: `LinkWait → Ready → Propagating → Settled`. A settled
//! node's weight still grows as new descendants arrive and push weight into
//! it; it never re-enters the queue on its own behalf.

use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crc::{Crc, CRC_64_ECMA_182};
use weft_core::RecordId;

use crate::iset::ISet;

/// Lifecycle states of a graph node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum NodeStatus {
    LinkWait = 0,
    Ready = 1,
    Propagating = 2,
    Settled = 3,
}

impl NodeStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::LinkWait,
            1 => Self::Ready,
            2 => Self::Propagating,
            _ => Self::Settled,
        }
    }
}

struct NodeState {
    id: RecordId,
    offset: u64,
    length: u32,
    own_weight: u64,
    /// Total links the record declares.
    link_total: u32,
    /// Indices of predecessors stored locally (grows as they arrive).
    links: Vec<u32>,
    /// Predecessors not yet settled (absent ones included).
    waiting: u32,
    /// Nodes whose `waiting` count drops when this node settles.
    settle_waiters: Vec<u32>,
    /// Cumulative 128-bit weight; only ever increases.
    weight: Mutex<u128>,
    state: AtomicU8,
}

#[derive(Default)]
struct GraphInner {
    nodes: Vec<NodeState>,
    by_id: HashMap<RecordId, u32>,
    /// Absent predecessor id → indices of records awaiting it.
    pending: HashMap<RecordId, Vec<u32>>,
    /// Count of nodes not yet settled.
    unsettled: usize,
}

/// Arguments for [`Graph::insert`].
pub struct InsertNode<'a> {
    pub id: RecordId,
    pub offset: u64,
    pub length: u32,
    pub own_weight: u64,
    pub links: &'a [RecordId],
}

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// The weight engine: DAG index, pending table, and propagation workers.
pub struct Graph {
    inner: RwLock<GraphInner>,
    queue: Mutex<VecDeque<u32>>,
    work_ready: Condvar,
    stop: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Graph {
    /// Create the engine and start `workers` propagation threads
    /// (0 means hardware parallelism).
    pub fn new(workers: usize) -> Arc<Self> {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            workers
        };
        let graph = Arc::new(Self {
            inner: RwLock::new(GraphInner::default()),
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            stop: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        });
        let mut handles = graph.workers.lock();
        for i in 0..workers {
            let g = Arc::clone(&graph);
            handles.push(
                std::thread::Builder::new()
                    .name(format!("weft-weight-{i}"))
                    .spawn(move || g.worker_loop())
                    .expect("spawn weight worker"),
            );
        }
        drop(handles);
        graph
    }

    /// Insert a validated record's node and schedule propagation.
    pub fn insert(&self, args: InsertNode<'_>) -> InsertOutcome {
        let ready_self;
        {
            let mut g = self.inner.write();
            if g.by_id.contains_key(&args.id) {
                return InsertOutcome::Duplicate;
            }
            let idx = g.nodes.len() as u32;

            let mut resolved = Vec::with_capacity(args.links.len());
            let mut waiting = 0u32;
            for link in args.links {
                match g.by_id.get(link).copied() {
                    Some(pidx) => {
                        resolved.push(pidx);
                        let pred = &mut g.nodes[pidx as usize];
                        if NodeStatus::from_u8(pred.state.load(Ordering::Relaxed))
                            != NodeStatus::Settled
                        {
                            pred.settle_waiters.push(idx);
                            waiting += 1;
                        }
                    }
                    None => {
                        g.pending.entry(*link).or_default().push(idx);
                        waiting += 1;
                    }
                }
            }

            ready_self = waiting == 0;
            g.nodes.push(NodeState {
                id: args.id,
                offset: args.offset,
                length: args.length,
                own_weight: args.own_weight,
                link_total: args.links.len() as u32,
                links: resolved,
                waiting,
                settle_waiters: Vec::new(),
                weight: Mutex::new(0),
                state: AtomicU8::new(if ready_self {
                    NodeStatus::Ready as u8
                } else {
                    NodeStatus::LinkWait as u8
                }),
            });
            g.by_id.insert(args.id, idx);
            g.unsettled += 1;

            // Anyone parked on this id now waits for our settlement instead.
            if let Some(waiters) = g.pending.remove(&args.id) {
                for w in waiters {
                    g.nodes[w as usize].links.push(idx);
                    g.nodes[idx as usize].settle_waiters.push(w);
                }
            }

            if ready_self {
                tracing::trace!(id = %args.id, "record ready at insert");
            }
        }
        if ready_self {
            self.enqueue(self.index_of(&args.id).expect("just inserted"));
        }
        InsertOutcome::Inserted
    }

    fn index_of(&self, id: &RecordId) -> Option<u32> {
        self.inner.read().by_id.get(id).copied()
    }

    fn enqueue(&self, idx: u32) {
        let mut q = self.queue.lock();
        q.push_back(idx);
        self.work_ready.notify_one();
    }

    fn worker_loop(&self) {
        loop {
            let idx = {
                let mut q = self.queue.lock();
                loop {
                    if let Some(i) = q.pop_front() {
                        break i;
                    }
                    if self.stop.load(Ordering::Acquire) {
                        return;
                    }
                    self.work_ready.wait(&mut q);
                }
            };
            self.propagate(idx);
        }
    }

    /// Add `idx`'s own weight to itself and every reachable ancestor, then
    /// settle it and wake any dependants that became ready.
    fn propagate(&self, idx: u32) {
        {
            let g = self.inner.read();
            let node = &g.nodes[idx as usize];
            node.state
                .store(NodeStatus::Propagating as u8, Ordering::Relaxed);
            let w = node.own_weight as u128;

            let mut visited = ISet::new((g.nodes.len() / 4).max(64));
            visited.put(idx as i64);
            *node.weight.lock() += w;

            let mut stack: Vec<u32> = node.links.clone();
            while let Some(a) = stack.pop() {
                if !visited.put(a as i64) {
                    continue;
                }
                let ancestor = &g.nodes[a as usize];
                *ancestor.weight.lock() += w;
                stack.extend_from_slice(&ancestor.links);
            }
        }

        let newly_ready = {
            let mut g = self.inner.write();
            let waiters = std::mem::take(&mut g.nodes[idx as usize].settle_waiters);
            g.nodes[idx as usize]
                .state
                .store(NodeStatus::Settled as u8, Ordering::Relaxed);
            g.unsettled -= 1;
            let mut ready = Vec::new();
            for w_idx in waiters {
                let waiter = &mut g.nodes[w_idx as usize];
                waiter.waiting -= 1;
                if waiter.waiting == 0 {
                    waiter
                        .state
                        .store(NodeStatus::Ready as u8, Ordering::Relaxed);
                    ready.push(w_idx);
                }
            }
            ready
        };

        for r in newly_ready {
            self.enqueue(r);
        }
    }

    /// True while any record awaits predecessors or propagation.
    ///
    /// `has_pending() == false` is the steady-state barrier: every prior
    /// insert has fully propagated its weight.
    pub fn has_pending(&self) -> bool {
        self.inner.read().unsettled > 0
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// True when the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative weight of a record as `(lo, hi)` halves.
    pub fn weight_of(&self, id: &RecordId) -> Option<(u64, u64)> {
        let g = self.inner.read();
        let idx = *g.by_id.get(id)?;
        let w = *g.nodes[idx as usize].weight.lock();
        Some((w as u64, (w >> 64) as u64))
    }

    /// Lifecycle state of a record's node.
    pub fn status_of(&self, id: &RecordId) -> Option<NodeStatus> {
        let g = self.inner.read();
        let idx = *g.by_id.get(id)?;
        Some(NodeStatus::from_u8(
            g.nodes[idx as usize].state.load(Ordering::Relaxed),
        ))
    }

    /// `(offset, length)` of a record in the log.
    pub fn locate(&self, id: &RecordId) -> Option<(u64, u32)> {
        let g = self.inner.read();
        let idx = *g.by_id.get(id)?;
        let n = &g.nodes[idx as usize];
        Some((n.offset, n.length))
    }

    /// Snapshot `(id, weight_lo, weight_hi)` for every node.
    pub fn weight_snapshot(&self) -> Vec<(RecordId, u64, u64)> {
        let g = self.inner.read();
        g.nodes
            .iter()
            .map(|n| {
                let w = *n.weight.lock();
                (n.id, w as u64, (w >> 64) as u64)
            })
            .collect()
    }

    /// Deterministic digest of the replica state.
    ///
    /// CRC-64/ECMA over the id-sorted `(id, weight_lo, weight_hi,
    /// link_count)` tuples. At steady state, replicas holding the same
    /// record set produce equal values regardless of ingest order.
    pub fn crc64(&self) -> u64 {
        let g = self.inner.read();
        let mut tuples: Vec<(RecordId, u64, u64, u32)> = g
            .nodes
            .iter()
            .map(|n| {
                let w = *n.weight.lock();
                (n.id, w as u64, (w >> 64) as u64, n.link_total)
            })
            .collect();
        drop(g);
        tuples.sort_by(|a, b| a.0.cmp(&b.0));

        let crc = Crc::<u64>::new(&CRC_64_ECMA_182);
        let mut digest = crc.digest();
        for (id, lo, hi, links) in tuples {
            digest.update(id.as_bytes());
            digest.update(&lo.to_be_bytes());
            digest.update(&hi.to_be_bytes());
            digest.update(&links.to_be_bytes());
        }
        digest.finalize()
    }

    /// Stop the worker pool and wait for it to drain. Idempotent.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        self.work_ready.notify_all();
        let mut handles = self.workers.lock();
        for h in handles.drain(..) {
            let _ = h.join();
        }
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.shutdown();
    }
}
