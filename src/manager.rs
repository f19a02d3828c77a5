//! `PipelineManager`: the registry of filters and paths, and the only
//! place graph topology is validated (spec §4.6).
//!
//! A single instance owned by the caller, not a global singleton
//! (REDESIGN FLAGS) — callers share it via `Arc` if they need to.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use base::bail_t;

use crate::filter::Filter;
use crate::ids::{FilterId, ReaderId, WriterId};
use crate::queue::FrameQueue;
use crate::runnable::Runnable;
use crate::workers::{RunnableHandle, WorkersPool};

/// A single hop in a [`Path`]: which writer on the upstream filter feeds
/// which reader on the downstream filter.
#[derive(Clone, Copy, Debug)]
pub struct Hop {
    pub from: FilterId,
    pub from_writer: WriterId,
    pub to: FilterId,
    pub to_reader: ReaderId,
}

/// An ordered wiring of filters, as returned by [`PipelineManager::create_path`].
pub struct Path {
    id: u32,
    hops: Vec<Hop>,
    connected: bool,
}

impl Path {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }
}

#[derive(Serialize)]
pub struct FilterSnapshot {
    pub id: u32,
    pub is_master: bool,
    pub is_slave: bool,
    pub readers: usize,
    pub writers: usize,
}

#[derive(Serialize)]
pub struct HopSnapshot {
    pub from: u32,
    pub from_writer: u32,
    pub to: u32,
    pub to_reader: u32,
}

#[derive(Serialize)]
pub struct PathSnapshot {
    pub id: u32,
    pub connected: bool,
    pub hops: Vec<HopSnapshot>,
}

#[derive(Serialize)]
pub struct PipelineSnapshot {
    pub filters: Vec<FilterSnapshot>,
    pub paths: Vec<PathSnapshot>,
}

struct Entry {
    handle: Arc<Mutex<Filter>>,
    scheduled: bool,
}

/// Registry of filters and paths; validates graph topology, wires readers
/// to writers, and forwards scheduling to a [`WorkersPool`].
pub struct PipelineManager {
    pool: WorkersPool,
    filters: Mutex<HashMap<FilterId, Entry>>,
    paths: Mutex<HashMap<u32, Path>>,
    next_path_id: Mutex<u32>,
}

impl PipelineManager {
    pub fn new(pool: WorkersPool) -> Self {
        PipelineManager {
            pool,
            filters: Mutex::new(HashMap::new()),
            paths: Mutex::new(HashMap::new()),
            next_path_id: Mutex::new(0),
        }
    }

    /// Registers `filter` under `id`, assigns its id, and schedules it on
    /// the pool.
    pub fn add_filter(&self, id: FilterId, mut filter: Filter) -> Result<(), base::Error> {
        let mut filters = self.filters.lock();
        if filters.contains_key(&id) {
            bail_t!(AlreadyRegistered, "filter {} already registered", id);
        }
        filter.set_id(id);
        let handle: Arc<Mutex<Filter>> = Arc::new(Mutex::new(filter));
        let runnable_handle: RunnableHandle = handle.clone();
        self.pool.add_task(runnable_handle)?;
        filters.insert(id, Entry { handle, scheduled: true });
        Ok(())
    }

    /// Unregisters `id`, quiescing it on the pool first (per spec §4.6,
    /// §4.5's `removeTask`). Paths referencing it are left as-is; callers
    /// are expected to `remove_path` before `remove_filter`.
    pub fn remove_filter(&self, id: FilterId) -> Result<(), base::Error> {
        let entry = {
            let mut filters = self.filters.lock();
            let Some(entry) = filters.remove(&id) else {
                bail_t!(UnknownId, "filter {} not registered", id);
            };
            entry
        };
        if entry.scheduled {
            self.pool.remove_task(id)?;
        }
        Ok(())
    }

    fn get(&self, id: FilterId) -> Result<Arc<Mutex<Filter>>, base::Error> {
        self.filters
            .lock()
            .get(&id)
            .map(|e| e.handle.clone())
            .ok_or_else(|| base::format_err_t!(UnknownId, "filter {} not registered", id))
    }

    /// Validates a path without mutating the manager: checks that
    /// `src_id`/`dst_id` and every id in `mid` are registered, that `mid`
    /// contains no repeats and none equal to the endpoints, and chains
    /// reader/writer ids accordingly.
    pub fn create_path(
        &self,
        src_id: FilterId,
        src_writer: WriterId,
        mid: &[FilterId],
        dst_id: FilterId,
        dst_reader: ReaderId,
    ) -> Result<Path, base::Error> {
        let filters = self.filters.lock();
        if !filters.contains_key(&src_id) {
            bail_t!(UnknownId, "filter {} not registered", src_id);
        }
        if !filters.contains_key(&dst_id) {
            bail_t!(UnknownId, "filter {} not registered", dst_id);
        }
        let mut seen: HashSet<FilterId> = HashSet::new();
        seen.insert(src_id);
        seen.insert(dst_id);
        for m in mid {
            if !seen.insert(*m) {
                bail_t!(InvalidId, "filter {} repeats (or collides with an endpoint) in path", m);
            }
            if !filters.contains_key(m) {
                bail_t!(UnknownId, "filter {} not registered", m);
            }
        }
        drop(filters);

        let chain: Vec<FilterId> = std::iter::once(src_id)
            .chain(mid.iter().copied())
            .chain(std::iter::once(dst_id))
            .collect();

        if detect_cycle_if_added(&self.filters.lock(), &chain) {
            bail_t!(InvalidId, "path would introduce a cycle");
        }

        let mut hops = Vec::with_capacity(chain.len() - 1);
        for (i, pair) in chain.windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);
            let from_writer = if i == 0 {
                src_writer
            } else {
                self.first_free_writer(from)?
            };
            let to_reader = if i == chain.len() - 2 {
                dst_reader
            } else {
                self.first_free_reader(to)?
            };
            hops.push(Hop {
                from,
                from_writer,
                to,
                to_reader,
            });
        }

        let mut next_id = self.next_path_id.lock();
        let id = *next_id;
        *next_id += 1;

        Ok(Path {
            id,
            hops,
            connected: false,
        })
    }

    fn first_free_writer(&self, id: FilterId) -> Result<WriterId, base::Error> {
        let filters = self.filters.lock();
        let handle = filters
            .get(&id)
            .ok_or_else(|| base::format_err_t!(UnknownId, "filter {} not registered", id))?
            .handle
            .clone();
        drop(filters);
        let filter = handle.lock();
        filter
            .writers()
            .values()
            .find(|w| w.frame_queue().is_none())
            .map(|w| w.id())
            .ok_or_else(|| base::format_err_t!(NotConnected, "filter {} has no free writer", id))
    }

    fn first_free_reader(&self, id: FilterId) -> Result<ReaderId, base::Error> {
        let filters = self.filters.lock();
        let handle = filters
            .get(&id)
            .ok_or_else(|| base::format_err_t!(UnknownId, "filter {} not registered", id))?
            .handle
            .clone();
        drop(filters);
        let filter = handle.lock();
        filter
            .readers()
            .iter()
            .find(|(_, r)| r.queue().is_none())
            .map(|(id, _)| *id)
            .ok_or_else(|| base::format_err_t!(NotConnected, "filter {} has no free reader", id))
    }

    /// Registers an already-built `Path` into the manager's path table so
    /// `remove_path` can later find it by id, without wiring any queues
    /// (that's `connect_path`'s job). Mirrors `create_path`/`add_path`
    /// being two separate steps in the administrative surface (spec §6).
    pub fn add_path(&self, path: Path) -> u32 {
        let id = path.id;
        self.paths.lock().insert(id, path);
        id
    }

    /// Wires every hop of a registered path, instantiating one `FrameQueue`
    /// per edge. Rolls back already-connected edges on any failure.
    pub fn connect_path(&self, path_id: u32, capacity: usize, max_frame_len: usize) -> Result<(), base::Error> {
        let hops = {
            let paths = self.paths.lock();
            let Some(p) = paths.get(&path_id) else {
                bail_t!(UnknownId, "path {} not registered", path_id);
            };
            p.hops().to_vec()
        };

        let mut connected: Vec<Hop> = Vec::new();
        for hop in &hops {
            match self.connect_hop(hop, capacity, max_frame_len) {
                Ok(()) => connected.push(*hop),
                Err(e) => {
                    for done in connected.iter().rev() {
                        let _ = self.disconnect_hop(done);
                    }
                    return Err(e);
                }
            }
        }

        if let Some(p) = self.paths.lock().get_mut(&path_id) {
            p.connected = true;
        }
        Ok(())
    }

    fn connect_hop(&self, hop: &Hop, capacity: usize, max_frame_len: usize) -> Result<(), base::Error> {
        let from = self.get(hop.from)?;
        let to = self.get(hop.to)?;

        let format = {
            let to_filter = to.lock();
            to_filter
                .readers()
                .get(&hop.to_reader)
                .ok_or_else(|| base::format_err_t!(InvalidId, "unknown reader {}", hop.to_reader))?;
            // Readers don't carry a format of their own before connection;
            // the edge's format is fixed by construction parameters.
            crate::frame::FrameFormat::Interleaved
        };

        let mut from_filter = from.lock();
        let writer = from_filter
            .writer_mut(hop.from_writer)
            .ok_or_else(|| base::format_err_t!(InvalidId, "unknown writer {}", hop.from_writer))?;
        if writer.frame_queue().is_some() {
            bail_t!(AlreadyRegistered, "writer {} on filter {} already connected", hop.from_writer, hop.from);
        }

        let queue = Arc::new(FrameQueue::with_capacity(capacity, max_frame_len, format));
        writer.connect(queue.clone(), hop.to, hop.to_reader);
        drop(from_filter);

        let mut to_filter = to.lock();
        let reader = to_filter
            .reader_mut(hop.to_reader)
            .expect("checked above");
        reader.connect(hop.from, hop.from_writer, queue);
        Ok(())
    }

    fn disconnect_hop(&self, hop: &Hop) -> Result<(), base::Error> {
        if let Ok(from) = self.get(hop.from) {
            if let Some(w) = from.lock().writer_mut(hop.from_writer) {
                w.disconnect();
            }
        }
        if let Ok(to) = self.get(hop.to) {
            if let Some(r) = to.lock().reader_mut(hop.to_reader) {
                r.disconnect();
            }
        }
        Ok(())
    }

    /// Disconnects every hop of `path_id` in reverse order. Filters remain
    /// registered.
    pub fn remove_path(&self, path_id: u32) -> Result<(), base::Error> {
        let hops = {
            let mut paths = self.paths.lock();
            let Some(p) = paths.remove(&path_id) else {
                bail_t!(UnknownId, "path {} not registered", path_id);
            };
            p.hops
        };
        for hop in hops.iter().rev() {
            self.disconnect_hop(hop)?;
        }
        Ok(())
    }

    pub fn get_state(&self) -> PipelineSnapshot {
        let filters = self
            .filters
            .lock()
            .iter()
            .map(|(id, e)| {
                let f = e.handle.lock();
                FilterSnapshot {
                    id: id.0,
                    is_master: f.is_master(),
                    is_slave: f.is_slave(),
                    readers: f.readers().len(),
                    writers: f.writers().len(),
                }
            })
            .collect();
        let paths = self
            .paths
            .lock()
            .values()
            .map(|p| PathSnapshot {
                id: p.id,
                connected: p.connected,
                hops: p
                    .hops
                    .iter()
                    .map(|h| HopSnapshot {
                        from: h.from.0,
                        from_writer: h.from_writer.0,
                        to: h.to.0,
                        to_reader: h.to_reader.0,
                    })
                    .collect(),
            })
            .collect();
        PipelineSnapshot { filters, paths }
    }

    /// Gives a caller direct access to a registered filter, e.g. to call
    /// `make_master`/`add_slave` or to inject frames into a head filter's
    /// output queue in tests.
    pub fn filter_handle(&self, id: FilterId) -> Result<Arc<Mutex<Filter>>, base::Error> {
        self.get(id)
    }
}

/// DFS cycle check over the *already-connected* edges plus the proposed
/// new chain, per spec §9: "`connect_path` rejects wirings that would
/// create a cycle (detected by DFS over already-connected edges)".
fn detect_cycle_if_added(filters: &HashMap<FilterId, Entry>, chain: &[FilterId]) -> bool {
    let mut adjacency: HashMap<FilterId, Vec<FilterId>> = HashMap::new();
    for (id, entry) in filters.iter() {
        let f = entry.handle.lock();
        for w in f.writers().values() {
            if let Some((to, _)) = w.peer() {
                adjacency.entry(*id).or_default().push(to);
            }
        }
    }
    for pair in chain.windows(2) {
        adjacency.entry(pair[0]).or_default().push(pair[1]);
    }

    let mut visiting: HashSet<FilterId> = HashSet::new();
    let mut visited: HashSet<FilterId> = HashSet::new();

    fn dfs(
        node: FilterId,
        adjacency: &HashMap<FilterId, Vec<FilterId>>,
        visiting: &mut HashSet<FilterId>,
        visited: &mut HashSet<FilterId>,
    ) -> bool {
        if visiting.contains(&node) {
            return true;
        }
        if visited.contains(&node) {
            return false;
        }
        visiting.insert(node);
        if let Some(next) = adjacency.get(&node) {
            for n in next {
                if dfs(*n, adjacency, visiting, visited) {
                    return true;
                }
            }
        }
        visiting.remove(&node);
        visited.insert(node);
        false
    }

    for id in adjacency.keys().copied().collect::<Vec<_>>() {
        if dfs(id, &adjacency, &mut visiting, &mut visited) {
            return true;
        }
    }
    false
}
