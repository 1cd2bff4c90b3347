//! LRU-K eviction policy for the buffer pool.
//!
//! LRU-K tracks the last K access timestamps per frame and separates frames
//! into two classes:
//!
//! - **Cold** frames with fewer than K recorded accesses live on the history
//!   list in arrival order; the front is the oldest arrival.
//! - **Hot** frames with a full K-access history live on the cache list,
//!   ordered by their K-th most recent access timestamp (smallest first).
//!
//! Eviction always drains the history list before touching the cache list,
//! so a one-shot scan cannot push reused pages out of memory: the scan's
//! pages stay cold and are reclaimed first.

use std::collections::{HashMap, VecDeque};

use kestrel_common::types::FrameId;
use parking_lot::Mutex;

/// LRU-K replacement policy over buffer pool frames.
///
/// Frames enter the replacer on their first recorded access and are
/// non-evictable until the pool marks them otherwise. [`evict`] selects the
/// coldest evictable frame and drops its record entirely; a later access
/// re-registers the frame from scratch.
///
/// All operations serialize on a single internal latch.
///
/// [`evict`]: LruKReplacer::evict
pub struct LruKReplacer {
    /// Maximum number of frames this replacer may track.
    capacity: usize,
    /// The policy's K.
    k: usize,
    state: Mutex<ReplacerState>,
}

struct ReplacerState {
    /// Monotonic counter of access events.
    timestamp: u64,
    /// Number of tracked frames currently marked evictable.
    evictable: usize,
    nodes: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than K accesses, in arrival order (front = oldest).
    history_list: VecDeque<FrameId>,
    /// Frames with exactly K accesses, ascending by K-th most recent
    /// timestamp (front = smallest, i.e. the best victim among hot frames).
    cache_list: VecDeque<FrameId>,
}

struct LruKNode {
    /// Access timestamps, oldest first, at most K of them.
    history: VecDeque<u64>,
    is_evictable: bool,
}

impl LruKReplacer {
    /// Creates a replacer for at most `capacity` frames with the given K.
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(k > 0, "k must be > 0");
        Self {
            capacity,
            k,
            state: Mutex::new(ReplacerState {
                timestamp: 0,
                evictable: 0,
                nodes: HashMap::new(),
                history_list: VecDeque::new(),
                cache_list: VecDeque::new(),
            }),
        }
    }

    /// Records an access to `frame_id` at the next timestamp.
    ///
    /// A frame seen for the first time is registered as non-evictable on the
    /// history list. Once a frame's history reaches K entries it moves to the
    /// cache list; further accesses slide the history window and reposition
    /// the frame to keep the cache list ordered.
    pub fn record_access(&self, frame_id: FrameId) {
        let state = &mut *self.state.lock();
        let ts = state.timestamp;
        state.timestamp += 1;

        if let Some(node) = state.nodes.get_mut(&frame_id) {
            node.history.push_back(ts);
            if node.history.len() > self.k {
                // Slide the window and reposition within the cache list.
                node.history.pop_front();
                detach(&mut state.cache_list, frame_id);
                state.cache_insert(frame_id);
            } else if node.history.len() == self.k {
                // The frame just became hot.
                detach(&mut state.history_list, frame_id);
                state.cache_insert(frame_id);
            }
            // Below K accesses the frame stays put: its position on the
            // history list is fixed by arrival.
        } else {
            state.nodes.insert(
                frame_id,
                LruKNode {
                    history: VecDeque::from([ts]),
                    is_evictable: false,
                },
            );
            state.history_list.push_back(frame_id);
        }
    }

    /// Marks `frame_id` evictable or not, adjusting the evictable count.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is outside `[0, capacity)` or the frame is not
    /// tracked; both are caller bugs, not runtime conditions.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let state = &mut *self.state.lock();
        assert!(
            frame_id.index() < self.capacity,
            "set_evictable: frame {frame_id} out of range"
        );
        let node = state
            .nodes
            .get_mut(&frame_id)
            .expect("set_evictable: frame not tracked");

        if node.is_evictable != evictable {
            node.is_evictable = evictable;
            if evictable {
                state.evictable += 1;
            } else {
                state.evictable -= 1;
            }
        }
    }

    /// Removes `frame_id` from the replacer, dropping its access history.
    ///
    /// A call on an untracked frame is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the frame is tracked but not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let state = &mut *self.state.lock();
        if !state.nodes.contains_key(&frame_id) {
            return;
        }
        assert!(
            state.nodes[&frame_id].is_evictable,
            "remove: frame {frame_id} is pinned"
        );
        state.drop_node(frame_id);
    }

    /// Selects and removes the coldest evictable frame.
    ///
    /// Scans the history list front-to-back first, then the cache list.
    /// Returns `None` when no tracked frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let state = &mut *self.state.lock();
        let victim = scan_evictable(&state.history_list, &state.nodes)
            .or_else(|| scan_evictable(&state.cache_list, &state.nodes))?;
        state.drop_node(victim);
        Some(victim)
    }

    /// Number of evictable frames currently tracked.
    pub fn size(&self) -> usize {
        self.state.lock().evictable
    }

    /// Maximum number of frames this replacer may track.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The policy's K.
    pub fn k(&self) -> usize {
        self.k
    }
}

impl ReplacerState {
    /// Inserts a hot frame into the cache list, keeping it ordered by the
    /// K-th most recent access timestamp (the front of each node's history).
    fn cache_insert(&mut self, frame_id: FrameId) {
        let key = self.nodes[&frame_id].history[0];
        let pos = self
            .cache_list
            .iter()
            .position(|f| self.nodes[f].history[0] > key)
            .unwrap_or(self.cache_list.len());
        self.cache_list.insert(pos, frame_id);
    }

    /// Detaches an evictable frame from its list and drops its record.
    fn drop_node(&mut self, frame_id: FrameId) {
        detach(&mut self.history_list, frame_id);
        detach(&mut self.cache_list, frame_id);
        self.nodes.remove(&frame_id);
        self.evictable -= 1;
    }
}

fn detach(list: &mut VecDeque<FrameId>, frame_id: FrameId) {
    if let Some(pos) = list.iter().position(|f| *f == frame_id) {
        list.remove(pos);
    }
}

fn scan_evictable(
    list: &VecDeque<FrameId>,
    nodes: &HashMap<FrameId, LruKNode>,
) -> Option<FrameId> {
    list.iter().find(|f| nodes[*f].is_evictable).copied()
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruKReplacer")
            .field("capacity", &self.capacity)
            .field("k", &self.k)
            .field("tracked", &state.nodes.len())
            .field("evictable", &state.evictable)
            .finish()
    }
}
