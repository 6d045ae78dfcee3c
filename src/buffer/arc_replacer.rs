use std::collections::HashMap;

use tracing::trace;

use crate::common::PageId;

use super::linked_list::{NodePool, PageList};

/// Which of the four ARC lists an entry currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListTag {
    T1,
    T2,
    B1,
    B2,
}

/// Outcome of `record_access`, observable by callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// The page was resident (T1 or T2)
    Hit,
    /// The page was unknown
    Miss,
    /// The page was a recency ghost (B1)
    GhostB1,
    /// The page was a frequency ghost (B2)
    GhostB2,
}

/// Adaptive Replacement Cache (Megiddo & Modha), augmented with a per-entry
/// evictable bit so pinned pages are skipped by the victim search.
///
/// T1 holds pages seen once, T2 pages seen more than once; B1/B2 hold the
/// ghost history of pages evicted from T1/T2. The adaptive parameter `p` is
/// the target size of T1: ghost hits in B1 grow it, ghost hits in B2 shrink
/// it. All calls must be externally serialized; the buffer pool wraps the
/// replacer in a mutex.
pub struct ArcReplacer {
    capacity: usize,
    /// Adaptive target size of T1, in [0, capacity]
    p: usize,
    pool: NodePool,
    t1: PageList,
    t2: PageList,
    b1: PageList,
    b2: PageList,
    /// Side index: one entry per page in any of the four lists
    index: HashMap<PageId, (usize, ListTag)>,
}

impl ArcReplacer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            capacity,
            p: 0,
            pool: NodePool::with_capacity(capacity * 2),
            t1: PageList::new(),
            t2: PageList::new(),
            b1: PageList::new(),
            b2: PageList::new(),
            index: HashMap::new(),
        }
    }

    /// Records an access to a page and returns where the page was found.
    /// Resident hits move to the tail of T2; ghost hits adapt `p`, make room,
    /// and promote the entry to T2; cold misses enter at the tail of T1.
    pub fn record_access(&mut self, page_id: PageId) -> AccessKind {
        match self.index.get(&page_id).copied() {
            Some((node, ListTag::T1)) => {
                self.t1.unlink(&mut self.pool, node);
                self.t2.push_back(&mut self.pool, node);
                self.index.insert(page_id, (node, ListTag::T2));
                AccessKind::Hit
            }
            Some((node, ListTag::T2)) => {
                self.t2.move_to_back(&mut self.pool, node);
                AccessKind::Hit
            }
            Some((node, ListTag::B1)) => {
                let delta = (self.b2.len() / self.b1.len().max(1)).max(1);
                self.p = (self.p + delta).min(self.capacity);
                trace!(page = %page_id, p = self.p, "ghost hit in B1");

                // Detach the ghost before making room so a ghost-list
                // overflow cannot reclaim the node being promoted.
                self.b1.unlink(&mut self.pool, node);
                if self.resident_len() >= self.capacity {
                    let _ = self.replace(false);
                }
                self.pool.node_mut(node).evictable = true;
                self.t2.push_back(&mut self.pool, node);
                self.index.insert(page_id, (node, ListTag::T2));
                AccessKind::GhostB1
            }
            Some((node, ListTag::B2)) => {
                let delta = (self.b1.len() / self.b2.len().max(1)).max(1);
                self.p = self.p.saturating_sub(delta);
                trace!(page = %page_id, p = self.p, "ghost hit in B2");

                self.b2.unlink(&mut self.pool, node);
                if self.resident_len() >= self.capacity {
                    let _ = self.replace(true);
                }
                self.pool.node_mut(node).evictable = true;
                self.t2.push_back(&mut self.pool, node);
                self.index.insert(page_id, (node, ListTag::T2));
                AccessKind::GhostB2
            }
            None => {
                if self.resident_len() >= self.capacity {
                    let _ = self.replace(false);
                }
                let node = self.pool.alloc(page_id);
                self.t1.push_back(&mut self.pool, node);
                self.index.insert(page_id, (node, ListTag::T1));
                AccessKind::Miss
            }
        }
    }

    /// Toggles the evictable flag of a tracked page. Ordering is unchanged.
    pub fn set_evictable(&mut self, page_id: PageId, evictable: bool) {
        if let Some(&(node, _)) = self.index.get(&page_id) {
            self.pool.node_mut(node).evictable = evictable;
        }
    }

    /// Picks a victim for the buffer pool: the same selection as `replace`
    /// (the adaptive update happens only in `record_access`), demoting the
    /// victim to its ghost list. Returns None when neither T1 nor T2 holds
    /// an evictable page.
    pub fn evict(&mut self) -> Option<PageId> {
        let victim = self.replace(false);
        if let Some(page_id) = victim {
            trace!(page = %page_id, "evicted");
        }
        victim
    }

    /// Drops a page from whichever list holds it.
    pub fn remove(&mut self, page_id: PageId) {
        if let Some((node, tag)) = self.index.remove(&page_id) {
            let list = match tag {
                ListTag::T1 => &mut self.t1,
                ListTag::T2 => &mut self.t2,
                ListTag::B1 => &mut self.b1,
                ListTag::B2 => &mut self.b2,
            };
            list.unlink(&mut self.pool, node);
            self.pool.free(node);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current adaptive target size of T1.
    pub fn p(&self) -> usize {
        self.p
    }

    /// Number of resident entries (T1 + T2).
    pub fn resident_len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    pub fn t1_len(&self) -> usize {
        self.t1.len()
    }

    pub fn t2_len(&self) -> usize {
        self.t2.len()
    }

    pub fn b1_len(&self) -> usize {
        self.b1.len()
    }

    pub fn b2_len(&self) -> usize {
        self.b2.len()
    }

    /// Makes room in the resident lists: demotes the LRU evictable page of
    /// T1 when T1 exceeds its target (or the hit came from B2), otherwise of
    /// T2, falling back to the other list when the preferred one has no
    /// evictable page. Returns the demoted page.
    fn replace(&mut self, in_b2: bool) -> Option<PageId> {
        let from_t1 = self.t1.len() > 0 && (self.t1.len() > self.p || in_b2);
        if from_t1 {
            self.demote(ListTag::T1).or_else(|| self.demote(ListTag::T2))
        } else {
            self.demote(ListTag::T2).or_else(|| self.demote(ListTag::T1))
        }
    }

    /// Moves the first evictable node of a resident list to the tail of its
    /// ghost list, dropping the oldest ghost on overflow. Returns the
    /// demoted page.
    fn demote(&mut self, from: ListTag) -> Option<PageId> {
        let (resident, ghost, ghost_tag) = match from {
            ListTag::T1 => (&mut self.t1, &mut self.b1, ListTag::B1),
            ListTag::T2 => (&mut self.t2, &mut self.b2, ListTag::B2),
            _ => unreachable!("demote source must be resident"),
        };

        let node = resident.first_evictable(&self.pool)?;
        resident.unlink(&mut self.pool, node);
        ghost.push_back(&mut self.pool, node);

        let page_id = self.pool.node(node).value;
        self.index.insert(page_id, (node, ghost_tag));

        if ghost.len() > self.capacity {
            if let Some(oldest) = ghost.pop_front(&mut self.pool) {
                let oldest_page = self.pool.node(oldest).value;
                self.index.remove(&oldest_page);
                self.pool.free(oldest);
            }
        }

        Some(page_id)
    }
}
