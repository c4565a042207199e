//! Share links resolve through an index derived from the document records.
//!
//! The index is rebuilt whenever the store is opened. Share ids that stop
//! resolving while the process runs (board deleted, board re-shared) are kept
//! as retired so they can be reported as expired rather than unknown. At most
//! `DEFAULT_RETIRED_CAPACITY` of them are remembered; once full, the oldest
//! retired id is forgotten and resolves as unknown again.

use crate::document::WhiteboardDocument;
use crate::types::{BoardId, ShareId};
use std::collections::{HashMap, HashSet, VecDeque};

pub const DEFAULT_RETIRED_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct ShareRegistry {
    active: HashMap<ShareId, BoardId>,
    retired: HashSet<ShareId>,
    // retirement order, oldest first
    retired_order: VecDeque<ShareId>,
    retired_capacity: usize,
}

pub enum ShareLookup<'a> {
    Active(&'a BoardId),
    Retired,
    Unknown,
}

impl ShareRegistry {
    pub fn new() -> Self {
        Self::with_retired_capacity(DEFAULT_RETIRED_CAPACITY)
    }

    pub fn with_retired_capacity(retired_capacity: usize) -> Self {
        Self {
            active: HashMap::new(),
            retired: HashSet::new(),
            retired_order: VecDeque::new(),
            retired_capacity,
        }
    }

    /// Indexes every share id in `documents`. A share id already claimed by an
    /// earlier record is stripped from the later one.
    pub fn rebuild(documents: &mut [WhiteboardDocument]) -> Self {
        let mut registry = Self::new();
        for document in documents.iter_mut() {
            if let Some(share_id) = document.share_id.take() {
                if registry.active.contains_key(&share_id) {
                    log::warn!(
                        "Share {} is claimed by more than one board, dropping it from {}",
                        share_id,
                        document.board_id
                    );
                } else {
                    registry
                        .active
                        .insert(share_id.clone(), document.board_id.clone());
                    document.share_id = Some(share_id);
                }
            }
        }
        registry
    }

    pub fn attach(&mut self, share_id: ShareId, board_id: BoardId) {
        if self.retired.remove(&share_id) {
            self.retired_order.retain(|retired| retired != &share_id);
        }
        self.active.insert(share_id, board_id);
    }

    pub fn retire(&mut self, share_id: &ShareId) {
        if self.active.remove(share_id).is_none() || self.retired_capacity == 0 {
            return;
        }
        while self.retired_order.len() >= self.retired_capacity {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
        self.retired.insert(share_id.clone());
        self.retired_order.push_back(share_id.clone());
    }

    pub fn lookup(&self, share_id: &ShareId) -> ShareLookup<'_> {
        match self.active.get(share_id) {
            Some(board_id) => ShareLookup::Active(board_id),
            None if self.retired.contains(share_id) => ShareLookup::Retired,
            None => ShareLookup::Unknown,
        }
    }

    pub fn is_taken(&self, share_id: &ShareId) -> bool {
        self.active.contains_key(share_id) || self.retired.contains(share_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for ShareRegistry {
    fn default() -> Self {
        Self::new()
    }
}
