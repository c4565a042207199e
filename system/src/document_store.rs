use crate::document::{BoardSummary, SharedBoard, WhiteboardDocument};
use crate::error::{PersistenceError, StoreError};
use crate::message::BoardSaved;
use crate::share_registry::{ShareLookup, ShareRegistry};
use crate::storage::DocumentStorage;
use crate::types::{BoardId, ShareId};
use serde_json::Value;
use std::collections::HashSet;

/// Outcome of a mutation that has already been applied in memory.
///
/// `persisted` carries the result of rewriting the backing storage. The
/// mutation stands regardless; callers pick [`Committed::lenient`] or
/// [`Committed::strict`].
#[derive(Debug)]
#[must_use]
pub struct Committed<T> {
    pub value: T,
    pub persisted: Result<(), PersistenceError>,
}

impl<T> Committed<T> {
    fn new(value: T, persisted: Result<(), PersistenceError>) -> Self {
        Self { value, persisted }
    }

    /// Persistence failures are already logged by the store.
    pub fn lenient(self) -> T {
        self.value
    }

    pub fn strict(self) -> Result<T, StoreError> {
        self.persisted?;
        Ok(self.value)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        Committed::new(f(self.value), self.persisted)
    }
}

/// Authoritative in-memory collection of boards, written through to `S` on every mutation.
pub struct DocumentStore<S> {
    documents: Vec<WhiteboardDocument>,
    shares: ShareRegistry,
    storage: S,
}

impl<S: DocumentStorage> DocumentStore<S> {
    /// Seeds from `storage`. Unreadable storage yields an empty store.
    pub fn open(mut storage: S) -> Self {
        let documents = match storage.read_all() {
            Ok(documents) => documents,
            Err(err) => {
                log::error!("Failed to read stored boards, starting empty: {}", err);
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let mut documents: Vec<_> = documents
            .into_iter()
            .filter(|document| {
                let fresh = seen.insert(document.board_id.clone());
                if !fresh {
                    log::warn!("Dropping duplicated board record {}", document.board_id);
                }
                fresh
            })
            .collect();
        let shares = ShareRegistry::rebuild(&mut documents);

        log::info!(
            "Loaded {} boards ({} shared)",
            documents.len(),
            shares.active_count()
        );

        Self {
            documents,
            shares,
            storage,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn list_summaries(&self) -> Vec<BoardSummary> {
        self.documents.iter().map(|d| d.summary()).collect()
    }

    pub fn create(&mut self) -> Committed<BoardId> {
        let mut board_id = BoardId::generate();
        while self.position(&board_id).is_some() {
            board_id = BoardId::generate();
        }
        self.documents.push(WhiteboardDocument::new(board_id.clone()));
        log::info!("Board {} created", board_id);
        Committed::new(board_id, self.persist())
    }

    pub fn load(&self, board_id: &BoardId) -> Result<&WhiteboardDocument, StoreError> {
        self.position(board_id)
            .map(|index| &self.documents[index])
            .ok_or_else(|| StoreError::BoardNotFound(board_id.clone()))
    }

    pub fn save(
        &mut self,
        board_id: &BoardId,
        title: String,
        content: Value,
    ) -> Result<Committed<BoardSaved>, StoreError> {
        let index = self
            .position(board_id)
            .ok_or_else(|| StoreError::BoardNotFound(board_id.clone()))?;

        let document = &mut self.documents[index];
        document.title = title;
        document.content = content;
        let saved = BoardSaved {
            board_id: board_id.clone(),
            title: document.title.clone(),
            content: document.content.clone(),
        };

        Ok(Committed::new(saved, self.persist()))
    }

    /// Returns whether a board was removed. Removing an absent board is not an error.
    pub fn delete(&mut self, board_id: &BoardId) -> Committed<bool> {
        let index = match self.position(board_id) {
            Some(index) => index,
            None => return Committed::new(false, Ok(())),
        };

        let document = self.documents.remove(index);
        if let Some(share_id) = &document.share_id {
            self.shares.retire(share_id);
        }
        log::info!("Board {} deleted", board_id);
        Committed::new(true, self.persist())
    }

    /// Attaches a fresh share id to the board. A previous share id stops resolving.
    pub fn generate_share(&mut self, board_id: &BoardId) -> Result<Committed<ShareId>, StoreError> {
        let index = self
            .position(board_id)
            .ok_or_else(|| StoreError::BoardNotFound(board_id.clone()))?;

        let mut share_id = ShareId::generate();
        while self.shares.is_taken(&share_id) {
            share_id = ShareId::generate();
        }

        let document = &mut self.documents[index];
        if let Some(previous) = document.share_id.replace(share_id.clone()) {
            self.shares.retire(&previous);
        }
        self.shares.attach(share_id.clone(), board_id.clone());
        log::info!("Board {} shared as {}", board_id, share_id);

        Ok(Committed::new(share_id, self.persist()))
    }

    pub fn resolve_share(&self, share_id: &ShareId) -> Result<SharedBoard, StoreError> {
        match self.shares.lookup(share_id) {
            ShareLookup::Active(board_id) => self.load(board_id).map(|d| d.shared_view()),
            ShareLookup::Retired => Err(StoreError::ShareExpired(share_id.clone())),
            ShareLookup::Unknown => Err(StoreError::ShareNotFound(share_id.clone())),
        }
    }

    pub fn share_of(&self, board_id: &BoardId) -> Option<&ShareId> {
        self.load(board_id).ok().and_then(|d| d.share_id.as_ref())
    }

    fn position(&self, board_id: &BoardId) -> Option<usize> {
        self.documents.iter().position(|d| &d.board_id == board_id)
    }

    fn persist(&mut self) -> Result<(), PersistenceError> {
        let result = self.storage.write_all(&self.documents);
        if let Err(ref err) = result {
            log::error!("Failed to persist boards: {}", err);
        }
        result
    }
}
