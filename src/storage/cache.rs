use std::collections::{HashMap, HashSet};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::warn;

use crate::storage::KvStore;

pub const SECTOR_SIZE: usize = 512;

/// Write-through sector cache over the external key/value store.
/// Reads lazily fault a sector in; writes mark it dirty; `flush` persists
/// every dirty sector and clears the dirty set.
pub struct SectorCache {
    store: Box<dyn KvStore>,
    sectors: HashMap<u16, Vec<u8>>,
    dirty: HashSet<u16>,
}

impl SectorCache {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        SectorCache {
            store,
            sectors: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    fn fault_in(&mut self, idx: u16) {
        if self.sectors.contains_key(&idx) {
            return;
        }
        let data = match self.store.get(&idx.to_string()) {
            Some(encoded) => match BASE64.decode(&encoded) {
                Ok(mut bytes) => {
                    bytes.resize(SECTOR_SIZE, 0);
                    bytes
                }
                Err(e) => {
                    // a corrupt value reads as a blank sector
                    warn!("sector {}: undecodable payload: {}", idx, e);
                    vec![0u8; SECTOR_SIZE]
                }
            },
            None => vec![0u8; SECTOR_SIZE],
        };
        self.sectors.insert(idx, data);
    }

    /// read-only view of a sector
    pub fn sector(&mut self, idx: u16) -> &[u8] {
        self.fault_in(idx);
        &self.sectors[&idx]
    }

    /// mutable view of a sector, marks it dirty
    pub fn sector_mut(&mut self, idx: u16) -> &mut Vec<u8> {
        self.fault_in(idx);
        self.dirty.insert(idx);
        self.sectors.get_mut(&idx).unwrap()
    }

    pub fn read_u8(&mut self, idx: u16, offset: usize) -> u8 {
        self.sector(idx)[offset]
    }

    pub fn write_u8(&mut self, idx: u16, offset: usize, data: u8) {
        self.sector_mut(idx)[offset] = data;
    }

    /// encodes and writes every dirty sector, then clears the dirty set
    pub fn flush(&mut self) {
        let mut dirty: Vec<u16> = self.dirty.drain().collect();
        dirty.sort_unstable();
        for idx in dirty {
            let encoded = BASE64.encode(&self.sectors[&idx]);
            self.store.put(&idx.to_string(), encoded);
        }
    }

    /// read access to the backing store (diagnostics and tests)
    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    /// drops every persisted sector and all cached state
    pub fn wipe(&mut self) {
        for key in self.store.keys_with_prefix("") {
            self.store.delete(&key);
        }
        self.sectors.clear();
        self.dirty.clear();
    }
}
