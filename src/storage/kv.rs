use std::collections::HashMap;

/// The non-volatile backing store of the floppy image. Keys are sector-index
/// strings, values are base64-encoded 512-byte payloads so that a text-only
/// store can hold them. Reads of an unwritten key yield None, which the
/// sector cache treats as a zero-filled sector.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: String);
    fn delete(&mut self, key: &str);
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// in-memory store, used by tests and the headless runner
pub struct MemKvStore {
    map: HashMap<String, String>,
}

impl MemKvStore {
    pub fn default() -> Self {
        MemKvStore {
            map: HashMap::new(),
        }
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) {
        self.map.insert(key.to_string(), value);
    }

    fn delete(&mut self, key: &str) {
        self.map.remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self.map.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        keys
    }
}
