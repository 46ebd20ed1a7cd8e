use fxhash::FxHashMap;

/// Per-Data-File table of short integer codes for frequently-used dictionary
/// keys. Dict keys encoded as
/// a shared-key id are resolved through this table for the lifetime of the
/// parsed value; the table itself outlives any individual parse.
#[derive(Debug, Default)]
pub struct SharedKeys {
    by_id: Vec<String>,
    by_name: FxHashMap<String, u32>,
}

impl SharedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.by_id.get(id as usize).map(String::as_str)
    }

    /// Look up the id for `key`, assigning the next free id if `key` hasn't
    /// been seen before and the table has not reached `max_entries`.
    pub fn encode(&mut self, key: &str, max_entries: usize) -> Option<u32> {
        if let Some(id) = self.by_name.get(key) {
            return Some(*id);
        }
        if self.by_id.len() >= max_entries {
            return None;
        }
        let id = self.by_id.len() as u32;
        self.by_id.push(key.to_string());
        self.by_name.insert(key.to_string(), id);
        Some(id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_then_resolve() {
        let mut keys = SharedKeys::new();
        let a = keys.encode("name", 2048).unwrap();
        let b = keys.encode("age", 2048).unwrap();
        let a2 = keys.encode("name", 2048).unwrap();

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(keys.get(a), Some("name"));
        assert_eq!(keys.get(b), Some("age"));
    }

    #[test]
    fn saturates_at_capacity() {
        let mut keys = SharedKeys::new();
        assert!(keys.encode("only", 1).is_some());
        assert!(keys.encode("other", 1).is_none());
    }
}
