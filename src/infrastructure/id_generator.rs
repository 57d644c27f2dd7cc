// Document ID Generator - Snowflake-like ids rendered as fixed-width strings
// 64-bit layout: [timestamp:42][shard_id:10][sequence:12]
// Fixed-width rendering keeps lexicographic order equal to creation order, which is
// what breaks ties between documents created in the same millisecond.

use std::sync::Mutex;

/// Milliseconds since the Unix epoch.
pub fn current_time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

#[derive(Debug)]
pub struct DocumentIdGenerator {
    shard_id: u16,
    state: Mutex<GeneratorState>,
}

impl DocumentIdGenerator {
    /// `shard_id` must be below 1024; larger values are masked to 10 bits.
    pub fn new(shard_id: u16) -> Self {
        Self {
            shard_id: shard_id & 0x3FF,
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
            }),
        }
    }

    /// Next id, strictly greater than every id this generator returned before.
    pub fn next_id(&self) -> i64 {
        let now = current_time_millis().max(0) as u64;
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // A clock that steps backwards keeps using the last timestamp.
        let mut timestamp = now.max(state.last_timestamp);
        if timestamp == state.last_timestamp {
            state.sequence += 1;
            if state.sequence > 0xFFF {
                // Sequence exhausted: borrow the next millisecond.
                timestamp += 1;
                state.sequence = 0;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        let id = ((timestamp & 0x3FF_FFFF_FFFF) << 22)
            | ((self.shard_id as u64) << 12)
            | (state.sequence & 0xFFF);
        id as i64
    }

    /// Next id as a 19-digit zero-padded string.
    pub fn next_string_id(&self) -> String {
        format!("{:019}", self.next_id())
    }

    pub fn extract_shard_id(id: i64) -> u16 {
        ((id as u64) >> 12 & 0x3FF) as u16
    }

    pub fn extract_timestamp(id: i64) -> u64 {
        (id as u64) >> 22
    }

    pub fn shard_id(&self) -> u16 {
        self.shard_id
    }
}

impl Default for DocumentIdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let generator = DocumentIdGenerator::new(123);

        let id1 = generator.next_id();
        let id2 = generator.next_id();
        let id3 = generator.next_id();

        assert!(id1 < id2 && id2 < id3);

        assert_eq!(DocumentIdGenerator::extract_shard_id(id1), 123);
        assert_eq!(DocumentIdGenerator::extract_shard_id(id3), 123);
    }

    #[test]
    fn test_string_ids_sort_like_numbers() {
        let generator = DocumentIdGenerator::default();
        let ids: Vec<String> = (0..5000).map(|_| generator.next_string_id()).collect();
        assert!(ids.iter().all(|id| id.len() == 19));

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
    }

    #[test]
    fn test_shard_extraction() {
        let generator = DocumentIdGenerator::new(500);
        let id = generator.next_id();

        assert_eq!(DocumentIdGenerator::extract_shard_id(id), 500);
        assert_eq!(generator.shard_id(), 500);
        assert!(DocumentIdGenerator::extract_timestamp(id) > 0);
    }
}
