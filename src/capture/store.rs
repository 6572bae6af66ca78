use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;

use crate::models::packet::{PacketRecord, PartialRecord};

/// Bounded, insertion-ordered store of decoded packet records.
///
/// Eviction is strictly FIFO: once `capacity` is exceeded the record with
/// the lowest sequence id is dropped, never anything chosen by protocol or
/// address. Inserts (capture loop) and queries (API handlers) run
/// concurrently; every operation is atomic under the inner mutex and records
/// are handed out as `Arc`, so a query can never observe a partially written
/// record and no insert is lost to a concurrent query.
pub struct RingBufferStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    records: VecDeque<Arc<PacketRecord>>,
    next_seq: u64,
}

impl RingBufferStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                records: VecDeque::new(),
                next_seq: 1,
            }),
        }
    }

    /// Insert a classified record, returning its assigned sequence id.
    pub fn insert(
        &self,
        partial: PartialRecord,
        decoded_text: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> u64 {
        let mut inner = self.inner.lock();
        let sequence_id = inner.next_seq;
        inner.next_seq += 1;

        let length = partial.payload.len();
        inner.records.push_back(Arc::new(PacketRecord {
            sequence_id,
            timestamp,
            source_ip: partial.source_ip,
            dest_ip: partial.dest_ip,
            source_port: partial.source_port,
            dest_port: partial.dest_port,
            protocol: partial.protocol,
            length,
            decoded_text,
            payload: partial.payload,
        }));

        while inner.records.len() > self.capacity {
            inner.records.pop_front();
        }

        sequence_id
    }

    /// Query records with `sequence_id > since`, optionally touching `ip` as
    /// source or destination, returning at most the most recent `limit`
    /// matches in ascending sequence order.
    pub fn query(&self, ip: Option<IpAddr>, since: u64, limit: usize) -> Vec<Arc<PacketRecord>> {
        let inner = self.inner.lock();
        let mut out = Vec::new();

        for record in inner.records.iter().rev() {
            if record.sequence_id <= since {
                break;
            }
            if let Some(ip) = ip {
                if record.source_ip != Some(ip) && record.dest_ip != Some(ip) {
                    continue;
                }
            }
            out.push(Arc::clone(record));
            if out.len() == limit {
                break;
            }
        }

        out.reverse();
        out
    }

    /// Fetch a single record by sequence id.
    pub fn get(&self, sequence_id: u64) -> Option<Arc<PacketRecord>> {
        let inner = self.inner.lock();
        inner
            .records
            .binary_search_by_key(&sequence_id, |r| r.sequence_id)
            .ok()
            .map(|idx| Arc::clone(&inner.records[idx]))
    }

    /// Drop all records. Sequence ids keep increasing across a clear.
    pub fn clear(&self) {
        self.inner.lock().records.clear();
    }

    /// Number of records currently held.
    pub fn size(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Highest sequence id assigned so far, 0 before the first insert.
    pub fn last_seq(&self) -> u64 {
        self.inner.lock().next_seq - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::packet::Protocol;
    use std::thread;

    fn partial(src: &str, dst: &str, payload: &[u8]) -> PartialRecord {
        PartialRecord {
            source_ip: Some(src.parse().unwrap()),
            dest_ip: Some(dst.parse().unwrap()),
            source_port: Some(40000),
            dest_port: Some(80),
            protocol: Protocol::Tcp,
            payload: payload.to_vec(),
        }
    }

    fn insert_n(store: &RingBufferStore, n: usize) {
        for i in 0..n {
            store.insert(
                partial("10.0.0.1", "10.0.0.2", format!("p{}", i).as_bytes()),
                None,
                Utc::now(),
            );
        }
    }

    #[test]
    fn sequence_ids_are_strictly_increasing() {
        let store = RingBufferStore::new(100);
        insert_n(&store, 10);

        let records = store.query(None, 0, 100);
        assert_eq!(records.len(), 10);
        for pair in records.windows(2) {
            assert!(pair[0].sequence_id < pair[1].sequence_id);
        }
    }

    #[test]
    fn eviction_keeps_the_last_capacity_records() {
        let store = RingBufferStore::new(5);
        insert_n(&store, 5 + 3);

        assert_eq!(store.size(), 5);
        let records = store.query(None, 0, 100);
        let ids: Vec<u64> = records.iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn capacity_three_scenario() {
        let store = RingBufferStore::new(3);
        insert_n(&store, 4);

        let ids: Vec<u64> = store
            .query(None, 0, 100)
            .iter()
            .map(|r| r.sequence_id)
            .collect();
        assert_eq!(ids, vec![2, 3, 4]);

        let since_two: Vec<u64> = store
            .query(None, 2, 100)
            .iter()
            .map(|r| r.sequence_id)
            .collect();
        assert_eq!(since_two, vec![3, 4]);
    }

    #[test]
    fn limit_returns_most_recent_matches_in_order() {
        let store = RingBufferStore::new(100);
        insert_n(&store, 10);

        let ids: Vec<u64> = store
            .query(None, 0, 3)
            .iter()
            .map(|r| r.sequence_id)
            .collect();
        assert_eq!(ids, vec![8, 9, 10]);
    }

    #[test]
    fn ip_filter_matches_either_endpoint() {
        let store = RingBufferStore::new(100);
        store.insert(partial("10.0.0.1", "10.0.0.2", b"a"), None, Utc::now());
        store.insert(partial("10.0.0.3", "10.0.0.4", b"b"), None, Utc::now());
        store.insert(partial("10.0.0.2", "10.0.0.3", b"c"), None, Utc::now());

        let ip = "10.0.0.2".parse().ok();
        let ids: Vec<u64> = store.query(ip, 0, 100).iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn get_by_sequence_id() {
        let store = RingBufferStore::new(3);
        insert_n(&store, 4);

        assert!(store.get(1).is_none()); // evicted
        assert_eq!(store.get(3).unwrap().sequence_id, 3);
        assert!(store.get(99).is_none());
    }

    #[test]
    fn clear_keeps_sequence_monotonic() {
        let store = RingBufferStore::new(10);
        insert_n(&store, 4);
        store.clear();

        assert_eq!(store.size(), 0);
        assert_eq!(store.last_seq(), 4);

        let seq = store.insert(partial("10.0.0.1", "10.0.0.2", b"x"), None, Utc::now());
        assert_eq!(seq, 5);
    }

    #[test]
    fn concurrent_inserts_produce_distinct_ids() {
        let store = Arc::new(RingBufferStore::new(1000));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.insert(partial("10.0.0.1", "10.0.0.2", b"x"), None, Utc::now());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(store.size(), 200);
        let records = store.query(None, 0, 1000);
        assert_eq!(records.len(), 200);
        let mut ids: Vec<u64> = records.iter().map(|r| r.sequence_id).collect();
        let before_dedup = ids.clone();
        ids.dedup();
        assert_eq!(ids, before_dedup);
        assert_eq!(ids.len(), 200);
    }
}
