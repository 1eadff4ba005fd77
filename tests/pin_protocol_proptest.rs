//! Property tests for the pin protocol and replacement bookkeeping.

use std::collections::HashMap;

use lirsdb::{BufferPool, DiskManager, Error, MemoryDiskManager, PageId};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Pin(u32),
    Unpin(u32, bool),
    Flush,
}

fn op_strategy(num_pages: u32) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..num_pages).prop_map(Op::Pin),
        4 => (0..num_pages, any::<bool>()).prop_map(|(p, d)| Op::Unpin(p, d)),
        1 => Just(Op::Flush),
    ]
}

proptest! {
    /// Pin counts track a simple model, pinned pages stay resident, and the
    /// pool never holds more pages than frames.
    #[test]
    fn test_pin_counts_match_model(ops in prop::collection::vec(op_strategy(6), 1..200)) {
        let num_buffers = 3;
        let pool = BufferPool::new(num_buffers, MemoryDiskManager::new());
        let first = pool.disk().allocate_pages(6).unwrap();
        let mut pins: HashMap<PageId, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Pin(n) => {
                    let pid = first.offset(n);
                    let pinned_frames = pins.values().filter(|&&c| c > 0).count();
                    match pool.pin(pid, false) {
                        Ok(_) => *pins.entry(pid).or_insert(0) += 1,
                        Err(Error::PoolExhausted) => {
                            prop_assert_eq!(pinned_frames, num_buffers);
                            prop_assert!(!pool.contains(pid));
                        }
                        Err(e) => prop_assert!(false, "unexpected error {}", e),
                    }
                }
                Op::Unpin(n, dirty) => {
                    let pid = first.offset(n);
                    let expected = pins.get(&pid).copied().unwrap_or(0);
                    let before = pool.is_dirty(pid);
                    match pool.unpin(pid, dirty) {
                        Ok(()) => {
                            prop_assert!(expected > 0);
                            pins.insert(pid, expected - 1);
                        }
                        Err(Error::OverPin(_)) => {
                            prop_assert_eq!(expected, 0);
                            // Rejected unpin changes nothing
                            prop_assert_eq!(pool.is_dirty(pid), before);
                            prop_assert_eq!(pool.pin_count(pid), Some(0));
                        }
                        Err(Error::NotFound(_)) => {
                            prop_assert_eq!(expected, 0);
                            prop_assert!(!pool.contains(pid));
                        }
                        Err(e) => prop_assert!(false, "unexpected error {}", e),
                    }
                }
                Op::Flush => pool.flush_all_pages().unwrap(),
            }

            for (&pid, &count) in &pins {
                if count > 0 {
                    prop_assert_eq!(pool.pin_count(pid), Some(count));
                }
            }
            let pinned = pins.values().filter(|&&c| c > 0).count();
            prop_assert!(pool.resident_pages().len() <= num_buffers);
            prop_assert_eq!(pool.num_unpinned(), num_buffers - pinned);
        }
    }

    /// Whatever the access pattern, every write is readable afterwards.
    #[test]
    fn test_contents_survive_eviction(accesses in prop::collection::vec(0u32..8, 1..100)) {
        let pool = BufferPool::new(2, MemoryDiskManager::new());
        let first = pool.disk().allocate_pages(8).unwrap();
        let mut model = [0u8; 8];

        for (i, n) in accesses.into_iter().enumerate() {
            let value = (i % 251) as u8 + 1;
            let mut guard = pool.fetch_page_write(first.offset(n)).unwrap();
            guard.as_mut_slice()[0] = value;
            model[n as usize] = value;
        }

        for (n, &value) in model.iter().enumerate() {
            let guard = pool.fetch_page_read(first.offset(n as u32)).unwrap();
            prop_assert_eq!(guard.as_slice()[0], value);
        }
    }
}
