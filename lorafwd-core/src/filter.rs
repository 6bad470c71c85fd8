//! Identifier filters: JoinEUI ranges and the NetID bitmask.
//!
//! Filters are bundled in an immutable `FilterConfig`. The decoder reads it
//! through a shared reference; reconfiguration builds a new config and
//! publishes it through `FilterStore`.

use std::sync::{Arc, RwLock};

use tracing::info;

// ---------------------------------------------------------------------------
// JoinEUI range filter
// ---------------------------------------------------------------------------

/// Inclusive JoinEUI ranges. An empty list admits everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinEuiFilter {
    ranges: Vec<(u64, u64)>,
}

impl JoinEuiFilter {
    pub fn new(ranges: Vec<(u64, u64)>) -> Self {
        JoinEuiFilter { ranges }
    }

    pub fn ranges(&self) -> &[(u64, u64)] {
        &self.ranges
    }

    pub fn is_disabled(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True if `eui` falls inside any range, or the filter is disabled.
    pub fn admits(&self, eui: u64) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|&(lo, hi)| lo <= eui && eui <= hi)
    }
}

// ---------------------------------------------------------------------------
// NetID filter
// ---------------------------------------------------------------------------

/// Number of distinct NetIDs (7 bits).
pub const NETID_COUNT: usize = 128;

/// NetID selected by a device address: its top 7 bits.
pub fn netid_of(dev_addr: u32) -> u8 {
    ((dev_addr >> 25) & 0x7F) as u8
}

/// One bit per NetID, 128 bits in four 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetIdFilter {
    masks: [u32; 4],
}

impl Default for NetIdFilter {
    fn default() -> Self {
        NetIdFilter {
            masks: [u32::MAX; 4],
        }
    }
}

impl NetIdFilter {
    pub fn from_words(masks: [u32; 4]) -> Self {
        NetIdFilter { masks }
    }

    /// Admit only the listed NetIDs. Values are taken modulo 128.
    pub fn allow_only(netids: impl IntoIterator<Item = u8>) -> Self {
        let mut filter = NetIdFilter { masks: [0; 4] };
        for netid in netids {
            filter.set(netid, true);
        }
        filter
    }

    pub fn words(&self) -> [u32; 4] {
        self.masks
    }

    pub fn set(&mut self, netid: u8, allowed: bool) {
        let netid = netid & 0x7F;
        let bit = 1u32 << (netid & 0x1F);
        let word = &mut self.masks[(netid >> 5) as usize];
        if allowed {
            *word |= bit;
        } else {
            *word &= !bit;
        }
    }

    pub fn allows_netid(&self, netid: u8) -> bool {
        let netid = netid & 0x7F;
        self.masks[(netid >> 5) as usize] & (1u32 << (netid & 0x1F)) != 0
    }

    /// True if the NetID of `dev_addr` is admitted.
    pub fn admits(&self, dev_addr: u32) -> bool {
        self.allows_netid(netid_of(dev_addr))
    }

    pub fn allows_all(&self) -> bool {
        self.masks == [u32::MAX; 4]
    }
}

// ---------------------------------------------------------------------------
// Snapshot + store
// ---------------------------------------------------------------------------

/// Immutable filter snapshot read by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub join_eui: JoinEuiFilter,
    pub netid: NetIdFilter,
}

/// Shared holder for the current `FilterConfig`.
///
/// Workers call `snapshot()` once and decode any number of frames against
/// the returned `Arc`; `publish()` replaces the snapshot for subsequent
/// callers without disturbing snapshots already handed out.
#[derive(Debug, Default)]
pub struct FilterStore {
    current: RwLock<Arc<FilterConfig>>,
}

impl FilterStore {
    pub fn new(config: FilterConfig) -> Self {
        FilterStore {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<FilterConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn publish(&self, config: FilterConfig) {
        info!(
            join_eui_ranges = config.join_eui.ranges().len(),
            netid_all = config.netid.allows_all(),
            "publishing filter config"
        );
        let next = Arc::new(config);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_range_filter_admits_all() {
        let filter = JoinEuiFilter::default();
        assert!(filter.is_disabled());
        for eui in [0, 1, 15, u64::MAX] {
            assert!(filter.admits(eui));
        }
    }

    #[test]
    fn test_single_range() {
        let filter = JoinEuiFilter::new(vec![(10, 20)]);
        assert!(filter.admits(15));
        assert!(filter.admits(10));
        assert!(filter.admits(20));
        assert!(!filter.admits(21));
        assert!(!filter.admits(9));
    }

    #[test]
    fn test_overlapping_unsorted_ranges() {
        let filter = JoinEuiFilter::new(vec![(100, 200), (5, 8), (150, 300)]);
        assert!(filter.admits(6));
        assert!(filter.admits(250));
        assert!(!filter.admits(50));
        assert!(!filter.admits(301));
    }

    #[test]
    fn test_zero_range_is_a_real_range() {
        let filter = JoinEuiFilter::new(vec![(0, 0)]);
        assert!(filter.admits(0));
        assert!(!filter.admits(1));
    }

    #[test]
    fn test_netid_of() {
        assert_eq!(netid_of(0x0000_0000), 0);
        assert_eq!(netid_of(0xFE00_0000), 127);
        assert_eq!(netid_of(5 << 25), 5);
        assert_eq!(netid_of((5 << 25) | 0x01FF_FFFF), 5);
    }

    #[test]
    fn test_default_netid_admits_all() {
        let filter = NetIdFilter::default();
        assert!(filter.allows_all());
        for netid in 0..NETID_COUNT as u32 {
            assert!(filter.admits(netid << 25));
        }
    }

    #[test]
    fn test_clear_single_netid() {
        let mut filter = NetIdFilter::default();
        filter.set(5, false);
        for netid in 0..NETID_COUNT as u32 {
            let addr = (netid << 25) | 0x0012_3456;
            assert_eq!(filter.admits(addr), netid != 5, "netid={netid}");
        }
        assert_eq!(filter.words()[0], !(1 << 5));
    }

    #[test]
    fn test_allow_only() {
        let filter = NetIdFilter::allow_only([0, 33, 127]);
        assert_eq!(filter.words(), [1, 1 << 1, 0, 1 << 31]);
        assert!(filter.allows_netid(33));
        assert!(!filter.allows_netid(32));
    }

    #[test]
    fn test_store_publish_keeps_old_snapshot() {
        let store = FilterStore::default();
        let before = store.snapshot();

        let mut netid = NetIdFilter::default();
        netid.set(1, false);
        store.publish(FilterConfig {
            join_eui: JoinEuiFilter::new(vec![(1, 2)]),
            netid,
        });

        let after = store.snapshot();
        assert!(before.join_eui.is_disabled());
        assert!(before.netid.allows_all());
        assert_eq!(after.join_eui.ranges(), &[(1, 2)]);
        assert!(!after.netid.allows_netid(1));
    }

    #[test]
    fn test_store_shared_across_threads() {
        let store = Arc::new(FilterStore::new(FilterConfig::default()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let snap = store.snapshot();
                    (0..1000u32).filter(|i| snap.netid.admits(i << 20)).count()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 1000);
        }
    }
}
