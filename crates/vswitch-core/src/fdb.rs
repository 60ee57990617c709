//! MAC learning table (forwarding database).

use vswitch_packet::MacAddr;

/// Default number of learning slots.
pub const DEFAULT_FDB_CAPACITY: usize = 8;

/// Bounded MAC-to-port map with FIFO slot replacement.
///
/// When the table is full, the write cursor deterministically overwrites the
/// slot written longest ago (FIFO by insertion order). Re-learning a known
/// MAC on a different port updates the entry in place: it consumes no slot
/// and does not advance the cursor, so a station that moves between ports
/// keeps its position in the eviction order.
#[derive(Debug, Clone)]
pub struct Fdb {
    slots: Vec<Option<(MacAddr, u16)>>,
    cursor: usize,
}

impl Fdb {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "learning table needs at least one slot");
        Self {
            slots: vec![None; capacity],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Record that `mac` was last seen on `port`.
    ///
    /// Callers guarantee `mac` is unicast; group addresses never appear as
    /// valid source addresses.
    pub fn learn(&mut self, mac: MacAddr, port: u16) {
        debug_assert!(mac.is_unicast());

        for slot in self.slots.iter_mut().flatten() {
            if slot.0 == mac {
                slot.1 = port;
                return;
            }
        }

        self.slots[self.cursor] = Some((mac, port));
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// The port `mac` was last learned on. Group addresses are never stored,
    /// so they miss without a scan.
    pub fn lookup(&self, mac: MacAddr) -> Option<u16> {
        if mac.is_multicast() {
            return None;
        }
        self.slots
            .iter()
            .flatten()
            .find(|(m, _)| *m == mac)
            .map(|&(_, port)| port)
    }

    /// Occupied entries in slot order, for diagnostics.
    pub fn entries(&self) -> impl Iterator<Item = (MacAddr, u16)> + '_ {
        self.slots.iter().flatten().copied()
    }
}

impl Default for Fdb {
    fn default() -> Self {
        Self::new(DEFAULT_FDB_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn learns_and_looks_up() {
        let mut fdb = Fdb::default();
        assert_eq!(fdb.lookup(mac(1)), None);
        fdb.learn(mac(1), 3);
        assert_eq!(fdb.lookup(mac(1)), Some(3));
        assert_eq!(fdb.occupied(), 1);
    }

    #[test]
    fn relearning_same_port_changes_nothing() {
        let mut fdb = Fdb::default();
        fdb.learn(mac(1), 3);
        let before: Vec<_> = fdb.entries().collect();
        fdb.learn(mac(1), 3);
        assert_eq!(fdb.entries().collect::<Vec<_>>(), before);
        assert_eq!(fdb.occupied(), 1);
    }

    #[test]
    fn station_move_updates_in_place() {
        let mut fdb = Fdb::new(4);
        fdb.learn(mac(1), 1);
        fdb.learn(mac(2), 2);
        fdb.learn(mac(1), 3);

        assert_eq!(fdb.lookup(mac(1)), Some(3));
        assert_eq!(fdb.occupied(), 2);
        // The moved entry kept its original slot position.
        assert_eq!(fdb.entries().next(), Some((mac(1), 3)));
    }

    #[test]
    fn full_table_overwrites_fifo() {
        let mut fdb = Fdb::new(2);
        fdb.learn(mac(1), 1);
        fdb.learn(mac(2), 2);
        fdb.learn(mac(3), 3);

        // mac(1) was written first, so it was overwritten first.
        assert_eq!(fdb.lookup(mac(1)), None);
        assert_eq!(fdb.lookup(mac(2)), Some(2));
        assert_eq!(fdb.lookup(mac(3)), Some(3));
        assert_eq!(fdb.occupied(), 2);

        fdb.learn(mac(4), 4);
        assert_eq!(fdb.lookup(mac(2)), None);
        assert_eq!(fdb.lookup(mac(4)), Some(4));
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let mut fdb = Fdb::new(4);
        for i in 0..32 {
            fdb.learn(mac(i), u16::from(i));
            assert!(fdb.occupied() <= fdb.capacity());
        }
        assert_eq!(fdb.occupied(), 4);
    }

    #[test]
    fn group_addresses_never_hit() {
        let mut fdb = Fdb::default();
        fdb.learn(mac(1), 1);
        assert_eq!(fdb.lookup(MacAddr::BROADCAST), None);
        assert_eq!(fdb.lookup(MacAddr([0x01, 0, 0x5e, 0, 0, 5])), None);
    }
}
