use std::collections::BTreeSet;

use super::{
    ClearAction, ERASE_COMPLETED, FIRST_RECORD, LAST_RECORD, RecordRequest, Reservation,
    info_response, locate, parse_clear, read_window,
};
use crate::error::CompletionCode;

pub(crate) const SEL_RECORD_LEN: usize = 16;

const OFFSET_RECORD_TYPE: usize = 2;
const OFFSET_TIMESTAMP: usize = 3;
/// Record types from here on are OEM non-timestamped and stored verbatim.
const FIRST_OEM_NON_TIMESTAMPED: u8 = 0xE0;

const FLAG_OVERFLOW: u8 = 0x80;
const FLAG_DELETE_SUPPORTED: u8 = 0x08;
const FLAG_RESERVE_SUPPORTED: u8 = 0x02;

#[derive(Debug, Clone)]
struct SelEntry {
    id: u16,
    data: [u8; SEL_RECORD_LEN],
}

fn next_record_id(id: u16) -> u16 {
    match id.wrapping_add(1) {
        FIRST_RECORD | LAST_RECORD => 1,
        n => n,
    }
}

#[derive(Debug)]
pub(crate) struct SelRepository {
    entries: Vec<SelEntry>,
    /// Ids of `entries`, for collision probes.
    live_ids: BTreeSet<u16>,
    next_id: u16,
    max_count: usize,
    overflow: bool,
    reservation: Reservation,
    last_add: u32,
    last_erase: u32,
}

impl SelRepository {
    pub(crate) fn new(max_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            live_ids: BTreeSet::new(),
            next_id: 1,
            max_count,
            overflow: false,
            reservation: Reservation::default(),
            last_add: 0,
            last_erase: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Get SEL Info.
    pub(crate) fn info(&self) -> Vec<u8> {
        let free = self
            .max_count
            .saturating_sub(self.entries.len())
            .saturating_mul(SEL_RECORD_LEN);
        let mut flags = FLAG_DELETE_SUPPORTED | FLAG_RESERVE_SUPPORTED;
        if self.overflow {
            flags |= FLAG_OVERFLOW;
        }
        info_response(
            self.entries.len(),
            free,
            self.last_add,
            self.last_erase,
            flags,
        )
    }

    /// Reserve SEL.
    pub(crate) fn reserve(&mut self) -> Vec<u8> {
        self.reservation.reserve().to_le_bytes().to_vec()
    }

    /// Get SEL Entry.
    pub(crate) fn get(&self, data: &[u8], max_response: usize) -> Result<Vec<u8>, CompletionCode> {
        let request = RecordRequest::parse(data)?;
        self.reservation.check(request.reservation)?;

        let idx = locate(&self.entries, request.id, |e| e.id).ok_or(CompletionCode::NOT_PRESENT)?;
        let next_id = self.entries.get(idx + 1).map_or(LAST_RECORD, |e| e.id);
        read_window(
            &self.entries[idx].data,
            next_id,
            request.offset,
            request.count,
            max_response,
        )
    }

    /// Pick the next free id, probing past ids still held by older entries.
    fn allocate_id(&mut self) -> Option<u16> {
        let start = match self.next_id {
            FIRST_RECORD | LAST_RECORD => 1,
            id => id,
        };
        let mut id = start;
        loop {
            if !self.live_ids.contains(&id) {
                self.next_id = next_record_id(id);
                return Some(id);
            }
            id = next_record_id(id);
            if id == start {
                return None;
            }
        }
    }

    /// Add SEL Entry.
    pub(crate) fn add(&mut self, data: &[u8], now: u32) -> Result<Vec<u8>, CompletionCode> {
        if data.len() != SEL_RECORD_LEN {
            return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
        }
        if self.entries.len() >= self.max_count {
            if !self.overflow {
                tracing::warn!(count = self.entries.len(), "SEL full, overflow flagged");
            }
            self.overflow = true;
            return Err(CompletionCode::OUT_OF_SPACE);
        }
        let id = self.allocate_id().ok_or(CompletionCode::OUT_OF_SPACE)?;

        let mut record = [0u8; SEL_RECORD_LEN];
        record.copy_from_slice(data);
        record[0..2].copy_from_slice(&id.to_le_bytes());
        if record[OFFSET_RECORD_TYPE] < FIRST_OEM_NON_TIMESTAMPED {
            record[OFFSET_TIMESTAMP..OFFSET_TIMESTAMP + 4].copy_from_slice(&now.to_le_bytes());
        }

        tracing::debug!(id, record_type = record[OFFSET_RECORD_TYPE], "SEL entry added");
        self.entries.push(SelEntry { id, data: record });
        self.live_ids.insert(id);
        self.last_add = now;
        Ok(id.to_le_bytes().to_vec())
    }

    /// Delete SEL Entry: `reservation(2), id(2)`.
    pub(crate) fn delete(&mut self, data: &[u8], now: u32) -> Result<Vec<u8>, CompletionCode> {
        if data.len() < 4 {
            return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
        }
        self.reservation
            .check(u16::from_le_bytes([data[0], data[1]]))?;

        let id = u16::from_le_bytes([data[2], data[3]]);
        let idx = locate(&self.entries, id, |e| e.id).ok_or(CompletionCode::NOT_PRESENT)?;
        let removed = self.entries.remove(idx);
        self.live_ids.remove(&removed.id);
        self.last_erase = now;
        tracing::debug!(id = removed.id, "SEL entry deleted");
        Ok(removed.id.to_le_bytes().to_vec())
    }

    /// Clear SEL.
    pub(crate) fn clear(&mut self, data: &[u8], now: u32) -> Result<Vec<u8>, CompletionCode> {
        let (reservation, action) = parse_clear(data)?;
        self.reservation.check(reservation)?;

        if action == ClearAction::Erase {
            tracing::info!(count = self.entries.len(), "SEL erased");
            self.entries.clear();
            self.live_ids.clear();
            self.overflow = false;
            self.last_erase = now;
            self.reservation.cancel();
        }
        Ok(vec![ERASE_COMPLETED])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(record_type: u8) -> [u8; SEL_RECORD_LEN] {
        let mut record = [0u8; SEL_RECORD_LEN];
        record[OFFSET_RECORD_TYPE] = record_type;
        record[6] = 0x20;
        record[15] = 0xAB;
        record
    }

    fn id_of(reply: Result<Vec<u8>, CompletionCode>) -> u16 {
        let bytes = reply.expect("add");
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    #[test]
    fn ids_are_distinct_and_increasing() {
        let mut sel = SelRepository::new(100);
        let ids: Vec<u16> = (0..5).map(|_| id_of(sel.add(&event(0x02), 1))).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn allocation_after_delete_never_collides() {
        let mut sel = SelRepository::new(100);
        for _ in 0..5 {
            sel.add(&event(0x02), 1).expect("add");
        }
        sel.delete(&[0, 0, 3, 0], 2).expect("delete");
        assert!(!sel.live_ids.contains(&3));

        // Force the allocator to restart among surviving ids.
        sel.next_id = 1;
        let id = id_of(sel.add(&event(0x02), 3));
        assert_eq!(id, 3);
        let id = id_of(sel.add(&event(0x02), 3));
        assert_eq!(id, 6);
    }

    #[test]
    fn allocator_wraps_skipping_zero_and_last() {
        let mut sel = SelRepository::new(100);
        sel.next_id = 0xFFFE;
        assert_eq!(id_of(sel.add(&event(0x02), 1)), 0xFFFE);
        assert_eq!(id_of(sel.add(&event(0x02), 1)), 1);
    }

    #[test]
    fn allocator_reports_exhaustion() {
        let mut sel = SelRepository::new(usize::MAX);
        sel.entries = (1..LAST_RECORD)
            .map(|id| SelEntry {
                id,
                data: [0; SEL_RECORD_LEN],
            })
            .collect();
        sel.live_ids = (1..LAST_RECORD).collect();
        assert_eq!(
            sel.add(&event(0x02), 1),
            Err(CompletionCode::OUT_OF_SPACE)
        );
    }

    #[test]
    fn full_log_sets_overflow_until_cleared() {
        let mut sel = SelRepository::new(1);
        sel.add(&event(0x02), 1).expect("add");
        assert_eq!(sel.add(&event(0x02), 1), Err(CompletionCode::OUT_OF_SPACE));
        assert_eq!(sel.info()[13] & FLAG_OVERFLOW, FLAG_OVERFLOW);

        sel.clear(&[0, 0, b'C', b'L', b'R', 0xAA], 9).expect("clear");
        let info = sel.info();
        assert_eq!(info[13] & FLAG_OVERFLOW, 0);
        assert_eq!(&info[1..3], &[0, 0]);
        assert_eq!(&info[9..13], &9u32.to_le_bytes());
    }

    #[test]
    fn erase_cancels_live_reservation() {
        let mut sel = SelRepository::new(10);
        sel.add(&event(0x02), 1).expect("add");
        let token = sel.reserve();
        sel.clear(&[token[0], token[1], b'C', b'L', b'R', 0xAA], 2)
            .expect("erase");
        assert_eq!(
            sel.get(&[token[0], token[1], 0, 0, 0, 0xFF], 64),
            Err(CompletionCode::INVALID_RESERVATION)
        );
        assert_eq!(
            sel.clear(&[token[0], token[1], b'C', b'L', b'R', 0x00], 3),
            Err(CompletionCode::INVALID_RESERVATION)
        );
        let fresh = sel.reserve();
        assert_ne!(fresh, token);
        assert_eq!(
            sel.get(&[fresh[0], fresh[1], 0, 0, 0, 0xFF], 64),
            Err(CompletionCode::NOT_PRESENT)
        );
    }

    #[test]
    fn info_free_space_saturates_for_huge_capacity() {
        let info = SelRepository::new(usize::MAX).info();
        assert_eq!(&info[3..5], &[0xFE, 0xFF]);
    }

    #[test]
    fn timestamps_only_standard_records() {
        let mut sel = SelRepository::new(10);
        sel.add(&event(0x02), 0xAABB_CCDD).expect("add");
        sel.add(&event(0xE1), 0xAABB_CCDD).expect("add");

        let standard = sel.get(&[0, 0, 1, 0, 0, 0xFF], 64).expect("get");
        assert_eq!(&standard[2 + OFFSET_TIMESTAMP..2 + OFFSET_TIMESTAMP + 4], &[0xDD, 0xCC, 0xBB, 0xAA]);

        let oem = sel.get(&[0, 0, 2, 0, 0, 0xFF], 64).expect("get");
        assert_eq!(&oem[2 + OFFSET_TIMESTAMP..2 + OFFSET_TIMESTAMP + 4], &[0, 0, 0, 0x20]);
        assert_eq!(oem[2 + 15], 0xAB);
    }

    #[test]
    fn get_follows_next_id_chain() {
        let mut sel = SelRepository::new(10);
        for _ in 0..3 {
            sel.add(&event(0x02), 1).expect("add");
        }
        sel.delete(&[0, 0, 2, 0], 1).expect("delete");

        let first = sel.get(&[0, 0, 0, 0, 0, 2], 64).expect("get");
        assert_eq!(first, vec![3, 0, 1, 0]);
        let last = sel.get(&[0, 0, 3, 0, 0, 2], 64).expect("get");
        assert_eq!(&last[0..2], &[0xFF, 0xFF]);
    }

    #[test]
    fn delete_checks_reservation_and_presence() {
        let mut sel = SelRepository::new(10);
        sel.add(&event(0x02), 1).expect("add");
        let token = sel.reserve();
        assert_eq!(
            sel.delete(&[token[0].wrapping_add(1), token[1], 1, 0], 1),
            Err(CompletionCode::INVALID_RESERVATION)
        );
        assert_eq!(
            sel.delete(&[token[0], token[1], 7, 0], 1),
            Err(CompletionCode::NOT_PRESENT)
        );
        assert_eq!(sel.delete(&[token[0], token[1], 1, 0], 1), Ok(vec![1, 0]));
        assert_eq!(sel.len(), 0);
    }
}
