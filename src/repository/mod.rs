pub(crate) mod sdr;
pub(crate) mod sel;
pub(crate) mod sensor;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CompletionCode;

/// IPMI version reported by the repository info commands (v1.5/2.0 encoding).
pub(crate) const REPOSITORY_VERSION: u8 = 0x51;

/// Record id addressing the first record.
pub(crate) const FIRST_RECORD: u16 = 0x0000;
/// Record id addressing the last record, and the "no next record" marker.
pub(crate) const LAST_RECORD: u16 = 0xFFFF;

/// Completion code byte plus the 2-byte next-record id.
const RECORD_RESPONSE_OVERHEAD: usize = 3;
/// Byte count asking for everything from `offset` to the end of the record.
const READ_TO_END: u8 = 0xFF;

const CLEAR_TAG: &[u8; 3] = b"CLR";
const CLEAR_GET_STATUS: u8 = 0x00;
const CLEAR_ERASE: u8 = 0xAA;
/// Clear status reply: erasure completed.
pub(crate) const ERASE_COMPLETED: u8 = 0x01;

/// A repository's single reservation token.
#[derive(Debug, Default)]
pub(crate) struct Reservation {
    current: u16,
}

impl Reservation {
    /// Issue a new token, cancelling the previous one.
    pub(crate) fn reserve(&mut self) -> u16 {
        self.current = match self.current.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        self.current
    }

    /// Invalidate the live token without handing out a new one.
    pub(crate) fn cancel(&mut self) {
        self.reserve();
    }

    /// `0` means "no reservation"; anything else must be the live token.
    pub(crate) fn check(&self, presented: u16) -> Result<(), CompletionCode> {
        if presented != 0 && presented != self.current {
            return Err(CompletionCode::INVALID_RESERVATION);
        }
        Ok(())
    }
}

/// Get SDR / Get SEL Entry request payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordRequest {
    pub reservation: u16,
    pub id: u16,
    pub offset: u8,
    pub count: u8,
}

impl RecordRequest {
    pub(crate) fn parse(data: &[u8]) -> Result<Self, CompletionCode> {
        if data.len() < 6 {
            return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
        }
        Ok(Self {
            reservation: u16::from_le_bytes([data[0], data[1]]),
            id: u16::from_le_bytes([data[2], data[3]]),
            offset: data[4],
            count: data[5],
        })
    }
}

/// Resolve a record id in the three addressing modes (first, last, exact).
/// Returns the index of the record.
pub(crate) fn locate<T>(records: &[T], id: u16, id_of: impl Fn(&T) -> u16) -> Option<usize> {
    match id {
        _ if records.is_empty() => None,
        FIRST_RECORD => Some(0),
        LAST_RECORD => Some(records.len() - 1),
        id => records.iter().position(|r| id_of(r) == id),
    }
}

/// Build the response to a record read: next id followed by the requested window.
pub(crate) fn read_window(
    record: &[u8],
    next_id: u16,
    offset: u8,
    count: u8,
    max_response: usize,
) -> Result<Vec<u8>, CompletionCode> {
    let offset = usize::from(offset);
    if offset >= record.len() {
        return Err(CompletionCode::PARAMETER_OUT_OF_RANGE);
    }
    let available = record.len() - offset;
    let len = match count {
        READ_TO_END => available,
        n => usize::from(n).min(available),
    };
    if len + RECORD_RESPONSE_OVERHEAD > max_response {
        return Err(CompletionCode::CANNOT_RETURN_REQUESTED_LENGTH);
    }

    let mut out = Vec::with_capacity(2 + len);
    out.extend_from_slice(&next_id.to_le_bytes());
    out.extend_from_slice(&record[offset..offset + len]);
    Ok(out)
}

/// What a Clear SDR Repository / Clear SEL request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClearAction {
    GetStatus,
    Erase,
}

/// Parse `reservation(2), 'C', 'L', 'R', op`.
pub(crate) fn parse_clear(data: &[u8]) -> Result<(u16, ClearAction), CompletionCode> {
    if data.len() < 6 {
        return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
    }
    let reservation = u16::from_le_bytes([data[0], data[1]]);
    if &data[2..5] != CLEAR_TAG {
        return Err(CompletionCode::INVALID_DATA_FIELD);
    }
    let action = match data[5] {
        CLEAR_GET_STATUS => ClearAction::GetStatus,
        CLEAR_ERASE => ClearAction::Erase,
        _ => return Err(CompletionCode::INVALID_DATA_FIELD),
    };
    Ok((reservation, action))
}

/// Common head of the repository info responses.
pub(crate) fn info_response(
    count: usize,
    free_bytes: usize,
    last_add: u32,
    last_erase: u32,
    flags: u8,
) -> Vec<u8> {
    let count = u16::try_from(count).unwrap_or(u16::MAX);
    // 0xFFFF is "unspecified" on the wire.
    let free = u16::try_from(free_bytes).unwrap_or(0xFFFE).min(0xFFFE);

    let mut out = Vec::with_capacity(14);
    out.push(REPOSITORY_VERSION);
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&free.to_le_bytes());
    out.extend_from_slice(&last_add.to_le_bytes());
    out.extend_from_slice(&last_erase.to_le_bytes());
    out.push(flags);
    out
}

/// SEL clock: the wall clock shifted by whatever Set SEL Time asked for.
#[derive(Debug, Default)]
pub(crate) struct Clock {
    offset: i64,
}

impl Clock {
    pub(crate) fn now(&self) -> u32 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        (wall + self.offset).clamp(0, i64::from(u32::MAX)) as u32
    }

    pub(crate) fn set(&mut self, now: u32) {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.offset = i64::from(now) - wall;
    }
}
