use super::sensor::SensorTable;
use super::{
    ClearAction, ERASE_COMPLETED, LAST_RECORD, RecordRequest, Reservation, info_response, locate,
    parse_clear, read_window,
};
use crate::error::CompletionCode;

/// Record header: id(2), version, type, remaining length.
pub(crate) const SDR_HEADER_LEN: usize = 5;
/// Full sensor record with the longest id string.
pub(crate) const MAX_SDR_LEN: usize = 79;

pub(crate) const SDR_TYPE_FULL_SENSOR: u8 = 0x01;

const OFFSET_VERSION: usize = 2;
const OFFSET_TYPE: usize = 3;
const OFFSET_OWNER_LUN: usize = 6;
const OFFSET_SENSOR_NUMBER: usize = 7;

/// Version byte value marking an Add SDR payload as a sensor value update.
const VALUE_UPDATE_MARKER: u8 = 0x00;

/// Non-modal updates, reserve supported.
const SDR_REPO_FLAGS: u8 = 0x20 | 0x02;

#[derive(Debug, Clone)]
struct SdrRecord {
    id: u16,
    data: Vec<u8>,
}

impl SdrRecord {
    fn sensor_address(&self) -> Option<(u8, u8)> {
        let lun = self.data.get(OFFSET_OWNER_LUN)? & 0x03;
        let number = *self.data.get(OFFSET_SENSOR_NUMBER)?;
        Some((lun, number))
    }
}

#[derive(Debug)]
pub(crate) struct SdrRepository {
    records: Vec<SdrRecord>,
    next_id: u16,
    max_count: usize,
    reservation: Reservation,
    last_add: u32,
    last_erase: u32,
}

impl SdrRepository {
    pub(crate) fn new(max_count: usize) -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            max_count,
            reservation: Reservation::default(),
            last_add: 0,
            last_erase: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Get SDR Repository Info.
    pub(crate) fn info(&self) -> Vec<u8> {
        let free = self
            .max_count
            .saturating_sub(self.records.len())
            .saturating_mul(MAX_SDR_LEN);
        info_response(
            self.records.len(),
            free,
            self.last_add,
            self.last_erase,
            SDR_REPO_FLAGS,
        )
    }

    /// Reserve SDR Repository.
    pub(crate) fn reserve(&mut self) -> Vec<u8> {
        self.reservation.reserve().to_le_bytes().to_vec()
    }

    /// Get SDR.
    pub(crate) fn get(&self, data: &[u8], max_response: usize) -> Result<Vec<u8>, CompletionCode> {
        let request = RecordRequest::parse(data)?;
        self.reservation.check(request.reservation)?;

        let idx = locate(&self.records, request.id, |r| r.id).ok_or(CompletionCode::NOT_PRESENT)?;
        let next_id = self.records.get(idx + 1).map_or(LAST_RECORD, |r| r.id);
        read_window(
            &self.records[idx].data,
            next_id,
            request.offset,
            request.count,
            max_response,
        )
    }

    /// Add SDR, or update the live value of an existing sensor.
    pub(crate) fn add(
        &mut self,
        data: &[u8],
        now: u32,
        sensors: &mut SensorTable,
    ) -> Result<Vec<u8>, CompletionCode> {
        if data.len() < SDR_HEADER_LEN || data.len() > MAX_SDR_LEN {
            return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
        }
        if data[OFFSET_VERSION] == VALUE_UPDATE_MARKER {
            return self.update_value(data, sensors);
        }

        if self.records.len() >= self.max_count || self.next_id == LAST_RECORD {
            tracing::warn!(count = self.records.len(), "SDR repository full");
            return Err(CompletionCode::OUT_OF_SPACE);
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut record = SdrRecord {
            id,
            data: data.to_vec(),
        };
        record.data[0..2].copy_from_slice(&id.to_le_bytes());
        if record.data[OFFSET_TYPE] == SDR_TYPE_FULL_SENSOR {
            if let Some((lun, number)) = record.sensor_address() {
                sensors.register(lun, number);
            }
        }

        tracing::debug!(id, len = record.data.len(), "SDR added");
        self.records.push(record);
        self.last_add = now;
        Ok(id.to_le_bytes().to_vec())
    }

    /// Payload `[id lo, id hi, 0x00, lun, number, value]`.
    fn update_value(
        &mut self,
        data: &[u8],
        sensors: &mut SensorTable,
    ) -> Result<Vec<u8>, CompletionCode> {
        if data.len() < 6 {
            return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
        }
        let (lun, number, value) = (data[3] & 0x03, data[4], data[5]);
        let record = self
            .records
            .iter()
            .find(|r| r.sensor_address() == Some((lun, number)))
            .ok_or(CompletionCode::NOT_PRESENT)?;

        sensors.set_value(lun, number, value);
        Ok(record.id.to_le_bytes().to_vec())
    }

    /// Clear SDR Repository.
    pub(crate) fn clear(&mut self, data: &[u8], now: u32) -> Result<Vec<u8>, CompletionCode> {
        let (reservation, action) = parse_clear(data)?;
        self.reservation.check(reservation)?;

        if action == ClearAction::Erase {
            tracing::info!(count = self.records.len(), "SDR repository erased");
            self.records.clear();
            self.next_id = 1;
            self.last_erase = now;
            self.reservation.cancel();
        }
        Ok(vec![ERASE_COMPLETED])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lun: u8, number: u8) -> Vec<u8> {
        vec![0, 0, 0x51, SDR_TYPE_FULL_SENSOR, 3, 0x20, lun, number]
    }

    fn get(repo: &SdrRepository, resv: u16, id: u16, offset: u8, count: u8) -> Result<Vec<u8>, CompletionCode> {
        let [r0, r1] = resv.to_le_bytes();
        let [i0, i1] = id.to_le_bytes();
        repo.get(&[r0, r1, i0, i1, offset, count], 64)
    }

    #[test]
    fn add_assigns_increasing_ids_and_rewrites_header() {
        let mut repo = SdrRepository::new(10);
        let mut sensors = SensorTable::default();
        assert_eq!(repo.add(&record(0, 1), 10, &mut sensors), Ok(vec![1, 0]));
        assert_eq!(repo.add(&record(0, 2), 11, &mut sensors), Ok(vec![2, 0]));
        assert_eq!(sensors.len(), 2);

        let first = get(&repo, 0, 0, 0, 0xFF).expect("first");
        assert_eq!(&first[0..2], &[2, 0]);
        assert_eq!(&first[2..4], &[1, 0]);

        let last = get(&repo, 0, LAST_RECORD, 0, 0xFF).expect("last");
        assert_eq!(&last[0..2], &[0xFF, 0xFF]);
        assert_eq!(last[2 + OFFSET_SENSOR_NUMBER], 2);
    }

    #[test]
    fn add_rejects_bad_length_and_full_repository() {
        let mut repo = SdrRepository::new(1);
        let mut sensors = SensorTable::default();
        assert_eq!(
            repo.add(&[0, 0, 0x51], 0, &mut sensors),
            Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID)
        );
        assert_eq!(
            repo.add(&[0x51; MAX_SDR_LEN + 1], 0, &mut sensors),
            Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID)
        );
        repo.add(&record(0, 1), 0, &mut sensors).expect("add");
        assert_eq!(
            repo.add(&record(0, 2), 0, &mut sensors),
            Err(CompletionCode::OUT_OF_SPACE)
        );
    }

    #[test]
    fn id_space_exhaustion_is_terminal_until_clear() {
        let mut repo = SdrRepository::new(usize::MAX);
        let mut sensors = SensorTable::default();
        repo.next_id = LAST_RECORD - 1;
        assert_eq!(
            repo.add(&record(0, 1), 0, &mut sensors),
            Ok((LAST_RECORD - 1).to_le_bytes().to_vec())
        );
        assert_eq!(
            repo.add(&record(0, 2), 0, &mut sensors),
            Err(CompletionCode::OUT_OF_SPACE)
        );
        repo.clear(&[0, 0, b'C', b'L', b'R', 0xAA], 5).expect("clear");
        assert_eq!(repo.add(&record(0, 2), 0, &mut sensors), Ok(vec![1, 0]));
    }

    #[test]
    fn value_update_targets_existing_sensor_record() {
        let mut repo = SdrRepository::new(10);
        let mut sensors = SensorTable::default();
        repo.add(&record(0, 1), 0, &mut sensors).expect("add");
        repo.add(&record(1, 7), 0, &mut sensors).expect("add");

        assert_eq!(
            repo.add(&[0, 0, VALUE_UPDATE_MARKER, 1, 7, 0x55], 0, &mut sensors),
            Ok(vec![2, 0])
        );
        assert_eq!(sensors.get(1, 7).map(|s| s.value), Some(0x55));
        assert_eq!(repo.len(), 2);

        assert_eq!(
            repo.add(&[0, 0, VALUE_UPDATE_MARKER, 0, 9, 0x55], 0, &mut sensors),
            Err(CompletionCode::NOT_PRESENT)
        );
    }

    #[test]
    fn get_on_empty_or_missing_is_not_present() {
        let mut repo = SdrRepository::new(10);
        let mut sensors = SensorTable::default();
        assert_eq!(get(&repo, 0, 0, 0, 5), Err(CompletionCode::NOT_PRESENT));
        repo.add(&record(0, 1), 0, &mut sensors).expect("add");
        assert_eq!(get(&repo, 0, 42, 0, 5), Err(CompletionCode::NOT_PRESENT));
    }

    #[test]
    fn info_reports_count_and_timestamps() {
        let mut repo = SdrRepository::new(10);
        let mut sensors = SensorTable::default();
        repo.add(&record(0, 1), 0x0102_0304, &mut sensors).expect("add");
        let info = repo.info();
        assert_eq!(info[0], 0x51);
        assert_eq!(&info[1..3], &[1, 0]);
        assert_eq!(u16::from_le_bytes([info[3], info[4]]), (9 * MAX_SDR_LEN) as u16);
        assert_eq!(&info[5..9], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(info[13], SDR_REPO_FLAGS);
    }

    #[test]
    fn info_free_space_saturates_for_huge_capacity() {
        let info = SdrRepository::new(usize::MAX / 2).info();
        assert_eq!(&info[3..5], &[0xFE, 0xFF]);
    }

    #[test]
    fn erase_cancels_live_reservation() {
        let mut repo = SdrRepository::new(10);
        let mut sensors = SensorTable::default();
        repo.add(&record(0, 1), 0, &mut sensors).expect("add");
        let token = u16::from_le_bytes(repo.reserve().try_into().expect("two bytes"));
        let [r0, r1] = token.to_le_bytes();

        // a status query leaves the token alive
        repo.clear(&[r0, r1, b'C', b'L', b'R', 0x00], 0).expect("status");
        assert_eq!(get(&repo, token, 0, 0, 5).map(|r| r.len()), Ok(2 + 5));

        repo.clear(&[r0, r1, b'C', b'L', b'R', 0xAA], 0).expect("erase");
        assert_eq!(get(&repo, token, 0, 0, 5), Err(CompletionCode::INVALID_RESERVATION));
        assert_eq!(get(&repo, 0, 0, 0, 5), Err(CompletionCode::NOT_PRESENT));
    }

    #[test]
    fn stale_reservation_blocks_clear() {
        let mut repo = SdrRepository::new(10);
        let stale = u16::from_le_bytes(repo.reserve().try_into().expect("two bytes"));
        repo.reserve();
        let [r0, r1] = stale.to_le_bytes();
        assert_eq!(
            repo.clear(&[r0, r1, b'C', b'L', b'R', 0xAA], 0),
            Err(CompletionCode::INVALID_RESERVATION)
        );
    }
}
