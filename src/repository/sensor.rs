use std::collections::BTreeMap;

use crate::error::CompletionCode;

/// Live state of one sensor, addressed by `(lun, number)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorState {
    /// Raw reading.
    pub value: u8,
    /// Whether a reading is available.
    pub enabled: bool,
    /// Whether the sensor is being scanned.
    pub scanning_enabled: bool,
    /// Whether event messages are enabled.
    pub events_enabled: bool,
    /// Threshold / discrete state bits.
    pub event_status: u16,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            value: 0,
            enabled: true,
            scanning_enabled: true,
            events_enabled: true,
            event_status: 0,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SensorTable {
    sensors: BTreeMap<(u8, u8), SensorState>,
}

impl SensorTable {
    /// Make sure a sensor exists, keeping its state if it already does.
    pub(crate) fn register(&mut self, lun: u8, number: u8) {
        self.sensors.entry((lun & 0x03, number)).or_default();
    }

    pub(crate) fn set_value(&mut self, lun: u8, number: u8, value: u8) {
        self.sensors.entry((lun & 0x03, number)).or_default().value = value;
    }

    pub(crate) fn get(&self, lun: u8, number: u8) -> Option<&SensorState> {
        self.sensors.get(&(lun & 0x03, number))
    }

    pub(crate) fn get_mut(&mut self, lun: u8, number: u8) -> Option<&mut SensorState> {
        self.sensors.get_mut(&(lun & 0x03, number))
    }

    pub(crate) fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Get Sensor Reading for the sensor `data[0]` on `lun`.
    pub(crate) fn reading(&self, lun: u8, data: &[u8]) -> Result<Vec<u8>, CompletionCode> {
        let number = *data
            .first()
            .ok_or(CompletionCode::REQUEST_DATA_LENGTH_INVALID)?;
        let sensor = self.get(lun, number).ok_or(CompletionCode::NOT_PRESENT)?;

        let mut flags = 0u8;
        if sensor.events_enabled {
            flags |= 0x80;
        }
        if sensor.scanning_enabled {
            flags |= 0x40;
        }
        if !sensor.enabled {
            // reading unavailable
            flags |= 0x20;
        }
        let [status_lo, status_hi] = sensor.event_status.to_le_bytes();
        Ok(vec![sensor.value, flags, status_lo, status_hi])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_reports_value_and_flags() {
        let mut table = SensorTable::default();
        table.register(0, 3);
        table.set_value(0, 3, 0x42);
        assert_eq!(table.reading(0, &[3]), Ok(vec![0x42, 0xC0, 0, 0]));

        if let Some(sensor) = table.get_mut(0, 3) {
            sensor.enabled = false;
            sensor.events_enabled = false;
            sensor.event_status = 0x0102;
        }
        assert_eq!(table.reading(0, &[3]), Ok(vec![0x42, 0x60, 0x02, 0x01]));
    }

    #[test]
    fn unknown_sensor_or_lun_is_not_present() {
        let mut table = SensorTable::default();
        table.register(1, 3);
        assert_eq!(table.reading(0, &[3]), Err(CompletionCode::NOT_PRESENT));
        assert_eq!(table.reading(1, &[4]), Err(CompletionCode::NOT_PRESENT));
        assert_eq!(
            table.reading(1, &[]),
            Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID)
        );
    }

    #[test]
    fn register_keeps_existing_value() {
        let mut table = SensorTable::default();
        table.set_value(0, 9, 17);
        table.register(0, 9);
        assert_eq!(table.get(0, 9).map(|s| s.value), Some(17));
        assert_eq!(table.len(), 1);
    }
}
