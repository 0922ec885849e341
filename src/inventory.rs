//! Full sensor records and the simulated sensor inventory.

use crate::controller::Controller;
use crate::error::{Error, Result};

/// Bytes of a full sensor record before the id string.
const FULL_SENSOR_FIXED_LEN: usize = 48;
/// Longest id string a full sensor record can carry.
pub const MAX_ID_STRING_LEN: usize = 31;
/// SDR version byte (IPMI 1.5/2.0).
const SDR_VERSION: u8 = 0x51;
/// Id string type/length byte: 8-bit ASCII + Latin-1.
const ID_STRING_ASCII: u8 = 0xC0;

/// A type 0x01 (full sensor) SDR.
///
/// `encode` produces the wire record with a zero record id; the repository
/// assigns the id on add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSensorRecord {
    /// Slave address of the owning controller.
    pub owner_id: u8,
    /// Owner LUN (low two bits).
    pub owner_lun: u8,
    /// Sensor number.
    pub number: u8,
    /// Entity id.
    pub entity_id: u8,
    /// Entity instance.
    pub entity_instance: u8,
    /// Sensor initialization byte.
    pub initialization: u8,
    /// Sensor capabilities byte.
    pub capabilities: u8,
    /// Sensor type code.
    pub sensor_type: u8,
    /// Event/reading type code.
    pub event_reading_type: u8,
    /// Assertion event mask / lower threshold reading mask.
    pub assertion_mask: u16,
    /// Deassertion event mask / upper threshold reading mask.
    pub deassertion_mask: u16,
    /// Discrete reading mask / settable-readable threshold mask.
    pub reading_mask: u16,
    /// Sensor units 1, 2 (base unit) and 3 (modifier unit).
    pub units: [u8; 3],
    /// Linearization.
    pub linearization: u8,
    /// M.
    pub m: u8,
    /// M high bits and tolerance.
    pub m_tolerance: u8,
    /// B.
    pub b: u8,
    /// B high bits and accuracy.
    pub b_accuracy: u8,
    /// Accuracy exponent and sensor direction.
    pub accuracy_direction: u8,
    /// R (result) and B exponents.
    pub exponents: u8,
    /// Analog characteristic flags.
    pub analog_flags: u8,
    /// Nominal reading.
    pub nominal_reading: u8,
    /// Normal maximum.
    pub normal_max: u8,
    /// Normal minimum.
    pub normal_min: u8,
    /// Sensor maximum reading.
    pub sensor_max: u8,
    /// Sensor minimum reading.
    pub sensor_min: u8,
    /// Upper non-critical, critical and non-recoverable thresholds.
    pub upper_thresholds: [u8; 3],
    /// Lower non-recoverable, critical and non-critical thresholds.
    pub lower_thresholds: [u8; 3],
    /// Positive- and negative-going threshold hysteresis.
    pub hysteresis: [u8; 2],
    /// OEM byte.
    pub oem: u8,
    /// Id string (at most 31 bytes).
    pub name: Vec<u8>,
}

impl FullSensorRecord {
    /// A threshold sensor owned by the BMC on LUN 0 with simulation defaults.
    pub fn new(number: u8, sensor_type: u8, name: impl AsRef<[u8]>) -> Self {
        Self {
            owner_id: 0x20,
            owner_lun: 0,
            number,
            entity_id: 3,
            entity_instance: 1,
            initialization: 0x67,
            capabilities: 0x88,
            sensor_type,
            event_reading_type: 1,
            assertion_mask: 0xC00F,
            deassertion_mask: 0xC07F,
            reading_mask: 0x3838,
            units: [0, 0, 0],
            linearization: 0,
            m: 1,
            m_tolerance: 0,
            b: 0,
            b_accuracy: 0,
            accuracy_direction: 0,
            exponents: 0,
            analog_flags: 3,
            nominal_reading: 0,
            normal_max: 0,
            normal_min: 0,
            sensor_max: 0,
            sensor_min: 0,
            upper_thresholds: [0; 3],
            lower_thresholds: [0; 3],
            hysteresis: [0; 2],
            oem: 0,
            name: name.as_ref().to_vec(),
        }
    }

    /// Encode the record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.name.len() > MAX_ID_STRING_LEN {
            return Err(Error::InvalidArgument("sensor id string longer than 31 bytes"));
        }
        let total = FULL_SENSOR_FIXED_LEN + self.name.len();

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&[0x00, 0x00]);
        out.push(SDR_VERSION);
        out.push(crate::repository::sdr::SDR_TYPE_FULL_SENSOR);
        out.push((total - crate::repository::sdr::SDR_HEADER_LEN) as u8);
        out.push(self.owner_id);
        out.push(self.owner_lun & 0x03);
        out.push(self.number);
        out.push(self.entity_id);
        out.push(self.entity_instance);
        out.push(self.initialization);
        out.push(self.capabilities);
        out.push(self.sensor_type);
        out.push(self.event_reading_type);
        out.extend_from_slice(&self.assertion_mask.to_le_bytes());
        out.extend_from_slice(&self.deassertion_mask.to_le_bytes());
        out.extend_from_slice(&self.reading_mask.to_le_bytes());
        out.extend_from_slice(&self.units);
        out.push(self.linearization);
        out.push(self.m);
        out.push(self.m_tolerance);
        out.push(self.b);
        out.push(self.b_accuracy);
        out.push(self.accuracy_direction);
        out.push(self.exponents);
        out.push(self.analog_flags);
        out.push(self.nominal_reading);
        out.push(self.normal_max);
        out.push(self.normal_min);
        out.push(self.sensor_max);
        out.push(self.sensor_min);
        out.extend_from_slice(&self.upper_thresholds);
        out.extend_from_slice(&self.lower_thresholds);
        out.extend_from_slice(&self.hysteresis);
        // reserved
        out.extend_from_slice(&[0x00, 0x00]);
        out.push(self.oem);
        out.push(ID_STRING_ASCII | self.name.len() as u8);
        out.extend_from_slice(&self.name);
        Ok(out)
    }
}

/// The four simulated sensors: temperature, voltage, current and fan.
pub fn simulated_sensors() -> Vec<FullSensorRecord> {
    vec![
        FullSensorRecord {
            units: [0, 1, 0],
            nominal_reading: 0x60,
            normal_max: 0xB0,
            sensor_max: 0xB0,
            upper_thresholds: [0xA0, 0x90, 0x66],
            ..FullSensorRecord::new(1, 0x01, "DJtemp")
        },
        FullSensorRecord {
            units: [0, 4, 0],
            normal_min: 0x0D,
            sensor_max: 0x10,
            sensor_min: 0x0C,
            upper_thresholds: [0x0F, 0x0E, 0x0D],
            ..FullSensorRecord::new(2, 0x02, "MXvoltage")
        },
        FullSensorRecord {
            units: [0, 5, 0],
            normal_min: 3,
            sensor_max: 6,
            sensor_min: 5,
            upper_thresholds: [7, 6, 5],
            ..FullSensorRecord::new(3, 0x03, "MXcurrent")
        },
        FullSensorRecord {
            units: [4, 0x12, 0x0A],
            normal_min: 0x28,
            sensor_max: 0x50,
            sensor_min: 0x32,
            upper_thresholds: [0x46, 0x3C, 0],
            ..FullSensorRecord::new(4, 0x04, "FXfanread")
        },
    ]
}

/// Load the simulated sensors and a few events for sensor 1 into `controller`.
pub fn seed_simulated(controller: &mut Controller) -> Result<()> {
    for record in simulated_sensors() {
        let id = controller.add_sdr(&record.encode()?)?;
        tracing::debug!(id, sensor = record.number, "simulated sensor added");
    }

    // Temperature event for sensor 1, event data 1..=3.
    let mut event = [
        0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x20, 0x00, 0x04, 0x01, 0x01, 0x01, 0x00,
        0x00, 0x00,
    ];
    for data in 1..=3 {
        event[12] = data;
        controller.add_sel_entry(&event)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;

    #[test]
    fn encoded_layout_matches_full_sensor_record() {
        let record = simulated_sensors().remove(0).encode().expect("encode");
        assert_eq!(record.len(), 48 + 6);
        assert_eq!(record[2], SDR_VERSION);
        assert_eq!(record[3], 0x01);
        assert_eq!(record[4], 0x31);
        assert_eq!(record[5], 0x20);
        assert_eq!(record[7], 1);
        assert_eq!(&record[14..20], &[0x0F, 0xC0, 0x7F, 0xC0, 0x38, 0x38]);
        assert_eq!(record[21], 1);
        assert_eq!(record[31], 0x60);
        assert_eq!(&record[36..39], &[0xA0, 0x90, 0x66]);
        assert_eq!(record[47], 0xC6);
        assert_eq!(&record[48..], b"DJtemp");
    }

    #[test]
    fn overlong_name_is_rejected() {
        let record = FullSensorRecord::new(9, 0x01, [b'x'; 32]);
        assert!(record.encode().is_err());
    }

    #[test]
    fn seed_loads_sensors_and_events() {
        let mut controller =
            Controller::new(ControllerConfig::builder().build().expect("config"));
        seed_simulated(&mut controller).expect("seed");
        assert_eq!(controller.sdr_count(), 4);
        assert_eq!(controller.sel_count(), 3);
        for number in 1..=4 {
            assert!(controller.sensor(0, number).is_some());
        }
    }
}
