use crate::bus::RegisterBus;
use crate::error::CalibrationError;
use crate::registers::*;

/// Factory trim coefficients of one sensor unit. A value of this type only
/// exists once every coefficient has been read.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CalibrationData {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

struct Reader<'a, B: RegisterBus> {
    bus: &'a mut B,
    // every byte seen in the temperature/pressure block, for the absent check
    seen: Vec<u8>,
}

impl<'a, B: RegisterBus> Reader<'a, B> {
    fn byte(&mut self, register: u8) -> Result<u8, CalibrationError<B::Error>> {
        self.bus
            .read_register(register)
            .map_err(|source| CalibrationError::Read { register, source })
    }

    fn block<const N: usize>(&mut self, register: u8) -> Result<[u8; N], CalibrationError<B::Error>> {
        let mut buffer = [0u8; N];
        self.bus
            .read_registers(register, &mut buffer)
            .map_err(|source| CalibrationError::Read { register, source })?;
        Ok(buffer)
    }

    fn word(&mut self, register: u8) -> Result<u16, CalibrationError<B::Error>> {
        let [lsb, msb] = self.block::<2>(register)?;
        self.seen.push(lsb);
        self.seen.push(msb);
        Ok(u16::from_le_bytes([lsb, msb]))
    }

    fn signed_word(&mut self, register: u8) -> Result<i16, CalibrationError<B::Error>> {
        self.word(register).map(|w| w as i16)
    }
}

impl CalibrationData {
    /// Reads all trim registers. Any failed read aborts the load and nothing
    /// partial is returned; retrying means calling `load` again.
    pub fn load<B: RegisterBus>(bus: &mut B) -> Result<Self, CalibrationError<B::Error>> {
        let mut reader = Reader {
            bus,
            seen: Vec::with_capacity(24),
        };

        let dig_t1 = reader.word(REG_CALIB_T1)?;
        let dig_t2 = reader.signed_word(REG_CALIB_T2)?;
        let dig_t3 = reader.signed_word(REG_CALIB_T3)?;

        let dig_p1 = reader.word(REG_CALIB_P1)?;
        let mut dig_p = [0i16; 8];
        for (i, p) in dig_p.iter_mut().enumerate() {
            *p = reader.signed_word(REG_CALIB_P2 + 2 * i as u8)?;
        }

        if reader.seen.iter().all(|&b| b == 0x00) || reader.seen.iter().all(|&b| b == 0xFF) {
            return Err(CalibrationError::Absent {
                register: REG_CALIB_T1,
            });
        }
        if dig_t1 == 0 {
            return Err(CalibrationError::Absent {
                register: REG_CALIB_T1,
            });
        }
        if dig_p1 == 0 {
            return Err(CalibrationError::Absent {
                register: REG_CALIB_P1,
            });
        }

        let dig_h1 = reader.byte(REG_CALIB_H1)?;
        let dig_h2 = i16::from_le_bytes(reader.block::<2>(REG_CALIB_H2)?);
        let dig_h3 = reader.byte(REG_CALIB_H3)?;
        let [e4, e5, e6] = reader.block::<3>(REG_CALIB_H4)?;
        let dig_h6 = reader.byte(REG_CALIB_H6)? as i8;

        Ok(CalibrationData {
            dig_t1,
            dig_t2,
            dig_t3,
            dig_p1,
            dig_p2: dig_p[0],
            dig_p3: dig_p[1],
            dig_p4: dig_p[2],
            dig_p5: dig_p[3],
            dig_p6: dig_p[4],
            dig_p7: dig_p[5],
            dig_p8: dig_p[6],
            dig_p9: dig_p[7],
            dig_h1,
            dig_h2,
            dig_h3,
            dig_h4: unpack_h4(e4, e5),
            dig_h5: unpack_h5(e5, e6),
            dig_h6,
        })
    }
}

/// `0xE4` holds bits 11..4, the low nibble of `0xE5` bits 3..0.
pub fn unpack_h4(e4: u8, e5: u8) -> i16 {
    (i16::from(e4 as i8) << 4) | i16::from(e5 & 0x0F)
}

/// `0xE6` holds bits 11..4, the high nibble of `0xE5` bits 3..0.
pub fn unpack_h5(e5: u8, e6: u8) -> i16 {
    (i16::from(e6 as i8) << 4) | i16::from(e5 >> 4)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::bus::fake::{FakeBus, FakeBusError};

    /// Calibration words from the BMP280 datasheet worked example, with the
    /// humidity trim of a typical BME280 unit.
    pub fn datasheet_calibration() -> CalibrationData {
        CalibrationData {
            dig_t1: 27504,
            dig_t2: 26435,
            dig_t3: -1000,
            dig_p1: 36477,
            dig_p2: -10685,
            dig_p3: 3024,
            dig_p4: 2855,
            dig_p5: 140,
            dig_p6: -7,
            dig_p7: 15500,
            dig_p8: -14600,
            dig_p9: 6000,
            dig_h1: 75,
            dig_h2: 362,
            dig_h3: 0,
            dig_h4: 313,
            dig_h5: 50,
            dig_h6: 30,
        }
    }

    /// Lays the datasheet calibration out in a register file the way the chip
    /// stores it.
    pub fn calibrated_bus() -> FakeBus {
        let c = datasheet_calibration();
        let mut bus = FakeBus::default();
        let words: [u16; 12] = [
            c.dig_t1,
            c.dig_t2 as u16,
            c.dig_t3 as u16,
            c.dig_p1,
            c.dig_p2 as u16,
            c.dig_p3 as u16,
            c.dig_p4 as u16,
            c.dig_p5 as u16,
            c.dig_p6 as u16,
            c.dig_p7 as u16,
            c.dig_p8 as u16,
            c.dig_p9 as u16,
        ];
        for (i, w) in words.iter().enumerate() {
            bus.set_block(REG_CALIB_T1 + 2 * i as u8, &w.to_le_bytes());
        }
        bus.set_block(REG_CALIB_H1, &[c.dig_h1]);
        bus.set_block(REG_CALIB_H2, &(c.dig_h2 as u16).to_le_bytes());
        // H4 = 313 = 0x139, H5 = 50 = 0x032
        bus.set_block(REG_CALIB_H3, &[c.dig_h3, 0x13, 0x29, 0x03, c.dig_h6 as u8]);
        bus
    }

    #[test]
    fn load_assembles_all_coefficients() {
        let mut bus = calibrated_bus();

        let calibration = CalibrationData::load(&mut bus).unwrap();

        assert_eq!(calibration, datasheet_calibration());
    }

    #[test]
    fn h4_h5_nibble_packing() {
        assert_eq!(unpack_h4(0x13, 0x29), 0x139);
        assert_eq!(unpack_h5(0x29, 0x03), 0x032);
        assert_eq!(unpack_h4(0xFF, 0x0E), -2);
        assert_eq!(unpack_h5(0xF0, 0xFF), -1);
    }

    #[test]
    fn any_single_failed_register_aborts_the_load() {
        let registers: Vec<u8> = (0x88..=0x9F)
            .chain(std::iter::once(0xA1))
            .chain(0xE1..=0xE7)
            .collect();

        for register in registers {
            let mut bus = calibrated_bus();
            bus.fail_on(register);

            match CalibrationData::load(&mut bus) {
                Err(CalibrationError::Read { source, .. }) => {
                    assert_eq!(source, FakeBusError(register))
                }
                other => panic!("register {:#04x}: expected read error, got {:?}", register, other),
            }
        }
    }

    #[test]
    fn failure_reports_the_coefficient_register() {
        let mut bus = calibrated_bus();
        bus.fail_on(0xE5);

        let err = CalibrationData::load(&mut bus).unwrap_err();

        assert_eq!(err.register(), REG_CALIB_H4);
    }

    #[test]
    fn blank_calibration_is_absent() {
        let mut bus = FakeBus::default();
        assert_eq!(
            CalibrationData::load(&mut bus),
            Err(CalibrationError::Absent { register: 0x88 })
        );

        let mut bus = FakeBus::default();
        bus.set_block(0x88, &[0xFF; 24]);
        assert_eq!(
            CalibrationData::load(&mut bus),
            Err(CalibrationError::Absent { register: 0x88 })
        );
    }

    #[test]
    fn zero_pressure_scale_is_absent() {
        let mut bus = calibrated_bus();
        bus.set_block(REG_CALIB_P1, &[0, 0]);

        assert_eq!(
            CalibrationData::load(&mut bus),
            Err(CalibrationError::Absent { register: 0x8E })
        );
    }
}
