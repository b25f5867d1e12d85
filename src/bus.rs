use embedded_hal::blocking::i2c::{Write, WriteRead};

/// Byte-level register access to a single device.
pub trait RegisterBus {
    type Error;

    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error>;

    /// Reads `buffer.len()` contiguous registers in one transaction.
    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;
}

/// Register access over an `embedded-hal` I2C bus at a fixed address.
pub struct I2cBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> I2cBus<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        I2cBus { i2c, address }
    }

    #[cfg(test)]
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> RegisterBus for I2cBus<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    type Error = E;

    fn read_register(&mut self, register: u8) -> Result<u8, E> {
        let mut buffer = [0u8; 1];
        self.i2c.write_read(self.address, &[register], &mut buffer)?;
        Ok(buffer[0])
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), E> {
        self.i2c.write_read(self.address, &[register], buffer)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[register, value])
    }
}

#[cfg(test)]
pub mod fake {
    use std::collections::{HashMap, HashSet};

    use super::RegisterBus;

    #[derive(Debug, Clone, PartialEq)]
    pub struct FakeBusError(pub u8);

    /// In-memory register file with per-register failure injection.
    #[derive(Default)]
    pub struct FakeBus {
        pub registers: HashMap<u8, u8>,
        pub failing: HashSet<u8>,
        pub writes: Vec<(u8, u8)>,
    }

    impl FakeBus {
        pub fn set_block(&mut self, start: u8, bytes: &[u8]) {
            for (offset, byte) in bytes.iter().enumerate() {
                self.registers.insert(start + offset as u8, *byte);
            }
        }

        pub fn fail_on(&mut self, register: u8) {
            self.failing.insert(register);
        }
    }

    impl RegisterBus for FakeBus {
        type Error = FakeBusError;

        fn read_register(&mut self, register: u8) -> Result<u8, FakeBusError> {
            if self.failing.contains(&register) {
                return Err(FakeBusError(register));
            }
            Ok(*self.registers.get(&register).unwrap_or(&0))
        }

        fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), FakeBusError> {
            for (offset, byte) in buffer.iter_mut().enumerate() {
                let address = register + offset as u8;
                if self.failing.contains(&address) {
                    return Err(FakeBusError(address));
                }
                *byte = *self.registers.get(&address).unwrap_or(&0);
            }
            Ok(())
        }

        fn write_register(&mut self, register: u8, value: u8) -> Result<(), FakeBusError> {
            if self.failing.contains(&register) {
                return Err(FakeBusError(register));
            }
            self.writes.push((register, value));
            self.registers.insert(register, value);
            Ok(())
        }
    }
}
