//! Register-level access to the sensor over I2C or SPI.
//!
//! The driver only ever needs two primitives: a burst read starting at a
//! register address and a single-register write. [`RegisterBus`] captures
//! exactly that, so any bus (or an in-memory fake) can sit under the driver.

use embedded_hal::i2c;
use embedded_hal::spi::{self, Operation};

/// Narrow register read/write capability consumed by the driver.
pub trait RegisterBus {
    /// Error reported by the underlying bus.
    type Error;

    /// Reads `buffer.len()` bytes starting at `reg`. The device auto-increments the address.
    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes a single register.
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;
}

/// The two I2C addresses selectable with the SDO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceAddress {
    /// SDO tied to GND.
    #[default]
    Primary,
    /// SDO tied to VDDIO.
    Secondary,
    /// Any other 7-bit address, e.g. behind an address translator.
    Custom(u8),
}

impl From<DeviceAddress> for u8 {
    fn from(address: DeviceAddress) -> Self {
        match address {
            DeviceAddress::Primary => 0x76,
            DeviceAddress::Secondary => 0x77,
            DeviceAddress::Custom(addr) => addr,
        }
    }
}

/// I2C transport.
#[derive(Debug)]
pub struct I2cInterface<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cInterface<I2C> {
    pub fn new(i2c: I2C, address: DeviceAddress) -> Self {
        Self {
            i2c,
            address: address.into(),
        }
    }

    /// 7-bit address the interface talks to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives back the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> RegisterBus for I2cInterface<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    type Error = E;

    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), E> {
        self.i2c.write_read(self.address, &[reg], buffer)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[reg, value])
    }
}

/// 4-wire SPI transport. Bit 7 of the register address selects read (1) or write (0).
#[derive(Debug)]
pub struct SpiInterface<SPI> {
    spi: SPI,
}

impl<SPI> SpiInterface<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Gives back the SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI, E> RegisterBus for SpiInterface<SPI>
where
    SPI: spi::SpiDevice<Error = E>,
{
    type Error = E;

    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), E> {
        self.spi
            .transaction(&mut [Operation::Write(&[reg | 0x80]), Operation::Read(buffer)])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), E> {
        self.spi.write(&[reg & 0x7F, value])
    }
}
