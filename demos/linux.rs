//! Example: Periodic environmental readings from a BME280 on a Linux I2C bus.
//!
//! This example demonstrates:
//! 1. **Initialization**: Opening `/dev/i2c-1` and bringing the sensor up in forced mode.
//! 2. **Data Processing**: Formatting the fixed-point results for display.
//! 3. **Disabled channels**: Branching on `Compensated::Disabled` instead of
//!    printing the sensor's sentinel values.

use bme280_driver::{interface::DeviceAddress, Bme280, Bme280Builder, Compensated, IIRFilter};
use bme280_driver::{Mode, Oversampling};
use embedded_hal::delay::DelayNs;
use linux_embedded_hal::{Delay, I2cdev};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let i2c = I2cdev::new("/dev/i2c-1")?;
    let mut delay = Delay;

    // Weather-monitoring setup from the datasheet: forced mode, x1 everywhere, no filter.
    let config = Bme280Builder::new()
        .mode(Mode::Forced)
        .temp_oversampling(Oversampling::X1)
        .pres_oversampling(Oversampling::X1)
        .hum_oversampling(Oversampling::X1)
        .iir_filter(IIRFilter::Off)
        .build();

    let mut bme280 = Bme280::open(i2c, DeviceAddress::Primary, config, &mut delay)?;

    loop {
        let data = bme280.read_all(&mut delay)?;

        match data.temp {
            Compensated::Value(temp) => println!("Temperature: {} °C", temp),
            Compensated::Disabled => println!("Temperature: disabled"),
        }
        if let Compensated::Value(hum) = data.hum {
            let (whole, frac) = hum.split();
            println!("Humidity:    {}.{:02} %", whole, frac);
        }
        if let Compensated::Value(pres) = data.pres {
            let (whole, frac) = pres.as_hpa();
            println!("Pressure:    {}.{:02} hPa", whole, frac);
        }
        if let Compensated::Value(altitude) = data.altitude {
            println!("Altitude:    {:.1} m", altitude.0);
        }
        println!();

        delay.delay_ms(5000);
    }
}
