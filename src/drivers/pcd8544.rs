// Geiger MQTT: PCD8544 LCD Driver
//
// Custom register-level driver for the 84×48 Nokia 5110 panel over SPI.
// Drawing happens in a `FrameBuffer`; `flush` ships the whole 504-byte frame.

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Output, PinDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::spi::config::Config as SpiConfig;
use esp_idf_hal::spi::{SpiAnyPins, SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_hal::units::Hertz;

use geiger_mqtt::config::*;
use geiger_mqtt::display::Panel;
use geiger_mqtt::framebuffer::FrameBuffer;

// PCD8544 instruction set
const FUNCTION_SET: u8 = 0x20;
const EXTENDED_INSTRUCTION: u8 = 0x01;
const DISPLAY_NORMAL: u8 = 0x0C;
const SET_Y_ADDR: u8 = 0x40;
const SET_X_ADDR: u8 = 0x80;
// Extended instruction set (H = 1)
const SET_TEMP_COEFF: u8 = 0x04;
const SET_BIAS: u8 = 0x10;
const SET_VOP: u8 = 0x80;

const BIAS_1_48: u8 = 0x04;
const RESET_PULSE_MS: u32 = 10;

pub struct Pcd8544<'d> {
    spi: SpiDeviceDriver<'d, SpiDriver<'d>>,
    dc: PinDriver<'d, AnyOutputPin, Output>,
    rst: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> Pcd8544<'d> {
    pub fn new<SPI: SpiAnyPins>(
        spi: impl Peripheral<P = SPI> + 'd,
        sclk: AnyOutputPin,
        mosi: AnyOutputPin,
        cs: AnyOutputPin,
        dc: AnyOutputPin,
        rst: AnyOutputPin,
    ) -> anyhow::Result<Self> {
        let spi = SpiDeviceDriver::new_single(
            spi,
            sclk,
            mosi,
            Option::<AnyIOPin>::None,
            Some(cs),
            &SpiDriverConfig::new(),
            &SpiConfig::new().baudrate(Hertz(LCD_SPI_BAUDRATE_HZ)),
        )?;

        Ok(Self {
            spi,
            dc: PinDriver::output(dc)?,
            rst: PinDriver::output(rst)?,
        })
    }

    /// Hardware reset, bias/contrast setup, normal display mode.
    pub fn init(&mut self) -> anyhow::Result<()> {
        self.rst.set_low()?;
        FreeRtos::delay_ms(RESET_PULSE_MS);
        self.rst.set_high()?;

        self.set_contrast(LCD_CONTRAST)?;
        self.command(&[
            FUNCTION_SET | EXTENDED_INSTRUCTION,
            SET_TEMP_COEFF,
            SET_BIAS | BIAS_1_48,
            FUNCTION_SET,
            DISPLAY_NORMAL,
        ])?;

        log::info!("PCD8544 initialised (contrast {})", LCD_CONTRAST);
        Ok(())
    }

    pub fn set_contrast(&mut self, contrast: u8) -> anyhow::Result<()> {
        self.command(&[
            FUNCTION_SET | EXTENDED_INSTRUCTION,
            SET_VOP | contrast.min(0x7F),
            FUNCTION_SET,
        ])
    }

    fn command(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.dc.set_low()?;
        self.spi.write(bytes)?;
        Ok(())
    }
}

impl Panel for Pcd8544<'_> {
    fn flush(&mut self, frame: &FrameBuffer) -> anyhow::Result<()> {
        self.command(&[SET_Y_ADDR, SET_X_ADDR])?;
        self.dc.set_high()?;
        self.spi.write(frame.as_bytes())?;
        Ok(())
    }
}
