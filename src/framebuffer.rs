//! 1-bpp framebuffer in PCD8544 memory order.
//!
//! The LCD addresses its RAM as six horizontal banks of 84 columns, each
//! column byte holding 8 vertical pixels (LSB on top).  Drawing goes to this
//! buffer; the panel driver then ships `as_bytes()` in one SPI burst.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::config::{DISPLAY_BUFFER_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH};

const W: usize = SCREEN_WIDTH as usize;
const H: usize = SCREEN_HEIGHT as usize;

pub struct FrameBuffer {
    bytes: [u8; DISPLAY_BUFFER_SIZE],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; DISPLAY_BUFFER_SIZE],
        }
    }

    /// Raw bank-ordered bytes, ready for the panel's data mode.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn erase(&mut self) {
        self.bytes.fill(0);
    }

    /// `true` when the pixel is dark.  Out-of-range reads are light.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= W || y >= H {
            return false;
        }
        self.bytes[(y / 8) * W + x] & (1 << (y % 8)) != 0
    }

    /// Number of dark pixels inside a region; handy for checking layout.
    pub fn lit_in(&self, area: &Rectangle) -> usize {
        area.points()
            .filter(|p| p.x >= 0 && p.y >= 0 && self.pixel(p.x as usize, p.y as usize))
            .count()
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: BinaryColor) {
        let idx = (y / 8) * W + x;
        let mask = 1 << (y % 8);
        match color {
            BinaryColor::On => self.bytes[idx] |= mask,
            BinaryColor::Off => self.bytes[idx] &= !mask,
        }
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x >= 0 && coord.y >= 0 && (coord.x as usize) < W && (coord.y as usize) < H {
                self.set_pixel(coord.x as usize, coord.y as usize, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = match color {
            BinaryColor::On => 0xFF,
            BinaryColor::Off => 0x00,
        };
        self.bytes.fill(fill);
        Ok(())
    }
}
