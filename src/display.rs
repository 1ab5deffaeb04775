// Geiger MQTT: Count Display
//
// Presentation side of the counter.  `CountDisplay` is what the rest of the
// firmware talks to; `Screen` renders it into a `FrameBuffer` with
// embedded-graphics and hands the frame to whatever `Panel` is attached.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_5X8};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Triangle};
use embedded_graphics::text::{Baseline, Text};

use crate::config::SCREEN_WIDTH;
use crate::framebuffer::FrameBuffer;

type Style = MonoTextStyle<'static, BinaryColor>;

const LARGE: Style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
const SMALL: Style = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);

const SMALL_LINE_HEIGHT: i32 = 8;
const SMALL_CHARS_PER_LINE: usize = SCREEN_WIDTH as usize / 5;

/// Presentation sink.  None of these report failure to the caller.
pub trait CountDisplay {
    /// Rolling total with the min/max seen since boot.
    fn render(&mut self, current: u16, min: u16, max: u16);
    /// Short diagnostic text, wrapped to the screen width.
    fn show_message(&mut self, message: &str);
    /// Configuration portal is open.
    fn show_config(&mut self);
    fn clear(&mut self);
}

/// Something that can put a finished frame on glass.
pub trait Panel {
    fn flush(&mut self, frame: &FrameBuffer) -> anyhow::Result<()>;
}

pub struct Screen<P> {
    frame: FrameBuffer,
    panel: P,
}

impl<P: Panel> Screen<P> {
    pub fn new(panel: P) -> Self {
        Self {
            frame: FrameBuffer::new(),
            panel,
        }
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    fn present(&mut self) {
        if let Err(e) = self.panel.flush(&self.frame) {
            log::warn!("Display flush failed: {:?}", e);
        }
    }

    fn text(&mut self, s: &str, x: i32, y: i32, style: Style) {
        let _ = Text::with_baseline(s, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.frame);
    }

    fn arrow(&mut self, x: i32, y: i32, up: bool) {
        let (tip, base) = if up { (y, y + 4) } else { (y + 4, y) };
        let _ = Triangle::new(
            Point::new(x, base),
            Point::new(x + 4, base),
            Point::new(x + 2, tip),
        )
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
        .draw(&mut self.frame);
    }
}

/// Left edge of the big count so it sits roughly centred.
pub fn count_x(current: u16) -> i32 {
    match current {
        0..=9 => 36,
        10..=99 => 30,
        100..=999 => 24,
        _ => 18,
    }
}

impl<P: Panel> CountDisplay for Screen<P> {
    fn render(&mut self, current: u16, min: u16, max: u16) {
        self.frame.erase();

        self.text("Count:", 9, 0, LARGE);
        self.text(&current.to_string(), count_x(current), 16, LARGE);

        self.arrow(0, 41, false);
        self.text(":", 6, 40, SMALL);
        self.text(&min.to_string(), 12, 40, SMALL);

        self.arrow(48, 41, true);
        self.text(":", 54, 40, SMALL);
        self.text(&max.to_string(), 60, 40, SMALL);

        self.present();
    }

    fn show_message(&mut self, message: &str) {
        self.frame.erase();
        let chars: Vec<char> = message.chars().collect();
        for (row, line) in chars.chunks(SMALL_CHARS_PER_LINE).enumerate() {
            let line: String = line.iter().collect();
            self.text(&line, 0, row as i32 * SMALL_LINE_HEIGHT, SMALL);
        }
        self.present();
    }

    fn show_config(&mut self) {
        self.frame.erase();
        self.text("CONF", 21, 17, LARGE);
        self.present();
    }

    fn clear(&mut self) {
        self.frame.erase();
        self.present();
    }
}
