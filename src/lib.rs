//! Core of the MQTT Geiger counter firmware.
//!
//! Everything here is hardware-independent: the ISR-shared pulse window, the
//! one-minute rolling aggregator, the periodic task table, the long-press
//! detector, the display renderer and the telemetry publisher.  The ESP-IDF
//! binary (`src/main.rs`) supplies the interrupts, the LCD panel, Wi-Fi, NVS
//! and the MQTT session behind the traits defined here.

pub mod aggregator;
pub mod app;
pub mod config;
pub mod display;
pub mod events;
pub mod framebuffer;
pub mod long_press;
pub mod provision;
pub mod scheduler;
pub mod settings;
pub mod telemetry;
pub mod window;
