//! Sample sinks: turning deliveries into payloads.
//!
//! - [`ImageSampleSink`] sanitizes frames and relays them to the output
//!   channel as they arrive.
//! - [`AudioSampleSink`] records into a WAV artifact and extracts the
//!   payload from it after stop.

mod audio;
mod image;
mod sanitize;

pub use audio::{strip_header, AudioSampleSink, HEADER_SKIP_BYTES};
pub use image::ImageSampleSink;
pub use sanitize::{decode_latin1, sanitize, sanitize_into, STRIPPED_BYTES};

#[cfg(test)]
pub(crate) use test_output::SharedOutput;
