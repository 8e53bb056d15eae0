//! Deterministic WAV output.
//!
//! Files carry no timestamps or variable metadata, so identical audio always
//! produces identical bytes. The hash of the PCM data identifies a render.

mod format;
mod pcm;
mod writer;

#[cfg(test)]
mod tests;

pub use format::{WavFormat, SUPPORTED_BITS};
pub use pcm::{append_pcm, compute_pcm_hash, extract_pcm_data};
pub use writer::{write_header, write_wav, WavFileWriter};
