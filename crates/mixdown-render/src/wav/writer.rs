//! Streaming WAV writer with atomic persist.
//!
//! The frame count is known before rendering starts, so the header is final
//! from the first byte and blocks of audio can be appended as they complete.
//! Audio goes to a temporary file next to the destination, which replaces the
//! destination only after the last frame is written.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::format::WavFormat;
use super::pcm::append_pcm;
use crate::buffer::StereoBuffer;
use crate::error::{RenderError, RenderResult};

/// Writes a canonical 44-byte PCM header.
pub fn write_header<W: Write>(writer: &mut W, format: &WavFormat, frames: usize) -> io::Result<()> {
    let data_size = u32::try_from(format.data_size(frames))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "audio exceeds 4 GiB WAV limit"))?;
    let file_size = data_size
        .checked_add(36)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "audio exceeds 4 GiB WAV limit"))?;

    // RIFF header
    writer.write_all(b"RIFF")?;
    writer.write_all(&file_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // fmt chunk
    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?;
    writer.write_all(&1u16.to_le_bytes())?; // PCM
    writer.write_all(&format.channels.to_le_bytes())?;
    writer.write_all(&format.sample_rate.to_le_bytes())?;
    writer.write_all(&format.byte_rate().to_le_bytes())?;
    writer.write_all(&format.block_align().to_le_bytes())?;
    writer.write_all(&format.bits_per_sample.to_le_bytes())?;

    // data chunk
    writer.write_all(b"data")?;
    writer.write_all(&data_size.to_le_bytes())?;
    Ok(())
}

/// Writes a WAV file of a fixed frame count, block by block.
pub struct WavFileWriter {
    path: PathBuf,
    temp: NamedTempFile,
    writer: BufWriter<File>,
    format: WavFormat,
    hasher: blake3::Hasher,
    expected_frames: usize,
    written_frames: usize,
    scratch: Vec<u8>,
}

impl WavFileWriter {
    /// Creates a temporary file next to `path` and writes the header.
    pub fn create(path: &Path, format: WavFormat, frames: usize) -> RenderResult<Self> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let temp = tempfile::Builder::new()
            .prefix(".mixdown-")
            .suffix(".wav")
            .tempfile_in(&parent)?;
        let mut writer = BufWriter::new(temp.reopen()?);
        write_header(&mut writer, &format, frames)?;

        debug!(path = %path.display(), temp = %temp.path().display(), frames, "opened output");
        Ok(Self {
            path: path.to_path_buf(),
            temp,
            writer,
            format,
            hasher: blake3::Hasher::new(),
            expected_frames: frames,
            written_frames: 0,
            scratch: Vec::new(),
        })
    }

    /// Appends a block of frames.
    pub fn write(&mut self, block: &StereoBuffer) -> RenderResult<()> {
        if self.written_frames + block.len() > self.expected_frames {
            return Err(RenderError::InvalidConfig(format!(
                "writing {} frames past the declared length of {}",
                self.written_frames + block.len() - self.expected_frames,
                self.expected_frames
            )));
        }
        self.scratch.clear();
        append_pcm(&self.format, &block.left, &block.right, &mut self.scratch);
        self.hasher.update(&self.scratch);
        self.writer.write_all(&self.scratch)?;
        self.written_frames += block.len();
        Ok(())
    }

    /// Flushes, moves the file into place and returns the PCM hash.
    ///
    /// Dropping the writer without calling this removes the temporary file
    /// and leaves the destination untouched.
    pub fn finish(mut self) -> RenderResult<String> {
        if self.written_frames != self.expected_frames {
            return Err(RenderError::InvalidConfig(format!(
                "output has {} of {} declared frames",
                self.written_frames, self.expected_frames
            )));
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        drop(self.writer);

        self.temp.persist(&self.path)?;
        Ok(self.hasher.finalize().to_hex().to_string())
    }
}

/// Writes a whole buffer to `path`, returning the PCM hash.
pub fn write_wav(path: &Path, format: WavFormat, buffer: &StereoBuffer) -> RenderResult<String> {
    let mut writer = WavFileWriter::create(path, format, buffer.len())?;
    writer.write(buffer)?;
    writer.finish()
}
