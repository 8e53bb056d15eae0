//! Incremental decoding and sample rate conversion.
//!
//! A [`SourceStream`] decodes one packet at a time and converts it to the
//! render rate, holding at most one packet and one resampler chunk. Whole-file
//! decoding drains the same stream, so a source read in pieces is
//! sample-identical to the same source decoded at once.

use std::fmt;
use std::path::Path;

use rubato::{FftFixedInOut, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::buffer::StereoBuffer;
use crate::error::{RenderError, RenderResult};

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;

/// Sample rate converter fed in arbitrary block sizes.
///
/// The converter's filter delay is dropped from the front of the output and
/// the tail is flushed with silence, so an input of `n` frames yields exactly
/// `ceil(n * to / from)` frames aligned with the input.
struct StreamResampler {
    resampler: FftFixedInOut<f64>,
    from_rate: u64,
    to_rate: u64,
    /// Input frames waiting for a full chunk.
    input: [Vec<f64>; 2],
    input_frames: u64,
    /// Leading output frames still to discard.
    delay: usize,
    emitted: u64,
}

impl StreamResampler {
    fn new(from_rate: u32, to_rate: u32) -> RenderResult<Self> {
        let resampler =
            FftFixedInOut::<f64>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 2)
                .map_err(|e| RenderError::Resample(e.to_string()))?;
        let delay = resampler.output_delay();
        Ok(Self {
            resampler,
            from_rate: from_rate as u64,
            to_rate: to_rate as u64,
            input: [Vec::new(), Vec::new()],
            input_frames: 0,
            delay,
            emitted: 0,
        })
    }

    /// Output length for `frames` input frames.
    fn output_frames(&self, frames: u64) -> u64 {
        (frames * self.to_rate).div_ceil(self.from_rate)
    }

    /// Converts every full chunk of buffered input, appending to `out`.
    fn push(&mut self, block: &StereoBuffer, out: &mut StereoBuffer) -> RenderResult<()> {
        self.input_frames += block.len() as u64;
        self.input[0].extend_from_slice(&block.left);
        self.input[1].extend_from_slice(&block.right);

        let chunk = self.resampler.input_frames_next();
        let mut pos = 0;
        while self.input[0].len() - pos >= chunk {
            let resampled = {
                let input = [
                    &self.input[0][pos..pos + chunk],
                    &self.input[1][pos..pos + chunk],
                ];
                self.resampler
                    .process(&input, None)
                    .map_err(|e| RenderError::Resample(e.to_string()))?
            };
            self.emit(&resampled, u64::MAX, out);
            pos += chunk;
        }
        self.input[0].drain(..pos);
        self.input[1].drain(..pos);
        Ok(())
    }

    /// Flushes the remaining input and the filter tail.
    fn finish(&mut self, out: &mut StereoBuffer) -> RenderResult<()> {
        let expected = self.output_frames(self.input_frames);
        while self.emitted < expected {
            let chunk = self.resampler.input_frames_next();
            let mut left = std::mem::take(&mut self.input[0]);
            let mut right = std::mem::take(&mut self.input[1]);
            left.resize(chunk, 0.0);
            right.resize(chunk, 0.0);
            let resampled = self
                .resampler
                .process(&[&left[..], &right[..]], None)
                .map_err(|e| RenderError::Resample(e.to_string()))?;
            self.emit(&resampled, expected, out);
        }
        Ok(())
    }

    fn emit(&mut self, resampled: &[Vec<f64>], limit: u64, out: &mut StereoBuffer) {
        let produced = resampled[0].len();
        let skip = self.delay.min(produced);
        self.delay -= skip;
        let available = (produced - skip) as u64;
        let take = available.min(limit.saturating_sub(self.emitted)) as usize;
        out.left.extend_from_slice(&resampled[0][skip..skip + take]);
        out.right.extend_from_slice(&resampled[1][skip..skip + take]);
        self.emitted += take as u64;
    }
}

/// Forward reader over one audio file at the render sample rate.
///
/// Mono sources are duplicated to both channels. Undecodable packets are
/// skipped.
pub struct SourceStream {
    name: String,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    resampler: Option<StreamResampler>,
    pending: StereoBuffer,
    pending_pos: usize,
    finished: bool,
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream")
            .field("name", &self.name)
            .field("resampled", &self.resampler.is_some())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl SourceStream {
    /// Opens a file for reading at `target_rate`.
    pub fn open(path: &Path, target_rate: u32) -> RenderResult<Self> {
        let name = path.display().to_string();
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| RenderError::decode(&name, e))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| RenderError::decode(&name, "no audio track found"))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_rate = codec_params
            .sample_rate
            .ok_or_else(|| RenderError::decode(&name, "unknown sample rate"))?;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| RenderError::decode(&name, e))?;

        let resampler = if source_rate == target_rate {
            None
        } else {
            Some(StreamResampler::new(source_rate, target_rate)?)
        };

        Ok(Self {
            name,
            format,
            decoder,
            track_id,
            resampler,
            pending: StereoBuffer::default(),
            pending_pos: 0,
            finished: false,
        })
    }

    /// Appends up to `frames` frames to `out`. Returns the number appended,
    /// which is short only at the end of the file.
    pub fn read(&mut self, frames: usize, out: &mut StereoBuffer) -> RenderResult<usize> {
        let mut read = 0;
        while read < frames {
            if self.pending_pos == self.pending.len() && !self.refill()? {
                break;
            }
            let n = (frames - read).min(self.pending.len() - self.pending_pos);
            let range = self.pending_pos..self.pending_pos + n;
            out.left.extend_from_slice(&self.pending.left[range.clone()]);
            out.right.extend_from_slice(&self.pending.right[range]);
            self.pending_pos += n;
            read += n;
        }
        Ok(read)
    }

    /// Discards up to `frames` frames. Returns the number discarded.
    pub fn skip(&mut self, frames: usize) -> RenderResult<usize> {
        let mut skipped = 0;
        while skipped < frames {
            if self.pending_pos == self.pending.len() && !self.refill()? {
                break;
            }
            let n = (frames - skipped).min(self.pending.len() - self.pending_pos);
            self.pending_pos += n;
            skipped += n;
        }
        Ok(skipped)
    }

    /// Decodes the rest of the file.
    pub fn read_to_end(mut self) -> RenderResult<StereoBuffer> {
        let mut out = StereoBuffer::default();
        self.read(usize::MAX, &mut out)?;
        Ok(out)
    }

    /// Counts the frames of a file at `target_rate` without keeping them.
    pub fn count_frames(path: &Path, target_rate: u32) -> RenderResult<usize> {
        let mut stream = Self::open(path, target_rate)?;
        let mut frames = 0_u64;
        while let Some(block) = stream.next_block()? {
            frames += block.len() as u64;
        }
        let frames = match &stream.resampler {
            Some(resampler) => resampler.output_frames(frames),
            None => frames,
        };
        Ok(frames as usize)
    }

    /// Replaces the exhausted pending block. Returns false at the end of the file.
    fn refill(&mut self) -> RenderResult<bool> {
        self.pending.left.clear();
        self.pending.right.clear();
        self.pending_pos = 0;
        while self.pending.is_empty() {
            if self.finished {
                return Ok(false);
            }
            match self.next_block()? {
                Some(block) => match &mut self.resampler {
                    Some(resampler) => resampler.push(&block, &mut self.pending)?,
                    None => self.pending = block,
                },
                None => {
                    self.finished = true;
                    if let Some(resampler) = &mut self.resampler {
                        resampler.finish(&mut self.pending)?;
                    }
                }
            }
        }
        Ok(true)
    }

    /// Decodes the next packet of the audio track at the source rate.
    fn next_block(&mut self) -> RenderResult<Option<StereoBuffer>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(RenderError::decode(&self.name, e)),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(file = %self.name, error = e, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(RenderError::decode(&self.name, e)),
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            let interleaved: Vec<f64> = sample_buf.samples().iter().map(|s| *s as f64).collect();
            return Ok(Some(StereoBuffer::from_interleaved(
                &interleaved,
                spec.channels.count(),
            )));
        }
    }
}

/// Converts a buffer between sample rates.
///
/// The output has `ceil(len * to / from)` frames with no added delay.
pub fn resample(buffer: &StereoBuffer, from_rate: u32, to_rate: u32) -> RenderResult<StereoBuffer> {
    let mut resampler = StreamResampler::new(from_rate, to_rate)?;
    let mut output = StereoBuffer::default();
    resampler.push(buffer, &mut output)?;
    resampler.finish(&mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(frames: usize, at: usize) -> StereoBuffer {
        let mut buffer = StereoBuffer::new(frames);
        buffer.left[at] = 1.0;
        buffer.right[at] = 1.0;
        buffer
    }

    fn argmax(samples: &[f64]) -> usize {
        samples
            .iter()
            .enumerate()
            .fold((0, 0.0_f64), |best, (i, s)| {
                if s.abs() > best.1 {
                    (i, s.abs())
                } else {
                    best
                }
            })
            .0
    }

    #[test]
    fn test_resample_keeps_impulse_position() {
        let output = resample(&impulse(22050, 1000), 22050, 44100).unwrap();
        assert_eq!(output.len(), 44100);
        let peak = argmax(&output.left);
        assert!((peak as i64 - 2000).abs() <= 2, "peak at {}", peak);
    }

    #[test]
    fn test_resample_flushes_tail() {
        let output = resample(&impulse(4000, 3990), 8000, 16000).unwrap();
        assert_eq!(output.len(), 8000);
        let peak = argmax(&output.right);
        assert!((peak as i64 - 7980).abs() <= 2, "peak at {}", peak);
        assert!(output.right[peak] > 0.5);
    }

    #[test]
    fn test_resample_downsamples_with_rounded_up_length() {
        let output = resample(&StereoBuffer::new(1001), 16000, 8000).unwrap();
        assert_eq!(output.len(), 501);
    }

    #[test]
    fn test_block_size_does_not_change_output() {
        let source: Vec<f64> = (0..5000).map(|i| ((i * 53 % 97) as f64 - 48.0) / 50.0).collect();
        let buffer = StereoBuffer::from_mono(source);
        let whole = resample(&buffer, 11025, 8000).unwrap();

        let mut resampler = StreamResampler::new(11025, 8000).unwrap();
        let mut pieced = StereoBuffer::default();
        for start in (0..5000).step_by(333) {
            let end = (start + 333).min(5000);
            let block = StereoBuffer {
                left: buffer.left[start..end].to_vec(),
                right: buffer.right[start..end].to_vec(),
            };
            resampler.push(&block, &mut pieced).unwrap();
        }
        resampler.finish(&mut pieced).unwrap();

        assert_eq!(whole, pieced);
    }
}
