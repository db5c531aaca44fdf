use crate::{
    error::{FormatError, WaveformError},
    signal::{WaveformData, SUPPORTED_SAMPLE_RATES},
};
use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec};
use log::debug;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Returns the wrapped stream to where parsing started when dropped, on every exit path.
struct RewindGuard<'a, R: Seek> {
    inner: &'a mut R,
    start: u64,
}

impl<'a, R: Seek> RewindGuard<'a, R> {
    fn new(inner: &'a mut R) -> std::io::Result<Self> {
        let start = inner.stream_position()?;
        Ok(Self { inner, start })
    }

    fn stream(&mut self) -> &mut R {
        &mut *self.inner
    }
}

impl<R: Seek> Drop for RewindGuard<'_, R> {
    fn drop(&mut self) {
        let _ = self.inner.seek(SeekFrom::Start(self.start));
    }
}

/// Parse a PCM WAV stream into a [`WaveformData`].
///
/// Channel count is checked before the sample rate. The stream is rewound to
/// its starting position afterwards, whether parsing succeeded or not.
pub fn parse_wav<R: Read + Seek>(source: &mut R) -> Result<WaveformData, WaveformError> {
    let mut guard = RewindGuard::new(source)?;
    let waveform = decode(guard.stream())?;
    Ok(waveform)
}

/// Parse an in-memory WAV buffer.
pub fn parse_wav_bytes(bytes: &[u8]) -> Result<WaveformData, WaveformError> {
    parse_wav(&mut Cursor::new(bytes))
}

/// Open and parse a WAV file from disk.
pub fn load_wav(path: &Path) -> Result<WaveformData> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let waveform =
        parse_wav(&mut reader).with_context(|| format!("failed to load {}", path.display()))?;
    Ok(waveform)
}

fn decode<R: Read>(stream: R) -> Result<WaveformData, WaveformError> {
    let reader = WavReader::new(stream)?;
    let spec = reader.spec();
    validate_spec(&spec)?;
    let samples = read_samples(reader, spec.sample_format)?;
    debug!(
        "decoded {} samples at {}Hz ({}-bit {:?})",
        samples.len(),
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );
    Ok(WaveformData::new(spec.sample_rate, samples)?)
}

fn validate_spec(spec: &WavSpec) -> Result<(), FormatError> {
    if spec.channels != 1 {
        return Err(FormatError::Channels {
            channels: spec.channels,
        });
    }
    if !SUPPORTED_SAMPLE_RATES.contains(&spec.sample_rate) {
        return Err(FormatError::SampleRate {
            rate: spec.sample_rate,
        });
    }
    Ok(())
}

/// Upper bound on the up-front reservation; the header's sample count is untrusted.
const MAX_PREALLOC_SAMPLES: usize = 1 << 20;

// Amplitudes are kept in the source's own units; integer PCM is not normalized.
fn read_samples<R: Read>(
    mut reader: WavReader<R>,
    format: SampleFormat,
) -> Result<Vec<f64>, WaveformError> {
    let mut out = Vec::with_capacity((reader.len() as usize).min(MAX_PREALLOC_SAMPLES));
    match format {
        SampleFormat::Int => {
            for sample in reader.samples::<i32>() {
                out.push(sample? as f64);
            }
        }
        SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                out.push(sample? as f64);
            }
        }
    }
    Ok(out)
}
