//! Audio decode and encode
//!
//! Source clips arrive as WAV bytes and are decoded to interleaved 32-bit
//! float at their native sample rate. Recordings are encoded back to 16-bit
//! WAV blobs.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, RitualError};

/// Decode a WAV clip held in memory
///
/// # Errors
/// * `Decode` - The bytes are not a readable WAV stream
/// * `UnsupportedFormat` - More than two channels, or an unknown bit depth
/// * `EmptyAudio` - The clip has no frames
pub fn decode_clip(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| RitualError::Decode {
        reason: format!("Failed to open WAV stream: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > 2 {
        return Err(RitualError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if samples.is_empty() {
        return Err(RitualError::EmptyAudio);
    }

    let mut buffer = AudioBuffer::from_interleaved(samples, channels, spec.sample_rate)?;
    if buffer.num_frames() == 0 {
        return Err(RitualError::EmptyAudio);
    }
    for sample in buffer.samples_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
        }
    }

    Ok(buffer)
}

/// Decode a WAV clip from disk
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    let bytes = std::fs::read(path).map_err(|e| RitualError::Decode {
        reason: format!("Failed to read {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;
    decode_clip(&bytes)
}

/// Encode interleaved samples as a 16-bit PCM WAV blob
pub fn encode_wav(samples: &[f32], num_channels: usize, sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: num_channels.max(1) as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(hound_to_io)?;
        for &sample in samples {
            let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(scaled).map_err(hound_to_io)?;
        }
        writer.finalize().map_err(hound_to_io)?;
    }

    Ok(cursor.into_inner())
}

fn hound_to_io(e: hound::Error) -> RitualError {
    RitualError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let decode_err = |e: hound::Error| RitualError::Decode {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_err),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            // 24-bit stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            _ => Err(RitualError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_decode_mono() {
        let tone = AudioBuffer::sine(440.0, 0.25, 48000);
        let bytes = encode_wav(tone.samples(), 1, 48000).unwrap();
        let decoded = decode_clip(&bytes).unwrap();

        assert_eq!(decoded.num_channels(), 1);
        assert_eq!(decoded.sample_rate(), 48000);
        assert_eq!(decoded.num_frames(), tone.num_frames());
        for (a, b) in tone.samples().iter().zip(decoded.samples()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_clip(b"definitely not a wav file").unwrap_err();
        assert_eq!(err.error_code(), "DECODE_FAILED");
    }

    #[test]
    fn test_decode_empty_wav() {
        let bytes = encode_wav(&[], 2, 44100).unwrap();
        assert!(matches!(decode_clip(&bytes), Err(RitualError::EmptyAudio)));
    }

    #[test]
    fn test_decode_float_stereo_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..200 {
            writer.write_sample(i as f32 / 400.0).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.num_channels(), 2);
        assert_eq!(decoded.num_frames(), 100);
        assert_eq!(decoded.get(1, 1), Some(3.0 / 400.0));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_file(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(err.is_recoverable());
    }
}
