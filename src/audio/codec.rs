// PCM/base64 codec for the live audio wire format
//
// Outbound: capture blocks are f32 mono samples, scaled to 16-bit signed
// integers, packed little-endian, then base64-encoded for the transport.
// Inbound: model speech arrives as base64 PCM16-LE at the playback rate and
// is decoded back into normalized f32 buffers.

use base64::Engine;

use crate::error::SessionError;

/// A decoded, playable chunk of audio.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Normalized samples in [-1, 1], interleaved if multi-channel
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioBuffer {
    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Encode raw bytes into the text-safe transport representation.
pub fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode the transport representation back into raw bytes.
///
/// Fails on non-alphabet characters or wrong padding.
pub fn decode(data: &str) -> Result<Vec<u8>, SessionError> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| SessionError::Decode(format!("invalid base64: {}", e)))
}

/// Convert normalized f32 samples to 16-bit LE PCM bytes.
///
/// Values outside [-1, 1] are clamped rather than wrapped.
pub fn floats_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let scaled = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32);
        bytes.extend_from_slice(&(scaled as i16).to_le_bytes());
    }
    bytes
}

/// Convert 16-bit LE PCM bytes to normalized f32 samples.
pub fn pcm16_to_floats(bytes: &[u8]) -> Result<Vec<f32>, SessionError> {
    if bytes.len() % 2 != 0 {
        return Err(SessionError::Decode(format!(
            "PCM byte length {} is not a multiple of the sample size",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(samples)
}

/// Interpret raw bytes as PCM16-LE at the given rate/channel count and build
/// a playable buffer.
///
/// The byte length must be a multiple of the frame size (2 bytes per
/// channel), otherwise the chunk is rejected as malformed.
pub fn decode_audio(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<AudioBuffer, SessionError> {
    let frame_size = 2 * channels as usize;
    if frame_size == 0 || bytes.len() % frame_size != 0 {
        return Err(SessionError::Decode(format!(
            "PCM byte length {} is not a multiple of the {}-byte frame size",
            bytes.len(),
            frame_size
        )));
    }

    Ok(AudioBuffer {
        samples: pcm16_to_floats(bytes)?,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let original: Vec<u8> = (0..=255).collect();
        let encoded = encode(&original);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_non_alphabet() {
        assert!(decode("abc!@#").is_err());
    }

    #[test]
    fn test_decode_rejects_bad_padding() {
        assert!(decode("QUJD=").is_err());
    }

    #[test]
    fn test_pcm_quantization_bound() {
        let samples = vec![-1.0, -0.5, -0.001, 0.0, 0.001, 0.5, 0.9999];
        let bytes = floats_to_pcm16(&samples);
        let recovered = pcm16_to_floats(&bytes).unwrap();

        assert_eq!(recovered.len(), samples.len());
        for (orig, got) in samples.iter().zip(recovered.iter()) {
            assert!(
                (orig - got).abs() <= 1.0 / 32768.0,
                "sample {} decoded as {}",
                orig,
                got
            );
        }
    }

    #[test]
    fn test_pcm_clamps_out_of_range() {
        let bytes = floats_to_pcm16(&[2.0, -2.0]);
        let recovered = pcm16_to_floats(&bytes).unwrap();
        assert!((recovered[0] - (i16::MAX as f32 / 32768.0)).abs() < 1e-6);
        assert!((recovered[1] - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_odd_byte_length_rejected() {
        assert!(pcm16_to_floats(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_decode_audio_frame_size() {
        // 6 bytes = 3 mono frames, but only 1.5 stereo frames
        let bytes = [0u8; 6];
        assert!(decode_audio(&bytes, 24000, 1).is_ok());
        assert!(decode_audio(&bytes, 24000, 2).is_err());
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer {
            samples: vec![0.0; 24000],
            sample_rate: 24000,
            channels: 1,
        };
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);

        let stereo = AudioBuffer {
            samples: vec![0.0; 24000],
            sample_rate: 24000,
            channels: 2,
        };
        assert!((stereo.duration_secs() - 0.5).abs() < 1e-9);
    }
}
