// Unit tests for the PCM/base64 codec
//
// These cover the transport round-trip and the malformed-input cases the
// playback path must reject.

use kairos_live::audio::codec::{
    decode, decode_audio, encode, floats_to_pcm16, pcm16_to_floats,
};

#[test]
fn test_roundtrip_empty_buffer() {
    let encoded = encode(&[]);
    assert_eq!(decode(&encoded).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_roundtrip_all_byte_values() {
    let original: Vec<u8> = (0..=255).collect();
    assert_eq!(decode(&encode(&original)).unwrap(), original);
}

#[test]
fn test_roundtrip_odd_lengths() {
    // Padding differs at each length mod 3
    for len in [1, 2, 3, 4, 5, 100, 1001] {
        let original: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        assert_eq!(decode(&encode(&original)).unwrap(), original, "len={}", len);
    }
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(decode("not base64!!").is_err());
    assert!(decode("AAA=====").is_err());
}

#[test]
fn test_pcm_roundtrip_sine_wave() {
    let samples: Vec<f32> = (0..1600)
        .map(|i| (i as f32 * 2.0 * std::f32::consts::PI / 160.0).sin() * 0.8)
        .collect();

    let bytes = floats_to_pcm16(&samples);
    assert_eq!(bytes.len(), samples.len() * 2);

    let recovered = pcm16_to_floats(&bytes).unwrap();
    for (orig, got) in samples.iter().zip(recovered.iter()) {
        assert!((orig - got).abs() <= 1.0 / 32768.0);
    }
}

#[test]
fn test_pcm_full_transport_roundtrip() {
    // Capture path: floats -> PCM16 -> base64; playback path: base64 ->
    // bytes -> playable buffer. Samples must survive within one
    // quantization step.
    let samples = vec![-0.9, -0.25, 0.0, 0.25, 0.9];
    let wire = encode(&floats_to_pcm16(&samples));

    let bytes = decode(&wire).unwrap();
    let buffer = decode_audio(&bytes, 16000, 1).unwrap();

    assert_eq!(buffer.samples.len(), samples.len());
    for (orig, got) in samples.iter().zip(buffer.samples.iter()) {
        assert!((orig - got).abs() <= 1.0 / 32768.0);
    }
}

#[test]
fn test_decode_audio_rejects_partial_frames() {
    assert!(decode_audio(&[0u8; 5], 24000, 1).is_err());
    assert!(decode_audio(&[0u8; 6], 24000, 2).is_err());
}

#[test]
fn test_decode_audio_duration() {
    // 48000 bytes = 24000 mono samples = 1 second at 24kHz
    let bytes = vec![0u8; 48000];
    let buffer = decode_audio(&bytes, 24000, 1).unwrap();
    assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
}
