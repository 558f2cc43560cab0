//! Silence and tone synthesis
//!
//! The gate beep (800 Hz, 150 ms) is synthesized once at first use and
//! cached as ready-to-enqueue 48 kHz frames; the partial trailing frame is
//! padded with silence so every cached frame keeps the 20 ms invariant.

use once_cell::sync::Lazy;

use crate::types::{AudioFrame, SampleRate, FRAME_MS};

/// Beep frequency in Hz
pub const BEEP_FREQ_HZ: f32 = 800.0;
/// Beep duration in milliseconds
pub const BEEP_MS: u32 = 150;
/// Beep amplitude relative to full scale
const BEEP_AMPLITUDE: f32 = 0.4;

static BEEP: Lazy<Vec<AudioFrame>> = Lazy::new(|| {
    let rate = SampleRate::Hz48000;
    let mut samples = tone(BEEP_FREQ_HZ, BEEP_MS, rate);
    let frame_len = rate.samples_per_frame();
    let rem = samples.len() % frame_len;
    if rem != 0 {
        samples.resize(samples.len() + frame_len - rem, 0);
    }
    samples
        .chunks_exact(frame_len)
        .enumerate()
        .map(|(i, chunk)| AudioFrame {
            samples: chunk.to_vec(),
            rate,
            timestamp_ms: i as u64 * FRAME_MS as u64,
        })
        .collect()
});

/// The cached 800 Hz / 150 ms confirmation beep as 48 kHz frames
pub fn beep_frames() -> &'static [AudioFrame] {
    &BEEP
}

/// One 20 ms frame of silence at the given rate
pub fn silence_frame(rate: SampleRate, timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![0; rate.samples_per_frame()],
        rate,
        timestamp_ms,
    }
}

/// Synthesize a sine tone, clipped to i16 range
pub fn tone(freq_hz: f32, duration_ms: u32, rate: SampleRate) -> Vec<i16> {
    let n = (rate.hz() as u64 * duration_ms as u64 / 1000) as usize;
    let amplitude = BEEP_AMPLITUDE * i16::MAX as f32;
    (0..n)
        .map(|i| {
            let t = i as f32 / rate.hz() as f32;
            (amplitude * (2.0 * std::f32::consts::PI * freq_hz * t).sin()) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beep_is_whole_frames_at_48k() {
        let frames = beep_frames();
        // 150 ms rounds up to 8 x 20 ms frames.
        assert_eq!(frames.len(), 8);
        for frame in frames {
            assert_eq!(frame.rate, SampleRate::Hz48000);
            assert_eq!(frame.samples.len(), 960);
        }
        // The pad in the final frame is silence.
        let last = &frames[7];
        assert!(last.samples[480..].iter().all(|&s| s == 0));
    }

    #[test]
    fn beep_is_cached() {
        assert_eq!(beep_frames().as_ptr(), beep_frames().as_ptr());
    }

    #[test]
    fn tone_has_expected_length_and_energy() {
        let samples = tone(1000.0, 20, SampleRate::Hz16000);
        assert_eq!(samples.len(), 320);
        assert!(samples.iter().any(|&s| s.unsigned_abs() > 8000));
    }

    #[test]
    fn silence_frame_is_silent() {
        let frame = silence_frame(SampleRate::Hz48000, 0);
        assert!(frame.is_silence());
        assert_eq!(frame.samples.len(), 960);
    }
}
