//! Sample-rate conversion and stream reframing
//!
//! Linear interpolation is sufficient for speech at the rate pairs the
//! platform uses (all ratios are small rationals); amplitude is clipped to
//! the i16 range. The [`Reframer`] carries the trailing partial samples of
//! one push over to the next so decoder output of arbitrary length can be
//! cut into exact 20 ms frames without losing bytes.

use crate::types::{AudioFrame, SampleRate, FRAME_MS};

/// Resample PCM between two supported rates using linear interpolation.
///
/// Output length is `len * to / from` rounded down. Identical rates return
/// a copy. Silence in, silence out.
pub fn resample(samples: &[i16], from: SampleRate, to: SampleRate) -> Vec<i16> {
    if from == to {
        return samples.to_vec();
    }
    let n_in = samples.len();
    if n_in == 0 {
        return Vec::new();
    }

    let n_out = (n_in as u64 * to.hz() as u64 / from.hz() as u64) as usize;
    if n_out == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n_out);

    let step = from.hz() as f64 / to.hz() as f64;
    let mut pos = 0.0f64;
    for _ in 0..n_out {
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let s0 = samples[idx.min(n_in - 1)] as f64;
        let s1 = samples[(idx + 1).min(n_in - 1)] as f64;
        let v = s0 + (s1 - s0) * frac;
        out.push(clip(v));
        pos += step;
    }
    out
}

fn clip(v: f64) -> i16 {
    v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Cuts a continuous little-endian PCM byte stream into 20 ms frames.
///
/// Bytes that do not fill a whole frame are buffered and prepended to the
/// next push, so the concatenation of all emitted frames equals the input
/// stream plus whatever tail is still buffered.
pub struct Reframer {
    rate: SampleRate,
    tail: Vec<u8>,
    next_timestamp_ms: u64,
}

impl Reframer {
    /// Create a reframer producing frames at `rate`
    pub fn new(rate: SampleRate) -> Self {
        Self {
            rate,
            tail: Vec::with_capacity(rate.bytes_per_frame()),
            next_timestamp_ms: 0,
        }
    }

    /// Append bytes and return every complete frame now available
    pub fn push(&mut self, bytes: &[u8]) -> Vec<AudioFrame> {
        self.tail.extend_from_slice(bytes);
        let frame_bytes = self.rate.bytes_per_frame();
        let mut frames = Vec::with_capacity(self.tail.len() / frame_bytes);

        let mut offset = 0;
        while self.tail.len() - offset >= frame_bytes {
            let chunk = &self.tail[offset..offset + frame_bytes];
            let samples: Vec<i16> = chunk
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect();
            // Length is exact by construction.
            frames.push(AudioFrame {
                samples,
                rate: self.rate,
                timestamp_ms: self.next_timestamp_ms,
            });
            self.next_timestamp_ms += FRAME_MS as u64;
            offset += frame_bytes;
        }
        self.tail.drain(..offset);
        frames
    }

    /// Append samples directly (convenience over [`push`](Self::push))
    pub fn push_samples(&mut self, samples: &[i16]) -> Vec<AudioFrame> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.push(&bytes)
    }

    /// Bytes currently buffered waiting for the next push
    pub fn buffered_bytes(&self) -> usize {
        self.tail.len()
    }

    /// Drop the buffered tail and reset timestamps (used when the
    /// downstream queue is flushed on interruption)
    pub fn clear(&mut self) {
        self.tail.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_1khz(rate: SampleRate, ms: u32) -> Vec<i16> {
        let n = (rate.hz() / 1000 * ms) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / rate.hz() as f64;
                ((t * 1000.0 * 2.0 * std::f64::consts::PI).sin() * 16000.0) as i16
            })
            .collect()
    }

    fn peak(samples: &[i16]) -> i16 {
        samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0) as i16
    }

    #[test]
    fn identity_resample_is_copy() {
        let input = sine_1khz(SampleRate::Hz16000, 20);
        assert_eq!(
            resample(&input, SampleRate::Hz16000, SampleRate::Hz16000),
            input
        );
    }

    #[test]
    fn downsample_upsample_preserves_peak_within_3db() {
        let input = sine_1khz(SampleRate::Hz48000, 100);
        let down = resample(&input, SampleRate::Hz48000, SampleRate::Hz16000);
        let back = resample(&down, SampleRate::Hz16000, SampleRate::Hz48000);

        let p_in = peak(&input) as f64;
        let p_out = peak(&back) as f64;
        let db = 20.0 * (p_out / p_in).log10();
        assert!(db.abs() < 3.0, "peak drifted {db:.2} dB");
    }

    #[test]
    fn silence_resamples_to_exact_silence() {
        let silence = vec![0i16; 960];
        let out = resample(&silence, SampleRate::Hz48000, SampleRate::Hz16000);
        assert_eq!(out.len(), 320);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn resample_ratios_are_exact() {
        let input = vec![0i16; 960];
        assert_eq!(
            resample(&input, SampleRate::Hz48000, SampleRate::Hz16000).len(),
            320
        );
        assert_eq!(
            resample(&input, SampleRate::Hz48000, SampleRate::Hz24000).len(),
            480
        );
        let up = vec![0i16; 480];
        assert_eq!(
            resample(&up, SampleRate::Hz24000, SampleRate::Hz48000).len(),
            960
        );
    }

    #[test]
    fn reframer_is_length_preserving() {
        let mut reframer = Reframer::new(SampleRate::Hz24000);
        let frame_bytes = SampleRate::Hz24000.bytes_per_frame();

        // Feed 2.5 frames worth of bytes in awkward chunk sizes.
        let total = frame_bytes * 5 / 2;
        let data: Vec<u8> = (0..total).map(|i| (i % 251) as u8).collect();

        let mut emitted = 0;
        for chunk in data.chunks(333) {
            for frame in reframer.push(chunk) {
                emitted += frame.samples.len() * 2;
            }
        }
        assert_eq!(emitted + reframer.buffered_bytes(), total);
        assert_eq!(reframer.buffered_bytes(), frame_bytes / 2);

        // The tail surfaces once the missing half frame arrives.
        let more: Vec<u8> = vec![0; frame_bytes / 2];
        let frames = reframer.push(&more);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn reframer_timestamps_are_monotonic() {
        let mut reframer = Reframer::new(SampleRate::Hz48000);
        let bytes = vec![0u8; SampleRate::Hz48000.bytes_per_frame() * 3];
        let frames = reframer.push(&bytes);
        let stamps: Vec<u64> = frames.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 20, 40]);
    }
}
