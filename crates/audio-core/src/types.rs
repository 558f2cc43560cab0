//! Frame and format types
//!
//! A [`AudioFrame`] is 20 ms of signed 16-bit mono PCM at one of the four
//! rates the platform uses. Frames are immutable once enqueued; every
//! conversion produces a new frame.

use crate::error::{AudioError, Result};

/// Fixed frame duration used throughout the media path
pub const FRAME_MS: u32 = 20;

/// Sample rates supported by the media pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRate {
    /// 8 kHz - G.711 telephony rate
    Hz8000,
    /// 16 kHz - AI uplink rate
    Hz16000,
    /// 24 kHz - AI downlink rate
    Hz24000,
    /// 48 kHz - bridge clock rate
    Hz48000,
}

impl SampleRate {
    /// The rate in Hz
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8_000,
            SampleRate::Hz16000 => 16_000,
            SampleRate::Hz24000 => 24_000,
            SampleRate::Hz48000 => 48_000,
        }
    }

    /// Samples in one 20 ms frame at this rate (960 at 48 kHz)
    pub fn samples_per_frame(&self) -> usize {
        (self.hz() / 1000 * FRAME_MS) as usize
    }

    /// Bytes in one 20 ms frame of 16-bit PCM at this rate
    pub fn bytes_per_frame(&self) -> usize {
        self.samples_per_frame() * 2
    }

    /// Look up a supported rate by its Hz value
    pub fn try_from_hz(hz: u32) -> Result<Self> {
        match hz {
            8_000 => Ok(SampleRate::Hz8000),
            16_000 => Ok(SampleRate::Hz16000),
            24_000 => Ok(SampleRate::Hz24000),
            48_000 => Ok(SampleRate::Hz48000),
            rate => Err(AudioError::UnsupportedRate { rate }),
        }
    }
}

impl std::fmt::Display for SampleRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

/// One 20 ms frame of signed 16-bit mono PCM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// PCM samples; `len() == rate.samples_per_frame()`
    pub samples: Vec<i16>,
    /// Sample rate of this frame
    pub rate: SampleRate,
    /// Monotonic timestamp within the stream, in milliseconds
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Create a frame, validating the 20 ms length invariant
    pub fn new(samples: Vec<i16>, rate: SampleRate, timestamp_ms: u64) -> Result<Self> {
        let expected = rate.samples_per_frame();
        if samples.len() != expected {
            return Err(AudioError::InvalidFrameSize {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            samples,
            rate,
            timestamp_ms,
        })
    }

    /// Whether every sample in the frame is zero
    pub fn is_silence(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// Samples serialized as little-endian bytes (the wire order of both
    /// the RTP payload path and the AI websocket)
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for &s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_per_frame_matches_rate() {
        assert_eq!(SampleRate::Hz8000.samples_per_frame(), 160);
        assert_eq!(SampleRate::Hz16000.samples_per_frame(), 320);
        assert_eq!(SampleRate::Hz24000.samples_per_frame(), 480);
        assert_eq!(SampleRate::Hz48000.samples_per_frame(), 960);
    }

    #[test]
    fn frame_length_is_validated() {
        assert!(AudioFrame::new(vec![0; 960], SampleRate::Hz48000, 0).is_ok());
        let err = AudioFrame::new(vec![0; 100], SampleRate::Hz48000, 0);
        assert!(matches!(
            err,
            Err(AudioError::InvalidFrameSize {
                expected: 960,
                actual: 100
            })
        ));
    }

    #[test]
    fn unknown_rate_is_rejected() {
        assert!(SampleRate::try_from_hz(44_100).is_err());
        assert_eq!(
            SampleRate::try_from_hz(48_000).unwrap(),
            SampleRate::Hz48000
        );
    }

    #[test]
    fn le_bytes_round_trip() {
        let frame = AudioFrame::new(vec![1; 160], SampleRate::Hz8000, 0).unwrap();
        let bytes = frame.to_le_bytes();
        assert_eq!(bytes.len(), 320);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], 0);
    }
}
