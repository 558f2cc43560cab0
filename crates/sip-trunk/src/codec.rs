//! Wire codec layer
//!
//! Encodes and decodes between the negotiated RTP payload format and the
//! fixed 48 kHz bridge rate. G.711 runs at 8 kHz so its path resamples
//! internally; Opus is coded at 48 kHz directly. Callers of this module
//! never see anything but 48 kHz PCM.

use audiopus::coder::{Decoder as OpusDecoder, Encoder as OpusEncoder};
use audiopus::{Application, Channels, SampleRate as OpusRate};

use voxgate_audio_core::{resample, SampleRate};

use crate::error::{Result, TrunkError};
use crate::sdp::{CodecKind, NegotiatedCodec};

const ALAW_SEG_END: [i16; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];
const MULAW_SEG_END: [i16; 8] = [0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF, 0x1FFF];
const MULAW_BIAS: i16 = 0x84;
const MULAW_CLIP: i16 = 8159;

/// Stateful codec for one media session
pub enum MediaCodec {
    /// Opus at the bridge rate
    Opus {
        /// libopus encoder, mono VoIP profile
        encoder: OpusEncoder,
        /// libopus decoder
        decoder: OpusDecoder,
    },
    /// G.711 A-law
    Pcma,
    /// G.711 u-law
    Pcmu,
}

impl MediaCodec {
    /// Instantiate the codec chosen during SDP negotiation
    pub fn new(negotiated: &NegotiatedCodec) -> Result<Self> {
        match negotiated.kind {
            CodecKind::Opus => {
                let encoder =
                    OpusEncoder::new(OpusRate::Hz48000, Channels::Mono, Application::Voip)
                        .map_err(|e| TrunkError::Media {
                            reason: format!("opus encoder init: {e}"),
                        })?;
                let decoder = OpusDecoder::new(OpusRate::Hz48000, Channels::Mono).map_err(
                    |e| TrunkError::Media {
                        reason: format!("opus decoder init: {e}"),
                    },
                )?;
                Ok(MediaCodec::Opus { encoder, decoder })
            }
            CodecKind::Pcma => Ok(MediaCodec::Pcma),
            CodecKind::Pcmu => Ok(MediaCodec::Pcmu),
        }
    }

    /// RTP timestamp increment per 20 ms frame at the codec clock rate
    pub fn timestamp_step(&self) -> u32 {
        match self {
            MediaCodec::Opus { .. } => 960,
            MediaCodec::Pcma | MediaCodec::Pcmu => 160,
        }
    }

    /// Encode one 48 kHz / 960-sample frame into an RTP payload
    pub fn encode_48k(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        match self {
            MediaCodec::Opus { encoder, .. } => {
                let mut out = vec![0u8; 1500];
                let n = encoder
                    .encode(samples, &mut out)
                    .map_err(|e| TrunkError::Media {
                        reason: format!("opus encode: {e}"),
                    })?;
                out.truncate(n);
                Ok(out)
            }
            MediaCodec::Pcma => {
                let narrow = resample(samples, SampleRate::Hz48000, SampleRate::Hz8000);
                Ok(narrow.iter().map(|&s| linear_to_alaw(s)).collect())
            }
            MediaCodec::Pcmu => {
                let narrow = resample(samples, SampleRate::Hz48000, SampleRate::Hz8000);
                Ok(narrow.iter().map(|&s| linear_to_mulaw(s)).collect())
            }
        }
    }

    /// Decode an RTP payload into 48 kHz samples
    pub fn decode_to_48k(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        match self {
            MediaCodec::Opus { decoder, .. } => {
                // 120 ms at 48 kHz mono is the maximum opus frame.
                let mut out = vec![0i16; 5760];
                let n = decoder
                    .decode(Some(payload), &mut out, false)
                    .map_err(|e| TrunkError::Media {
                        reason: format!("opus decode: {e}"),
                    })?;
                out.truncate(n);
                Ok(out)
            }
            MediaCodec::Pcma => {
                let narrow: Vec<i16> = payload.iter().map(|&b| alaw_to_linear(b)).collect();
                Ok(resample(&narrow, SampleRate::Hz8000, SampleRate::Hz48000))
            }
            MediaCodec::Pcmu => {
                let narrow: Vec<i16> = payload.iter().map(|&b| mulaw_to_linear(b)).collect();
                Ok(resample(&narrow, SampleRate::Hz8000, SampleRate::Hz48000))
            }
        }
    }
}

fn segment_of(value: i16, table: &[i16; 8]) -> usize {
    table.iter().position(|&end| value <= end).unwrap_or(8)
}

/// Linear PCM to G.711 A-law
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut pcm = sample >> 3; // 13-bit magnitude domain
    let mask: u8;
    if pcm >= 0 {
        mask = 0xD5;
    } else {
        mask = 0x55;
        pcm = (-(pcm as i32) - 1).max(0) as i16;
    }

    let seg = segment_of(pcm, &ALAW_SEG_END);
    if seg >= 8 {
        return 0x7F ^ mask;
    }
    let mut aval = (seg as u8) << 4;
    if seg < 2 {
        aval |= ((pcm >> 1) & 0x0F) as u8;
    } else {
        aval |= ((pcm >> seg) & 0x0F) as u8;
    }
    aval ^ mask
}

/// G.711 A-law to linear PCM
pub fn alaw_to_linear(code: u8) -> i16 {
    let code = code ^ 0x55;
    let mut t = ((code & 0x0F) as i16) << 4;
    let seg = (code & 0x70) >> 4;
    match seg {
        0 => t += 8,
        1 => t += 0x108,
        _ => {
            t += 0x108;
            t <<= seg - 1;
        }
    }
    if code & 0x80 != 0 {
        t
    } else {
        -t
    }
}

/// Linear PCM to G.711 u-law
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut pcm = sample >> 2; // 14-bit magnitude domain
    let mask: u8;
    if pcm < 0 {
        pcm = -pcm;
        mask = 0x7F;
    } else {
        mask = 0xFF;
    }
    pcm = pcm.min(MULAW_CLIP) + (MULAW_BIAS >> 2);

    let seg = segment_of(pcm, &MULAW_SEG_END);
    if seg >= 8 {
        return 0x7F ^ mask;
    }
    let uval = ((seg as u8) << 4) | ((pcm >> (seg + 1)) & 0x0F) as u8;
    uval ^ mask
}

/// G.711 u-law to linear PCM
pub fn mulaw_to_linear(code: u8) -> i16 {
    let code = !code;
    let mut t = (((code & 0x0F) as i16) << 3) + MULAW_BIAS;
    t <<= (code & 0x70) >> 4;
    if code & 0x80 != 0 {
        MULAW_BIAS - t
    } else {
        t - MULAW_BIAS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alaw_round_trip_is_close() {
        for &sample in &[0i16, 100, -100, 1000, -1000, 12345, -12345, 32000, -32000] {
            let decoded = alaw_to_linear(linear_to_alaw(sample));
            let err = (decoded as i32 - sample as i32).abs();
            // A-law quantization error grows with amplitude.
            assert!(
                err < sample.unsigned_abs().max(64) as i32 / 8 + 64,
                "sample {sample} decoded to {decoded}"
            );
        }
    }

    #[test]
    fn mulaw_round_trip_is_close() {
        for &sample in &[0i16, 100, -100, 1000, -1000, 12345, -12345, 30000, -30000] {
            let decoded = mulaw_to_linear(linear_to_mulaw(sample));
            let err = (decoded as i32 - sample as i32).abs();
            assert!(
                err < sample.unsigned_abs().max(64) as i32 / 8 + 64,
                "sample {sample} decoded to {decoded}"
            );
        }
    }

    #[test]
    fn mulaw_silence_is_0xff() {
        assert_eq!(linear_to_mulaw(0), 0xFF);
    }

    #[test]
    fn g711_path_bridges_at_48k() {
        let mut codec = MediaCodec::Pcma;
        let frame_48k = vec![0i16; 960];
        let payload = codec.encode_48k(&frame_48k).unwrap();
        assert_eq!(payload.len(), 160);
        let decoded = codec.decode_to_48k(&payload).unwrap();
        assert_eq!(decoded.len(), 960);
    }

    #[test]
    fn timestamp_steps_follow_clock_rate() {
        assert_eq!(MediaCodec::Pcma.timestamp_step(), 160);
        assert_eq!(MediaCodec::Pcmu.timestamp_step(), 160);
    }
}
