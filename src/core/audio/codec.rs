//! G.711 μ-law codec.
//!
//! Telephony media arrives as 8-bit μ-law at 8 kHz. Decoding goes through a
//! 256-entry table computed at compile time, so the inbound path is a single
//! indexed load per sample. Encoding follows the standard segment search with
//! the usual bias (0x84) and clip level (32635).

/// Bias added before the exponential segment search.
const MULAW_BIAS: i32 = 0x84;

/// Largest magnitude representable before biasing.
const MULAW_CLIP: i32 = 32635;

const fn expand(byte: u8) -> i16 {
    let inverted = !byte;
    let sign = inverted & 0x80;
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = inverted & 0x0F;

    let magnitude = ((((mantissa as i32) << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

const fn build_decode_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = expand(i as u8);
        i += 1;
    }
    table
}

static DECODE_TABLE: [i16; 256] = build_decode_table();

/// Decode one μ-law byte into a 16-bit linear sample.
#[inline]
pub fn decode_mulaw(byte: u8) -> i16 {
    DECODE_TABLE[byte as usize]
}

/// Encode one 16-bit linear sample into a μ-law byte.
#[inline]
pub fn encode_mulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };

    pcm = pcm.min(MULAW_CLIP) + MULAW_BIAS;

    // Highest set bit above bit 7 selects the segment.
    let exponent = (31 - (pcm as u32).leading_zeros()).saturating_sub(7).min(7) as i32;
    let mantissa = (pcm >> (exponent + 3)) & 0x0F;

    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Decode a μ-law buffer into little-endian 16-bit PCM (two bytes out per byte in).
pub fn mulaw_to_pcm(mulaw: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(mulaw.len() * 2);
    for &byte in mulaw {
        pcm.extend_from_slice(&decode_mulaw(byte).to_le_bytes());
    }
    pcm
}

/// Encode little-endian 16-bit PCM into μ-law.
///
/// A trailing odd byte is an incomplete sample and is ignored.
pub fn pcm_to_mulaw(pcm: &[u8]) -> Vec<u8> {
    pcm.chunks_exact(2)
        .map(|pair| encode_mulaw(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}
