//! Integer-ratio resampling for 16-bit linear PCM.
//!
//! Only rate pairs where one rate is an exact multiple of the other are
//! supported (8 kHz ↔ 24 kHz is the one the bridge uses). Upsampling inserts
//! linearly interpolated samples between neighbours; downsampling averages
//! each group of `ratio` input samples. Averaging is the matching box filter
//! for the interpolator, so a round trip reproduces the original within a
//! fraction of the local slope and never aliases the 12 kHz synthesis band
//! straight into the telephone channel.
//!
//! The output length is always `round(samples * to / from)`.

use super::{BYTES_PER_SAMPLE, TranscodeError, TranscodeResult};

/// Direction and factor of an integer-ratio conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ratio {
    Identity,
    Up(usize),
    Down(usize),
}

fn ratio_for(from: u32, to: u32) -> TranscodeResult<Ratio> {
    if from == 0 || to == 0 {
        return Err(TranscodeError::UnsupportedRate { from, to });
    }
    if from == to {
        Ok(Ratio::Identity)
    } else if to > from && to % from == 0 {
        Ok(Ratio::Up((to / from) as usize))
    } else if from > to && from % to == 0 {
        Ok(Ratio::Down((from / to) as usize))
    } else {
        Err(TranscodeError::UnsupportedRate { from, to })
    }
}

/// Returns true when [`resample`] can convert between the two rates.
pub fn is_supported(from: u32, to: u32) -> bool {
    ratio_for(from, to).is_ok()
}

/// Resample little-endian 16-bit PCM from `from` Hz to `to` Hz.
///
/// A trailing odd byte is an incomplete sample and is dropped. Unsupported
/// rate pairs fail instead of passing audio through unconverted.
pub fn resample(pcm: &[u8], from: u32, to: u32) -> TranscodeResult<Vec<u8>> {
    let ratio = ratio_for(from, to)?;
    let samples: Vec<i16> = pcm
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let converted = match ratio {
        Ratio::Identity => samples,
        Ratio::Up(factor) => upsample(&samples, factor),
        Ratio::Down(factor) => downsample(&samples, factor),
    };

    let mut out = Vec::with_capacity(converted.len() * BYTES_PER_SAMPLE);
    for sample in converted {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(out)
}

fn upsample(samples: &[i16], factor: usize) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() * factor);
    for (i, &current) in samples.iter().enumerate() {
        // The last sample has no right neighbour and is held.
        let next = samples.get(i + 1).copied().unwrap_or(current) as i32;
        let current = current as i32;
        for step in 0..factor {
            let value = current + (next - current) * step as i32 / factor as i32;
            out.push(value as i16);
        }
    }
    out
}

fn downsample(samples: &[i16], factor: usize) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() / factor + 1);
    for group in samples.chunks(factor) {
        // A short tail group counts only if it holds at least half a period,
        // which keeps the output length at round(n / factor).
        if group.len() * 2 < factor {
            break;
        }
        let sum: i32 = group.iter().map(|&s| s as i32).sum();
        out.push((sum / group.len() as i32) as i16);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn to_samples(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect()
    }

    #[test]
    fn test_upsample_length_is_triple() {
        for n in [0usize, 1, 3, 160, 161, 480] {
            let input = to_bytes(&vec![100i16; n]);
            let out = resample(&input, 8000, 24000).unwrap();
            assert_eq!(out.len(), input.len() * 3, "n = {n}");
        }
    }

    #[test]
    fn test_downsample_length_is_third() {
        for n in [0usize, 3, 480, 960] {
            let input = to_bytes(&vec![-7i16; n]);
            let out = resample(&input, 24000, 8000).unwrap();
            assert_eq!(out.len(), input.len() / 3, "n = {n}");
        }
    }

    #[test]
    fn test_downsample_rounds_partial_tail() {
        // round(4 / 3) = 1, round(5 / 3) = 2
        assert_eq!(resample(&to_bytes(&[1; 4]), 24000, 8000).unwrap().len(), 2);
        assert_eq!(resample(&to_bytes(&[1; 5]), 24000, 8000).unwrap().len(), 4);
    }

    #[test]
    fn test_odd_trailing_byte_is_truncated() {
        let mut input = to_bytes(&[10, 20]);
        input.push(0x7F);
        let out = resample(&input, 8000, 24000).unwrap();
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn test_upsample_interpolates() {
        let out = to_samples(&resample(&to_bytes(&[0, 300]), 8000, 24000).unwrap());
        assert_eq!(out, vec![0, 100, 200, 300, 300, 300]);
    }

    #[test]
    fn test_downsample_averages() {
        let out = to_samples(&resample(&to_bytes(&[3, 6, 9, -3, -6, -9]), 24000, 8000).unwrap());
        assert_eq!(out, vec![6, -6]);
    }

    #[test]
    fn test_roundtrip_is_close() {
        let original: Vec<i16> = (0..160)
            .map(|i| ((i as f32 * 0.2).sin() * 8000.0) as i16)
            .collect();
        let up = resample(&to_bytes(&original), 8000, 24000).unwrap();
        let back = to_samples(&resample(&up, 24000, 8000).unwrap());
        assert_eq!(back.len(), original.len());
        for (a, b) in original.iter().zip(back.iter()) {
            // Averaging one interpolated period shifts by a third of the local slope.
            assert!((*a as i32 - *b as i32).abs() <= 1000, "{a} vs {b}");
        }
    }

    #[test]
    fn test_identity_passes_through() {
        let input = to_bytes(&[1, 2, 3]);
        assert_eq!(resample(&input, 8000, 8000).unwrap(), input);
    }

    #[test]
    fn test_unsupported_rate_pair() {
        let err = resample(&[0, 0], 8000, 44100).unwrap_err();
        assert_eq!(
            err,
            TranscodeError::UnsupportedRate {
                from: 8000,
                to: 44100
            }
        );
        assert!(resample(&[], 0, 8000).is_err());
        assert!(!is_supported(16000, 24000));
        assert!(is_supported(24000, 8000));
    }
}
