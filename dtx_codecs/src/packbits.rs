//! PackBits run-length scheme used by each RLE Lossless segment.
//!
//! Header byte `n` (as i8):
//! - `0..=127`   → copy the next `n + 1` bytes literally
//! - `-127..=-1` → repeat the next byte `1 - n` times
//! - `-128`      → no-op

/// Runs shorter than this are cheaper to leave inside a literal.
const MIN_RUN: usize = 3;
const MAX_CHUNK: usize = 128;

pub(crate) fn encode(src: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < src.len() {
        let mut run = 1;
        while i + run < src.len() && run < MAX_CHUNK && src[i + run] == src[i] {
            run += 1;
        }

        if run >= MIN_RUN {
            out.push((257 - run) as u8);
            out.push(src[i]);
            i += run;
            continue;
        }

        let start = i;
        while i < src.len() && i - start < MAX_CHUNK {
            if i + 2 < src.len() && src[i] == src[i + 1] && src[i] == src[i + 2] {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&src[start..i]);
    }
}

/// Decode exactly `expected` bytes from `src`. Trailing bytes (segment
/// padding) are ignored.
pub(crate) fn decode(src: &[u8], expected: usize) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    let mut i = 0;
    while out.len() < expected {
        let header = *src
            .get(i)
            .ok_or_else(|| anyhow::anyhow!("segment truncated after {} of {} bytes", out.len(), expected))?
            as i8;
        i += 1;

        if header >= 0 {
            let n = header as usize + 1;
            let literal = src
                .get(i..i + n)
                .ok_or_else(|| anyhow::anyhow!("literal of {} bytes runs past end of segment", n))?;
            out.extend_from_slice(literal);
            i += n;
        } else if header != -128 {
            let n = (1 - header as isize) as usize;
            let byte = *src
                .get(i)
                .ok_or_else(|| anyhow::anyhow!("replicate run missing its byte"))?;
            out.resize(out.len() + n, byte);
            i += 1;
        }
    }

    if out.len() != expected {
        anyhow::bail!("segment decodes to {} bytes, expected {}", out.len(), expected);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(src: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode(src, &mut out);
        out
    }

    #[test]
    fn known_vector() {
        // Apple's reference example.
        let packed = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7, 0xAA,
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22, 0xAA,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(decode(&packed, expected.len()).unwrap(), expected);
    }

    #[test]
    fn long_runs_split_at_128() {
        let src = vec![5u8; 300];
        let out = packed(&src);
        // 128 + 128 + 44
        assert_eq!(out, vec![0x81, 5, 0x81, 5, 0xD5, 5]);
        assert_eq!(decode(&out, 300).unwrap(), src);
    }

    #[test]
    fn mixed_content_survives() {
        let src: Vec<u8> = (0..1000u32)
            .map(|i| if i % 97 < 40 { 0 } else { (i * 31 % 251) as u8 })
            .collect();
        assert_eq!(decode(&packed(&src), src.len()).unwrap(), src);
    }

    #[test]
    fn padding_after_segment_is_ignored() {
        let mut out = packed(&[1, 2, 3]);
        out.push(0);
        assert_eq!(decode(&out, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn truncated_and_overlong_segments_fail() {
        assert!(decode(&[0x05, 1, 2], 6).is_err());
        assert!(decode(&[0xFD, 9], 2).is_err());
    }
}
