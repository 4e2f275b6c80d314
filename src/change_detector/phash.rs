// Perceptual hash (§3, §4.3): 16x16 nearest-neighbor downscale, BT.709 luma,
// mean-threshold bitmap, packed into four u64 words.

use crate::frame::RawFrame;

const SIDE: usize = 16;
const SAMPLES: usize = SIDE * SIDE; // 256

/// A 256-bit perceptual hash, stored as four 64-bit words (bit i lives in
/// word `i / 64` at offset `i % 64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerceptualHash(pub [u64; 4]);

impl PerceptualHash {
    /// Hamming distance: popcount of the XOR, summed over the four words.
    pub fn hamming_distance(&self, other: &PerceptualHash) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Compact representation for catalog storage: XOR of the four words.
    pub fn compact(&self) -> u64 {
        self.0[0] ^ self.0[1] ^ self.0[2] ^ self.0[3]
    }
}

/// Compute the perceptual hash of a BGRA frame.
///
/// Downscales by nearest-neighbor to 16x16, computes BT.709 luma
/// (Y = 0.2126R + 0.7152G + 0.0722B), takes the arithmetic mean across all
/// 256 samples, and sets bit i iff `gray[i] > mean`.
pub fn compute(frame: &RawFrame) -> PerceptualHash {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let data = frame.data.as_slice();

    let mut gray = [0f32; SAMPLES];
    for (i, slot) in gray.iter_mut().enumerate() {
        let gx = i % SIDE;
        let gy = i / SIDE;
        // Nearest-neighbor sample position in source coordinates.
        let sx = (gx * w / SIDE).min(w.saturating_sub(1));
        let sy = (gy * h / SIDE).min(h.saturating_sub(1));
        let idx = (sy * w + sx) * 4;
        if idx + 2 < data.len() {
            let b = data[idx] as f32;
            let g = data[idx + 1] as f32;
            let r = data[idx + 2] as f32;
            *slot = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        }
    }

    let mean: f32 = gray.iter().sum::<f32>() / SAMPLES as f32;

    let mut words = [0u64; 4];
    for (i, &v) in gray.iter().enumerate() {
        if v > mean {
            words[i / 64] |= 1u64 << (i % 64);
        }
    }
    PerceptualHash(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(w: u32, h: u32, b: u8, g: u8, r: u8) -> RawFrame {
        let mut data = vec![0u8; (w * h * 4) as usize];
        for px in data.chunks_exact_mut(4) {
            px[0] = b;
            px[1] = g;
            px[2] = r;
            px[3] = 255;
        }
        RawFrame::new(data, w, h, 0)
    }

    #[test]
    fn identical_frames_hash_identically() {
        let f1 = solid_frame(640, 480, 10, 200, 30);
        let f2 = solid_frame(640, 480, 10, 200, 30);
        assert_eq!(compute(&f1), compute(&f2));
    }

    #[test]
    fn hamming_distance_is_a_metric() {
        let a = PerceptualHash([0xFFFF_FFFF_0000_0000, 0, 0, 0]);
        let b = PerceptualHash([0x0000_0000_FFFF_FFFF, 0xF, 0, 0]);
        let c = PerceptualHash([0xFF00_FF00_FF00_FF00, 0xA, 0, 0]);

        assert_eq!(a.hamming_distance(&a), 0);
        assert_eq!(a.hamming_distance(&b), b.hamming_distance(&a));

        let ab = a.hamming_distance(&b);
        let bc = b.hamming_distance(&c);
        let ac = a.hamming_distance(&c);
        assert!(ac <= ab + bc, "triangle inequality violated: {ac} > {ab} + {bc}");
    }

    #[test]
    fn compact_hash_is_xor_of_words() {
        let h = PerceptualHash([1, 2, 4, 8]);
        assert_eq!(h.compact(), 1 ^ 2 ^ 4 ^ 8);
    }

    #[test]
    fn a_solid_frame_is_all_zero_bits_since_no_sample_exceeds_the_mean() {
        // Every sample equals the mean exactly, and the bit test is strict `>`.
        let f = solid_frame(640, 480, 50, 50, 50);
        let hash = compute(&f);
        assert_eq!(hash.0, [0, 0, 0, 0]);
    }
}
