//! Plane resampling

/// Resample one tightly packed 8-bit plane with an area-averaging box filter
///
/// Each output sample averages the source samples its footprint covers; when
/// upscaling the footprint collapses to the nearest source sample.
pub(crate) fn scale_plane(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_width * dst_height];
    if src_width == 0 || src_height == 0 || src.len() < src_width * src_height {
        return dst;
    }

    if src_width == dst_width && src_height == dst_height {
        dst.copy_from_slice(&src[..src_width * src_height]);
        return dst;
    }

    let columns: Vec<(usize, usize)> = (0..dst_width)
        .map(|dx| footprint(dx, src_width, dst_width))
        .collect();

    for dy in 0..dst_height {
        let (y0, y1) = footprint(dy, src_height, dst_height);
        let row = &mut dst[dy * dst_width..(dy + 1) * dst_width];

        for (out, &(x0, x1)) in row.iter_mut().zip(&columns) {
            let mut sum = 0u64;
            for sy in y0..y1 {
                let line = &src[sy * src_width..sy * src_width + src_width];
                sum += line[x0..x1].iter().map(|&p| u64::from(p)).sum::<u64>();
            }
            let count = ((x1 - x0) * (y1 - y0)) as u64;
            *out = ((sum + count / 2) / count) as u8;
        }
    }

    dst
}

/// Half-open source span covered by output sample `index`
fn footprint(index: usize, src_len: usize, dst_len: usize) -> (usize, usize) {
    let start = (index * src_len / dst_len).min(src_len - 1);
    let end = ((index + 1) * src_len / dst_len).clamp(start + 1, src_len);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_copy() {
        let src: Vec<u8> = (0..12).collect();
        assert_eq!(scale_plane(&src, 4, 3, 4, 3), src);
    }

    #[test]
    fn test_halving_averages_blocks() {
        #[rustfmt::skip]
        let src = [
            0, 2, 10, 10,
            4, 6, 20, 30,
        ];
        assert_eq!(scale_plane(&src, 4, 2, 2, 1), vec![3, 18]);
    }

    #[test]
    fn test_uniform_plane_stays_uniform() {
        let src = vec![77u8; 1280 * 720];
        let dst = scale_plane(&src, 1280, 720, 480, 270);
        assert_eq!(dst.len(), 480 * 270);
        assert!(dst.iter().all(|&p| p == 77));
    }

    #[test]
    fn test_upscale_repeats_nearest() {
        let src = [10u8, 20];
        assert_eq!(scale_plane(&src, 2, 1, 4, 1), vec![10, 10, 20, 20]);
    }

    #[test]
    fn test_short_source_yields_blank_plane() {
        assert_eq!(scale_plane(&[1, 2], 4, 4, 2, 2), vec![0; 4]);
    }
}
