//! Deblocking loop filter.
//!
//! Smooths the two samples either side of every 8x8 block edge when the
//! step across the edge is small enough to be a quantization artifact
//! rather than real image detail.

/// Edge limit for a filter level; 0 disables filtering.
fn edge_limit(level: u8) -> i16 {
    i16::from(level) * 2 + 1
}

/// Simple edge filter on the two samples either side of an edge.
#[inline]
fn simple_filter(p1: u8, p0: u8, q0: u8, q1: u8, limit: i16) -> (u8, u8) {
    let p1_i = i16::from(p1);
    let p0_i = i16::from(p0);
    let q0_i = i16::from(q0);
    let q1_i = i16::from(q1);

    let mask = (p0_i - q0_i).abs() * 2 + ((p1_i - q1_i).abs() >> 1) <= limit;
    if !mask {
        return (p0, q0);
    }

    let filter = (3 * (q0_i - p0_i)).clamp(-128, 127);
    let filter1 = (filter + 4).clamp(-128, 127) >> 3;
    let filter2 = (filter + 3).clamp(-128, 127) >> 3;

    let new_q0 = (q0_i - filter1).clamp(0, 255) as u8;
    let new_p0 = (p0_i + filter2).clamp(0, 255) as u8;

    (new_p0, new_q0)
}

/// Filter every internal 8x8 block edge of a plane in place.
///
/// Vertical edges go first, then horizontal edges.
pub fn deblock_plane(plane: &mut [u8], width: usize, height: usize, level: u8) {
    if level == 0 {
        return;
    }
    let limit = edge_limit(level);

    for x in (8..width).step_by(8) {
        for y in 0..height {
            let row = y * width;
            let p1 = plane[row + x - 2];
            let p0 = plane[row + x - 1];
            let q0 = plane[row + x];
            let q1 = plane[row + (x + 1).min(width - 1)];
            let (np0, nq0) = simple_filter(p1, p0, q0, q1, limit);
            plane[row + x - 1] = np0;
            plane[row + x] = nq0;
        }
    }

    for y in (8..height).step_by(8) {
        for x in 0..width {
            let p1 = plane[(y - 2) * width + x];
            let p0 = plane[(y - 1) * width + x];
            let q0 = plane[y * width + x];
            let q1 = plane[(y + 1).min(height - 1) * width + x];
            let (np0, nq0) = simple_filter(p1, p0, q0, q1, limit);
            plane[(y - 1) * width + x] = np0;
            plane[y * width + x] = nq0;
        }
    }
}
