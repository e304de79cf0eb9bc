use super::mesh::*;
use super::*;
use crate::api::frame::*;

/* largest block side in samples */
pub const MAX_BLK_SIZE: usize = 16;
const MAX_BLK_LOG2: usize = 4;

pub type PredBuf = [[i32; MAX_BLK_SIZE]; MAX_BLK_SIZE];

lazy_static! {
    /* far-side bilinear weight of sample i in a block of 1 << log samples,
       out of 2 << log */
    static ref BLEND_WEIGHTS: [[i32; MAX_BLK_SIZE]; MAX_BLK_LOG2 + 1] = {
        let mut w = [[0; MAX_BLK_SIZE]; MAX_BLK_LOG2 + 1];
        for (log, row) in w.iter_mut().enumerate() {
            for i in 0..(1 << log) {
                row[i] = 2 * i as i32 + 1;
            }
        }
        w
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CornerPred {
    Mv([i32; 2]),
    /* average of two predictions */
    Avg([i32; 2], [i32; 2]),
}

/// Bilinear sample of the 2x upsampled plane `refp` at plane position
/// `(x, y)` displaced by `mv` (1/8 luma pel).
#[inline]
pub fn sample<T: Pixel>(refp: &Plane<T>, x: isize, y: isize, mv: [i32; 2]) -> i32 {
    let xfb = 2 + refp.cfg.xdec;
    let yfb = 2 + refp.cfg.ydec;
    let fx = ((x << 1) << xfb) + mv[MV_X] as isize;
    let fy = ((y << 1) << yfb) + mv[MV_Y] as isize;
    let ix = fx >> xfb;
    let iy = fy >> yfb;
    let rx = (fx & ((1 << xfb) - 1)) as i32;
    let ry = (fy & ((1 << yfb) - 1)) as i32;
    let a: i32 = refp.clamped(ix, iy).into();
    if rx == 0 && ry == 0 {
        return a;
    }
    let b: i32 = refp.clamped(ix + 1, iy).into();
    let c: i32 = refp.clamped(ix, iy + 1).into();
    let d: i32 = refp.clamped(ix + 1, iy + 1).into();
    let sx = 1 << xfb;
    let sy = 1 << yfb;
    let top = a * (sx - rx) + b * rx;
    let bot = c * (sx - rx) + d * rx;
    let shift = xfb + yfb;
    (top * (sy - ry) + bot * ry + (1 << (shift - 1))) >> shift
}

/* prediction source of corner c, synthesizing split corners along the
   parent edge through corner oc */
fn corner_pred(
    grid: &MvGrid,
    vx: isize,
    vy: isize,
    oc: usize,
    s: usize,
    mvb: isize,
    c: usize,
) -> CornerPred {
    let cx = vx + VERT_DX[c] * mvb;
    let cy = vy + VERT_DY[c] * mvb;
    let own = CornerPred::Mv(grid[(cx, cy)].mv);
    let split = if c == (oc + 1) & 3 {
        s & 1 == 0
    } else if c == (oc + 3) & 3 {
        s & 2 == 0
    } else {
        false
    };
    if !split {
        return own;
    }
    let ox = vx + VERT_DX[oc] * mvb;
    let oy = vy + VERT_DY[oc] * mvb;
    let fx = ox + 2 * (cx - ox);
    let fy = oy + 2 * (cy - oy);
    if !grid.in_bounds(fx, fy) {
        return own;
    }
    let v = if oy == fy {
        grid[(ox.min(fx), oy)].right
    } else {
        grid[(ox, oy.min(fy))].down
    };
    let oc_mv = grid[(ox, oy)].mv;
    if v {
        CornerPred::Mv(oc_mv)
    } else {
        CornerPred::Avg(oc_mv, grid[(fx, fy)].mv)
    }
}

/// Predicts the block anchored at vertex `(vx, vy)` with corner `oc` and
/// split state `s` from the upsampled reference plane `refp`.
/// Returns the block size in plane samples.
pub fn pred_block<T: Pixel>(
    dst: &mut PredBuf,
    refp: &Plane<T>,
    grid: &MvGrid,
    vx: isize,
    vy: isize,
    oc: usize,
    s: usize,
    log_mvb_sz: usize,
) -> (usize, usize) {
    let xdec = refp.cfg.xdec;
    let ydec = refp.cfg.ydec;
    let log_w = log_mvb_sz + 2 - xdec;
    let log_h = log_mvb_sz + 2 - ydec;
    let w = 1 << log_w;
    let h = 1 << log_h;
    let x0 = ((vx - 2) << 2) >> xdec;
    let y0 = ((vy - 2) << 2) >> ydec;
    let mvb = 1 << log_mvb_sz;

    let mut corners = [CornerPred::Mv([0, 0]); 4];
    for (c, corner) in corners.iter_mut().enumerate() {
        *corner = corner_pred(grid, vx, vy, oc, s, mvb, c);
    }

    let wx = &BLEND_WEIGHTS[log_w];
    let wy = &BLEND_WEIGHTS[log_h];
    let sw = 2 << log_w;
    let sh = 2 << log_h;
    let shift = log_w + log_h + 2;
    for j in 0..h {
        let y = y0 + j as isize;
        let wy1 = wy[j];
        let wy0 = sh - wy1;
        for i in 0..w {
            let x = x0 + i as isize;
            let wx1 = wx[i];
            let wx0 = sw - wx1;
            let mut p = [0i32; 4];
            for (c, corner) in corners.iter().enumerate() {
                p[c] = match *corner {
                    CornerPred::Mv(mv) => sample(refp, x, y, mv),
                    CornerPred::Avg(a, b) => {
                        (sample(refp, x, y, a) + sample(refp, x, y, b) + 1) >> 1
                    }
                };
            }
            let acc = (p[0] * wx0 + p[1] * wx1) * wy0 + (p[3] * wx0 + p[2] * wx1) * wy1;
            dst[j][i] = (acc + (1 << (shift - 1))) >> shift;
        }
    }
    (w, h)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn random_plane(w: usize, h: usize) -> Plane<u8> {
        let mut ra = ChaChaRng::from_seed([0; 32]);
        let mut p = Plane::new(w, h, 0, 0);
        for v in p.data.iter_mut() {
            *v = ra.gen();
        }
        p
    }

    #[test]
    fn full_pel_sample_is_exact() {
        let p = random_plane(16, 16);
        let up = p.upsample();
        assert_eq!(sample(&up, 3, 5, [0, 0]), p.p(3, 5) as i32);
        assert_eq!(sample(&up, 3, 5, [16, -8]), p.p(5, 4) as i32);
    }

    #[test]
    fn zero_motion_reproduces_reference() {
        let p = random_plane(32, 32);
        let up = p.upsample();
        let mut grid = MvGrid::new(2, 2).unwrap();
        for vy in 0..=grid.nvmvbs() {
            for vx in 0..=grid.nhmvbs() {
                grid[(vx, vy)].valid = true;
            }
        }
        let mut buf = [[0; MAX_BLK_SIZE]; MAX_BLK_SIZE];
        let (w, h) = pred_block(&mut buf, &up, &grid, 2, 2, 0, 3, 2);
        assert_eq!((w, h), (16, 16));
        for j in 0..h {
            for i in 0..w {
                assert_eq!(buf[j][i], p.p(i, j) as i32);
            }
        }
    }

    #[test]
    fn uniform_motion_with_split_corner() {
        let p = random_plane(32, 32);
        let up = p.upsample();
        let mut grid = MvGrid::new(2, 2).unwrap();
        for vy in 0..=grid.nvmvbs() {
            for vx in 0..=grid.nhmvbs() {
                grid[(vx, vy)].mv = [8, 8];
            }
        }
        let mut buf = [[0; MAX_BLK_SIZE]; MAX_BLK_SIZE];
        /* corner 1 and 3 synthesized, the field is uniform so it does not matter */
        let (w, h) = pred_block(&mut buf, &up, &grid, 4, 4, 0, 0, 0);
        assert_eq!((w, h), (4, 4));
        for j in 0..h {
            for i in 0..w {
                assert_eq!(buf[j][i], p.p(8 + i + 1, 8 + j + 1) as i32);
            }
        }
    }
}
