use std::cmp;

use crate::api::frame::*;
use crate::com::mc::*;
use crate::com::mesh::*;
use crate::com::*;

/// The pixels one estimation reads: the current frame and the 2x upsampled
/// reference.
pub struct MeSource<'a, T: Pixel> {
    pub input: &'a Frame<T>,
    pub reference: &'a Frame<T>,
    pub pic_width: isize,
    pub pic_height: isize,
    /* planes that contribute to the SAD */
    pub nplanes: usize,
}

impl<'a, T: Pixel> MeSource<'a, T> {
    pub fn new(input: &'a Frame<T>, reference: &'a Frame<T>, use_chroma: bool) -> Self {
        MeSource {
            input,
            reference,
            pic_width: input.width() as isize,
            pic_height: input.height() as isize,
            nplanes: if use_chroma { input.nplanes() } else { 1 },
        }
    }

    /// SAD of the input block at luma `(x, y)` of size `1 << log_blk_sz`
    /// against `pred(i, j)`, clipped to the picture.
    #[inline]
    fn state_sad8<F: Fn(isize, isize) -> i32>(
        &self,
        pli: usize,
        x: isize,
        y: isize,
        log_blk_sz: usize,
        pred: F,
    ) -> i32 {
        let src = &self.input.planes[pli];
        let xdec = src.cfg.xdec;
        let ydec = src.cfg.ydec;
        let mut x = x >> xdec;
        let mut y = y >> ydec;
        let mut w = 1isize << (log_blk_sz - xdec);
        let mut h = 1isize << (log_blk_sz - ydec);
        let mut px = 0;
        let mut py = 0;
        if x < 0 {
            w += x;
            px = -x;
            x = 0;
        }
        if y < 0 {
            h += y;
            py = -y;
            y = 0;
        }
        w = cmp::min(w, ((self.pic_width + (1 << xdec) - 1) >> xdec) - x);
        h = cmp::min(h, ((self.pic_height + (1 << ydec) - 1) >> ydec) - y);
        let mut ret = 0;
        for j in 0..h {
            let row = src.row((y + j) as usize);
            for i in 0..w {
                let s: i32 = row[(x + i) as usize].into();
                ret += (pred(px + i, py + j) - s).abs();
            }
        }
        ret
    }

    /// SAD of a whole-pel block match of the `4 << log_mvb_sz` block at
    /// luma `(bx, by)` displaced by `mv`.
    pub fn bma_sad8(&self, bx: isize, by: isize, mv: [i32; 2], log_mvb_sz: usize) -> i32 {
        let mut ret = 0;
        for pli in 0..self.nplanes {
            let refp = &self.reference.planes[pli];
            let xdec = refp.cfg.xdec;
            let ydec = refp.cfg.ydec;
            let pmvx = div_pow2_re(mv[MV_X] << 1, xdec as u32) as isize;
            let pmvy = div_pow2_re(mv[MV_Y] << 1, ydec as u32) as isize;
            let pbx = (bx + (1 << xdec) - 1) & !((1 << xdec) - 1);
            let pby = (by + (1 << ydec) - 1) & !((1 << ydec) - 1);
            let dx = ((pbx << 1) >> xdec) + pmvx;
            let dy = ((pby << 1) >> ydec) + pmvy;
            let sad = self.state_sad8(pli, pbx, pby, log_mvb_sz + 2, |i, j| {
                refp.clamped(dx + (i << 1), dy + (j << 1)).into()
            });
            ret += if pli == Y_C { sad } else { sad >> CHROMA_SCALE };
        }
        ret
    }

    /// SAD of the mesh-predicted block anchored at `(vx, vy)`.
    pub fn sad8(
        &self,
        grid: &MvGrid,
        vx: isize,
        vy: isize,
        oc: usize,
        s: usize,
        log_mvb_sz: usize,
    ) -> i32 {
        let mut pred: PredBuf = [[0; MAX_BLK_SIZE]; MAX_BLK_SIZE];
        let mut ret = 0;
        for pli in 0..self.nplanes {
            pred_block(
                &mut pred,
                &self.reference.planes[pli],
                grid,
                vx,
                vy,
                oc,
                s,
                log_mvb_sz,
            );
            let sad = self.state_sad8(pli, (vx - 2) << 2, (vy - 2) << 2, log_mvb_sz + 2, |i, j| {
                pred[j as usize][i as usize]
            });
            ret += if pli == Y_C { sad } else { sad >> CHROMA_SCALE };
        }
        ret
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::ChromaSampling;
    use interpolate_name::interpolate_test;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn random_frame<T: Pixel>(w: usize, h: usize, max: u16) -> Frame<T> {
        let mut ra = ChaChaRng::from_seed([7; 32]);
        let mut f = Frame::new(w, h, ChromaSampling::Cs420);
        for p in f.planes.iter_mut() {
            for v in p.data.iter_mut() {
                *v = T::cast_from(ra.gen_range(0, max));
            }
        }
        f
    }

    fn shifted<T: Pixel>(f: &Frame<T>, dx: usize) -> Frame<T> {
        let mut s = f.clone();
        for p in s.planes.iter_mut() {
            let w = p.cfg.width;
            for y in 0..p.cfg.height {
                let row = p.row_mut(y);
                for x in (0..w).rev() {
                    row[x] = if x >= dx { row[x - dx] } else { row[0] };
                }
            }
        }
        s
    }

    fn bma_identical<T: Pixel>(max: u16) {
        let f: Frame<T> = random_frame(64, 64, max);
        let up = f.upsample();
        let src = MeSource::new(&f, &up, true);
        for &(bx, by) in [(0, 0), (16, 8), (32, 32), (-8, -8), (56, 60)].iter() {
            assert_eq!(src.bma_sad8(bx, by, [0, 0], 2), 0);
            assert_eq!(src.bma_sad8(bx, by, [0, 0], 0), 0);
        }
        assert!(src.bma_sad8(16, 16, [3, 1], 2) > 0);
    }

    #[interpolate_test(u8, 8)]
    #[interpolate_test(u16, 10)]
    fn bma_identical_reference(bit_depth: u32) {
        let max = 1u16 << bit_depth;
        if bit_depth > 8 {
            bma_identical::<u16>(max);
        } else {
            bma_identical::<u8>(max);
        }
    }

    #[test]
    fn bma_finds_integer_shift() {
        let f: Frame<u8> = random_frame(64, 64, 256);
        /* the input is the reference moved 2 luma pixels right */
        let moved = shifted(&f, 2);
        let up = f.upsample();
        let src = MeSource::new(&moved, &up, false);
        assert_eq!(src.bma_sad8(16, 16, [-2, 0], 2), 0);
        assert!(src.bma_sad8(16, 16, [0, 0], 2) > 0);
    }

    #[test]
    fn clipped_blocks_are_empty() {
        let f: Frame<u8> = random_frame(16, 16, 256);
        let up = f.upsample();
        let src = MeSource::new(&f, &up, true);
        /* entirely left of the picture */
        assert_eq!(src.bma_sad8(-16, 0, [5, 5], 2), 0);
        /* entirely below */
        assert_eq!(src.bma_sad8(0, 16, [5, 5], 1), 0);
    }

    #[test]
    fn mesh_sad_of_zero_field() {
        let f: Frame<u8> = random_frame(32, 32, 256);
        let up = f.upsample();
        let src = MeSource::new(&f, &up, true);
        let grid = MvGrid::new(2, 2).unwrap();
        assert_eq!(src.sad8(&grid, 2, 2, 0, 3, 2), 0);
        assert_eq!(src.sad8(&grid, 3, 3, 0, 3, 0), 0);
        assert_eq!(src.sad8(&grid, 0, 0, 0, 3, 2), 0);
    }
}
