use std::ops::{Index, IndexMut};

use super::*;
use crate::api::MeshError;

/// One vertex of the motion vector mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MvGridPt {
    /// Motion vector in 1/8 pel.
    pub mv: [i32; 2],
    /// Decimated vertices stay in place with `valid` cleared.
    pub valid: bool,
    /// Label of the edge to the right, `true` for V.
    pub right: bool,
    /// Label of the edge below, `true` for V.
    pub down: bool,
}

/// The motion vector mesh of a frame.
///
/// Vertices are addressed by `(vx, vy)` in `0..=nhmvbs` by `0..=nvmvbs`.
/// Vertex `(2, 2)` sits on the top-left picture pixel and neighbouring
/// vertices are 4 pixels apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvGrid {
    nhmvbs: isize,
    nvmvbs: isize,
    pts: Vec<MvGridPt>,
    /// Resolution of the vectors: 0 is 1/8 pel, 1 is 1/4 pel, 2 is 1/2 pel.
    pub mv_res: u8,
}

impl MvGrid {
    pub fn new(nhmbs: usize, nvmbs: usize) -> Result<Self, MeshError> {
        let nhmvbs = (nhmbs + 1) * MVBS_PER_MB;
        let nvmvbs = (nvmbs + 1) * MVBS_PER_MB;
        let npts = (nhmvbs + 1) * (nvmvbs + 1);
        let mut pts = Vec::new();
        pts.try_reserve_exact(npts)
            .map_err(|_| MeshError::OutOfMemory("motion vector mesh"))?;
        pts.resize(npts, MvGridPt::default());
        Ok(MvGrid {
            nhmvbs: nhmvbs as isize,
            nvmvbs: nvmvbs as isize,
            pts,
            mv_res: 0,
        })
    }

    #[inline]
    pub fn nhmvbs(&self) -> isize {
        self.nhmvbs
    }

    #[inline]
    pub fn nvmvbs(&self) -> isize {
        self.nvmvbs
    }

    #[inline]
    pub fn in_bounds(&self, vx: isize, vy: isize) -> bool {
        vx >= 0 && vy >= 0 && vx <= self.nhmvbs && vy <= self.nvmvbs
    }

    /// Vertices on the outer two rings never move.
    #[inline]
    pub fn is_border(&self, vx: isize, vy: isize) -> bool {
        vx < 2 || vy < 2 || vx > self.nhmvbs - 2 || vy > self.nvmvbs - 2
    }

    #[inline]
    pub(crate) fn idx(&self, vx: isize, vy: isize) -> usize {
        debug_assert!(self.in_bounds(vx, vy));
        (vy * (self.nhmvbs + 1) + vx) as usize
    }

    #[inline]
    pub fn is_valid(&self, vx: isize, vy: isize) -> bool {
        self[(vx, vy)].valid
    }

    pub fn reset(&mut self) {
        for pt in self.pts.iter_mut() {
            *pt = MvGridPt::default();
        }
        self.mv_res = 0;
    }

    /// Copies another mesh of the same geometry without reallocating.
    pub fn copy_from(&mut self, other: &MvGrid) {
        debug_assert!(self.nhmvbs == other.nhmvbs && self.nvmvbs == other.nvmvbs);
        self.pts.copy_from_slice(&other.pts);
        self.mv_res = other.mv_res;
    }

    pub fn nvalid(&self) -> usize {
        self.pts.iter().filter(|pt| pt.valid).count()
    }

    /// Iterates `(vx, vy, vertex)` in raster order.
    pub fn iter(&self) -> impl Iterator<Item = (isize, isize, &MvGridPt)> + '_ {
        let w = self.nhmvbs + 1;
        self.pts
            .iter()
            .enumerate()
            .map(move |(i, pt)| (i as isize % w, i as isize / w, pt))
    }

    /// Predicted vector of `(vx, vy)` at resolution `mv_res`.
    pub fn predictor(&self, vx: isize, vy: isize, level: usize, mv_res: u8) -> [i32; 2] {
        if self.is_border(vx, vy) {
            return [0, 0];
        }
        let (cns, ncns) = pred_neighbors(vx, vy, level);
        let mut a = [[0i32; 4]; 2];
        for (ci, &(cx, cy)) in cns[..ncns].iter().enumerate() {
            let mv = self[(cx, cy)].mv;
            a[MV_X][ci] = mv[MV_X];
            a[MV_Y][ci] = mv[MV_Y];
        }
        let mut pred = [0; 2];
        for c in 0..2 {
            pred[c] = if ncns > 3 {
                div_pow2_re(median4_sum(&mut a[c]), mv_res as u32 + 1)
            } else {
                div_pow2_re(median3(&mut a[c]), mv_res as u32)
            };
        }
        pred
    }
}

impl Index<(isize, isize)> for MvGrid {
    type Output = MvGridPt;

    #[inline]
    fn index(&self, (vx, vy): (isize, isize)) -> &MvGridPt {
        &self.pts[self.idx(vx, vy)]
    }
}

impl IndexMut<(isize, isize)> for MvGrid {
    #[inline]
    fn index_mut(&mut self, (vx, vy): (isize, isize)) -> &mut MvGridPt {
        let i = self.idx(vx, vy);
        &mut self.pts[i]
    }
}

/// Causal neighbours the predictor of an interior vertex reads.
/// Three or four of them, always inside the mesh.
pub(crate) fn pred_neighbors(vx: isize, vy: isize, level: usize) -> ([(isize, isize); 4], usize) {
    let mvb = 1 << log_mvb_sz(level);
    let mut cns = [(0, 0); 4];
    let mut ncns = 4;
    if level == 0 {
        cns[0] = (vx - 4, vy - 4);
        cns[1] = (vx, vy - 4);
        cns[2] = (vx + 4, vy - 4);
        cns[3] = (vx - 4, vy);
    } else if level & 1 != 0 {
        cns[0] = (vx - mvb, vy - mvb);
        cns[1] = (vx + mvb, vy - mvb);
        cns[2] = (vx - mvb, vy + mvb);
        cns[3] = (vx + mvb, vy + mvb);
    } else {
        cns[0] = (vx, vy - mvb);
        cns[1] = (vx - mvb, vy);
        /* at most one of right and down falls outside the macroblock */
        if vx + mvb > ((vx + 3) & !3) {
            ncns -= 1;
        } else {
            cns[2] = (vx + mvb, vy);
        }
        if vy + mvb > ((vy + 3) & !3) {
            ncns -= 1;
        } else {
            cns[ncns - 1] = (vx, vy + mvb);
        }
    }
    (cns, ncns)
}

/* sum of the middle two of 4 values */
#[inline]
pub(crate) fn median4_sum(a: &mut [i32; 4]) -> i32 {
    sort2(a, 0, 1);
    sort2(a, 2, 3);
    sort2(a, 0, 2);
    sort2(a, 1, 3);
    a[1] + a[2]
}

#[inline]
pub(crate) fn median3(a: &mut [i32; 4]) -> i32 {
    sort2(a, 0, 1);
    sort2(a, 1, 2);
    sort2(a, 0, 1);
    a[1]
}
