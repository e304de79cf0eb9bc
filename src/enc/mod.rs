pub(crate) mod check;
pub(crate) mod cost;
pub(crate) mod decimate;
pub(crate) mod heap;
pub(crate) mod pattern;
pub(crate) mod refine;
pub mod sad;
pub(crate) mod search;
pub(crate) mod stats;
pub(crate) mod subpel;
pub(crate) mod tbl;

use super::api::frame::*;
use super::api::*;
use super::com::mesh::*;
use super::com::tracer::*;
use super::com::*;

use heap::DecHeap;
use refine::DpNode;
use sad::MeSource;

use log::*;

/* accelerated predictor weights, 16.16 */
pub(crate) const MVAPW_CUR: i64 = 0x20000;
pub(crate) const MVAPW_PREV: i64 = 0x10000;

/*****************************************************************************
 * estimator state of one mesh vertex that a decoder never needs
 *****************************************************************************/
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MvNode {
    /* full-pel history for the predictive search, [time][ref][component] */
    pub(crate) mvs: [[[i32; 2]; NREFS]; MV_HIST],
    /* estimated rate of this vector */
    pub(crate) mv_rate: i32,
    /* setup of the block with this vertex at its top-left */
    pub(crate) log_mvb_sz: usize,
    pub(crate) oc: usize,
    pub(crate) s: usize,
    pub(crate) sad: i32,
    /* block matching SAD of the initial search */
    pub(crate) bma_sad: i32,
    /* distortion and rate change of decimating this vertex */
    pub(crate) dd: i32,
    pub(crate) dr: i32,
    pub(crate) heapi: Option<usize>,
    pub(crate) vx: isize,
    pub(crate) vy: isize,
}

/* SADs of every block of one size under the 4 split states */
#[derive(Debug, Clone, Default)]
pub(crate) struct SadCache {
    stride: usize,
    data: Vec<[i32; 4]>,
}

impl SadCache {
    fn new(w: usize, h: usize) -> Result<Self, MeshError> {
        Ok(SadCache {
            stride: w,
            data: try_vec(w * h, [0; 4], "sad cache")?,
        })
    }

    #[inline]
    pub(crate) fn get(&self, bx: isize, by: isize) -> &[i32; 4] {
        &self.data[by as usize * self.stride + bx as usize]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, bx: isize, by: isize) -> &mut [i32; 4] {
        &mut self.data[by as usize * self.stride + bx as usize]
    }
}

pub(crate) fn try_vec<T: Clone>(n: usize, v: T, what: &'static str) -> Result<Vec<T>, MeshError> {
    let mut data = Vec::new();
    data.try_reserve_exact(n)
        .map_err(|_| MeshError::OutOfMemory(what))?;
    data.resize(n, v);
    Ok(data)
}

/// Occlusion corner of the `log_mvb_sz` block anchored at `(vx, vy)`: the
/// corner it shares with the centre of its parent.
#[inline]
pub(crate) fn block_oc(vx: isize, vy: isize, log_mvb_sz: usize) -> usize {
    let mask = (1 << (log_mvb_sz + 1)) - 1;
    let oc = (vx & mask != 0) as usize;
    if vy & mask != 0 {
        3 - oc
    } else {
        oc
    }
}

pub(crate) struct MvEstCtx {
    pub(crate) cfg: EstimatorConfig,
    pub(crate) grid: MvGrid,
    pub(crate) nodes: Vec<MvNode>,
    /* SAD of log 0 and log 1 blocks by split state, for decimation */
    pub(crate) sad_cache: [SadCache; 2],
    /* viterbi trellis of the refinement */
    pub(crate) dp_nodes: Vec<DpNode>,
    pub(crate) heap: DecHeap,
    /* undecimated vertices of each row and column */
    pub(crate) row_counts: Vec<u32>,
    pub(crate) col_counts: Vec<u32>,
    /* SAD below which set A is accepted, by block size */
    pub(crate) thresh1: [i32; 3],
    pub(crate) thresh2_offs: [i32; 3],
    pub(crate) mvapw: [[i64; 2]; NREFS],
    /* vectors tested by the current search */
    pub(crate) hit_cache: Box<[[u8; 64]; 64]>,
    pub(crate) hit_bit: u8,
    pub(crate) lambda: i32,
    pub(crate) flags: McFlags,
    /* picture padded to whole macroblocks */
    pub(crate) frame_width: isize,
    pub(crate) frame_height: isize,
    pub(crate) nhmvbs: isize,
    pub(crate) nvmvbs: isize,
    /* sub-pel rollback copy of the mesh and the node costs */
    pub(crate) refine_grid: MvGrid,
    pub(crate) refine_costs: Vec<(i32, i32)>,
    pub(crate) tracer: Option<Tracer>,
}

impl MvEstCtx {
    pub(crate) fn new(cfg: &EstimatorConfig) -> Result<Self, MeshError> {
        cfg.validate()?;
        let nhmbs = cfg.nhmbs();
        let nvmbs = cfg.nvmbs();
        let grid = MvGrid::new(nhmbs, nvmbs)?;
        let nhmvbs = grid.nhmvbs();
        let nvmvbs = grid.nvmvbs();
        let npts = ((nhmvbs + 1) * (nvmvbs + 1)) as usize;

        let mut nodes = try_vec(npts, MvNode::default(), "mesh nodes")?;
        for (i, node) in nodes.iter_mut().enumerate() {
            node.vx = i as isize % (nhmvbs + 1);
            node.vy = i as isize / (nhmvbs + 1);
        }

        let sad_cache = [
            SadCache::new(nhmvbs as usize, nvmvbs as usize)?,
            SadCache::new((nhmvbs >> 1) as usize, (nvmvbs >> 1) as usize)?,
        ];
        let ndp = std::cmp::max(nhmvbs, nvmvbs) as usize + 2;

        #[cfg(feature = "trace")]
        let tracer = OPEN_TRACE();
        #[cfg(not(feature = "trace"))]
        let tracer = None;

        Ok(MvEstCtx {
            cfg: *cfg,
            refine_grid: grid.clone(),
            grid,
            nodes,
            sad_cache,
            dp_nodes: try_vec(ndp, DpNode::default(), "refinement trellis")?,
            heap: DecHeap::new(npts)?,
            row_counts: try_vec(nvmvbs as usize + 1, 0, "row counts")?,
            col_counts: try_vec(nhmvbs as usize + 1, 0, "column counts")?,
            thresh1: [0; 3],
            thresh2_offs: [0; 3],
            mvapw: [[0; 2]; NREFS],
            hit_cache: Box::new([[0; 64]; 64]),
            hit_bit: 0,
            lambda: cfg.lambda,
            flags: cfg.flags,
            frame_width: (nhmbs << LOG_MBSIZE) as isize,
            frame_height: (nvmbs << LOG_MBSIZE) as isize,
            nhmvbs,
            nvmvbs,
            refine_costs: try_vec(npts, (0, 0), "refinement snapshot")?,
            tracer,
        })
    }

    #[inline]
    pub(crate) fn node_idx(&self, vx: isize, vy: isize) -> usize {
        self.grid.idx(vx, vy)
    }

    #[inline]
    pub(crate) fn node(&self, vx: isize, vy: isize) -> &MvNode {
        &self.nodes[self.grid.idx(vx, vy)]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, vx: isize, vy: isize) -> &mut MvNode {
        let i = self.grid.idx(vx, vy);
        &mut self.nodes[i]
    }

    fn check_geometry<T: Pixel>(&self, input: &Frame<T>, reference: &Frame<T>) -> Result<(), MeshError> {
        if input.width() != self.cfg.width || input.height() != self.cfg.height {
            return Err(MeshError::FrameMismatch(format!(
                "input is {}x{}, estimator expects {}x{}",
                input.width(),
                input.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }
        if input.chroma_sampling != self.cfg.chroma_sampling
            || reference.chroma_sampling != self.cfg.chroma_sampling
        {
            return Err(MeshError::FrameMismatch(format!(
                "chroma sampling {:?}/{:?}, estimator expects {:?}",
                input.chroma_sampling, reference.chroma_sampling, self.cfg.chroma_sampling
            )));
        }
        for pli in 0..input.nplanes() {
            let ip = &input.planes[pli].cfg;
            let rp = &reference.planes[pli].cfg;
            if rp.width != ip.width << 1 || rp.height != ip.height << 1 {
                return Err(MeshError::FrameMismatch(format!(
                    "plane {} of the reference is {}x{}, expected the 2x upsampled {}x{}",
                    pli,
                    rp.width,
                    rp.height,
                    ip.width << 1,
                    ip.height << 1
                )));
            }
        }
        Ok(())
    }

    /* lambda and the search thresholds, scaled to the planes in the SAD */
    fn setup_costs<T: Pixel>(&mut self, input: &Frame<T>) {
        let lambda = self.cfg.lambda;
        let luma = &input.planes[Y_C].cfg;
        let dec = (luma.xdec + luma.ydec) as u32;
        self.lambda = lambda >> dec;
        self.thresh1 = [16 >> dec, 64 >> dec, 256 >> dec];
        if self.flags.contains(McFlags::USE_CHROMA) {
            for pli in 1..input.nplanes() {
                let p = &input.planes[pli].cfg;
                let dec = (p.xdec + p.ydec) as u32 + CHROMA_SCALE;
                self.lambda += lambda >> dec;
                self.thresh1[0] += 16 >> dec;
                self.thresh1[1] += 64 >> dec;
                self.thresh1[2] += 256 >> dec;
            }
        }
        for i in 0..3 {
            self.thresh2_offs[i] = self.thresh1[i] >> 1;
        }
    }

    /* clears the per-frame state; the vector history and the block matching
    SADs carry over to the next frame */
    fn reset_frame(&mut self) {
        self.grid.reset();
        for node in self.nodes.iter_mut() {
            node.mv_rate = 0;
            node.sad = 0;
            node.dd = 0;
            node.dr = 0;
            node.heapi = None;
            node.log_mvb_sz = 0;
            node.oc = 0;
            node.s = 0;
        }
        self.heap.clear();
    }

    pub(crate) fn estimate<T: Pixel>(
        &mut self,
        input: &Frame<T>,
        reference: &Frame<T>,
        ref_kind: RefKind,
        mut observer: Option<&mut dyn MeshObserver>,
    ) -> Result<EstimateSummary, MeshError> {
        self.check_geometry(input, reference)?;
        let src = MeSource::new(
            input,
            reference,
            self.flags.contains(McFlags::USE_CHROMA),
        );
        let r = ref_kind as usize;
        let mut summary = EstimateSummary::default();

        self.setup_costs(input);
        self.mvapw[r] = [MVAPW_CUR, MVAPW_PREV];
        self.reset_frame();

        summary.searched = self.init_mvs(&src, r);
        debug!("initial search: {} vertices", summary.searched);
        if let Some(o) = observer.as_mut() {
            o.post_search(&self.grid);
        }

        summary.decimated = self.decimate(&src);
        summary.check_errors += self.check_rd_state(&src, 2);
        debug!(
            "decimation: {} vertices removed, {} left",
            summary.decimated,
            self.grid.nvalid()
        );
        if let Some(o) = observer.as_mut() {
            o.post_decimation(&self.grid);
        }

        let cost_thresh = -((self.nhmvbs * self.nvmvbs) as i32) << LAMBDA_SCALE;
        loop {
            let dcost = self.refine(&src, 3, 2);
            summary.fullpel_dcost += dcost as i64;
            if dcost >= cost_thresh {
                break;
            }
        }
        summary.check_errors += self.check_rd_state(&src, 2);
        debug!("full-pel refinement: dcost {}", summary.fullpel_dcost);

        summary.subpel_dcost = self.subpel_refine(&src, r, cost_thresh);
        summary.check_errors += self.check_rd_state(&src, self.grid.mv_res);
        summary.mv_res = self.grid.mv_res;
        debug!(
            "sub-pel refinement: dcost {}, 1/{} pel",
            summary.subpel_dcost,
            1 << (MV_FRAC_BITS - summary.mv_res as u32)
        );
        if let Some(o) = observer.as_mut() {
            o.post_refinement(&self.grid);
        }

        summary.valid = self.grid.nvalid();
        summary.labels = self.label_stats();
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    pub(crate) fn random_frame(w: usize, h: usize, seed: u8) -> Frame<u8> {
        let mut ra = ChaChaRng::from_seed([seed; 32]);
        let mut f = Frame::new(w, h, ChromaSampling::Cs420);
        for p in f.planes.iter_mut() {
            for v in p.data.iter_mut() {
                *v = ra.gen();
            }
        }
        f
    }

    /* low frequency texture so block matching has a gradient to follow */
    pub(crate) fn smooth_frame(w: usize, h: usize) -> Frame<u8> {
        let mut f = Frame::new(w, h, ChromaSampling::Cs420);
        for p in f.planes.iter_mut() {
            let (xdec, ydec) = (p.cfg.xdec, p.cfg.ydec);
            for y in 0..p.cfg.height {
                let row = p.row_mut(y);
                for (x, v) in row.iter_mut().enumerate() {
                    let fx = ((x << xdec) as f64 / 7.0).sin();
                    let fy = ((y << ydec) as f64 / 9.0).cos();
                    *v = (128.0 + 60.0 * fx + 50.0 * fy) as u8;
                }
            }
        }
        f
    }

    /* content moved dx pixels right, the left edge repeated */
    pub(crate) fn shift_right(f: &Frame<u8>, dx: usize) -> Frame<u8> {
        let mut s = f.clone();
        for (pli, p) in s.planes.iter_mut().enumerate() {
            let d = dx >> f.planes[pli].cfg.xdec;
            let w = p.cfg.width;
            for y in 0..p.cfg.height {
                let row = p.row_mut(y);
                for x in (0..w).rev() {
                    row[x] = if x >= d { row[x - d] } else { row[0] };
                }
            }
        }
        s
    }

    #[derive(Default)]
    struct Snapshots {
        search: Option<MvGrid>,
        decimation: Option<MvGrid>,
        refinement: Option<MvGrid>,
    }

    impl MeshObserver for Snapshots {
        fn post_search(&mut self, grid: &MvGrid) {
            self.search = Some(grid.clone());
        }
        fn post_decimation(&mut self, grid: &MvGrid) {
            self.decimation = Some(grid.clone());
        }
        fn post_refinement(&mut self, grid: &MvGrid) {
            self.refinement = Some(grid.clone());
        }
    }

    fn pts(grid: &MvGrid) -> Vec<MvGridPt> {
        grid.iter().map(|(_, _, pt)| *pt).collect()
    }

    #[test]
    fn block_oc_faces_parent_centre() {
        assert_eq!(block_oc(0, 0, 0), 0);
        assert_eq!(block_oc(1, 0, 0), 1);
        assert_eq!(block_oc(1, 1, 0), 2);
        assert_eq!(block_oc(0, 1, 0), 3);
        assert_eq!(block_oc(2, 0, 1), 1);
        assert_eq!(block_oc(4, 4, 1), 0);
    }

    #[test]
    fn rejects_mismatched_frames() {
        let cfg = EstimatorConfig::new(32, 32, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let f = random_frame(32, 32, 1);
        /* reference not upsampled */
        assert!(est.estimate(&f, &f, RefKind::Previous, None).is_err());
        let g = random_frame(48, 32, 1);
        let up = g.upsample();
        assert!(est.estimate(&g, &up, RefKind::Previous, None).is_err());
    }

    #[test]
    fn identical_reference_keeps_zero_mesh() {
        let cfg = EstimatorConfig::new(64, 48, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let f = random_frame(64, 48, 3);
        let up = f.upsample();
        let mut snaps = Snapshots::default();
        let summary = est
            .estimate(&f, &up, RefKind::Previous, Some(&mut snaps))
            .unwrap();

        let search = snaps.search.unwrap();
        assert!(search.iter().all(|(_, _, pt)| pt.mv == [0, 0]));
        for vy in 2..=est.nvmvbs - 2 {
            for vx in 2..=est.nhmvbs - 2 {
                if mc_level(vx, vy) <= 3 {
                    assert_eq!(est.node(vx, vy).bma_sad, 0);
                }
            }
        }

        /* only the level 0 vertices survive */
        let decimation = snaps.decimation.unwrap();
        for (vx, vy, pt) in decimation.iter() {
            assert_eq!(pt.valid, mc_level(vx, vy) == 0, "({}, {})", vx, vy);
        }

        let refinement = snaps.refinement.unwrap();
        assert_eq!(pts(&decimation), pts(&refinement));
        assert_eq!(summary.fullpel_dcost, 0);
        assert_eq!(summary.check_errors, 0);
        assert_eq!(summary.valid, 6 * 5);
        assert_eq!(summary.mv_res, 0);
    }

    #[test]
    fn integer_shift_is_found() {
        let cfg = EstimatorConfig::new(96, 96, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let reference = smooth_frame(96, 96);
        let input = shift_right(&reference, 2);
        let up = reference.upsample();
        let mut snaps = Snapshots::default();
        let summary = est
            .estimate(&input, &up, RefKind::Previous, Some(&mut snaps))
            .unwrap();

        let search = snaps.search.unwrap();
        assert_eq!(search[(12, 12)].mv, [-16, 0]);
        assert_eq!(search[(10, 10)].mv, [-16, 0]);
        assert_eq!(est.node(12, 12).mvs[0][0], [-2, 0]);

        let grid = est.grid.clone();
        assert!(grid[(12, 12)].valid);
        assert!((grid[(12, 12)].mv[0] + 16).abs() <= 2);
        assert!(grid[(12, 12)].mv[1].abs() <= 2);
        assert_eq!(summary.check_errors, 0);
    }

    #[test]
    fn one_pixel_shift_matches_exactly() {
        /* luma only, since a one pixel move has no whole-sample chroma
        counterpart at 4:2:0 */
        let mut cfg = EstimatorConfig::new(96, 96, ChromaSampling::Cs420);
        cfg.flags = McFlags::USEB;
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let reference = smooth_frame(96, 96);
        let input = shift_right(&reference, 1);
        let up = reference.upsample();
        let mut snaps = Snapshots::default();
        let summary = est
            .estimate(&input, &up, RefKind::Previous, Some(&mut snaps))
            .unwrap();

        let search = snaps.search.unwrap();
        assert_eq!(search[(12, 12)].mv, [-8, 0]);
        assert_eq!(est.node(12, 12).bma_sad, 0);
        assert_eq!(est.node(12, 12).mvs[0][0], [-1, 0]);
        assert_eq!(snaps.decimation.unwrap()[(12, 12)].mv, [-8, 0]);
        assert_eq!(est.grid[(12, 12)].mv, [-8, 0]);
        assert_eq!(summary.check_errors, 0);
    }

    #[test]
    fn history_shifts_between_frames() {
        let cfg = EstimatorConfig::new(64, 64, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let reference = smooth_frame(64, 64);
        let input = shift_right(&reference, 2);
        let up = reference.upsample();
        est.estimate(&input, &up, RefKind::Golden, None).unwrap();
        let first = est.node(8, 8).mvs[0][1];
        est.estimate(&input, &up, RefKind::Golden, None).unwrap();
        assert_eq!(est.node(8, 8).mvs[1][1], first);
        /* the other reference is untouched */
        assert_eq!(est.node(8, 8).mvs[1][0], [0, 0]);
    }
}
