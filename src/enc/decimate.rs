use super::tbl::*;
use super::*;

use log::*;

/* corners opposite the decimated vertex across each of its 4 blocks */
static CDX: [isize; 4] = [-1, 1, -1, 1];
static CDY: [isize; 4] = [-1, -1, 1, 1];

impl MvEstCtx {
    /* levels at or below level_max start out valid */
    pub(crate) fn init_nodes(&mut self) {
        let level_min = self.cfg.level_min as usize;
        let level_max = self.cfg.level_max as usize;
        let (etype, ebits) = if self.flags.contains(McFlags::USEV) {
            if self.flags.contains(McFlags::USEB) {
                (false, 3)
            } else {
                (true, 0)
            }
        } else {
            (false, 0)
        };
        let nhmvbs = self.nhmvbs;
        let nvmvbs = self.nvmvbs;
        for c in self.row_counts.iter_mut() {
            *c = 0;
        }
        for c in self.col_counts.iter_mut() {
            *c = 0;
        }
        for vy in 0..=nvmvbs {
            for vx in 0..=nhmvbs {
                let level = mc_level(vx, vy);
                if level > level_max {
                    self.grid[(vx, vy)].valid = false;
                    continue;
                }
                let pt = &mut self.grid[(vx, vy)];
                pt.valid = true;
                pt.right = etype;
                pt.down = etype;
                self.row_counts[vy as usize] += 1;
                self.col_counts[vx as usize] += 1;
                let node = self.node_mut(vx, vy);
                /* vertices between the level limits pay about 2 bits to
                flag their children */
                node.dr = -(node.mv_rate + (((level_min <= level && level < level_max) as i32) << 1));
                /* even levels bring new edge labels, one fewer on the
                frame border */
                if level & 1 == 0 && vx >= 2 && vx <= nhmvbs - 2 && vy >= 2 && vy <= nvmvbs - 2 {
                    if vx > 2 && vx < nhmvbs - 2 && vy > 2 && vy < nvmvbs - 2 {
                        node.dr -= ebits;
                    } else {
                        node.dr -= (ebits + 1) >> 1;
                    }
                }
            }
        }
    }

    /* SADs of every block at every scale and split state */
    fn calc_sads<T: Pixel>(&mut self, src: &MeSource<T>) {
        let level_min = self.cfg.level_min;
        let level_max = self.cfg.level_max;
        let mut nhmvbs = self.nhmvbs;
        let mut nvmvbs = self.nvmvbs;
        if level_max >= 3 {
            for vy in 0..nvmvbs {
                for vx in 0..nhmvbs {
                    let oc = block_oc(vx, vy, 0);
                    let (s, sad) = if level_max >= 4 {
                        let mut sads = [0; 4];
                        for (s, sad) in sads.iter_mut().enumerate() {
                            *sad = src.sad8(&self.grid, vx, vy, oc, s, 0);
                        }
                        *self.sad_cache[0].get_mut(vx, vy) = sads;
                        (3, sads[3])
                    } else {
                        (0, src.sad8(&self.grid, vx, vy, oc, 0, 0))
                    };
                    let node = self.node_mut(vx, vy);
                    node.oc = oc;
                    node.log_mvb_sz = 0;
                    node.s = s;
                    node.sad = sad;
                }
            }
        }
        nhmvbs >>= 1;
        nvmvbs >>= 1;
        if level_max >= 1 {
            if level_min < 3 {
                for vy in 0..nvmvbs {
                    for vx in 0..nhmvbs {
                        let oc = block_oc(vx, vy, 0);
                        if level_max >= 2 {
                            let mut sads = [0; 4];
                            for (s, sad) in sads.iter_mut().enumerate() {
                                *sad = src.sad8(&self.grid, vx << 1, vy << 1, oc, s, 1);
                            }
                            *self.sad_cache[1].get_mut(vx, vy) = sads;
                            if level_max <= 2 {
                                let node = self.node_mut(vx << 1, vy << 1);
                                node.oc = oc;
                                node.s = 3;
                                node.log_mvb_sz = 1;
                                node.sad = sads[3];
                            }
                        } else {
                            let sad = src.sad8(&self.grid, vx << 1, vy << 1, oc, 0, 1);
                            let node = self.node_mut(vx << 1, vy << 1);
                            node.oc = oc;
                            node.s = 0;
                            node.log_mvb_sz = 1;
                            node.sad = sad;
                        }
                    }
                }
            }
        } else {
            nhmvbs >>= 1;
            nvmvbs >>= 1;
            for vy in 0..nvmvbs {
                for vx in 0..nhmvbs {
                    let sad = src.sad8(&self.grid, vx << 2, vy << 2, 0, 3, 2);
                    let node = self.node_mut(vx << 2, vy << 2);
                    node.oc = 0;
                    node.s = 3;
                    node.log_mvb_sz = 2;
                    node.sad = sad;
                }
            }
        }
    }

    /* walks the merge domain of (vx, vy), in range and up to level_max,
    finest vertices first and ending with (vx, vy) itself */
    fn merge_domain(&self, vx: isize, vy: isize, dlev: usize) -> impl Iterator<Item = (isize, isize)> + '_ {
        let level_max = self.cfg.level_max as usize;
        MERGEDOM[mc_level(vx, vy) - 1 + (dlev << 1)]
            .iter()
            .map(move |&(dx, dy)| (vx + (dx << dlev), vy + (dy << dlev)))
            .filter(move |&(mx, my)| self.grid.in_bounds(mx, my) && mc_level(mx, my) <= level_max)
    }

    /* split state of the block anchored at (bx, by) from the validity of
    the corners it may split */
    pub(crate) fn block_split(&self, bx: isize, by: isize, oc: usize, log_mvb_sz: usize) -> usize {
        let c1 = (oc + 1) & 3;
        let c3 = (oc + 3) & 3;
        let s1 = self.grid.is_valid(bx + (VERT_DX[c1] << log_mvb_sz), by + (VERT_DY[c1] << log_mvb_sz));
        let s3 = self.grid.is_valid(bx + (VERT_DX[c3] << log_mvb_sz), by + (VERT_DY[c3] << log_mvb_sz));
        s1 as usize | (s3 as usize) << 1
    }

    /* distortion and rate change of decimating (vx, vy) alone; queues it */
    fn init_du<T: Pixel>(&mut self, src: &MeSource<T>, vx: isize, vy: isize) {
        let level_max = self.cfg.level_max as usize;
        let dlev = (level_max <= 2) as usize;
        let log_min = (5 - level_max) >> 1;
        let level = mc_level(vx, vy);
        let errdom = ERRDOM[level - 1 + (dlev << 1)];
        let (nhmvbs, nvmvbs) = (self.nhmvbs, self.nvmvbs);
        let in_blocks = move |dvx: isize, dvy: isize| dvx >= 0 && dvy >= 0 && dvx < nhmvbs && dvy < nvmvbs;

        /* the error before decimation */
        let mut dd = 0;
        for e in errdom.iter() {
            let dvx = vx + (e.dx << dlev);
            let dvy = vy + (e.dy << dlev);
            if !in_blocks(dvx, dvy) || e.log_mvb_sz + dlev < log_min {
                continue;
            }
            let mvb = 1 << e.log_mvb_sz;
            for dy in 0..mvb {
                for dx in 0..mvb {
                    dd -= self.node(dvx + (dx << dlev), dvy + (dy << dlev)).sad;
                }
            }
        }

        let merged: Vec<(isize, isize)> = self.merge_domain(vx, vy, dlev).collect();
        let mut dr = self.node(vx, vy).dr;
        for &(mx, my) in merged.iter() {
            self.grid[(mx, my)].valid = false;
            if (mx, my) != (vx, vy) {
                dr += self.node(mx, my).dr;
            }
        }

        /* the error after */
        for e in errdom.iter() {
            let dvx = vx + (e.dx << dlev);
            let dvy = vy + (e.dy << dlev);
            let log = e.log_mvb_sz + dlev;
            if !in_blocks(dvx, dvy) || log < log_min {
                continue;
            }
            if log < 2 {
                let oc = block_oc(dvx, dvy, log);
                let s = self.block_split(dvx, dvy, oc, log);
                dd += self.sad_cache[log].get(dvx >> log, dvy >> log)[s];
            } else {
                /* top level blocks are never split, their SAD lives in
                the otherwise unused dd of the anchor */
                let sad = src.sad8(&self.grid, dvx, dvy, 0, 3, 2);
                self.node_mut(dvx, dvy).dd = sad;
                dd += sad;
            }
        }

        for &(mx, my) in merged.iter() {
            self.grid[(mx, my)].valid = true;
        }
        let ni = self.node_idx(vx, vy);
        let node = &mut self.nodes[ni];
        node.dd = dd;
        node.dr = dr;
        trace!("du ({}, {}): dd {} dr {}", vx, vy, dd, dr);
        self.heap.push_unordered(&mut self.nodes, ni);
    }

    /* queues every decimatable vertex, finest levels last since each
    level's rate sums the levels below it */
    fn init_dus<T: Pixel>(&mut self, src: &MeSource<T>) {
        let nhmvbs = self.nhmvbs;
        let nvmvbs = self.nvmvbs;
        let level_min = self.cfg.level_min;
        let level_max = self.cfg.level_max;
        self.init_nodes();
        self.calc_sads(src);
        self.heap.clear();
        if level_max >= 1 {
            if level_min < 1 {
                for vy in (2..=nvmvbs).step_by(4) {
                    for vx in (2..=nhmvbs).step_by(4) {
                        self.init_du(src, vx, vy);
                    }
                }
            }
            if level_max >= 2 {
                if level_min < 2 {
                    let mut vy = 0;
                    loop {
                        for vx in (2..=nhmvbs).step_by(4) {
                            self.init_du(src, vx, vy);
                        }
                        vy += 2;
                        if vy > nvmvbs {
                            break;
                        }
                        for vx in (0..=nhmvbs).step_by(4) {
                            self.init_du(src, vx, vy);
                        }
                        vy += 2;
                    }
                }
                if level_max >= 3 {
                    if level_min < 3 {
                        for vy in (1..=nvmvbs).step_by(2) {
                            for vx in (1..=nhmvbs).step_by(2) {
                                self.init_du(src, vx, vy);
                            }
                        }
                    }
                    if level_max >= 4 && level_min < 4 {
                        let mut vy = 0;
                        loop {
                            for vx in (1..=nhmvbs).step_by(2) {
                                self.init_du(src, vx, vy);
                            }
                            vy += 1;
                            if vy > nvmvbs {
                                break;
                            }
                            for vx in (0..=nhmvbs).step_by(2) {
                                self.init_du(src, vx, vy);
                            }
                            vy += 1;
                        }
                    }
                }
            }
        }
        self.heap.heapify(&mut self.nodes);
    }

    /* applies a dd change to a vertex and all its ancestors */
    fn add_dd_with_ancestors(&mut self, cx: isize, cy: isize, ddd: i32) {
        let ci = self.node_idx(cx, cy);
        let (dd, dr) = (self.nodes[ci].dd + ddd, self.nodes[ci].dr);
        self.heap.update(&mut self.nodes, ci, dd, dr);
        for &(ax, ay) in ancestors(cx, cy) {
            let (ax, ay) = (cx + ax, cy + ay);
            if !self.grid.in_bounds(ax, ay) {
                continue;
            }
            let ai = self.node_idx(ax, ay);
            let (dd, dr) = (self.nodes[ai].dd + ddd, self.nodes[ai].dr);
            self.heap.update(&mut self.nodes, ai, dd, dr);
        }
    }

    /* removes one vertex of a merge domain and fixes up the costs and the
    block setups around it */
    fn merge_vertex(&mut self, vx: isize, vy: isize) {
        let mi = self.node_idx(vx, vy);
        let (mdd, mdr) = (self.nodes[mi].dd, self.nodes[mi].dr);
        /* overlapping domains are handled by inclusion-exclusion */
        for &(ax, ay) in ancestors(vx, vy) {
            let (ax, ay) = (vx + ax, vy + ay);
            if !self.grid.in_bounds(ax, ay) {
                continue;
            }
            let ai = self.node_idx(ax, ay);
            let (dd, dr) = (self.nodes[ai].dd - mdd, self.nodes[ai].dr - mdr);
            self.heap.update(&mut self.nodes, ai, dd, dr);
        }
        self.grid[(vx, vy)].valid = false;
        self.heap.remove(&mut self.nodes, mi);
        self.row_counts[vy as usize] -= 1;
        self.col_counts[vx as usize] -= 1;

        let level = mc_level(vx, vy);
        let log = log_mvb_sz(level);
        if level & 1 == 0 {
            /* the 4 blocks around an even vertex only partially belonged
            to the merge domains of their far corners */
            let mask = (1 << (log + 1)) - 1;
            for k in 0..4 {
                let cx = vx + (CDX[k] << log);
                let cy = vy + (CDY[k] << log);
                if !self.grid.in_bounds(cx, cy) {
                    continue;
                }
                let bx = vx + (ERRDOM4[k].dx << log);
                let by = vy + (ERRDOM4[k].dy << log);
                let sads = *self.sad_cache[log].get(bx >> log, by >> log);
                if !self.grid.is_valid(cx, cy) {
                    /* the far corner already went and made the adjustments */
                    let block = self.node_mut(bx, by);
                    block.s = 0;
                    block.sad = sads[0];
                    continue;
                }
                let s = 1 << ((((k + 3) & 3) >> 1) ^ (vx & mask != 0) as usize);
                let block = self.node_mut(bx, by);
                block.s = s;
                block.sad = sads[s];
                let ddd = sads[0] - sads[s ^ 3] + sads[3] - sads[s];
                /* constant motion */
                if ddd == 0 {
                    continue;
                }
                self.add_dd_with_ancestors(cx, cy, ddd);
                /* and back out of the interior corner */
                let (ix, iy) = if vx & mask != 0 { (vx, cy) } else { (cx, vy) };
                self.add_dd_with_ancestors(ix, iy, -ddd);
            }
        } else {
            /* the smaller blocks gave way to one larger block */
            let bx = vx - (1 << log);
            let by = vy - (1 << log);
            let log = log + 1;
            let oc = block_oc(bx, by, log);
            let sad = if log < 2 {
                self.sad_cache[log].get(bx >> log, by >> log)[3]
            } else {
                self.node(bx, by).dd
            };
            let block = self.node_mut(bx, by);
            block.log_mvb_sz = log;
            block.oc = oc;
            block.s = 3;
            block.sad = sad;
        }
    }

    /* pops the best candidate and removes its merge domain if that lowers
    the cost; returns how many vertices went, or None once nothing pays */
    fn decimate_step(&mut self, dlev: usize) -> Option<usize> {
        let di = self.heap.pop(&mut self.nodes)?;
        let dec = self.nodes[di];
        if dec.dr * self.lambda + (dec.dd << LAMBDA_SCALE) > 0 {
            return None;
        }
        #[cfg(feature = "trace_me")]
        TRACE_DECIMATE(&mut self.tracer, dec.vx, dec.vy, dec.dd, dec.dr);
        let merged: Vec<(isize, isize)> = self.merge_domain(dec.vx, dec.vy, dlev).collect();
        let mut n = 0;
        for (mx, my) in merged {
            if !self.grid.is_valid(mx, my) {
                continue;
            }
            self.merge_vertex(mx, my);
            n += 1;
        }
        Some(n)
    }

    /// Stage 2: greedily removes the vertex with the best distortion to
    /// rate slope while that lowers the cost. Returns the number of
    /// vertices removed.
    pub(crate) fn decimate<T: Pixel>(&mut self, src: &MeSource<T>) -> usize {
        self.init_dus(src);
        let dlev = (self.cfg.level_max <= 2) as usize;
        let mut decimated = 0;
        while let Some(n) = self.decimate_step(dlev) {
            decimated += n;
        }
        decimated
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enc::test::*;
    use pretty_assertions::assert_eq;

    fn setup(cfg: &EstimatorConfig, input: &Frame<u8>, up: &Frame<u8>) -> MvEstCtx {
        let mut est = MvEstCtx::new(cfg).unwrap();
        let src = MeSource::new(input, up, true);
        est.setup_costs(input);
        est.reset_frame();
        est.init_mvs(&src, 0);
        est
    }

    #[test]
    fn init_nodes_labels_and_counts() {
        let mut cfg = EstimatorConfig::new(32, 32, ChromaSampling::Cs420);
        cfg.flags = McFlags::USEB | McFlags::USEV;
        cfg.level_max = 2;
        let f = random_frame(32, 32, 1);
        let up = f.upsample();
        let mut est = setup(&cfg, &f, &up);
        est.init_nodes();
        /* 12x12 grid, levels 0-2 on even coordinates */
        assert_eq!(est.grid.nvalid(), 7 * 7);
        assert_eq!(est.row_counts[0], 7);
        assert_eq!(est.row_counts[1], 0);
        assert_eq!(est.row_counts[2], 7);
        assert!(!est.grid[(1, 1)].valid);
        assert!(est.grid.iter().all(|(_, _, pt)| !pt.right && !pt.down));
        /* an interior level 2 vertex pays for 3 label bits */
        let n = est.node(4, 6);
        assert_eq!(n.dr, -(n.mv_rate + 3));
        /* level_max vertices carry no child flag */
        cfg.flags = McFlags::USEV;
        let mut est = setup(&cfg, &f, &up);
        est.init_nodes();
        assert!(est.grid[(4, 4)].right);
        let n = est.node(6, 4);
        assert_eq!(n.dr, -n.mv_rate);
    }

    #[test]
    fn initial_block_setup() {
        let cfg = EstimatorConfig::new(32, 32, ChromaSampling::Cs420);
        let f = random_frame(32, 32, 2);
        let up = f.upsample();
        let mut est = setup(&cfg, &f, &up);
        est.init_nodes();
        let src = MeSource::new(&f, &up, true);
        est.calc_sads(&src);
        let n = est.node(3, 2);
        assert_eq!((n.log_mvb_sz, n.oc, n.s), (0, 1, 0));
        assert_eq!(n.sad, src.sad8(&est.grid, 3, 2, 1, 0, 0));
        let cached = est.sad_cache[1].get(1, 1)[3];
        assert_eq!(cached, src.sad8(&est.grid, 2, 2, 2, 3, 1));
    }

    #[test]
    fn costs_stay_consistent_through_decimation() {
        for &level_max in [1u8, 2, 3, 4].iter() {
            let mut cfg = EstimatorConfig::new(48, 32, ChromaSampling::Cs420);
            cfg.level_max = level_max;
            let reference = smooth_frame(48, 32);
            let input = shift_right(&random_frame(48, 32, 7), 1);
            let up = reference.upsample();
            let mut est = setup(&cfg, &input, &up);
            let src = MeSource::new(&input, &up, true);
            est.init_nodes();
            let before = est.grid.nvalid();
            let n = est.decimate(&src);
            assert_eq!(est.grid.nvalid(), before - n, "level_max {}", level_max);
            assert_eq!(est.check_rd_state(&src, 2), 0, "level_max {}", level_max);
            /* level 0 is never removed */
            for vy in (0..=est.nvmvbs).step_by(4) {
                for vx in (0..=est.nhmvbs).step_by(4) {
                    assert!(est.grid[(vx, vy)].valid);
                }
            }
            let rows: u32 = est.row_counts.iter().sum();
            assert_eq!(rows as usize, est.grid.nvalid());
        }
    }

    /* distortion of the mesh block at (vx, vy), measured afresh */
    fn mesh_sad(est: &MvEstCtx, src: &MeSource<u8>, vx: isize, vy: isize, log: usize) -> i64 {
        if log > 0 {
            let half = 1 << (log - 1);
            if est.grid.is_valid(vx + half, vy + half) {
                return mesh_sad(est, src, vx, vy, log - 1)
                    + mesh_sad(est, src, vx + half, vy, log - 1)
                    + mesh_sad(est, src, vx, vy + half, log - 1)
                    + mesh_sad(est, src, vx + half, vy + half, log - 1);
            }
        }
        let (oc, s) = if log < 2 {
            let oc = block_oc(vx, vy, log);
            (oc, est.block_split(vx, vy, oc, log))
        } else {
            (0, 3)
        };
        src.sad8(&est.grid, vx, vy, oc, s, log) as i64
    }

    /* full Lagrangian cost of the mesh; bits holds what each vertex costs
    to keep */
    fn mesh_cost(est: &MvEstCtx, src: &MeSource<u8>, bits: &[i32]) -> i64 {
        let mut dist = 0;
        for vy in (0..est.nvmvbs).step_by(4) {
            for vx in (0..est.nhmvbs).step_by(4) {
                dist += mesh_sad(est, src, vx, vy, 2);
            }
        }
        let rate: i64 = est
            .grid
            .iter()
            .filter(|(_, _, pt)| pt.valid)
            .map(|(vx, vy, _)| bits[est.node_idx(vx, vy)] as i64)
            .sum();
        (dist << LAMBDA_SCALE) + rate * est.lambda as i64
    }

    #[test]
    fn accepted_merges_never_raise_cost() {
        for &level_max in [2u8, 3, 4].iter() {
            let mut cfg = EstimatorConfig::new(48, 32, ChromaSampling::Cs420);
            cfg.level_max = level_max;
            let reference = smooth_frame(48, 32);
            let input = shift_right(&reference, 1);
            let up = reference.upsample();
            let mut est = setup(&cfg, &input, &up);
            let src = MeSource::new(&input, &up, true);
            est.init_nodes();
            let bits: Vec<i32> = est.nodes.iter().map(|n| -n.dr).collect();
            est.init_dus(&src);
            let dlev = (level_max <= 2) as usize;
            let mut cost = mesh_cost(&est, &src, &bits);
            let mut merges = 0;
            while est.decimate_step(dlev).is_some() {
                let after = mesh_cost(&est, &src, &bits);
                assert!(
                    after <= cost,
                    "level_max {} merge {}: {} -> {}",
                    level_max,
                    merges,
                    cost,
                    after
                );
                cost = after;
                merges += 1;
            }
            assert!(merges > 0, "level_max {}", level_max);
        }
    }

    #[test]
    fn level_min_bounds_decimation() {
        let mut cfg = EstimatorConfig::new(32, 32, ChromaSampling::Cs420);
        cfg.level_min = 2;
        let f = random_frame(32, 32, 4);
        let up = f.upsample();
        let mut est = setup(&cfg, &f, &up);
        let src = MeSource::new(&f, &up, true);
        est.decimate(&src);
        for (vx, vy, pt) in est.grid.iter() {
            if mc_level(vx, vy) <= 2 {
                assert!(pt.valid, "({}, {})", vx, vy);
            }
        }
    }
}
