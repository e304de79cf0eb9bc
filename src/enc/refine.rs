use std::cmp;

use super::cost::*;
use super::pattern::*;
use super::tbl::*;
use super::*;

use log::*;

/* the centre and the 4 diamond sites */
pub(crate) const DP_NSTATES_MAX: usize = 5;
/* most blocks whose SAD one trellis node changes */
pub(crate) const DP_NBLOCKS_MAX: usize = 8;

/// The direction a trellis runs in. Columns are the transpose of rows:
/// `u` runs along the line and `w` picks the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Row,
    Col,
}

impl Axis {
    #[inline]
    pub(crate) fn pos(self, u: isize, w: isize) -> (isize, isize) {
        match self {
            Axis::Row => (u, w),
            Axis::Col => (w, u),
        }
    }

    /* label of the edge leaving a vertex along the line */
    #[inline]
    fn label(self, pt: &MvGridPt) -> bool {
        match self {
            Axis::Row => pt.right,
            Axis::Col => pt.down,
        }
    }

    #[inline]
    fn set_label(self, pt: &mut MvGridPt, v: bool) {
        match self {
            Axis::Row => pt.right = v,
            Axis::Col => pt.down = v,
        }
    }

    fn predicted(self, level: usize) -> &'static [Offset] {
        match self {
            Axis::Row => ROW_PREDICTED[level],
            Axis::Col => COL_PREDICTED[level],
        }
    }

    fn npred_changeable(self, level: usize) -> usize {
        match self {
            Axis::Row => NROW_PRED_CHANGEABLE[level],
            Axis::Col => NCOL_PRED_CHANGEABLE[level],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrevState {
    pub(crate) si: usize,
    /* the edge from the previous node is labelled V */
    pub(crate) v: bool,
}

/// One candidate vector of a trellis node with the best path into it.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DpState {
    pub(crate) mv: [i32; 2],
    pub(crate) prev: Option<PrevState>,
    /* rate and distortion change of the path up to here */
    pub(crate) dr: i32,
    pub(crate) dd: i32,
    pub(crate) block_sads: [i32; DP_NBLOCKS_MAX],
    pub(crate) pred_mv_rates: [i32; MAX_PREDICTED],
    pub(crate) mv_rate: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DpNode {
    pub(crate) vx: isize,
    pub(crate) vy: isize,
    pub(crate) u: isize,
    pub(crate) states: [DpState; DP_NSTATES_MAX],
    pub(crate) nstates: usize,
    /* anchors of the blocks whose SAD this node changes */
    pub(crate) blocks: [(isize, isize); DP_NBLOCKS_MAX],
    pub(crate) nblocks: usize,
    /* vertices this vector predicts, the changeable ones first */
    pub(crate) predicted: [(isize, isize); MAX_PREDICTED],
    pub(crate) npredicted: usize,
    pub(crate) npred_changeable: usize,
    pub(crate) original_mv: [i32; 2],
    pub(crate) original_label: bool,
    pub(crate) original_mv_rate: i32,
    pub(crate) original_mv_rates: [i32; MAX_PREDICTED],
    /* earliest node whose state the rates of this node depend on */
    pub(crate) min_predictor: Option<usize>,
    /* state on the installed path */
    pub(crate) chosen: usize,
}

impl DpNode {
    #[inline]
    fn push_block(&mut self, ax: Axis, u: isize, w: isize) {
        debug_assert!(self.nblocks < DP_NBLOCKS_MAX);
        self.blocks[self.nblocks] = ax.pos(u, w);
        self.nblocks += 1;
    }
}

/// Boundary case of a refinement step of `dsz` for the vertex at
/// `(vx, vy)` within the blocks of size `1 << log_blk_sz` around it.
pub(crate) fn dp_boundary_case(
    vx: isize,
    vy: isize,
    mv: [i32; 2],
    dsz: i32,
    log_blk_sz: usize,
    frame_width: isize,
    frame_height: isize,
) -> usize {
    let blk = 1isize << log_blk_sz;
    let bx = (vx - 2) << 2;
    let by = (vy - 2) << 2;
    let min = [
        ((cmp::max(bx - blk - 32, -16) - (bx - blk)) << 3) as i32,
        ((cmp::max(by - blk - 32, -16) - (by - blk)) << 3) as i32,
    ];
    let max = [
        (((cmp::min(bx + blk + 32, frame_width + 16) - (bx + blk)) << 3) as i32) - dsz,
        (((cmp::min(by + blk + 32, frame_height + 16) - (by + blk)) << 3) as i32) - dsz,
    ];
    boundary_case(mv, min, max)
}

impl MvEstCtx {
    #[inline]
    fn valid_at(&self, ax: Axis, u: isize, w: isize) -> bool {
        let (vx, vy) = ax.pos(u, w);
        self.grid.is_valid(vx, vy)
    }

    /* extent along the line and across it */
    #[inline]
    fn extents(&self, ax: Axis) -> (isize, isize) {
        match ax {
            Axis::Row => (self.nhmvbs, self.nvmvbs),
            Axis::Col => (self.nvmvbs, self.nhmvbs),
        }
    }

    fn dp_init(&self, dp: &mut [DpNode], k: usize, ax: Axis, u: isize, w: isize, prev: Option<usize>) {
        let (vx, vy) = ax.pos(u, w);
        let pt = self.grid[(vx, vy)];
        let mut node = DpNode {
            vx,
            vy,
            u,
            original_mv: pt.mv,
            original_label: ax.label(&pt),
            original_mv_rate: self.node(vx, vy).mv_rate,
            ..Default::default()
        };
        if self.grid.is_border(vx, vy) {
            /* a border vector never changes, and neither do the rates it
            feeds, but the previous vector is still needed for the SADs */
            node.min_predictor = prev;
        } else {
            let level = mc_level(vx, vy);
            let nchangeable = ax.npred_changeable(level);
            for (pi, &(dx, dy)) in ax.predicted(level).iter().enumerate() {
                let (px, py) = (vx + dx, vy + dy);
                if self.grid.is_border(px, py) || !self.grid.is_valid(px, py) {
                    continue;
                }
                node.predicted[node.npredicted] = (px, py);
                if pi < nchangeable {
                    node.original_mv_rates[node.npredicted] = self.node(px, py).mv_rate;
                    node.npred_changeable += 1;
                }
                node.npredicted += 1;
            }
            let pred_hist = PRED_HIST_SIZE[level];
            node.min_predictor = match prev {
                Some(p) if dp[p].u >= u - pred_hist => {
                    let mut j = p;
                    while dp[j].u > u - pred_hist && j > 0 {
                        j -= 1;
                    }
                    if dp[j].u < u - pred_hist {
                        j += 1;
                    }
                    Some(j)
                }
                _ => None,
            };
        }
        dp[k] = node;
    }

    /* offset of the quadrant blocks a level 0 to 2 vertex touches; halved
    again for a level 0 vertex whose level 3 neighbour survives */
    #[inline]
    fn mvb_off(&self, ax: Axis, level: usize, half: isize, u: isize, w: isize) -> isize {
        if level > 0 || !self.valid_at(ax, u, w) {
            half
        } else {
            half >> 1
        }
    }

    /* blocks before the first vertex of a path */
    fn first_block_setup(&self, node: &mut DpNode, ax: Axis, u: isize, w: isize) {
        let (_, m) = self.extents(ax);
        let level = mc_level(node.vx, node.vy);
        let mvb = 1isize << log_mvb_sz(level);
        node.nblocks = 0;
        if u <= 2 {
            return;
        }
        if level >= 3 {
            if w >= mvb {
                node.push_block(ax, u - mvb, w - mvb);
            }
            if w <= m - mvb {
                node.push_block(ax, u - mvb, w);
            }
            return;
        }
        let half = mvb >> 1;
        if w >= mvb {
            if self.valid_at(ax, u - half, w - half) {
                let off = self.mvb_off(ax, level, half, u - (half >> 1), w - (half >> 1));
                node.push_block(ax, u - off, w - off);
                if !self.valid_at(ax, u, w - off) {
                    node.push_block(ax, u - off, w - (off << 1));
                }
                if !self.valid_at(ax, u - off, w) {
                    node.push_block(ax, u - (off << 1), w - off);
                }
            } else {
                node.push_block(ax, u - mvb, w - mvb);
            }
        }
        if w <= m - mvb {
            if self.valid_at(ax, u - half, w + half) {
                let off = self.mvb_off(ax, level, half, u - (half >> 1), w + (half >> 1));
                node.push_block(ax, u - off, w);
                if !self.valid_at(ax, u, w + off) {
                    node.push_block(ax, u - off, w + off);
                }
                if !self.valid_at(ax, u - off, w) {
                    node.push_block(ax, u - (off << 1), w);
                }
            } else {
                node.push_block(ax, u - mvb, w);
            }
        }
    }

    /* blocks between the previous vertex of a path and this one */
    fn prev_block_setup(&self, node: &mut DpNode, ax: Axis, u: isize, w: isize) {
        let (_, m) = self.extents(ax);
        let level = mc_level(node.vx, node.vy);
        let log = log_mvb_sz(level);
        let mvb = 1isize << log;
        let (pvx, pvy) = ax.pos(u - mvb, w);
        let prev_log = log_mvb_sz(mc_level(pvx, pvy));
        node.nblocks = 0;
        if level >= 3 {
            if w >= mvb {
                node.push_block(ax, u - mvb, w - mvb);
                if prev_log > log && !self.valid_at(ax, u - mvb, w - mvb) {
                    node.push_block(ax, u - mvb, w - (mvb << 1));
                }
            }
            if w <= m - mvb {
                node.push_block(ax, u - mvb, w);
                if prev_log > log && !self.valid_at(ax, u - mvb, w + mvb) {
                    node.push_block(ax, u - mvb, w + mvb);
                }
            }
            return;
        }
        let half = mvb >> 1;
        if w >= mvb {
            if self.valid_at(ax, u - half, w - half) {
                let off = self.mvb_off(ax, level, half, u - (half >> 1), w - (half >> 1));
                node.push_block(ax, u - off, w - off);
                if !self.valid_at(ax, u, w - off) {
                    node.push_block(ax, u - off, w - (off << 1));
                }
                if !self.valid_at(ax, u - off, w) {
                    node.push_block(ax, u - (off << 1), w - off);
                    if !self.valid_at(ax, u - (off << 1), w - off) {
                        node.push_block(ax, u - (off << 1), w - (off << 1));
                    }
                }
            } else {
                node.push_block(ax, u - mvb, w - mvb);
                if prev_log > log && !self.valid_at(ax, u - mvb, w - mvb) {
                    node.push_block(ax, u - mvb, w - (mvb << 1));
                }
            }
        }
        if w <= m - mvb {
            if self.valid_at(ax, u - half, w + half) {
                let off = self.mvb_off(ax, level, half, u - (half >> 1), w + (half >> 1));
                node.push_block(ax, u - off, w);
                if !self.valid_at(ax, u, w + off) {
                    node.push_block(ax, u - off, w + off);
                }
                if !self.valid_at(ax, u - off, w) {
                    node.push_block(ax, u - (off << 1), w);
                    if !self.valid_at(ax, u - (off << 1), w + off) {
                        node.push_block(ax, u - (off << 1), w + off);
                    }
                }
            } else {
                node.push_block(ax, u - mvb, w);
                if prev_log > log && !self.valid_at(ax, u - mvb, w + mvb) {
                    node.push_block(ax, u - mvb, w + mvb);
                }
            }
        }
    }

    /* blocks after the last vertex of a path, which is at (u, w) */
    fn last_block_setup(&self, node: &mut DpNode, ax: Axis, u: isize, w: isize) {
        let (_, m) = self.extents(ax);
        let (vx, vy) = ax.pos(u, w);
        let level = mc_level(vx, vy);
        let mvb = 1isize << log_mvb_sz(level);
        node.nblocks = 0;
        if level >= 3 {
            if w >= mvb {
                node.push_block(ax, u, w - mvb);
            }
            if w <= m - mvb {
                node.push_block(ax, u, w);
            }
            return;
        }
        let half = mvb >> 1;
        if w >= mvb {
            if self.valid_at(ax, u + half, w - half) {
                let off = self.mvb_off(ax, level, half, u + (half >> 1), w - (half >> 1));
                node.push_block(ax, u, w - off);
                if !self.valid_at(ax, u + off, w) {
                    node.push_block(ax, u + off, w - off);
                }
                if !self.valid_at(ax, u, w - off) {
                    node.push_block(ax, u, w - (off << 1));
                }
            } else {
                node.push_block(ax, u, w - mvb);
            }
        }
        if w <= m - mvb {
            if self.valid_at(ax, u + half, w + half) {
                let off = self.mvb_off(ax, level, half, u + (half >> 1), w + (half >> 1));
                node.push_block(ax, u, w);
                if !self.valid_at(ax, u + off, w) {
                    node.push_block(ax, u + off, w);
                }
                if !self.valid_at(ax, u, w + off) {
                    node.push_block(ax, u, w + off);
                }
            } else {
                node.push_block(ax, u, w);
            }
        }
    }

    /* SAD change of the blocks of a node against the current mesh */
    fn get_sad_change<T: Pixel>(
        &self,
        src: &MeSource<T>,
        node: &DpNode,
        block_sads: &mut [i32; DP_NBLOCKS_MAX],
    ) -> i32 {
        let mut dd = 0;
        for (bi, &(bx, by)) in node.blocks[..node.nblocks].iter().enumerate() {
            let block = self.node(bx, by);
            block_sads[bi] = src.sad8(&self.grid, bx, by, block.oc, block.s, block.log_mvb_sz);
            dd += block_sads[bi] - block.sad;
        }
        dd
    }

    /* loads the trellis path ending in state prevsi of node k - 1 into the
    mesh as far back as the rates of node k depend on, then returns the rate
    change of node k's vector and of the vectors it predicts */
    fn get_rate_change(
        &mut self,
        dp: &[DpNode],
        k: usize,
        prevsi: usize,
        mv_res: u8,
        pred_mv_rates: &mut [i32; MAX_PREDICTED],
    ) -> (i32, i32) {
        if let Some(m) = dp[k].min_predictor {
            let npreds = k - m;
            let mut pred_sis = [0usize; 16];
            let mut si = prevsi;
            pred_sis[npreds - 1] = si;
            for pi in 2..=npreds {
                si = dp[k - pi + 1].states[si].prev.map_or(0, |p| p.si);
                pred_sis[npreds - pi] = si;
            }
            for j in m..k {
                let pnode = &dp[j];
                let state = &pnode.states[pred_sis[j - m]];
                self.node_mut(pnode.vx, pnode.vy).mv_rate = state.mv_rate;
                self.grid[(pnode.vx, pnode.vy)].mv = state.mv;
                for pi in 0..pnode.npred_changeable {
                    let (px, py) = pnode.predicted[pi];
                    self.node_mut(px, py).mv_rate = state.pred_mv_rates[pi];
                }
            }
        }
        let node = &dp[k];
        if self.grid.is_border(node.vx, node.vy) {
            return (0, 0);
        }
        let rate_of = |est: &MvEstCtx, vx: isize, vy: isize| {
            let pred = est.grid.predictor(vx, vy, mc_level(vx, vy), mv_res);
            let mv = est.grid[(vx, vy)].mv;
            mv_est_bits(mv[MV_X] >> mv_res, mv[MV_Y] >> mv_res, pred[MV_X], pred[MV_Y])
        };
        let cur_mv_rate = rate_of(self, node.vx, node.vy);
        let mut dr = cur_mv_rate - self.node(node.vx, node.vy).mv_rate;
        for (pi, &(px, py)) in node.predicted[..node.npredicted].iter().enumerate() {
            pred_mv_rates[pi] = rate_of(self, px, py);
            dr += pred_mv_rates[pi] - self.node(px, py).mv_rate;
        }
        (dr, cur_mv_rate)
    }

    /* puts back everything the evaluation of the path through node k
    touched, the earliest nodes last so their snapshots win */
    fn restore_path(&mut self, dp: &[DpNode], k: usize, ax: Axis) {
        for node in dp[..=k].iter().rev() {
            self.node_mut(node.vx, node.vy).mv_rate = node.original_mv_rate;
            let pt = &mut self.grid[(node.vx, node.vy)];
            pt.mv = node.original_mv;
            ax.set_label(pt, node.original_label);
            for pi in 0..node.npred_changeable {
                let (px, py) = node.predicted[pi];
                self.node_mut(px, py).mv_rate = node.original_mv_rates[pi];
            }
        }
    }

    /* commits the best path ending in `last` of node k; labels are set
    walking back, the rest going forward since predicted rates may have
    been overwritten several times along the path */
    fn install_path(&mut self, dp: &mut [DpNode], k: usize, last: PrevState, ax: Axis) {
        let mut cur = last;
        for j in (0..=k).rev() {
            let node = &mut dp[j];
            ax.set_label(&mut self.grid[(node.vx, node.vy)], cur.v);
            node.chosen = cur.si;
            match node.states[cur.si].prev {
                Some(p) => cur = p,
                None => break,
            }
        }
        for node in dp[..=k].iter() {
            let state = &node.states[node.chosen];
            self.node_mut(node.vx, node.vy).mv_rate = state.mv_rate;
            self.grid[(node.vx, node.vy)].mv = state.mv;
            for (bi, &(bx, by)) in node.blocks[..node.nblocks].iter().enumerate() {
                self.node_mut(bx, by).sad = state.block_sads[bi];
            }
            for (pi, &(px, py)) in node.predicted[..node.npredicted].iter().enumerate() {
                self.node_mut(px, py).mv_rate = state.pred_mv_rates[pi];
            }
            #[cfg(feature = "trace_me")]
            TRACE_DP_NODE(
                &mut self.tracer,
                node.vx,
                node.vy,
                state.mv,
                ax.label(&self.grid[(node.vx, node.vy)]),
            );
        }
    }

    /* sites a node may move to */
    fn dp_sites(&self, vx: isize, vy: isize, labels_only: bool, log_dsz: usize) -> &'static [usize] {
        if labels_only || self.grid.is_border(vx, vy) {
            return &[];
        }
        let level = mc_level(vx, vy);
        let b = dp_boundary_case(
            vx,
            vy,
            self.grid[(vx, vy)].mv,
            1 << log_dsz,
            log_mvb_sz(level) + 2,
            self.frame_width,
            self.frame_height,
        );
        DIAMOND.sites(b)
    }

    /// Runs the trellis over each path of undecimated vertices of line `w`,
    /// choosing a vector among the centre and diamond sites `1 << log_dsz`
    /// away for every vertex and a label for every edge. Returns the cost
    /// change, never positive.
    fn refine_line<T: Pixel>(
        &mut self,
        src: &MeSource<T>,
        dp: &mut [DpNode],
        ax: Axis,
        w: isize,
        log_dsz: usize,
        mv_res: u8,
    ) -> i32 {
        let (n, m) = self.extents(ax);
        let labels_only = w < 2 || w > m - 2;
        let use_b = self.flags.contains(McFlags::USEB);
        let use_v = self.flags.contains(McFlags::USEV);
        let lambda = self.lambda;
        let mut block_sads = [[0i32; DP_NBLOCKS_MAX]; DP_NSTATES_MAX << 1];
        let mut cur_mv_rates = [0i32; DP_NSTATES_MAX];
        let mut pred_mv_rates = [[0i32; MAX_PREDICTED]; DP_NSTATES_MAX];
        let mut dcost = 0;
        let mut u = 0;
        loop {
            while u <= n && !self.valid_at(ax, u, w) {
                u += 1;
            }
            if u > n {
                break;
            }

            /* the first node */
            let (vx, vy) = ax.pos(u, w);
            let mut level = mc_level(vx, vy);
            let mut mvb = 1isize << log_mvb_sz(level);
            let cur = self.grid[(vx, vy)].mv;
            self.dp_init(dp, 0, ax, u, w, None);
            let mut node = dp[0];
            self.first_block_setup(&mut node, ax, u, w);
            dp[0] = node;
            let sites = self.dp_sites(vx, vy, labels_only, log_dsz);
            for sitei in 0..=sites.len() {
                let site = if sitei == 0 { SITE_CENTER } else { sites[sitei - 1] };
                let mv = [
                    cur[MV_X] + (SITE_DX[site] << log_dsz),
                    cur[MV_Y] + (SITE_DY[site] << log_dsz),
                ];
                self.grid[(vx, vy)].mv = mv;
                let mut state = DpState {
                    mv,
                    ..Default::default()
                };
                let (dr, mv_rate) = self.get_rate_change(dp, 0, 0, mv_res, &mut state.pred_mv_rates);
                state.dr = dr;
                state.mv_rate = mv_rate;
                state.dd = self.get_sad_change(src, &dp[0], &mut state.block_sads);
                dp[0].states[sitei] = state;
            }
            dp[0].nstates = sites.len() + 1;

            let mut has_gap = false;
            let mut k = 0;
            while u < n {
                /* advance to the next vertex of the path */
                if level & 1 != 0 {
                    if !self.valid_at(ax, u + mvb, w) {
                        has_gap = true;
                        break;
                    } else if level >= 3 || self.valid_at(ax, u + 1, w) {
                        u += 1;
                    } else {
                        u += mvb;
                    }
                } else if level >= 4 {
                    u += 1;
                } else if !self.valid_at(ax, u + (mvb >> 1), w) {
                    u += mvb;
                } else if level >= 2 || !self.valid_at(ax, u + 1, w) {
                    u += mvb >> 1;
                } else {
                    u += 1;
                }

                let (vx, vy) = ax.pos(u, w);
                let (pvx, pvy) = (dp[k].vx, dp[k].vy);
                level = mc_level(vx, vy);
                mvb = 1 << log_mvb_sz(level);
                let cur = self.grid[(vx, vy)].mv;
                self.dp_init(dp, k + 1, ax, u, w, Some(k));
                let mut node = dp[k + 1];
                self.prev_block_setup(&mut node, ax, u, w);
                dp[k + 1] = node;

                let pnstates = dp[k].nstates;
                let sites = self.dp_sites(vx, vy, labels_only, log_dsz);
                for sitei in 0..=sites.len() {
                    let site = if sitei == 0 { SITE_CENTER } else { sites[sitei - 1] };
                    let mv = [
                        cur[MV_X] + (SITE_DX[site] << log_dsz),
                        cur[MV_Y] + (SITE_DY[site] << log_dsz),
                    ];
                    let mut best_si = if ax.label(&self.grid[(pvx, pvy)]) { pnstates } else { 0 };
                    let mut best_cost = i32::MAX;
                    let mut best_dr = dp[k].states[0].dr;
                    let mut best_dd = dp[k].states[0].dd;
                    self.grid[(vx, vy)].mv = mv;
                    for si in 0..pnstates {
                        /* loads the path through si into the mesh */
                        let (cdr, mv_rate) =
                            self.get_rate_change(dp, k + 1, si, mv_res, &mut pred_mv_rates[si]);
                        cur_mv_rates[si] = mv_rate;
                        let (pdr, pdd) = (dp[k].states[si].dr, dp[k].states[si].dd);
                        if use_b {
                            ax.set_label(&mut self.grid[(pvx, pvy)], false);
                            let dr = pdr + cdr;
                            let dd = pdd + self.get_sad_change(src, &dp[k + 1], &mut block_sads[si]);
                            let cost = rd_cost(dd, dr, lambda);
                            if cost < best_cost {
                                best_si = si;
                                best_cost = cost;
                                best_dd = dd;
                                best_dr = dr;
                            }
                        }
                        if use_v {
                            ax.set_label(&mut self.grid[(pvx, pvy)], true);
                            let dr = pdr + cdr;
                            let dd = pdd
                                + self.get_sad_change(src, &dp[k + 1], &mut block_sads[si + pnstates]);
                            let cost = rd_cost(dd, dr, lambda);
                            if cost < best_cost {
                                best_si = si + pnstates;
                                best_cost = cost;
                                best_dd = dd;
                                best_dr = dr;
                            }
                        }
                    }
                    let psi = best_si % pnstates;
                    dp[k + 1].states[sitei] = DpState {
                        mv,
                        prev: Some(PrevState {
                            si: psi,
                            v: best_si >= pnstates,
                        }),
                        dr: best_dr,
                        dd: best_dd,
                        block_sads: block_sads[best_si],
                        pred_mv_rates: pred_mv_rates[psi],
                        mv_rate: cur_mv_rates[psi],
                    };
                }
                dp[k + 1].nstates = sites.len() + 1;
                k += 1;
            }

            /* close the path with the blocks after its last vertex */
            let (lvx, lvy) = (dp[k].vx, dp[k].vy);
            let lu = dp[k].u;
            let pnstates = dp[k].nstates;
            let mut best_si = if ax.label(&self.grid[(lvx, lvy)]) { pnstates } else { 0 };
            let mut best_cost = i32::MAX;
            let mut tail = DpNode::default();
            if lu < n - 2 {
                self.last_block_setup(&mut tail, ax, lu, w);
                for si in 0..pnstates {
                    let (pmv, pdr, pdd) = (dp[k].states[si].mv, dp[k].states[si].dr, dp[k].states[si].dd);
                    self.grid[(lvx, lvy)].mv = pmv;
                    if use_b {
                        ax.set_label(&mut self.grid[(lvx, lvy)], false);
                        let dd = pdd + self.get_sad_change(src, &tail, &mut block_sads[si]);
                        let cost = rd_cost(dd, pdr, lambda);
                        if cost < best_cost {
                            best_si = si;
                            best_cost = cost;
                        }
                    }
                    /* past a gap the label does not matter */
                    if use_v && (!has_gap || !use_b) {
                        ax.set_label(&mut self.grid[(lvx, lvy)], true);
                        let dd = pdd + self.get_sad_change(src, &tail, &mut block_sads[si + pnstates]);
                        let cost = rd_cost(dd, pdr, lambda);
                        if cost < best_cost {
                            best_si = si + pnstates;
                            best_cost = cost;
                        }
                    }
                }
            } else {
                for si in 0..pnstates {
                    let cost = rd_cost(dp[k].states[si].dd, dp[k].states[si].dr, lambda);
                    if cost < best_cost {
                        best_si = si;
                        best_cost = cost;
                    }
                }
                if ax.label(&self.grid[(lvx, lvy)]) {
                    best_si += pnstates;
                }
            }

            if best_cost > 0 {
                self.restore_path(dp, k, ax);
            } else {
                let last = PrevState {
                    si: best_si % pnstates,
                    v: best_si >= pnstates,
                };
                self.install_path(dp, k, last, ax);
                for (bi, &(bx, by)) in tail.blocks[..tail.nblocks].iter().enumerate() {
                    self.node_mut(bx, by).sad = block_sads[best_si][bi];
                }
                dcost += best_cost;
            }
            trace!("{:?} {} path to {}: cost {}", ax, w, lu, best_cost);
            u += 1;
        }
        dcost
    }

    /// One refinement pass over every row then every column with
    /// undecimated vertices.
    pub(crate) fn refine<T: Pixel>(&mut self, src: &MeSource<T>, log_dsz: usize, mv_res: u8) -> i32 {
        let mut dp = std::mem::take(&mut self.dp_nodes);
        let mut dcost = 0;
        for vy in 0..=self.nvmvbs {
            if self.row_counts[vy as usize] > 0 {
                dcost += self.refine_line(src, &mut dp, Axis::Row, vy, log_dsz, mv_res);
            }
        }
        for vx in 0..=self.nhmvbs {
            if self.col_counts[vx as usize] > 0 {
                dcost += self.refine_line(src, &mut dp, Axis::Col, vx, log_dsz, mv_res);
            }
        }
        self.dp_nodes = dp;
        dcost
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enc::test::*;
    use pretty_assertions::assert_eq;

    /* every vertex up to level 3, nothing decimated */
    fn undecimated(width: usize, height: usize) -> MvEstCtx {
        let mut cfg = EstimatorConfig::new(width, height, ChromaSampling::Cs420);
        cfg.level_max = 3;
        let mut est = MvEstCtx::new(&cfg).unwrap();
        for vy in 0..=est.nvmvbs {
            for vx in 0..=est.nhmvbs {
                est.grid[(vx, vy)].valid = mc_level(vx, vy) <= 3;
            }
        }
        est
    }

    fn blocks(node: &DpNode) -> Vec<(isize, isize)> {
        node.blocks[..node.nblocks].to_vec()
    }

    #[test]
    fn axis_transposes() {
        assert_eq!(Axis::Row.pos(3, 7), (3, 7));
        assert_eq!(Axis::Col.pos(3, 7), (7, 3));
        let mut pt = MvGridPt::default();
        Axis::Col.set_label(&mut pt, true);
        assert!(pt.down && !pt.right);
        assert!(Axis::Col.label(&pt));
        assert!(!Axis::Row.label(&pt));
    }

    #[test]
    fn boundary_case_of_refinement() {
        /* interior vertex of a 64x64 frame, 16x16 blocks */
        assert_eq!(dp_boundary_case(8, 8, [0, 0], 8, 4, 64, 64), 0);
        /* the window reaches 16 pixels outside the frame */
        assert_eq!(dp_boundary_case(8, 8, [-192, 0], 8, 4, 64, 64), BOUND_XMIN);
        assert_eq!(dp_boundary_case(8, 8, [0, 248], 8, 4, 64, 64), BOUND_YMAX);
        /* a vertex on the picture corner can only move inwards */
        assert_eq!(
            dp_boundary_case(2, 2, [0, 0], 8, 4, 64, 64),
            BOUND_XMIN | BOUND_YMIN
        );
    }

    #[test]
    fn level0_block_setups() {
        let est = undecimated(48, 48);
        let mut dp = vec![DpNode::default(); 4];
        est.dp_init(&mut dp, 0, Axis::Row, 4, 4, None);
        let mut node = dp[0];
        est.first_block_setup(&mut node, Axis::Row, 4, 4);
        assert_eq!(
            blocks(&node),
            vec![(3, 3), (3, 2), (2, 3), (3, 4), (3, 5), (2, 4)]
        );
        /* the column pass sees the transpose */
        est.dp_init(&mut dp, 0, Axis::Col, 4, 4, None);
        let mut node = dp[0];
        est.first_block_setup(&mut node, Axis::Col, 4, 4);
        assert_eq!(
            blocks(&node),
            vec![(3, 3), (2, 3), (3, 2), (4, 3), (5, 3), (4, 2)]
        );
        /* after the last vertex */
        let mut tail = DpNode::default();
        est.last_block_setup(&mut tail, Axis::Row, 4, 4);
        assert_eq!(
            blocks(&tail),
            vec![(4, 3), (5, 3), (4, 2), (4, 4), (5, 4), (4, 5)]
        );
    }

    #[test]
    fn border_nodes_only_load_history() {
        let est = undecimated(48, 48);
        let mut dp = vec![DpNode::default(); 4];
        est.dp_init(&mut dp, 0, Axis::Row, 0, 4, None);
        est.dp_init(&mut dp, 1, Axis::Row, 1, 4, Some(0));
        assert_eq!(dp[1].npredicted, 0);
        assert_eq!(dp[1].min_predictor, Some(0));
        est.dp_init(&mut dp, 2, Axis::Row, 2, 4, Some(1));
        /* a level 2 vertex predicts its finer neighbours */
        assert!(dp[2].npredicted > 0);
        assert!(dp[2].npred_changeable <= 2);
        assert_eq!(dp[2].min_predictor, Some(0));
    }

    #[test]
    fn refinement_never_raises_cost() {
        let cfg = EstimatorConfig::new(64, 48, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let reference = smooth_frame(64, 48);
        let input = shift_right(&reference, 1);
        let up = reference.upsample();
        let src = MeSource::new(&input, &up, true);
        est.setup_costs(&input);
        est.reset_frame();
        est.init_mvs(&src, 0);
        est.decimate(&src);
        let valid: Vec<bool> = est.grid.iter().map(|(_, _, pt)| pt.valid).collect();
        for _ in 0..3 {
            assert!(est.refine(&src, 3, 2) <= 0);
            assert_eq!(est.check_rd_state(&src, 2), 0);
        }
        for log_dsz in (0..=2).rev() {
            est.update_mv_rates(log_dsz as u8);
            assert!(est.refine(&src, log_dsz, log_dsz as u8) <= 0);
            assert_eq!(est.check_rd_state(&src, log_dsz as u8), 0);
        }
        /* refinement never changes which vertices are in the mesh */
        let after: Vec<bool> = est.grid.iter().map(|(_, _, pt)| pt.valid).collect();
        assert_eq!(valid, after);
    }

    #[test]
    fn labels_follow_flags() {
        let mut cfg = EstimatorConfig::new(48, 32, ChromaSampling::Cs420);
        cfg.flags = McFlags::USEV;
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let f = random_frame(48, 32, 21);
        let up = f.upsample();
        let src = MeSource::new(&f, &up, true);
        est.setup_costs(&f);
        est.reset_frame();
        est.init_mvs(&src, 0);
        est.decimate(&src);
        est.refine(&src, 3, 2);
        for (_, _, pt) in est.grid.iter().filter(|(_, _, pt)| pt.valid) {
            assert!(pt.right && pt.down);
        }
    }
}
