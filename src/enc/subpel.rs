use std::cmp;

use super::*;
use crate::enc::cost::mv_est_bits;

impl MvEstCtx {
    /// Keeps the full-pel part of the refined mesh as search history for
    /// the next frame.
    pub(crate) fn update_fullpel_mvs(&mut self, r: usize) {
        for vy in 2..=self.nvmvbs - 2 {
            for vx in 2..=self.nhmvbs - 2 {
                let pt = self.grid[(vx, vy)];
                if !pt.valid {
                    continue;
                }
                self.node_mut(vx, vy).mvs[0][r] = [
                    pt.mv[MV_X] >> MV_FRAC_BITS,
                    pt.mv[MV_Y] >> MV_FRAC_BITS,
                ];
            }
        }
    }

    /// Rates every interior vector again at resolution `mv_res` and returns
    /// the change in total rate.
    pub(crate) fn update_mv_rates(&mut self, mv_res: u8) -> i32 {
        let mut dr = 0;
        for vy in 2..=self.nvmvbs - 2 {
            for vx in 2..=self.nhmvbs - 2 {
                let pt = self.grid[(vx, vy)];
                if !pt.valid {
                    continue;
                }
                let pred = self.grid.predictor(vx, vy, mc_level(vx, vy), mv_res);
                let rate = mv_est_bits(
                    pt.mv[MV_X] >> mv_res,
                    pt.mv[MV_Y] >> mv_res,
                    pred[MV_X],
                    pred[MV_Y],
                );
                let node = self.node_mut(vx, vy);
                dr += rate - node.mv_rate;
                node.mv_rate = rate;
            }
        }
        dr
    }

    fn save_refinement(&mut self) {
        self.refine_grid.copy_from(&self.grid);
        for (c, node) in self.refine_costs.iter_mut().zip(self.nodes.iter()) {
            *c = (node.mv_rate, node.sad);
        }
    }

    fn restore_refinement(&mut self) {
        self.grid.copy_from(&self.refine_grid);
        for (&(mv_rate, sad), node) in self.refine_costs.iter().zip(self.nodes.iter_mut()) {
            node.mv_rate = mv_rate;
            node.sad = sad;
        }
    }

    /// Stage 4: half-pel refinement, then each finer resolution down to
    /// `mv_res_min` for as long as the distortion saved pays for the extra
    /// rate. A resolution that does not pay is rolled back and ends the
    /// stage. Returns the cost change that was kept.
    pub(crate) fn subpel_refine<T: Pixel>(&mut self, src: &MeSource<T>, r: usize, cost_thresh: i32) -> i64 {
        self.update_fullpel_mvs(r);
        let mut total = 0i64;
        loop {
            let dcost = self.refine(src, 2, 2);
            total += dcost as i64;
            if dcost >= cost_thresh {
                break;
            }
        }

        let mut cost_thresh = cost_thresh;
        let mut best_mv_res = MV_RES_COARSEST;
        let mut mv_res = MV_RES_COARSEST;
        while mv_res > self.cfg.mv_res_min {
            mv_res -= 1;
            /* the snapshot keeps the rates of the resolution it rolls back to */
            self.save_refinement();
            let mut subpel_cost = self.update_mv_rates(mv_res) * self.lambda;
            /* demand a real improvement when the rate penalty is small, but
            not so much that an all zero field never terminates */
            cost_thresh = cmp::max(cost_thresh, -cmp::max(subpel_cost, 16 << LAMBDA_SCALE));
            loop {
                let dcost = self.refine(src, mv_res as usize, mv_res);
                subpel_cost += dcost;
                if dcost >= cost_thresh {
                    break;
                }
            }
            if subpel_cost > 0 {
                debug!("1/{} pel refinement failed: {}", 1 << (MV_FRAC_BITS - mv_res as u32), subpel_cost);
                self.restore_refinement();
                break;
            }
            debug!("1/{} pel refinement kept: {}", 1 << (MV_FRAC_BITS - mv_res as u32), subpel_cost);
            total += subpel_cost as i64;
            best_mv_res = mv_res;
        }
        self.grid.mv_res = best_mv_res;
        total
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enc::test::*;
    use pretty_assertions::assert_eq;

    fn refined(cfg: &EstimatorConfig, input: &Frame<u8>, up: &Frame<u8>) -> MvEstCtx {
        let mut est = MvEstCtx::new(cfg).unwrap();
        est.estimate(input, up, RefKind::Previous, None).unwrap();
        est
    }

    #[test]
    fn fullpel_history_rounds_down() {
        let cfg = EstimatorConfig::new(32, 32, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        est.grid[(4, 4)].valid = true;
        est.grid[(4, 4)].mv = [-13, 5];
        est.grid[(6, 6)].mv = [40, 40];
        est.update_fullpel_mvs(1);
        assert_eq!(est.node(4, 4).mvs[0][1], [-2, 0]);
        assert_eq!(est.node(4, 4).mvs[0][0], [0, 0]);
        /* decimated vertices keep their history */
        assert_eq!(est.node(6, 6).mvs[0][1], [0, 0]);
    }

    #[test]
    fn rates_follow_resolution() {
        let cfg = EstimatorConfig::new(64, 64, ChromaSampling::Cs420);
        let reference = smooth_frame(64, 64);
        let input = shift_right(&reference, 3);
        let up = reference.upsample();
        let mut est = refined(&cfg, &input, &up);
        let src = MeSource::new(&input, &up, true);
        let before: i32 = est.nodes.iter().map(|n| n.mv_rate).sum();
        let dr = est.update_mv_rates(0);
        let after: i32 = est.nodes.iter().map(|n| n.mv_rate).sum();
        assert_eq!(after - before, dr);
        assert_eq!(est.check_rd_state(&src, 0), 0);
        /* nothing moved, so a second pass changes nothing */
        assert_eq!(est.update_mv_rates(0), 0);
    }

    #[test]
    fn rollback_restores_mesh_and_costs() {
        let cfg = EstimatorConfig::new(48, 48, ChromaSampling::Cs420);
        let f = random_frame(48, 48, 9);
        let up = f.upsample();
        let mut est = refined(&cfg, &shift_right(&f, 1), &up);
        let grid = est.grid.clone();
        let costs: Vec<(i32, i32)> = est.nodes.iter().map(|n| (n.mv_rate, n.sad)).collect();
        est.save_refinement();
        est.grid[(8, 8)].mv = [123, -77];
        est.grid.mv_res = 0;
        for node in est.nodes.iter_mut() {
            node.mv_rate += 5;
            node.sad = 0;
        }
        est.restore_refinement();
        assert_eq!(est.grid, grid);
        let restored: Vec<(i32, i32)> = est.nodes.iter().map(|n| (n.mv_rate, n.sad)).collect();
        assert_eq!(restored, costs);
    }

    #[test]
    fn resolution_floor_is_respected() {
        let mut cfg = EstimatorConfig::new(48, 48, ChromaSampling::Cs420);
        cfg.mv_res_min = 2;
        let reference = smooth_frame(48, 48);
        let input = shift_right(&reference, 1);
        let up = reference.upsample();
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let summary = est.estimate(&input, &up, RefKind::Previous, None).unwrap();
        assert_eq!(summary.mv_res, 2);
        assert_eq!(summary.check_errors, 0);

        cfg.mv_res_min = 1;
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let summary = est.estimate(&input, &up, RefKind::Previous, None).unwrap();
        assert!(summary.mv_res >= 1);
        assert_eq!(summary.check_errors, 0);
    }
}
