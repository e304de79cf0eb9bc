use super::cost::*;
use super::*;

impl MvEstCtx {
    #[cfg(debug_assertions)]
    fn check_block_state<T: Pixel>(
        &self,
        src: &MeSource<T>,
        vx: isize,
        vy: isize,
        log_mvb_sz: usize,
    ) -> usize {
        if log_mvb_sz > 0 {
            let half = 1 << (log_mvb_sz - 1);
            if self.grid.is_valid(vx + half, vy + half) {
                return self.check_block_state(src, vx, vy, log_mvb_sz - 1)
                    + self.check_block_state(src, vx + half, vy, log_mvb_sz - 1)
                    + self.check_block_state(src, vx, vy + half, log_mvb_sz - 1)
                    + self.check_block_state(src, vx + half, vy + half, log_mvb_sz - 1);
            }
        }
        let mut errors = 0;
        let block = self.node(vx, vy);
        if block.log_mvb_sz != log_mvb_sz {
            error!(
                "block ({}, {}): log_mvb_sz should be {} (is {})",
                vx, vy, log_mvb_sz, block.log_mvb_sz
            );
            errors += 1;
        }
        /* a 16x16 block is never split, so its corner is not checked */
        let (oc, s) = if log_mvb_sz < 2 {
            let oc = block_oc(vx, vy, log_mvb_sz);
            if block.oc != oc {
                error!("block ({}, {}): oc should be {} (is {})", vx, vy, oc, block.oc);
                errors += 1;
            }
            (oc, self.block_split(vx, vy, oc, log_mvb_sz))
        } else {
            (0, 3)
        };
        if block.s != s {
            error!("block ({}, {}): s should be {} (is {})", vx, vy, s, block.s);
            errors += 1;
        }
        let sad = src.sad8(&self.grid, vx, vy, oc, s, log_mvb_sz);
        if block.sad != sad {
            error!("block ({}, {}): sad should be {} (is {})", vx, vy, sad, block.sad);
            errors += 1;
        }
        errors
    }

    /// Recomputes every block setup, block SAD and vector rate from scratch
    /// and compares them with the incrementally maintained ones. Returns the
    /// number of mismatches, each one logged as an error. Release builds
    /// skip the check and report none.
    #[cfg(debug_assertions)]
    pub(crate) fn check_rd_state<T: Pixel>(&self, src: &MeSource<T>, mv_res: u8) -> usize {
        let mut errors = 0;
        for vy in (0..self.nvmvbs).step_by(4) {
            for vx in (0..self.nhmvbs).step_by(4) {
                errors += self.check_block_state(src, vx, vy, 2);
            }
        }
        for vy in 0..self.nvmvbs {
            for vx in 0..self.nhmvbs {
                let pt = &self.grid[(vx, vy)];
                if !pt.valid {
                    continue;
                }
                let (pred, mv_rate) = if self.grid.is_border(vx, vy) {
                    ([0, 0], 0)
                } else {
                    let pred = self.grid.predictor(vx, vy, mc_level(vx, vy), mv_res);
                    let rate = mv_est_bits(
                        pt.mv[MV_X] >> mv_res,
                        pt.mv[MV_Y] >> mv_res,
                        pred[MV_X],
                        pred[MV_Y],
                    );
                    (pred, rate)
                };
                let node = self.node(vx, vy);
                if node.mv_rate != mv_rate {
                    error!(
                        "vertex ({}, {}): mv_rate should be {} (is {}), predictor {:?}, mv {:?}",
                        vx,
                        vy,
                        mv_rate,
                        node.mv_rate,
                        pred,
                        [pt.mv[MV_X] >> mv_res, pt.mv[MV_Y] >> mv_res]
                    );
                    errors += 1;
                }
            }
        }
        errors
    }

    #[cfg(not(debug_assertions))]
    pub(crate) fn check_rd_state<T: Pixel>(&self, _src: &MeSource<T>, _mv_res: u8) -> usize {
        0
    }
}

#[cfg(all(test, debug_assertions))]
mod test {
    use super::*;
    use crate::enc::test::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reports_stale_costs() {
        let cfg = EstimatorConfig::new(48, 32, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let f = random_frame(48, 32, 5);
        let up = f.upsample();
        let summary = est.estimate(&f, &up, RefKind::Previous, None).unwrap();
        assert_eq!(summary.check_errors, 0);
        let src = MeSource::new(&f, &up, true);
        let mv_res = est.grid.mv_res;
        assert_eq!(est.check_rd_state(&src, mv_res), 0);

        est.node_mut(4, 4).sad += 1;
        assert_eq!(est.check_rd_state(&src, mv_res), 1);
        est.node_mut(4, 4).sad -= 1;

        est.node_mut(4, 4).s = 1;
        assert_eq!(est.check_rd_state(&src, mv_res), 1);
        est.node_mut(4, 4).s = 3;

        /* a moved vector breaks its own rate and the SADs of its blocks */
        est.grid[(4, 4)].mv = [64, 64];
        assert!(est.check_rd_state(&src, mv_res) > 1);
    }

    #[test]
    fn merged_macroblocks_keep_their_corner() {
        let cfg = EstimatorConfig::new(64, 48, ChromaSampling::Cs420);
        let mut est = MvEstCtx::new(&cfg).unwrap();
        let f = random_frame(64, 48, 3);
        let up = f.upsample();
        let summary = est.estimate(&f, &up, RefKind::Previous, None).unwrap();
        assert_eq!(summary.check_errors, 0);
        let src = MeSource::new(&f, &up, true);
        /* an identical reference merges every macroblock up to 16x16 */
        assert_eq!(est.node(4, 4).log_mvb_sz, 2);
        let mv_res = est.grid.mv_res;
        for &oc in [1, 2, 3].iter() {
            est.node_mut(4, 4).oc = oc;
            assert_eq!(est.check_rd_state(&src, mv_res), 0, "oc {}", oc);
        }
    }
}
