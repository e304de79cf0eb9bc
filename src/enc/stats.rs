use super::*;

impl MvEstCtx {
    /// Counts edge label patterns of the finished mesh, each in the context
    /// of the labels a decoder would already know.
    pub(crate) fn label_stats(&self) -> LabelStats {
        let mut stats = LabelStats::default();
        let grid = &self.grid;
        let (nhmvbs, nvmvbs) = (self.nhmvbs, self.nvmvbs);
        let flags_of = |pt: &MvGridPt| pt.right as usize | (pt.down as usize) << 1;

        /* level 0, in the context of the left and upper neighbours */
        for vy in (0..=nvmvbs).step_by(4) {
            for vx in (0..=nhmvbs).step_by(4) {
                let pred = match (vx > 0, vy > 0) {
                    (true, true) => {
                        grid[(vx - 4, vy)].right as usize | (grid[(vx, vy - 4)].down as usize) << 1
                    }
                    (false, true) => {
                        let d = grid[(vx, vy - 4)].down as usize;
                        d | d << 1
                    }
                    (true, false) => {
                        let r = grid[(vx - 4, vy)].right as usize;
                        r | r << 1
                    }
                    (false, false) => 0,
                };
                stats.l0flags[pred][flags_of(&grid[(vx, vy)])] += 1;
            }
        }

        /* vertices halfway along a horizontal or vertical edge */
        for step in &[2isize, 1] {
            let step = *step;
            let mut lh = |vx: isize, vy: isize| {
                if !grid.is_valid(vx, vy) {
                    return;
                }
                let pred = grid[(vx - step, vy)].right as usize;
                let mut flags = (grid[(vx, vy)].right as usize) << 2;
                if vy > 0 {
                    flags |= grid[(vx, vy - step)].down as usize;
                }
                if vy < nvmvbs {
                    flags |= (grid[(vx, vy)].down as usize) << 1;
                }
                stats.lhflags[pred][flags] += 1;
            };
            for vy in (0..=nvmvbs).step_by((step << 1) as usize) {
                for vx in (step..=nhmvbs).step_by((step << 1) as usize) {
                    lh(vx, vy);
                }
            }
            let mut lv = |vx: isize, vy: isize| {
                if !grid.is_valid(vx, vy) {
                    return;
                }
                let pred = grid[(vx, vy - step)].down as usize;
                let mut flags = (grid[(vx, vy)].down as usize) << 2;
                if vx > 0 {
                    flags |= grid[(vx - step, vy)].right as usize;
                }
                if vx < nhmvbs {
                    flags |= (grid[(vx, vy)].right as usize) << 1;
                }
                stats.lvflags[pred][flags] += 1;
            };
            for vy in (step..=nvmvbs).step_by((step << 1) as usize) {
                for vx in (0..=nhmvbs).step_by((step << 1) as usize) {
                    lv(vx, vy);
                }
            }
        }

        for pred in 0..4 {
            debug!("l0flags[{}|{}] = {:?}", pred & 1, pred & 2, stats.l0flags[pred]);
        }
        for pred in 0..2 {
            debug!("lhflags[{}] = {:?}", pred, stats.lhflags[pred]);
            debug!("lvflags[{}] = {:?}", pred, stats.lvflags[pred]);
        }
        stats
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labelled(flags: McFlags) -> MvEstCtx {
        let mut cfg = EstimatorConfig::new(32, 32, ChromaSampling::Cs420);
        cfg.flags = flags;
        let mut est = MvEstCtx::new(&cfg).unwrap();
        est.init_nodes();
        est
    }

    #[test]
    fn all_b_mesh() {
        let est = labelled(McFlags::USEB);
        let stats = est.label_stats();
        /* a 3x3 macroblock mesh has 4x4 level 0 vertices */
        assert_eq!(stats.l0flags[0][0], 16);
        assert_eq!(stats.l0flags.iter().flatten().sum::<u32>(), 16);
        assert!(stats.lhflags[1].iter().all(|&n| n == 0));
        assert!(stats.lvflags[1].iter().all(|&n| n == 0));
        assert_eq!(stats.lhflags[0][0], stats.lhflags[0].iter().sum::<u32>());
    }

    #[test]
    fn all_v_mesh() {
        let est = labelled(McFlags::USEV);
        let stats = est.label_stats();
        assert_eq!(stats.l0flags[0][3], 1);
        assert_eq!(stats.l0flags[3][3], 15);
        /* every counted edge vertex sees V on all sides, except on the
        bottom or right picture edge */
        assert_eq!(stats.lhflags[0].iter().sum::<u32>(), 0);
        assert!(stats.lhflags[1][7] > 0);
        assert!(stats.lvflags[1][7] > 0);
    }

    #[test]
    fn counts_only_valid_vertices() {
        let mut cfg = EstimatorConfig::new(32, 32, ChromaSampling::Cs420);
        cfg.level_max = 0;
        let mut est = MvEstCtx::new(&cfg).unwrap();
        est.init_nodes();
        let stats = est.label_stats();
        assert_eq!(stats.lhflags, [[0; 8]; 2]);
        assert_eq!(stats.lvflags, [[0; 8]; 2]);
        assert_eq!(stats.l0flags[0][0], 16);
    }
}
