use std::cmp;

use super::cost::*;
use super::pattern::*;
use super::*;

use log::*;

/* vertices whose vectors seed the set C candidates */
fn search_neighbors(vx: isize, vy: isize, level: usize, mvb: isize) -> [(isize, isize); 4] {
    if level == 0 {
        [(vx, vy - 4), (vx - 4, vy), (vx + 4, vy), (vx, vy + 4)]
    } else if level & 1 != 0 {
        [
            (vx - mvb, vy - mvb),
            (vx + mvb, vy - mvb),
            (vx - mvb, vy + mvb),
            (vx + mvb, vy + mvb),
        ]
    } else {
        [
            (vx, vy - mvb),
            (vx - mvb, vy),
            (vx + mvb, vy),
            (vx, vy + mvb),
        ]
    }
}

impl MvEstCtx {
    /* the hit cache marks vectors already tested by the current search;
    bumping the generation clears it */
    fn clear_hit_cache(&mut self) {
        self.hit_bit = self.hit_bit.wrapping_add(1);
        if self.hit_bit == 0 {
            for row in self.hit_cache.iter_mut() {
                *row = [0; 64];
            }
            self.hit_bit = 1;
        }
    }

    #[inline]
    fn hit(&self, mv: [i32; 2]) -> bool {
        self.hit_cache[(mv[MV_Y] + 32) as usize][(mv[MV_X] + 32) as usize] == self.hit_bit
    }

    #[inline]
    fn set_hit(&mut self, mv: [i32; 2]) {
        self.hit_cache[(mv[MV_Y] + 32) as usize][(mv[MV_X] + 32) as usize] = self.hit_bit;
    }

    /// Full-pel block matching search for the vertex at `(vx, vy)`.
    fn init_mv<T: Pixel>(&mut self, src: &MeSource<T>, r: usize, vx: isize, vy: isize) {
        let level = mc_level(vx, vy);
        let log = log_mvb_sz(level);
        let mvb = 1isize << log;
        let sz = mvb << 2;
        let bx = (vx - 2) << 2;
        let by = (vy - 2) << 2;
        /* the search window keeps the displaced block within 32 pixels of
        its own position and 16 pixels of the frame */
        let mvmin = [
            (cmp::max(bx - sz - 32, -16) - (bx - sz)) as i32,
            (cmp::max(by - sz - 32, -16) - (by - sz)) as i32,
        ];
        let mvmax = [
            (cmp::min(bx + sz + 32, self.frame_width + 16) - (bx + sz) - 1) as i32,
            (cmp::min(by + sz + 32, self.frame_height + 16) - (by + sz) - 1) as i32,
        ];
        let clamp = |mv: [i32; 2]| -> [i32; 2] {
            [
                cmp::max(mvmin[0], cmp::min(mvmax[0], mv[0])),
                cmp::max(mvmin[1], cmp::min(mvmax[1], mv[1])),
            ]
        };
        /* the block centred on the vertex */
        let bx = bx - (mvb << 1);
        let by = by - (mvb << 1);
        let lambda = self.lambda;

        let (cns, ncns) = pred_neighbors(vx, vy, level);
        let mut a = [[0i32; 4]; 2];
        let mut cands = [[0i32; 2]; 8];
        for (ci, &(cx, cy)) in cns[..ncns].iter().enumerate() {
            let mv = self.node(cx, cy).mvs[0][r];
            a[MV_X][ci] = mv[MV_X];
            a[MV_Y][ci] = mv[MV_Y];
            cands[ci] = clamp(mv);
        }

        /* set A: the median predictor, in half-pel for the rate */
        let mut pred = [0; 2];
        let cand;
        if ncns > 3 {
            pred[MV_X] = median4_sum(&mut a[MV_X]);
            pred[MV_Y] = median4_sum(&mut a[MV_Y]);
            cand = clamp([div2(pred[MV_X]), div2(pred[MV_Y])]);
        } else {
            let m = [median3(&mut a[MV_X]), median3(&mut a[MV_Y])];
            pred = [m[MV_X] << 1, m[MV_Y] << 1];
            cand = clamp(m);
        }

        let test = |mv: [i32; 2]| -> (i32, i32, i32) {
            let sad = src.bma_sad8(bx, by, mv, log);
            let rate = mv_est_bits(mv[MV_X] << 1, mv[MV_Y] << 1, pred[MV_X], pred[MV_Y]);
            (sad, rate, (sad << LAMBDA_SCALE) + rate * lambda)
        };

        self.clear_hit_cache();
        let mut best_vec = cand;
        let (mut best_sad, mut best_rate, mut best_cost) = test(cand);
        self.set_hit(cand);

        if best_sad > self.thresh1[log] {
            let node = *self.node(vx, vy);
            /* the termination threshold follows the SADs this vertex and
            its neighbours achieved on the previous frame */
            let mut t2 = node.bma_sad;
            for &(cx, cy) in cns[..ncns].iter() {
                let log_c = log_mvb_sz(mc_level(cx, cy));
                let shift = (log_c.saturating_sub(log) << 1) as u32;
                t2 = cmp::min(t2, self.node(cx, cy).bma_sad >> shift);
            }
            t2 += (t2 >> 3) + self.thresh2_offs[log];

            /* set B: the neighbours, this vertex last frame, and zero */
            cands[ncns] = clamp(node.mvs[1][r]);
            cands[ncns + 1] = [0, 0];
            for &c in cands[..ncns + 2].iter() {
                if self.hit(c) {
                    continue;
                }
                let (sad, rate, cost) = test(c);
                if cost < best_cost {
                    best_vec = c;
                    best_sad = sad;
                    best_rate = rate;
                    best_cost = cost;
                }
                self.set_hit(c);
            }

            if best_sad > t2 {
                /* set C: the search neighbours last frame and a constant
                acceleration extrapolation of this vertex */
                let pns = search_neighbors(vx, vy, level, mvb);
                let mut cands = [[0i32; 2]; 5];
                for (ci, &(px, py)) in pns.iter().enumerate() {
                    cands[ci] = clamp(self.node(px, py).mvs[1][r]);
                }
                let w = self.mvapw[r];
                let mut accel = [0; 2];
                for c in 0..2 {
                    let x = node.mvs[1][r][c] as i64 * w[0] - node.mvs[2][r][c] as i64 * w[1];
                    accel[c] = div_round_pow2(x, 16, 0x8000) as i32;
                }
                cands[4] = clamp(accel);
                for &c in cands.iter() {
                    if self.hit(c) {
                        continue;
                    }
                    let (sad, rate, cost) = test(c);
                    if cost < best_cost {
                        best_vec = c;
                        best_sad = sad;
                        best_rate = rate;
                        best_cost = cost;
                    }
                    self.set_hit(c);
                }

                if best_sad > t2 {
                    /* pattern search from the best candidate so far */
                    let mut state = 0;
                    loop {
                        let mut best_site = SITE_CENTER;
                        let b = boundary_case(best_vec, mvmin, mvmax);
                        for &site in SEARCH_PATTERNS[state].sites(b) {
                            let c = [
                                best_vec[MV_X] + SITE_DX[site],
                                best_vec[MV_Y] + SITE_DY[site],
                            ];
                            /* the distance 2 sites may step past the window */
                            if site > 8
                                && (c[0] < mvmin[0]
                                    || c[0] > mvmax[0]
                                    || c[1] < mvmin[1]
                                    || c[1] > mvmax[1])
                            {
                                continue;
                            }
                            if self.hit(c) {
                                continue;
                            }
                            let (sad, rate, cost) = test(c);
                            if cost < best_cost {
                                best_sad = sad;
                                best_rate = rate;
                                best_cost = cost;
                                best_site = site;
                            }
                            self.set_hit(c);
                        }
                        state = SEARCH_STATES[state][best_site] as usize;
                        best_vec[MV_X] += SITE_DX[best_site];
                        best_vec[MV_Y] += SITE_DY[best_site];
                        if state >= SEARCH_STATE_DONE {
                            break;
                        }
                    }
                }
            }
        }

        trace!(
            "search ({}, {}): ({}, {}) sad {} rate {}",
            vx,
            vy,
            best_vec[MV_X],
            best_vec[MV_Y],
            best_sad,
            best_rate
        );
        let node = self.node_mut(vx, vy);
        node.mvs[0][r] = best_vec;
        node.bma_sad = best_sad;
        node.mv_rate = best_rate;
        self.grid[(vx, vy)].mv = [best_vec[MV_X] << MV_FRAC_BITS, best_vec[MV_Y] << MV_FRAC_BITS];
    }

    /// Stage 1: searches every interior vertex up to `level_max`, coarse
    /// levels of a macroblock before the finer ones that predict from them.
    /// Returns the number of vertices searched.
    pub(crate) fn init_mvs<T: Pixel>(&mut self, src: &MeSource<T>, r: usize) -> usize {
        let nhmvbs = self.nhmvbs;
        let nvmvbs = self.nvmvbs;
        let level_max = self.cfg.level_max as usize;
        for vy in 2..=nvmvbs - 2 {
            for vx in 2..=nhmvbs - 2 {
                let node = self.node_mut(vx, vy);
                node.mvs[2][r] = node.mvs[1][r];
                node.mvs[1][r] = node.mvs[0][r];
            }
        }

        let mut searched = 0;
        let mut search = |est: &mut MvEstCtx, vx: isize, vy: isize| {
            est.init_mv(src, r, vx, vy);
            searched += 1;
        };
        for vy in (4..=nvmvbs).step_by(4) {
            for vx in (4..=nhmvbs).step_by(4) {
                let mut b = ((vx < nhmvbs) as usize) << 1 | ((vy < nvmvbs) as usize) << 3;
                if b & 0xA == 0xA {
                    search(self, vx, vy);
                }
                if level_max < 1 {
                    continue;
                }
                search(self, vx - 2, vy - 2);
                if level_max < 2 {
                    continue;
                }
                if b & 2 != 0 {
                    search(self, vx, vy - 2);
                }
                if b & 8 != 0 {
                    search(self, vx - 2, vy);
                }
                if level_max < 3 {
                    continue;
                }
                b |= (vx > 4) as usize | ((vy > 4) as usize) << 2;
                if b & 4 != 0 {
                    if b & 1 != 0 {
                        search(self, vx - 3, vy - 3);
                    }
                    if b & 2 != 0 {
                        search(self, vx - 1, vy - 3);
                    }
                }
                if b & 8 != 0 {
                    if b & 1 != 0 {
                        search(self, vx - 3, vy - 1);
                    }
                    if b & 2 != 0 {
                        search(self, vx - 1, vy - 1);
                    }
                }
                if level_max < 4 {
                    continue;
                }
                if b & 1 != 0 {
                    search(self, vx - 3, vy - 2);
                }
                if b & 2 != 0 {
                    search(self, vx - 1, vy - 2);
                }
                if b & 4 != 0 {
                    search(self, vx - 2, vy - 3);
                    if b & 2 != 0 {
                        search(self, vx, vy - 3);
                    }
                }
                if b & 8 != 0 {
                    search(self, vx - 2, vy - 1);
                    if b & 1 != 0 {
                        search(self, vx - 3, vy);
                    }
                    if b & 2 != 0 {
                        search(self, vx, vy - 1);
                        search(self, vx - 1, vy);
                    }
                }
            }
        }
        searched
    }
}
