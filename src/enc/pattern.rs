/* site offsets: a 3x3 square (4 is the centre) and 4 sites at distance 2 */
pub(crate) static SITE_DX: [i32; 13] = [-1, 0, 1, -1, 0, 1, -1, 0, 1, -2, 0, 2, 0];
pub(crate) static SITE_DY: [i32; 13] = [-1, -1, -1, 0, 0, 0, 1, 1, 1, 0, -2, 0, 2];

/* the centre site, "stay" */
pub(crate) const SITE_CENTER: usize = 4;

/* boundary case bits of a vector against its search window */
pub(crate) const BOUND_XMIN: usize = 1;
pub(crate) const BOUND_XMAX: usize = 2;
pub(crate) const BOUND_YMIN: usize = 4;
pub(crate) const BOUND_YMAX: usize = 8;

const NCASES: usize = 11;

/// The sites of one search pattern, for each boundary case.
#[derive(Debug)]
pub(crate) struct SearchPattern {
    nsites: [usize; NCASES],
    sites: [[usize; 8]; NCASES],
}

impl SearchPattern {
    /// Sites that stay inside the window for boundary case `b`.
    #[inline]
    pub(crate) fn sites(&self, b: usize) -> &[usize] {
        if b >= NCASES {
            return &[];
        }
        &self.sites[b][..self.nsites[b]]
    }
}

pub(crate) static DIAMOND: SearchPattern = SearchPattern {
    nsites: [4, 3, 3, 0, 3, 2, 2, 0, 3, 2, 2],
    sites: [
        [1, 3, 5, 7, 0, 0, 0, 0],
        [1, 5, 7, 0, 0, 0, 0, 0],
        [1, 3, 7, 0, 0, 0, 0, 0],
        [0; 8],
        [3, 5, 7, 0, 0, 0, 0, 0],
        [5, 7, 0, 0, 0, 0, 0, 0],
        [3, 7, 0, 0, 0, 0, 0, 0],
        [0; 8],
        [1, 3, 5, 0, 0, 0, 0, 0],
        [1, 5, 0, 0, 0, 0, 0, 0],
        [1, 3, 0, 0, 0, 0, 0, 0],
    ],
};

/* horizontal hexagon */
pub(crate) static HHEX: SearchPattern = SearchPattern {
    nsites: [6, 3, 3, 0, 4, 2, 2, 0, 4, 2, 2],
    sites: [
        [0, 2, 6, 8, 9, 11, 0, 0],
        [2, 8, 11, 0, 0, 0, 0, 0],
        [0, 6, 9, 0, 0, 0, 0, 0],
        [0; 8],
        [6, 8, 9, 11, 0, 0, 0, 0],
        [8, 11, 0, 0, 0, 0, 0, 0],
        [6, 9, 0, 0, 0, 0, 0, 0],
        [0; 8],
        [0, 2, 9, 11, 0, 0, 0, 0],
        [2, 11, 0, 0, 0, 0, 0, 0],
        [0, 9, 0, 0, 0, 0, 0, 0],
    ],
};

/* vertical hexagon */
pub(crate) static VHEX: SearchPattern = SearchPattern {
    nsites: [6, 4, 4, 0, 3, 2, 2, 0, 3, 2, 2],
    sites: [
        [0, 2, 6, 8, 10, 12, 0, 0],
        [2, 8, 10, 12, 0, 0, 0, 0],
        [0, 6, 10, 12, 0, 0, 0, 0],
        [0; 8],
        [6, 8, 12, 0, 0, 0, 0, 0],
        [8, 12, 0, 0, 0, 0, 0, 0],
        [6, 12, 0, 0, 0, 0, 0, 0],
        [0; 8],
        [0, 2, 10, 0, 0, 0, 0, 0],
        [2, 10, 0, 0, 0, 0, 0, 0],
        [0, 10, 0, 0, 0, 0, 0, 0],
    ],
};

/* the search state reached once a local minimum is found */
pub(crate) const SEARCH_STATE_DONE: usize = 6;

/* pattern used in each search state */
pub(crate) static SEARCH_PATTERNS: [&SearchPattern; 6] =
    [&DIAMOND, &DIAMOND, &DIAMOND, &HHEX, &VHEX, &DIAMOND];

/* successor state given the current state and the winning site,
   starting from small diamonds and settling on a hexagon along the
   first step direction, with a final small diamond */
pub(crate) static SEARCH_STATES: [[i8; 13]; 6] = [
    [-1, 2, -1, 1, 6, 1, -1, 2, -1, -1, -1, -1, -1],
    [-1, 3, -1, 3, 6, 3, -1, 3, -1, -1, -1, -1, -1],
    [-1, 4, -1, 4, 6, 4, -1, 4, -1, -1, -1, -1, -1],
    [3, -1, 3, -1, 5, -1, 3, -1, 3, 3, -1, 3, -1],
    [4, -1, 4, -1, 5, -1, 4, -1, 4, -1, 4, -1, 4],
    [-1, 6, -1, 6, 6, 6, -1, 6, -1, -1, -1, -1, -1],
];

/// Boundary case of `mv` inside `[min, max]`.
#[inline]
pub(crate) fn boundary_case(mv: [i32; 2], min: [i32; 2], max: [i32; 2]) -> usize {
    (mv[0] <= min[0]) as usize * BOUND_XMIN
        | (mv[0] >= max[0]) as usize * BOUND_XMAX
        | (mv[1] <= min[1]) as usize * BOUND_YMIN
        | (mv[1] >= max[1]) as usize * BOUND_YMAX
}
