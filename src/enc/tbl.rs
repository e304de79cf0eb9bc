/* (dx, dy) offset to a vertex */
pub(crate) type Offset = (isize, isize);

/* a block whose SAD changes when a vertex goes away */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ErrNode {
    pub(crate) dx: isize,
    pub(crate) dy: isize,
    pub(crate) log_mvb_sz: usize,
}

const fn en(dx: isize, dy: isize, log_mvb_sz: usize) -> ErrNode {
    ErrNode { dx, dy, log_mvb_sz }
}

/*****************************************************************************
 * ancestors: vertices whose removal cost depends on a vertex
 * (level 0 vertices are never decimated and are left out)
 *****************************************************************************/
static ANCESTORS2: [[Offset; 2]; 2] = [[(0, -2), (0, 2)], [(-2, 0), (2, 0)]];

static ANCESTORS3: [[Offset; 5]; 4] = [
    [(1, -1), (-1, 1), (1, -3), (-3, 1), (1, 1)],
    [(-1, -1), (1, 1), (-1, -3), (-1, 1), (3, 1)],
    [(-1, -1), (1, 1), (-3, -1), (1, -1), (1, 3)],
    [(1, -1), (-1, 1), (-1, -1), (3, -1), (-1, 3)],
];

static ANCESTORS4: [[Offset; 9]; 8] = [
    [(0, -1), (0, 1), (-1, -2), (1, 0), (-1, 2), (-3, -2), (1, -2), (-3, 2), (1, 2)],
    [(0, -1), (0, 1), (1, -2), (-1, 0), (1, 2), (-1, -2), (3, -2), (-1, 2), (3, 2)],
    [(-1, 0), (1, 0), (-2, -1), (2, -1), (0, 1), (-2, -3), (2, -3), (-2, 1), (2, 1)],
    [(-1, 0), (1, 0), (0, -1), (-2, 1), (2, 1), (0, -3), (-4, 1), (0, 1), (4, 1)],
    [(0, -1), (0, 1), (1, -2), (-1, 0), (1, 2), (1, -4), (-3, 0), (1, 0), (1, 4)],
    [(0, -1), (0, 1), (-1, -2), (1, 0), (-1, 2), (-1, -4), (-1, 0), (3, 0), (-1, 4)],
    [(-1, 0), (1, 0), (0, -1), (-2, 1), (2, 1), (-2, -1), (2, -1), (-2, 3), (2, 3)],
    [(-1, 0), (1, 0), (-2, -1), (2, -1), (0, 1), (-4, -1), (0, -1), (4, -1), (0, 3)],
];

/// Ancestors of the vertex at `(vx, vy)`, indexed by position modulo 4.
#[inline]
pub(crate) fn ancestors(vx: isize, vy: isize) -> &'static [Offset] {
    match ((vy & 3), (vx & 3)) {
        (0, 1) => &ANCESTORS4[0],
        (0, 2) => &ANCESTORS2[0],
        (0, 3) => &ANCESTORS4[1],
        (1, 0) => &ANCESTORS4[2],
        (1, 1) => &ANCESTORS3[0],
        (1, 2) => &ANCESTORS4[3],
        (1, 3) => &ANCESTORS3[1],
        (2, 0) => &ANCESTORS2[1],
        (2, 1) => &ANCESTORS4[4],
        (2, 3) => &ANCESTORS4[5],
        (3, 0) => &ANCESTORS4[6],
        (3, 1) => &ANCESTORS3[2],
        (3, 2) => &ANCESTORS4[7],
        (3, 3) => &ANCESTORS3[3],
        _ => &[],
    }
}

/*****************************************************************************
 * merge domains, finest vertices first, ending with the vertex itself
 *****************************************************************************/
static MERGEDOM4: [Offset; 1] = [(0, 0)];

static MERGEDOM3: [Offset; 5] = [(0, -1), (-1, 0), (1, 0), (0, 1), (0, 0)];

static MERGEDOM2: [Offset; 17] = [
    (-1, -2), (1, -2), (-2, -1), (0, -1), (2, -1), (-1, 0),
    (1, 0), (-2, 1), (0, 1), (2, 1), (-1, 2), (1, 2),
    (-1, -1), (1, -1), (-1, 1), (1, 1), (0, 0),
];

static MERGEDOM1: [Offset; 49] = [
    (-1, -4), (1, -4), (-2, -3), (0, -3), (2, -3), (-3, -2),
    (-1, -2), (1, -2), (3, -2), (-4, -1), (-2, -1), (0, -1),
    (2, -1), (4, -1), (-3, 0), (-1, 0), (1, 0), (3, 0),
    (-4, 1), (-2, 1), (0, 1), (2, 1), (4, 1), (-3, 2),
    (-1, 2), (1, 2), (3, 2), (-2, 3), (0, 3), (2, 3),
    (-1, 4), (1, 4), (-1, -3), (1, -3), (-3, -1), (-1, -1),
    (1, -1), (3, -1), (-3, 1), (-1, 1), (1, 1), (3, 1),
    (-1, 3), (1, 3), (0, -2), (-2, 0), (2, 0), (0, 2),
    (0, 0),
];

/* indexed by level - 1 */
pub(crate) static MERGEDOM: [&[Offset]; 4] = [&MERGEDOM1, &MERGEDOM2, &MERGEDOM3, &MERGEDOM4];

/*****************************************************************************
 * error domains: blocks whose SAD changes when a vertex is decimated
 *****************************************************************************/
pub(crate) static ERRDOM4: [ErrNode; 4] = [en(-1, -1, 0), en(0, -1, 0), en(-1, 0, 0), en(0, 0, 0)];

static ERRDOM3: [ErrNode; 9] = [
    en(-1, -2, 0), en(0, -2, 0), en(-2, -1, 0), en(1, -1, 0),
    en(-2, 0, 0), en(1, 0, 0), en(-1, 1, 0), en(0, 1, 0),
    en(-1, -1, 1),
];

static ERRDOM2: [ErrNode; 20] = [
    en(-2, -3, 0), en(-1, -3, 0), en(0, -3, 0), en(1, -3, 0),
    en(-3, -2, 0), en(2, -2, 0), en(-3, -1, 0), en(2, -1, 0),
    en(-3, 0, 0), en(2, 0, 0), en(-3, 1, 0), en(2, 1, 0),
    en(-2, 2, 0), en(-1, 2, 0), en(0, 2, 0), en(1, 2, 0),
    en(-2, -2, 1), en(0, -2, 1), en(-2, 0, 1), en(0, 0, 1),
];

static ERRDOM1: [ErrNode; 37] = [
    en(-2, -5, 0), en(-1, -5, 0), en(0, -5, 0), en(1, -5, 0),
    en(-3, -4, 0), en(2, -4, 0), en(-4, -3, 0), en(-3, -3, 0),
    en(2, -3, 0), en(3, -3, 0), en(-5, -2, 0), en(4, -2, 0),
    en(-5, -1, 0), en(4, -1, 0), en(-5, 0, 0), en(4, 0, 0),
    en(-5, 1, 0), en(4, 1, 0), en(-4, 2, 0), en(-3, 2, 0),
    en(2, 2, 0), en(3, 2, 0), en(-3, 3, 0), en(2, 3, 0),
    en(-2, 4, 0), en(-1, 4, 0), en(0, 4, 0), en(1, 4, 0),
    en(-2, -4, 1), en(0, -4, 1), en(-4, -2, 1), en(2, -2, 1),
    en(-4, 0, 1), en(2, 0, 1), en(-2, 2, 1), en(0, 2, 1),
    en(-2, -2, 2),
];

/* indexed by level - 1 */
pub(crate) static ERRDOM: [&[ErrNode]; 4] = [&ERRDOM1, &ERRDOM2, &ERRDOM3, &ERRDOM4];

/*****************************************************************************
 * vertices whose predictor reads a vertex, as seen by the row and column
 * passes; the leading entries may still change further along the path
 *****************************************************************************/
static ROW_PREDICTED0: [Offset; 17] = [
    (2, -2), (1, -1), (2, 2), (1, 1), (0, 4), (4, 4),
    (-2, -2), (0, -2), (-1, -1), (0, -1), (-1, 0), (-2, 0),
    (-1, 1), (0, 1), (-2, 2), (0, 2), (-4, 4),
];
static ROW_PREDICTED1: [Offset; 10] = [
    (1, -1), (1, 1),
    (0, -2), (-1, -1), (0, -1), (-2, 0), (-1, 0), (-1, 1), (0, 1), (0, 2),
];
static ROW_PREDICTED2: [Offset; 7] = [
    (1, -1), (1, 1),
    (-1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1),
];
static ROW_PREDICTED3: [Offset; 3] = [(0, -1), (-1, 0), (0, 1)];

static COL_PREDICTED0: [Offset; 17] = [
    (2, 2), (-2, 2), (-1, 1), (1, 1), (4, 4),
    (-2, -2), (0, -2), (2, -2), (-1, -1), (0, -1), (1, -1),
    (-2, 0), (-1, 0), (1, 0), (2, 0), (4, 0), (-4, 4),
];
static COL_PREDICTED1: [Offset; 10] = [
    (-1, 1), (1, 1),
    (0, -2), (-1, -1), (0, -1), (1, -1), (-2, 0), (-1, 0), (1, 0), (2, 0),
];
static COL_PREDICTED2: [Offset; 7] = [
    (-1, 1), (1, 1),
    (-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0),
];
static COL_PREDICTED3: [Offset; 3] = [(0, -1), (-1, 0), (1, 0)];

/* indexed by level */
pub(crate) static ROW_PREDICTED: [&[Offset]; 5] =
    [&ROW_PREDICTED0, &ROW_PREDICTED1, &ROW_PREDICTED2, &ROW_PREDICTED3, &[]];
pub(crate) static COL_PREDICTED: [&[Offset]; 5] =
    [&COL_PREDICTED0, &COL_PREDICTED1, &COL_PREDICTED2, &COL_PREDICTED3, &[]];
pub(crate) static NROW_PRED_CHANGEABLE: [usize; 5] = [6, 2, 2, 0, 0];
pub(crate) static NCOL_PRED_CHANGEABLE: [usize; 5] = [5, 2, 2, 0, 0];

/* trellis history to restore so predicted vectors are evaluated correctly */
pub(crate) static PRED_HIST_SIZE: [isize; 5] = [8, 4, 2, 2, 1];

/* most predicted vertices of any level */
pub(crate) const MAX_PREDICTED: usize = 17;
