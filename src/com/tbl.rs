/* hierarchical level of a vertex, by position modulo 4 */
pub(crate) static MC_LEVEL: [[usize; 4]; 4] =
    [[0, 4, 2, 4], [4, 3, 4, 3], [2, 4, 1, 4], [4, 3, 4, 3]];

/* block corner offsets, clockwise from the top-left */
pub(crate) static VERT_DX: [isize; 4] = [0, 1, 1, 0];
pub(crate) static VERT_DY: [isize; 4] = [0, 0, 1, 1];
