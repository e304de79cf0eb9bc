pub mod mc;
pub mod mesh;
pub(crate) mod tbl;
pub(crate) mod tracer;
pub(crate) mod util;

pub(crate) use tbl::*;
pub(crate) use util::*;

/*****************************************************************************
 * constants
 *****************************************************************************/
pub(crate) const Y_C: usize = 0; /* Y luma */
pub(crate) const U_C: usize = 1; /* Cb Chroma */
pub(crate) const V_C: usize = 2; /* Cr Chroma */
pub const N_C: usize = 3; /* number of color component */

/* X direction motion vector indicator */
pub(crate) const MV_X: usize = 0;
/* Y direction motion vector indicator */
pub(crate) const MV_Y: usize = 1;

/* log2 of the macroblock size */
pub(crate) const LOG_MBSIZE: usize = 4;
/* grid cells per macroblock side */
pub(crate) const MVBS_PER_MB: usize = 4;

/* distortion scale of the Lagrangian */
pub(crate) const LAMBDA_SCALE: u32 = 2;
/* chroma SAD downshift */
pub(crate) const CHROMA_SCALE: u32 = 2;

/* 1/8 pel units per full pel */
pub(crate) const MV_FRAC_BITS: u32 = 3;

/* number of motion vector history frames */
pub(crate) const MV_HIST: usize = 3;
/* number of reference selectors */
pub(crate) const NREFS: usize = 2;

#[inline]
pub fn mc_level(vx: isize, vy: isize) -> usize {
    MC_LEVEL[(vy & 3) as usize][(vx & 3) as usize]
}

#[inline]
pub fn log_mvb_sz(level: usize) -> usize {
    (4 - level) >> 1
}
