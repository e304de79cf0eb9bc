use std::io;

use thiserror::Error;

pub mod config;
pub mod frame;

pub use crate::com::mesh::{MvGrid, MvGridPt};
pub use config::*;
use frame::*;

use crate::enc::*;

/*****************************************************************************
 * errors
 *****************************************************************************/
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("allocation of {0} failed")]
    OutOfMemory(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("frame geometry mismatch: {0}")]
    FrameMismatch(String),
    #[error("io error")]
    Io(#[from] io::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(C)]
pub enum ChromaSampling {
    Cs400,
    Cs420,
    Cs422,
    Cs444,
}

impl Default for ChromaSampling {
    fn default() -> Self {
        ChromaSampling::Cs420
    }
}

impl From<u8> for ChromaSampling {
    fn from(val: u8) -> Self {
        use self::ChromaSampling::*;
        match val {
            0 => Cs400,
            1 => Cs420,
            2 => Cs422,
            _ => Cs444,
        }
    }
}

impl ChromaSampling {
    // Provides the sampling period in the horizontal and vertical axes.
    pub fn sampling_period(self) -> (usize, usize) {
        use self::ChromaSampling::*;
        match self {
            Cs420 => (2, 2),
            Cs422 => (2, 1),
            Cs444 => (1, 1),
            Cs400 => (2, 2),
        }
    }

    // log2 of the sampling period.
    pub fn decimation(self) -> (usize, usize) {
        let (px, py) = self.sampling_period();
        (px >> 1, py >> 1)
    }
}

/// Which motion vector history a search reads and writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(C)]
pub enum RefKind {
    Previous = 0,
    Golden = 1,
}

impl Default for RefKind {
    fn default() -> Self {
        RefKind::Previous
    }
}

/// Hook for inspecting the mesh between estimator stages.
pub trait MeshObserver {
    fn post_search(&mut self, _grid: &MvGrid) {}
    fn post_decimation(&mut self, _grid: &MvGrid) {}
    fn post_refinement(&mut self, _grid: &MvGrid) {}
}

/// Edge label pattern counts of a finished mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelStats {
    // level 0 labels, context from the left and up neighbours
    pub l0flags: [[u32; 4]; 4],
    // horizontal labels of level 2 and 4 vertices
    pub lhflags: [[u32; 8]; 2],
    // vertical labels of level 2 and 4 vertices
    pub lvflags: [[u32; 8]; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EstimateSummary {
    // number of vertices searched in stage 1
    pub searched: usize,
    // number of vertices removed by decimation
    pub decimated: usize,
    // cost change of the full-pel refinement passes
    pub fullpel_dcost: i64,
    // cost change of the sub-pel refinement passes
    pub subpel_dcost: i64,
    // chosen vector resolution, 0 is 1/8 pel
    pub mv_res: u8,
    // valid vertices left in the mesh
    pub valid: usize,
    // consistency check mismatches, always 0 in release builds
    pub check_errors: usize,
    pub labels: LabelStats,
}

pub struct Estimator {
    est: MvEstCtx,
}

impl Estimator {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self, MeshError> {
        Ok(Estimator {
            est: MvEstCtx::new(cfg)?,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.est.cfg
    }

    /// Estimates the mesh of `input` against the 2x upsampled `reference`.
    pub fn estimate<T: Pixel>(
        &mut self,
        input: &Frame<T>,
        reference: &Frame<T>,
        ref_kind: RefKind,
    ) -> Result<EstimateSummary, MeshError> {
        self.est.estimate(input, reference, ref_kind, None)
    }

    pub fn estimate_with_observer<T: Pixel>(
        &mut self,
        input: &Frame<T>,
        reference: &Frame<T>,
        ref_kind: RefKind,
        observer: &mut dyn MeshObserver,
    ) -> Result<EstimateSummary, MeshError> {
        self.est.estimate(input, reference, ref_kind, Some(observer))
    }

    pub fn mesh(&self) -> &MvGrid {
        &self.est.grid
    }
}
