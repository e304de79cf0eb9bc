use std::ops::{BitOr, BitOrAssign};

use crate::api::*;

pub const DEFAULT_LAMBDA: i32 = 452;
pub const MAX_LEVEL: u8 = 4;
/* finest vector resolution index, 1/8 pel */
pub const MV_RES_FINEST: u8 = 0;
/* coarsest vector resolution index, 1/2 pel */
pub const MV_RES_COARSEST: u8 = 2;

/// Estimator switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McFlags(u8);

impl McFlags {
    /// Bilinear (B) edge labels are allowed.
    pub const USEB: McFlags = McFlags(1);
    /// Vertex-copy (V) edge labels are allowed.
    pub const USEV: McFlags = McFlags(2);
    /// Chroma planes contribute to the SAD.
    pub const USE_CHROMA: McFlags = McFlags(4);

    pub const fn empty() -> Self {
        McFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u8) -> Self {
        McFlags(bits & 7)
    }

    #[inline]
    pub fn contains(self, other: McFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: McFlags, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl Default for McFlags {
    fn default() -> Self {
        McFlags::USEB | McFlags::USE_CHROMA
    }
}

impl BitOr for McFlags {
    type Output = McFlags;
    fn bitor(self, rhs: McFlags) -> McFlags {
        McFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for McFlags {
    fn bitor_assign(&mut self, rhs: McFlags) {
        self.0 |= rhs.0;
    }
}

// Estimator settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EstimatorConfig {
    // Width of the picture in pixels.
    pub width: usize,
    // Height of the picture in pixels.
    pub height: usize,
    // Chroma subsampling.
    pub chroma_sampling: ChromaSampling,

    pub flags: McFlags,
    // The coarsest level decimation may reach.
    pub level_min: u8,
    // The finest level the mesh may use.
    pub level_max: u8,
    // The finest vector resolution sub-pel refinement may try.
    pub mv_res_min: u8,
    // Lagrange multiplier for 8 bit luma.
    pub lambda: i32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            width: 0,
            height: 0,
            chroma_sampling: ChromaSampling::Cs420,
            flags: McFlags::default(),
            level_min: 0,
            level_max: 3,
            mv_res_min: MV_RES_FINEST,
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl EstimatorConfig {
    pub fn new(width: usize, height: usize, chroma_sampling: ChromaSampling) -> Self {
        EstimatorConfig {
            width,
            height,
            chroma_sampling,
            ..Default::default()
        }
    }

    /// Frame width in macroblocks.
    pub fn nhmbs(&self) -> usize {
        (self.width + 15) >> 4
    }

    /// Frame height in macroblocks.
    pub fn nvmbs(&self) -> usize {
        (self.height + 15) >> 4
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if self.width == 0 || self.height == 0 {
            return Err(MeshError::InvalidConfig(format!(
                "frame size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.level_max > MAX_LEVEL {
            return Err(MeshError::InvalidConfig(format!(
                "level_max {} exceeds {}",
                self.level_max, MAX_LEVEL
            )));
        }
        if self.level_min > self.level_max {
            return Err(MeshError::InvalidConfig(format!(
                "level_min {} exceeds level_max {}",
                self.level_min, self.level_max
            )));
        }
        if !self.flags.contains(McFlags::USEB) && !self.flags.contains(McFlags::USEV) {
            return Err(MeshError::InvalidConfig(
                "no edge label type enabled".to_owned(),
            ));
        }
        if self.mv_res_min > MV_RES_COARSEST {
            return Err(MeshError::InvalidConfig(format!(
                "mv_res_min {} exceeds {}",
                self.mv_res_min, MV_RES_COARSEST
            )));
        }
        if self.lambda < 0 {
            return Err(MeshError::InvalidConfig(format!(
                "lambda {} is negative",
                self.lambda
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = EstimatorConfig::new(64, 48, ChromaSampling::Cs420);
        assert!(cfg.validate().is_ok());
        assert!(cfg.flags.contains(McFlags::USEB));
        assert!(!cfg.flags.contains(McFlags::USEV));
        assert!(cfg.flags.contains(McFlags::USE_CHROMA));
        assert_eq!(cfg.nhmbs(), 4);
        assert_eq!(cfg.nvmbs(), 3);
    }

    #[test]
    fn rejects_bad_levels() {
        let mut cfg = EstimatorConfig::new(64, 64, ChromaSampling::Cs420);
        cfg.level_max = 5;
        assert!(matches!(cfg.validate(), Err(MeshError::InvalidConfig(_))));
        cfg.level_max = 2;
        cfg.level_min = 3;
        assert!(matches!(cfg.validate(), Err(MeshError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_no_edge_type() {
        let mut cfg = EstimatorConfig::new(64, 64, ChromaSampling::Cs420);
        cfg.flags = McFlags::USE_CHROMA;
        assert!(cfg.validate().is_err());
        cfg.flags = McFlags::USEV;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_resolution() {
        let mut cfg = EstimatorConfig::new(16, 16, ChromaSampling::Cs444);
        cfg.mv_res_min = 3;
        assert!(cfg.validate().is_err());
    }
}
