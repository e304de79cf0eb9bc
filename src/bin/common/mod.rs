use mvmesh::api::*;

use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct FrameSummary {
    pub number: usize,
    pub width: usize,
    pub height: usize,
    pub est: EstimateSummary,
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {} - {}x{} - {} vertices, {} decimated, 1/{} pel, dcost {} / {}",
            self.number,
            self.width,
            self.height,
            self.est.valid,
            self.est.decimated,
            8 >> self.est.mv_res,
            self.est.fullpel_dcost,
            self.est.subpel_dcost,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    // The length of the whole video, in frames, if known
    total_frames: Option<usize>,
    // The time the run was started
    time_started: Instant,
    // List of frames estimated so far
    frame_info: Vec<FrameSummary>,
}

impl ProgressInfo {
    pub fn new(total_frames: Option<usize>) -> Self {
        Self {
            total_frames,
            time_started: Instant::now(),
            frame_info: Vec::with_capacity(total_frames.unwrap_or_default()),
        }
    }

    pub fn add_frame(&mut self, frame: FrameSummary) {
        self.frame_info.push(frame);
    }

    pub fn frames_estimated(&self) -> usize {
        self.frame_info.len()
    }

    pub fn estimating_fps(&self) -> f64 {
        let duration = Instant::now().duration_since(self.time_started);
        self.frame_info.len() as f64
            / (duration.as_secs() as f64 + duration.subsec_millis() as f64 / 1000f64)
    }

    // Estimates the remaining time in seconds, if the number of frames is known
    pub fn estimated_time(&self) -> f64 {
        self.total_frames
            .map(|frames| frames.saturating_sub(self.frames_estimated()) as f64 / self.estimating_fps())
            .unwrap_or_default()
    }

    pub fn print_summary(&self) -> String {
        let n = self.frame_info.len().max(1) as f64;
        let valid: usize = self.frame_info.iter().map(|f| f.est.valid).sum();
        let check_errors: usize = self.frame_info.iter().map(|f| f.est.check_errors).sum();
        format!(
            "average vertices: {:.1}, check errors: {}",
            valid as f64 / n,
            check_errors
        )
    }
}

impl fmt::Display for ProgressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(total_frames) = self.total_frames {
            write!(
                f,
                "estimated {}/{} frames, {:.3} fps, est. time: {:.0} s",
                self.frames_estimated(),
                total_frames,
                self.estimating_fps(),
                self.estimated_time()
            )
        } else {
            write!(
                f,
                "estimated {} frames, {:.3} fps",
                self.frames_estimated(),
                self.estimating_fps()
            )
        }
    }
}
