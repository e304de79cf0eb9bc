#![allow(non_snake_case)]

use std::fmt::Display;
#[cfg(feature = "trace")]
use std::fs::OpenOptions;
use std::io::Write;

pub(crate) type Tracer = (Box<dyn Write>, isize);

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "trace")]
pub(crate) fn OPEN_TRACE() -> Option<Tracer> {
    let fp_trace = OpenOptions::new()
        .append(true)
        .create(true)
        .open("me_trace.txt");
    if let Ok(fp) = fp_trace {
        Some((Box::new(fp), 0))
    } else {
        None
    }
}

#[cfg(feature = "trace")]
pub(crate) fn ME_TRACE_COUNTER(tracer: &mut Option<Tracer>) {
    if let Some((writer, counter)) = tracer {
        let _ = writer.write_fmt(format_args!("{} \t", *counter));
        *counter += 1;
    }
}

#[cfg(feature = "trace")]
pub(crate) fn ME_TRACE<T: Display>(tracer: &mut Option<Tracer>, name: T) {
    if let Some((writer, _)) = tracer {
        let _ = writer.write_fmt(format_args!("{}", name));
    }
}

#[cfg(feature = "trace_me")]
pub(crate) fn TRACE_DECIMATE(tracer: &mut Option<Tracer>, vx: isize, vy: isize, dd: i32, dr: i32) {
    ME_TRACE_COUNTER(tracer);
    ME_TRACE(tracer, "decimate (");
    ME_TRACE(tracer, vx);
    ME_TRACE(tracer, ", ");
    ME_TRACE(tracer, vy);
    ME_TRACE(tracer, ") dd ");
    ME_TRACE(tracer, dd);
    ME_TRACE(tracer, " dr ");
    ME_TRACE(tracer, dr);
    ME_TRACE(tracer, " \n");
}

#[cfg(feature = "trace_me")]
pub(crate) fn TRACE_DP_NODE(
    tracer: &mut Option<Tracer>,
    vx: isize,
    vy: isize,
    mv: [i32; 2],
    label: bool,
) {
    ME_TRACE_COUNTER(tracer);
    ME_TRACE(tracer, "dp (");
    ME_TRACE(tracer, vx);
    ME_TRACE(tracer, ", ");
    ME_TRACE(tracer, vy);
    ME_TRACE(tracer, ") mv ");
    ME_TRACE(tracer, mv[0]);
    ME_TRACE(tracer, " ");
    ME_TRACE(tracer, mv[1]);
    ME_TRACE(tracer, if label { " V" } else { " B" });
    ME_TRACE(tracer, " \n");
}
