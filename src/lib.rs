#![allow(dead_code)]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

pub mod api;
pub mod com;
mod enc;

#[cfg(feature = "bench")]
pub mod bench {
    pub use crate::api::frame;
    pub use crate::com::mc;
    pub use crate::enc::sad;
}
