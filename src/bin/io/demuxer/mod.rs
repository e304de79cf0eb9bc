use std::io;

mod y4m;
use self::y4m::Y4mDemuxer;

use mvmesh::api::frame::Frame;

pub trait Demuxer {
    /// Reads the next frame; `UnexpectedEof` once the stream is done.
    fn read(&mut self) -> io::Result<Frame<u16>>;
}

pub fn new(filename: &str) -> io::Result<Box<dyn Demuxer>> {
    Y4mDemuxer::new(filename)
}
