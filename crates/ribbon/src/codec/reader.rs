//! Decompressing Reader
//!
//! A [`Source`] yielding the decompressed contents of a wrapped source.
//! Owns its codec engine. After the engine reports a clean end of frame,
//! further reads report end of stream; if the underlying source ends
//! before the frame does, the stream fails with `Truncated`. A source
//! that merely hopes for more data ("live tail") surfaces as an empty
//! window with `hope_for_more` set, without failing.

use std::io::{self, Read};

use ribbon_core::{Error, Result};

use crate::bytes::Source;

use super::{from_io, Compression, SourceIo};

enum Engine<S: Source> {
    Plain(SourceIo<S>),
    Brotli(Box<brotli::Decompressor<SourceIo<S>>>),
    Zstd(zstd::stream::read::Decoder<'static, io::BufReader<SourceIo<S>>>),
    Zlib(flate2::read::ZlibDecoder<SourceIo<S>>),
    Lz4(Box<lz4_flex::frame::FrameDecoder<SourceIo<S>>>),
}

impl<S: Source> Engine<S> {
    fn new(src: S, compression: Compression) -> Result<Self> {
        let io = SourceIo(src);
        Ok(match compression {
            Compression::None => Engine::Plain(io),
            Compression::Brotli(_) => Engine::Brotli(Box::new(brotli::Decompressor::new(io, 4096))),
            Compression::Zstd(_) => {
                Engine::Zstd(zstd::stream::read::Decoder::new(io).map_err(from_io)?)
            }
            Compression::Zlib(_) => Engine::Zlib(flate2::read::ZlibDecoder::new(io)),
            Compression::Lz4 => Engine::Lz4(Box::new(lz4_flex::frame::FrameDecoder::new(io))),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Engine::Plain(r) => r.read(buf),
            Engine::Brotli(r) => r.read(buf),
            Engine::Zstd(r) => r.read(buf),
            Engine::Zlib(r) => r.read(buf),
            Engine::Lz4(r) => r.read(buf),
        }
    }
}

const WINDOW_SIZE: usize = 16 * 1024;

/// Decompresses a wrapped source.
pub struct DecompressingReader<S: Source> {
    engine: Engine<S>,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    /// Decompressed bytes yielded so far.
    pos: u64,
    /// The engine reported a clean end of frame.
    finished: bool,
    /// The last refill found the underlying source dry but hopeful.
    waiting: bool,
    closed: bool,
}

impl<S: Source> DecompressingReader<S> {
    pub fn new(src: S, compression: Compression) -> Result<Self> {
        Ok(Self {
            engine: Engine::new(src, compression)?,
            buf: vec![0u8; WINDOW_SIZE],
            start: 0,
            end: 0,
            pos: 0,
            finished: false,
            waiting: false,
            closed: false,
        })
    }
}

impl<S: Source> Source for DecompressingReader<S> {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn fill(&mut self) -> Result<&[u8]> {
        if self.closed {
            return Err(Error::Usage("source is closed".to_string()));
        }
        if self.start == self.end {
            if self.finished {
                return Ok(&[]);
            }
            match self.engine.read(&mut self.buf) {
                Ok(0) => {
                    self.finished = true;
                    self.waiting = false;
                    return Ok(&[]);
                }
                Ok(n) => {
                    self.start = 0;
                    self.end = n;
                    self.waiting = false;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.waiting = true;
                    return Ok(&[]);
                }
                Err(e) => return Err(from_io(e)),
            }
        }
        Ok(&self.buf[self.start..self.end])
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.end - self.start);
        self.start += n;
        self.pos += n as u64;
    }

    fn hope_for_more(&self) -> bool {
        self.waiting
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
