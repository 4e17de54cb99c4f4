//! Compressing Writer
//!
//! A [`Sink`] that compresses everything written to it into the sink it
//! wraps. The codec engine is owned by the stream: `finish` writes the
//! frame terminator and hands the downstream back, `close` additionally
//! closes the downstream.

use std::io::Write;

use ribbon_core::{Chain, Error, Result};

use crate::bytes::{FlushKind, Health, Sink};

use super::{from_io, Compression, SinkIo};

enum Engine<D: Sink> {
    Plain(SinkIo<D>),
    Brotli(Box<brotli::CompressorWriter<SinkIo<D>>>),
    Zstd(zstd::stream::write::Encoder<'static, SinkIo<D>>),
    Zlib(flate2::write::ZlibEncoder<SinkIo<D>>),
    Lz4(Box<lz4_flex::frame::FrameEncoder<SinkIo<D>>>),
}

impl<D: Sink> Engine<D> {
    fn new(dest: D, compression: Compression, size_hint: Option<u64>) -> Result<Self> {
        let io = SinkIo(dest);
        Ok(match compression {
            Compression::None => Engine::Plain(io),
            Compression::Brotli(quality) => {
                let mut params = brotli::enc::BrotliEncoderParams::default();
                params.quality = quality as i32;
                if let Some(hint) = size_hint {
                    params.size_hint = hint as usize;
                }
                Engine::Brotli(Box::new(brotli::CompressorWriter::with_params(
                    io, 4096, &params,
                )))
            }
            Compression::Zstd(level) => {
                Engine::Zstd(zstd::stream::write::Encoder::new(io, level).map_err(from_io)?)
            }
            Compression::Zlib(level) => Engine::Zlib(flate2::write::ZlibEncoder::new(
                io,
                flate2::Compression::new(level),
            )),
            Compression::Lz4 => Engine::Lz4(Box::new(lz4_flex::frame::FrameEncoder::new(io))),
        })
    }

    fn write_all(&mut self, src: &[u8]) -> std::io::Result<()> {
        match self {
            Engine::Plain(w) => w.write_all(src),
            Engine::Brotli(w) => w.write_all(src),
            Engine::Zstd(w) => w.write_all(src),
            Engine::Zlib(w) => w.write_all(src),
            Engine::Lz4(w) => w.write_all(src),
        }
    }

    /// Emits a codec restart point and flushes through to the downstream.
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Engine::Plain(w) => w.flush(),
            Engine::Brotli(w) => w.flush(),
            Engine::Zstd(w) => w.flush(),
            Engine::Zlib(w) => w.flush(),
            Engine::Lz4(w) => w.flush(),
        }
    }

    /// Writes the frame terminator and releases the downstream.
    fn finish(self) -> Result<SinkIo<D>> {
        match self {
            Engine::Plain(w) => Ok(w),
            Engine::Brotli(w) => Ok(w.into_inner()),
            Engine::Zstd(w) => w.finish().map_err(from_io),
            Engine::Zlib(w) => w.finish().map_err(from_io),
            Engine::Lz4(w) => w.finish().map_err(|e| match e {
                lz4_flex::frame::Error::IoError(io) => from_io(io),
                other => Error::Format(format!("lz4 frame error: {}", other)),
            }),
        }
    }
}

/// Compresses written bytes into a wrapped sink.
pub struct CompressingWriter<D: Sink> {
    engine: Option<Engine<D>>,
    /// Uncompressed bytes accepted so far.
    pos: u64,
    health: Health,
}

impl<D: Sink> CompressingWriter<D> {
    /// Wraps `dest`. The `size_hint` is a tuning hint forwarded to codecs
    /// that can use one; it is not a contract.
    pub fn new(dest: D, compression: Compression, size_hint: Option<u64>) -> Result<Self> {
        compression.validate()?;
        Ok(Self {
            engine: Some(Engine::new(dest, compression, size_hint)?),
            pos: 0,
            health: Health::new(),
        })
    }

    fn engine_mut(&mut self) -> &mut Engine<D> {
        self.engine.as_mut().expect("engine present until close")
    }

    /// Terminates the codec frame and returns the downstream sink without
    /// closing it.
    pub fn finish(mut self) -> Result<D> {
        self.health.check()?;
        let engine = self.engine.take().expect("engine present until close");
        Ok(engine.finish()?.0)
    }
}

impl<D: Sink> Sink for CompressingWriter<D> {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn healthy(&self) -> bool {
        self.health.healthy()
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.health.check()?;
        if let Err(e) = self.engine_mut().write_all(src) {
            return Err(self.health.fail(from_io(e)));
        }
        self.pos += src.len() as u64;
        Ok(())
    }

    fn write_chain(&mut self, src: Chain) -> Result<()> {
        for block in src.blocks() {
            self.write(block)?;
        }
        Ok(())
    }

    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.health.check()?;
        if kind == FlushKind::Sync {
            if let Err(e) = self.engine_mut().flush() {
                return Err(self.health.fail(from_io(e)));
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.health.is_closed() {
            return Ok(());
        }
        if let Some(engine) = self.engine.take() {
            if self.health.healthy() {
                match engine.finish() {
                    Ok(mut sink) => {
                        if let Err(e) = sink.0.close() {
                            self.health.fail(e);
                        }
                    }
                    Err(e) => {
                        self.health.fail(e);
                    }
                }
            }
            // On an unhealthy stream the engine is dropped without a
            // terminator; the downstream already latched the real error.
        }
        self.health.finish_close()
    }
}
