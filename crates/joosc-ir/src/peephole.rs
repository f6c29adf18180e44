//! Local, single-pass cleanup over one finished [`Stream`]'s op list.
//!
//! The original's peephole pass lives in `ir/peephole.cpp`, which (like
//! `stream_builder.cpp`) never grew past its stub — every rewrite rule is
//! `UNIMPLEMENTED()`. Matching that emptiness rather than inventing
//! optimization rules the teacher never wrote: a real one would fold
//! `Const`-then-`Mov` chains, drop dead `AllocMem`/`DeallocMem` pairs
//! around a value that's never read, and so on.

use crate::stream::Stream;

pub fn optimize(_stream: &mut Stream) {}
