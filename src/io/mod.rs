//! Plain file/stdout I/O helpers shared by the `extend` command.
//!
//! Database compression and indexing are external collaborators (see
//! `SPEC_FULL.md` §6.3); this module only opens the plain files the core
//! needs directly: the query sequence file and the output sink.

pub mod fastx;

use std::{
    fs::File,
    io::{BufWriter, Stdout, Write, stdout},
    path::Path,
};
use zoe::define_whichever;

pub use fastx::{FastX, FastXReader};

define_whichever! {
    #[doc = "A writer over either a regular file or stdout, chosen by whether an output path was given."]
    pub enum WriteFileOrStdout {
        File(BufWriter<File>),
        Stdout(BufWriter<Stdout>),
    }

    impl Write for WriteFileOrStdout {}
}

impl WriteFileOrStdout {
    /// Opens `path` for writing, or wraps stdout if `path` is `None`.
    ///
    /// ## Errors
    ///
    /// Propagates any error from [`File::create`].
    #[inline]
    pub fn new_from_opt_path<P: AsRef<Path>>(path: Option<P>) -> std::io::Result<Self> {
        Ok(match path {
            Some(p) => Self::File(BufWriter::new(File::create(p)?)),
            None => Self::Stdout(BufWriter::new(stdout())),
        })
    }
}
