use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;

use crate::alphabet::Symbol;
use crate::qual::{QualityCorpus, QUAL_VALUE_OFFSET};

/// Error occurring during serializing a quality value file.
#[derive(Debug)]
pub enum QualWriterError {
    /// I/O error occurred when writing the file.
    IoError(std::io::Error),
}

impl From<std::io::Error> for QualWriterError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Display for QualWriterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QualWriterError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl Error for QualWriterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QualWriterError::IoError(e) => Some(e),
        }
    }
}

type QualWriteResult<T> = Result<T, QualWriterError>;

/// Writer emitting newline-terminated quality value lines in Phred+33
/// encoding.
#[derive(Debug)]
pub struct QualWriter<W> {
    writer: W,
    line_buffer: Vec<u8>,
}

impl<W: Write> QualWriter<W> {
    /// Creates a new `QualWriter` instance.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::qual::writer::QualWriter;
    ///
    /// let buf = Vec::new();
    /// let _writer = QualWriter::new(buf);
    /// ```
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line_buffer: Vec::new(),
        }
    }

    /// Writes a single quality line.
    pub fn write_line(&mut self, line: &[Symbol]) -> QualWriteResult<()> {
        self.line_buffer.clear();
        self.line_buffer
            .extend(line.iter().map(|&symbol| symbol + QUAL_VALUE_OFFSET));
        self.line_buffer.push(b'\n');
        self.writer.write_all(&self.line_buffer)?;

        Ok(())
    }

    /// Writes all lines of the given corpus.
    pub fn write_corpus(&mut self, corpus: &QualityCorpus) -> QualWriteResult<()> {
        for line in corpus.lines() {
            self.write_line(line)?;
        }

        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> QualWriteResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Consumes this writer, returning the underlying one.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}
