use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::BufRead;

use crate::alphabet::{Symbol, MAX_ALPHABET_SIZE};
use crate::qual::{QualityCorpus, DEFAULT_ALPHABET_SIZE, QUAL_VALUE_OFFSET};

/// Error occurring during parsing a quality value file.
#[derive(Debug)]
pub enum QualReaderError {
    /// I/O error occurred when reading the file.
    IoError(std::io::Error),
    /// A byte does not encode a quality value in the configured alphabet.
    InvalidQualityValue(char),
    /// A line has a different width than the first line of the file.
    LineWidthMismatch {
        /// Width of the first line.
        expected: usize,
        /// Width of the offending line.
        actual: usize,
    },
}

impl From<std::io::Error> for QualReaderError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Display for QualReaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QualReaderError::IoError(e) => write!(f, "IO error: {}", e),
            QualReaderError::InvalidQualityValue(ch) => {
                write!(f, "Invalid quality value: `{}`", ch)
            }
            QualReaderError::LineWidthMismatch { expected, actual } => {
                write!(
                    f,
                    "Line width mismatch (expected: {}, actual: {})",
                    expected, actual
                )
            }
        }
    }
}

impl Error for QualReaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QualReaderError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// The result of a quality file reading operation.
pub type QualResult<T> = Result<T, QualReaderError>;

/// Quality file reading params.
#[derive(Debug, Clone)]
pub struct QualReaderParams {
    alphabet_size: usize,
}

impl QualReaderParams {
    /// Returns a new builder for `QualReaderParams`.
    #[must_use]
    pub fn builder() -> QualReaderParamsBuilder {
        QualReaderParamsBuilder::new()
    }
}

impl Default for QualReaderParams {
    fn default() -> Self {
        QualReaderParamsBuilder::default().build()
    }
}

/// A builder for [`QualReaderParams`].
#[derive(Debug, Clone)]
pub struct QualReaderParamsBuilder {
    alphabet_size: usize,
}

impl QualReaderParamsBuilder {
    /// Returns a new `QualReaderParamsBuilder` instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alphabet_size: DEFAULT_ALPHABET_SIZE,
        }
    }

    /// Sets the number of distinct quality values accepted by the reader.
    ///
    /// # Panics
    /// This function panics if the size is zero or larger than
    /// [`MAX_ALPHABET_SIZE`].
    pub fn alphabet_size(&mut self, alphabet_size: usize) -> &mut Self {
        assert!(alphabet_size >= 1);
        assert!(alphabet_size <= MAX_ALPHABET_SIZE);

        self.alphabet_size = alphabet_size;
        self
    }

    /// Builds and returns [`QualReaderParams`].
    #[must_use]
    pub fn build(&self) -> QualReaderParams {
        QualReaderParams {
            alphabet_size: self.alphabet_size,
        }
    }
}

impl Default for QualReaderParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader for files of newline-terminated, fixed-width quality value lines
/// in Phred+33 encoding.
#[derive(Debug)]
pub struct QualReader<R> {
    reader: R,
    params: QualReaderParams,
    bytes_read: usize,
    buffer: Vec<u8>,
}

impl<R: BufRead> QualReader<R> {
    /// Creates a new `QualReader` instance with default parameters.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::qual::reader::QualReader;
    ///
    /// let buf = Vec::new();
    /// let _reader = QualReader::new(buf.as_slice());
    /// ```
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_params(reader, QualReaderParams::default())
    }

    /// Creates a new `QualReader` instance with given parameters.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::qual::reader::{QualReader, QualReaderParams};
    ///
    /// let buf = Vec::new();
    /// let params = QualReaderParams::builder().alphabet_size(4).build();
    /// let _reader = QualReader::with_params(buf.as_slice(), params);
    /// ```
    #[must_use]
    pub fn with_params(reader: R, params: QualReaderParams) -> Self {
        Self {
            reader,
            params,
            bytes_read: 0,
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Reads all quality lines up to the end of the stream.
    pub fn read_corpus(&mut self) -> QualResult<QualityCorpus> {
        let mut columns = 0;
        let mut data: Vec<Symbol> = Vec::new();

        while let Some(width) = self.parse_line(&mut data)? {
            if columns == 0 {
                columns = width;
            } else if width != columns {
                return Err(QualReaderError::LineWidthMismatch {
                    expected: columns,
                    actual: width,
                });
            }
        }

        Ok(QualityCorpus::with_size(columns, data, self.bytes_read))
    }

    /// Reads a single line, appending its symbols to `data`. Returns the
    /// line width, or `None` at the end of the stream.
    fn parse_line(&mut self, data: &mut Vec<Symbol>) -> QualResult<Option<usize>> {
        self.buffer.clear();
        let count = self.reader.read_until(b'\n', &mut self.buffer)?;
        if count == 0 {
            return Ok(None);
        }
        self.bytes_read += count;

        let mut line: &[u8] = &self.buffer;
        if let [rest @ .., b'\n'] = line {
            line = rest;
        }
        if let [rest @ .., b'\r'] = line {
            line = rest;
        }

        let max_byte = QUAL_VALUE_OFFSET + self.params.alphabet_size as u8;
        for &byte in line {
            if byte < QUAL_VALUE_OFFSET || byte >= max_byte {
                return Err(QualReaderError::InvalidQualityValue(byte as char));
            }
            data.push(byte - QUAL_VALUE_OFFSET);
        }

        Ok(Some(line.len()))
    }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}
