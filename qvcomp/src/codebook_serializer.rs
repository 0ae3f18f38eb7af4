use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};

use itertools::Itertools;

use crate::alphabet::{Alphabet, Symbol};
use crate::codebook::{CondQuantizerStore, QuantizerPair};
use crate::error::CodebookError;
use crate::quantizer::Quantizer;

const SYMBOL_OFFSET: u8 = 33;
const EMPTY_BYTE: u8 = b' ';

/// Error occurring during reading or writing a codebook file.
#[derive(Debug)]
pub enum CodebookIoError {
    /// I/O error occurred when accessing the codebook file.
    IoError(std::io::Error),
    /// The file ended in the middle of a record.
    UnexpectedEof,
    /// A byte does not encode a symbol of the codebook alphabet.
    InvalidSymbol(char),
    /// A byte does not encode a mixing ratio.
    InvalidRatio(char),
    /// A record has a different width than the header implies.
    LineWidthMismatch {
        /// Expected width in bytes.
        expected: usize,
        /// Actual width in bytes.
        actual: usize,
    },
    /// The low and high records of a column define different context sets.
    InconsistentContexts {
        /// The offending column.
        column: usize,
    },
    /// The store to serialize has a column with no quantizers stored.
    MissingQuantizer {
        /// The offending column.
        column: usize,
    },
}

impl From<std::io::Error> for CodebookIoError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Display for CodebookIoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CodebookIoError::IoError(e) => write!(f, "IO error: {}", e),
            CodebookIoError::UnexpectedEof => write!(f, "Unexpected end of codebook file"),
            CodebookIoError::InvalidSymbol(ch) => write!(f, "Invalid symbol byte: `{}`", ch),
            CodebookIoError::InvalidRatio(ch) => write!(f, "Invalid ratio byte: `{}`", ch),
            CodebookIoError::LineWidthMismatch { expected, actual } => write!(
                f,
                "Record width mismatch (expected: {}, actual: {})",
                expected, actual
            ),
            CodebookIoError::InconsistentContexts { column } => {
                write!(f, "Low and high context sets differ at column {}", column)
            }
            CodebookIoError::MissingQuantizer { column } => {
                write!(f, "No quantizer stored at column {}", column)
            }
        }
    }
}

impl Error for CodebookIoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CodebookIoError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// The result of a codebook file operation.
pub type CodebookIoResult<T> = Result<T, CodebookIoError>;

/// Writes a quantizer store in the codebook interchange format.
///
/// The format is newline-terminated byte records. The first two records are
/// reserved placeholders of one byte per column. The third record carries
/// one mixing ratio byte per column, `floor(ratio * 100) + 33`, taken from
/// the column's first context. Then the column 0 low and high quantizer maps
/// follow as one byte per symbol, `symbol + 33`. Every further column
/// contributes a low and a high record of one block per context symbol: the
/// quantizer map for that context, or all ASCII spaces when the column has
/// no such context.
///
/// One ratio byte per column is all the format affords, so per-context
/// ratio variation within a column is flattened to the first context's
/// value on a write/read cycle.
pub fn write_codebook<W: Write>(
    store: &CondQuantizerStore,
    mut writer: W,
) -> CodebookIoResult<()> {
    let columns = store.columns();
    if store.open_columns() != columns {
        return Err(CodebookIoError::MissingQuantizer {
            column: store.open_columns(),
        });
    }
    let first = column_pair(store, 0, 0)?;
    let size = first.low().len();

    // Reserved records, kept for width only
    let empty = vec![EMPTY_BYTE; columns];
    writer.write_all(&empty)?;
    writer.write_all(b"\n")?;
    writer.write_all(&empty)?;
    writer.write_all(b"\n")?;

    let ratios = (0..columns)
        .map(|column| Ok(column_pair(store, column, 0)?.qratio() + SYMBOL_OFFSET))
        .collect::<CodebookIoResult<Vec<u8>>>()?;
    writer.write_all(&ratios)?;
    writer.write_all(b"\n")?;

    write_map(&mut writer, first.low())?;
    writer.write_all(b"\n")?;
    write_map(&mut writer, first.high())?;
    writer.write_all(b"\n")?;

    let empty_block = vec![EMPTY_BYTE; size];
    for column in 1..columns {
        for select_high in [false, true] {
            for context in 0..size {
                match store.pair(column, context as Symbol) {
                    Ok(pair) => {
                        let quantizer = if select_high { pair.high() } else { pair.low() };
                        write_map(&mut writer, quantizer)?;
                    }
                    Err(CodebookError::AlphabetLookupMiss { .. }) => {
                        writer.write_all(&empty_block)?;
                    }
                    Err(_) => {
                        return Err(CodebookIoError::MissingQuantizer { column });
                    }
                }
            }
            writer.write_all(b"\n")?;
        }
    }

    Ok(())
}

fn column_pair(
    store: &CondQuantizerStore,
    column: usize,
    index: usize,
) -> CodebookIoResult<&QuantizerPair> {
    store
        .pair_at(column, index)
        .map_err(|_| CodebookIoError::MissingQuantizer { column })
}

fn write_map<W: Write>(writer: &mut W, quantizer: &Quantizer) -> CodebookIoResult<()> {
    let bytes = quantizer
        .map()
        .iter()
        .map(|&symbol| symbol + SYMBOL_OFFSET)
        .collect_vec();
    writer.write_all(&bytes)?;
    Ok(())
}

/// Reads a quantizer store from the codebook interchange format.
///
/// The number of columns is taken from the width of the first record, and
/// the alphabet size from the width of the column 0 quantizer record.
pub fn read_codebook<R: BufRead>(mut reader: R) -> CodebookIoResult<CondQuantizerStore> {
    let header = read_record(&mut reader)?;
    let columns = header.len();
    if columns == 0 {
        return Err(CodebookIoError::UnexpectedEof);
    }
    let second = read_record(&mut reader)?;
    expect_width(&second, columns)?;

    let ratio_record = read_record(&mut reader)?;
    expect_width(&ratio_record, columns)?;
    let qratios = ratio_record
        .iter()
        .map(|&byte| match byte.checked_sub(SYMBOL_OFFSET) {
            Some(qratio) if qratio <= 100 => Ok(qratio),
            _ => Err(CodebookIoError::InvalidRatio(byte as char)),
        })
        .collect::<CodebookIoResult<Vec<u8>>>()?;

    let low_map = read_record(&mut reader)?;
    let size = low_map.len();
    if size == 0 {
        return Err(CodebookIoError::UnexpectedEof);
    }
    let high_map = read_record(&mut reader)?;
    expect_width(&high_map, size)?;

    let mut store = CondQuantizerStore::new(columns);
    store.open_column(Alphabet::new(vec![0]));
    store
        .store_pair(0, 0, parse_pair(&low_map, &high_map, size, qratios[0])?)
        .expect("column 0 context must exist");

    for column in 1..columns {
        let low_record = read_record(&mut reader)?;
        expect_width(&low_record, size * size)?;
        let high_record = read_record(&mut reader)?;
        expect_width(&high_record, size * size)?;

        let mut contexts: Vec<Symbol> = Vec::new();
        let mut pairs: Vec<QuantizerPair> = Vec::new();
        for context in 0..size {
            let low_block = &low_record[context * size..(context + 1) * size];
            let high_block = &high_record[context * size..(context + 1) * size];
            let low_empty = low_block.iter().all(|&byte| byte == EMPTY_BYTE);
            let high_empty = high_block.iter().all(|&byte| byte == EMPTY_BYTE);
            if low_empty != high_empty {
                return Err(CodebookIoError::InconsistentContexts { column });
            }
            if low_empty {
                continue;
            }

            contexts.push(context as Symbol);
            pairs.push(parse_pair(low_block, high_block, size, qratios[column])?);
        }
        if contexts.is_empty() {
            return Err(CodebookIoError::MissingQuantizer { column });
        }

        store.open_column(Alphabet::new(contexts.clone()));
        for (context, pair) in contexts.into_iter().zip(pairs) {
            store
                .store_pair(column, context, pair)
                .expect("context was just added to the input alphabet");
        }
    }

    Ok(store)
}

fn parse_pair(
    low_block: &[u8],
    high_block: &[u8],
    size: usize,
    qratio: u8,
) -> CodebookIoResult<QuantizerPair> {
    let ratio = qratio as f64 / 100.0;
    let low = Quantizer::from_map(parse_map(low_block, size)?, ratio);
    let high = Quantizer::from_map(parse_map(high_block, size)?, 1.0 - ratio);

    Ok(QuantizerPair::with_qratio(low, high, qratio))
}

fn parse_map(block: &[u8], size: usize) -> CodebookIoResult<Vec<Symbol>> {
    block
        .iter()
        .map(|&byte| match byte.checked_sub(SYMBOL_OFFSET) {
            Some(symbol) if (symbol as usize) < size => Ok(symbol),
            _ => Err(CodebookIoError::InvalidSymbol(byte as char)),
        })
        .collect()
}

fn read_record<R: BufRead>(reader: &mut R) -> CodebookIoResult<Vec<u8>> {
    let mut record = Vec::new();
    let count = reader.read_until(b'\n', &mut record)?;
    if count == 0 {
        return Err(CodebookIoError::UnexpectedEof);
    }
    if record.last() == Some(&b'\n') {
        record.pop();
    }

    Ok(record)
}

fn expect_width(record: &[u8], expected: usize) -> CodebookIoResult<()> {
    if record.len() != expected {
        return Err(CodebookIoError::LineWidthMismatch {
            expected,
            actual: record.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::alphabet::Alphabet;
    use crate::codebook::{CondQuantizerStore, QuantizerPair};
    use crate::codebook_serializer::{read_codebook, write_codebook, CodebookIoError};
    use crate::quantizer::Quantizer;

    fn uniform_ratio_store() -> CondQuantizerStore {
        let mut store = CondQuantizerStore::new(2);
        store.open_column(Alphabet::new(vec![0]));
        store
            .store_pair(
                0,
                0,
                QuantizerPair::new(
                    Quantizer::from_map([0, 0, 3, 3], 0.25),
                    Quantizer::from_map([0, 1, 1, 3], 0.75),
                    0.25,
                ),
            )
            .unwrap();
        store.open_column(Alphabet::new([0, 1, 3]));
        for prev in [0, 1, 3] {
            store
                .store_pair(
                    1,
                    prev,
                    QuantizerPair::new(
                        Quantizer::from_map([1, 1, 1, 1], 0.25),
                        Quantizer::from_map([0, 0, 2, 2], 0.75),
                        0.25,
                    ),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_write_layout() {
        let store = uniform_ratio_store();
        let mut bytes = Vec::new();

        write_codebook(&store, &mut bytes).unwrap();

        let records: Vec<&[u8]> = bytes.split(|&byte| byte == b'\n').collect();
        // two placeholder records, ratios, two column 0 maps, two records
        // per further column, plus the empty split tail
        assert_eq!(records.len(), 8);
        assert_eq!(records[0], b"  ");
        assert_eq!(records[1], b"  ");
        assert_eq!(records[2], [25 + 33, 25 + 33]);
        assert_eq!(records[3], b"!!$$");
        assert_eq!(records[4], b"!\"\"$");
        assert_eq!(records[5], b"\"\"\"\"\"\"\"\"    \"\"\"\"");
        assert_eq!(records[6], b"!!##!!##    !!##");
        assert_eq!(records[7], b"");
    }

    #[test]
    fn test_round_trip_uniform_ratio_store() {
        let store = uniform_ratio_store();
        let mut bytes = Vec::new();
        write_codebook(&store, &mut bytes).unwrap();

        let read_back = read_codebook(bytes.as_slice()).unwrap();

        assert_eq!(read_back, store);
        assert_eq!(read_back.identifier(), store.identifier());
    }

    #[test]
    fn test_read_reconstructs_alphabets() {
        let store = uniform_ratio_store();
        let mut bytes = Vec::new();
        write_codebook(&store, &mut bytes).unwrap();

        let read_back = read_codebook(bytes.as_slice()).unwrap();

        assert_eq!(read_back.columns(), 2);
        assert_eq!(read_back.input_alphabet(0), &Alphabet::new(vec![0]));
        assert_eq!(read_back.input_alphabet(1), &Alphabet::new([0, 1, 3]));
        let pair = read_back.pair(1, 3).unwrap();
        assert_eq!(pair.low().map(), [1, 1, 1, 1]);
        assert_eq!(pair.high().map(), [0, 0, 2, 2]);
        assert_eq!(pair.qratio(), 25);
    }

    #[test]
    fn test_write_is_idempotent_over_read() {
        let store = uniform_ratio_store();
        let mut first = Vec::new();
        write_codebook(&store, &mut first).unwrap();

        let read_back = read_codebook(first.as_slice()).unwrap();
        let mut second = Vec::new();
        write_codebook(&read_back, &mut second).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_read_truncated_file() {
        let store = uniform_ratio_store();
        let mut bytes = Vec::new();
        write_codebook(&store, &mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);

        let result = read_codebook(bytes.as_slice());

        assert!(matches!(
            result,
            Err(CodebookIoError::UnexpectedEof | CodebookIoError::LineWidthMismatch { .. })
        ));
    }

    #[test]
    fn test_read_invalid_symbol() {
        let bytes = b" \n \n!\n!\x01\n!!\n";

        let result = read_codebook(bytes.as_slice());

        assert!(matches!(result, Err(CodebookIoError::InvalidSymbol(_))));
    }

    #[test]
    fn test_write_incomplete_store() {
        let mut store = CondQuantizerStore::new(2);
        store.open_column(Alphabet::new(vec![0]));

        let result = write_codebook(&store, Vec::new());

        assert!(matches!(
            result,
            Err(CodebookIoError::MissingQuantizer { .. })
        ));
    }
}
