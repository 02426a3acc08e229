//! Majority-vote correction across three dumps.
//!
//! Three captures of the same cartridge are compared in 512-byte blocks.
//! A block is accepted when at least two copies agree on the whole block;
//! there is no byte-level voting inside a block.
//!
//! # Example
//!
//! ```
//! use cartwire::correct::correct;
//!
//! let good = vec![0xAA; 1024];
//! let mut noisy = good.clone();
//! noisy[700] ^= 0x01;
//!
//! let fixed = correct([&good, &noisy, &good]).unwrap();
//! assert_eq!(fixed.data, good);
//! assert_eq!(fixed.corrected[0].offset, 512);
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{CartError, Result};

/// Block size used for voting.
pub const BLOCK_SIZE: usize = 512;

/// Result of voting on one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// All three copies agree.
    Unanimous,
    /// Two copies agree; `outlier` (0, 1 or 2) was overruled.
    Majority { outlier: usize },
}

/// A block where one copy was overruled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrectedBlock {
    pub offset: u64,
    /// Index of the input that disagreed.
    pub outlier: usize,
}

/// In-memory correction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub data: Vec<u8>,
    pub corrected: Vec<CorrectedBlock>,
}

/// Vote on three copies of the block at `offset`, returning the winner.
///
/// # Errors
///
/// [`CartError::UncorrectableBlock`] if no two copies are equal.
pub fn vote<'a>(blocks: [&'a [u8]; 3], offset: u64) -> Result<(&'a [u8], Vote)> {
    let [a, b, c] = blocks;
    match (a == b, a == c, b == c) {
        (true, true, _) => Ok((a, Vote::Unanimous)),
        (true, false, _) => Ok((a, Vote::Majority { outlier: 2 })),
        (false, true, _) => Ok((a, Vote::Majority { outlier: 1 })),
        (false, false, true) => Ok((b, Vote::Majority { outlier: 0 })),
        (false, false, false) => Err(CartError::UncorrectableBlock { offset }),
    }
}

/// Correct three equal-length dumps held in memory.
pub fn correct(inputs: [&[u8]; 3]) -> Result<Correction> {
    let lens = inputs.map(|d| d.len() as u64);
    if lens[0] != lens[1] || lens[0] != lens[2] {
        return Err(CartError::LengthMismatch(lens));
    }

    let mut data = Vec::with_capacity(inputs[0].len());
    let mut corrected = Vec::new();
    for (i, ((a, b), c)) in inputs[0]
        .chunks(BLOCK_SIZE)
        .zip(inputs[1].chunks(BLOCK_SIZE))
        .zip(inputs[2].chunks(BLOCK_SIZE))
        .enumerate()
    {
        let offset = (i * BLOCK_SIZE) as u64;
        let (winner, verdict) = vote([a, b, c], offset)?;
        if let Vote::Majority { outlier } = verdict {
            tracing::info!("Corrected block at {} (input {} overruled)", offset, outlier);
            corrected.push(CorrectedBlock { offset, outlier });
        }
        data.extend_from_slice(winner);
    }

    Ok(Correction { data, corrected })
}

/// Summary of a file-level correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionReport {
    pub output: PathBuf,
    pub bytes: u64,
    pub blocks: u64,
    pub corrected: Vec<CorrectedBlock>,
    /// CRC-32 of the corrected output.
    pub crc32: u32,
}

/// Correct three dump files into `output`.
///
/// The image is written to a staging file next to `output` and renamed over
/// it only once every block is corrected. On failure the staging file is
/// removed and whatever was at `output` before is left alone, so `output`
/// may also name one of the inputs.
pub fn correct_files<P: AsRef<Path>>(inputs: [P; 3], output: impl AsRef<Path>) -> Result<CorrectionReport> {
    let output = output.as_ref();
    let staging = staging_path(output);
    let result = write_corrected(&inputs, &staging).and_then(|mut report| {
        fs::rename(&staging, output)?;
        report.output = output.to_path_buf();
        Ok(report)
    });
    if result.is_err() && staging.exists() {
        if let Err(e) = fs::remove_file(&staging) {
            tracing::warn!("Could not remove {}: {}", staging.display(), e);
        }
    }
    result
}

/// `dir/.name.part` beside `output`.
fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corrected".to_string());
    output.with_file_name(format!(".{}.part", name))
}

fn write_corrected<P: AsRef<Path>>(inputs: &[P; 3], output: &Path) -> Result<CorrectionReport> {
    let mut lens = [0u64; 3];
    for (len, path) in lens.iter_mut().zip(inputs.iter()) {
        *len = fs::metadata(path.as_ref())?.len();
    }
    if lens[0] != lens[1] || lens[0] != lens[2] {
        return Err(CartError::LengthMismatch(lens));
    }

    let mut readers = [
        BufReader::new(File::open(inputs[0].as_ref())?),
        BufReader::new(File::open(inputs[1].as_ref())?),
        BufReader::new(File::open(inputs[2].as_ref())?),
    ];
    let mut writer = BufWriter::new(File::create(output)?);
    let mut hasher = crc32fast::Hasher::new();
    let mut bufs = [[0u8; BLOCK_SIZE]; 3];
    let mut corrected = Vec::new();
    let mut offset = 0u64;
    let mut blocks = 0u64;

    while offset < lens[0] {
        let want = (lens[0] - offset).min(BLOCK_SIZE as u64) as usize;
        for (reader, buf) in readers.iter_mut().zip(bufs.iter_mut()) {
            reader.read_exact(&mut buf[..want])?;
        }

        let (winner, verdict) = vote(
            [&bufs[0][..want], &bufs[1][..want], &bufs[2][..want]],
            offset,
        )?;
        if let Vote::Majority { outlier } = verdict {
            tracing::info!("Corrected block at {} (input {} overruled)", offset, outlier);
            corrected.push(CorrectedBlock { offset, outlier });
        }
        writer.write_all(winner)?;
        hasher.update(winner);

        offset += want as u64;
        blocks += 1;
    }
    writer.flush()?;

    Ok(CorrectionReport {
        output: output.to_path_buf(),
        bytes: offset,
        blocks,
        corrected,
        crc32: hasher.finalize(),
    })
}
