//! Sector-by-sector dump orchestration.
//!
//! A [`DumpSession`] walks the cartridge address space described by a
//! [`DumpLayout`], reading one sector at a time through the [`Client`] and
//! writing each verified sector to its sink in order.
//!
//! Transient failures (framing, checksum, short reads) are retried under a
//! [`RetryPolicy`]. Once a sector exhausts its attempts the session stops
//! with [`CartError::SectorExhausted`]; the sink keeps every sector written
//! before the failure and nothing after it.

use std::io::Write;
use std::ops::Range;

use serde::Serialize;

use crate::client::Client;
use crate::error::{CartError, Result};
use crate::protocol::ChecksumMode;
use crate::transport::Transport;

/// Default attempts per sector.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Window of bank 0, always mapped.
pub const FIXED_BANK_WINDOW: Range<u32> = 0x0000..0x4000;

/// Window shared by banks 1..N, switched by bank select.
pub const SWITCHED_BANK_WINDOW: Range<u32> = 0x4000..0x8000;

/// Per-sector retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Allow `max_attempts` attempts per sector (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Attempts allowed per sector.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Shape of the address space to dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpLayout {
    /// Linear address space from 0 to `total_size`.
    Flat { total_size: u64 },
    /// Bank 0 in `fixed_window`, banks 1..`bank_count` in `switched_window`.
    Banked {
        bank_count: u32,
        fixed_window: Range<u32>,
        switched_window: Range<u32>,
    },
}

impl DumpLayout {
    /// Flat layout of `total_size` bytes.
    pub fn flat(total_size: u64) -> Self {
        DumpLayout::Flat { total_size }
    }

    /// Game Boy style banking with 16 KiB windows.
    pub fn banked(bank_count: u32) -> Self {
        DumpLayout::Banked {
            bank_count,
            fixed_window: FIXED_BANK_WINDOW,
            switched_window: SWITCHED_BANK_WINDOW,
        }
    }

    /// Bytes the finished dump will contain.
    pub fn total_bytes(&self) -> u64 {
        match self {
            DumpLayout::Flat { total_size } => *total_size,
            DumpLayout::Banked {
                bank_count,
                fixed_window,
                switched_window,
            } => match *bank_count {
                0 => 0,
                n => window_len(fixed_window) + u64::from(n - 1) * window_len(switched_window),
            },
        }
    }

    /// Check that every window splits evenly into sectors and fits the
    /// 32-bit address field.
    pub fn validate(&self, sector_size: u32) -> Result<()> {
        if sector_size == 0 {
            return Err(CartError::InvalidLayout("sector size is zero".into()));
        }
        let sector = u64::from(sector_size);
        let check = |name: &str, len: u64| {
            if len % sector != 0 {
                Err(CartError::InvalidLayout(format!(
                    "{} of {} bytes is not a multiple of sector size {}",
                    name, len, sector_size
                )))
            } else {
                Ok(())
            }
        };

        match self {
            DumpLayout::Flat { total_size } => {
                if *total_size > u64::from(u32::MAX) + 1 {
                    return Err(CartError::InvalidLayout(format!(
                        "{} bytes exceeds the 32-bit address range",
                        total_size
                    )));
                }
                check("total size", *total_size)
            }
            DumpLayout::Banked {
                fixed_window,
                switched_window,
                ..
            } => {
                check("fixed window", window_len(fixed_window))?;
                check("switched window", window_len(switched_window))
            }
        }
    }
}

fn window_len(window: &Range<u32>) -> u64 {
    u64::from(window.end.saturating_sub(window.start))
}

/// One failed attempt at a sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryEvent {
    pub bank: Option<u32>,
    pub address: u32,
    /// 1-based attempt number that failed.
    pub attempt: u32,
    pub reason: String,
}

/// Progress of a dump, complete or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DumpReport {
    pub sectors_written: u64,
    pub bytes_written: u64,
    pub bank_selects: u32,
    /// Sector read attempts issued, including retries.
    pub attempts: u64,
    pub retries: Vec<RetryEvent>,
}

/// State of one dump in progress.
pub struct DumpSession<'c, T: Transport, W: Write> {
    client: &'c mut Client<T>,
    sink: W,
    sector_size: u32,
    checksum: ChecksumMode,
    retry: RetryPolicy,
    report: DumpReport,
}

impl<'c, T: Transport, W: Write> DumpSession<'c, T, W> {
    /// Create a session writing to `sink`.
    pub fn new(client: &'c mut Client<T>, sink: W, sector_size: u32, checksum: ChecksumMode) -> Self {
        Self {
            client,
            sink,
            sector_size,
            checksum,
            retry: RetryPolicy::default(),
            report: DumpReport::default(),
        }
    }

    /// Override the retry policy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Report so far. After a failed `run` this describes the partial dump.
    pub fn report(&self) -> &DumpReport {
        &self.report
    }

    /// Release the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Dump every sector of `layout`.
    pub fn run(&mut self, layout: &DumpLayout) -> Result<DumpReport> {
        layout.validate(self.sector_size)?;
        tracing::info!(
            "Reading {} bytes in {} byte sectors",
            layout.total_bytes(),
            self.sector_size
        );

        match layout {
            DumpLayout::Flat { total_size } => {
                let mut address = 0u64;
                while address < *total_size {
                    self.transfer(None, address as u32)?;
                    address += u64::from(self.sector_size);
                }
            }
            DumpLayout::Banked {
                bank_count,
                fixed_window,
                switched_window,
            } => {
                for bank in 0..*bank_count {
                    let window = if bank == 0 {
                        fixed_window.clone()
                    } else {
                        self.client.select_bank(bank)?;
                        self.report.bank_selects += 1;
                        switched_window.clone()
                    };
                    for address in window.step_by(self.sector_size as usize) {
                        self.transfer(Some(bank), address)?;
                    }
                }
            }
        }

        self.sink.flush()?;
        Ok(self.report.clone())
    }

    fn transfer(&mut self, bank: Option<u32>, address: u32) -> Result<()> {
        let data = self.read_with_retry(bank, address)?;
        self.sink.write_all(&data)?;
        self.report.sectors_written += 1;
        self.report.bytes_written += data.len() as u64;
        Ok(())
    }

    fn read_with_retry(&mut self, bank: Option<u32>, address: u32) -> Result<bytes::Bytes> {
        let max = self.retry.max_attempts();
        for attempt in 1..=max {
            self.report.attempts += 1;
            match self
                .client
                .read_sector(address, self.sector_size, self.checksum)
            {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "Retrying sector {:#x} (bank {:?}), attempt {}/{}: {}",
                        address,
                        bank,
                        attempt,
                        max,
                        e
                    );
                    self.report.retries.push(RetryEvent {
                        bank,
                        address,
                        attempt,
                        reason: e.to_string(),
                    });
                    self.client.flush_input()?;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            "Sector {:#x} (bank {:?}) failed {} attempts, aborting",
            address,
            bank,
            max
        );
        Err(CartError::SectorExhausted {
            address,
            bank,
            attempts: max,
        })
    }
}
