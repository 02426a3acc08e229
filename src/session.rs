//! End-to-end reader session.
//!
//! [`Session`] is what a command-line front end drives: connect, read the
//! header, resolve the dump layout from the header or the catalog, write the
//! dump file and compare its CRC against the catalog.
//!
//! # Example
//!
//! ```ignore
//! use cartwire::{Catalog, Session, SessionConfig};
//!
//! let config = SessionConfig::load("reader.json")?;
//! let catalog = Catalog::parse(&std::fs::read_to_string("n64.txt")?)?;
//!
//! let mut session = Session::open(&config)?;
//! let outcome = session.run(&catalog, "dumps".as_ref())?;
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//! session.close();
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{CartridgeLookup, CartridgeRecord};
use crate::client::Client;
use crate::config::SessionConfig;
use crate::crc::{crc32_file, format_crc, parse_crc, CrcCheck};
use crate::dump::{DumpLayout, DumpReport, DumpSession, RetryPolicy};
use crate::error::{CartError, Result};
use crate::header::{parse_header, CartridgeFamily, RomHeader};
use crate::transport::{SerialTransport, Transport};

/// Everything a session produced.
#[derive(Debug, Clone, Serialize)]
pub struct DumpOutcome {
    pub header: RomHeader,
    /// Catalog entry, if one matched.
    pub record: Option<CartridgeRecord>,
    /// `None` in header-only mode.
    pub dump: Option<DumpReport>,
    /// `None` when there was no reference CRC.
    pub crc: Option<CrcCheck>,
    pub path: Option<PathBuf>,
}

/// A connected reader with its session parameters.
pub struct Session<T: Transport> {
    client: Client<T>,
    family: CartridgeFamily,
    sector_size: u32,
    retry: RetryPolicy,
    header_only: bool,
}

impl Session<SerialTransport> {
    /// Open the configured serial port and connect.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        let transport = SerialTransport::open(config.link())?;
        Self::with_transport(transport, config)
    }
}

impl<T: Transport> Session<T> {
    /// Handshake on `transport` and query the sector size.
    pub fn with_transport(transport: T, config: &SessionConfig) -> Result<Self> {
        let mut client = Client::connect(transport, &config.handshake())?;
        let sector_size = match client.sector_size() {
            Ok(size) => size,
            Err(e) => {
                client.close();
                return Err(e);
            }
        };
        tracing::info!("{:?} session, {} byte sectors", config.family, sector_size);

        Ok(Self {
            client,
            family: config.family,
            sector_size,
            retry: config.retry(),
            header_only: config.header_only,
        })
    }

    pub fn family(&self) -> CartridgeFamily {
        self.family
    }

    /// Sector size reported by the reader.
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    /// Query and parse the cartridge header.
    pub fn read_header(&mut self) -> Result<RomHeader> {
        let blob = self.client.header(self.family)?;
        let header = parse_header(&blob, self.family)?;
        tracing::info!(
            "Header: '{}' v{} checksum {}",
            header.title,
            header.version,
            header.declared_checksum
        );
        if let Some(gb) = header.game_boy() {
            if !gb.header_checksum_ok() {
                tracing::warn!(
                    "Header checksum {:#04x} does not match computed {:#04x}",
                    gb.header_checksum,
                    gb.computed_header_checksum
                );
            }
        }
        Ok(header)
    }

    /// Resolve the address space to dump.
    ///
    /// Banked cartridges take their bank count from the header. Flat
    /// cartridges need the catalog entry for their size.
    pub fn plan(&self, header: &RomHeader, record: Option<&CartridgeRecord>) -> Result<DumpLayout> {
        match header.game_boy() {
            Some(gb) => gb.bank_count().map(DumpLayout::banked).ok_or_else(|| {
                CartError::Header(format!("undefined ROM size code {:#04x}", gb.rom_size_code))
            }),
            None => record
                .map(|r| DumpLayout::flat(r.size_bytes))
                .ok_or_else(|| CartError::LookupMiss(header.declared_checksum.clone())),
        }
    }

    /// Dump `layout` into `sink`.
    pub fn dump_to<W: Write>(&mut self, layout: &DumpLayout, sink: W) -> Result<DumpReport> {
        let checksum = self.family.sector_checksum();
        let mut dump = DumpSession::new(&mut self.client, sink, self.sector_size, checksum)
            .retry_policy(self.retry);
        dump.run(layout)
    }

    /// Dump `layout` to the file at `path`, then compare its CRC with
    /// `expected` if given.
    ///
    /// If a sector is exhausted the partial file stays on disk.
    pub fn dump_to_file(
        &mut self,
        layout: &DumpLayout,
        path: &Path,
        expected: Option<u32>,
    ) -> Result<(DumpReport, Option<CrcCheck>)> {
        tracing::info!("Writing {}", path.display());
        let file = BufWriter::new(File::create(path)?);
        let report = match self.dump_to(layout, file) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Dump aborted, partial output left at {}", path.display());
                return Err(e);
            }
        };

        let check = match expected {
            Some(expected) => {
                let check = CrcCheck::new(crc32_file(path)?, expected);
                if check.is_good() {
                    tracing::info!("{}", check);
                } else {
                    tracing::warn!("{}", check);
                }
                Some(check)
            }
            None => None,
        };
        Ok((report, check))
    }

    /// Full session: header, lookup, and unless header-only, the dump into
    /// `output_dir`.
    ///
    /// A lookup miss is tolerated for banked cartridges and in header-only
    /// mode; a flat cartridge cannot be sized without its catalog entry.
    pub fn run(&mut self, lookup: &impl CartridgeLookup, output_dir: &Path) -> Result<DumpOutcome> {
        let header = self.read_header()?;
        let record = match lookup.lookup(&header) {
            Ok(record) => {
                tracing::info!("Catalog: {} ({} bytes)", record.name, record.size_bytes);
                Some(record)
            }
            Err(CartError::LookupMiss(checksum)) if self.header_only || self.family.is_banked() => {
                tracing::warn!("No catalog entry for checksum {}", checksum);
                None
            }
            Err(e) => return Err(e),
        };

        if self.header_only {
            return Ok(DumpOutcome {
                header,
                record,
                dump: None,
                crc: None,
                path: None,
            });
        }

        let layout = self.plan(&header, record.as_ref())?;
        let name = record
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_else(|| default_file_name(&header));
        let path = output_dir.join(name);
        let expected = record.as_ref().and_then(|r| {
            let crc = parse_crc(&r.crc32);
            if crc.is_none() {
                tracing::warn!("Catalog CRC '{}' is not hex, skipping check", r.crc32);
            }
            crc
        });

        let (report, crc) = self.dump_to_file(&layout, &path, expected)?;
        tracing::info!(
            "Dumped {} bytes to {} ({} retries)",
            report.bytes_written,
            path.display(),
            report.retries.len()
        );
        if let Some(check) = &crc {
            tracing::debug!("CRC {}", format_crc(check.actual));
        }

        Ok(DumpOutcome {
            header,
            record,
            dump: Some(report),
            crc,
            path: Some(path),
        })
    }

    /// End the session and release the transport.
    pub fn close(self) {
        self.client.close();
    }
}

/// File name from the header title, for dumps without a catalog entry.
fn default_file_name(header: &RomHeader) -> String {
    let stem: String = header
        .title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "cartridge" } else { stem.as_str() };
    let ext = match header.family {
        CartridgeFamily::N64 => "z64",
        CartridgeFamily::GameBoy => "gb",
    };
    format!("{}.{}", stem, ext)
}
