//! arca-escpos: ESC/POS output for 58 and 80 mm thermal printers.
//!
//! Documents are plain byte vectors: an `ESC @` reset, CP850 text with a
//! few style commands, and a partial cut. They are delivered through a
//! [`PrinterSink`]: a raw TCP port or a device/file path.
//!
//! ```
//! use arca_escpos::{LineFormatter, Receipt};
//! use chrono::NaiveDate;
//!
//! let now = NaiveDate::from_ymd_opt(2025, 9, 4).unwrap().and_hms_opt(9, 0, 0).unwrap();
//! let bytes = Receipt::test_page("TM-m30II", now, LineFormatter::for_paper(80));
//! assert!(bytes.starts_with(b"\x1B\x40"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codepage;
pub mod commands;
pub mod layout;
pub mod receipt;
pub mod sink;

pub use layout::LineFormatter;
pub use receipt::{Issuer, Receipt};
pub use sink::{FileSink, PrinterSink, PrinterTarget, TcpSink};
