//! ESC/POS command bytes.

/// `ESC @`: reset the printer.
pub const INIT: &[u8] = b"\x1B\x40";
/// `ESC E 1`
pub const BOLD_ON: &[u8] = b"\x1B\x45\x01";
/// `ESC E 0`
pub const BOLD_OFF: &[u8] = b"\x1B\x45\x00";
/// `ESC ! 0x30`: double height and width.
pub const DOUBLE_SIZE: &[u8] = b"\x1B\x21\x30";
/// `ESC ! 0`
pub const NORMAL_SIZE: &[u8] = b"\x1B\x21\x00";
/// `ESC t 2`: select code page 850.
pub const CODEPAGE_CP850: &[u8] = b"\x1B\x74\x02";
/// `ESC i`: partial cut.
pub const PARTIAL_CUT: &[u8] = b"\x1B\x69";

/// Horizontal alignment for `ESC a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Left
    Left = 0,
    /// Center
    Center = 1,
    /// Right
    Right = 2,
}

/// `ESC a n`
pub fn align(align: Align) -> [u8; 3] {
    [0x1B, 0x61, align as u8]
}

/// `ESC d n`: print and feed `lines` lines.
pub fn feed(lines: u8) -> [u8; 3] {
    [0x1B, 0x64, lines]
}

/// QR error correction level for `GS ( k` function 169.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrErrorLevel {
    /// ~7%
    L = 0x30,
    /// ~15%
    M = 0x31,
    /// ~25%
    Q = 0x32,
    /// ~30%
    H = 0x33,
}

/// Largest payload a single `GS ( k` store command can carry.
pub const QR_MAX_DATA: usize = 7089;

/// Native QR sequence: model 2, module size, error level, store, print.
///
/// Returns `None` when `data` is empty or too long. `module_size` is
/// clamped to the 1..=16 range printers accept.
pub fn qr_code(data: &[u8], module_size: u8, level: QrErrorLevel) -> Option<Vec<u8>> {
    if data.is_empty() || data.len() > QR_MAX_DATA {
        return None;
    }
    let stored = data.len() + 3;
    let [p_l, p_h] = u16::try_from(stored).ok()?.to_le_bytes();

    let mut out = Vec::with_capacity(data.len() + 32);
    // Model 2
    out.extend_from_slice(&[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);
    // Module size
    out.extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, module_size.clamp(1, 16)]);
    // Error correction
    out.extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, level as u8]);
    // Store
    out.extend_from_slice(&[0x1D, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
    out.extend_from_slice(data);
    // Print
    out.extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);
    Some(out)
}
