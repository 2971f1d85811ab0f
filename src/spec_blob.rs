//! Multi-hypothesis decoding of raw spec record payloads.
//!
//! Spec records arrive as opaque blobs in one of several undocumented
//! encodings. The decoder models each known encoding family × byte order as
//! an ordered hypothesis with a pure evaluation function returning a tagged
//! [`DecodeAttempt`] — nothing here throws for malformed input. Selection is
//! a fold over the attempt list with a fixed priority order, and every call
//! produces full [`DecodeDiagnostics`] regardless of outcome.
//!
//! The byte-level header layouts are a versioned strategy local to this
//! module (see the layout constants below); the hypothesis ordering, statuses
//! and selection policy are the stable contract.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, trace};
use serde::Serialize;

use crate::metadata::SpecRecordFlags;
use crate::utils::hex_preview;

/// Marker bytes opening a versioned-container header.
pub const CONTAINER_MARKER: [u8; 2] = [0xb7, 0x33];

/// Container header version this strategy understands.
pub const CONTAINER_VERSION: u16 = 1;

/// Container header: marker(2) + version(2) + code page(2) + OS type(2) +
/// unpacked length(4) + payload CRC32(4).
pub const CONTAINER_HEADER_LEN: usize = 16;

/// Plain encoding: unpacked length(4) + payload.
pub const PLAIN_HEADER_LEN: usize = 4;

/// How far into a stream the spec-stream sniffer will skip padding.
const SNIFF_WINDOW: usize = 64;

const DEFAULT_PREVIEW_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncodingFamily {
    Plain,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endianness {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptStatus {
    NotAttempted,
    Success,
    /// Header bytes fail the family's magic/shape check.
    FormatMismatch,
    /// The header parsed but its declared length exceeds the available bytes.
    Truncated,
    /// Internal error while unpacking.
    Error,
}

/// One decode hypothesis outcome. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeAttempt {
    pub family: EncodingFamily,
    pub byte_order: Endianness,
    pub status: AttemptStatus,
    pub unpacked_len: u64,
    /// Heuristic: the unpacked bytes begin with the expected spec-stream head.
    pub looks_like_spec: bool,
    pub error: Option<String>,
    /// Declared code page (container family only).
    pub code_page: Option<u16>,
    /// Declared OS type (container family only).
    pub os_type: Option<u16>,
}

impl DecodeAttempt {
    /// Sentinel for a hypothesis that was never evaluated.
    pub const NOT_ATTEMPTED: DecodeAttempt = DecodeAttempt {
        family: EncodingFamily::Plain,
        byte_order: Endianness::Little,
        status: AttemptStatus::NotAttempted,
        unpacked_len: 0,
        looks_like_spec: false,
        error: None,
        code_page: None,
        os_type: None,
    };

    fn new(family: EncodingFamily, byte_order: Endianness) -> Self {
        DecodeAttempt {
            family,
            byte_order,
            ..DecodeAttempt::NOT_ATTEMPTED
        }
    }

    fn mismatch(mut self, message: impl Into<String>) -> Self {
        self.status = AttemptStatus::FormatMismatch;
        self.error = Some(message.into());
        self
    }

    pub fn is_qualified(&self) -> bool {
        self.status == AttemptStatus::Success && self.looks_like_spec
    }
}

/// Per-payload decode record: one entry per `decode` call, never mutated
/// after construction, consumed only for logging/troubleshooting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeDiagnostics {
    pub sequence: u64,
    pub blob_size: usize,
    pub head_preview: String,
    /// Whether the raw bytes themselves already sniff as a spec stream.
    pub raw_looks_like_spec: bool,
    /// Plain/LE, plain/BE, container/LE, container/BE — in hypothesis order.
    pub raw_attempts: [DecodeAttempt; 4],
    pub decompressed: Option<DecompressedDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecompressedDiagnostics {
    pub size: usize,
    pub attempts: [DecodeAttempt; 4],
}

impl DecodeDiagnostics {
    /// Number of hypotheses actually evaluated.
    pub fn attempt_count(&self) -> usize {
        let decompressed = self
            .decompressed
            .as_ref()
            .map(|d| d.attempts.len())
            .unwrap_or(0);
        self.raw_attempts.len() + decompressed
    }
}

/// A successfully unpacked spec stream plus the hypothesis that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSpec {
    pub bytes: Vec<u8>,
    pub family: EncodingFamily,
    pub byte_order: Endianness,
    pub from_decompressed: bool,
    pub code_page: Option<u16>,
}

/// Returns true when `bytes` begin with the expected spec-stream head: after
/// skipping NUL/BOM/whitespace padding within a bounded window, the first
/// significant byte opens a tag. Spec streams are XML-convertible, so this
/// stays aligned with payload normalization instead of relying on magic
/// offsets.
pub fn looks_like_spec_stream(bytes: &[u8]) -> bool {
    const PADDING: [u8; 10] = [
        0x00, 0x09, 0x0a, 0x0d, 0x20, // NUL + whitespace
        0xef, 0xbb, 0xbf, // UTF-8 BOM
        0xff, 0xfe, // UTF-16 BOMs
    ];

    bytes
        .iter()
        .take(SNIFF_WINDOW)
        .find(|byte| !PADDING.contains(byte))
        .map(|&byte| byte == b'<')
        .unwrap_or(false)
}

/// The Spec Blob Decoder. Owns a sequence counter for diagnostics; otherwise
/// stateless and shareable across threads.
#[derive(Debug)]
pub struct SpecBlobDecoder {
    sequence: AtomicU64,
    validate_checksums: bool,
    preview_len: usize,
}

impl Default for SpecBlobDecoder {
    fn default() -> Self {
        SpecBlobDecoder::new()
    }
}

impl SpecBlobDecoder {
    pub fn new() -> Self {
        SpecBlobDecoder {
            sequence: AtomicU64::new(0),
            validate_checksums: true,
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }

    /// Disabling checksum validation lets damaged containers through the
    /// shape check; the spec-stream heuristic still applies.
    pub fn validate_checksums(mut self, validate: bool) -> Self {
        self.validate_checksums = validate;
        self
    }

    pub fn preview_len(mut self, len: usize) -> Self {
        self.preview_len = len;
        self
    }

    /// Tries every known hypothesis against `raw` (and, when the record is
    /// flagged compressed, against the inflated bytes) and returns the first
    /// qualifying stream together with full diagnostics.
    ///
    /// Never fails: a blob no hypothesis accepts yields `(None, diagnostics)`.
    pub fn decode(
        &self,
        raw: &[u8],
        flags: SpecRecordFlags,
    ) -> (Option<DecodedSpec>, DecodeDiagnostics) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(
            "spec blob decode #{sequence}: {} bytes, flags {flags:?}",
            raw.len()
        );

        let (raw_attempts, raw_payloads) = self.evaluate_all(raw);

        let mut decompressed = None;
        let mut decompressed_payloads: [Option<Vec<u8>>; 4] = [None, None, None, None];
        if flags.contains(SpecRecordFlags::COMPRESSED) {
            match inflate(raw) {
                Ok(bytes) => {
                    let (attempts, payloads) = self.evaluate_all(&bytes);
                    decompressed_payloads = payloads;
                    decompressed = Some(DecompressedDiagnostics {
                        size: bytes.len(),
                        attempts,
                    });
                }
                Err(e) => {
                    debug!("decode #{sequence}: declared-compressed payload failed to inflate: {e}")
                }
            }
        }

        let diagnostics = DecodeDiagnostics {
            sequence,
            blob_size: raw.len(),
            head_preview: hex_preview(raw, self.preview_len),
            raw_looks_like_spec: looks_like_spec_stream(raw),
            raw_attempts,
            decompressed,
        };

        let selected = select(&diagnostics, decompressed_payloads, raw_payloads);

        match &selected {
            Some(spec) => debug!(
                "decode #{sequence}: selected {:?}/{:?} (decompressed: {}), {} unpacked bytes",
                spec.family,
                spec.byte_order,
                spec.from_decompressed,
                spec.bytes.len()
            ),
            None => debug!(
                "decode #{sequence}: no hypothesis qualified, head: {}",
                diagnostics.head_preview
            ),
        }

        (selected, diagnostics)
    }

    fn evaluate_all(&self, data: &[u8]) -> ([DecodeAttempt; 4], [Option<Vec<u8>>; 4]) {
        let (a0, p0) = attempt_plain(data, Endianness::Little);
        let (a1, p1) = attempt_plain(data, Endianness::Big);
        let (a2, p2) = attempt_container(data, Endianness::Little, self.validate_checksums);
        let (a3, p3) = attempt_container(data, Endianness::Big, self.validate_checksums);
        ([a0, a1, a2, a3], [p0, p1, p2, p3])
    }
}

/// The decompressed stream is the canonical one, so its hypotheses outrank
/// the raw ones; within each group, hypothesis order decides.
fn select(
    diagnostics: &DecodeDiagnostics,
    mut decompressed_payloads: [Option<Vec<u8>>; 4],
    mut raw_payloads: [Option<Vec<u8>>; 4],
) -> Option<DecodedSpec> {
    if let Some(section) = &diagnostics.decompressed {
        for (i, attempt) in section.attempts.iter().enumerate() {
            if attempt.is_qualified() {
                if let Some(bytes) = decompressed_payloads[i].take() {
                    return Some(DecodedSpec {
                        bytes,
                        family: attempt.family,
                        byte_order: attempt.byte_order,
                        from_decompressed: true,
                        code_page: attempt.code_page,
                    });
                }
            }
        }
    }

    for (i, attempt) in diagnostics.raw_attempts.iter().enumerate() {
        if attempt.is_qualified() {
            if let Some(bytes) = raw_payloads[i].take() {
                return Some(DecodedSpec {
                    bytes,
                    family: attempt.family,
                    byte_order: attempt.byte_order,
                    from_decompressed: false,
                    code_page: attempt.code_page,
                });
            }
        }
    }

    None
}

fn read_u32(data: &[u8], byte_order: Endianness) -> u32 {
    match byte_order {
        Endianness::Little => LittleEndian::read_u32(data),
        Endianness::Big => BigEndian::read_u32(data),
    }
}

fn read_u16(data: &[u8], byte_order: Endianness) -> u16 {
    match byte_order {
        Endianness::Little => LittleEndian::read_u16(data),
        Endianness::Big => BigEndian::read_u16(data),
    }
}

fn attempt_plain(data: &[u8], byte_order: Endianness) -> (DecodeAttempt, Option<Vec<u8>>) {
    let mut attempt = DecodeAttempt::new(EncodingFamily::Plain, byte_order);

    if data.len() < PLAIN_HEADER_LEN {
        return (attempt.mismatch("blob shorter than the length prefix"), None);
    }

    let declared = u64::from(read_u32(&data[..4], byte_order));
    if declared == 0 {
        return (attempt.mismatch("zero declared length"), None);
    }

    let available = (data.len() - PLAIN_HEADER_LEN) as u64;
    if declared > available {
        attempt.status = AttemptStatus::Truncated;
        attempt.error = Some(format!(
            "declared length {declared} exceeds available {available}"
        ));
        return (attempt, None);
    }

    let payload = &data[PLAIN_HEADER_LEN..PLAIN_HEADER_LEN + declared as usize];
    attempt.status = AttemptStatus::Success;
    attempt.unpacked_len = declared;
    attempt.looks_like_spec = looks_like_spec_stream(payload);
    (attempt, Some(payload.to_vec()))
}

fn attempt_container(
    data: &[u8],
    byte_order: Endianness,
    validate_checksum: bool,
) -> (DecodeAttempt, Option<Vec<u8>>) {
    let mut attempt = DecodeAttempt::new(EncodingFamily::Container, byte_order);

    if data.len() < CONTAINER_HEADER_LEN {
        return (attempt.mismatch("blob shorter than the container header"), None);
    }
    if data[..2] != CONTAINER_MARKER {
        return (attempt.mismatch("container marker not found"), None);
    }

    let version = read_u16(&data[2..4], byte_order);
    if version != CONTAINER_VERSION {
        return (
            attempt.mismatch(format!("unsupported container version {version}")),
            None,
        );
    }

    attempt.code_page = Some(read_u16(&data[4..6], byte_order));
    attempt.os_type = Some(read_u16(&data[6..8], byte_order));

    let declared = u64::from(read_u32(&data[8..12], byte_order));
    let declared_crc = read_u32(&data[12..16], byte_order);

    let available = (data.len() - CONTAINER_HEADER_LEN) as u64;
    if declared > available {
        attempt.status = AttemptStatus::Truncated;
        attempt.error = Some(format!(
            "declared length {declared} exceeds available {available}"
        ));
        return (attempt, None);
    }

    let payload = &data[CONTAINER_HEADER_LEN..CONTAINER_HEADER_LEN + declared as usize];

    if validate_checksum {
        let computed = crc32fast::hash(payload);
        if computed != declared_crc {
            return (
                attempt.mismatch(format!(
                    "payload checksum mismatch (declared {declared_crc:08x}, computed {computed:08x})"
                )),
                None,
            );
        }
    }

    attempt.status = AttemptStatus::Success;
    attempt.unpacked_len = declared;
    attempt.looks_like_spec = looks_like_spec_stream(payload);
    (attempt, Some(payload.to_vec()))
}

fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
