//! Inspection tools for the tollgate protocol engine.
//!
//! This crate backs the `tollgate-tools` binary:
//!
//! - Compile a definition file and print its resolved layout
//! - Split a captured byte stream into messages and decode them to JSON
//! - Check which modules of an extension directory would load
//!
//! # Design Principles
//!
//! - **Same code paths as the engine** - Definitions, framing and module
//!   resolution go through the library crates, never a reimplementation.
//! - **Human-readable output** - Every report has a plain text rendering.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use modules::{Discovery, ModuleError};
use registry::{ProtocolRegistry, VersionReq};
use schema::{Object, Schema, SchemaError, SchemaParseError};
use serde::Serialize;
use wire::{FrameBuffer, Limits};

/// A compiled definition file.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub path: PathBuf,
    pub schema: Schema,
    /// Lines the parser skipped.
    pub warnings: Vec<SchemaParseError>,
    /// Set when the compiled layout does not validate.
    pub invalid: Option<SchemaError>,
}

impl CompileReport {
    pub const fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.invalid.is_none()
    }
}

/// Parses a definition file.
pub fn compile_def(path: &Path) -> Result<CompileReport> {
    let parsed = schema::parse_def_file(path)
        .with_context(|| format!("read definition {}", path.display()))?;
    let invalid = parsed.schema.validate().err();
    Ok(CompileReport {
        path: path.to_path_buf(),
        schema: parsed.schema,
        warnings: parsed.errors,
        invalid,
    })
}

pub fn format_compile_report(report: &CompileReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", report.path.display());
    out.push_str(&report.schema.to_string());
    for warning in &report.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    if let Some(err) = &report.invalid {
        let _ = writeln!(out, "error: {err}");
    }
    out
}

/// Splits captured transport bytes into complete messages.
///
/// Trailing bytes that do not form a complete message are an error.
pub fn split_frames(bytes: &[u8], limits: Limits) -> Result<Vec<Vec<u8>>> {
    let mut frames = FrameBuffer::new(limits);
    let mut out = Vec::new();
    // Drain between chunks so the pending-frame limit applies to the
    // buffer, not to the whole capture.
    for chunk in bytes.chunks(wire::MAX_MESSAGE_LEN) {
        frames.push(chunk).context("split capture into messages")?;
        out.extend(frames.by_ref());
    }
    if frames.pending_len() > 0 {
        bail!(
            "capture ends with {} bytes of an incomplete message",
            frames.pending_len()
        );
    }
    Ok(out)
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub opcode: u16,
    pub length: u16,
    pub body: Object,
}

/// Decodes a message with a definition loaded on its own.
pub fn decode_with_schema(message: &[u8], schema: &Schema) -> Result<DecodedMessage> {
    let header = wire::decode_header(message).context("read message header")?;
    let body = schema
        .decode(message)
        .with_context(|| format!("decode opcode {}", header.opcode))?;
    Ok(DecodedMessage {
        name: None,
        version: None,
        opcode: header.opcode,
        length: header.length,
        body,
    })
}

/// Decodes a message by looking its opcode up in `registry`.
pub fn decode_with_registry(
    message: &[u8],
    registry: &ProtocolRegistry,
    protocol: u32,
    version: VersionReq,
) -> Result<DecodedMessage> {
    let header = wire::decode_header(message).context("read message header")?;
    let resolved = registry
        .resolve(protocol, header.opcode, version)
        .with_context(|| format!("resolve opcode {} in protocol {protocol}", header.opcode))?;
    let body = resolved
        .decode(message)
        .with_context(|| format!("decode {}.{}", resolved.name, resolved.version))?;
    Ok(DecodedMessage {
        name: Some(resolved.name),
        version: Some(resolved.version),
        opcode: header.opcode,
        length: header.length,
        body,
    })
}

pub fn decode_json(messages: &[DecodedMessage]) -> Result<String> {
    serde_json::to_string_pretty(messages).context("serialize json")
}

pub fn format_decode_pretty(message: &DecodedMessage) -> String {
    let mut out = String::new();
    let label = match (&message.name, message.version) {
        (Some(name), Some(version)) => format!("{name}.{version}"),
        (Some(name), None) => name.clone(),
        _ => format!("opcode {}", message.opcode),
    };
    let _ = writeln!(
        out,
        "{label} (opcode {}, {} bytes)",
        message.opcode, message.length
    );
    for (key, value) in message.body.iter() {
        let _ = writeln!(out, "  {key}: {value:?}");
    }
    out
}

/// Reads and splits a capture file.
pub fn read_capture(path: &Path, limits: Limits) -> Result<Vec<Vec<u8>>> {
    let bytes = fs::read(path).with_context(|| format!("read capture {}", path.display()))?;
    split_frames(&bytes, limits)
}

pub fn format_discovery(discovery: &Discovery) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "installed: {}", discovery.installed.len());
    for info in &discovery.installed {
        let version = info.version.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "  {} {version} [{:?}, load on {:?}]",
            info.printable_name(),
            info.category,
            info.options.load_on
        );
    }
    if !discovery.excluded.is_empty() {
        let _ = writeln!(out, "excluded: {}", discovery.excluded.len());
        for err in &discovery.excluded {
            let _ = writeln!(out, "  {}", excluded_line(err));
        }
    }
    out
}

fn excluded_line(err: &ModuleError) -> String {
    let mut line = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let _ = write!(line, ": {cause}");
        source = cause.source();
    }
    line
}
