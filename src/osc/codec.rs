//! OSC 1.0 wire codec.
//!
//! Layout:
//!
//! ```text
//! message := address-string  type-tag-string  argument*
//! string  := ASCII bytes, NUL terminated, zero padded to a multiple of 4
//! tags    := "," followed by one char per argument (f, i, s)
//! f / i   := 32-bit big-endian float / int
//! bundle  := "#bundle\0"  time-tag(u64 BE)  ( size(i32 BE) element )*
//! ```
//!
//! `BundleWriter` streams elements straight into a reusable byte buffer for
//! the hot path. `OscPacket` is the owned tree used by decoders and tests.

use crate::error::{Error, Result};

/// Bundle header marker.
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Time tag meaning "process immediately".
pub const IMMEDIATELY: u64 = 1;

/// Length of `len` bytes of string data plus its NUL terminator, padded to 4.
#[inline]
pub fn padded_str_len(len: usize) -> usize {
    (len + 4) & !3
}

/// Encoded size of a message carrying `float_args` float arguments.
pub fn float_message_len(address_len: usize, float_args: usize) -> usize {
    padded_str_len(address_len) + padded_str_len(1 + float_args) + 4 * float_args
}

fn write_str(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    let pad = padded_str_len(value.len()) - value.len();
    buf.extend(std::iter::repeat(0u8).take(pad));
}

fn write_tags(buf: &mut Vec<u8>, tags: impl Iterator<Item = u8>) {
    let start = buf.len();
    buf.push(b',');
    buf.extend(tags);
    let len = buf.len() - start;
    let pad = padded_str_len(len) - len;
    buf.extend(std::iter::repeat(0u8).take(pad));
}

/// Writes one bundle into a caller-owned buffer.
pub struct BundleWriter<'a> {
    buf: &'a mut Vec<u8>,
    elements: usize,
}

impl<'a> BundleWriter<'a> {
    /// Clears `buf` and writes the bundle header.
    pub fn begin(buf: &'a mut Vec<u8>, time_tag: u64) -> Self {
        buf.clear();
        buf.extend_from_slice(BUNDLE_TAG);
        buf.extend_from_slice(&time_tag.to_be_bytes());
        Self { buf, elements: 0 }
    }

    /// Appends a message whose arguments are all float32.
    pub fn push_floats(&mut self, address: &str, args: &[f32]) -> Result<()> {
        let size_at = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 4]);
        let body_start = self.buf.len();

        write_str(self.buf, address);
        write_tags(self.buf, args.iter().map(|_| b'f'));
        for value in args {
            self.buf.extend_from_slice(&value.to_be_bytes());
        }

        self.patch_size(size_at, body_start)
    }

    /// Appends an arbitrary packet as a bundle element.
    pub fn push_packet(&mut self, packet: &OscPacket) -> Result<()> {
        let size_at = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 4]);
        let body_start = self.buf.len();
        packet.encode_into(self.buf)?;
        self.patch_size(size_at, body_start)
    }

    fn patch_size(&mut self, size_at: usize, body_start: usize) -> Result<()> {
        let size = i32::try_from(self.buf.len() - body_start)
            .map_err(|_| Error::Codec("bundle element exceeds i32 size".to_string()))?;
        self.buf[size_at..size_at + 4].copy_from_slice(&size.to_be_bytes());
        self.elements += 1;
        Ok(())
    }

    /// Number of elements written so far.
    pub fn elements(&self) -> usize {
        self.elements
    }

    /// Total encoded length.
    pub fn finish(self) -> usize {
        self.buf.len()
    }
}

// ----------------------------------------------------------------------------
// Owned packet tree
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum OscArg {
    Float(f32),
    Int(i32),
    Str(String),
}

impl OscArg {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            OscArg::Float(v) => Some(*v),
            OscArg::Int(v) => Some(*v as f32),
            OscArg::Str(_) => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            OscArg::Float(_) => b'f',
            OscArg::Int(_) => b'i',
            OscArg::Str(_) => b's',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    pub fn floats(&self) -> Option<Vec<f32>> {
        self.args.iter().map(OscArg::as_f32).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OscBundle {
    pub time_tag: u64,
    pub content: Vec<OscPacket>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            OscPacket::Message(message) => {
                if !message.address.starts_with('/') || !message.address.is_ascii() {
                    return Err(Error::Codec(format!(
                        "invalid osc address '{}'",
                        message.address
                    )));
                }
                write_str(buf, &message.address);
                write_tags(buf, message.args.iter().map(OscArg::tag));
                for arg in &message.args {
                    match arg {
                        OscArg::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
                        OscArg::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
                        OscArg::Str(s) => write_str(buf, s),
                    }
                }
                Ok(())
            }
            OscPacket::Bundle(bundle) => {
                let mut nested = Vec::new();
                let mut writer = BundleWriter::begin(&mut nested, bundle.time_tag);
                for element in &bundle.content {
                    writer.push_packet(element)?;
                }
                buf.extend_from_slice(&nested);
                Ok(())
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(BUNDLE_TAG) {
            decode_bundle(bytes).map(OscPacket::Bundle)
        } else {
            decode_message(bytes).map(OscPacket::Message)
        }
    }

    /// Flattened list of messages, descending into nested bundles.
    pub fn messages(&self) -> Vec<&OscMessage> {
        let mut out = Vec::new();
        collect_messages(self, &mut out);
        out
    }
}

fn collect_messages<'a>(packet: &'a OscPacket, out: &mut Vec<&'a OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for element in &bundle.content {
                collect_messages(element, out);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::Codec(format!(
                "truncated packet: need {} bytes at offset {}, have {}",
                len,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let hi = self.read_u32()? as u64;
        let lo = self.read_u32()? as u64;
        Ok(hi << 32 | lo)
    }

    fn read_str(&mut self) -> Result<&'a str> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::Codec("unterminated osc string".to_string()))?;
        let value = std::str::from_utf8(&rest[..nul])
            .map_err(|_| Error::Codec("osc string is not valid utf-8".to_string()))?;
        self.take(padded_str_len(nul))?;
        Ok(value)
    }
}

fn decode_message(bytes: &[u8]) -> Result<OscMessage> {
    let mut reader = Reader::new(bytes);
    let address = reader.read_str()?;
    if !address.starts_with('/') {
        return Err(Error::Codec(format!("invalid osc address '{}'", address)));
    }
    let tags = reader.read_str()?;
    let tags = tags
        .strip_prefix(',')
        .ok_or_else(|| Error::Codec(format!("type tags for {} missing ','", address)))?;

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.bytes() {
        let arg = match tag {
            b'f' => OscArg::Float(f32::from_bits(reader.read_u32()?)),
            b'i' => OscArg::Int(reader.read_u32()? as i32),
            b's' => OscArg::Str(reader.read_str()?.to_string()),
            other => {
                return Err(Error::Codec(format!(
                    "unsupported osc type tag '{}' in {}",
                    other as char, address
                )))
            }
        };
        args.push(arg);
    }
    if reader.remaining() != 0 {
        return Err(Error::Codec(format!(
            "{} trailing bytes after message {}",
            reader.remaining(),
            address
        )));
    }

    Ok(OscMessage {
        address: address.to_string(),
        args,
    })
}

fn decode_bundle(bytes: &[u8]) -> Result<OscBundle> {
    let mut reader = Reader::new(bytes);
    reader.take(BUNDLE_TAG.len())?;
    let time_tag = reader.read_u64()?;

    let mut content = Vec::new();
    while reader.remaining() > 0 {
        let size = reader.read_u32()? as usize;
        if size % 4 != 0 {
            return Err(Error::Codec(format!(
                "bundle element size {} is not 4-byte aligned",
                size
            )));
        }
        let element = reader.take(size)?;
        content.push(OscPacket::decode(element)?);
    }

    Ok(OscBundle { time_tag, content })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_nul_terminated_and_padded() {
        let mut buf = Vec::new();
        write_str(&mut buf, "/ab");
        assert_eq!(buf, b"/ab\0");
        buf.clear();
        write_str(&mut buf, "/abcd");
        assert_eq!(buf, b"/abcd\0\0\0");
        assert_eq!(padded_str_len(0), 4);
        assert_eq!(padded_str_len(3), 4);
        assert_eq!(padded_str_len(4), 8);
    }

    #[test]
    fn float_message_matches_reference_bytes() {
        let packet = OscPacket::Message(OscMessage::new("/x", vec![OscArg::Float(1.0)]));
        let bytes = packet.encode().unwrap();
        assert_eq!(
            bytes,
            vec![b'/', b'x', 0, 0, b',', b'f', 0, 0, 0x3f, 0x80, 0, 0]
        );
        assert_eq!(bytes.len(), float_message_len(2, 1));
    }

    #[test]
    fn bundle_writer_frames_elements() {
        let mut buf = Vec::new();
        let mut writer = BundleWriter::begin(&mut buf, IMMEDIATELY);
        writer.push_floats("/a", &[0.5, 0.25]).unwrap();
        writer.push_floats("/b", &[]).unwrap();
        assert_eq!(writer.elements(), 2);
        let len = writer.finish();

        assert_eq!(&buf[..8], BUNDLE_TAG);
        assert_eq!(&buf[8..16], &1u64.to_be_bytes());
        // "/a\0\0" + ",ff\0" + 8 bytes of floats
        assert_eq!(&buf[16..20], &16i32.to_be_bytes());
        assert_eq!(len, 16 + 4 + 16 + 4 + 8);

        let decoded = OscPacket::decode(&buf).unwrap();
        let OscPacket::Bundle(bundle) = decoded else {
            panic!("expected bundle");
        };
        assert_eq!(bundle.time_tag, IMMEDIATELY);
        assert_eq!(
            bundle.content,
            vec![
                OscPacket::Message(OscMessage::new(
                    "/a",
                    vec![OscArg::Float(0.5), OscArg::Float(0.25)]
                )),
                OscPacket::Message(OscMessage::new("/b", vec![])),
            ]
        );
    }

    #[test]
    fn decodes_nested_bundles_and_mixed_args() {
        let inner = OscPacket::Bundle(OscBundle {
            time_tag: 42,
            content: vec![OscPacket::Message(OscMessage::new(
                "/inner",
                vec![OscArg::Int(-7), OscArg::Str("hello".to_string())],
            ))],
        });
        let outer = OscPacket::Bundle(OscBundle {
            time_tag: IMMEDIATELY,
            content: vec![
                inner,
                OscPacket::Message(OscMessage::new("/outer", vec![OscArg::Float(3.5)])),
            ],
        });

        let bytes = outer.encode().unwrap();
        assert_eq!(bytes.len() % 4, 0);
        let decoded = OscPacket::decode(&bytes).unwrap();
        assert_eq!(decoded, outer);
        let addresses: Vec<&str> = decoded
            .messages()
            .iter()
            .map(|m| m.address.as_str())
            .collect();
        assert_eq!(addresses, vec!["/inner", "/outer"]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(OscPacket::decode(b"/abc").is_err());
        assert!(OscPacket::decode(b"nope\0\0\0\0,\0\0\0").is_err());
        assert!(OscPacket::decode(b"/a\0\0ff\0\0").is_err());
        // Declares a float that is not present.
        assert!(OscPacket::decode(b"/a\0\0,f\0\0").is_err());
        // Element size larger than remaining bytes.
        let mut truncated = BUNDLE_TAG.to_vec();
        truncated.extend_from_slice(&1u64.to_be_bytes());
        truncated.extend_from_slice(&64u32.to_be_bytes());
        truncated.extend_from_slice(b"/a\0\0,\0\0\0");
        assert!(OscPacket::decode(&truncated).is_err());
        assert!(OscPacket::Message(OscMessage::new("no-slash", vec![]))
            .encode()
            .is_err());
    }
}
