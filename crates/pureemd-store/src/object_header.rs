//! HDF5 object headers: v1 and v2 parsing with continuation chunks, and the
//! v2 writer.

use tracing::trace;

use crate::bytes::{self, read_u16, read_u32, read_u8, read_uint, to_index, write_uint};
use crate::checksum::jenkins_lookup3;
use crate::error::StoreError;
use crate::message_type::MessageType;
use crate::superblock::Superblock;

const OHDR_SIGNATURE: [u8; 4] = *b"OHDR";
const OCHK_SIGNATURE: [u8; 4] = *b"OCHK";

/// Message flag: the object must not be opened at all if the message is not understood.
pub(crate) const FLAG_FAIL_IF_UNKNOWN: u8 = 0x80;
/// Message flag: the object must not be modified if the message is not understood.
pub(crate) const FLAG_FAIL_WRITE_IF_UNKNOWN: u8 = 0x08;
/// Message flag: the data is a reference to a shared message.
pub(crate) const FLAG_SHARED: u8 = 0x02;
/// Message flag: the message never changes.
pub(crate) const FLAG_CONSTANT: u8 = 0x01;

/// One header message, borrowing its data from the file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderMessage<'a> {
    pub msg_type: MessageType,
    pub flags: u8,
    pub data: &'a [u8],
}

/// All non-NIL messages of an object, gathered from every chunk.
#[derive(Debug, Clone)]
pub(crate) struct ObjectHeader<'a> {
    pub version: u8,
    pub messages: Vec<HeaderMessage<'a>>,
}

#[derive(Clone, Copy)]
enum Chunk {
    V1 { start: usize, end: usize },
    V2Continuation { start: usize, len: usize },
}

impl<'a> ObjectHeader<'a> {
    /// Parse the object header at file address `address`.
    pub(crate) fn parse(
        data: &'a [u8],
        address: u64,
        sb: &Superblock,
    ) -> Result<ObjectHeader<'a>, StoreError> {
        let offset = to_index(sb.base_address, address)?;
        bytes::ensure_len(data, offset, 4)?;
        if data[offset..offset + 4] == OHDR_SIGNATURE {
            Self::parse_v2(data, offset, sb)
        } else {
            Self::parse_v1(data, offset, sb)
        }
    }

    fn parse_v1(data: &'a [u8], offset: usize, sb: &Superblock) -> Result<Self, StoreError> {
        // version(1) reserved(1) count(2) refcount(4) size(4), padded to 16
        bytes::ensure_len(data, offset, 16)?;
        let version = data[offset];
        if version != 1 {
            return Err(StoreError::UnsupportedVersion {
                what: "object header",
                version,
            });
        }
        let size = bytes::to_usize(u64::from(read_u32(data, offset + 8)?))?;
        let start = offset + 16;
        bytes::ensure_len(data, start, size)?;
        let mut header = ObjectHeader {
            version,
            messages: Vec::new(),
        };
        header.walk(
            data,
            Chunk::V1 {
                start,
                end: start + size,
            },
            sb,
            None,
        )?;
        Ok(header)
    }

    fn parse_v2(data: &'a [u8], offset: usize, sb: &Superblock) -> Result<Self, StoreError> {
        let version = read_u8(data, offset + 4)?;
        if version != 2 {
            return Err(StoreError::UnsupportedVersion {
                what: "object header",
                version,
            });
        }
        let flags = read_u8(data, offset + 5)?;
        let mut pos = offset + 6;
        if flags & 0x20 != 0 {
            pos += 16; // access, modification, change, birth times
        }
        if flags & 0x10 != 0 {
            pos += 4; // attribute phase change thresholds
        }
        let width = 1u8 << (flags & 0x03);
        let chunk_size = bytes::to_usize(read_uint(data, pos, width)?)?;
        pos += usize::from(width);
        let end = pos
            .checked_add(chunk_size)
            .ok_or(StoreError::InvalidAddress(chunk_size as u64))?;
        verify_checksum(data, offset, end)?;

        let mut header = ObjectHeader {
            version,
            messages: Vec::new(),
        };
        let creation_order = flags & 0x04 != 0;
        let mut pending = Vec::new();
        header.parse_v2_messages(data, pos, end, creation_order, sb, &mut pending)?;
        let mut visited = vec![offset];
        while let Some(chunk) = pending.pop() {
            header.walk(data, chunk, sb, Some((creation_order, &mut visited)))?;
        }
        Ok(header)
    }

    /// Parse one chunk and every continuation it (transitively) names.
    fn walk(
        &mut self,
        data: &'a [u8],
        first: Chunk,
        sb: &Superblock,
        mut v2: Option<(bool, &mut Vec<usize>)>,
    ) -> Result<(), StoreError> {
        let mut pending = vec![first];
        let mut visited_v1 = Vec::new();
        while let Some(chunk) = pending.pop() {
            match chunk {
                Chunk::V1 { start, end } => {
                    if visited_v1.contains(&start) {
                        return Err(StoreError::Unsupported(format!(
                            "object header continuation loop at {start:#x}"
                        )));
                    }
                    visited_v1.push(start);
                    self.parse_v1_messages(data, start, end, sb, &mut pending)?;
                }
                Chunk::V2Continuation { start, len } => {
                    let Some((creation_order, visited)) = v2.as_mut() else {
                        return Err(StoreError::InvalidSignature("OHDR"));
                    };
                    if visited.contains(&start) {
                        return Err(StoreError::Unsupported(format!(
                            "object header continuation loop at {start:#x}"
                        )));
                    }
                    visited.push(start);
                    if len < 8 {
                        return Err(StoreError::UnexpectedEof {
                            expected: 8,
                            available: len,
                        });
                    }
                    let block = bytes::slice(data, start, len)?;
                    if block[..4] != OCHK_SIGNATURE {
                        return Err(StoreError::InvalidSignature("OCHK"));
                    }
                    let end = start + len - 4;
                    verify_checksum(data, start, end)?;
                    let co = *creation_order;
                    self.parse_v2_messages(data, start + 4, end, co, sb, &mut pending)?;
                }
            }
        }
        Ok(())
    }

    fn parse_v1_messages(
        &mut self,
        data: &'a [u8],
        start: usize,
        end: usize,
        sb: &Superblock,
        pending: &mut Vec<Chunk>,
    ) -> Result<(), StoreError> {
        let block = bytes::slice(data, start, end - start)?;
        let mut pos = 0;
        while pos + 8 <= block.len() {
            let raw_type = read_u16(block, pos)?;
            let size = usize::from(read_u16(block, pos + 2)?);
            let flags = block[pos + 4];
            pos += 8;
            let body = bytes::slice(block, pos, size)?;
            pos += size;
            if let Some((addr, len)) = self.push(raw_type, flags, body, sb)? {
                pending.push(Chunk::V1 {
                    start: addr,
                    end: addr.checked_add(len).ok_or(StoreError::InvalidAddress(len as u64))?,
                });
            }
        }
        Ok(())
    }

    fn parse_v2_messages(
        &mut self,
        data: &'a [u8],
        start: usize,
        end: usize,
        creation_order: bool,
        sb: &Superblock,
        pending: &mut Vec<Chunk>,
    ) -> Result<(), StoreError> {
        let block = bytes::slice(data, start, end - start)?;
        let prefix = if creation_order { 6 } else { 4 };
        let mut pos = 0;
        // Fewer bytes than a message prefix left over is a gap.
        while pos + prefix <= block.len() {
            let raw_type = u16::from(block[pos]);
            let size = usize::from(read_u16(block, pos + 1)?);
            let flags = block[pos + 3];
            pos += prefix;
            let body = bytes::slice(block, pos, size)?;
            pos += size;
            if let Some((addr, len)) = self.push(raw_type, flags, body, sb)? {
                pending.push(Chunk::V2Continuation { start: addr, len });
            }
        }
        Ok(())
    }

    /// Record a message. Continuations are returned as (index, length) instead.
    fn push(
        &mut self,
        raw_type: u16,
        flags: u8,
        body: &'a [u8],
        sb: &Superblock,
    ) -> Result<Option<(usize, usize)>, StoreError> {
        let msg_type = MessageType::from_u16(raw_type);
        match msg_type {
            MessageType::Nil => Ok(None),
            MessageType::ObjectHeaderContinuation => {
                let addr = read_uint(body, 0, sb.offset_size)?;
                let len = read_uint(body, usize::from(sb.offset_size), sb.length_size)?;
                trace!(addr, len, "object header continuation");
                Ok(Some((to_index(sb.base_address, addr)?, bytes::to_usize(len)?)))
            }
            MessageType::Unknown(id) if flags & FLAG_FAIL_IF_UNKNOWN != 0 => Err(
                StoreError::Unsupported(format!("required header message {id:#06x}")),
            ),
            _ => {
                self.messages.push(HeaderMessage {
                    msg_type,
                    flags,
                    data: body,
                });
                Ok(None)
            }
        }
    }

    /// First message of the given type.
    pub(crate) fn find(&self, msg_type: MessageType) -> Option<&HeaderMessage<'a>> {
        self.messages.iter().find(|m| m.msg_type == msg_type)
    }

    pub(crate) fn all(&self, msg_type: MessageType) -> impl Iterator<Item = &HeaderMessage<'a>> {
        self.messages.iter().filter(move |m| m.msg_type == msg_type)
    }
}

fn verify_checksum(data: &[u8], start: usize, end: usize) -> Result<(), StoreError> {
    let stored = read_u32(data, end)?;
    let computed = jenkins_lookup3(&data[start..end]);
    if stored != computed {
        return Err(StoreError::ChecksumMismatch {
            expected: stored,
            computed,
        });
    }
    Ok(())
}

/// Builds a single-chunk v2 object header.
#[derive(Default)]
pub(crate) struct ObjectHeaderWriter {
    messages: Vec<(MessageType, Vec<u8>, u8)>,
}

impl ObjectHeaderWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_message(&mut self, msg_type: MessageType, data: Vec<u8>) {
        self.messages.push((msg_type, data, 0));
    }

    pub(crate) fn add_message_with_flags(&mut self, msg_type: MessageType, data: Vec<u8>, flags: u8) {
        self.messages.push((msg_type, data, flags));
    }

    pub(crate) fn serialize(&self) -> Result<Vec<u8>, StoreError> {
        let total: usize = self.messages.iter().map(|(_, data, _)| 4 + data.len()).sum();
        let (flags, width) = match total {
            0..=0xFF => (0x00u8, 1u8),
            0x100..=0xFFFF => (0x01, 2),
            _ if u32::try_from(total).is_ok() => (0x02, 4),
            _ => (0x03, 8),
        };

        let mut buf = Vec::with_capacity(6 + usize::from(width) + total + 4);
        buf.extend_from_slice(&OHDR_SIGNATURE);
        buf.push(2);
        buf.push(flags);
        write_uint(&mut buf, total as u64, width);
        for (msg_type, data, msg_flags) in &self.messages {
            let size = u16::try_from(data.len()).map_err(|_| {
                StoreError::Unsupported(format!(
                    "{msg_type:?} message of {} bytes exceeds 65535",
                    data.len()
                ))
            })?;
            buf.push(msg_type.to_u16() as u8);
            buf.extend_from_slice(&size.to_le_bytes());
            buf.push(*msg_flags);
            buf.extend_from_slice(data);
        }
        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }
}
