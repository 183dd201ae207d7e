//! Recording frame format: a length-prefixed stream of timestamped
//! terminal/desktop/database events, grouped into parts by
//! [`crate::part::PartWriter`].

use meridian_core::{ErrorKind, MeridianError};

pub const MAGIC: &[u8; 8] = b"MERIDIAN";
pub const FORMAT_VERSION: u16 = 1;
pub const FLAG_ENCRYPTED: u16 = 0b01;
pub const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Print,
    Resize,
    Input,
    DesktopPng,
    DbQuery,
}

impl FrameKind {
    fn to_u8(self) -> u8 {
        match self {
            FrameKind::Print => 0,
            FrameKind::Resize => 1,
            FrameKind::Input => 2,
            FrameKind::DesktopPng => 3,
            FrameKind::DbQuery => 4,
        }
    }

    fn from_u8(b: u8) -> Result<Self, MeridianError> {
        match b {
            0 => Ok(FrameKind::Print),
            1 => Ok(FrameKind::Resize),
            2 => Ok(FrameKind::Input),
            3 => Ok(FrameKind::DesktopPng),
            4 => Ok(FrameKind::DbQuery),
            _ => Err(unknown_kind(b)),
        }
    }
}

fn unknown_kind(b: u8) -> MeridianError {
    MeridianError::new(ErrorKind::InvalidArgument, format!("unknown recording frame kind byte {b}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub ts_ns: u64,
    pub kind: FrameKind,
    pub data: Vec<u8>,
}

/// Encodes a sequence of frames as the plaintext body of a part: just
/// the repeating `{len, ts, kind, data}` records, no magic/version
/// header (that belongs to the part, not the frame stream).
pub fn encode_frames(frames: &[Frame]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        out.extend_from_slice(&(frame.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&frame.ts_ns.to_be_bytes());
        out.push(frame.kind.to_u8());
        out.extend_from_slice(&frame.data);
    }
    out
}

pub fn decode_frames(mut body: &[u8]) -> Result<Vec<Frame>, MeridianError> {
    let mut frames = Vec::new();
    while !body.is_empty() {
        if body.len() < 4 + 8 + 1 {
            return Err(MeridianError::new(ErrorKind::InvalidArgument, "truncated recording frame header"));
        }
        let len = u32::from_be_bytes(body[0..4].try_into().unwrap()) as usize;
        let ts_ns = u64::from_be_bytes(body[4..12].try_into().unwrap());
        let kind = FrameKind::from_u8(body[12])?;
        body = &body[13..];
        if body.len() < len {
            return Err(MeridianError::new(ErrorKind::InvalidArgument, "truncated recording frame payload"));
        }
        let data = body[..len].to_vec();
        body = &body[len..];
        frames.push(Frame { ts_ns, kind, data });
    }
    Ok(frames)
}
