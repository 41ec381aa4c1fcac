// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::DIGEST_LEN;
use core::fmt;

/// How the device acknowledges a received block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckMode {
    /// SHA-256 of the block, 32 bytes.
    Digest,
    /// The block bytes sent straight back.
    Echo,
}

/// Ways a received acknowledgement can disagree with the block that was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMismatch {
    Length { expected: usize, received: usize },
    Digest { expected: [u8; DIGEST_LEN], received: [u8; DIGEST_LEN] },
    /// First differing byte of an echoed block.
    Echo { offset: usize, sent: u8, received: u8 },
}

impl fmt::Display for AckMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckMismatch::Length { expected, received } => {
                write!(f, "acknowledgement length {received}, expected {expected}")
            }
            AckMismatch::Digest { expected, received } => {
                f.write_str("digest mismatch, expected ")?;
                write_hex(f, expected)?;
                f.write_str(" received ")?;
                write_hex(f, received)
            }
            AckMismatch::Echo { offset, sent, received } => {
                write!(f, "echo mismatch at offset {offset}: sent {sent:02x} received {received:02x}")
            }
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    bytes.iter().try_for_each(|b| write!(f, "{b:02x}"))
}

/// The output buffer cannot hold the acknowledgement, value is the length needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckBufferTooSmall(pub usize);

/// Calculates the SHA-256 of the given data
pub fn calculate_sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();

    let mut hash_bytes = [0u8; DIGEST_LEN];
    hash_bytes.copy_from_slice(&result[..DIGEST_LEN]);
    hash_bytes
}

/// Writes the acknowledgement the device returns for `block` into `out`.
///
/// Returns the number of bytes written.
pub fn write_acknowledgement(mode: AckMode, block: &[u8], out: &mut [u8]) -> Result<usize, AckBufferTooSmall> {
    let ack_len = match mode {
        AckMode::Digest => DIGEST_LEN,
        AckMode::Echo => block.len(),
    };
    if out.len() < ack_len {
        return Err(AckBufferTooSmall(ack_len));
    }

    match mode {
        AckMode::Digest => out[..DIGEST_LEN].copy_from_slice(&calculate_sha256(block)),
        AckMode::Echo => out[..ack_len].copy_from_slice(block),
    }
    Ok(ack_len)
}

/// Checks a complete acknowledgement against the block it answers.
///
/// # Errors
///
/// - `Length`: `received` is not exactly the acknowledgement length for `mode`
/// - `Digest`: the received digest differs from the SHA-256 of `block`
/// - `Echo`: the echoed bytes differ, reporting the first differing offset
pub fn verify_acknowledgement(mode: AckMode, block: &[u8], received: &[u8]) -> Result<(), AckMismatch> {
    match mode {
        AckMode::Digest => {
            if received.len() != DIGEST_LEN {
                return Err(AckMismatch::Length { expected: DIGEST_LEN, received: received.len() });
            }
            let expected = calculate_sha256(block);
            if expected[..] != received[..] {
                let mut received_digest = [0u8; DIGEST_LEN];
                received_digest.copy_from_slice(received);
                return Err(AckMismatch::Digest { expected, received: received_digest });
            }
            Ok(())
        }
        AckMode::Echo => {
            if received.len() != block.len() {
                return Err(AckMismatch::Length { expected: block.len(), received: received.len() });
            }
            match mismatched_offsets(block, received).next() {
                Some(offset) => Err(AckMismatch::Echo {
                    offset,
                    sent: block[offset],
                    received: received[offset],
                }),
                None => Ok(()),
            }
        }
    }
}

/// Every offset at which `sent` and `received` differ.
pub fn mismatched_offsets<'a>(sent: &'a [u8], received: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    sent.iter()
        .zip(received)
        .enumerate()
        .filter(|(_, (s, r))| s != r)
        .map(|(offset, _)| offset)
}
