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

use crate::error::UpdateError;
use picow_ota_protocol::uf2::Uf2BlockHeader;
use picow_ota_protocol::{ProtocolVariant, UF2_BLOCK_SIZE};
use std::fs;
use std::path::Path;

/// Firmware payload ready for transfer: the leading UF2 block removed and the
/// remainder zero padded to a whole number of transfer blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    payload: Vec<u8>,
    block_size: usize,
    unpadded_len: usize,
    header: Option<Uf2BlockHeader>,
}

impl FirmwareImage {
    /// Reads and prepares the image at `path`.
    pub fn load(path: impl AsRef<Path>, variant: ProtocolVariant) -> Result<Self, UpdateError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| UpdateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Read {} bytes from {}", bytes.len(), path.display());

        Ok(Self::from_bytes(bytes, variant))
    }

    /// Files no longer than the header yield an empty image with no blocks.
    pub fn from_bytes(mut bytes: Vec<u8>, variant: ProtocolVariant) -> Self {
        let header_len = bytes.len().min(UF2_BLOCK_SIZE);
        let header = match Uf2BlockHeader::parse(&bytes[..header_len]) {
            Ok(header) => {
                log::debug!(
                    "Header block: target {:#010x}, {} blocks, family {:?}",
                    header.target_addr,
                    header.num_blocks,
                    header.family_id()
                );
                Some(header)
            }
            Err(e) => {
                log::warn!("Leading block is not a UF2 block ({:?}), stripping it anyway", e);
                None
            }
        };

        let payload = bytes.split_off(header_len);
        if payload.is_empty() {
            log::warn!("No payload after the {} byte header, nothing to send", header_len);
        }
        let unpadded_len = payload.len();
        let mut image = Self { payload, block_size: 0, unpadded_len, header };
        image.pad_to(variant.block_size());
        image
    }

    /// Re-pads the payload for `variant`, leaving the image unchanged when the
    /// block size already matches.
    pub fn rechunk(mut self, variant: ProtocolVariant) -> Self {
        if self.block_size != variant.block_size() {
            log::debug!("Re-padding image from {} to {} byte blocks", self.block_size, variant.block_size());
            self.payload.truncate(self.unpadded_len);
            self.pad_to(variant.block_size());
        }
        self
    }

    fn pad_to(&mut self, block_size: usize) {
        self.block_size = block_size;
        self.payload.resize(self.unpadded_len.div_ceil(block_size) * block_size, 0);
        log::debug!(
            "Payload {} bytes, padded to {} ({} blocks of {})",
            self.unpadded_len,
            self.payload.len(),
            self.payload.len() / block_size,
            block_size
        );
    }

    /// The padded payload, a whole number of blocks long.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn unpadded_len(&self) -> usize {
        self.unpadded_len
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> u32 {
        (self.payload.len() / self.block_size) as u32
    }

    /// The stripped header block, when it parsed as UF2.
    pub fn header(&self) -> Option<&Uf2BlockHeader> {
        self.header.as_ref()
    }

    pub fn block(&self, index: u32) -> Option<Block<'_>> {
        let count = self.block_count();
        if index >= count {
            return None;
        }
        let start = index as usize * self.block_size;
        Some(Block {
            index,
            data: &self.payload[start..start + self.block_size],
            is_last: index == count - 1,
        })
    }

    pub fn blocks(&self) -> Blocks<'_> {
        self.blocks_from(0)
    }

    /// Blocks starting at `index`, for resuming a sequence part way through.
    pub fn blocks_from(&self, index: u32) -> Blocks<'_> {
        Blocks { image: self, next: index.min(self.block_count()) }
    }
}

/// One transfer unit of a [`FirmwareImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub index: u32,
    pub data: &'a [u8],
    pub is_last: bool,
}

#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    image: &'a FirmwareImage,
    next: u32,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.image.block(self.next)?;
        self.next += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.image.block_count().saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Blocks<'_> {}
