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

use crate::UF2_BLOCK_SIZE;

pub const UF2_MAGIC_START0: u32 = 0x0A32_4655;
pub const UF2_MAGIC_START1: u32 = 0x9E5D_5157;
pub const UF2_MAGIC_END: u32 = 0x0AB1_6F30;

pub const UF2_FLAG_NOT_MAIN_FLASH: u32 = 0x0000_0001;
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x0000_2000;

const MAGIC_END_OFFSET: usize = UF2_BLOCK_SIZE - 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uf2Error {
    /// Fewer than 512 bytes available
    TooShort(usize),
    BadMagic,
}

/// Header fields of a single 512 byte UF2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uf2BlockHeader {
    pub flags: u32,
    pub target_addr: u32,
    pub payload_size: u32,
    pub block_no: u32,
    pub num_blocks: u32,
    /// File size, or the family id when `UF2_FLAG_FAMILY_ID_PRESENT` is set
    pub file_size: u32,
}

impl Uf2BlockHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, Uf2Error> {
        if bytes.len() < UF2_BLOCK_SIZE {
            return Err(Uf2Error::TooShort(bytes.len()));
        }

        let word = |index: usize| {
            let offset = index * 4;
            u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
        };

        let magic_end = u32::from_le_bytes([
            bytes[MAGIC_END_OFFSET],
            bytes[MAGIC_END_OFFSET + 1],
            bytes[MAGIC_END_OFFSET + 2],
            bytes[MAGIC_END_OFFSET + 3],
        ]);
        if word(0) != UF2_MAGIC_START0 || word(1) != UF2_MAGIC_START1 || magic_end != UF2_MAGIC_END {
            return Err(Uf2Error::BadMagic);
        }

        Ok(Self {
            flags: word(2),
            target_addr: word(3),
            payload_size: word(4),
            block_no: word(5),
            num_blocks: word(6),
            file_size: word(7),
        })
    }

    pub fn family_id(&self) -> Option<u32> {
        (self.flags & UF2_FLAG_FAMILY_ID_PRESENT != 0).then_some(self.file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(fields: [u32; 8]) -> [u8; UF2_BLOCK_SIZE] {
        let mut block = [0u8; UF2_BLOCK_SIZE];
        for (i, field) in fields.iter().enumerate() {
            block[i * 4..i * 4 + 4].copy_from_slice(&field.to_le_bytes());
        }
        block[MAGIC_END_OFFSET..].copy_from_slice(&UF2_MAGIC_END.to_le_bytes());
        block
    }

    #[test]
    fn parses_rp2350_absolute_block() {
        let raw = block([
            UF2_MAGIC_START0,
            UF2_MAGIC_START1,
            UF2_FLAG_FAMILY_ID_PRESENT,
            0x1000_FF00,
            256,
            0,
            2,
            0xE48B_FF57,
        ]);
        let header = Uf2BlockHeader::parse(&raw).unwrap();
        assert_eq!(header.target_addr, 0x1000_FF00);
        assert_eq!(header.num_blocks, 2);
        assert_eq!(header.family_id(), Some(0xE48B_FF57));
    }

    #[test]
    fn family_id_absent_without_flag() {
        let raw = block([UF2_MAGIC_START0, UF2_MAGIC_START1, 0, 0x1000_0000, 256, 3, 8, 4096]);
        let header = Uf2BlockHeader::parse(&raw).unwrap();
        assert_eq!(header.block_no, 3);
        assert_eq!(header.family_id(), None);
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let mut raw = block([UF2_MAGIC_START0, UF2_MAGIC_START1, 0, 0, 256, 0, 1, 0]);
        raw[MAGIC_END_OFFSET] ^= 0xFF;
        assert_eq!(Uf2BlockHeader::parse(&raw), Err(Uf2Error::BadMagic));
        assert_eq!(Uf2BlockHeader::parse(&[0u8; 100]), Err(Uf2Error::TooShort(100)));
    }
}
