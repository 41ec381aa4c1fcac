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

use crate::ack::AckMode;
use crate::DIGEST_LEN;
use core::fmt;
use core::str::FromStr;

/// Block size and acknowledgement scheme agreed with the device server.
///
/// Both sides must be built for the same variant, nothing on the wire identifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVariant {
    /// 512 byte blocks, the device echoes each block back.
    #[default]
    Echo512,
    /// 512 byte blocks, the device returns the SHA-256 of each block.
    Digest512,
    /// 2048 byte blocks, the device echoes each block back.
    Echo2048,
    /// 2048 byte blocks, the device returns the SHA-256 of each block.
    Digest2048,
}

impl ProtocolVariant {
    pub const ALL: [ProtocolVariant; 4] = [
        ProtocolVariant::Echo512,
        ProtocolVariant::Digest512,
        ProtocolVariant::Echo2048,
        ProtocolVariant::Digest2048,
    ];

    pub const fn block_size(self) -> usize {
        match self {
            ProtocolVariant::Echo512 | ProtocolVariant::Digest512 => 512,
            ProtocolVariant::Echo2048 | ProtocolVariant::Digest2048 => 2048,
        }
    }

    pub const fn ack_mode(self) -> AckMode {
        match self {
            ProtocolVariant::Echo512 | ProtocolVariant::Echo2048 => AckMode::Echo,
            ProtocolVariant::Digest512 | ProtocolVariant::Digest2048 => AckMode::Digest,
        }
    }

    /// Number of bytes the device sends back per acknowledged block.
    pub const fn ack_len(self) -> usize {
        match self.ack_mode() {
            AckMode::Digest => DIGEST_LEN,
            AckMode::Echo => self.block_size(),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ProtocolVariant::Echo512 => "echo512",
            ProtocolVariant::Digest512 => "digest512",
            ProtocolVariant::Echo2048 => "echo2048",
            ProtocolVariant::Digest2048 => "digest2048",
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant;

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown protocol variant, expected one of echo512, digest512, echo2048, digest2048")
    }
}

impl FromStr for ProtocolVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProtocolVariant::ALL
            .into_iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(UnknownVariant)
    }
}
