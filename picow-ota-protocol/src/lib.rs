#![no_std]
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

pub mod ack;
pub mod uf2;
pub mod variant;

pub use ack::{AckMismatch, AckMode, calculate_sha256, verify_acknowledgement, write_acknowledgement};
pub use variant::{ProtocolVariant, UnknownVariant};

/// TCP port the device-side OTA server listens on.
pub const DEFAULT_PORT: u16 = 4242;

/// Size of one UF2 block. The leading block of an update image is stripped before transfer.
pub const UF2_BLOCK_SIZE: usize = 512;

/// Length of a SHA-256 acknowledgement.
pub const DIGEST_LEN: usize = 32;

/// Largest block any variant transfers, and so the largest acknowledgement.
pub const MAX_BLOCK_SIZE: usize = 2048;
