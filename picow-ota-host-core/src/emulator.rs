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

//! Device side of the transfer, for exercising the updater without hardware.

use picow_ota_protocol::{MAX_BLOCK_SIZE, ProtocolVariant, write_acknowledgement};
use std::io::{self, ErrorKind, Read, Write};

/// Misbehaviour to inject into an otherwise correct device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Flip a bit in the acknowledgement of `block`.
    CorruptAck { block: u32 },
    /// Send only `after_bytes` of the acknowledgement of `block`, then hang up.
    CloseDuringAck { block: u32, after_bytes: usize },
    /// Write every acknowledgement in pieces of `piece_len` bytes, flushing each.
    FragmentAcks { piece_len: usize },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub blocks: Vec<Vec<u8>>,
    pub acks_sent: u32,
}

impl DeviceReport {
    /// All received blocks joined in arrival order.
    pub fn received_bytes(&self) -> Vec<u8> {
        self.blocks.concat()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceEmulator {
    variant: ProtocolVariant,
    expected_blocks: u32,
    ack_final_block: bool,
    fault: Fault,
}

impl DeviceEmulator {
    /// Device expecting `expected_blocks` blocks, as the real server learns from the UF2 block count.
    pub fn new(variant: ProtocolVariant, expected_blocks: u32) -> Self {
        Self {
            variant,
            expected_blocks,
            ack_final_block: false,
            fault: Fault::None,
        }
    }

    pub fn ack_final_block(mut self, ack_final_block: bool) -> Self {
        self.ack_final_block = ack_final_block;
        self
    }

    pub fn fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    /// Serves one updater connection until all blocks arrive, the peer hangs up or a fault ends it.
    pub fn serve<S: Read + Write>(&self, mut stream: S) -> io::Result<DeviceReport> {
        let mut report = DeviceReport::default();
        let mut block = vec![0u8; self.variant.block_size()];
        let mut ack = [0u8; MAX_BLOCK_SIZE];

        for index in 0..self.expected_blocks {
            match stream.read_exact(&mut block) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    log::debug!("Updater hung up before block {}", index);
                    break;
                }
                Err(e) => return Err(e),
            }
            report.blocks.push(block.clone());

            let is_last = index + 1 == self.expected_blocks;
            if is_last && !self.ack_final_block {
                break;
            }

            let ack_len = write_acknowledgement(self.variant.ack_mode(), &block, &mut ack)
                .map_err(|e| io::Error::new(ErrorKind::InvalidInput, format!("ack needs {} bytes", e.0)))?;

            match self.fault {
                Fault::CorruptAck { block: target } if target == index => {
                    ack[0] ^= 0x01;
                    stream.write_all(&ack[..ack_len])?;
                }
                Fault::CloseDuringAck { block: target, after_bytes } if target == index => {
                    stream.write_all(&ack[..after_bytes.min(ack_len)])?;
                    stream.flush()?;
                    log::debug!("Closing after {} acknowledgement bytes of block {}", after_bytes, index);
                    return Ok(report);
                }
                Fault::FragmentAcks { piece_len } => {
                    for piece in ack[..ack_len].chunks(piece_len.max(1)) {
                        stream.write_all(piece)?;
                        stream.flush()?;
                    }
                }
                _ => stream.write_all(&ack[..ack_len])?,
            }
            stream.flush()?;
            report.acks_sent += 1;
        }

        Ok(report)
    }
}
