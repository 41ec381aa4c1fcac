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

use crate::Progress;
use crate::error::SessionError;
use crate::image::{Block, FirmwareImage};
use circular_buffer::CircularBuffer;
use picow_ota_protocol::ack::mismatched_offsets;
use picow_ota_protocol::{AckMismatch, MAX_BLOCK_SIZE, ProtocolVariant, verify_acknowledgement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferConfig {
    pub variant: ProtocolVariant,
    /// Wait for an acknowledgement of the final block as well.
    pub ack_final_block: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Sending(u32),
    AwaitingAck(u32),
    Closed,
}

/// Updater side of one transfer, independent of how bytes move.
///
/// The caller writes the block from [`UpdaterSession::block_to_send`], reports how much of it
/// went out with [`UpdaterSession::block_written`], then feeds whatever the device returns
/// into [`UpdaterSession::handle_incoming`] until no acknowledgement bytes are outstanding.
pub struct UpdaterSession {
    image: FirmwareImage,
    config: TransferConfig,
    state: SessionState,
    rx_buffer: CircularBuffer<MAX_BLOCK_SIZE, u8>,
    progress: Progress,
    acks_verified: u32,
}

impl UpdaterSession {
    pub fn new(image: FirmwareImage, config: TransferConfig) -> Self {
        let image = image.rechunk(config.variant);
        let total_blocks = image.block_count();
        let state = if total_blocks == 0 {
            SessionState::Closed
        } else {
            SessionState::Sending(0)
        };
        Self {
            image,
            config,
            state,
            rx_buffer: CircularBuffer::new(),
            progress: Progress { total_blocks, blocks_done: 0 },
            acks_verified: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> TransferConfig {
        self.config
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn acks_verified(&self) -> u32 {
        self.acks_verified
    }

    pub fn is_session_ended(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn block_to_send(&self) -> Option<Block<'_>> {
        match self.state {
            SessionState::Sending(index) => self.image.block(index),
            _ => None,
        }
    }

    /// Records that `written` bytes of the current block went out.
    ///
    /// Anything short of the full block ends the session, partial blocks are never resent.
    pub fn block_written(&mut self, written: usize) -> Result<(), SessionError> {
        let index = match self.state {
            SessionState::Sending(index) => index,
            SessionState::AwaitingAck(block) => return Err(SessionError::AckPending { block }),
            SessionState::Closed => return Err(SessionError::SessionEnded),
        };
        let Some(block) = self.image.block(index) else {
            self.state = SessionState::Closed;
            return Err(SessionError::SessionEnded);
        };

        let expected = block.data.len();
        if written != expected {
            log::trace!("Block {} short write, {} of {} bytes", index, written, expected);
            self.close();
            return Err(SessionError::ShortWrite { block: index, written, expected });
        }

        if block.is_last && !self.config.ack_final_block {
            log::trace!("Final block {} written, no acknowledgement expected", index);
            self.complete_block(index, true);
        } else {
            log::trace!("Block {} written, waiting for {} acknowledgement bytes", index, self.config.variant.ack_len());
            self.state = SessionState::AwaitingAck(index);
        }
        Ok(())
    }

    /// Acknowledgement bytes still needed before the next block can go out.
    pub fn ack_bytes_outstanding(&self) -> usize {
        match self.state {
            SessionState::AwaitingAck(_) => self.config.variant.ack_len() - self.rx_buffer.len(),
            _ => 0,
        }
    }

    /// Accumulates bytes received from the device, verifying the acknowledgement once complete.
    pub fn handle_incoming(&mut self, incoming_bytes: &[u8]) -> Result<(), SessionError> {
        if incoming_bytes.is_empty() {
            return Ok(());
        }
        let index = match self.state {
            SessionState::AwaitingAck(index) => index,
            SessionState::Sending(_) => return Err(SessionError::UnexpectedData),
            SessionState::Closed => return Err(SessionError::SessionEnded),
        };

        let outstanding = self.ack_bytes_outstanding();
        if incoming_bytes.len() > outstanding {
            self.close();
            return Err(SessionError::AckOverrun {
                block: index,
                received: incoming_bytes.len(),
                outstanding,
            });
        }

        self.rx_buffer.extend_from_slice(incoming_bytes);
        let ack_len = self.config.variant.ack_len();
        log::trace!("Block {} has {} of {} acknowledgement bytes", index, self.rx_buffer.len(), ack_len);
        if self.rx_buffer.len() < ack_len {
            return Ok(());
        }

        let received = self.rx_buffer.make_contiguous();
        let Some(block) = self.image.block(index) else {
            self.state = SessionState::Closed;
            return Err(SessionError::SessionEnded);
        };

        if let Err(mismatch) = verify_acknowledgement(self.config.variant.ack_mode(), block.data, received) {
            log::error!("Block {} acknowledgement mismatch: {}", index, mismatch);
            if let AckMismatch::Echo { .. } = mismatch {
                for offset in mismatched_offsets(block.data, received) {
                    log::error!("  offset {:4}: sent {:02x} recv {:02x}", offset, block.data[offset], received[offset]);
                }
            }
            self.close();
            return Err(SessionError::Integrity { block: index, mismatch });
        }

        let is_last = block.is_last;
        self.rx_buffer.clear();
        self.acks_verified += 1;
        log::trace!("Block {} acknowledged", index);
        self.complete_block(index, is_last);
        Ok(())
    }

    pub fn close(&mut self) {
        self.rx_buffer.clear();
        self.state = SessionState::Closed;
    }

    fn complete_block(&mut self, index: u32, is_last: bool) {
        self.progress.blocks_done = index + 1;
        self.state = if is_last {
            SessionState::Closed
        } else {
            SessionState::Sending(index + 1)
        };
    }
}
