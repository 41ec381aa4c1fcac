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

pub mod emulator;
pub mod error;
pub mod image;
pub mod session;
pub mod transfer;

pub use error::{ErrorKind, SessionError, UpdateError};
pub use image::{Block, Blocks, FirmwareImage};
pub use picow_ota_protocol::{DEFAULT_PORT, ProtocolVariant};
pub use session::{SessionState, TransferConfig, UpdaterSession};
pub use transfer::{TransferSession, TransferSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total_blocks: u32,
    pub blocks_done: u32,
}

/// Receives progress as blocks complete. Purely informational, it cannot stop a transfer.
pub trait ProgressObserver {
    fn transfer_started(&mut self, _total_blocks: u32) {}

    fn block_completed(&mut self, progress: Progress);

    fn transfer_finished(&mut self, _progress: Progress) {}
}

/// Observer that ignores all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn block_completed(&mut self, _progress: Progress) {}
}

impl<P: ProgressObserver + ?Sized> ProgressObserver for &mut P {
    fn transfer_started(&mut self, total_blocks: u32) {
        (**self).transfer_started(total_blocks)
    }

    fn block_completed(&mut self, progress: Progress) {
        (**self).block_completed(progress)
    }

    fn transfer_finished(&mut self, progress: Progress) {
        (**self).transfer_finished(progress)
    }
}
