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

use crate::error::{SessionError, UpdateError};
use crate::image::FirmwareImage;
use crate::session::{SessionState, TransferConfig, UpdaterSession};
use crate::{NoProgress, ProgressObserver};
use picow_ota_protocol::MAX_BLOCK_SIZE;
use std::io::{ErrorKind as IoErrorKind, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub blocks_sent: u32,
    pub acks_verified: u32,
    pub bytes_sent: usize,
}

/// One upload over an open connection. The session owns the stream for its whole life.
pub struct TransferSession<S, P = NoProgress> {
    stream: S,
    session: UpdaterSession,
    observer: P,
    blocks_sent: u32,
    bytes_sent: usize,
}

impl<S: Read + Write> TransferSession<S> {
    pub fn new(stream: S, image: FirmwareImage, config: TransferConfig) -> Self {
        Self {
            stream,
            session: UpdaterSession::new(image, config),
            observer: NoProgress,
            blocks_sent: 0,
            bytes_sent: 0,
        }
    }
}

impl<S: Read + Write, P: ProgressObserver> TransferSession<S, P> {
    pub fn with_observer<Q: ProgressObserver>(self, observer: Q) -> TransferSession<S, Q> {
        TransferSession {
            stream: self.stream,
            session: self.session,
            observer,
            blocks_sent: self.blocks_sent,
            bytes_sent: self.bytes_sent,
        }
    }

    pub fn session(&self) -> &UpdaterSession {
        &self.session
    }

    /// Sends every block, verifying acknowledgements as they arrive.
    ///
    /// The stream is dropped before this returns, on success and on every error.
    pub fn run(mut self) -> Result<TransferSummary, UpdateError> {
        let result = self.transfer_all();
        self.session.close();

        let TransferSession { stream, .. } = self;
        drop(stream);
        log::debug!("Connection closed");

        result
    }

    fn transfer_all(&mut self) -> Result<TransferSummary, UpdateError> {
        let config = self.session.config();
        let total_blocks = self.session.progress().total_blocks;
        log::info!(
            "Sending {} blocks of {} bytes ({})",
            total_blocks,
            config.variant.block_size(),
            config.variant
        );
        self.observer.transfer_started(total_blocks);

        loop {
            match self.session.state() {
                SessionState::Sending(index) => self.send_block(index)?,
                SessionState::AwaitingAck(index) => self.receive_acknowledgement(index)?,
                SessionState::Closed => break,
            }
        }

        let progress = self.session.progress();
        self.observer.transfer_finished(progress);
        Ok(TransferSummary {
            blocks_sent: self.blocks_sent,
            acks_verified: self.session.acks_verified(),
            bytes_sent: self.bytes_sent,
        })
    }

    fn send_block(&mut self, index: u32) -> Result<(), UpdateError> {
        let Some(block) = self.session.block_to_send() else {
            return Err(SessionError::SessionEnded.into());
        };

        let written = loop {
            match self.stream.write(block.data) {
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                other => break other,
            }
        }
        .map_err(|source| UpdateError::Write { block: index, source })?;

        self.session.block_written(written)?;
        self.stream
            .flush()
            .map_err(|source| UpdateError::Write { block: index, source })?;
        self.blocks_sent += 1;
        self.bytes_sent += written;

        if !matches!(self.session.state(), SessionState::AwaitingAck(_)) {
            self.observer.block_completed(self.session.progress());
        }
        Ok(())
    }

    fn receive_acknowledgement(&mut self, index: u32) -> Result<(), UpdateError> {
        let expected = self.session.config().variant.ack_len();
        let mut chunk = [0u8; MAX_BLOCK_SIZE];

        // A read can return any part of the acknowledgement, keep going until all of it is in
        loop {
            let outstanding = self.session.ack_bytes_outstanding();
            if outstanding == 0 {
                break;
            }
            let received = expected - outstanding;

            match self.stream.read(&mut chunk[..outstanding]) {
                Ok(0) => return Err(UpdateError::ReadClosed { block: index, received, expected }),
                Ok(n) => self.session.handle_incoming(&chunk[..n])?,
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(UpdateError::ReadFailed { block: index, received, expected, source });
                }
            }
        }

        self.observer.block_completed(self.session.progress());
        Ok(())
    }
}
