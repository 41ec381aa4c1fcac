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

//! Error types for the updater

use picow_ota_protocol::AckMismatch;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the sans-IO session, raised without touching any stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("block {block}: wrote {written} of {expected} bytes")]
    ShortWrite { block: u32, written: usize, expected: usize },

    #[error("block {block} failed verification: {mismatch}")]
    Integrity { block: u32, mismatch: AckMismatch },

    #[error("block {block}: device sent {received} bytes, only {outstanding} acknowledgement bytes outstanding")]
    AckOverrun { block: u32, received: usize, outstanding: usize },

    #[error("block {block} written while its acknowledgement is still outstanding")]
    AckPending { block: u32 },

    #[error("data received while no acknowledgement was awaited")]
    UnexpectedData,

    #[error("session already ended")]
    SessionEnded,
}

/// Coarse classification used to pick diagnostics and exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Connection,
    Transfer,
    Read,
    Integrity,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to read firmware file {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to connect to {address}: {source}")]
    Connection { address: String, source: io::Error },

    #[error("failed to write block {block}: {source}")]
    Write { block: u32, source: io::Error },

    #[error("failed to read acknowledgement for block {block} after {received} of {expected} bytes: {source}")]
    ReadFailed { block: u32, received: usize, expected: usize, source: io::Error },

    #[error("connection closed during acknowledgement for block {block} after {received} of {expected} bytes")]
    ReadClosed { block: u32, received: usize, expected: usize },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl UpdateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::Io { .. } => ErrorKind::Io,
            UpdateError::Connection { .. } => ErrorKind::Connection,
            UpdateError::Write { .. } => ErrorKind::Transfer,
            UpdateError::ReadFailed { .. } | UpdateError::ReadClosed { .. } => ErrorKind::Read,
            UpdateError::Session(SessionError::Integrity { .. }) => ErrorKind::Integrity,
            UpdateError::Session(SessionError::AckOverrun { .. }) => ErrorKind::Read,
            UpdateError::Session(_) => ErrorKind::Transfer,
        }
    }

    /// Index of the block being transferred when the error occurred, if any.
    pub fn block(&self) -> Option<u32> {
        match self {
            UpdateError::Write { block, .. }
            | UpdateError::ReadFailed { block, .. }
            | UpdateError::ReadClosed { block, .. }
            | UpdateError::Session(SessionError::ShortWrite { block, .. })
            | UpdateError::Session(SessionError::Integrity { block, .. })
            | UpdateError::Session(SessionError::AckOverrun { block, .. })
            | UpdateError::Session(SessionError::AckPending { block }) => Some(*block),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_failure_class() {
        let integrity = UpdateError::from(SessionError::Integrity {
            block: 4,
            mismatch: AckMismatch::Echo { offset: 1, sent: 0, received: 1 },
        });
        assert_eq!(integrity.kind(), ErrorKind::Integrity);
        assert_eq!(integrity.block(), Some(4));

        let short = UpdateError::from(SessionError::ShortWrite { block: 2, written: 100, expected: 512 });
        assert_eq!(short.kind(), ErrorKind::Transfer);

        let closed = UpdateError::ReadClosed { block: 0, received: 10, expected: 32 };
        assert_eq!(closed.kind(), ErrorKind::Read);
        assert_eq!(
            closed.to_string(),
            "connection closed during acknowledgement for block 0 after 10 of 32 bytes"
        );

        let connect = UpdateError::Connection {
            address: "10.0.0.2:4242".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(connect.kind(), ErrorKind::Connection);
        assert_eq!(connect.block(), None);
    }
}
