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

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::LevelFilter;
use picow_ota_host_core::{Progress, ProgressObserver};

/// Block count progress bar on stderr
pub(crate) struct BlockProgressBar {
    bar: ProgressBar,
    visible: bool,
}

impl BlockProgressBar {
    pub(crate) fn new(visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar, visible }
    }

    /// Shown at INFO and more verbose levels, hidden when logging is quieter.
    pub(crate) fn for_log_level(level: LevelFilter) -> Self {
        Self::new(level >= LevelFilter::Info)
    }
}

impl ProgressObserver for BlockProgressBar {
    fn transfer_started(&mut self, total_blocks: u32) {
        self.bar.set_length(total_blocks as u64);
        if self.visible {
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
        }
    }

    fn block_completed(&mut self, progress: Progress) {
        log::trace!("Block {} of {} done", progress.blocks_done, progress.total_blocks);
        self.bar.set_position(progress.blocks_done as u64);
    }

    fn transfer_finished(&mut self, progress: Progress) {
        self.bar.finish_and_clear();
        log::info!("Sent {} of {} blocks", progress.blocks_done, progress.total_blocks);
    }
}

impl Drop for BlockProgressBar {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}
