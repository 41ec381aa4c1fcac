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

mod progress;
mod transport;
mod util;

use clap::Parser;
use log::LevelFilter;
use picow_ota_host_core::{
    DEFAULT_PORT, FirmwareImage, ProtocolVariant, TransferConfig, TransferSession, TransferSummary, UpdateError,
};
use progress::BlockProgressBar;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use util::Target;

/// Uploads a UF2 firmware image to a Pico W OTA server
#[derive(Parser, Debug)]
#[command(name = "picow-ota-loader", version)]
struct Cli {
    /// Device IP address or host name, or serial:<PORT> for a serial link
    server_address: String,

    /// UF2 file for the update
    firmware: PathBuf,

    /// Block size and acknowledgement scheme, must match the device server
    #[arg(long, default_value = "echo512", value_parser = util::parse_variant)]
    variant: ProtocolVariant,

    /// TCP port of the device server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Wait for the device to acknowledge the final block too
    #[arg(long)]
    ack_final_block: bool,

    /// Read, write and connect timeout in seconds, waits forever on TCP when unset
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Baud rate for serial:<PORT> targets
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// OFF, ERROR, WARN, INFO, DEBUG or TRACE
    #[arg(long, default_value = "info", value_parser = util::parse_log_level)]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Pico W OTA Loader");

    match run(&cli) {
        Ok(summary) => {
            log::debug!("{:?}", summary);
            println!("upload completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            if let Some(block) = e.block() {
                log::error!("Upload aborted at block {}", block);
            }
            ExitCode::from(util::exit_code(e.kind()))
        }
    }
}

fn run(cli: &Cli) -> Result<TransferSummary, UpdateError> {
    let image = FirmwareImage::load(&cli.firmware, cli.variant)?;
    log::info!(
        "Firmware {}: {} payload bytes, {} blocks of {}",
        cli.firmware.display(),
        image.unpadded_len(),
        image.block_count(),
        image.block_size()
    );

    let config = TransferConfig {
        variant: cli.variant,
        ack_final_block: cli.ack_final_block,
    };
    let timeout = cli.timeout.map(Duration::from_secs);
    let target = Target::parse(&cli.server_address, cli.port);
    log::info!("Connecting to: {}", target);
    let connection = transport::connect(&target, timeout, cli.baud)?;

    let progress_bar = BlockProgressBar::for_log_level(cli.log_level);
    TransferSession::new(connection, image, config)
        .with_observer(progress_bar)
        .run()
}
