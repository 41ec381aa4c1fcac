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

use log::LevelFilter;
use picow_ota_host_core::ErrorKind;
use picow_ota_protocol::ProtocolVariant;

const SERIAL_PREFIX: &str = "serial:";

pub(crate) fn parse_log_level(level_str: &str) -> Result<LevelFilter, String> {
    match level_str.to_uppercase().as_str() {
        "OFF" => Ok(LevelFilter::Off),
        "ERROR" => Ok(LevelFilter::Error),
        "WARN" => Ok(LevelFilter::Warn),
        "INFO" => Ok(LevelFilter::Info),
        "DEBUG" => Ok(LevelFilter::Debug),
        "TRACE" => Ok(LevelFilter::Trace),
        _ => Err(format!("unknown log level: {level_str}")),
    }
}

pub(crate) fn parse_variant(variant_str: &str) -> Result<ProtocolVariant, String> {
    variant_str.parse().map_err(|e| format!("{e}"))
}

/// Where the device is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Tcp { host: String, port: u16 },
    Serial { port_name: String },
}

impl Target {
    pub(crate) fn parse(address: &str, port: u16) -> Self {
        match address.strip_prefix(SERIAL_PREFIX) {
            Some(port_name) => Target::Serial { port_name: port_name.to_string() },
            None => Target::Tcp { host: address.to_string(), port },
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Tcp { host, port } => write!(f, "{host}:{port}"),
            Target::Serial { port_name } => write!(f, "{SERIAL_PREFIX}{port_name}"),
        }
    }
}

/// Process exit status for each failure class, 2 is left to clap for usage errors.
pub(crate) fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Io => 3,
        ErrorKind::Connection => 4,
        ErrorKind::Transfer => 5,
        ErrorKind::Read => 6,
        ErrorKind::Integrity => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_are_case_insensitive() {
        assert_eq!(parse_log_level("debug"), Ok(LevelFilter::Debug));
        assert_eq!(parse_log_level("TRACE"), Ok(LevelFilter::Trace));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn serial_prefix_selects_serial_target() {
        assert_eq!(
            Target::parse("serial:/dev/ttyACM0", 4242),
            Target::Serial { port_name: "/dev/ttyACM0".into() }
        );
        let tcp = Target::parse("192.168.4.1", 4242);
        assert_eq!(tcp, Target::Tcp { host: "192.168.4.1".into(), port: 4242 });
        assert_eq!(tcp.to_string(), "192.168.4.1:4242");
    }

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let kinds = [
            ErrorKind::Io,
            ErrorKind::Connection,
            ErrorKind::Transfer,
            ErrorKind::Read,
            ErrorKind::Integrity,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|&k| exit_code(k)).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(codes.iter().all(|&c| c > 2));
    }

    #[test]
    fn variant_names_parse() {
        assert_eq!(parse_variant("digest2048"), Ok(ProtocolVariant::Digest2048));
        assert!(parse_variant("crc32").is_err());
    }
}
