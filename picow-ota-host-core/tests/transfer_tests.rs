use picow_ota_host_core::emulator::{DeviceEmulator, DeviceReport, Fault};
use picow_ota_host_core::{
    ErrorKind, FirmwareImage, ProtocolVariant, TransferConfig, TransferSession, TransferSummary, UpdateError,
};
use picow_ota_protocol::UF2_BLOCK_SIZE;
use std::fs;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use tempfile::TempDir;

fn write_image(dir: &TempDir, payload_len: usize) -> PathBuf {
    let path = dir.path().join("update.uf2");
    let mut bytes = vec![0x55u8; UF2_BLOCK_SIZE];
    bytes.extend((0..payload_len).map(|i| (i * 7 + i / 512) as u8));
    fs::write(&path, bytes).unwrap();
    path
}

/// Runs `device` on a loopback listener and uploads `image` to it
fn upload(
    image: FirmwareImage,
    config: TransferConfig,
    device: DeviceEmulator,
) -> (Result<TransferSummary, UpdateError>, DeviceReport) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        device.serve(stream).unwrap()
    });

    let stream = TcpStream::connect(address).unwrap();
    let result = TransferSession::new(stream, image, config).run();
    let report = server.join().unwrap();
    (result, report)
}

#[test]
fn test_three_blocks_upload_with_echo() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 3 * 512);
    let variant = ProtocolVariant::Echo512;
    let image = FirmwareImage::load(&path, variant).unwrap();
    let payload = image.payload().to_vec();

    let config = TransferConfig { variant, ack_final_block: false };
    let (result, report) = upload(image, config, DeviceEmulator::new(variant, 3));

    let summary = result.unwrap();
    assert_eq!(summary, TransferSummary { blocks_sent: 3, acks_verified: 2, bytes_sent: 1536 });
    assert_eq!(report.blocks.len(), 3);
    assert_eq!(report.acks_sent, 2);
    assert_eq!(report.received_bytes(), payload);
}

#[test]
fn test_three_blocks_upload_with_digest() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 3 * 512);
    let variant = ProtocolVariant::Digest512;
    let image = FirmwareImage::load(&path, variant).unwrap();

    let config = TransferConfig { variant, ack_final_block: false };
    let (result, report) = upload(image, config, DeviceEmulator::new(variant, 3));

    assert_eq!(result.unwrap().acks_verified, 2);
    assert_eq!(report.acks_sent, 2);
}

#[test]
fn test_padded_digest2048_upload() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 5 * 512);
    let variant = ProtocolVariant::Digest2048;
    let image = FirmwareImage::load(&path, variant).unwrap();
    assert_eq!(image.block_count(), 2);

    let config = TransferConfig { variant, ack_final_block: false };
    let (result, report) = upload(image, config, DeviceEmulator::new(variant, 2));

    assert_eq!(result.unwrap().bytes_sent, 4096);
    let received = report.received_bytes();
    assert!(received[5 * 512..].iter().all(|&b| b == 0));
}

#[test]
fn test_final_block_acknowledged_when_both_sides_agree() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 2 * 2048);
    let variant = ProtocolVariant::Echo2048;
    let image = FirmwareImage::load(&path, variant).unwrap();

    let config = TransferConfig { variant, ack_final_block: true };
    let device = DeviceEmulator::new(variant, 2).ack_final_block(true);
    let (result, report) = upload(image, config, device);

    assert_eq!(result.unwrap().acks_verified, 2);
    assert_eq!(report.acks_sent, 2);
}

#[test]
fn test_fragmented_acknowledgements() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 4 * 512);
    let variant = ProtocolVariant::Digest512;
    let image = FirmwareImage::load(&path, variant).unwrap();

    let config = TransferConfig { variant, ack_final_block: false };
    let device = DeviceEmulator::new(variant, 4).fault(Fault::FragmentAcks { piece_len: 3 });
    let (result, _) = upload(image, config, device);

    assert_eq!(result.unwrap().acks_verified, 3);
}

#[test]
fn test_device_hangs_up_mid_digest() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 3 * 512);
    let variant = ProtocolVariant::Digest512;
    let image = FirmwareImage::load(&path, variant).unwrap();

    let config = TransferConfig { variant, ack_final_block: false };
    let device = DeviceEmulator::new(variant, 3).fault(Fault::CloseDuringAck { block: 0, after_bytes: 10 });
    let (result, report) = upload(image, config, device);

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Read);
    assert_eq!(err.block(), Some(0));
    assert!(matches!(err, UpdateError::ReadClosed { received: 10, expected: 32, .. }));
    assert_eq!(report.blocks.len(), 1);
}

#[test]
fn test_corrupted_echo_stops_transfer() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 4 * 512);
    let variant = ProtocolVariant::Echo512;
    let image = FirmwareImage::load(&path, variant).unwrap();

    let config = TransferConfig { variant, ack_final_block: false };
    let device = DeviceEmulator::new(variant, 4).fault(Fault::CorruptAck { block: 1 });
    let (result, report) = upload(image, config, device);

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(err.block(), Some(1));
    assert_eq!(report.blocks.len(), 2);
}

#[test]
fn test_header_only_file_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 0);
    let variant = ProtocolVariant::Echo512;
    let image = FirmwareImage::load(&path, variant).unwrap();
    assert_eq!(image.block_count(), 0);

    let config = TransferConfig { variant, ack_final_block: false };
    let (result, report) = upload(image, config, DeviceEmulator::new(variant, 0));

    let summary = result.unwrap();
    assert_eq!(summary.blocks_sent, 0);
    assert_eq!(summary.bytes_sent, 0);
    assert!(report.blocks.is_empty());
    assert_eq!(report.acks_sent, 0);
}

#[test]
fn test_short_file_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.uf2");
    fs::write(&path, vec![0xAAu8; 100]).unwrap();

    let image = FirmwareImage::load(&path, ProtocolVariant::Digest2048).unwrap();
    assert_eq!(image.block_count(), 0);
    assert!(image.header().is_none());
}

#[test]
fn test_image_block_size_follows_session_variant() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, 3 * 512);
    let image = FirmwareImage::load(&path, ProtocolVariant::Echo512).unwrap();

    let variant = ProtocolVariant::Echo2048;
    let config = TransferConfig { variant, ack_final_block: true };
    let device = DeviceEmulator::new(variant, 1).ack_final_block(true);
    let (result, report) = upload(image, config, device);

    let summary = result.unwrap();
    assert_eq!(summary.blocks_sent, 1);
    assert_eq!(summary.acks_verified, 1);
    assert_eq!(summary.bytes_sent, 2048);
    assert_eq!(report.blocks[0].len(), 2048);
    assert!(report.blocks[0][3 * 512..].iter().all(|&b| b == 0));
}
