//! Checksum and string helpers shared by the receive path and the response
//! builder. Both directions must agree on byte order and summation, so they
//! all funnel through [calculate_checksum].

use crate::consts::{RDM_CHECKSUM_LENGTH, RDM_HEADER_SIZE, RDM_MIN_PACKAGE_SIZE};
use crate::layouts::rdm_message_layout;

#[inline]
pub(crate) fn calculate_checksum(data: &[u8]) -> u16 {
    let mut checksum = 0u16;

    for byte in data {
        checksum = checksum.wrapping_add(*byte as u16);
    }

    checksum
}

/// Sums the header and parameter data of the frame, writes the big-endian
/// checksum directly after the parameter data and returns the total frame
/// length. The parameter-data length is taken from the header, so the header
/// must be fully assembled first. Call exactly once per frame, last.
pub fn append_checksum(frame: &mut [u8]) -> usize {
    let parameter_data_length =
        rdm_message_layout::View::new(&frame[..]).parameter_data_length().read() as usize;
    let data_length = RDM_HEADER_SIZE + parameter_data_length;
    assert!(frame.len() >= data_length + RDM_CHECKSUM_LENGTH);

    let checksum = calculate_checksum(&frame[..data_length]);
    frame[data_length..data_length + RDM_CHECKSUM_LENGTH]
        .copy_from_slice(&checksum.to_be_bytes());

    data_length + RDM_CHECKSUM_LENGTH
}

/// Recomputes the checksum over everything but the trailing two bytes and
/// compares it with them. Frames shorter than the minimum valid frame always
/// fail.
pub fn verify_checksum(frame: &[u8]) -> bool {
    if frame.len() < RDM_MIN_PACKAGE_SIZE {
        return false;
    }

    let data_length = frame.len() - RDM_CHECKSUM_LENGTH;
    let expected_checksum = calculate_checksum(&frame[..data_length]);
    let actual_checksum = u16::from_be_bytes(frame[data_length..].try_into().unwrap());

    expected_checksum == actual_checksum
}

/// Length of a bounded string, stopping early at a NUL terminator. Used when
/// packing fixed-size string parameters into responses without overruns.
pub fn safe_string_length(buffer: &[u8], max_length: usize) -> usize {
    let bounded = &buffer[..buffer.len().min(max_length)];

    bounded
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(bounded.len())
}
