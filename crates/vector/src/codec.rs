//! Vector byte format for the persistent log tier
//!
//! Packed 4-byte IEEE-754 little-endian floats in vector order. No header;
//! the element count is the payload length divided by 4.

use vecroute_common::{Result, VecRouteError};

const FLOAT_WIDTH: usize = std::mem::size_of::<f32>();

pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * FLOAT_WIDTH);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % FLOAT_WIDTH != 0 {
        return Err(VecRouteError::validation(format!(
            "Vector payload of {} bytes is not a multiple of {}",
            bytes.len(),
            FLOAT_WIDTH
        )));
    }

    Ok(bytes
        .chunks_exact(FLOAT_WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
