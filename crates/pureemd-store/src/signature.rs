//! HDF5 format signature detection.

use crate::error::StoreError;

/// The 8-byte HDF5 format signature.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'];

/// Find the superblock signature.
///
/// The superblock sits at offset 0 or at a power of two from 512 on, which
/// leaves room for a user block in front of it.
pub fn find_signature(data: &[u8]) -> Result<usize, StoreError> {
    if data.len() < HDF5_SIGNATURE.len() {
        if !HDF5_SIGNATURE.starts_with(data) {
            return Err(StoreError::SignatureNotFound);
        }
        return Err(StoreError::UnexpectedEof {
            expected: HDF5_SIGNATURE.len(),
            available: data.len(),
        });
    }
    let mut offset = 0usize;
    loop {
        match offset.checked_add(HDF5_SIGNATURE.len()) {
            Some(end) if end <= data.len() => {
                if data[offset..end] == HDF5_SIGNATURE {
                    return Ok(offset);
                }
            }
            _ => return Err(StoreError::SignatureNotFound),
        }
        offset = match offset {
            0 => 512,
            n => n.checked_mul(2).ok_or(StoreError::SignatureNotFound)?,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_at_zero() {
        let mut data = HDF5_SIGNATURE.to_vec();
        data.extend_from_slice(&[0; 100]);
        assert_eq!(find_signature(&data).unwrap(), 0);
    }

    #[test]
    fn signature_after_user_block() {
        for offset in [512usize, 1024, 4096] {
            let mut data = vec![0u8; offset + 64];
            data[offset..offset + 8].copy_from_slice(&HDF5_SIGNATURE);
            assert_eq!(find_signature(&data).unwrap(), offset);
        }
    }

    #[test]
    fn signature_off_the_power_of_two_offsets_is_missed() {
        let mut data = vec![0u8; 1024];
        data[100..108].copy_from_slice(&HDF5_SIGNATURE);
        assert!(matches!(find_signature(&data), Err(StoreError::SignatureNotFound)));
    }

    #[test]
    fn short_inputs() {
        assert!(matches!(
            find_signature(&[]),
            Err(StoreError::UnexpectedEof { available: 0, .. })
        ));
        assert!(matches!(
            find_signature(&HDF5_SIGNATURE[..5]),
            Err(StoreError::UnexpectedEof { .. })
        ));
        assert!(matches!(find_signature(b"nope"), Err(StoreError::SignatureNotFound)));
    }

    #[test]
    fn foreign_magic() {
        let data = [0x89, b'E', b'M', b'D', b'\r', b'\n', 0x1A, b'\n', 1, 0, 0, 0];
        assert!(matches!(find_signature(&data), Err(StoreError::SignatureNotFound)));
    }
}
