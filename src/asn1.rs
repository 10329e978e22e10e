//! Just enough BER/DER to carve a SEQUENCE out of a larger byte stream.
//!
//! The legacy U2F raw message formats embed a DER certificate and a DER
//! signature back to back with no framing of their own, so the only way to
//! find where one ends is to read the outer SEQUENCE length. Nothing in
//! here inspects the payload.

use crate::error::WebauthnError;

const SEQUENCE_TAG: u8 = 0x30;

/// Return the total encoded size of the DER SEQUENCE starting at the head
/// of `data`: tag octet, length octets, and payload. The buffer must be at
/// least that long; trailing bytes are fine and ignored.
pub fn sequence_length(data: &[u8]) -> Result<usize, WebauthnError> {
    let tag = *data
        .first()
        .ok_or(WebauthnError::ParseInsufficientBytesAvailable)?;
    if tag != SEQUENCE_TAG {
        return Err(WebauthnError::ParseAsn1SequenceExpected);
    }

    let initial = *data
        .get(1)
        .ok_or(WebauthnError::ParseInsufficientBytesAvailable)?;

    let total = if initial < 0x80 {
        // Short form, the octet is the payload length.
        2 + initial as usize
    } else {
        let count = (initial & 0x7f) as usize;
        // X.690 8.1.3: 0 is the indefinite form, 0x7f is reserved. Neither
        // is permitted in DER.
        if count == 0 || count == 0x7f {
            return Err(WebauthnError::ParseAsn1LengthInvalid);
        }
        if count > std::mem::size_of::<usize>() {
            return Err(WebauthnError::ParseAsn1LengthInvalid);
        }
        if data.len() < 2 + count {
            return Err(WebauthnError::ParseInsufficientBytesAvailable);
        }
        let mut payload_len: usize = 0;
        for b in &data[2..2 + count] {
            payload_len = (payload_len << 8) | *b as usize;
        }
        (2 + count)
            .checked_add(payload_len)
            .ok_or(WebauthnError::ParseAsn1LengthInvalid)?
    };

    if data.len() < total {
        return Err(WebauthnError::ParseInsufficientBytesAvailable);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::sequence_length;
    use crate::error::WebauthnError;

    #[test]
    fn short_form() {
        let mut buf = vec![0x30, 0x7d];
        buf.extend(std::iter::repeat(0xaa).take(0x7d));
        assert_eq!(sequence_length(&buf).unwrap(), 2 + 0x7d);
    }

    #[test]
    fn short_form_with_trailing_data() {
        let buf = [0x30, 0x02, 0x01, 0x00, 0xde, 0xad];
        assert_eq!(sequence_length(&buf).unwrap(), 4);
    }

    #[test]
    fn long_form_two_byte_length() {
        // Declares a 300 byte payload in two length octets.
        let mut buf = vec![0x30, 0x82, 0x01, 0x2c];
        buf.extend(std::iter::repeat(0x00).take(300));
        assert_eq!(sequence_length(&buf).unwrap(), 2 + 2 + 300);
    }

    #[test]
    fn truncated_by_one_byte() {
        let mut buf = vec![0x30, 0x82, 0x01, 0x2c];
        buf.extend(std::iter::repeat(0x00).take(299));
        assert!(matches!(
            sequence_length(&buf),
            Err(WebauthnError::ParseInsufficientBytesAvailable)
        ));
    }

    #[test]
    fn not_a_sequence() {
        assert!(matches!(
            sequence_length(&[0x04, 0x02, 0x00, 0x00]),
            Err(WebauthnError::ParseAsn1SequenceExpected)
        ));
    }

    #[test]
    fn empty_and_single_byte_inputs() {
        assert!(sequence_length(&[]).is_err());
        assert!(sequence_length(&[0x30]).is_err());
    }

    #[test]
    fn forbidden_length_forms() {
        // Indefinite length and the reserved 0x7f count are both rejected.
        assert!(matches!(
            sequence_length(&[0x30, 0x80, 0x00]),
            Err(WebauthnError::ParseAsn1LengthInvalid)
        ));
        assert!(matches!(
            sequence_length(&[0x30, 0xff, 0x00]),
            Err(WebauthnError::ParseAsn1LengthInvalid)
        ));
    }
}
