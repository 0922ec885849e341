/// Sum every byte of `span` into the signed accumulator `seed` and return
/// the negated sum.
///
/// Appending the result to `span` makes the whole run (seed included)
/// sum to zero.
pub fn checksum(span: &[u8], seed: i8) -> i8 {
    let sum = span
        .iter()
        .fold(seed, |acc, &b| acc.wrapping_add(b as i8));
    sum.wrapping_neg()
}

/// Checksum of `span` starting from a zero accumulator, as a wire byte.
pub fn checksum_byte(span: &[u8]) -> u8 {
    checksum(span, 0) as u8
}

/// Whether `span` (ending in its own checksum byte) sums to zero.
pub fn is_valid(span: &[u8]) -> bool {
    span.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_checksum_matches_known_vector() {
        // rsAddr 0x20, netFn App (0x06) / LUN 0
        assert_eq!(checksum_byte(&[0x20, 0x18]), 0xC8);
    }

    #[test]
    fn span_with_trailing_checksum_sums_to_zero() {
        let spans: [&[u8]; 4] = [
            &[],
            &[0x81, 0x04, 0x38, 0x0E, 0x04],
            &[0xFF; 40],
            &[0x7F, 0x80, 0x01, 0xFE],
        ];
        for span in spans {
            let mut framed = span.to_vec();
            framed.push(checksum_byte(span));
            assert!(is_valid(&framed), "span {span:02x?}");
        }
    }

    #[test]
    fn seeded_checksum_continues_a_previous_run() {
        let head = [0x81u8, 0x04];
        let tail = [0x38u8, 0x0E, 0x04];
        let seed = checksum(&head, 0).wrapping_neg();
        let chained = checksum(&tail, seed);

        let mut whole = head.to_vec();
        whole.extend_from_slice(&tail);
        assert_eq!(chained, checksum(&whole, 0));
    }

    #[test]
    fn corrupted_span_is_rejected() {
        let mut framed = vec![0x20, 0x18];
        framed.push(checksum_byte(&framed));
        framed[1] ^= 0x01;
        assert!(!is_valid(&framed));
    }
}
