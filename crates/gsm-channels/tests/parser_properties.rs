//! Property-based tests for the frame-line parser

use gsm_channels::{parse_frame_line, FrameCollector, MalformedPolicy};
use proptest::prelude::*;

// Hex byte tokens as printed by the decoder
fn hex_token() -> impl Strategy<Value = String> {
    "[0-9a-f]{2}"
}

fn token_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(hex_token(), 1..24)
}

// Lines that never start with a digit cannot be frame records
fn non_frame_line() -> impl Strategy<Value = String> {
    "[a-zA-Z#>\\[][ -~]{0,60}"
}

proptest! {
    #[test]
    fn valid_lines_parse_to_their_fields(
        number in any::<u32>(),
        idx in any::<u32>(),
        tokens in token_list(),
        width in 0usize..12,
    ) {
        let line = format!("{:0width$} {} {}", number, idx, tokens.join(" "), width = width);
        let frame = parse_frame_line(&line).unwrap().unwrap();

        prop_assert_eq!(frame.frame_number(), number);
        prop_assert_eq!(frame.block_index(), idx);
        prop_assert_eq!(frame.tokens(), tokens.as_slice());
    }

    #[test]
    fn non_frame_lines_leave_collector_unchanged(
        lines in prop::collection::vec(non_frame_line(), 0..20),
    ) {
        let mut collector = FrameCollector::new(MalformedPolicy::Skip);
        collector.push_line("42 1 aa bb").unwrap();

        for line in &lines {
            prop_assert!(parse_frame_line(line).unwrap().is_none());
            collector.push_line(line).unwrap();
        }

        let (frames, _) = collector.finish();
        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(frames[&42].tokens(), &["aa".to_string(), "bb".to_string()]);
    }

    #[test]
    fn later_duplicate_always_wins(
        numbers in prop::collection::vec(0u32..16, 1..64),
    ) {
        let mut collector = FrameCollector::new(MalformedPolicy::Skip);
        for (i, n) in numbers.iter().enumerate() {
            collector.push_line(&format!("{} {} {:02x}", n, i, i % 256)).unwrap();
        }

        let (frames, stats) = collector.finish();
        prop_assert_eq!(stats.frames, numbers.len());
        prop_assert_eq!(stats.duplicates, numbers.len() - frames.len());

        for (n, frame) in &frames {
            let last = numbers.iter().rposition(|x| x == n).unwrap();
            prop_assert_eq!(frame.block_index() as usize, last);
        }
    }
}
