use std::collections::BTreeSet;

/// Parses a selection such as `"1,3-5"` into sorted, unique zero-based
/// indices below `max_num`. Parts that are malformed or out of range are
/// skipped without affecting the rest.
pub fn parse_selection(input: &str, max_num: usize) -> Vec<usize> {
    let mut indices = BTreeSet::new();

    for part in input.split(',').map(str::trim) {
        if let Some((start, end)) = part.split_once('-') {
            let (Some(start), Some(end)) = (parse_number(start), parse_number(end)) else {
                continue;
            };
            if 1 <= start && start <= end && end <= max_num {
                indices.extend(start - 1..end);
            }
        } else if let Some(num) = parse_number(part) {
            if 1 <= num && num <= max_num {
                indices.insert(num - 1);
            }
        }
    }

    indices.into_iter().collect()
}

fn parse_number(text: &str) -> Option<usize> {
    text.trim().parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_singles_and_ranges() {
        assert_eq!(parse_selection("1,3-4", 5), vec![0, 2, 3]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_selection("", 5).is_empty());
        assert!(parse_selection("   ", 5).is_empty());
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        assert_eq!(parse_selection("5, 2-4, 3, 1-2", 5), vec![0, 1, 2, 3, 4]);
        assert_eq!(parse_selection("3,1", 3), vec![0, 2]);
    }

    #[test]
    fn test_invalid_parts_are_dropped() {
        // inverted range, out of range single, garbage, open range
        assert_eq!(parse_selection("4-2,9,abc,2-,1", 5), vec![0]);
        assert_eq!(parse_selection("0", 5), Vec::<usize>::new());
        assert_eq!(parse_selection("-1", 5), Vec::<usize>::new());
        assert_eq!(parse_selection("1-2-3,2", 5), vec![1]);
        assert_eq!(parse_selection("3-6", 5), Vec::<usize>::new());
    }

    #[test]
    fn test_chat_text_is_not_a_selection() {
        assert!(parse_selection("why did that fail?", 3).is_empty());
        assert!(parse_selection("use apt instead", 3).is_empty());
    }

    #[test]
    fn test_zero_commands() {
        assert!(parse_selection("1", 0).is_empty());
    }

    #[test]
    fn test_indices_stay_in_bounds() {
        let inputs = [
            "1", "1-5", "2,2,2", "5-5", "1-100", "10", "3-1", "1,2,x,4-5", "  4 , 1 - 2 ",
            "9999999999999999999999", "",
        ];
        for max_num in 0..7 {
            for input in inputs {
                let first = parse_selection(input, max_num);
                assert!(first.iter().all(|&i| i < max_num), "{input:?} / {max_num}");
                assert!(first.windows(2).all(|w| w[0] < w[1]), "{input:?} / {max_num}");
                assert_eq!(first, parse_selection(input, max_num));
            }
        }
    }

    #[test]
    fn test_whitespace_inside_parts() {
        assert_eq!(parse_selection(" 4 , 1 - 2 ", 5), vec![0, 1, 3]);
    }
}
