//! Whitespace-delimited instance format
//!
//! ```text
//! 4 100
//! 45 97
//! 36 610
//! 31 395
//! 14 211
//! ```

use smallvec::SmallVec;

use super::{Instance, InstanceError, Item};

pub(super) fn parse(text: &str) -> Result<Instance, InstanceError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, content)| (idx + 1, content.trim()))
        .filter(|(_, content)| !content.is_empty());

    let (header_line, header) = lines.next().ok_or(InstanceError::MissingHeader)?;
    let [declared, roll_width] = fields::<2>(header_line, header)?;

    let declared = usize::try_from(declared).map_err(|_err| InstanceError::InvalidNumber {
        line: header_line,
        value: declared.to_string(),
    })?;

    let mut items: SmallVec<[Item; 8]> = SmallVec::new();

    for (line, content) in lines {
        let [width, demand] = fields::<2>(line, content)?;

        items.push(Item::new(width, demand));
    }

    if items.len() != declared {
        return Err(InstanceError::ItemCountMismatch {
            declared,
            found: items.len(),
        });
    }

    Instance::new(roll_width, items)
}

/// Split a line into exactly `N` unsigned integer fields.
fn fields<const N: usize>(line: usize, content: &str) -> Result<[u64; N], InstanceError> {
    let parts: SmallVec<[&str; 4]> = content.split_whitespace().collect();

    if parts.len() != N {
        return Err(InstanceError::MalformedLine {
            line,
            expected: N,
            content: content.to_string(),
        });
    }

    let mut values = [0u64; N];

    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_err| InstanceError::InvalidNumber {
                line,
                value: (*part).to_string(),
            })?;
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parse_reads_header_and_items() -> TestResult {
        let instance = parse("4 100\n45 97\n36 610\n31 395\n14 211\n")?;

        assert_eq!(instance.roll_width(), 100);
        assert_eq!(instance.widths().collect::<Vec<_>>(), vec![45, 36, 31, 14]);
        assert_eq!(instance.demands().collect::<Vec<_>>(), vec![97, 610, 395, 211]);

        Ok(())
    }

    #[test]
    fn parse_tolerates_blank_lines_and_mixed_whitespace() -> TestResult {
        let instance = parse("\n2\t50\n\n  10   4\n20 1  \n\n")?;

        assert_eq!(instance.len(), 2);
        assert_eq!(instance.roll_width(), 50);

        Ok(())
    }

    #[test]
    fn parse_rejects_empty_text() {
        assert!(matches!(parse("  \n\n"), Err(InstanceError::MissingHeader)));
    }

    #[test]
    fn parse_reports_line_of_malformed_item() {
        let result = parse("2 100\n10 1\n20\n");

        assert!(matches!(
            result,
            Err(InstanceError::MalformedLine {
                line: 3,
                expected: 2,
                ..
            })
        ));
    }

    #[test]
    fn parse_reports_non_numeric_field() {
        let result = parse("1 100\nwide 1\n");

        assert!(matches!(
            result,
            Err(InstanceError::InvalidNumber { line: 2, ref value }) if value == "wide"
        ));
    }

    #[test]
    fn parse_rejects_negative_demand() {
        let result = parse("1 100\n10 -1\n");

        assert!(matches!(result, Err(InstanceError::InvalidNumber { line: 2, .. })));
    }

    #[test]
    fn parse_rejects_item_count_mismatch() {
        let result = parse("3 100\n10 1\n20 1\n");

        assert!(matches!(
            result,
            Err(InstanceError::ItemCountMismatch {
                declared: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn parse_validates_widths_against_roll() {
        let result = parse("1 100\n120 1\n");

        assert!(matches!(result, Err(InstanceError::WidthExceedsRoll { item: 0, .. })));
    }
}
