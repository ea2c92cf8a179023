//! Integration tests for reading instance files

use std::fs;

use tempfile::TempDir;
use testresult::TestResult;

use cutting_stock::{
    fixtures::{Fixture, FixtureError, InstanceFormat},
    instance::{Instance, InstanceError},
};

#[test]
fn text_file_with_blank_lines_loads() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("CSP.txt");

    fs::write(&path, "\n2 100\n\n45 97\n36 610\n\n")?;

    let instance = Fixture::load_path(&path, InstanceFormat::from_path(&path))?;

    assert_eq!(instance.roll_width(), 100);
    assert_eq!(instance.widths().collect::<Vec<_>>(), vec![45, 36]);
    assert_eq!(instance.demands().collect::<Vec<_>>(), vec![97, 610]);

    Ok(())
}

#[test]
fn instance_from_path_reads_text() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("instance");

    fs::write(&path, "1 100\n30 7\n")?;

    let instance = Instance::from_path(&path)?;

    assert_eq!(instance.max_copies(0), Some(3));

    Ok(())
}

#[test]
fn yaml_extension_selects_yaml_parser() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("rolls.yaml");

    fs::write(
        &path,
        "roll_width: 50\nitems:\n  - { name: tab, width: 20, demand: 5 }\n",
    )?;

    let instance = Fixture::load_path(&path, InstanceFormat::from_path(&path))?;

    assert_eq!(instance.display_name(0), "tab");
    assert_eq!(instance.roll_width(), 50);

    Ok(())
}

#[test]
fn text_parse_errors_name_the_line() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("bad.txt");

    fs::write(&path, "2 100\n45 97\n36 lots\n")?;

    let error = Fixture::load_path(&path, InstanceFormat::Text)
        .err()
        .ok_or("malformed instance accepted")?;

    assert!(matches!(
        error,
        FixtureError::Instance(InstanceError::InvalidNumber { line: 3, .. })
    ));
    assert!(error.to_string().contains("line 3"), "{error}");

    Ok(())
}

#[test]
fn missing_item_lines_are_reported() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("short.txt");

    fs::write(&path, "3 100\n45 97\n")?;

    let error = Fixture::load_path(&path, InstanceFormat::Text)
        .err()
        .ok_or("short instance accepted")?;

    assert!(matches!(
        error,
        FixtureError::Instance(InstanceError::ItemCountMismatch {
            declared: 3,
            found: 1
        })
    ));

    Ok(())
}

#[test]
fn oversized_item_in_yaml_is_rejected_before_solving() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("oversized.yml");

    fs::write(&path, "roll_width: 40\nitems:\n  - { width: 45, demand: 1 }\n")?;

    let error = Fixture::load_path(&path, InstanceFormat::Yaml)
        .err()
        .ok_or("oversized item accepted")?;

    assert!(matches!(
        error,
        FixtureError::Instance(InstanceError::WidthExceedsRoll {
            item: 0,
            width: 45,
            roll_width: 40
        })
    ));

    Ok(())
}
