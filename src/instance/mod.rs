//! Instances

use std::{fs, path::Path};

use smallvec::SmallVec;
use thiserror::Error;

mod text;

/// Instance Errors
#[derive(Debug, Error)]
pub enum InstanceError {
    /// IO error reading an instance file
    #[error("Failed to read instance file: {0}")]
    Io(#[from] std::io::Error),

    /// The instance has no items
    #[error("instance has no items")]
    Empty,

    /// Roll width of zero
    #[error("roll width must be greater than zero")]
    ZeroRollWidth,

    /// Item with a width of zero
    #[error("item {item} has a width of zero")]
    ZeroWidth {
        /// Index of the offending item
        item: usize,
    },

    /// Item wider than the stock roll
    #[error("item {item} has width {width}, which exceeds the roll width {roll_width}")]
    WidthExceedsRoll {
        /// Index of the offending item
        item: usize,
        /// Width of the item
        width: u64,
        /// Width of the stock roll
        roll_width: u64,
    },

    /// Widths and demands are not index-aligned
    #[error("{widths} widths were given for {demands} demands")]
    LengthMismatch {
        /// Number of widths
        widths: usize,
        /// Number of demands
        demands: usize,
    },

    /// Instance text has no header line
    #[error("instance is missing the `<items> <roll width>` header line")]
    MissingHeader,

    /// A line does not have the expected number of fields
    #[error("line {line}: expected {expected} fields, found `{content}`")]
    MalformedLine {
        /// 1-based line number
        line: usize,
        /// Number of fields expected on the line
        expected: usize,
        /// The offending line
        content: String,
    },

    /// A field is not a non-negative integer
    #[error("line {line}: `{value}` is not a non-negative integer")]
    InvalidNumber {
        /// 1-based line number
        line: usize,
        /// The offending field
        value: String,
    },

    /// Header item count disagrees with the item lines that follow
    #[error("header declares {declared} items but {found} item lines were found")]
    ItemCountMismatch {
        /// Item count from the header
        declared: usize,
        /// Item lines present in the file
        found: usize,
    },
}

/// A single item type to be cut from stock rolls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Width of one piece
    pub width: u64,

    /// Number of pieces required
    pub demand: u64,

    /// Optional display label
    pub label: Option<String>,
}

impl Item {
    /// Create an unlabelled item.
    pub fn new(width: u64, demand: u64) -> Self {
        Self {
            width,
            demand,
            label: None,
        }
    }

    /// Create a labelled item.
    pub fn with_label(width: u64, demand: u64, label: impl Into<String>) -> Self {
        Self {
            width,
            demand,
            label: Some(label.into()),
        }
    }
}

/// Validated cutting stock instance.
///
/// Every item is at least one unit wide and no wider than the roll, so each
/// item fits on a roll on its own and the identity patterns are always a
/// feasible starting point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    roll_width: u64,
    items: SmallVec<[Item; 8]>,
}

impl Instance {
    /// Create an instance from a roll width and a list of items.
    ///
    /// # Errors
    ///
    /// Returns an [`InstanceError`] if the instance is empty, the roll width is
    /// zero, or any item is zero-width or wider than the roll.
    pub fn new(
        roll_width: u64,
        items: impl IntoIterator<Item = Item>,
    ) -> Result<Self, InstanceError> {
        let items: SmallVec<[Item; 8]> = items.into_iter().collect();

        if roll_width == 0 {
            return Err(InstanceError::ZeroRollWidth);
        }

        if items.is_empty() {
            return Err(InstanceError::Empty);
        }

        for (item, entry) in items.iter().enumerate() {
            if entry.width == 0 {
                return Err(InstanceError::ZeroWidth { item });
            }

            if entry.width > roll_width {
                return Err(InstanceError::WidthExceedsRoll {
                    item,
                    width: entry.width,
                    roll_width,
                });
            }
        }

        Ok(Self { roll_width, items })
    }

    /// Create an instance from index-aligned widths and demands.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::LengthMismatch`] if the slices differ in length,
    /// or any error from [`Instance::new`].
    pub fn from_widths_and_demands(
        roll_width: u64,
        widths: &[u64],
        demands: &[u64],
    ) -> Result<Self, InstanceError> {
        if widths.len() != demands.len() {
            return Err(InstanceError::LengthMismatch {
                widths: widths.len(),
                demands: demands.len(),
            });
        }

        Self::new(
            roll_width,
            widths
                .iter()
                .zip(demands)
                .map(|(&width, &demand)| Item::new(width, demand)),
        )
    }

    /// Parse an instance from the whitespace-delimited text format.
    ///
    /// The first line holds the item count and the roll width, and every
    /// following line holds one item's width and demand.
    ///
    /// # Errors
    ///
    /// Returns an [`InstanceError`] naming the offending line if the text is
    /// malformed, or a validation error from [`Instance::new`].
    pub fn parse(text: &str) -> Result<Self, InstanceError> {
        text::parse(text)
    }

    /// Read an instance in the text format from a file.
    ///
    /// # Errors
    ///
    /// Returns an [`InstanceError`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InstanceError> {
        let contents = fs::read_to_string(path)?;

        Self::parse(&contents)
    }

    /// Width of the stock roll
    pub fn roll_width(&self) -> u64 {
        self.roll_width
    }

    /// Items in index order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Get an item by index
    pub fn item(&self, idx: usize) -> Option<&Item> {
        self.items.get(idx)
    }

    /// Number of item types
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a validated instance.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item widths in index order
    pub fn widths(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().map(|item| item.width)
    }

    /// Item demands in index order
    pub fn demands(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().map(|item| item.demand)
    }

    /// Most copies of an item that fit on a single roll, `floor(W / width)`.
    pub fn max_copies(&self, idx: usize) -> Option<u64> {
        self.items
            .get(idx)
            .map(|item| self.roll_width / item.width)
    }

    /// Display name for an item: its label, or `#<index>` when unlabelled.
    pub fn display_name(&self, idx: usize) -> String {
        self.items
            .get(idx)
            .and_then(|item| item.label.clone())
            .unwrap_or_else(|| format!("#{idx}"))
    }
}
