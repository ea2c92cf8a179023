//! Instance Fixtures

use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    instance::{Instance, Item},
};

/// Cutting stock instance in YAML
///
/// ```yaml
/// roll_width: 100
/// items:
///   - { name: shelf, width: 45, demand: 97 }
///   - { width: 36, demand: 610 }
/// ```
#[derive(Debug, Deserialize)]
pub struct InstanceFixture {
    /// Width of the stock roll
    pub roll_width: u64,

    /// Item types to cut
    pub items: Vec<ItemFixture>,
}

/// Item fixture from YAML
#[derive(Debug, Deserialize)]
pub struct ItemFixture {
    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,

    /// Width of one piece
    pub width: u64,

    /// Number of pieces required
    pub demand: u64,
}

impl From<ItemFixture> for Item {
    fn from(fixture: ItemFixture) -> Self {
        Item {
            width: fixture.width,
            demand: fixture.demand,
            label: fixture.name,
        }
    }
}

impl TryFrom<InstanceFixture> for Instance {
    type Error = FixtureError;

    fn try_from(fixture: InstanceFixture) -> Result<Self, Self::Error> {
        Ok(Instance::new(
            fixture.roll_width,
            fixture.items.into_iter().map(Item::from),
        )?)
    }
}
