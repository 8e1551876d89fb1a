//! Cluster layers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three process layers every cluster node runs.
///
/// Ordering follows the bring-up order: L0 always first, then the optional
/// application layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    /// Core consensus layer
    L0,
    /// Optional currency application layer
    CurrencyL1,
    /// Optional data application layer
    DataL1,
}

impl Layer {
    /// All layers in bring-up order.
    pub const ALL: [Layer; 3] = [Layer::L0, Layer::CurrencyL1, Layer::DataL1];

    /// Segment used in credential paths (`/metagraph-nodes/{id}/{segment}/...`).
    pub fn key_segment(self) -> &'static str {
        match self {
            Layer::L0 => "l0",
            Layer::CurrencyL1 => "cl1",
            Layer::DataL1 => "dl1",
        }
    }

    /// Short label used in alerts and log archive names.
    pub fn short_label(self) -> &'static str {
        match self {
            Layer::L0 => "ML0",
            Layer::CurrencyL1 => "CL1",
            Layer::DataL1 => "DL1",
        }
    }

    /// Whether this is an application layer that hangs off L0.
    pub fn is_application_layer(self) -> bool {
        !matches!(self, Layer::L0)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::L0 => "l0",
            Layer::CurrencyL1 => "currency-l1",
            Layer::DataL1 => "data-l1",
        };
        f.write_str(name)
    }
}
