//! Subsystem registration — centralizes store initialization functions.
//!
//! Adding a new subsystem: append one entry to `SUBSYSTEMS`.

use crate::core::error::MoltError;
use crate::plugins::{compress, evolve, skills};
use std::path::Path;

pub(crate) struct SubsystemInit {
    /// Subsystem identifier (used for diagnostics and future registry queries).
    #[allow(dead_code)]
    pub name: &'static str,
    pub initialize: fn(&Path) -> Result<(), MoltError>,
}

/// All subsystems that require on-disk layout initialization.
pub(crate) const SUBSYSTEMS: &[SubsystemInit] = &[
    SubsystemInit {
        name: "memory",
        initialize: skills::initialize_memory,
    },
    SubsystemInit {
        name: "context",
        initialize: compress::initialize_digest,
    },
    SubsystemInit {
        name: "evolve",
        initialize: evolve::initialize_evolution,
    },
];

/// Initialize all subsystem directories sequentially.
pub(crate) fn initialize_all(root: &Path) -> Result<(), MoltError> {
    for sub in SUBSYSTEMS {
        (sub.initialize)(root)?;
    }
    Ok(())
}
