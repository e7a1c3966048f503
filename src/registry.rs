//! Registry of already-emitted (test name, canvas type) pairs.

use std::collections::{HashMap, HashSet};

use crate::error::GenError;
use crate::models::CanvasType;

/// Tracks which hosting contexts each test name has been emitted for.
///
/// The registry is the only state that persists across tests in a run; it
/// is passed explicitly to the driver rather than living in a global.
#[derive(Debug, Default)]
pub struct UsedTests {
    tested: HashMap<String, HashSet<CanvasType>>,
}

impl UsedTests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for `canvas_types`.
    ///
    /// Fails with a definition error naming the offending contexts if any
    /// requested context was already registered for this name; otherwise
    /// the union is recorded.
    pub fn check_and_register(
        &mut self,
        name: &str,
        canvas_types: &[CanvasType],
    ) -> Result<(), GenError> {
        let seen = self.tested.entry(name.to_string()).or_default();
        let already_tested: Vec<&'static str> = canvas_types
            .iter()
            .filter(|canvas_type| seen.contains(canvas_type))
            .map(CanvasType::as_str)
            .collect();
        if !already_tested.is_empty() {
            return Err(GenError::definition(format!(
                "test {name} is defined twice for types {already_tested:?}"
            )));
        }
        seen.extend(canvas_types.iter().copied());
        Ok(())
    }
}
