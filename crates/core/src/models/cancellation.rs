use serde::{Deserialize, Serialize};

/// A pending request to force a relay into the cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub id: i64,
    pub relay_id: i64,
}
