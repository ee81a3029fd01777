//! Identifier generation.

use uuid::Uuid;

/// A new time-ordered identifier (UUIDv7).
pub fn new() -> Uuid {
    Uuid::now_v7()
}
