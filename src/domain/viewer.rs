use serde::Serialize;
use uuid::Uuid;

/// The holder of an anonymous session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Viewer {
    pub id: Uuid,
    pub display_name: String,
}
