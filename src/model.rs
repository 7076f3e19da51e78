use bytes::Bytes;

/// A single opaque write submitted by a producer. Immutable after ingress.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Assigned at ingress; used only for logging/correlation, never
    /// interpreted by the router.
    pub id: String,
    pub body: Bytes,
    pub api_key: String,
}

impl Batch {
    pub fn new(id: String, body: Bytes, api_key: String) -> Self {
        Self { id, body, api_key }
    }
}
