use uuid::Uuid;

/// Generates an opaque unique identifier for wallets, transactions and
/// transfer correlation references.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
