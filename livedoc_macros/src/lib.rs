//! Derive macros for `livedoc`.

mod model;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Model)]
// ============================================================================

/// Derive macro that implements `livedoc::Model` for a struct.
///
/// # Usage
///
/// ```ignore
/// use livedoc::Model;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize, Model)]
/// #[model(collection = "tasks")]
/// struct Task {
///     #[model(id)]
///     pub id: String,
///     pub status: String,
/// }
/// ```
///
/// - `#[model(collection = "...")]` sets the collection name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[model(id)]` marks the field used as the document id.
///   If omitted, defaults to a field named `id`.
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}
