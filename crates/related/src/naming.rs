//! Id field naming conventions
//!
//! When a relation does not name its id field explicitly, the field is looked
//! up by convention: a single relation `product` reads `product_id`, a list of
//! `ProductCommentDto` reads `product_comment_dto_ids`.

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};

/// Naming convention used to derive id field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdNamingConvention {
    /// product_id / product_comment_dto_ids
    #[default]
    Underscore,
    /// productId / productCommentDtoIds
    CamelCase,
    /// ProductId / ProductCommentDtoIds
    PascalCase,
}

impl IdNamingConvention {
    /// Id field name for a single-valued relation stored in `related_field`
    pub fn single_id_field(self, related_field: &str) -> String {
        self.with_suffix(related_field, "id")
    }

    /// Id field name for a list relation whose elements are `element_type`
    ///
    /// Module paths and generic arguments are ignored, so
    /// `crate::dto::ProductCommentDto` and `ProductCommentDto` name the same field.
    pub fn list_id_field(self, element_type: &str) -> String {
        self.with_suffix(short_type_name(element_type), "ids")
    }

    fn with_suffix(self, base: &str, suffix: &str) -> String {
        let name = format!("{}_{}", base.to_case(Case::Snake), suffix);
        match self {
            Self::Underscore => name,
            Self::CamelCase => name.to_case(Case::Camel),
            Self::PascalCase => name.to_case(Case::Pascal),
        }
    }
}

/// Last path segment of a type name, without generic arguments
pub fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}
