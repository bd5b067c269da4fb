//! Shape Scanner - turns a shape declaration into relation descriptors

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::{Cardinality, RelationDescriptor};
use crate::error::{RelatedError, RelatedResult};
use crate::naming::IdNamingConvention;
use crate::shape::{IdKind, ShapeTable};

/// Resolves the id field of every declared relation against its own shape
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeScanner {
    naming: IdNamingConvention,
}

impl ShapeScanner {
    pub fn new(naming: IdNamingConvention) -> Self {
        Self { naming }
    }

    pub fn naming_convention(&self) -> IdNamingConvention {
        self.naming
    }

    /// Scan a shape into descriptors, in declaration order
    ///
    /// Fails when a field is declared twice, when a list relation has no id
    /// field, or when a resolved id field has the wrong kind or key type.
    /// A single relation without an id field is kept; the loader skips it.
    pub(crate) fn scan<S>(&self, table: &ShapeTable<S>) -> RelatedResult<Vec<RelationDescriptor<S>>> {
        let shape = table.shape();

        let mut id_names = HashSet::new();
        for field in table.id_fields() {
            if !id_names.insert(field.name()) {
                return Err(RelatedError::DuplicateField {
                    shape: shape.name(),
                    field: field.name().to_string(),
                });
            }
        }

        let mut related_names = HashSet::new();
        let mut descriptors = Vec::with_capacity(table.relations().len());

        for relation in table.relations() {
            if !related_names.insert(relation.field()) {
                return Err(RelatedError::DuplicateField {
                    shape: shape.name(),
                    field: relation.field().to_string(),
                });
            }

            let cardinality = relation.cardinality();
            let id_name = match relation.id_field_override() {
                Some(name) => name.to_string(),
                None if cardinality.is_list() => self.naming.list_id_field(relation.element().type_name()),
                None => self.naming.single_id_field(relation.field()),
            };

            let id_field = if id_name.is_empty() {
                None
            } else {
                table.id_field(&id_name)
            };

            let id_field = match id_field {
                Some(field) => {
                    let expected_kind = if cardinality.is_list() {
                        IdKind::Sequence
                    } else {
                        IdKind::Single
                    };
                    if field.kind() != expected_kind {
                        return Err(RelatedError::IdFieldMismatch {
                            shape: shape.name(),
                            field: id_name,
                            reason: format!(
                                "{:?} id field cannot feed {:?} relation '{}'",
                                field.kind(),
                                cardinality,
                                relation.field()
                            ),
                        });
                    }

                    let (key_type, key_type_name) = field.key_type();
                    let (expected_key, expected_key_name) = relation.apply().key_type();
                    if key_type != expected_key {
                        return Err(RelatedError::IdFieldMismatch {
                            shape: shape.name(),
                            field: id_name,
                            reason: format!(
                                "holds {} but '{}' is keyed by {}",
                                key_type_name,
                                relation.field(),
                                expected_key_name
                            ),
                        });
                    }

                    Some(id_name)
                }
                None if cardinality.is_list() => {
                    return Err(RelatedError::MissingIdField {
                        shape: shape.name(),
                        field: relation.field().to_string(),
                    });
                }
                None => {
                    debug!(
                        "No id field '{}' on {} for {}; it can only be loaded from key providers",
                        id_name,
                        shape,
                        relation.field()
                    );
                    None
                }
            };

            descriptors.push(RelationDescriptor {
                related_field: relation.field().to_string(),
                id_field,
                id_field_override: relation.id_field_override().map(str::to_string),
                cardinality,
                element: relation.element(),
                collection_type: match cardinality {
                    Cardinality::DynamicCollection => relation.collection_type(),
                    _ => None,
                },
                apply: Arc::clone(relation.apply()),
            });
        }

        Ok(descriptors)
    }
}
