//! Relation definitions between lists.
//!
//! A relation pair is declared once, from the side that stores the
//! reference. The to-many direction is derived by scanning for matching
//! references, so the two sides of a pair cannot drift apart.

use serde::{Deserialize, Serialize};

/// Cardinality of the reference-holding side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Many records may reference the same target.
    ManyToOne,
    /// At most one record may reference a given target (unique reference).
    OneToOne,
}

/// Behavior when a referenced record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Delete referencing records too.
    Cascade,
    /// Refuse deletion while referencing records exist.
    Restrict,
    /// Null out the reference on referencing records.
    SetNull,
}

/// A bidirectional relation pair between two lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name (unique within a schema).
    pub name: String,
    /// List holding the reference.
    pub list: String,
    /// Relationship field on the holding list.
    pub field: String,
    /// Referenced list.
    pub references: String,
    /// Derived to-many field name on the referenced list.
    pub inverse_field: String,
    /// Reference cardinality.
    pub cardinality: Cardinality,
    /// What happens to holders when the target is deleted.
    pub on_delete: DeleteBehavior,
    /// Admin-UI hints for the relationship field.
    pub ui: RelationUi,
}

/// Admin-UI hints for a relationship field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationUi {
    /// How the related record is rendered.
    pub display_mode: DisplayMode,
}

/// Rendering mode for a relationship field in the admin UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Plain select/list widget.
    #[default]
    Select,
    /// Card layout showing fields of the related record.
    Cards {
        /// Fields of the related record shown on the card.
        card_fields: Vec<String>,
        /// Fields editable inline on the card.
        inline_edit: Vec<String>,
        /// Whether the card links to the related record's page.
        link_to_item: bool,
        /// Whether existing records can be connected inline.
        inline_connect: bool,
    },
}

impl RelationDef {
    /// Declare a many-to-one relation pair.
    pub fn many_to_one(
        name: impl Into<String>,
        list: impl Into<String>,
        field: impl Into<String>,
        references: impl Into<String>,
        inverse_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            list: list.into(),
            field: field.into(),
            references: references.into(),
            inverse_field: inverse_field.into(),
            cardinality: Cardinality::ManyToOne,
            on_delete: DeleteBehavior::SetNull,
            ui: RelationUi::default(),
        }
    }

    /// Declare a one-to-one relation pair.
    pub fn one_to_one(
        name: impl Into<String>,
        list: impl Into<String>,
        field: impl Into<String>,
        references: impl Into<String>,
        inverse_field: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::OneToOne,
            ..Self::many_to_one(name, list, field, references, inverse_field)
        }
    }

    /// Set the delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }

    /// Render the relationship field as cards in the admin UI.
    pub fn with_cards_ui(
        mut self,
        card_fields: impl IntoIterator<Item = impl Into<String>>,
        inline_edit: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ui.display_mode = DisplayMode::Cards {
            card_fields: card_fields.into_iter().map(Into::into).collect(),
            inline_edit: inline_edit.into_iter().map(Into::into).collect(),
            link_to_item: true,
            inline_connect: true,
        };
        self
    }

    /// Check whether the reference must be unique.
    pub fn is_one_to_one(&self) -> bool {
        self.cardinality == Cardinality::OneToOne
    }
}
