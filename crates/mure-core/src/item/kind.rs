//! Item variants and their capability table.
//!
//! Every addressable value is exactly one `ItemType`. Instead of a class
//! hierarchy, each variant answers four questions through the table below:
//! its boilerplate value, its required reserved fields, its declared
//! conversion targets and the parent whose targets it inherits.

use crate::primitives::{
    DATE_STR_KEY, EDGES_KEY, IS_DATE_KEY, MEMBERS_KEY, NODES_KEY, TAGS_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The closed set of item variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemType {
    /// The whole store.
    Root,
    /// One whole document.
    Document,
    Container,
    Taggable,
    Node,
    Edge,
    Set,
    /// A node that is also a set of nodes.
    Supernode,
    Boolean,
    Number,
    String,
    Date,
    Null,
    /// A string holding a selector.
    Reference,
}

const PRIMITIVE_FROM_NULL: &[ItemType] = &[ItemType::Boolean, ItemType::Number, ItemType::String];

impl ItemType {
    /// Every variant, in declaration order.
    pub const ALL: [ItemType; 14] = [
        Self::Root,
        Self::Document,
        Self::Container,
        Self::Taggable,
        Self::Node,
        Self::Edge,
        Self::Set,
        Self::Supernode,
        Self::Boolean,
        Self::Number,
        Self::String,
        Self::Date,
        Self::Null,
        Self::Reference,
    ];

    /// Variant name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Document => "Document",
            Self::Container => "Container",
            Self::Taggable => "Taggable",
            Self::Node => "Node",
            Self::Edge => "Edge",
            Self::Set => "Set",
            Self::Supernode => "Supernode",
            Self::Boolean => "Boolean",
            Self::Number => "Number",
            Self::String => "String",
            Self::Date => "Date",
            Self::Null => "Null",
            Self::Reference => "Reference",
        }
    }

    /// Primitive family: values without children.
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        matches!(
            self,
            Self::Boolean | Self::Number | Self::String | Self::Date | Self::Null | Self::Reference
        )
    }

    /// Container family: values with children.
    #[must_use]
    pub const fn is_container(self) -> bool {
        !self.is_primitive()
    }

    /// Variants carrying `$tags`.
    #[must_use]
    pub const fn is_taggable(self) -> bool {
        matches!(
            self,
            Self::Taggable | Self::Node | Self::Edge | Self::Set | Self::Supernode
        )
    }

    /// Variants carrying `$edges`.
    #[must_use]
    pub const fn is_node(self) -> bool {
        matches!(self, Self::Node | Self::Supernode)
    }

    /// Variants carrying `$members`.
    #[must_use]
    pub const fn is_set(self) -> bool {
        matches!(self, Self::Set | Self::Supernode)
    }

    /// Variants carrying `$nodes`.
    #[must_use]
    pub const fn is_edge(self) -> bool {
        matches!(self, Self::Edge)
    }

    /// Reserved fields a raw value must carry to be this variant.
    #[must_use]
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Taggable => &[TAGS_KEY],
            Self::Node => &[TAGS_KEY, EDGES_KEY],
            Self::Edge => &[TAGS_KEY, NODES_KEY],
            Self::Set => &[TAGS_KEY, MEMBERS_KEY],
            Self::Supernode => &[TAGS_KEY, EDGES_KEY, MEMBERS_KEY],
            _ => &[],
        }
    }

    /// The canonical empty raw value of this variant.
    #[must_use]
    pub fn boilerplate_value(self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::Number => json!(0),
            Self::String | Self::Reference => Value::String(String::new()),
            Self::Null => Value::Null,
            Self::Date => json!({ IS_DATE_KEY: true, DATE_STR_KEY: "" }),
            Self::Root | Self::Document | Self::Container => json!({}),
            container => {
                let mut map = serde_json::Map::new();
                for field in container.required_fields() {
                    map.insert((*field).to_string(), json!({}));
                }
                Value::Object(map)
            }
        }
    }

    /// Targets this variant declares on its own.
    const fn declared_targets(self) -> &'static [ItemType] {
        match self {
            Self::Boolean => &[Self::Number, Self::String],
            Self::Number => &[Self::Boolean, Self::String, Self::Date],
            Self::String => &[Self::Boolean, Self::Number, Self::Date, Self::Reference],
            Self::Date => &[Self::Boolean, Self::Number, Self::String],
            Self::Null => PRIMITIVE_FROM_NULL,
            Self::Reference => &[Self::String],
            Self::Container => &[
                Self::Taggable,
                Self::Node,
                Self::Edge,
                Self::Set,
                Self::Supernode,
            ],
            Self::Node | Self::Set => &[Self::Supernode],
            Self::Taggable | Self::Edge | Self::Supernode | Self::Document | Self::Root => &[],
        }
    }

    /// The variant whose conversion targets this one inherits.
    const fn conversion_parent(self) -> Option<ItemType> {
        match self {
            Self::Reference => Some(Self::String),
            Self::Taggable => Some(Self::Container),
            _ => None,
        }
    }

    /// Whether `convert_to(target)` is supported from this variant.
    #[must_use]
    pub fn can_convert_to(self, target: ItemType) -> bool {
        if self == target {
            return true;
        }
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind.declared_targets().contains(&target) {
                return true;
            }
            current = kind.conversion_parent();
        }
        false
    }

    /// Every target reachable from this variant, including itself.
    #[must_use]
    pub fn conversion_targets(self) -> Vec<ItemType> {
        Self::ALL
            .into_iter()
            .filter(|target| self.can_convert_to(*target))
            .collect()
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_boilerplate_has_tags_and_edges() {
        assert_eq!(
            ItemType::Node.boilerplate_value(),
            json!({ "$tags": {}, "$edges": {} })
        );
        assert_eq!(
            ItemType::Edge.boilerplate_value(),
            json!({ "$tags": {}, "$nodes": {} })
        );
        assert_eq!(
            ItemType::Date.boilerplate_value(),
            json!({ "$isDate": true, "str": "" })
        );
    }

    #[test]
    fn reference_inherits_string_targets() {
        assert!(ItemType::Reference.can_convert_to(ItemType::Number));
        assert!(ItemType::Reference.can_convert_to(ItemType::String));
        assert!(!ItemType::Reference.can_convert_to(ItemType::Node));
    }

    #[test]
    fn taggable_inherits_container_targets() {
        assert!(ItemType::Taggable.can_convert_to(ItemType::Node));
        assert!(ItemType::Taggable.can_convert_to(ItemType::Set));
        assert!(ItemType::Taggable.can_convert_to(ItemType::Taggable));
    }

    #[test]
    fn structural_variants_do_not_cross() {
        assert!(!ItemType::Node.can_convert_to(ItemType::Edge));
        assert!(!ItemType::Edge.can_convert_to(ItemType::Node));
        assert!(!ItemType::Node.can_convert_to(ItemType::Container));
        assert!(ItemType::Node.can_convert_to(ItemType::Supernode));
        assert!(ItemType::Set.can_convert_to(ItemType::Supernode));
    }

    #[test]
    fn every_variant_converts_to_itself() {
        for kind in ItemType::ALL {
            assert!(kind.can_convert_to(kind), "{kind}");
            assert!(kind.conversion_targets().contains(&kind));
        }
    }
}
