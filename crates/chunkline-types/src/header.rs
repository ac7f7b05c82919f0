use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::identity::{ContainerId, OwnerId};
use crate::object::ObjectId;

/// A user-defined key/value attribute carried by an object header.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Reference from a split-chain member to the parent (logical) object.
///
/// The last chunk of a chain embeds the full parent header so the logical
/// object's metadata can be recovered from it alone. The linking object only
/// carries the id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Box<ObjectHeader>>,
}

impl ParentRef {
    /// Reference by id only.
    pub fn id(id: ObjectId) -> Self {
        Self { id, header: None }
    }

    /// Reference carrying the parent's finalized header.
    pub fn with_header(id: ObjectId, header: ObjectHeader) -> Self {
        Self {
            id,
            header: Some(Box::new(header)),
        }
    }
}

/// Metadata of one physical object.
///
/// The same record describes plain objects, split-chain chunks, the parent
/// object and the linking object; they differ only in which of the split
/// fields (`previous`, `parent`, `children`) are populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    pub container_id: ContainerId,
    pub owner_id: OwnerId,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Number of payload bytes described by this header.
    #[serde(default)]
    pub payload_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_checksum: Option<Checksum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_homomorphic_hash: Option<Checksum>,
    /// Size and checksums describe bytes held by the split-chain chunks, not
    /// by this object. Set only on a split-chain parent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub payload_detached: bool,
    /// Previous chunk in the split-chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    /// Ordered chunk ids; only populated on a linking object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ObjectId>,
}

impl ObjectHeader {
    pub fn new(container_id: ContainerId, owner_id: OwnerId) -> Self {
        Self {
            container_id,
            owner_id,
            ..Default::default()
        }
    }

    /// Builder-style attribute append.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    /// A fresh header sharing only container, owner and attributes.
    ///
    /// Every object the splitter emits starts from this template of the
    /// logical header.
    pub fn template(&self) -> Self {
        Self {
            container_id: self.container_id,
            owner_id: self.owner_id,
            attributes: self.attributes.clone(),
            ..Default::default()
        }
    }

    /// Look up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Returns `true` for a linking object (a header enumerating children).
    pub fn is_linking(&self) -> bool {
        !self.children.is_empty()
    }

    /// Returns `true` if this object is a member of a split-chain.
    pub fn is_split_member(&self) -> bool {
        self.previous.is_some() || self.parent.is_some() || self.is_linking()
    }
}

/// Identifiers returned by a sink once an object has been stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessIdentifiers {
    /// Id of the object just written.
    pub self_id: ObjectId,
    /// Id of its parent, if the object is part of a split-chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ObjectId>,
    /// Parent header, when the written object embedded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_header: Option<Box<ObjectHeader>>,
}

impl AccessIdentifiers {
    pub fn new(self_id: ObjectId) -> Self {
        Self {
            self_id,
            parent_id: None,
            parent_header: None,
        }
    }

    /// Identifiers for an object written with the given header.
    pub fn for_header(self_id: ObjectId, header: &ObjectHeader) -> Self {
        match &header.parent {
            Some(parent) => Self {
                self_id,
                parent_id: Some(parent.id),
                parent_header: parent.header.clone(),
            },
            None => Self::new(self_id),
        }
    }
}
