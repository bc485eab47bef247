//! Decoded TDF access policy
//!
//! The policy travels as base64 JSON; the KAS only needs its identifier and the
//! attribute value FQNs it names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub uuid: Uuid,
    pub body: PolicyBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBody {
    #[serde(rename = "dataAttributes", default)]
    pub data_attributes: Vec<PolicyAttribute>,
    #[serde(default)]
    pub dissem: Vec<String>,
}

/// A single attribute value FQN, e.g. `https://example.com/attr/level/value/secret`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttribute {
    pub attribute: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "isDefault", default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(rename = "pubKey", default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
    #[serde(rename = "kasURL", default, skip_serializing_if = "Option::is_none")]
    pub kas_url: Option<String>,
}

impl Policy {
    pub fn new(uuid: Uuid, attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            uuid,
            body: PolicyBody {
                data_attributes: attributes
                    .into_iter()
                    .map(|attribute| PolicyAttribute {
                        attribute: attribute.into(),
                        display_name: None,
                        is_default: None,
                        pub_key: None,
                        kas_url: None,
                    })
                    .collect(),
                dissem: Vec::new(),
            },
        }
    }

    /// Attribute value FQNs in declaration order
    pub fn attribute_fqns(&self) -> Vec<String> {
        self.body
            .data_attributes
            .iter()
            .map(|a| a.attribute.clone())
            .collect()
    }
}
