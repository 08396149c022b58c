// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Type metadata for test binaries.
//!
//! Test binaries are not loaded in-process. Their metadata is obtained through an
//! [`AssemblyReflector`]; the shipped implementation is [`CommandReflector`], which runs a
//! host-side helper and reads its JSON output.

mod classify;
mod command;

pub use classify::*;
pub use command::*;

use crate::errors::ReflectError;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// Obtains type metadata for a test binary.
pub trait AssemblyReflector {
    /// Returns the metadata for the types in `binary`.
    fn reflect(&self, binary: &Utf8Path) -> Result<AssemblyMetadata, ReflectError>;
}

/// The types in a test binary, in metadata order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssemblyMetadata {
    /// The types.
    #[serde(default)]
    pub types: Vec<TypeMetadata>,
}

/// A single type.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TypeMetadata {
    /// The namespace-qualified name of the type.
    pub full_name: String,

    /// The attributes applied to the type.
    #[serde(default)]
    pub attributes: Vec<AttributeMetadata>,

    /// The methods declared on the type, in metadata order.
    #[serde(default)]
    pub methods: Vec<MethodMetadata>,

    /// Set if the reflector could not load the type's members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TypeMetadata {
    /// Returns the type's name without its namespace or enclosing types.
    pub fn short_name(&self) -> &str {
        self.full_name
            .rsplit(['.', '+'])
            .next()
            .unwrap_or(&self.full_name)
    }
}

/// A single method.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MethodMetadata {
    /// The method name.
    pub name: String,

    /// The attributes applied to the method, in metadata order.
    #[serde(default)]
    pub attributes: Vec<AttributeMetadata>,
}

/// An attribute instance.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AttributeMetadata {
    /// The attribute's type name, possibly namespace-qualified.
    pub name: String,

    /// The constructor arguments, rendered as strings.
    #[serde(default)]
    pub args: Vec<String>,
}
