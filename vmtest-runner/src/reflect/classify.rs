// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use vmtest_metadata::TestCategory;

/// The role a type or method plays in a test binary.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TestRole {
    /// A type containing tests.
    Class,

    /// A method run before the tests in its class.
    Setup,

    /// A test method.
    Test,

    /// A method run after the tests in its class.
    Cleanup,
}

impl TestRole {
    /// The roles a method can have, in the order methods are emitted within a class.
    pub const METHOD_ROLES: [Self; 3] = [Self::Setup, Self::Test, Self::Cleanup];

    /// Returns the test category for a method role, or `None` for [`TestRole::Class`].
    pub fn category(self) -> Option<TestCategory> {
        match self {
            Self::Class => None,
            Self::Setup => Some(TestCategory::Setup),
            Self::Test => Some(TestCategory::Test),
            Self::Cleanup => Some(TestCategory::Cleanup),
        }
    }
}

/// What an attribute contributes to the type or method it is applied to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AttributeRole {
    /// The attribute assigns a role.
    Role(TestRole),

    /// The attribute supplies a parameter set. Implies [`TestRole::Test`], and contributes one tag.
    DataRow,
}

impl AttributeRole {
    /// Returns the role this attribute implies.
    pub fn implied_role(self) -> TestRole {
        match self {
            Self::Role(role) => role,
            Self::DataRow => TestRole::Test,
        }
    }
}

/// Classifies an attribute by its type name.
///
/// The name may be namespace-qualified, and may carry the `Attribute` suffix. Returns `None` for
/// attributes that play no part in testing.
pub fn classify_attribute(name: &str) -> Option<AttributeRole> {
    let name = name.rsplit('.').next().unwrap_or(name);
    let name = name.strip_suffix("Attribute").unwrap_or(name);
    let role = match name {
        "TestClass" => AttributeRole::Role(TestRole::Class),
        "Setup" => AttributeRole::Role(TestRole::Setup),
        "TestMethod" => AttributeRole::Role(TestRole::Test),
        "Cleanup" => AttributeRole::Role(TestRole::Cleanup),
        "DataRow" => AttributeRole::DataRow,
        _ => return None,
    };
    Some(role)
}
