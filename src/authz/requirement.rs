use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One capability a route may ask for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Requirement {
    Permission(String),
    Role(String),
    /// Satisfied by a role or a permission of that name.
    RoleOrPermission(String),
}

impl Requirement {
    pub fn name(&self) -> &str {
        match self {
            Requirement::Permission(name) | Requirement::Role(name) | Requirement::RoleOrPermission(name) => name,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Permission(name) => write!(f, "permission:{}", name),
            Requirement::Role(name) => write!(f, "role:{}", name),
            Requirement::RoleOrPermission(name) => write!(f, "role_or_permission:{}", name),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequirementParseError {
    #[error("unknown requirement kind '{0}'")]
    UnknownKind(String),

    #[error("requirement '{0}' names nothing")]
    Empty(String),
}

/// Ordered, de-duplicated disjunction of requirements: any one satisfied
/// grants access. Empty means any authenticated principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements(Vec<Requirement>);

impl Requirements {
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// `"view users|edit users"` or `"view users,edit users"`.
    pub fn permissions(names: &str) -> Self {
        Self::from_names(split_names(names), Requirement::Permission)
    }

    pub fn roles(names: &str) -> Self {
        Self::from_names(split_names(names), Requirement::Role)
    }

    pub fn role_or_permission(names: &str) -> Self {
        Self::from_names(split_names(names), Requirement::RoleOrPermission)
    }

    pub fn from_names<I, S>(names: I, kind: fn(String) -> Requirement) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::default();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() {
                out.push(kind(name.to_string()));
            }
        }
        out
    }

    pub fn push(&mut self, requirement: Requirement) {
        if !self.0.contains(&requirement) {
            self.0.push(requirement);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.0.iter()
    }
}

fn split_names(names: &str) -> impl Iterator<Item = &str> {
    names.split([',', '|']).map(str::trim).filter(|n| !n.is_empty())
}

impl From<Requirement> for Requirements {
    fn from(requirement: Requirement) -> Self {
        Self(vec![requirement])
    }
}

impl From<Vec<Requirement>> for Requirements {
    fn from(requirements: Vec<Requirement>) -> Self {
        let mut out = Self::default();
        for requirement in requirements {
            out.push(requirement);
        }
        out
    }
}

impl From<&[Requirement]> for Requirements {
    fn from(requirements: &[Requirement]) -> Self {
        requirements.to_vec().into()
    }
}

/// Middleware-style spec: `kind:names`, where kind is `permission`, `role`
/// or `role_or_permission` and names are comma or pipe separated. A bare
/// list without a kind is read as permissions.
impl FromStr for Requirements {
    type Err = RequirementParseError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (kind, names) = match spec.split_once(':') {
            Some((kind, names)) => (kind.trim(), names),
            None => ("permission", spec),
        };
        let requirements = match kind {
            "permission" => Self::permissions(names),
            "role" => Self::roles(names),
            "role_or_permission" => Self::role_or_permission(names),
            other => return Err(RequirementParseError::UnknownKind(other.to_string())),
        };
        if requirements.is_empty() {
            return Err(RequirementParseError::Empty(spec.to_string()));
        }
        Ok(requirements)
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" | "))
    }
}
