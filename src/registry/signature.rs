//! Channel signatures and registry scopes.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Type descriptor of a channel or slot: `fn(&A) -> R`.
///
/// Equality is decided by `TypeId`; the type names are only carried for
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    args: TypeId,
    output: TypeId,
    args_name: &'static str,
    output_name: &'static str,
}

impl Signature {
    /// Signature of callables taking `&A` and returning `R`.
    #[must_use]
    pub fn of<A: 'static, R: 'static>() -> Self {
        Self {
            args: TypeId::of::<A>(),
            output: TypeId::of::<R>(),
            args_name: type_name::<A>(),
            output_name: type_name::<R>(),
        }
    }

    /// Whether this signature describes `fn(&A) -> R`.
    #[must_use]
    pub fn matches<A: 'static, R: 'static>(&self) -> bool {
        self.args == TypeId::of::<A>() && self.output == TypeId::of::<R>()
    }

    /// Readable name of the argument type.
    #[must_use]
    pub const fn args_name(&self) -> &'static str {
        self.args_name
    }

    /// Readable name of the result type.
    #[must_use]
    pub const fn output_name(&self) -> &'static str {
        self.output_name
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.args == other.args && self.output == other.output
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.args.hash(state);
        self.output.hash(state);
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(&{}) -> {}", self.args_name, self.output_name)
    }
}

/// Which registry a channel lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Private to one `EventHub`.
    Instance,
    /// Shared by every hub in the process.
    Process,
}

impl Scope {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Process => "process",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
