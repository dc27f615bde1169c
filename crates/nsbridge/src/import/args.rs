//! Import call arguments
//!
//! The replacement import entry point takes exactly what the host's original
//! one takes: `(name, globals=None, locals=None, fromlist=(), level=0)`.
//! Only the name and the from-list matter to the bridge; globals, locals and
//! level are validated and forwarded untouched.

use crate::host::{HostError, HostValue};

const MAX_ARGS: usize = 5;
const FROM_LIST_INDEX: usize = 3;
const LEVEL_INDEX: usize = 4;

/// Parsed positional arguments of an import call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCall {
    /// Requested dotted name (may be empty for relative imports)
    pub name: String,
    /// Requested sub-names; `None` when absent, none, or an empty tuple
    pub from_list: Option<Vec<String>>,
    /// Relative-import level
    pub level: i64,
}

impl ImportCall {
    /// Validate and parse an argument list
    ///
    /// # Errors
    /// A `Type` host error for a wrong argument count, a non-string name, a
    /// from-list that is not a tuple of strings, or a non-integer level.
    pub fn parse(args: &[HostValue]) -> Result<Self, HostError> {
        if args.is_empty() || args.len() > MAX_ARGS {
            return Err(HostError::type_error(format!(
                "__import__() takes from 1 to {} positional arguments but {} were given",
                MAX_ARGS,
                args.len()
            )));
        }

        let name = args[0].as_str().ok_or_else(|| {
            HostError::type_error(format!(
                "__import__() argument 1 must be str, not {}",
                args[0].type_name()
            ))
        })?;

        let from_list = match args.get(FROM_LIST_INDEX) {
            None | Some(HostValue::None) => None,
            Some(HostValue::Tuple(items)) if items.is_empty() => None,
            Some(HostValue::Tuple(items)) => Some(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            HostError::type_error(format!(
                                "Item in from list must be str, not {}",
                                item.type_name()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(other) => {
                return Err(HostError::type_error(format!(
                    "from list must be a tuple, not {}",
                    other.type_name()
                )))
            }
        };

        let level = match args.get(LEVEL_INDEX) {
            None | Some(HostValue::None) => 0,
            Some(HostValue::Int(level)) => *level,
            Some(other) => {
                return Err(HostError::type_error(format!(
                    "level must be an int, not {}",
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            name: name.to_string(),
            from_list,
            level,
        })
    }

    /// Check if sub-names were requested
    pub fn has_from_list(&self) -> bool {
        self.from_list.is_some()
    }

    /// Check if this is a `from X import *` request
    ///
    /// True only when the from-list holds exactly one item equal to `marker`.
    pub fn is_wildcard(&self, marker: &str) -> bool {
        matches!(self.from_list.as_deref(), Some([only]) if only == marker)
    }
}
