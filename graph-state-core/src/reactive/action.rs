//! Draft state actions.
//!
//! A write is expressed either as a replacement value or as a function of the
//! previous value. Either way it is normalized to a plain value before it is
//! compared or stored.

use std::fmt;

use crate::error::GraphError;

/// A value or value-transforming function used to express a write.
pub enum Action<T> {
    /// Replace the current value.
    Value(T),

    /// Compute the next value from the current one.
    Update(Box<dyn FnOnce(&T) -> T + Send>),
}

impl<T> Action<T> {
    /// Build an action from a function of the previous value.
    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        Self::Update(Box::new(f))
    }

    /// Normalize against the current value.
    ///
    /// A replacement value ignores the current state, so it can overwrite a
    /// failure. An update function needs a previous value and propagates the
    /// failure instead.
    pub fn apply(self, current: Result<T, GraphError>) -> Result<T, GraphError> {
        self.apply_with(|| current)
    }

    /// Like [`Action::apply`], but the current value is only read when an
    /// update function needs it.
    pub fn apply_with<F>(self, current: F) -> Result<T, GraphError>
    where
        F: FnOnce() -> Result<T, GraphError>,
    {
        match self {
            Self::Value(value) => Ok(value),
            Self::Update(f) => current().map(|previous| f(&previous)),
        }
    }
}

impl<T> From<T> for Action<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Update(_) => f.write_str("Update(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_replaces_current() {
        let action: Action<i32> = 5.into();
        assert_eq!(action.apply(Ok(1)).unwrap(), 5);
    }

    #[test]
    fn value_overwrites_failure() {
        let action = Action::Value(5);
        assert_eq!(action.apply(Err(GraphError::msg("bad"))).unwrap(), 5);
    }

    #[test]
    fn update_uses_previous_value() {
        let action = Action::update(|v: &i32| v + 1);
        assert_eq!(action.apply(Ok(41)).unwrap(), 42);
    }

    #[test]
    fn value_never_reads_current() {
        let action = Action::Value(5);
        let value = action.apply_with(|| panic!("current value read for a replacement"));
        assert_eq!(value.unwrap(), 5);
    }

    #[test]
    fn update_propagates_failure() {
        let action = Action::update(|v: &i32| v + 1);
        assert!(action.apply(Err(GraphError::msg("bad"))).is_err());
    }
}
