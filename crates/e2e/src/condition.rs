//! Poll conditions: a description plus a side-effect-free predicate

use std::fmt;

use serde_json::Value;

use crate::assertions::values_equal;
use crate::response::Observation;

pub struct Condition<T: ?Sized> {
    description: String,
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: ?Sized> Condition<T> {
    pub fn new(
        description: impl Into<String>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Replace the description shown in timeout errors
    pub fn described_as(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// What the condition waits for, as shown in timeout errors
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_met(&self, value: &T) -> bool {
        (self.predicate)(value)
    }
}

impl<T: ?Sized> fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<T> Condition<T>
where
    T: PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub fn equal_to(expected: T) -> Self {
        let description = format!("value == {expected:?}");
        Self::new(description, move |actual: &T| *actual == expected)
    }
}

impl<T> Condition<T>
where
    T: PartialOrd + fmt::Debug + Send + Sync + 'static,
{
    /// Half open: `min` satisfies the range, `max` does not
    pub fn in_range(min: T, max: T) -> Self {
        let description = format!("{min:?} <= value < {max:?}");
        Self::new(description, move |actual: &T| *actual >= min && *actual < max)
    }

    pub fn at_least(threshold: T) -> Self {
        let description = format!("value >= {threshold:?}");
        Self::new(description, move |actual: &T| *actual >= threshold)
    }
}

impl Condition<bool> {
    pub fn is_true() -> Self {
        Self::new("flag is true", |actual: &bool| *actual)
    }

    pub fn is_false() -> Self {
        Self::new("flag is false", |actual: &bool| !*actual)
    }
}

impl Condition<String> {
    pub fn contains_text(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(format!("text contains {needle:?}"), move |actual: &String| {
            actual.contains(&needle)
        })
    }

    pub fn lacks_text(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(format!("text does not contain {needle:?}"), move |actual: &String| {
            !actual.contains(&needle)
        })
    }
}

impl Condition<Observation> {
    pub fn status_is(expected: u16) -> Self {
        Self::new(format!("HTTP status {expected}"), move |obs: &Observation| {
            obs.status_code() == expected
        })
    }

    pub fn body_contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(format!("response body contains {needle:?}"), move |obs: &Observation| {
            obs.text().contains(needle.as_str())
        })
    }

    pub fn body_lacks(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(
            format!("response body does not contain {needle:?}"),
            move |obs: &Observation| !obs.text().contains(needle.as_str()),
        )
    }
}

impl Condition<Value> {
    /// JSON equality on an already extracted value; numbers compare by value.
    /// Extraction happens in the observation, so a missing path or a
    /// malformed body aborts the poll instead of being retried.
    pub fn json_equals(expected: Value) -> Self {
        Self::new(format!("value == {expected}"), move |actual: &Value| {
            values_equal(actual, &expected)
        })
    }
}
