use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, TimeZone, Utc};

use crate::value::{Token, Value};

/// Capability of producing a [`Value`] snapshot
///
/// Implemented for the standard library's primitives and collections, and
/// derivable for user types with `#[derive(Inspect)]`.
pub trait Inspect {
    /// Describe this value's shape
    fn inspect_value(&self) -> Value;

    /// Substitute representation used in place of [`Inspect::inspect`]
    ///
    /// Returning `Some` short-circuits inspection of this value; the
    /// returned value goes through normal canonicalization but is not asked
    /// for another override.
    fn custom_representation(&self) -> Option<Value> {
        None
    }
}

/// Snapshot a value, honouring its custom representation if it has one
pub fn snapshot<T: Inspect + ?Sized>(value: &T) -> Value {
    value
        .custom_representation()
        .unwrap_or_else(|| value.inspect_value())
}

thread_local! {
    static INSPECTING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Removes an address from the inspection path when dropped, even on unwind
struct PathEntry(usize);

impl Drop for PathEntry {
    fn drop(&mut self) {
        let _ = INSPECTING.try_with(|path| path.borrow_mut().remove(&self.0));
    }
}

/// Inspect the target of a shared pointer, guarding against cycles
///
/// `address` is pushed onto the current inspection path for the duration
/// of the call; meeting it again yields [`Value::Circular`].
fn guarded<T: Inspect + ?Sized>(address: usize, target: &T) -> Value {
    let entered = INSPECTING.with(|path| path.borrow_mut().insert(address));
    if !entered {
        return Value::Circular;
    }

    let _entry = PathEntry(address);
    Value::boxed(snapshot(target))
}

macro_rules! inspect_number {
    ($($ty:ty),*) => {
        $(
            impl Inspect for $ty {
                fn inspect_value(&self) -> Value {
                    Value::Number((*self).into())
                }
            }
        )*
    };
}

inspect_number!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl Inspect for f32 {
    fn inspect_value(&self) -> Value {
        Value::from_f64(f64::from(*self))
    }
}

impl Inspect for f64 {
    fn inspect_value(&self) -> Value {
        Value::from_f64(*self)
    }
}

impl Inspect for bool {
    fn inspect_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Inspect for char {
    fn inspect_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl Inspect for str {
    fn inspect_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl Inspect for String {
    fn inspect_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl Inspect for Cow<'_, str> {
    fn inspect_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl Inspect for () {
    fn inspect_value(&self) -> Value {
        Value::Null
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn inspect_value(&self) -> Value {
        match self {
            Some(value) => snapshot(value),
            None => Value::Null,
        }
    }
}

impl<T: Inspect + ?Sized> Inspect for &T {
    fn inspect_value(&self) -> Value {
        snapshot(*self)
    }
}

impl<T: Inspect + ?Sized> Inspect for Box<T> {
    fn inspect_value(&self) -> Value {
        Value::boxed(snapshot(&**self))
    }
}

impl<T: Inspect + ?Sized> Inspect for Rc<T> {
    fn inspect_value(&self) -> Value {
        guarded(Rc::as_ptr(self) as *const () as usize, &**self)
    }
}

impl<T: Inspect + ?Sized> Inspect for Arc<T> {
    fn inspect_value(&self) -> Value {
        guarded(Arc::as_ptr(self) as *const () as usize, &**self)
    }
}

impl<T: Inspect> Inspect for std::rc::Weak<T> {
    fn inspect_value(&self) -> Value {
        self.upgrade().map_or(Value::Null, |strong| strong.inspect_value())
    }
}

impl<T: Inspect> Inspect for std::sync::Weak<T> {
    fn inspect_value(&self) -> Value {
        self.upgrade().map_or(Value::Null, |strong| strong.inspect_value())
    }
}

impl<T: Inspect + ?Sized> Inspect for RefCell<T> {
    fn inspect_value(&self) -> Value {
        // Mutably borrowed elsewhere: nothing consistent to show
        match self.try_borrow() {
            Ok(inner) => snapshot(&*inner),
            Err(_) => Value::Null,
        }
    }
}

impl<T: Inspect> Inspect for [T] {
    fn inspect_value(&self) -> Value {
        Value::Sequence(self.iter().map(snapshot).collect())
    }
}

impl<T: Inspect, const N: usize> Inspect for [T; N] {
    fn inspect_value(&self) -> Value {
        self.as_slice().inspect_value()
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn inspect_value(&self) -> Value {
        self.as_slice().inspect_value()
    }
}

impl<T: Inspect> Inspect for VecDeque<T> {
    fn inspect_value(&self) -> Value {
        Value::Sequence(self.iter().map(snapshot).collect())
    }
}

impl<T: Inspect, S> Inspect for HashSet<T, S> {
    fn inspect_value(&self) -> Value {
        Value::Set(self.iter().map(snapshot).collect())
    }
}

impl<T: Inspect> Inspect for BTreeSet<T> {
    fn inspect_value(&self) -> Value {
        Value::Set(self.iter().map(snapshot).collect())
    }
}

impl<K: Display, V: Inspect, S> Inspect for HashMap<K, V, S> {
    fn inspect_value(&self) -> Value {
        Value::record(self.iter().map(|(k, v)| (k.to_string(), snapshot(v))))
    }
}

impl<K: Display, V: Inspect> Inspect for BTreeMap<K, V> {
    fn inspect_value(&self) -> Value {
        Value::record(self.iter().map(|(k, v)| (k.to_string(), snapshot(v))))
    }
}

macro_rules! inspect_tuple {
    ($($name:ident),+) => {
        impl<$($name: Inspect),+> Inspect for ($($name,)+) {
            #[allow(non_snake_case)]
            fn inspect_value(&self) -> Value {
                let ($($name,)+) = self;
                Value::Sequence(vec![$(snapshot($name)),+])
            }
        }
    };
}

inspect_tuple!(A);
inspect_tuple!(A, B);
inspect_tuple!(A, B, C);
inspect_tuple!(A, B, C, D);
inspect_tuple!(A, B, C, D, E);
inspect_tuple!(A, B, C, D, E, F);

impl<Tz: TimeZone> Inspect for DateTime<Tz> {
    fn inspect_value(&self) -> Value {
        Value::Date(self.with_timezone(&Utc))
    }
}

impl Inspect for SystemTime {
    fn inspect_value(&self) -> Value {
        Value::Date(DateTime::<Utc>::from(*self))
    }
}

impl Inspect for regex::Regex {
    fn inspect_value(&self) -> Value {
        Value::Pattern(format!("/{}/", self.as_str()))
    }
}

impl Inspect for Token {
    fn inspect_value(&self) -> Value {
        Value::Token(self.description().map(str::to_string))
    }
}

impl Inspect for Value {
    fn inspect_value(&self) -> Value {
        self.clone()
    }
}

impl Inspect for serde_json::Value {
    fn inspect_value(&self) -> Value {
        use serde_json::Value as Json;

        match self {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.clone()),
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(items) => Value::Sequence(items.iter().map(snapshot).collect()),
            Json::Object(map) => Value::record(map.iter().map(|(k, v)| (k.clone(), snapshot(v)))),
        }
    }
}
