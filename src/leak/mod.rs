//! Tracking concurrent activities and detecting leaks.
//!
//! Threads started through [`spawn`] are recorded in a process-wide
//! registry together with the place they were spawned from, and removed when
//! their closure returns or panics. [`activities`] snapshots the registry as
//! a [`Value`], so leak detection is an ordinary polled assertion:
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_poll::leak::{self, have_leaked};
//! use testkit_poll::eventually_fn;
//!
//! let before = leak::activities();
//! let handle = leak::spawn("worker", || std::thread::sleep(Duration::from_millis(20))).unwrap();
//!
//! eventually_fn(leak::activities).should_not(have_leaked(before));
//! handle.join().unwrap();
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::matcher::Matcher;
use crate::value::{format, Value};

/// A tracked activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    id: u64,
    name: String,
    origin: String,
}

impl Activity {
    /// Registry-wide unique id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name given at spawn time.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `file:line:column` of the spawn call.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::Map(Some(fields)) = value else {
            return None;
        };
        let id = match fields.get("id")? {
            Value::Uint(id) => *id,
            Value::Int(id) => u64::try_from(*id).ok()?,
            _ => return None,
        };
        Some(Self {
            id,
            name: fields.get("name")?.as_str()?.to_string(),
            origin: fields.get("origin")?.as_str()?.to_string(),
        })
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] spawned at {}", self.name, self.id, self.origin)
    }
}

impl From<Activity> for Value {
    fn from(activity: Activity) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), Value::Uint(activity.id));
        fields.insert("name".to_string(), Value::Str(activity.name));
        fields.insert("origin".to_string(), Value::Str(activity.origin));
        Value::Map(Some(fields))
    }
}

fn registry() -> &'static Mutex<BTreeMap<u64, Activity>> {
    static REGISTRY: OnceLock<Mutex<BTreeMap<u64, Activity>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(BTreeMap::new()))
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Removes an activity from the registry when dropped.
struct Registration(u64);

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(activity) = registry().lock().remove(&self.0) {
            debug!(id = activity.id, name = %activity.name, "activity finished");
        }
    }
}

/// Spawn a tracked thread.
///
/// The activity is registered before the thread starts, so a snapshot taken
/// right after `spawn` returns already contains it.
///
/// # Errors
///
/// Returns the OS error if the thread could not be created.
#[track_caller]
pub fn spawn<F, T>(name: impl Into<String>, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();
    let origin = Location::caller().to_string();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

    registry().lock().insert(
        id,
        Activity {
            id,
            name: name.clone(),
            origin: origin.clone(),
        },
    );
    let registration = Registration(id);
    debug!(id, name = %name, origin = %origin, "activity spawned");

    thread::Builder::new().name(name).spawn(move || {
        let _registration = registration;
        f()
    })
}

/// The activities running right now, oldest first.
#[must_use]
pub fn snapshot() -> Vec<Activity> {
    registry().lock().values().cloned().collect()
}

/// The activities running right now, as a list value.
///
/// Usable directly as a polling source.
#[must_use]
pub fn activities() -> Value {
    Value::from(snapshot())
}

/// Succeeds when the actual snapshot contains activities that are not in
/// `before`.
///
/// Use it negated: `eventually_fn(activities).should_not(have_leaked(before))`.
pub fn have_leaked(before: impl Into<Value>) -> HaveLeaked {
    HaveLeaked {
        before: before.into(),
        ignored: Vec::new(),
    }
}

/// Matcher returned by [`have_leaked`].
#[derive(Debug, Clone)]
pub struct HaveLeaked {
    before: Value,
    ignored: Vec<String>,
}

impl HaveLeaked {
    /// Never count activities with this name as leaked.
    #[must_use]
    pub fn ignoring(mut self, name: impl Into<String>) -> Self {
        self.ignored.push(name.into());
        self
    }

    fn parse(value: &Value, what: &str) -> Result<Vec<Activity>> {
        let invalid = || {
            Error::type_mismatch(
                "HaveLeaked",
                format!("{what} to be an activity snapshot"),
                format::object(value, 1),
            )
        };
        match value {
            Value::List(items) => items
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|item| Activity::from_value(item).ok_or_else(invalid))
                .collect(),
            _ => Err(invalid()),
        }
    }

    fn leaked(&self, actual: &Value) -> Result<Vec<Activity>> {
        let before: BTreeSet<u64> = Self::parse(&self.before, "the baseline")?
            .iter()
            .map(Activity::id)
            .collect();
        Ok(Self::parse(actual, "the actual value")?
            .into_iter()
            .filter(|activity| !before.contains(&activity.id))
            .filter(|activity| !self.ignored.iter().any(|name| *name == activity.name))
            .collect())
    }

    fn listing(&self, actual: &Value) -> String {
        match self.leaked(actual) {
            Ok(leaked) => leaked
                .iter()
                .map(|activity| format!("    {activity}"))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(err) => err.to_string(),
        }
    }
}

impl Matcher for HaveLeaked {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(!self.leaked(actual)?.is_empty())
    }

    fn failure_message(&self, _actual: &Value) -> String {
        "Expected activities to have leaked, but none did".to_string()
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format!("Expected no leaked activities, found:\n{}", self.listing(actual))
    }
}
