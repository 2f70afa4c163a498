//! Process-wide lookup of driver instances by name, for collaborators that
//! live outside the driver and cannot be handed a reference.
//!
//! Entries are weak: registering never keeps an instance alive, and a dropped
//! instance simply stops resolving.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};
use once_cell::sync::Lazy;

use crate::sync::lock;

type Entry = Weak<dyn Any + Send + Sync>;

static INSTANCES: Lazy<Mutex<HashMap<String, Entry>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Publish `instance` under `name`, replacing any previous entry.
pub fn register_instance<T: Any + Send + Sync>(name: &str, instance: &Arc<T>) {
  let erased: Arc<dyn Any + Send + Sync> = instance.clone();
  let entry = Arc::downgrade(&erased);
  if lock(&*INSTANCES).insert(name.to_owned(), entry).is_some() {
    warn!("registry: replaced instance {name}");
  } else {
    debug!("registry: registered {name}");
  }
}

/// Resolve `name` to a live instance of type `T`.
pub fn lookup_instance<T: Any + Send + Sync>(name: &str) -> Option<Arc<T>> {
  let entry = lock(&*INSTANCES).get(name)?.upgrade()?;
  entry.downcast::<T>().ok()
}

/// Remove `name`. Returns `true` if it was registered.
pub fn unregister_instance(name: &str) -> bool {
  lock(&*INSTANCES).remove(name).is_some()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::*;

  #[test]
  fn lookup_by_name_and_type() {
    let (ts, _) = harness(test_config());
    register_instance("registry-test-ts", &ts);

    let found = lookup_instance::<TestTs>("registry-test-ts").unwrap();
    assert!(Arc::ptr_eq(&found, &ts));
    assert!(lookup_instance::<u32>("registry-test-ts").is_none());

    assert!(unregister_instance("registry-test-ts"));
    assert!(!unregister_instance("registry-test-ts"));
    assert!(lookup_instance::<TestTs>("registry-test-ts").is_none());
  }

  #[test]
  fn dropped_instances_stop_resolving() {
    let value = Arc::new(7u32);
    register_instance("registry-test-dropped", &value);
    assert_eq!(lookup_instance::<u32>("registry-test-dropped").as_deref(), Some(&7));

    drop(value);
    assert!(lookup_instance::<u32>("registry-test-dropped").is_none());
    unregister_instance("registry-test-dropped");
  }
}
