//! Property map diffing.

use std::collections::BTreeMap;

use crate::events::ChangeEvent;

/// Change events turning `old` into `new`, in key order.
pub fn diff(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (key, value) in new {
        match old.get(key) {
            None => events.push(ChangeEvent::added(key.as_str(), value.as_str())),
            Some(previous) if previous != value => {
                events.push(ChangeEvent::modified(key.as_str(), previous.as_str(), value.as_str()))
            }
            Some(_) => {}
        }
    }
    for (key, value) in old {
        if !new.contains_key(key) {
            events.push(ChangeEvent::deleted(key.as_str(), value.as_str()));
        }
    }

    events
}
