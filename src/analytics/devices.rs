//! Repeat-visitor detection keyed by device id

use std::collections::HashSet;

use crate::models::VisitEvent;

/// Distinct and repeated device ids over one set of visits.
///
/// The index only describes the visits it was built from. Callers build a fresh
/// one for every set they classify.
#[derive(Debug, Default)]
pub struct DeviceIndex<'a> {
    seen: HashSet<&'a str>,
    repeated: HashSet<&'a str>,
}

impl<'a> DeviceIndex<'a> {
    pub fn build<I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a VisitEvent>,
    {
        let mut index = Self::default();
        for device_id in events.into_iter().filter_map(VisitEvent::device_id) {
            if !index.seen.insert(device_id) {
                index.repeated.insert(device_id);
            }
        }
        index
    }

    /// Number of distinct non-empty device ids
    pub fn unique(&self) -> usize {
        self.seen.len()
    }

    /// Number of device ids seen more than once
    pub fn repeated_devices(&self) -> usize {
        self.repeated.len()
    }

    pub fn is_repeated(&self, event: &VisitEvent) -> bool {
        event
            .device_id()
            .is_some_and(|id| self.repeated.contains(id))
    }
}
