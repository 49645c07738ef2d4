// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod device;
pub mod geofence;
pub mod track;
pub mod track_history;

use crate::engine::{EventKind, HandlerId, MapEngine};

/// Event registrations owned by one layer manager.
///
/// Each entry maps the engine's registration token to the action the manager
/// wants when it fires. `detach_all` must run before a manager registers again.
#[derive(Debug)]
pub struct HandlerSet<A> {
    entries: Vec<(HandlerId, A)>,
}

impl<A> Default for HandlerSet<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A: Copy> HandlerSet<A> {
    pub fn register(&mut self, engine: &mut dyn MapEngine, kind: EventKind, layer: &str, action: A) {
        let id = engine.on(kind, layer);
        self.entries.push((id, action));
    }

    pub fn detach_all(&mut self, engine: &mut dyn MapEngine) {
        for (id, _) in self.entries.drain(..) {
            engine.off(id);
        }
    }

    pub fn action(&self, handler: HandlerId) -> Option<A> {
        self.entries
            .iter()
            .find(|(id, _)| *id == handler)
            .map(|(_, action)| *action)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Halo drawn behind map text.
pub(crate) fn halo_color(dark: bool) -> &'static str {
    if dark {
        "#111827"
    } else {
        "#ffffff"
    }
}

pub(crate) fn text_color(dark: bool) -> &'static str {
    if dark {
        "#f9fafb"
    } else {
        "#111827"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessEngine;

    #[test]
    fn test_detach_removes_engine_registrations() {
        let mut engine = HeadlessEngine::new();
        let mut set = HandlerSet::default();
        set.register(&mut engine, EventKind::Click, "a", 1u8);
        set.register(&mut engine, EventKind::MouseEnter, "a", 2u8);

        let click = engine.handlers_for(EventKind::Click, "a")[0];
        assert_eq!(set.action(click), Some(1));

        set.detach_all(&mut engine);
        assert!(set.is_empty());
        assert_eq!(engine.handler_count(), 0);
        assert_eq!(set.action(click), None);
    }
}
