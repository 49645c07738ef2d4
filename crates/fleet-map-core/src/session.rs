// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! The live map session: owns the engine and keeps it in sync with the fleet.
//!
//! Lifecycle: `Uninitialized → Created → Ready ⇄ Restyling → Destroyed`.
//! The host forwards engine events to [`MapSession::handle_event`], calls the
//! `sync_*` methods whenever data changes, and schedules the [`DeferredTask`]s
//! returned by [`MapSession::select_device`].

use log::{debug, info, warn};
use std::time::Duration;

use crate::config::{MapConfig, Theme};
use crate::engine::{
    CameraOptions, Control, Cursor, EngineError, EngineEvent, MapEngine, RenderedFeature,
};
use crate::features::{build_device_features, find_feature, DeviceFeature};
use crate::layers::device::{self, DeviceInteraction, DeviceLayer};
use crate::layers::geofence;
use crate::layers::track::{self, DeviceTrack};
use crate::layers::track_history::{AddressRequest, ResolvedAddress, TrackHistoryLayer};
use crate::model::{DeviceId, FleetSnapshot, TrackPoint};
use crate::popup::PopupController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    /// Engine exists, waiting for its first load.
    Created,
    Ready,
    /// Style swap in flight; custom layers are gone until it loads.
    Restyling,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    OpenDevicePopup(DeviceId),
}

/// Work the host must hand back to [`MapSession::run_deferred`] after `delay`.
/// Tasks from superseded selections are ignored when they fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredTask {
    pub delay: Duration,
    pub action: DeferredAction,
    generation: u64,
}

pub struct MapSession<E: MapEngine> {
    config: MapConfig,
    theme: Theme,
    lifecycle: Lifecycle,
    engine: Option<E>,
    devices: DeviceLayer,
    history: TrackHistoryLayer,
    tracks: Vec<DeviceTrack>,
    popup: PopupController,
    features: Vec<DeviceFeature>,
    focused_device: Option<DeviceId>,
    has_fit_bounds_once: bool,
    selection_generation: u64,
}

impl<E: MapEngine> MapSession<E> {
    pub fn new(config: MapConfig, theme: Theme) -> Self {
        Self {
            config,
            theme,
            lifecycle: Lifecycle::Uninitialized,
            engine: None,
            devices: DeviceLayer::new(),
            history: TrackHistoryLayer::new(),
            tracks: Vec::new(),
            popup: PopupController::new(),
            features: Vec::new(),
            focused_device: None,
            has_fit_bounds_once: false,
            selection_generation: 0,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The engine, once mounted. This is the map handle handed to screens
    /// that draw their own overlays.
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn focused_device(&self) -> Option<DeviceId> {
        self.focused_device
    }

    pub fn has_fit_bounds_once(&self) -> bool {
        self.has_fit_bounds_once
    }

    /// Features pushed by the last device sync.
    pub fn features(&self) -> &[DeviceFeature] {
        &self.features
    }

    pub fn popup(&self) -> &PopupController {
        &self.popup
    }

    /// Creates the engine with `factory`, which receives the config and the
    /// style URL of the current theme. Returns `false` if an engine already
    /// exists.
    pub fn mount<F>(&mut self, factory: F) -> bool
    where
        F: FnOnce(&MapConfig, &str) -> E,
    {
        if self.engine.is_some() {
            return false;
        }
        let mut engine = factory(&self.config, self.config.style_url(self.theme));
        for control in [Control::Navigation, Control::Fullscreen, Control::Attribution] {
            engine.add_control(control);
        }
        self.engine = Some(engine);
        self.has_fit_bounds_once = false;
        self.lifecycle = Lifecycle::Created;
        info!("Map engine created — theme={:?}", self.theme);
        true
    }

    pub fn handle_event(&mut self, event: EngineEvent, data: &dyn FleetSnapshot) {
        match event {
            EngineEvent::Load => {
                if self.lifecycle == Lifecycle::Created {
                    self.rebuild(data);
                    info!("Map ready");
                }
            }
            EngineEvent::StyleLoad => {
                if self.lifecycle == Lifecycle::Restyling {
                    self.rebuild(data);
                    info!("Map restyled — theme={:?}", self.theme);
                }
            }
            EngineEvent::Layer { handler, feature } => {
                if self.lifecycle != Lifecycle::Ready {
                    return;
                }
                if let Some(action) = self.devices.interaction(handler) {
                    if let Err(e) = self.device_interaction(action, feature.as_ref()) {
                        warn!("Device interaction failed — action={:?} error={}", action, e);
                    }
                }
            }
            EngineEvent::PopupClosed(handle) => {
                let popup_device = self.popup.device_id();
                if self.popup.forget(handle)
                    && popup_device.is_some()
                    && popup_device == self.focused_device
                {
                    self.focused_device = None;
                    if let Some(engine) = self.engine.as_mut() {
                        if let Err(e) = device::set_label_visibility(engine, None) {
                            warn!("Restoring device labels failed — error={}", e);
                        }
                    }
                }
            }
        }
    }

    /// Rebuilds device features from `data` and pushes them. While a device
    /// is focused with its popup open, the popup is refreshed in place and
    /// the camera pans along when the device moved.
    pub fn sync_devices(&mut self, data: &dyn FleetSnapshot) {
        let features = build_device_features(data.devices(), data.positions());
        let previous = std::mem::replace(&mut self.features, features);

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let engine: &mut dyn MapEngine = engine;

        match device::update_source_data(
            engine,
            &self.features,
            &mut self.has_fit_bounds_once,
            &self.config,
        ) {
            Ok(false) => {
                debug!("Device source not ready; skipped {} features", self.features.len());
                return;
            }
            Ok(true) => {}
            Err(e) => {
                warn!("Pushing device features failed — error={}", e);
                return;
            }
        }

        let Some(focused) = self.focused_device else {
            return;
        };
        if self.popup.device_id() != Some(focused) {
            return;
        }
        let Some(feature) = find_feature(&self.features, focused) else {
            return;
        };
        self.popup.update_content(engine, feature);

        let moved = find_feature(&previous, focused)
            .map_or(true, |old| old.coordinates() != feature.coordinates());
        if moved {
            engine.ease_to(CameraOptions::center(feature.coordinates()));
            debug!("Following device {} to {:?}", focused, feature.coordinates());
        }
    }

    pub fn sync_geofences(&mut self, data: &dyn FleetSnapshot) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match geofence::update(engine, data.geofences()) {
            Ok(true) => debug!("Geofences updated — count={}", data.geofences().len()),
            Ok(false) => {}
            Err(e) => warn!("Updating geofences failed — error={}", e),
        }
    }

    /// Focuses `device_id` and flies to it. The popup opens when the returned
    /// task is run, after the fly animation; a newer selection cancels it.
    pub fn select_device(
        &mut self,
        device_id: DeviceId,
        data: &dyn FleetSnapshot,
    ) -> Option<DeferredTask> {
        let engine: &mut dyn MapEngine = self.engine.as_mut()?;

        self.popup.close(engine);
        self.focused_device = Some(device_id);
        self.selection_generation += 1;
        if let Err(e) = device::set_label_visibility(engine, Some(device_id)) {
            warn!("Hiding label of device {} failed — error={}", device_id, e);
        }

        let features = build_device_features(data.devices(), data.positions());
        let Some(feature) = find_feature(&features, device_id) else {
            debug!("Selected device {} has no position yet", device_id);
            return None;
        };

        engine.fly_to(
            CameraOptions::center(feature.coordinates())
                .zoom(self.config.follow_zoom)
                .duration(self.config.fly_duration()),
        );

        Some(DeferredTask {
            delay: self.config.fly_duration(),
            action: DeferredAction::OpenDevicePopup(device_id),
            generation: self.selection_generation,
        })
    }

    /// Runs a task returned by [`select_device`](Self::select_device).
    /// Returns `false` if the task was stale or had nothing to do.
    pub fn run_deferred(&mut self, task: DeferredTask, data: &dyn FleetSnapshot) -> bool {
        let DeferredAction::OpenDevicePopup(device_id) = task.action;
        if task.generation != self.selection_generation || self.focused_device != Some(device_id) {
            debug!("Dropping stale popup for device {}", device_id);
            return false;
        }
        if self.lifecycle != Lifecycle::Ready {
            return false;
        }
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        let features = build_device_features(data.devices(), data.positions());
        self.popup
            .open_for_device_id(engine, device_id, &features)
            .is_some()
    }

    /// Swaps the map style. Custom layers come back on the next
    /// [`EngineEvent::StyleLoad`].
    pub fn set_theme(&mut self, theme: Theme) {
        if theme == self.theme {
            return;
        }
        self.theme = theme;

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let engine: &mut dyn MapEngine = engine;
        self.popup.close(engine);
        self.focused_device = None;
        self.selection_generation += 1;
        engine.set_style(self.config.style_url(theme));

        if matches!(self.lifecycle, Lifecycle::Ready | Lifecycle::Restyling) {
            self.lifecycle = Lifecycle::Restyling;
        }
        info!("Theme switched — theme={:?}", theme);
    }

    /// Closes the popup, drops focus and destroys the engine. The destroyed
    /// engine is handed back; later calls return `None`.
    pub fn teardown(&mut self) -> Option<E> {
        let mut engine = self.engine.take()?;
        self.popup.close(&mut engine);
        self.devices.detach(&mut engine);
        engine.destroy();

        self.focused_device = None;
        self.selection_generation += 1;
        self.has_fit_bounds_once = false;
        self.features.clear();
        self.lifecycle = Lifecycle::Destroyed;
        info!("Map engine destroyed");
        Some(engine)
    }

    /// Draws device tracks for report screens. Kept across theme switches.
    pub fn show_tracks(&mut self, tracks: Vec<DeviceTrack>) {
        self.tracks = tracks;
        if self.lifecycle != Lifecycle::Ready {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = track::update(engine, &self.tracks, &self.config) {
                warn!("Drawing tracks failed — error={}", e);
            }
        }
    }

    pub fn fit_tracks(&mut self, target: Option<DeviceId>) -> bool {
        match self.engine.as_mut() {
            Some(engine) => track::fit(engine, &self.tracks, target, &self.config),
            None => false,
        }
    }

    pub fn clear_tracks(&mut self) {
        self.tracks.clear();
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = track::clear(engine) {
                warn!("Clearing tracks failed — error={}", e);
            }
        }
    }

    /// Highlights one track sample and opens its popup. Any device popup and
    /// focus are dropped.
    pub fn show_track_sample(&mut self, sample: &TrackPoint) {
        if self.lifecycle != Lifecycle::Ready {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let engine: &mut dyn MapEngine = engine;
        if self.focused_device.take().is_some() {
            self.selection_generation += 1;
            if let Err(e) = device::set_label_visibility(engine, None) {
                warn!("Restoring device labels failed — error={}", e);
            }
        }
        if let Err(e) = self.history.show(engine, &mut self.popup, sample, &self.config) {
            warn!("Showing track sample failed — error={}", e);
        }
    }

    pub fn clear_track_sample(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if let Err(e) = self.history.clear(engine, &mut self.popup) {
            warn!("Clearing track sample failed — error={}", e);
        }
    }

    pub fn track_address_request(&self) -> Option<AddressRequest> {
        self.history.address_request()
    }

    pub fn apply_track_address(&mut self, resolved: &ResolvedAddress) -> bool {
        match self.engine.as_mut() {
            Some(engine) => self.history.apply_address(engine, &mut self.popup, resolved),
            None => false,
        }
    }

    fn rebuild(&mut self, data: &dyn FleetSnapshot) {
        if let Err(e) = self.add_layers() {
            warn!("Adding map layers failed — error={}", e);
        }
        self.lifecycle = Lifecycle::Ready;
        self.sync_geofences(data);
        self.sync_devices(data);
    }

    fn add_layers(&mut self) -> Result<(), EngineError> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        let engine: &mut dyn MapEngine = engine;

        geofence::add(engine, self.theme)?;
        self.devices
            .add(engine, self.theme, &self.config, self.focused_device)?;
        if !self.tracks.is_empty() {
            track::update(engine, &self.tracks, &self.config)?;
        }
        if self.history.current().is_some() {
            self.history.add(engine)?;
        }
        Ok(())
    }

    fn device_interaction(
        &mut self,
        action: DeviceInteraction,
        feature: Option<&RenderedFeature>,
    ) -> Result<(), EngineError> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        let engine: &mut dyn MapEngine = engine;

        match action {
            DeviceInteraction::ClusterClick => {
                if let Some(feature) = feature {
                    device::expand_cluster(engine, feature);
                }
            }
            DeviceInteraction::DeviceClick => {
                let Some(feature) = feature else {
                    return Ok(());
                };
                if let Some(id) = device::open_clicked_device(engine, &mut self.popup, feature)? {
                    self.focused_device = Some(id);
                    self.selection_generation += 1;
                    debug!("Device {} focused by click", id);
                }
            }
            DeviceInteraction::PointerEnter => engine.set_cursor(Cursor::Pointer),
            DeviceInteraction::PointerLeave => engine.set_cursor(Cursor::Default),
        }
        Ok(())
    }
}

impl<E: MapEngine> Drop for MapSession<E> {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}
