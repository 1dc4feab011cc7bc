//! In-memory window server for unit tests
//!
//! Records every request as a [`Call`] and answers queries from per-window
//! state that tests set up through [`FakeServer::window_mut`].

use anyhow::{Result, bail};
use std::collections::{BTreeMap, HashMap, VecDeque};
use x11rb::protocol::xproto::Window;

use crate::config::Config;
use crate::shared::Geometry;
use crate::wm::WindowManager;
use crate::wm::events::Event;
use crate::wm::hints::{SizeHints, WmHints};
use crate::wm::keyboard::Keysym;
use crate::wm::server::{
    ClassHint, Protocol, WindowAttributes, WindowChanges, WindowServer, WmState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Configure(Window, WindowChanges),
    BorderColor(Window, u32),
    Raise(Window),
    Map(Window),
    SelectEvents(Window),
    GrabButtons(Window, bool),
    Release(Window, i32),
    WmState(Window, WmState),
    FullscreenState(Window, bool),
    ConfigureNotify(Window, Geometry, i32),
    SendProtocol(Window, Protocol),
    Kill(Window),
    InputFocus(Option<Window>),
    ActiveWindow(Option<Window>),
    AppendClientList(Window),
    ClientList(Vec<Window>),
    AllowReplay,
    GrabKeys(Vec<(u16, Keysym)>),
    RefreshKeyboard,
    GrabPointer,
    UngrabPointer,
    Warp(Window, i32, i32),
    Sync,
    Shutdown,
}

impl Call {
    /// Client window a request targets, if any
    pub fn window(&self) -> Option<Window> {
        match *self {
            Call::Configure(w, _)
            | Call::BorderColor(w, _)
            | Call::Raise(w)
            | Call::Map(w)
            | Call::SelectEvents(w)
            | Call::GrabButtons(w, _)
            | Call::Release(w, _)
            | Call::WmState(w, _)
            | Call::FullscreenState(w, _)
            | Call::ConfigureNotify(w, _, _)
            | Call::SendProtocol(w, _)
            | Call::Kill(w)
            | Call::AppendClientList(w)
            | Call::Warp(w, _, _) => Some(w),
            Call::InputFocus(w) | Call::ActiveWindow(w) => w,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub attributes: WindowAttributes,
    pub transient_for: Option<Window>,
    pub class: Option<ClassHint>,
    pub title: Option<String>,
    pub size_hints: Option<SizeHints>,
    /// WM_HINTS carries InputHint with input = false
    pub never_focus: bool,
    pub wm_state: Option<WmState>,
    pub fullscreen: bool,
    pub take_focus: bool,
    pub delete_window: bool,
}

impl Default for FakeWindow {
    fn default() -> Self {
        Self {
            attributes: WindowAttributes {
                geometry: Geometry::new(100, 100, 300, 200),
                border_width: 1,
                override_redirect: false,
                viewable: false,
            },
            transient_for: None,
            class: None,
            title: None,
            size_hints: None,
            never_focus: false,
            wm_state: None,
            fullscreen: false,
            take_focus: false,
            delete_window: false,
        }
    }
}

pub struct FakeServer {
    pub screen: (i32, i32),
    pub windows: BTreeMap<Window, FakeWindow>,
    pub events: VecDeque<Event>,
    pub calls: Vec<Call>,
    pub focused: Option<Window>,
    pub active: Option<Window>,
    pub client_list: Vec<Window>,
    pub pointer: Option<(i32, i32)>,
    pub keymap: HashMap<u8, Keysym>,
    pub numlock: u16,
    pub grab_ok: bool,
}

impl FakeServer {
    pub fn new(screen: (i32, i32)) -> Self {
        Self {
            screen,
            windows: BTreeMap::new(),
            events: VecDeque::new(),
            calls: Vec::new(),
            focused: None,
            active: None,
            client_list: Vec::new(),
            pointer: Some((0, 0)),
            keymap: HashMap::new(),
            numlock: 1 << 4,
            grab_ok: true,
        }
    }

    /// State of `window`, created with defaults on first use
    pub fn window_mut(&mut self, window: Window) -> &mut FakeWindow {
        self.windows.entry(window).or_default()
    }
}

impl WindowServer for FakeServer {
    fn screen_size(&self) -> (i32, i32) {
        self.screen
    }

    fn window_attributes(&mut self, window: Window) -> Result<Option<WindowAttributes>> {
        Ok(self.windows.get(&window).map(|w| w.attributes))
    }

    fn query_tree(&mut self) -> Result<Vec<Window>> {
        Ok(self.windows.keys().copied().collect())
    }

    fn transient_for(&mut self, window: Window) -> Result<Option<Window>> {
        Ok(self.windows.get(&window).and_then(|w| w.transient_for))
    }

    fn class_hint(&mut self, window: Window) -> Result<Option<ClassHint>> {
        Ok(self.windows.get(&window).and_then(|w| w.class.clone()))
    }

    fn title(&mut self, window: Window) -> Result<Option<String>> {
        Ok(self.windows.get(&window).and_then(|w| w.title.clone()))
    }

    fn size_hints(&mut self, window: Window) -> Result<Option<SizeHints>> {
        Ok(self.windows.get(&window).and_then(|w| w.size_hints.clone()))
    }

    fn wm_hints(&mut self, window: Window) -> Result<Option<WmHints>> {
        Ok(self
            .windows
            .get(&window)
            .filter(|w| w.never_focus)
            .map(|_| WmHints { flags: 1, input: false }))
    }

    fn wm_state(&mut self, window: Window) -> Result<Option<WmState>> {
        Ok(self.windows.get(&window).and_then(|w| w.wm_state))
    }

    fn requests_fullscreen(&mut self, window: Window) -> Result<bool> {
        Ok(self.windows.get(&window).is_some_and(|w| w.fullscreen))
    }

    fn query_pointer(&mut self) -> Result<Option<(i32, i32)>> {
        Ok(self.pointer)
    }

    fn keysym(&self, keycode: u8) -> Option<Keysym> {
        self.keymap.get(&keycode).copied()
    }

    fn numlock_mask(&self) -> u16 {
        self.numlock
    }

    fn configure(&mut self, window: Window, changes: &WindowChanges) -> Result<()> {
        self.calls.push(Call::Configure(window, *changes));
        Ok(())
    }

    fn set_border_color(&mut self, window: Window, pixel: u32) -> Result<()> {
        self.calls.push(Call::BorderColor(window, pixel));
        Ok(())
    }

    fn raise(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::Raise(window));
        Ok(())
    }

    fn map(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::Map(window));
        Ok(())
    }

    fn select_client_events(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::SelectEvents(window));
        Ok(())
    }

    fn grab_buttons(&mut self, window: Window, focused: bool, _bindings: &[(u16, u8)]) -> Result<()> {
        self.calls.push(Call::GrabButtons(window, focused));
        Ok(())
    }

    fn release_window(&mut self, window: Window, border_width: i32) -> Result<()> {
        self.window_mut(window).wm_state = Some(WmState::Withdrawn);
        self.calls.push(Call::Release(window, border_width));
        Ok(())
    }

    fn set_wm_state(&mut self, window: Window, state: WmState) -> Result<()> {
        self.window_mut(window).wm_state = Some(state);
        self.calls.push(Call::WmState(window, state));
        Ok(())
    }

    fn set_fullscreen_state(&mut self, window: Window, fullscreen: bool) -> Result<()> {
        self.window_mut(window).fullscreen = fullscreen;
        self.calls.push(Call::FullscreenState(window, fullscreen));
        Ok(())
    }

    fn send_configure_notify(&mut self, window: Window, geometry: Geometry, border_width: i32) -> Result<()> {
        self.calls.push(Call::ConfigureNotify(window, geometry, border_width));
        Ok(())
    }

    fn send_protocol(&mut self, window: Window, protocol: Protocol) -> Result<bool> {
        let supported = self.windows.get(&window).is_some_and(|w| match protocol {
            Protocol::DeleteWindow => w.delete_window,
            Protocol::TakeFocus => w.take_focus,
        });
        if supported {
            self.calls.push(Call::SendProtocol(window, protocol));
        }
        Ok(supported)
    }

    fn kill_client(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::Kill(window));
        Ok(())
    }

    fn set_input_focus(&mut self, window: Option<Window>) -> Result<()> {
        self.focused = window;
        self.calls.push(Call::InputFocus(window));
        Ok(())
    }

    fn set_active_window(&mut self, window: Option<Window>) -> Result<()> {
        self.active = window;
        self.calls.push(Call::ActiveWindow(window));
        Ok(())
    }

    fn append_client_list(&mut self, window: Window) -> Result<()> {
        self.client_list.push(window);
        self.calls.push(Call::AppendClientList(window));
        Ok(())
    }

    fn set_client_list(&mut self, windows: &[Window]) -> Result<()> {
        self.client_list = windows.to_vec();
        self.calls.push(Call::ClientList(windows.to_vec()));
        Ok(())
    }

    fn allow_replay_pointer(&mut self) -> Result<()> {
        self.calls.push(Call::AllowReplay);
        Ok(())
    }

    fn grab_keys(&mut self, keys: &[(u16, Keysym)]) -> Result<()> {
        self.calls.push(Call::GrabKeys(keys.to_vec()));
        Ok(())
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        self.calls.push(Call::RefreshKeyboard);
        Ok(())
    }

    fn grab_pointer(&mut self) -> Result<bool> {
        if self.grab_ok {
            self.calls.push(Call::GrabPointer);
        }
        Ok(self.grab_ok)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.calls.push(Call::UngrabPointer);
        Ok(())
    }

    fn warp_pointer(&mut self, window: Window, x: i32, y: i32) -> Result<()> {
        self.calls.push(Call::Warp(window, x, y));
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<Event>> {
        Ok(self.events.pop_front())
    }

    fn wait_event(&mut self) -> Result<Event> {
        match self.events.pop_front() {
            Some(event) => Ok(event),
            None => bail!("event queue exhausted"),
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.calls.push(Call::Sync);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.calls.push(Call::Shutdown);
        Ok(())
    }
}

/// Deliver a MapRequest for `window` (created with defaults if unknown)
pub fn map_window(wm: &mut WindowManager<FakeServer>, window: Window) {
    wm.server.window_mut(window);
    wm.handle_event(Event::MapRequest { window })
        .expect("map request failed");
}

/// A 1000x800 manager with default config, managing `windows` in order.
///
/// Each entry is (window, tag); the last one ends up on top of the stack.
pub fn manager_with_windows(windows: &[(Window, u32)]) -> WindowManager<FakeServer> {
    let mut wm = WindowManager::new(FakeServer::new((1000, 800)), Config::default())
        .expect("default config is valid");
    wm.setup().expect("setup failed");
    for &(window, tag) in windows {
        map_window(&mut wm, window);
        let id = wm.clients.lookup(window).expect("window was managed");
        if let Some(c) = wm.clients.get_mut(id) {
            c.tag = tag;
        }
    }
    wm.focus(None).expect("focus failed");
    wm.arrange(true).expect("arrange failed");
    wm
}
