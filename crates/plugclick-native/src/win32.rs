//! Win32 input-hook surface.
//!
//! A dedicated hook manager thread owns one `WH_GETMESSAGE` hook per GUI
//! thread of the host process (the thread that created the surface plus
//! every thread owning a child window of its top-level windows). Requests
//! reach the manager as thread messages and are answered over a channel.
//!
//! Synthesized clicks are tagged through `dwExtraInfo`. When the hook sees
//! a tagged right-button message addressed to a plugin window, it posts the
//! message to the top-level host window instead, so the host builds the
//! context menu rather than the plugin.
//!
//! Every other mouse and key message addressed to a plugin window goes
//! through a per-thread [`MessageRouter`], which hands mouse gestures,
//! browser shortcuts and Ctrl+wheel zoom to the host window.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use ahash::AHashMap;
use plugclick_core::event::Modifiers;
use plugclick_core::geometry::Point;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::Graphics::Gdi::{ClientToScreen, ScreenToClient};
use windows::Win32::System::Threading::{GetCurrentProcessId, GetCurrentThreadId};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyState, INPUT, INPUT_0, INPUT_MOUSE, MOUSE_EVENT_FLAGS, MOUSEEVENTF_ABSOLUTE,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_VIRTUALDESK,
    MOUSEINPUT, SendInput, SetFocus, VIRTUAL_KEY, VK_CONTROL, VK_MENU, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, EnumChildWindows, EnumThreadWindows, GUITHREADINFO, GetClassNameW,
    GetForegroundWindow, GetGUIThreadInfo, GetMessageExtraInfo, GetMessageW, GetParent,
    GetSystemMetrics, GetWindowThreadProcessId, HHOOK, MSG, PM_NOREMOVE, PM_REMOVE, PeekMessageW,
    PostMessageW, PostThreadMessageW, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN, SetWindowsHookExW, UnhookWindowsHookEx, WH_GETMESSAGE, WM_NULL,
    WM_RBUTTONDOWN, WM_RBUTTONUP, WM_USER,
};

use crate::error::{NativeError, Result};
use crate::route::{Destination, HookMessage, MessageRouter, Routing};
use crate::surface::InputHookSurface;

/// `dwExtraInfo` tag carried by clicks this surface synthesizes ("PLGC").
pub const SYNTHETIC_MARKER: usize = 0x504C_4743;

/// Window classes that host plugin rendering surfaces.
const PLUGIN_WINDOW_CLASSES: &[&str] = &["GeckoPluginWindow", "SunAwtFrame"];

/// How far up the window hierarchy a plugin window is searched for.
const PLUGIN_SEARCH_DEPTH: usize = 5;

const WM_INSTALL_HOOKS: u32 = WM_USER + 20;
const WM_UNINSTALL_HOOKS: u32 = WM_USER + 21;
const WM_EXIT_MANAGER: u32 = WM_USER + 22;

/// Top-level window that retargeted clicks are posted to.
static HOST_WINDOW: AtomicIsize = AtomicIsize::new(0);

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
    static ROUTER: RefCell<MessageRouter> = const { RefCell::new(MessageRouter::new()) };
}

fn hwnd_from(raw: isize) -> HWND {
    HWND(raw as *mut c_void)
}

fn hwnd_raw(hwnd: HWND) -> isize {
    hwnd.0 as isize
}

fn os_error(op: &'static str, error: &windows::core::Error) -> NativeError {
    NativeError::Os {
        op,
        code: error.code().0,
    }
}

fn last_os_error(op: &'static str) -> NativeError {
    os_error(op, &windows::core::Error::from_win32())
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// [`InputHookSurface`] backed by the Win32 message layer.
///
/// Must be created on the host's UI thread: that thread is always hooked,
/// and focus calls only act on windows attached to it.
#[derive(Debug)]
pub struct Win32Surface {
    main_thread: u32,
    host_window: Cell<isize>,
    manager: RefCell<Option<HookManager>>,
    recorded_focus: Cell<Option<isize>>,
}

impl Default for Win32Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Win32Surface {
    /// Surface bound to the calling thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            main_thread: unsafe { GetCurrentThreadId() },
            host_window: Cell::new(0),
            manager: RefCell::new(None),
            recorded_focus: Cell::new(None),
        }
    }

    /// Fix the top-level host window instead of using the foreground window.
    #[must_use]
    pub fn with_host_window(self, hwnd: HWND) -> Self {
        self.host_window.set(hwnd_raw(hwnd));
        self
    }

    fn host_window(&self) -> Option<HWND> {
        let raw = match self.host_window.get() {
            0 => hwnd_raw(unsafe { GetForegroundWindow() }),
            raw => raw,
        };
        (raw != 0).then(|| hwnd_from(raw))
    }

    fn set_focus(op: &'static str, hwnd: HWND) -> Result<()> {
        match unsafe { SetFocus(hwnd) } {
            Ok(_) => Ok(()),
            // A null previous focus is reported as an error with no code.
            Err(error) if error.code().0 == 0 => Ok(()),
            Err(error) => Err(os_error(op, &error)),
        }
    }
}

impl InputHookSurface for Win32Surface {
    fn install_hook(&self) -> Result<()> {
        let mut manager = self.manager.borrow_mut();
        if manager.is_none() {
            *manager = Some(HookManager::spawn(self.main_thread)?);
        }
        if let Some(host) = self.host_window() {
            HOST_WINDOW.store(hwnd_raw(host), Ordering::Release);
        }
        let Some(manager) = manager.as_ref() else {
            return Err(NativeError::ManagerUnavailable("not started".into()));
        };
        let hooked = manager.request(WM_INSTALL_HOOKS)?;
        tracing::debug!(target: "plugclick.native", threads = hooked, "message hooks installed");
        Ok(())
    }

    fn uninstall_hook(&self) -> Result<()> {
        let Some(manager) = self.manager.borrow_mut().take() else {
            return Err(NativeError::NotInstalled);
        };
        let result = manager.request(WM_UNINSTALL_HOOKS).map(|_| ());
        HOST_WINDOW.store(0, Ordering::Release);
        drop(manager);
        result
    }

    fn record_focus(&self) -> Result<()> {
        let mut info = GUITHREADINFO {
            cbSize: std::mem::size_of::<GUITHREADINFO>() as u32,
            ..Default::default()
        };
        unsafe { GetGUIThreadInfo(0, &mut info) }
            .map_err(|error| os_error("GetGUIThreadInfo", &error))?;
        self.recorded_focus.set(Some(hwnd_raw(info.hwndFocus)));
        Ok(())
    }

    fn clear_focus(&self) -> Result<()> {
        Self::set_focus("SetFocus(null)", hwnd_from(0))
    }

    fn restore_focus(&self) -> Result<()> {
        let raw = self
            .recorded_focus
            .take()
            .ok_or(NativeError::NoRecordedFocus)?;
        Self::set_focus("SetFocus", hwnd_from(raw))
    }

    fn synthesize_secondary_click(&self, at: Point) -> Result<()> {
        let host = self.host_window().ok_or(NativeError::Os {
            op: "GetForegroundWindow",
            code: 0,
        })?;
        let mut point = POINT { x: at.x, y: at.y };
        if !unsafe { ClientToScreen(host, &mut point) }.as_bool() {
            return Err(last_os_error("ClientToScreen"));
        }
        let (dx, dy) = to_absolute(point);
        let inputs = [
            mouse_input(dx, dy, MOUSEEVENTF_RIGHTDOWN),
            mouse_input(dx, dy, MOUSEEVENTF_RIGHTUP),
        ];
        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(last_os_error("SendInput"));
        }
        Ok(())
    }
}

fn mouse_input(dx: i32, dy: i32, button: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK | MOUSEEVENTF_MOVE | button,
                time: 0,
                dwExtraInfo: SYNTHETIC_MARKER,
            },
        },
    }
}

/// Map a screen point onto the 0..=65535 virtual-desktop range `SendInput` expects.
fn to_absolute(point: POINT) -> (i32, i32) {
    let (left, top, width, height) = unsafe {
        (
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    };
    (
        normalize(point.x, left, width),
        normalize(point.y, top, height),
    )
}

fn normalize(value: i32, origin: i32, extent: i32) -> i32 {
    let span = i64::from(extent.max(2) - 1);
    let offset = (i64::from(value) - i64::from(origin)).clamp(0, span);
    (offset * 65_535 / span) as i32
}

// ---------------------------------------------------------------------------
// Hook manager thread
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct HookManager {
    thread_id: u32,
    replies: mpsc::Receiver<Result<usize>>,
    handle: Option<JoinHandle<()>>,
}

impl HookManager {
    fn spawn(main_thread: u32) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("plugclick-hooks".into())
            .spawn(move || manager_loop(main_thread, &ready_tx, &reply_tx))
            .map_err(|error| NativeError::ManagerUnavailable(error.to_string()))?;
        let thread_id = ready_rx.recv().map_err(|_| {
            NativeError::ManagerUnavailable("manager exited during startup".into())
        })?;
        Ok(Self {
            thread_id,
            replies: reply_rx,
            handle: Some(handle),
        })
    }

    fn post(&self, message: u32) -> Result<()> {
        unsafe { PostThreadMessageW(self.thread_id, message, WPARAM(0), LPARAM(0)) }
            .map_err(|error| os_error("PostThreadMessageW", &error))
    }

    fn request(&self, message: u32) -> Result<usize> {
        self.post(message)?;
        self.replies
            .recv()
            .map_err(|_| NativeError::ManagerUnavailable("manager exited".into()))?
    }
}

impl Drop for HookManager {
    fn drop(&mut self) {
        if let Err(error) = self.post(WM_EXIT_MANAGER) {
            tracing::warn!(target: "plugclick.native", %error, "hook manager did not accept exit");
            return;
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!(target: "plugclick.native", "hook manager thread panicked");
        }
    }
}

fn manager_loop(main_thread: u32, ready: &mpsc::Sender<u32>, replies: &mpsc::Sender<Result<usize>>) {
    let mut msg = MSG::default();
    // Creates this thread's message queue before anyone posts to it.
    unsafe {
        let _ = PeekMessageW(&mut msg, HWND(std::ptr::null_mut()), WM_USER, WM_USER, PM_NOREMOVE);
    }
    if ready.send(unsafe { GetCurrentThreadId() }).is_err() {
        return;
    }

    let mut hooks: AHashMap<u32, isize> = AHashMap::new();
    loop {
        let status = unsafe { GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0) };
        if status.0 <= 0 {
            break;
        }
        match msg.message {
            WM_INSTALL_HOOKS => {
                let _ = replies.send(install_all(main_thread, &mut hooks));
            }
            WM_UNINSTALL_HOOKS => {
                let _ = replies.send(Ok(uninstall_all(&mut hooks)));
            }
            WM_EXIT_MANAGER => break,
            _ => {}
        }
    }
    uninstall_all(&mut hooks);
}

fn install_all(main_thread: u32, hooks: &mut AHashMap<u32, isize>) -> Result<usize> {
    let process = unsafe { GetCurrentProcessId() };
    let mut threads = vec![main_thread];
    for hwnd in child_windows(main_thread) {
        let mut owner = 0u32;
        let thread = unsafe { GetWindowThreadProcessId(hwnd, Some(std::ptr::addr_of_mut!(owner))) };
        // In-process hooks only: a null module handle is not valid elsewhere.
        if thread != 0 && owner == process && !threads.contains(&thread) {
            threads.push(thread);
        }
    }

    let mut last_error = None;
    for thread in threads {
        if hooks.contains_key(&thread) {
            continue;
        }
        match unsafe { SetWindowsHookExW(WH_GETMESSAGE, Some(get_msg_hook), None, thread) } {
            Ok(hook) => {
                hooks.insert(thread, hook.0 as isize);
            }
            Err(error) => {
                tracing::warn!(target: "plugclick.native", thread, %error, "failed to hook thread");
                last_error = Some(os_error("SetWindowsHookExW", &error));
            }
        }
    }

    if hooks.is_empty() {
        Err(last_error.unwrap_or(NativeError::NotInstalled))
    } else {
        Ok(hooks.len())
    }
}

fn uninstall_all(hooks: &mut AHashMap<u32, isize>) -> usize {
    let count = hooks.len();
    for (thread, hook) in hooks.drain() {
        if let Err(error) = unsafe { UnhookWindowsHookEx(HHOOK(hook as *mut c_void)) } {
            tracing::warn!(target: "plugclick.native", thread, %error, "failed to unhook thread");
        }
    }
    count
}

fn child_windows(thread: u32) -> Vec<HWND> {
    unsafe extern "system" fn collect_child(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let windows = unsafe { &mut *(lparam.0 as *mut Vec<isize>) };
        windows.push(hwnd_raw(hwnd));
        BOOL(1)
    }

    unsafe extern "system" fn collect_top_level(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let _ = EnumChildWindows(hwnd, Some(collect_child), lparam);
        }
        BOOL(1)
    }

    let mut windows: Vec<isize> = Vec::new();
    unsafe {
        let _ = EnumThreadWindows(
            thread,
            Some(collect_top_level),
            LPARAM(std::ptr::addr_of_mut!(windows) as isize),
        );
    }
    windows.into_iter().map(hwnd_from).collect()
}

// ---------------------------------------------------------------------------
// Hook procedure
// ---------------------------------------------------------------------------

struct HookScope;

impl HookScope {
    fn enter() -> Option<Self> {
        let reentered = IN_HOOK.with(|flag| flag.replace(true));
        (!reentered).then_some(Self)
    }
}

impl Drop for HookScope {
    fn drop(&mut self) {
        IN_HOOK.with(|flag| flag.set(false));
    }
}

unsafe extern "system" fn get_msg_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 && wparam.0 == PM_REMOVE.0 as usize && lparam.0 != 0 {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let Some(_scope) = HookScope::enter() else {
                return;
            };
            let msg = unsafe { &mut *(lparam.0 as *mut MSG) };
            if !retarget_synthetic_click(msg) {
                route_plugin_message(msg);
            }
        }));
        if result.is_err() {
            tracing::error!(target: "plugclick.native", "message hook panicked");
        }
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

/// Returns whether the message was a synthesized click, handled or not.
fn retarget_synthetic_click(msg: &mut MSG) -> bool {
    if !matches!(msg.message, WM_RBUTTONDOWN | WM_RBUTTONUP) || msg.hwnd.0.is_null() {
        return false;
    }
    if unsafe { GetMessageExtraInfo() }.0 as usize != SYNTHETIC_MARKER {
        return false;
    }
    if plugin_window(msg.hwnd).is_none() {
        return true;
    }
    let Some(host) = host_window() else {
        return true;
    };
    let mut point = msg.pt;
    if !unsafe { ScreenToClient(host, &mut point) }.as_bool() {
        return true;
    }
    let position = LPARAM(pack_point(point.x, point.y));
    if unsafe { PostMessageW(host, msg.message, msg.wParam, position) }.is_ok() {
        msg.message = WM_NULL;
    }
    true
}

fn route_plugin_message(msg: &mut MSG) {
    let message = HookMessage::new(msg.message, msg.wParam.0, msg.lParam.0);
    if msg.hwnd.0.is_null() || !(message.is_key() || message.is_mouse()) {
        return;
    }
    let Some(host) = host_window() else {
        return;
    };
    if plugin_window(msg.hwnd).is_none() {
        return;
    }
    let routing = ROUTER.with(|router| router.borrow_mut().route(message, held_modifiers()));
    if !routing.is_pass_through() {
        deliver(msg, host, &routing);
    }
}

fn deliver(msg: &mut MSG, host: HWND, routing: &Routing) {
    if routing.focus_host {
        if let Err(error) = unsafe { SetFocus(host) } {
            tracing::debug!(target: "plugclick.native", %error, "host window refused focus");
        }
    }
    for post in &routing.posts {
        let (window, lparam) = match post.to {
            Destination::Origin => (msg.hwnd, post.message.lparam),
            Destination::Host => (host, host_lparam(msg.hwnd, host, post.message)),
        };
        let posted = unsafe {
            PostMessageW(
                window,
                post.message.message,
                WPARAM(post.message.wparam),
                LPARAM(lparam),
            )
        };
        if let Err(error) = posted {
            tracing::warn!(
                target: "plugclick.native",
                message = post.message.message,
                %error,
                "PostMessage failed"
            );
        }
    }
    if routing.swallow {
        msg.message = WM_NULL;
    }
}

/// `lparam` of `message` once its client point is moved from `origin`
/// into `host`.
fn host_lparam(origin: HWND, host: HWND, message: HookMessage) -> isize {
    if !message.has_client_point() {
        return message.lparam;
    }
    let at = message.point();
    let mut point = POINT { x: at.x, y: at.y };
    let mapped = unsafe { ClientToScreen(origin, &mut point) }.as_bool()
        && unsafe { ScreenToClient(host, &mut point) }.as_bool();
    if mapped {
        pack_point(point.x, point.y)
    } else {
        message.lparam
    }
}

fn held_modifiers() -> Modifiers {
    let down = |key: VIRTUAL_KEY| unsafe { GetKeyState(i32::from(key.0)) } < 0;
    let mut modifiers = Modifiers::NONE;
    modifiers.set(Modifiers::CTRL, down(VK_CONTROL));
    modifiers.set(Modifiers::ALT, down(VK_MENU));
    modifiers.set(Modifiers::SHIFT, down(VK_SHIFT));
    modifiers
}

fn host_window() -> Option<HWND> {
    let host = HOST_WINDOW.load(Ordering::Acquire);
    (host != 0).then(|| hwnd_from(host))
}

fn pack_point(x: i32, y: i32) -> isize {
    HookMessage::mouse(0, 0, Point::new(x, y)).lparam
}

fn plugin_window(hwnd: HWND) -> Option<HWND> {
    let mut current = hwnd;
    for _ in 0..=PLUGIN_SEARCH_DEPTH {
        if PLUGIN_WINDOW_CLASSES.contains(&class_name(current).as_str()) {
            return Some(current);
        }
        current = unsafe { GetParent(current) }.ok()?;
        if current.0.is_null() {
            return None;
        }
    }
    None
}

fn class_name(hwnd: HWND) -> String {
    let mut buffer = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buffer) };
    String::from_utf16_lossy(&buffer[..len.max(0) as usize])
}
