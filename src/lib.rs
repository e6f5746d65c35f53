//! Menus, keyboard shortcuts and a color picker for [winit] windows.
//!
//! Build menus on a [`Gui`] created with [`create_gui`], feed window events to a
//! [`KeyboardRouter`] and call [`Gui::process_native_events`] from
//! `ApplicationHandler::proxy_wake_up`.

pub use winit_gui_core::*;

mod keyboard;
pub use keyboard::KeyboardRouter;

use tracing::debug;
use winit::event_loop::EventLoop;

#[cfg(target_os = "windows")]
use winit_gui_windows as platform_impl;

#[cfg(target_os = "macos")]
use winit_gui_macos as platform_impl;

#[cfg(target_os = "linux")]
use winit_gui_linux as platform_impl;

/// Create the [`Gui`] of an application running `event_loop`.
///
/// Native events wake the event loop up through its proxy. On platforms without a
/// native backend the returned context has no visible menus or dialogs, but menu
/// shortcuts still work.
pub fn create_gui<T>(event_loop: &EventLoop, attributes: GuiAttributes) -> anyhow::Result<Gui<T>> {
    let proxy = event_loop.create_proxy();
    let (native_proxy, events) = event_channel(move || proxy.wake_up());

    #[cfg(target_os = "windows")]
    let bridge: Box<dyn NativeBridge> = Box::new(platform_impl::WindowsBridge::new(native_proxy));

    #[cfg(target_os = "macos")]
    let bridge: Box<dyn NativeBridge> = Box::new(platform_impl::MacosBridge::new(native_proxy)?);

    #[cfg(target_os = "linux")]
    let bridge: Box<dyn NativeBridge> = Box::new(platform_impl::LinuxBridge::new(native_proxy));

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    let bridge: Box<dyn NativeBridge> = {
        tracing::warn!("no native gui backend for this platform, menus stay invisible");
        Box::new(HeadlessBridge::new(native_proxy))
    };

    debug!("gui bridge ready");
    Ok(Gui::new(bridge, events, attributes))
}
