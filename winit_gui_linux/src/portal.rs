//! Color picking through the XDG desktop portal (`org.freedesktop.portal.Screenshot`).
//!
//! The portal lets the user pick a color from anywhere on screen. The answer arrives as
//! a `Response` signal on a request object whose path is derived from our unique bus
//! name and a token we choose.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use rwh_06::RawWindowHandle;
use tracing::{debug, trace};
use winit_gui_core::{ColorDialogId, Rgba};
use zbus::blocking::{Connection, Proxy};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_SERVICE: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const SCREENSHOT_INTERFACE: &str = "org.freedesktop.portal.Screenshot";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Portal identifier of a parent window, empty when the portal cannot use it.
pub(crate) fn parent_window(window: RawWindowHandle) -> String {
    match window {
        RawWindowHandle::Xlib(handle) => format!("x11:{:x}", handle.window),
        RawWindowHandle::Xcb(handle) => format!("x11:{:x}", handle.window.get()),
        // Wayland surfaces need an xdg-foreign export handle, which winit does not provide
        _ => String::new(),
    }
}

fn request_token(dialog: ColorDialogId) -> String {
    format!("winit_gui_{}", dialog.into_raw())
}

/// Object path the portal will use for our request.
fn request_path(unique_name: &str, token: &str) -> String {
    let sender = unique_name.trim_start_matches(':').replace('.', "_");
    format!("{PORTAL_PATH}/request/{sender}/{token}")
}

/// Ask the portal for a color and block until the user answers.
///
/// Returns `None` if the user cancelled. The portal has no alpha channel, so the
/// result carries `alpha`.
pub(crate) fn pick_color(parent: &str, dialog: ColorDialogId, alpha: f32) -> Result<Option<Rgba>> {
    let connection = Connection::session().context("Failed to connect to D-Bus session bus")?;
    let unique_name = connection
        .unique_name()
        .ok_or_else(|| anyhow!("Failed to get D-Bus unique name"))?
        .to_string();

    let token = request_token(dialog);
    let path = request_path(&unique_name, &token);

    // subscribe before calling so a fast answer is not missed
    let request = Proxy::new(&connection, PORTAL_SERVICE, path.as_str(), REQUEST_INTERFACE)?;
    let mut responses = request
        .receive_signal("Response")
        .context("Failed to subscribe to portal response")?;

    let screenshot = Proxy::new(&connection, PORTAL_SERVICE, PORTAL_PATH, SCREENSHOT_INTERFACE)?;
    let mut options: HashMap<&str, Value<'_>> = HashMap::new();
    options.insert("handle_token", Value::from(token.as_str()));

    debug!(%path, "Calling PickColor");
    let handle: OwnedObjectPath = screenshot
        .call("PickColor", &(parent, options))
        .context("Failed to call PickColor")?;
    if handle.as_str() != path {
        // older portals ignore handle_token
        return Err(anyhow!("portal answered on unexpected request path {}", handle.as_str()));
    }

    let message = responses
        .next()
        .ok_or_else(|| anyhow!("portal connection closed before responding"))?;
    let (response, results): (u32, HashMap<String, OwnedValue>) = message
        .body()
        .deserialize()
        .context("Malformed portal response")?;
    trace!(response, "portal responded");

    parse_response(response, results, alpha)
}

fn parse_response(response: u32, mut results: HashMap<String, OwnedValue>, alpha: f32) -> Result<Option<Rgba>> {
    match response {
        0 => {
            let color = results
                .remove("color")
                .ok_or_else(|| anyhow!("portal response has no color"))?;
            let (r, g, b): (f64, f64, f64) = Value::from(color)
                .try_into()
                .context("portal color is not a (ddd) structure")?;
            Ok(Some(Rgba::new(r as f32, g as f32, b as f32, alpha)))
        }
        // 1: cancelled by the user, 2: ended some other way
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::Structure;

    #[test]
    fn request_path_escapes_unique_name() {
        assert_eq!(
            request_path(":1.42", "winit_gui_3"),
            "/org/freedesktop/portal/desktop/request/1_42/winit_gui_3"
        );
        assert_eq!(request_token(ColorDialogId::from_raw(3)), "winit_gui_3");
    }

    #[test]
    fn successful_response_keeps_alpha() {
        let color = Value::from(Structure::from((0.0f64, 1.0f64, 0.0f64)));
        let mut results = HashMap::new();
        results.insert("color".to_owned(), OwnedValue::try_from(color).unwrap());

        let picked = parse_response(0, results, 0.5).unwrap();
        assert_eq!(picked, Some(Rgba::new(0.0, 1.0, 0.0, 0.5)));
    }

    #[test]
    fn cancelled_response_has_no_color() {
        assert_eq!(parse_response(1, HashMap::new(), 1.0).unwrap(), None);
    }
}
