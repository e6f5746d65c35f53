//! Color switching demo.
//!
//! Right-click the window for the "colors" context menu, or use the "colors" menu in
//! the menu bar. Every item also has a Shift+Ctrl+Alt+Super shortcut; "color picker"
//! opens the native color dialog.

use std::cell::RefCell;
use std::error::Error;
use std::num::NonZeroU32;
use std::rc::Rc;

use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalPosition;
use winit::event::{ButtonSource, ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};
use winit_gui::{Gui, GuiAttributes, KeyboardRouter, MenuId, MenuItemId, Modifiers, PopupPosition, Rgba, Shortcut};

/// What a menu item does when chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColorAction {
    OpenPicker,
    Paint(Rgba),
}

#[derive(Debug)]
struct Canvas {
    color: Rgba,
    picker_requested: bool,
}

struct App {
    gui: Gui<ColorAction>,
    keyboard: KeyboardRouter,
    canvas: Rc<RefCell<Canvas>>,
    context_menu: Option<MenuId>,
    window: Option<Rc<Box<dyn Window>>>,
    surface_context: Option<softbuffer::Context<Rc<Box<dyn Window>>>>,
    surface: Option<softbuffer::Surface<Rc<Box<dyn Window>>, Rc<Box<dyn Window>>>>,
}

impl App {
    fn new(event_loop: &EventLoop) -> anyhow::Result<Self> {
        Ok(App {
            gui: winit_gui::create_gui(event_loop, GuiAttributes::default())?,
            keyboard: KeyboardRouter::new(),
            canvas: Rc::new(RefCell::new(Canvas {
                color: Rgba::new(1.0, 0.0, 0.0, 0.5),
                picker_requested: false,
            })),
            context_menu: None,
            window: None,
            surface_context: None,
            surface: None,
        })
    }

    fn item(
        &mut self,
        menu: MenuId,
        name: &str,
        key: char,
        action: ColorAction,
    ) -> winit_gui::Result<MenuItemId> {
        let canvas = self.canvas.clone();
        self.gui.append_item(
            menu,
            name,
            Some(Shortcut::new(Modifiers::ALL, key)),
            action,
            move |id, action| {
                info!(?id, ?action, "menu item chosen");
                let mut canvas = canvas.borrow_mut();
                match *action {
                    ColorAction::OpenPicker => canvas.picker_requested = true,
                    ColorAction::Paint(color) => canvas.color = color,
                }
            },
        )
    }

    fn build_menus(&mut self, window: &dyn Window) -> winit_gui::Result<()> {
        let menu = self.gui.new_menu("colors");
        self.item(menu, "color picker", 'p', ColorAction::OpenPicker)?;
        self.item(menu, "red", 'r', ColorAction::Paint(Rgba::new(1.0, 0.0, 0.0, 1.0)))?;
        self.item(menu, "green", 'g', ColorAction::Paint(Rgba::new(0.0, 1.0, 0.0, 1.0)))?;
        self.gui.append_separator(menu)?;
        let submenu = self.gui.append_submenu(menu, "submenu")?;
        self.item(submenu, "blue", 'b', ColorAction::Paint(Rgba::new(0.0, 0.0, 1.0, 1.0)))?;
        self.context_menu = Some(menu);

        #[cfg(feature = "menu_bar")]
        {
            let app_menu = self.gui.application_menu(window)?;
            let colors = self.gui.append_submenu(app_menu, "colors")?;
            self.item(colors, "yellow", 'y', ColorAction::Paint(Rgba::new(1.0, 1.0, 0.0, 1.0)))?;
            self.item(colors, "cyan", 'c', ColorAction::Paint(Rgba::new(0.0, 1.0, 1.0, 1.0)))?;
            let submenu = self.gui.append_submenu(colors, "submenu")?;
            self.item(submenu, "magenta", 'm', ColorAction::Paint(Rgba::new(1.0, 0.0, 1.0, 1.0)))?;
        }
        #[cfg(not(feature = "menu_bar"))]
        let _ = window;

        Ok(())
    }

    #[cfg(feature = "context_menu")]
    fn show_context_menu(&mut self, position: PhysicalPosition<f64>) {
        let (Some(window), Some(menu)) = (self.window.clone(), self.context_menu) else {
            return;
        };
        let position = PhysicalPosition::new(position.x as i32, position.y as i32);
        match self.gui.popup_menu_at(&**window, menu, PopupPosition::Window(position)) {
            Ok(Some(item)) => info!(?item, "context menu item selected"),
            Ok(None) => info!("context menu dismissed"),
            Err(err) => error!(%err, "failed to show context menu"),
        }
    }

    /// Act on whatever the last callbacks asked for.
    fn after_dispatch(&mut self) {
        let picker_requested = std::mem::take(&mut self.canvas.borrow_mut().picker_requested);
        if picker_requested {
            self.open_color_picker();
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    #[cfg(feature = "color_picker")]
    fn open_color_picker(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let canvas = self.canvas.clone();
        let initial = canvas.borrow().color;
        let redraw = window.clone();
        let result = self.gui.show_color_picker(&**window, initial, move |color| {
            info!(?color, "color picked");
            canvas.borrow_mut().color = color;
            redraw.request_redraw();
        });
        if let Err(err) = result {
            warn!(%err, "failed to open color picker");
        }
    }

    #[cfg(not(feature = "color_picker"))]
    fn open_color_picker(&mut self) {
        warn!("color picker support is disabled");
    }

    fn render(&mut self) {
        let Some(surface) = &mut self.surface else {
            return;
        };
        let Some(window) = &self.window else {
            return;
        };

        let size = window.surface_size();
        let width = size.width as usize;
        let height = size.height as usize;
        let color = self.canvas.borrow().color;

        let mut buffer = surface.buffer_mut().unwrap();

        // translucent colors are blended over a checkerboard
        for y in 0..height {
            for x in 0..width {
                let idx = y * width + x;
                let background = if (x / 16 + y / 16) % 2 == 0 { 0.9 } else { 0.6 };
                let blend = |channel: f32| {
                    let value = channel * color.a() + background * (1.0 - color.a());
                    (value * 255.0) as u8
                };

                // Create BGR0 color for softbuffer (little-endian 0RGB format)
                buffer[idx] = u32::from_le_bytes([blend(color.b()), blend(color.g()), blend(color.r()), 0]);
            }
        }

        buffer.present().unwrap();
    }
}

impl ApplicationHandler for App {
    fn can_create_surfaces(&mut self, event_loop: &dyn ActiveEventLoop) {
        let window_attributes = WindowAttributes::default().with_title("Colors");

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Rc::new(window),
            Err(err) => {
                error!(%err, "failed to create window");
                event_loop.exit();
                return;
            }
        };

        if let Err(err) = self.build_menus(&**window) {
            error!(%err, "failed to build menus");
        }

        let size = window.surface_size();

        // Initialize softbuffer for displaying pixels
        let context = softbuffer::Context::new(window.clone()).unwrap();
        let mut surface = softbuffer::Surface::new(&context, window.clone()).unwrap();
        surface
            .resize(
                NonZeroU32::new(size.width).unwrap(),
                NonZeroU32::new(size.height).unwrap(),
            )
            .unwrap();

        self.surface_context = Some(context);
        self.surface = Some(surface);

        // Request an initial redraw so the window appears on Wayland
        window.request_redraw();
        self.window = Some(window);
    }

    fn proxy_wake_up(&mut self, _event_loop: &dyn ActiveEventLoop) {
        let handled = self.gui.process_native_events();
        if handled > 0 {
            self.after_dispatch();
        }
    }

    fn window_event(&mut self, event_loop: &dyn ActiveEventLoop, _: WindowId, event: WindowEvent) {
        if self.keyboard.handle_event(&self.gui, &event) {
            self.after_dispatch();
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested, stopping");
                event_loop.exit();
            }
            #[cfg(feature = "context_menu")]
            WindowEvent::PointerButton {
                state: ElementState::Released,
                button: ButtonSource::Mouse(MouseButton::Right),
                position,
                ..
            } => {
                self.show_context_menu(position);
                self.after_dispatch();
            }
            WindowEvent::SurfaceResized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(surface) = &mut self.surface {
                        let _ = surface.resize(
                            NonZeroU32::new(size.width).unwrap(),
                            NonZeroU32::new(size.height).unwrap(),
                        );
                    }
                }

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                self.render();

                if let Some(window) = &self.window {
                    window.pre_present_notify();
                }
            }
            _ => (),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let event_loop = EventLoop::new()?;
    let app = App::new(&event_loop)?;
    event_loop.run_app(app)?;
    Ok(())
}
