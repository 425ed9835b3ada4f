use crate::config::MapConfig;
use crate::engine::tiles::{self, TILE_CACHE_CAPACITY};
use crate::engine::{self, MapStyle, renderer};
use crate::error::MapError;
use crate::model::{Dataset, MapResult, PixelSize};
use crate::view::app::MapApp;
use crate::view::panel::DISMISS_ACTION;
use lru::LruCache;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CanvasRenderingContext2d, CssStyleDeclaration, Element, Event, EventTarget,
    HtmlCanvasElement, HtmlElement, HtmlImageElement, MouseEvent, WheelEvent,
};

// Pointer travel beyond which a press counts as a drag, not a click
const DRAG_THRESHOLD_PX: f64 = 3.0;

struct Dom {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    popup: Option<HtmlElement>,
    panel: Option<HtmlElement>,
}

#[derive(Default)]
struct Drag {
    last: Option<(f64, f64)>,
    travelled: f64,
}

struct ViewState {
    app: MapApp,
    dom: Option<Dom>,
    style: MapStyle,
    images: LruCache<String, HtmlImageElement>,
    on_image_load: Option<js_sys::Function>,
    drag: Drag,
}

fn css(style: &CssStyleDeclaration, property: &str, value: &str) -> MapResult<()> {
    style
        .set_property(property, value)
        .map_err(|_| MapError::Wasm(format!("Failed to set {}", property)))
}

fn pointer_position(event: &MouseEvent) -> (f64, f64) {
    (event.offset_x() as f64, event.offset_y() as f64)
}

// Returns the image once it has loaded; the first request starts the load.
fn load_image(
    images: &mut LruCache<String, HtmlImageElement>,
    on_load: Option<&js_sys::Function>,
    url: &str,
) -> Option<HtmlImageElement> {
    let key = url.to_string();
    if let Some(image) = images.get(&key) {
        return (image.complete() && image.natural_width() > 0).then(|| image.clone());
    }
    let image = HtmlImageElement::new().ok()?;
    image.set_onload(on_load);
    image.set_src(url);
    images.put(key, image);
    None
}

fn fit_canvas(canvas: &HtmlCanvasElement) -> PixelSize {
    let width = match canvas.client_width() {
        w if w > 0 => w as u32,
        _ => canvas.width().max(1),
    };
    let height = match canvas.client_height() {
        h if h > 0 => h as u32,
        _ => canvas.height().max(1),
    };
    canvas.set_width(width);
    canvas.set_height(height);
    PixelSize::new(width, height)
}

impl ViewState {
    fn render(&mut self) -> MapResult<()> {
        let Some(dom) = &self.dom else {
            return Ok(());
        };

        let commands = self
            .app
            .map()
            .inspect(|m| engine::build_scene(m, self.app.features()))
            .unwrap_or_default();
        let size = (dom.canvas.width() as f64, dom.canvas.height() as f64);
        let images = &mut self.images;
        let on_load = self.on_image_load.as_ref();
        renderer::execute(&dom.context, &commands, size, &self.style, |url| {
            load_image(images, on_load, url)
        })?;

        self.sync_dom()
    }

    fn sync_dom(&self) -> MapResult<()> {
        let Some(dom) = &self.dom else {
            return Ok(());
        };

        if let Some(element) = &dom.popup {
            let style = element.style();
            match self.app.open_popup() {
                Some((popup, (x, y))) => {
                    element.set_inner_html(popup.html());
                    let left = dom.canvas.offset_left() as f64 + x;
                    let top = dom.canvas.offset_top() as f64 + y;
                    css(&style, "position", "absolute")?;
                    css(&style, "left", &format!("{}px", left))?;
                    css(&style, "top", &format!("{}px", top))?;
                    css(&style, "transform", "translate(-50%, -100%)")?;
                    css(&style, "display", "block")?;
                }
                None => {
                    element.set_inner_html("");
                    css(&style, "display", "none")?;
                }
            }
        }

        if let Some(element) = &dom.panel {
            match self.app.panel().render() {
                Some(html) => {
                    element.set_inner_html(&html);
                    css(&element.style(), "display", "block")?;
                }
                None => {
                    element.set_inner_html("");
                    css(&element.style(), "display", "none")?;
                }
            }
        }

        let cursor = if self.drag.last.is_some() && self.drag.travelled > DRAG_THRESHOLD_PX {
            "grabbing"
        } else if self.app.hovered().is_some() {
            "pointer"
        } else {
            "grab"
        };
        css(&dom.canvas.style(), "cursor", cursor)
    }

    fn pointer_down(&mut self, event: &Event) -> bool {
        if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
            self.drag = Drag {
                last: Some(pointer_position(mouse)),
                travelled: 0.0,
            };
        }
        false
    }

    fn pointer_up(&mut self, _event: &Event) -> bool {
        self.drag.last = None;
        false
    }

    fn pointer_move(&mut self, event: &Event) -> bool {
        let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
            return false;
        };
        let position = pointer_position(mouse);

        if let Some(last) = self.drag.last.filter(|_| mouse.buttons() & 1 == 1) {
            let (dx, dy) = (position.0 - last.0, position.1 - last.1);
            self.drag.last = Some(position);
            self.drag.travelled += dx.abs() + dy.abs();
            return self.app.pan_by(dx, dy);
        }
        self.app.pointer_move(position.0, position.1)
    }

    fn pointer_leave(&mut self, _event: &Event) -> bool {
        self.drag.last = None;
        self.app.pointer_leave()
    }

    fn click(&mut self, event: &Event) -> bool {
        let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
            return false;
        };
        if std::mem::take(&mut self.drag.travelled) > DRAG_THRESHOLD_PX {
            return false;
        }
        let (x, y) = pointer_position(mouse);
        self.app.click(x, y)
    }

    fn wheel(&mut self, event: &Event) -> bool {
        let Some(wheel) = event.dyn_ref::<WheelEvent>() else {
            return false;
        };
        wheel.prevent_default();
        let delta = match wheel.delta_y() {
            d if d < 0.0 => 1,
            d if d > 0.0 => -1,
            _ => return false,
        };
        self.app.zoom_by(delta, pointer_position(wheel))
    }

    fn panel_click(&mut self, event: &Event) -> bool {
        let selector = format!(r#"[data-action="{}"]"#, DISMISS_ACTION);
        let on_dismiss = event
            .target()
            .and_then(|target| target.dyn_into::<Element>().ok())
            .and_then(|element| element.closest(&selector).ok().flatten())
            .is_some();
        on_dismiss && self.app.dismiss()
    }
}

type Listener = (EventTarget, &'static str, Closure<dyn FnMut(Event)>);

// Wraps a state handler into a DOM callback that re-renders when the
// handler reports a change.
fn with_state(
    state: &Weak<RefCell<ViewState>>,
    mut handler: impl FnMut(&mut ViewState, &Event) -> bool + 'static,
) -> impl FnMut(Event) + 'static {
    let state = state.clone();
    move |event: Event| {
        let Some(strong) = state.upgrade() else {
            return;
        };
        let Ok(mut guard) = strong.try_borrow_mut() else {
            return;
        };
        if handler(&mut guard, &event) {
            if let Err(e) = guard.render() {
                tracing::warn!("Render failed: {}", e);
            }
        }
    }
}

#[wasm_bindgen]
pub struct MapView {
    state: Rc<RefCell<ViewState>>,
    listeners: Vec<Listener>,
    _on_image_load: Closure<dyn FnMut()>,
}

impl MapView {
    pub fn from_parts(config: MapConfig, dataset: Dataset) -> Self {
        let state = Rc::new(RefCell::new(ViewState {
            app: MapApp::new(config, dataset),
            dom: None,
            style: MapStyle::default(),
            images: tiles::tile_cache(TILE_CACHE_CAPACITY),
            on_image_load: None,
            drag: Drag::default(),
        }));

        let weak = Rc::downgrade(&state);
        let on_image_load = Closure::wrap(Box::new(move || {
            if let Some(strong) = weak.upgrade() {
                if let Ok(mut guard) = strong.try_borrow_mut() {
                    if let Err(e) = guard.render() {
                        tracing::warn!("Render after image load failed: {}", e);
                    }
                }
            }
        }) as Box<dyn FnMut()>);
        state.borrow_mut().on_image_load =
            Some(on_image_load.as_ref().unchecked_ref::<js_sys::Function>().clone());

        MapView {
            state,
            listeners: Vec::new(),
            _on_image_load: on_image_load,
        }
    }

    fn listen(
        &mut self,
        target: &EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> MapResult<()> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(|_| MapError::Wasm(format!("Failed to listen for {}", event)))?;
        self.listeners.push((target.clone(), event, closure));
        Ok(())
    }

    fn attach_listeners(&mut self) -> MapResult<()> {
        let (canvas, panel) = {
            let state = self.state.borrow();
            let dom = state
                .dom
                .as_ref()
                .ok_or_else(|| MapError::Wasm("View is not mounted".to_string()))?;
            (dom.canvas.clone(), dom.panel.clone())
        };
        let weak = Rc::downgrade(&self.state);
        let canvas: EventTarget = canvas.into();

        self.listen(&canvas, "mousedown", with_state(&weak, ViewState::pointer_down))?;
        self.listen(&canvas, "mouseup", with_state(&weak, ViewState::pointer_up))?;
        self.listen(&canvas, "mousemove", with_state(&weak, ViewState::pointer_move))?;
        self.listen(&canvas, "mouseleave", with_state(&weak, ViewState::pointer_leave))?;
        self.listen(&canvas, "click", with_state(&weak, ViewState::click))?;
        self.listen(&canvas, "wheel", with_state(&weak, ViewState::wheel))?;
        if let Some(panel) = panel {
            let panel: EventTarget = panel.into();
            self.listen(&panel, "click", with_state(&weak, ViewState::panel_click))?;
        }
        Ok(())
    }

    fn detach_listeners(&mut self) {
        for (target, event, closure) in self.listeners.drain(..) {
            let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        }
    }

    fn mount_on(
        &mut self,
        canvas_id: &str,
        popup_id: Option<String>,
        panel_id: Option<String>,
    ) -> MapResult<()> {
        let document = web_sys::window()
            .ok_or_else(|| MapError::Wasm("No window".to_string()))?
            .document()
            .ok_or_else(|| MapError::Wasm("No document".to_string()))?;

        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| MapError::Wasm(format!("Canvas {} not found", canvas_id)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| MapError::Wasm("Element is not a canvas".to_string()))?;

        let context = canvas
            .get_context("2d")
            .map_err(|_| MapError::Wasm("Could not get 2d context".to_string()))?
            .ok_or_else(|| MapError::Wasm("No 2d context".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| MapError::Wasm("Context is not 2d".to_string()))?;

        let element = |id: Option<String>| {
            id.and_then(|id| document.get_element_by_id(&id))
                .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        };
        let popup = element(popup_id);
        let panel = element(panel_id);

        let size = fit_canvas(&canvas);
        self.detach_listeners();
        {
            let mut state = self.state.borrow_mut();
            state.dom = Some(Dom {
                canvas,
                context,
                popup,
                panel,
            });
            state.app.mount(size)?;
        }
        self.attach_listeners()?;

        tracing::info!(
            "Mounted map on canvas {} ({}x{})",
            canvas_id,
            size.width,
            size.height
        );
        self.state.borrow_mut().render()
    }
}

impl Drop for MapView {
    fn drop(&mut self) {
        self.detach_listeners();
    }
}

#[wasm_bindgen]
impl MapView {
    /// A view over the bundled dataset with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<MapView, JsValue> {
        Ok(MapView::from_parts(MapConfig::default(), Dataset::bundled()?))
    }

    #[wasm_bindgen(js_name = fromGeoJson)]
    pub fn from_geojson(geojson: &str) -> Result<MapView, JsValue> {
        Ok(MapView::from_parts(
            MapConfig::default(),
            Dataset::from_geojson_str(geojson)?,
        ))
    }

    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config_json: &str, geojson: Option<String>) -> Result<MapView, JsValue> {
        let config = MapConfig::from_json(config_json)?;
        let dataset = match geojson {
            Some(geojson) => Dataset::from_geojson_str(&geojson)?,
            None => Dataset::bundled()?,
        };
        Ok(MapView::from_parts(config, dataset))
    }

    /// Attaches the map to a canvas, plus optional popup and detail-panel
    /// elements. Mounting again reinitializes the map in place.
    pub fn mount(
        &mut self,
        canvas_id: &str,
        popup_id: Option<String>,
        panel_id: Option<String>,
    ) -> Result<(), JsValue> {
        Ok(self.mount_on(canvas_id, popup_id, panel_id)?)
    }

    pub fn render(&self) -> Result<(), JsValue> {
        Ok(self.state.borrow_mut().render()?)
    }

    /// Re-reads the canvas size after a layout change.
    pub fn resize(&self) -> Result<(), JsValue> {
        let mut state = self.state.borrow_mut();
        let Some(size) = state.dom.as_ref().map(|dom| fit_canvas(&dom.canvas)) else {
            return Ok(());
        };
        if state.app.resize(size)? {
            state.render()?;
        }
        Ok(())
    }

    pub fn dismiss(&self) -> Result<(), JsValue> {
        let mut state = self.state.borrow_mut();
        if state.app.dismiss() {
            state.render()?;
        }
        Ok(())
    }

    #[wasm_bindgen(getter, js_name = selectedId)]
    pub fn selected_id(&self) -> Option<String> {
        self.state.borrow().app.selected_id().map(str::to_string)
    }

    #[wasm_bindgen(getter, js_name = markerCount)]
    pub fn marker_count(&self) -> usize {
        self.state
            .borrow()
            .app
            .features()
            .map_or(0, |features| features.len())
    }

    #[wasm_bindgen(getter, js_name = siteCount)]
    pub fn site_count(&self) -> usize {
        self.state.borrow().app.dataset().len()
    }

    #[wasm_bindgen(getter, js_name = skippedCount)]
    pub fn skipped_count(&self) -> usize {
        self.state.borrow().app.dataset().skipped()
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> Option<u8> {
        self.state
            .borrow()
            .app
            .map()
            .inspect(|m| m.viewport().zoom)
    }
}
