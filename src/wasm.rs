//! Browser front end: page-load glue between `web_sys::WebSocket` and the DOM.
//!
//! ```js
//! import init, { BrowserFeed } from "./pkg/beer_feed.js";
//! await init();
//! const feed = BrowserFeed.start();
//! feed.setConnectionLostHook((reason, attempt) => attempt <= 3 ? 2000 : null);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::{error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CloseEvent, Document, Element, Event, HtmlElement, HtmlInputElement, HtmlTemplateElement,
    MessageEvent, WebSocket,
};

use crate::config::FeedConfig;
use crate::endpoint::PageLocation;
use crate::error::{FeedError, Result};
use crate::feed::{MessageFeed, Outcome};
use crate::inbox::Inbox;
use crate::lifecycle::{CloseReason, ConnectionState, Reconnect};
use crate::message::TrustedHtml;

/// Length of the slide-down reveal.
const REVEAL_MS: i32 = 400;

fn js_detail(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn document() -> Result<Document> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| FeedError::Render {
            key: "document".into(),
            detail: "no window.document".into(),
        })
}

/// `ws(s)://<location.host>/beersocket` for the current page.
pub fn page_endpoint(path: &str) -> Result<String> {
    let window =
        web_sys::window().ok_or_else(|| FeedError::Endpoint("no window".into()))?;
    let location = window.location();
    let protocol = location
        .protocol()
        .map_err(|e| FeedError::Endpoint(js_detail(&e)))?;
    let host = location
        .host()
        .map_err(|e| FeedError::Endpoint(js_detail(&e)))?;
    PageLocation::from_parts(&protocol, &host)?.endpoint_with_path(path)
}

/// Focus the compose input and select its contents. Missing input is not an error.
pub fn focus_compose_input(document: &Document, input_id: &str) {
    let Some(input) = document
        .get_element_by_id(input_id)
        .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
    else {
        return;
    };
    let _ = input.focus();
    input.select();
}

// ---------------------------------------------------------------------------
// DomInbox
// ---------------------------------------------------------------------------

/// The page's inbox container.
pub struct DomInbox {
    document: Document,
    container: Element,
}

impl DomInbox {
    pub fn attach(document: &Document, inbox_id: &str) -> Result<Self> {
        let container = document
            .get_element_by_id(inbox_id)
            .ok_or_else(|| FeedError::Render {
                key: inbox_id.to_string(),
                detail: "inbox container not found".into(),
            })?;
        Ok(DomInbox {
            document: document.clone(),
            container,
        })
    }

    fn element(&self, key: &str) -> Result<HtmlElement> {
        self.document
            .get_element_by_id(key)
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
            .ok_or_else(|| FeedError::Render {
                key: key.to_string(),
                detail: "no such element".into(),
            })
    }
}

fn render_err(key: &str) -> impl Fn(JsValue) -> FeedError + '_ {
    move |e| FeedError::Render {
        key: key.to_string(),
        detail: js_detail(&e),
    }
}

impl DomInbox {
    /// The fragment's single root element, or a `div` around it when the
    /// markup has several top-level nodes. The root ends up carrying `key`.
    fn fragment_root(&self, key: &str, html: &TrustedHtml) -> Result<HtmlElement> {
        let template = self
            .document
            .create_element("template")
            .map_err(render_err(key))?
            .dyn_into::<HtmlTemplateElement>()
            .map_err(|_| not_html(key))?;
        template.set_inner_html(html.as_str().trim());
        let content = template.content();

        let root = match content.first_element_child() {
            Some(el) if content.child_nodes().length() == 1 => el,
            _ => {
                let wrapper = self.document.create_element("div").map_err(render_err(key))?;
                wrapper.append_child(&content).map_err(render_err(key))?;
                wrapper
            }
        };
        let root = root.dyn_into::<HtmlElement>().map_err(|_| not_html(key))?;

        let id = root.id();
        if id != key {
            if !id.is_empty() {
                warn!(key = %key, found = %id, "fragment id does not match message key, replacing");
            }
            root.set_id(key);
        }
        Ok(root)
    }
}

fn not_html(key: &str) -> FeedError {
    FeedError::Render {
        key: key.to_string(),
        detail: "fragment root is not an HTML element".into(),
    }
}

impl Inbox for DomInbox {
    fn append_hidden(&mut self, key: &str, html: &TrustedHtml) -> Result<()> {
        if self.document.get_element_by_id(key).is_some() {
            return Err(FeedError::Render {
                key: key.to_string(),
                detail: "an element with this id already exists".into(),
            });
        }
        let node = self.fragment_root(key, html)?;

        let style = node.style();
        for (name, value) in [
            ("overflow", "hidden".to_string()),
            ("max-height", "0px".to_string()),
            ("opacity", "0".to_string()),
            (
                "transition",
                format!("max-height {REVEAL_MS}ms ease, opacity {REVEAL_MS}ms ease"),
            ),
        ] {
            style.set_property(name, &value).map_err(render_err(key))?;
        }

        self.container.append_child(&node).map_err(render_err(key))?;
        Ok(())
    }

    fn reveal(&mut self, key: &str) -> Result<()> {
        let node = self.element(key)?;
        // Reading layout flushes the hidden styles so the transition runs.
        let full_height = node.scroll_height();
        let _ = node.offset_height();

        let style = node.style();
        style
            .set_property("max-height", &format!("{full_height}px"))
            .map_err(render_err(key))?;
        style.set_property("opacity", "1").map_err(render_err(key))?;

        // Drop the height cap once the slide finishes so later content is not clipped.
        let settled = node.clone();
        let unclamp = Closure::once_into_js(move || {
            let style = settled.style();
            let _ = style.remove_property("max-height");
            let _ = style.remove_property("overflow");
        });
        if let Some(window) = web_sys::window() {
            window
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    unclamp.unchecked_ref(),
                    REVEAL_MS,
                )
                .map_err(render_err(key))?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.element(key)?.remove();
        Ok(())
    }

    fn existing_keys(&self) -> Vec<String> {
        let children = self.container.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(|el| el.id())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BrowserFeed
// ---------------------------------------------------------------------------

type BrowserLossHook = Box<dyn FnMut(&CloseReason, u32) -> Reconnect>;

struct Handlers {
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

struct Shared {
    url: String,
    feed: RefCell<MessageFeed<DomInbox>>,
    socket: RefCell<Option<WebSocket>>,
    handlers: RefCell<Option<Handlers>>,
    state: Cell<ConnectionState>,
    losses: Cell<u32>,
    errored: Cell<bool>,
    closing: Cell<bool>,
    on_lost: RefCell<Option<BrowserLossHook>>,
}

/// The page's single feed: one socket, one inbox, one rendered-id set.
#[wasm_bindgen]
pub struct BrowserFeed {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl BrowserFeed {
    /// Page-load entry point with the default page layout.
    pub fn start() -> std::result::Result<BrowserFeed, JsValue> {
        Self::start_with(&FeedConfig::default()).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Close the socket. No reconnect follows.
    pub fn close(&self) {
        self.shared.closing.set(true);
        if let Some(socket) = self.shared.socket.borrow().as_ref() {
            let _ = socket.close();
        }
    }

    #[wasm_bindgen(js_name = renderedCount)]
    pub fn rendered_count(&self) -> usize {
        self.shared.feed.borrow().rendered_count()
    }

    #[wasm_bindgen(js_name = isOpen)]
    pub fn is_open(&self) -> bool {
        self.shared.state.get() == ConnectionState::Open
    }

    /// `hook(reason: string, attempt: number)` returns a delay in ms to
    /// reconnect after, or anything non-numeric to stay closed.
    #[wasm_bindgen(js_name = setConnectionLostHook)]
    pub fn set_connection_lost_hook(&self, hook: js_sys::Function) {
        let hook: BrowserLossHook = Box::new(move |reason, attempt| {
            let decision = hook.call2(
                &JsValue::NULL,
                &JsValue::from_str(&reason.to_string()),
                &JsValue::from(attempt),
            );
            match decision.ok().and_then(|v| v.as_f64()) {
                Some(ms) if ms >= 0.0 => Reconnect::After(Duration::from_millis(ms as u64)),
                _ => Reconnect::Stop,
            }
        });
        *self.shared.on_lost.borrow_mut() = Some(hook);
    }
}

impl BrowserFeed {
    pub fn start_with(config: &FeedConfig) -> Result<BrowserFeed> {
        config.validate()?;
        let document = document()?;
        focus_compose_input(&document, &config.input_id);

        let url = page_endpoint(&config.path)?;
        let inbox = DomInbox::attach(&document, &config.inbox_id)?;
        let feed = MessageFeed::new(inbox)
            .with_prefix(config.id_prefix.clone())
            .with_policy(config.parse_policy);

        let shared = Rc::new(Shared {
            url,
            feed: RefCell::new(feed),
            socket: RefCell::new(None),
            handlers: RefCell::new(None),
            state: Cell::new(ConnectionState::Closed),
            losses: Cell::new(0),
            errored: Cell::new(false),
            closing: Cell::new(false),
            on_lost: RefCell::new(None),
        });
        connect(&shared)?;
        Ok(BrowserFeed { shared })
    }

    /// Rust-side connection-loss hook.
    pub fn on_connection_lost(&self, hook: impl FnMut(&CloseReason, u32) -> Reconnect + 'static) {
        *self.shared.on_lost.borrow_mut() = Some(Box::new(hook));
    }
}

fn connect(shared: &Rc<Shared>) -> Result<()> {
    shared.state.set(ConnectionState::Connecting);
    shared.errored.set(false);
    let socket = WebSocket::new(&shared.url).map_err(|e| FeedError::Connect {
        url: shared.url.clone(),
        detail: js_detail(&e),
    })?;

    let on_open = {
        let shared = Rc::clone(shared);
        Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            shared.state.set(ConnectionState::Open);
            shared.losses.set(0);
            info!(url = %shared.url, "feed connected");
        })
    };

    let on_message = {
        let shared = Rc::clone(shared);
        Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let Some(text) = event.data().as_string() else {
                return; // binary frames carry no messages
            };
            match deliver(&shared, &text) {
                Ok(_) | Err(FeedError::Parse(_)) | Err(FeedError::InvalidId(_)) => {}
                Err(e) => error!(error = %e, "feed frame failed"),
            }
        })
    };

    let on_error = {
        let shared = Rc::clone(shared);
        Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            shared.errored.set(true);
        })
    };

    let on_close = {
        let shared = Rc::clone(shared);
        Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            let was_open = shared.state.get() == ConnectionState::Open;
            shared.state.set(ConnectionState::Closed);
            let reason = if shared.closing.get() {
                CloseReason::ClosedByClient
            } else if !was_open {
                CloseReason::ConnectFailed(format!("code {}", event.code()))
            } else if shared.errored.get() {
                CloseReason::Error(format!("code {}", event.code()))
            } else {
                let text = event.reason();
                CloseReason::PeerClosed((!text.is_empty()).then_some(text))
            };
            handle_loss(&shared, reason);
        })
    };

    socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

    *shared.socket.borrow_mut() = Some(socket);
    *shared.handlers.borrow_mut() = Some(Handlers {
        _on_open: on_open,
        _on_message: on_message,
        _on_error: on_error,
        _on_close: on_close,
    });
    Ok(())
}

/// Hand one text frame to the page's feed. The feed logs parse failures itself.
fn deliver(shared: &Shared, text: &str) -> Result<Outcome> {
    shared.feed.borrow_mut().handle_frame(text)
}

fn handle_loss(shared: &Rc<Shared>, reason: CloseReason) {
    if reason == CloseReason::ClosedByClient {
        info!("feed closed");
        return;
    }
    let losses = shared.losses.get().saturating_add(1);
    shared.losses.set(losses);

    let decision = match shared.on_lost.borrow_mut().as_mut() {
        Some(hook) => hook(&reason, losses),
        None => Reconnect::Stop,
    };
    match decision {
        Reconnect::Stop => warn!(%reason, "feed connection lost"),
        Reconnect::After(delay) => {
            warn!(%reason, ?delay, "feed connection lost, reconnecting");
            let retry = {
                let shared = Rc::clone(shared);
                Closure::once_into_js(move || {
                    if shared.closing.get() {
                        return;
                    }
                    if let Err(e) = connect(&shared) {
                        error!(error = %e, "reconnect failed");
                        handle_loss(&shared, CloseReason::ConnectFailed(e.to_string()));
                    }
                })
            };
            if let Some(window) = web_sys::window() {
                let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
                if let Err(e) = window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(retry.unchecked_ref(), ms)
                {
                    error!(error = %js_detail(&e), "could not schedule reconnect");
                }
            }
        }
    }
}

#[wasm_bindgen(start)]
pub fn main() {
    // Route the crate's tracing events to the browser console.
    let _ = tracing_wasm::try_set_as_global_default();
    info!("beer-feed wasm module initialized");
}
