//! DOM operations the core needs beyond what the data source provides:
//! creating and positioning a block's host element, measuring real content,
//! and reading viewport geometry.
//!
//! Mirrors `components/virtual_list.rs`'s own
//! `#[cfg(target_arch = "wasm32")] { .. } #[cfg(not(..))] { .. }` split
//! rather than a trait-object abstraction, so the wasm32 path is ordinary
//! `web_sys` calls and the native path (used by every test in this crate,
//! since nothing here runs a browser) is a small in-memory node graph.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;

/// Handle to a DOM node. `web_sys::Element` on `wasm32`; an id into
/// [`native`]'s simulated tree everywhere else.
#[cfg(target_arch = "wasm32")]
pub type ElementHandle = web_sys::Element;

#[cfg(not(target_arch = "wasm32"))]
pub type ElementHandle = native::NativeHandle;

/// Creates the pane element: the scrollable container's single child, whose
/// height is set to the sum of all row heights so the scrollbar reflects the
/// full list.
pub fn create_pane() -> ElementHandle {
    #[cfg(target_arch = "wasm32")]
    {
        let doc = web_sys::window().unwrap().document().unwrap();
        let el = doc.create_element("div").unwrap();
        if let Ok(html) = el.clone().dyn_into::<web_sys::HtmlElement>() {
            let _ = html.style().set_property("position", "relative");
        }
        el
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::create(native::Kind::Pane)
    }
}

/// Creates a block's host element: absolutely positioned, moved with
/// [`set_translate_y`] rather than `top` so repositioning never invalidates
/// sibling layout.
pub fn create_host() -> ElementHandle {
    #[cfg(target_arch = "wasm32")]
    {
        let doc = web_sys::window().unwrap().document().unwrap();
        let el = doc.create_element("div").unwrap();
        if let Ok(html) = el.clone().dyn_into::<web_sys::HtmlElement>() {
            let style = html.style();
            let _ = style.set_property("position", "absolute");
            let _ = style.set_property("top", "0");
            let _ = style.set_property("left", "0");
            let _ = style.set_property("right", "0");
        }
        el
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::create(native::Kind::Host)
    }
}

/// Detached fragment a block builds its placeholder or real elements into
/// before `render` attaches them in one idle-write, avoiding an
/// attach-per-child reflow.
pub fn create_fragment() -> ElementHandle {
    #[cfg(target_arch = "wasm32")]
    {
        // DocumentFragment isn't an Element; a detached div behaves the same
        // for our purposes (one `append_child` of its children into the
        // host) and keeps this module to a single handle type.
        let doc = web_sys::window().unwrap().document().unwrap();
        doc.create_element("div").unwrap()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::create(native::Kind::Fragment)
    }
}

pub fn append_child(parent: &ElementHandle, child: &ElementHandle) {
    #[cfg(target_arch = "wasm32")]
    {
        let _ = parent.append_child(child);
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::append_child(parent, child);
    }
}

/// Detaches `el` from its current parent, if any. Does not dispose it.
pub fn remove_element(el: &ElementHandle) {
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(parent) = el.parent_element() {
            let _ = parent.remove_child(el);
        }
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::remove_from_parent(el);
    }
}

pub fn clear_children(el: &ElementHandle) {
    #[cfg(target_arch = "wasm32")]
    {
        el.set_inner_html("");
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::clear_children(el);
    }
}

/// Sets the host's Y position without touching `top`/`left`, so repositioning
/// a block never forces sibling layout.
pub fn set_translate_y(host: &ElementHandle, y: f64) {
    #[cfg(target_arch = "wasm32")]
    {
        if let Ok(html) = host.clone().dyn_into::<web_sys::HtmlElement>() {
            let _ = html
                .style()
                .set_property("transform", &format!("translateY({}px)", y));
        }
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::set_translate_y(host, y);
    }
}

/// Applies a placeholder's expected height via a CSS rule, per §6's styling
/// contract (border-box sizing, or measured heights will disagree with
/// laid-out ones).
pub fn set_dummy_height(el: &ElementHandle, h: f64) {
    #[cfg(target_arch = "wasm32")]
    {
        if let Ok(html) = el.clone().dyn_into::<web_sys::HtmlElement>() {
            let _ = html.style().set_property("height", &format!("{}px", h));
        }
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::set_dummy_height(el, h);
    }
}

/// Forces layout. Read-phase only — never call this outside a scheduled read
/// completion (spec.md §5's layout discipline).
pub fn measure_height(el: &ElementHandle) -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        el.get_bounding_client_rect().height()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::measured_height(el)
    }
}

pub fn set_pane_height(pane: &ElementHandle, h: f64) {
    #[cfg(target_arch = "wasm32")]
    {
        if let Ok(html) = pane.clone().dyn_into::<web_sys::HtmlElement>() {
            let _ = html.style().set_property("height", &format!("{}px", h));
        }
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::set_pane_height(pane, h);
    }
}

/// Reads `(scrollTop, clientHeight)` off the scroll container. Read-phase
/// only.
pub fn read_viewport(container: &ElementHandle) -> (f64, f64) {
    #[cfg(target_arch = "wasm32")]
    {
        if let Ok(html) = container.clone().dyn_into::<web_sys::HtmlElement>() {
            (html.scroll_top() as f64, html.client_height() as f64)
        } else {
            (0.0, 0.0)
        }
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::read_viewport(container)
    }
}

/// Registers `on_scroll` to fire on the container's `scroll` event. Returns
/// a guard that must be kept alive for as long as the listener should stay
/// registered (dropping it detaches the listener on `wasm32`; it is a no-op
/// handle on native, where tests call `handler` directly).
#[cfg(target_arch = "wasm32")]
pub fn attach_scroll_listener(
    container: &ElementHandle,
    mut on_scroll: impl FnMut() + 'static,
) -> wasm_bindgen::closure::Closure<dyn FnMut(web_sys::Event)> {
    let closure = wasm_bindgen::closure::Closure::wrap(Box::new(move |_evt: web_sys::Event| {
        on_scroll();
    }) as Box<dyn FnMut(web_sys::Event)>);
    let target: &web_sys::EventTarget = container.as_ref();
    let _ = target.add_event_listener_with_callback("scroll", closure.as_ref().unchecked_ref());
    closure
}

/// In-memory node graph standing in for the DOM on targets without a
/// browser (every `cargo test` run, plus any non-wasm32 host embedding).
/// Deliberately minimal: enough to exercise `Block`/`BlockSet`/`LongScroll`'s
/// structural logic, not a layout engine.
#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NativeHandle(u64);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) enum Kind {
        Pane,
        Host,
        Fragment,
        Leaf,
    }

    struct Node {
        #[allow(dead_code)]
        kind: Kind,
        parent: Option<NativeHandle>,
        children: Vec<NativeHandle>,
        translate_y: f64,
        dummy_height: f64,
        measured_height: f64,
        pane_height: f64,
        scroll_top: f64,
        client_height: f64,
    }

    impl Default for Node {
        fn default() -> Self {
            Node {
                kind: Kind::Leaf,
                parent: None,
                children: Vec::new(),
                translate_y: 0.0,
                dummy_height: 0.0,
                measured_height: 0.0,
                pane_height: 0.0,
                scroll_top: 0.0,
                client_height: 0.0,
            }
        }
    }

    thread_local! {
        static NEXT_ID: RefCell<u64> = RefCell::new(1);
        static NODES: RefCell<HashMap<u64, Node>> = RefCell::new(HashMap::new());
    }

    pub(super) fn create(kind: Kind) -> NativeHandle {
        let id = NEXT_ID.with(|n| {
            let mut n = n.borrow_mut();
            let id = *n;
            *n += 1;
            id
        });
        NODES.with(|nodes| {
            nodes.borrow_mut().insert(
                id,
                Node {
                    kind,
                    ..Node::default()
                },
            );
        });
        NativeHandle(id)
    }

    /// Creates a leaf node, for tests standing in for data-source elements.
    pub fn create_leaf() -> NativeHandle {
        create(Kind::Leaf)
    }

    pub(super) fn append_child(parent: &NativeHandle, child: &NativeHandle) {
        remove_from_parent(child);
        NODES.with(|nodes| {
            let mut nodes = nodes.borrow_mut();
            if let Some(p) = nodes.get_mut(&parent.0) {
                p.children.push(*child);
            }
            if let Some(c) = nodes.get_mut(&child.0) {
                c.parent = Some(*parent);
            }
        });
    }

    pub(super) fn remove_from_parent(el: &NativeHandle) {
        NODES.with(|nodes| {
            let mut nodes = nodes.borrow_mut();
            let parent = nodes.get(&el.0).and_then(|n| n.parent);
            if let Some(parent) = parent {
                if let Some(p) = nodes.get_mut(&parent.0) {
                    p.children.retain(|c| c != el);
                }
            }
            if let Some(n) = nodes.get_mut(&el.0) {
                n.parent = None;
            }
        });
    }

    pub(super) fn clear_children(el: &NativeHandle) {
        let children = NODES.with(|nodes| {
            nodes
                .borrow()
                .get(&el.0)
                .map(|n| n.children.clone())
                .unwrap_or_default()
        });
        for child in &children {
            remove_from_parent(child);
        }
    }

    pub(super) fn set_translate_y(el: &NativeHandle, y: f64) {
        NODES.with(|nodes| {
            if let Some(n) = nodes.borrow_mut().get_mut(&el.0) {
                n.translate_y = y;
            }
        });
    }

    pub(super) fn set_dummy_height(el: &NativeHandle, h: f64) {
        NODES.with(|nodes| {
            if let Some(n) = nodes.borrow_mut().get_mut(&el.0) {
                n.dummy_height = h;
            }
        });
    }

    pub(super) fn measured_height(el: &NativeHandle) -> f64 {
        NODES.with(|nodes| {
            nodes
                .borrow()
                .get(&el.0)
                .map(|n| if n.measured_height > 0.0 { n.measured_height } else { n.dummy_height })
                .unwrap_or(0.0)
        })
    }

    pub(super) fn set_pane_height(el: &NativeHandle, h: f64) {
        NODES.with(|nodes| {
            if let Some(n) = nodes.borrow_mut().get_mut(&el.0) {
                n.pane_height = h;
            }
        });
    }

    pub(super) fn read_viewport(el: &NativeHandle) -> (f64, f64) {
        NODES.with(|nodes| {
            nodes
                .borrow()
                .get(&el.0)
                .map(|n| (n.scroll_top, n.client_height))
                .unwrap_or((0.0, 0.0))
        })
    }

    // --- test-support only below: nothing in src/ other than tests calls these ---

    /// Sets the height a subsequent `measure_height` will report for a real
    /// element, as if layout had just run.
    pub fn set_measured_height(el: &NativeHandle, h: f64) {
        NODES.with(|nodes| {
            if let Some(n) = nodes.borrow_mut().get_mut(&el.0) {
                n.measured_height = h;
            }
        });
    }

    pub fn set_viewport(container: &NativeHandle, scroll_top: f64, client_height: f64) {
        NODES.with(|nodes| {
            if let Some(n) = nodes.borrow_mut().get_mut(&container.0) {
                n.scroll_top = scroll_top;
                n.client_height = client_height;
            }
        });
    }

    pub fn pane_height(el: &NativeHandle) -> f64 {
        NODES.with(|nodes| nodes.borrow().get(&el.0).map(|n| n.pane_height).unwrap_or(0.0))
    }

    pub fn translate_y(el: &NativeHandle) -> f64 {
        NODES.with(|nodes| nodes.borrow().get(&el.0).map(|n| n.translate_y).unwrap_or(0.0))
    }

    pub fn child_count(el: &NativeHandle) -> usize {
        NODES.with(|nodes| nodes.borrow().get(&el.0).map(|n| n.children.len()).unwrap_or(0))
    }

    pub fn children_of(el: &NativeHandle) -> Vec<NativeHandle> {
        NODES.with(|nodes| nodes.borrow().get(&el.0).map(|n| n.children.clone()).unwrap_or_default())
    }

    /// Test isolation: the registry is a thread-local shared across every
    /// test on the same thread, so each test that cares about absolute ids
    /// or counts should reset it first.
    pub fn reset() {
        NODES.with(|nodes| nodes.borrow_mut().clear());
        NEXT_ID.with(|n| *n.borrow_mut() = 1);
    }
}
