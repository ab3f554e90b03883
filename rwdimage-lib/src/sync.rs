//! Keeps each managed `<img>` source in step with the breakpoint rule that
//! currently wins the cascade.

use log::{debug, info, trace};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dom::dom_tree::{self, NodeHandle};
use crate::registry::{ImageRegistry, ManagedImage};
use crate::style::media::{MediaQueryList, Viewport};

/// Style property the compiled rules carry the image source in.
pub const SOURCE_PROPERTY: &str = "background-image";

/// Reads the post-cascade value of a style property for an element.
pub trait StyleResolver {
    fn resolved_property(&self, element: &NodeHandle, property: &str) -> Option<String>;
}

/// Identifies one registration with a [`BreakpointMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(pub usize);

/// Registers callbacks that run whenever a media query starts matching.
pub trait BreakpointMatcher {
    fn subscribe(&self, query: &str, on_match: Box<dyn FnMut()>) -> SubscriptionHandle;
}

/// Extracts the image location from a resolved `background-image` value.
///
/// `url("a.png")`, `url('a.png')` and `url(a.png)` all give `a.png`. Returns
/// `None` for `none` and empty values.
pub fn extract_source(value: &str) -> Option<&str> {
    let mut source = value.trim();
    if let Some(inner) = source
        .strip_prefix("url(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        source = inner.trim();
    }
    for quote in ['"', '\''] {
        if let Some(inner) = source
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            source = inner;
            break;
        }
    }
    if source.is_empty() || source == "none" {
        return None;
    }
    Some(source)
}

/// Copies the winning `background-image` of an `<img>` into its `src`.
///
/// Returns whether `src` changed. Non-image elements, `none` and an
/// unchanged value are no-ops, so calling this repeatedly is safe.
pub fn resolve_source(element: &NodeHandle, resolver: &dyn StyleResolver) -> bool {
    let is_image = element
        .borrow()
        .as_element()
        .is_some_and(|elem| elem.is_tag("img"));
    if !is_image {
        return false;
    }

    let Some(value) = resolver.resolved_property(element, SOURCE_PROPERTY) else {
        return false;
    };
    let Some(source) = extract_source(&value) else {
        trace!("no source in resolved value {:?}", value);
        return false;
    };
    if dom_tree::get_attribute(element, "src").as_deref() == Some(source) {
        return false;
    }

    debug!("src -> {}", source);
    dom_tree::set_attribute(element, "src", source);
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Source not yet matched to any active breakpoint.
    Unresolved,
    /// Source set from the rule that won at the last resolution.
    Resolved,
}

/// What [`BreakpointSynchronizer::start`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub initial_resolutions: usize,
    pub subscriptions: usize,
}

/// Drives the Unresolved/Resolved state of every managed image.
pub struct BreakpointSynchronizer {
    resolver: Rc<dyn StyleResolver>,
    states: Rc<RefCell<Vec<SyncState>>>,
    source_updates: Rc<Cell<usize>>,
}

impl BreakpointSynchronizer {
    pub fn new(resolver: Rc<dyn StyleResolver>) -> Self {
        BreakpointSynchronizer {
            resolver,
            states: Rc::new(RefCell::new(Vec::new())),
            source_updates: Rc::new(Cell::new(0)),
        }
    }

    /// Runs the initial resolutions and registers live breakpoints.
    ///
    /// Without a matcher every image is resolved once and nothing is
    /// registered, and so is each image in fallback mode. Otherwise each
    /// non-empty breakpoint query is registered, and images that have an
    /// unconditional breakpoint (or no conditional one) are also resolved once
    /// up front.
    pub fn start(&self, registry: &ImageRegistry, matcher: Option<&dyn BreakpointMatcher>) -> SyncReport {
        *self.states.borrow_mut() = vec![SyncState::Unresolved; registry.len()];
        let mut report = SyncReport::default();

        for image in registry {
            let matcher = match matcher {
                Some(matcher) if !image.fallback_mode => matcher,
                _ => {
                    trace!("image {} resolved once (fallback mode: {})", image.id, image.fallback_mode);
                    self.resolve(image);
                    report.initial_resolutions += 1;
                    continue;
                }
            };

            let queries: Vec<&str> = image
                .conditional_queries()
                .filter(|query| !query.trim().is_empty())
                .collect();

            if queries.is_empty() || image.has_unconditional_breakpoint() {
                self.resolve(image);
                report.initial_resolutions += 1;
            }

            for query in queries {
                let handle = matcher.subscribe(query, self.on_match(image));
                trace!("image {} subscribed to {:?} as {:?}", image.id, query, handle);
                report.subscriptions += 1;
            }
        }

        info!(
            "{} initial resolutions, {} breakpoint subscriptions",
            report.initial_resolutions, report.subscriptions
        );
        report
    }

    pub fn state(&self, id: usize) -> Option<SyncState> {
        self.states.borrow().get(id).copied()
    }

    /// How many times a source was actually rewritten.
    pub fn source_updates(&self) -> usize {
        self.source_updates.get()
    }

    fn resolve(&self, image: &ManagedImage) {
        let Some(element) = image.element() else {
            return;
        };
        if resolve_source(&element, self.resolver.as_ref()) {
            self.source_updates.set(self.source_updates.get() + 1);
        }
        if let Some(state) = self.states.borrow_mut().get_mut(image.id) {
            *state = SyncState::Resolved;
        }
    }

    fn on_match(&self, image: &ManagedImage) -> Box<dyn FnMut()> {
        let id = image.id;
        let element = image.element.clone();
        let resolver = Rc::clone(&self.resolver);
        let states = Rc::clone(&self.states);
        let updates = Rc::clone(&self.source_updates);

        Box::new(move || {
            // The document may have dropped the element since registration.
            let Some(element) = element.upgrade() else {
                trace!("image {} is gone; ignoring breakpoint match", id);
                return;
            };
            if resolve_source(&element, resolver.as_ref()) {
                updates.set(updates.get() + 1);
            }
            if let Some(state) = states.borrow_mut().get_mut(id) {
                *state = SyncState::Resolved;
            }
        })
    }
}

struct Subscription {
    query: MediaQueryList,
    matching: bool,
    on_match: Box<dyn FnMut()>,
}

/// Matches registered queries against a shared [`Viewport`], firing a
/// callback on registration when its query already matches and afterwards on
/// every not-matching to matching transition.
pub struct ViewportMatcher {
    viewport: Rc<Cell<Viewport>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl ViewportMatcher {
    pub fn new(viewport: Rc<Cell<Viewport>>) -> Self {
        ViewportMatcher {
            viewport,
            subscriptions: RefCell::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.borrow().is_empty()
    }

    /// Moves to `viewport` and fires newly matching subscriptions in
    /// registration order. Returns how many fired.
    pub fn resize(&self, viewport: Viewport) -> usize {
        info!(
            "viewport {}x{} @{}x",
            viewport.width, viewport.height, viewport.device_pixel_ratio
        );
        self.viewport.set(viewport);

        let mut fired = 0;
        let count = self.subscriptions.borrow().len();
        for index in 0..count {
            let mut callback = {
                let mut subscriptions = self.subscriptions.borrow_mut();
                let subscription = &mut subscriptions[index];
                let now_matching = subscription.query.matches(&viewport);
                let entered = now_matching && !subscription.matching;
                subscription.matching = now_matching;
                if !entered {
                    continue;
                }
                std::mem::replace(&mut subscription.on_match, Box::new(|| {}))
            };

            callback();
            fired += 1;
            self.subscriptions.borrow_mut()[index].on_match = callback;
        }
        debug!("{} of {} subscriptions fired", fired, count);
        fired
    }
}

impl BreakpointMatcher for ViewportMatcher {
    fn subscribe(&self, query: &str, mut on_match: Box<dyn FnMut()>) -> SubscriptionHandle {
        let query = MediaQueryList::parse(query);
        let matching = query.matches(&self.viewport.get());
        if matching {
            on_match();
        }
        let mut subscriptions = self.subscriptions.borrow_mut();
        subscriptions.push(Subscription {
            query,
            matching,
            on_match,
        });
        SubscriptionHandle(subscriptions.len() - 1)
    }
}
