use crate::config::RwdConfig;
use crate::dom::dom_tree::{self, Document, Node};
use crate::error::RwdError;
use crate::parser::dom_indices::DomIndices;
use crate::parser::html;
use crate::registry::{scan, ImageRegistry, ScanOutcome};
use crate::style::computed::ComputedStyleReader;
use crate::style::stylesheet::Stylesheet;
use crate::sync::{BreakpointSynchronizer, SyncReport, ViewportMatcher};
use html5ever::{namespace_url, ns, LocalName, QualName};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

/// Appends `<style type="text/css">css</style>` to the document's `head`.
pub fn inject_stylesheet(document: &Document, css: &str) -> Result<(), RwdError> {
    let indices = DomIndices::build(document);
    let Some(head) = indices.first_by_tag("head") else {
        warn!("no <head> to receive the stylesheet");
        return Err(RwdError::MissingHead);
    };

    let style = dom_tree::new_element(
        "style",
        QualName::new(None, ns!(html), LocalName::from("style")),
    );
    dom_tree::set_attribute(&style, "type", "text/css");
    dom_tree::append_child(&style, Rc::new(RefCell::new(Node::Text(css.to_string()))));
    dom_tree::append_child(head, style);
    Ok(())
}

pub mod rwd_images {
    use super::*;

    /// A page after scanning, stylesheet injection and source synchronization.
    #[derive(Debug)]
    pub struct ProcessedPage {
        pub document: Document,
        /// The document serialized after every replayed resize.
        pub html: String,
        /// The injected stylesheet text (minified when configured).
        pub css: String,
        pub stylesheet: Stylesheet,
        pub registry: ImageRegistry,
        pub fallback_mode: bool,
        pub live_matching: bool,
        pub sync: SyncReport,
        pub source_updates: usize,
    }

    /// Runs the full pipeline over a parsed document.
    pub fn process_document(document: Document, config: &RwdConfig) -> Result<ProcessedPage, RwdError> {
        let ScanOutcome {
            registry,
            stylesheet,
            fallback_mode,
            live_matching,
        } = scan(&document, config);
        if registry.is_empty() {
            info!("no managed images; document left as parsed");
            let html = html::serialize_document(&document)?;
            return Ok(ProcessedPage {
                document,
                html,
                css: String::new(),
                stylesheet: Stylesheet::default(),
                registry,
                fallback_mode,
                live_matching,
                sync: SyncReport::default(),
                source_updates: 0,
            });
        }
        info!(
            "found {} managed images, {} rules",
            registry.len(),
            stylesheet.rules.len()
        );

        let css = if config.minify {
            stylesheet.to_minified_css()?
        } else {
            stylesheet.to_css()
        };
        inject_stylesheet(&document, &css)?;

        let viewport = Rc::new(Cell::new(config.viewport));
        let reader = Rc::new(ComputedStyleReader::new(&stylesheet, Rc::clone(&viewport)));
        let synchronizer = BreakpointSynchronizer::new(reader);

        let sync = if live_matching {
            let matcher = ViewportMatcher::new(viewport);
            let report = synchronizer.start(&registry, Some(&matcher));
            for resize in &config.resizes {
                matcher.resize(*resize);
            }
            report
        } else {
            if !config.resizes.is_empty() {
                debug!("live matching is off; ignoring {} resizes", config.resizes.len());
            }
            synchronizer.start(&registry, None)
        };
        let source_updates = synchronizer.source_updates();
        info!("{} image sources updated", source_updates);

        let html = html::serialize_document(&document)?;
        Ok(ProcessedPage {
            document,
            html,
            css,
            stylesheet,
            registry,
            fallback_mode,
            live_matching,
            sync,
            source_updates,
        })
    }

    pub fn process_html(html_content: &str, config: &RwdConfig) -> Result<ProcessedPage, RwdError> {
        process_document(html::create_dom_tree(html_content), config)
    }

    pub fn process_file(path: &Path, config: &RwdConfig) -> Result<ProcessedPage, RwdError> {
        let html_content = std::fs::read_to_string(path)?;
        info!("read {} bytes from {}", html_content.len(), path.display());
        process_html(&html_content, config)
    }
}

#[cfg(test)]
mod tests {
    use super::rwd_images::*;
    use super::*;
    use crate::style::media::Viewport;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Gallery</title></head>
<body>
  <img class="rwdimage" data-rwdimage="{ src: url(small.png) }, (min-width: 600px) { src: url(large.png) }">
</body>
</html>"#;

    #[test]
    fn test_stylesheet_is_appended_to_head() {
        let page = process_html(PAGE, &RwdConfig::default()).expect("process");
        let head_end = page.html.find("</head>").unwrap();
        let style_at = page.html.find("<style type=\"text/css\">").unwrap();
        assert!(style_at < head_end);
        assert!(page.html.contains(".rwdimage { background-repeat: no-repeat;"));
        assert_eq!(page.css, page.stylesheet.to_css());
    }

    #[test]
    fn test_page_without_marked_elements_is_untouched() {
        let source = "<!DOCTYPE html>\n<html><head><title>Plain</title></head><body><p>text</p></body></html>";
        let page = process_html(source, &RwdConfig::default()).expect("process");
        assert_eq!(page.html, source);
        assert!(page.css.is_empty());
        assert!(page.stylesheet.rules.is_empty());
        assert_eq!(page.sync, SyncReport::default());
    }

    #[test]
    fn test_missing_head_is_an_error() {
        let document = dom_tree::new_document();
        assert!(matches!(
            inject_stylesheet(&document, ".a { }"),
            Err(RwdError::MissingHead)
        ));
    }

    #[test]
    fn test_initial_source_and_resize() {
        let narrow = RwdConfig {
            viewport: Viewport::new(320.0, 480.0),
            ..RwdConfig::default()
        };
        let page = process_html(PAGE, &narrow).expect("process");
        assert!(page.html.contains("src=\"small.png\""));
        assert_eq!(page.sync.subscriptions, 1);

        let resized = RwdConfig {
            resizes: vec![Viewport::new(800.0, 480.0)],
            ..narrow
        };
        let page = process_html(PAGE, &resized).expect("process");
        assert!(page.html.contains("src=\"large.png\""));
        assert_eq!(page.source_updates, 2);
    }

    #[test]
    fn test_without_live_matching_resizes_are_ignored() {
        let config = RwdConfig {
            viewport: Viewport::new(320.0, 480.0),
            live_matching: false,
            resizes: vec![Viewport::new(800.0, 480.0)],
            ..RwdConfig::default()
        };
        let page = process_html(PAGE, &config).expect("process");
        assert!(!page.live_matching);
        assert!(page.html.contains("src=\"small.png\""));
        assert!(!page.html.contains("data-rwdimage-has-enquire"));
    }

    #[test]
    fn test_minified_css_is_injected() {
        let config = RwdConfig {
            minify: true,
            ..RwdConfig::default()
        };
        let page = process_html(PAGE, &config).expect("process");
        assert!(page.css.len() < page.stylesheet.to_css().len());
        assert!(page.html.contains(&page.css));
    }
}
