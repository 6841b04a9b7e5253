//! Startup rewrite of the web client's entry point.
//!
//! Operator snippets come from an optional file and an optional environment
//! variable; when both are present the file content goes first.

use server::config::InjectConfig;
use std::path::Path;
use tracing::{error, info, warn};

pub const HEAD_MARKER: &str = "<!-- INJECT_HEAD -->";
pub const BODY_MARKER: &str = "<!-- INJECT_BODY -->";

/// Join file and environment content, file first.
pub fn combine(file: Option<String>, env: Option<String>) -> String {
    match (file, env) {
        (Some(file), Some(env)) if !file.is_empty() && !env.is_empty() => format!("{file}\n{env}"),
        (Some(file), Some(env)) => file + &env,
        (Some(file), None) => file,
        (None, Some(env)) => env,
        (None, None) => String::new(),
    }
}

/// Replace the markers in `html`. `None` when there is nothing to do.
pub fn apply(html: &str, head: &str, body: &str) -> Option<String> {
    if !html.contains(HEAD_MARKER) && !html.contains(BODY_MARKER) {
        return None;
    }
    let mut out = html.to_string();
    if !head.is_empty() {
        out = out.replace(HEAD_MARKER, head);
    }
    if !body.is_empty() {
        out = out.replace(BODY_MARKER, body);
    }
    (out != html).then_some(out)
}

fn read_snippet(path: Option<&str>) -> Option<String> {
    let path = path?;
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            warn!("Could not read injection file {}: {}", path, e);
            None
        }
    }
}

/// Inject configured snippets into the entry point. Never fails startup.
pub fn run(config: &InjectConfig) {
    let target = Path::new(&config.index_path);
    let html = match std::fs::read_to_string(target) {
        Ok(html) => html,
        Err(e) => {
            error!("Injection target {} unavailable: {}", target.display(), e);
            return;
        }
    };

    let head = combine(
        read_snippet(config.head_file.as_deref()),
        std::env::var("INJECT_HEAD").ok(),
    );
    let body = combine(
        read_snippet(config.body_file.as_deref()),
        std::env::var("INJECT_BODY").ok(),
    );

    let Some(rewritten) = apply(&html, &head, &body) else {
        info!("No injection performed on {}", target.display());
        return;
    };
    match std::fs::write(target, rewritten) {
        Ok(()) => info!("Injected snippets into {}", target.display()),
        Err(e) => error!("Failed to write {}: {}", target.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_content_comes_first() {
        assert_eq!(
            combine(Some("<a>".into()), Some("<b>".into())),
            "<a>\n<b>"
        );
        assert_eq!(combine(None, Some("<b>".into())), "<b>");
        assert_eq!(combine(Some(String::new()), Some("<b>".into())), "<b>");
        assert_eq!(combine(None, None), "");
    }

    #[test]
    fn markers_are_replaced() {
        let html = format!("<head>{HEAD_MARKER}</head><body>{BODY_MARKER}</body>");
        let out = apply(&html, "<script></script>", "<p>hi</p>").unwrap();
        assert_eq!(out, "<head><script></script></head><body><p>hi</p></body>");
    }

    #[test]
    fn nothing_to_do_without_markers_or_content() {
        assert!(apply("<html></html>", "<x>", "<y>").is_none());
        let html = format!("<head>{HEAD_MARKER}</head>");
        assert!(apply(&html, "", "").is_none());
    }

    #[test]
    fn missing_target_does_not_panic() {
        run(&InjectConfig {
            index_path: "definitely/not/here/index.html".into(),
            head_file: None,
            body_file: None,
        });
    }
}
