//! Marker-delimited regions in the rendered `index.html`.
//!
//! The front-end build leaves comment pairs such as
//! `<!-- nav.const-start -->` / `<!-- nav.const-end -->` in the document.
//! A region's content is replaced in memory; every byte outside the markers
//! is preserved. Marker presence is checked before anything is written, so
//! callers can render first and persist only on success.

use std::fmt::Write as _;
use std::path::Path;

use crate::config::Config;
use crate::error::{NavError, Result};
use crate::models::{for_each_web, Category};
use crate::settings::Settings;

/// A pair of comment markers delimiting an injectable region.
#[derive(Debug, Clone, Copy)]
pub struct MarkerRegion {
    pub start: &'static str,
    pub end: &'static str,
}

/// Runtime config injected for the front end.
pub const CONST_REGION: MarkerRegion = MarkerRegion {
    start: "<!-- nav.const-start -->",
    end: "<!-- nav.const-end -->",
};

/// Crawlable SEO block.
pub const SEO_REGION: MarkerRegion = MarkerRegion {
    start: "<!-- nav.seo-start -->",
    end: "<!-- nav.seo-end -->",
};

impl MarkerRegion {
    /// Byte range of the content between the markers.
    fn locate(&self, html: &str, path: &Path) -> Result<(usize, usize)> {
        let missing = |marker: &str| NavError::TemplateMarkerMissing {
            path: path.to_path_buf(),
            marker: marker.to_string(),
        };
        let start = html.find(self.start).ok_or_else(|| missing(self.start))? + self.start.len();
        let end = html[start..]
            .find(self.end)
            .map(|offset| start + offset)
            .ok_or_else(|| missing(self.end))?;
        Ok((start, end))
    }

    /// Returns `html` with this region's content replaced by `content`.
    pub fn replace(&self, html: &str, content: &str, path: &Path) -> Result<String> {
        let (start, end) = self.locate(html, path)?;
        let mut out = String::with_capacity(html.len() + content.len());
        out.push_str(&html[..start]);
        out.push_str(content);
        out.push_str(&html[end..]);
        Ok(out)
    }
}

/// Renders the runtime-config script for the const region.
pub fn render_const_script(config: &Config) -> String {
    format!(
        "<script>\n  window.__HASH_MODE__ = {};\n  window.__ADDRESS__ = {};\n  </script>",
        config.hash_mode,
        script_string(&config.address)
    )
}

/// Renders the hidden SEO block from an already filtered dataset.
pub fn render_seo(dataset: &[Category], settings: &Settings) -> String {
    let mut out = String::from("<div class=\"nav-seo\" style=\"display:none\">");
    let _ = write!(out, "<h1>{}</h1>", escape_html(&settings.title));
    if !settings.description.is_empty() {
        let _ = write!(out, "<p>{}</p>", escape_html(&settings.description));
    }
    for_each_web(dataset, &mut |web| {
        if web.url.is_empty() {
            return;
        }
        let _ = write!(
            out,
            "<a href=\"{}\" title=\"{}\">{}</a>",
            escape_html(&web.url),
            escape_html(&web.desc),
            escape_html(&web.name)
        );
    });
    out.push_str("</div>");
    out
}

/// JSON string literal safe to embed inside a `<script>` element.
fn script_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Web;

    const PAGE: &str = "<html><head><!-- nav.const-start --><script>old</script><!-- nav.const-end --></head>\n<body>\r\n<!-- nav.seo-start --><!-- nav.seo-end --><app-root></app-root></body></html>";

    #[test]
    fn test_replace_preserves_outside_bytes() {
        let out = CONST_REGION.replace(PAGE, "NEW", Path::new("index.html")).unwrap();
        assert_eq!(
            out,
            PAGE.replace("<script>old</script>", "NEW"),
        );
        assert!(out.contains("<body>\r\n"));
    }

    #[test]
    fn test_replace_is_repeatable() {
        let path = Path::new("index.html");
        let once = SEO_REGION.replace(PAGE, "<p>x</p>", path).unwrap();
        let twice = SEO_REGION.replace(&once, "<p>x</p>", path).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_markers() {
        let path = Path::new("index.html");
        let err = CONST_REGION.replace("<html></html>", "x", path).unwrap_err();
        match err {
            NavError::TemplateMarkerMissing { marker, .. } => {
                assert_eq!(marker, CONST_REGION.start)
            }
            other => panic!("unexpected error: {other}"),
        }
        let only_start = "<!-- nav.const-start --> dangling";
        assert!(CONST_REGION.replace(only_start, "x", path).is_err());
        // End marker before start marker does not count.
        let reversed = "<!-- nav.const-end --><!-- nav.const-start -->";
        assert!(CONST_REGION.replace(reversed, "x", path).is_err());
    }

    #[test]
    fn test_seo_escapes() {
        let dataset = vec![Category {
            web: vec![Web {
                name: "<b>Tom & Jerry</b>".into(),
                url: "https://example.com/?a=1&b=\"2\"".into(),
                ..Default::default()
            }],
            ..Default::default()
        }];
        let settings = Settings {
            title: "My Nav".into(),
            ..Default::default()
        };
        let html = render_seo(&dataset, &settings);
        assert!(html.contains("<h1>My Nav</h1>"));
        assert!(html.contains("&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;"));
        assert!(html.contains("href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\""));
    }

    #[test]
    fn test_const_script_is_script_safe() {
        let cfg: Config = serde_yaml::from_str(
            "port: 1\nhashMode: true\naddress: \"</script><script>alert(1)\"\n",
        )
        .unwrap();
        let script = render_const_script(&cfg);
        assert!(script.contains("window.__HASH_MODE__ = true;"));
        assert_eq!(script.matches("</script>").count(), 1);
    }
}
