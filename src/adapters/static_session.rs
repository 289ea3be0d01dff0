//! 不需要瀏覽器的 `BrowserSession`：以 HTTP 抓取頁面，點擊即跟隨連結，
//! `target="_blank"` 開新頁面，iframe 另外抓取
//!
//! 需要執行腳本的預約頁面要在 `SessionFactory` 後面接真正的瀏覽器

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;

use crate::core::html::{element_text, resolve_link, usable_href, IFRAME};
use crate::core::{BrowserSession, PageFetcher, SessionFactory};
use crate::utils::error::{Result, ScoutError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub url: String,
    pub new_surface: bool,
}

#[derive(Debug, Clone)]
struct Surface {
    url: String,
    html: String,
}

fn link_of(element: ElementRef<'_>, base: &str) -> Option<LinkTarget> {
    let value = element.value();
    let href = match value.name() {
        "a" | "area" => value.attr("href"),
        "button" | "input" => value.attr("formaction"),
        _ => None,
    }?;
    let url = resolve_link(base, usable_href(href)?)?;
    Some(LinkTarget {
        url,
        new_surface: value.attr("target") == Some("_blank"),
    })
}

/// 元素本身的連結，沒有的話找最近一層有連結的祖先
fn link_of_or_ancestor(element: ElementRef<'_>, base: &str) -> Option<LinkTarget> {
    link_of(element, base).or_else(|| {
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find_map(|ancestor| link_of(ancestor, base))
    })
}

/// 點擊第一個包含 `text` 的元素會前往的位置
pub fn locate_text_link(html: &str, base: &str, text: &str) -> Option<LinkTarget> {
    let document = Html::parse_document(html);
    let needle = text.trim();
    if needle.is_empty() {
        return None;
    }

    document
        .root_element()
        .descendants()
        .filter(|node| node.value().as_text().is_some_and(|t| t.contains(needle)))
        .filter_map(|node| node.parent().and_then(ElementRef::wrap))
        .find_map(|element| link_of_or_ancestor(element, base))
        .or_else(|| {
            // 文字被拆在多個子元素中
            document
                .root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| matches!(e.value().name(), "a" | "button"))
                .filter(|e| element_text(*e).contains(needle))
                .find_map(|e| link_of_or_ancestor(e, base))
        })
}

/// 點擊第一個符合 `selector` 且可導覽的元素會前往的位置
pub fn locate_selector_link(html: &str, base: &str, selector: &str) -> Result<Option<LinkTarget>> {
    let selector = Selector::parse(selector).map_err(|e| ScoutError::SessionError {
        message: format!("bad selector '{}': {:?}", selector, e),
    })?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .find_map(|element| link_of_or_ancestor(element, base)))
}

pub fn frame_urls(html: &str, base: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&IFRAME)
        .filter_map(|frame| frame.value().attr("src"))
        .filter_map(usable_href)
        .filter_map(|src| resolve_link(base, src))
        .collect()
}

pub struct StaticSession {
    fetcher: Arc<dyn PageFetcher>,
    frame_timeout: Duration,
    surfaces: Vec<Surface>,
    current: usize,
}

impl StaticSession {
    pub fn new(fetcher: Arc<dyn PageFetcher>, frame_timeout: Duration) -> Self {
        Self {
            fetcher,
            frame_timeout,
            surfaces: Vec::new(),
            current: 0,
        }
    }

    fn current_surface(&self) -> Result<&Surface> {
        self.surfaces
            .get(self.current)
            .ok_or_else(|| ScoutError::SessionError {
                message: "no page loaded".to_string(),
            })
    }

    async fn follow(&mut self, target: LinkTarget) -> Result<()> {
        tracing::debug!("Following {} (new tab: {})", target.url, target.new_surface);
        let html = self.fetcher.fetch(&target.url).await?;
        let surface = Surface {
            url: target.url,
            html,
        };
        if target.new_surface || self.surfaces.is_empty() {
            self.surfaces.push(surface);
        } else {
            self.surfaces[self.current] = surface;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for StaticSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.follow(LinkTarget {
            url: url.to_string(),
            new_surface: false,
        })
        .await
    }

    async fn settle(&mut self, _wait: Duration) -> Result<()> {
        // 靜態頁面抓下來就是最終狀態
        Ok(())
    }

    async fn click_text(&mut self, text: &str) -> Result<bool> {
        let surface = self.current_surface()?;
        let Some(target) = locate_text_link(&surface.html, &surface.url, text) else {
            return Ok(false);
        };
        self.follow(target).await?;
        Ok(true)
    }

    async fn click_selector(&mut self, selector: &str) -> Result<bool> {
        let surface = self.current_surface()?;
        let Some(target) = locate_selector_link(&surface.html, &surface.url, selector)? else {
            return Ok(false);
        };
        self.follow(target).await?;
        Ok(true)
    }

    async fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    async fn switch_to_latest_surface(&mut self) -> Result<()> {
        if self.surfaces.is_empty() {
            return Err(ScoutError::SessionError {
                message: "no surface to switch to".to_string(),
            });
        }
        self.current = self.surfaces.len() - 1;
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.current_surface()?.html.clone())
    }

    async fn frame_contents(&self) -> Result<Vec<String>> {
        let surface = self.current_surface()?;
        let mut frames = Vec::new();
        for url in frame_urls(&surface.html, &surface.url) {
            match tokio::time::timeout(self.frame_timeout, self.fetcher.fetch(&url)).await {
                Ok(Ok(html)) => frames.push(html),
                Ok(Err(e)) => tracing::warn!("⚠️ Frame {} failed: {}", url, e),
                Err(_) => tracing::warn!("⚠️ Frame {} timed out", url),
            }
        }
        Ok(frames)
    }

    async fn current_url(&self) -> String {
        self.current_surface()
            .map(|s| s.url.clone())
            .unwrap_or_default()
    }
}

pub struct StaticSessionFactory {
    fetcher: Arc<dyn PageFetcher>,
    frame_timeout: Duration,
}

impl StaticSessionFactory {
    pub fn new(fetcher: Arc<dyn PageFetcher>, frame_timeout: Duration) -> Self {
        Self {
            fetcher,
            frame_timeout,
        }
    }
}

#[async_trait]
impl SessionFactory for StaticSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        Ok(Box::new(StaticSession::new(
            self.fetcher.clone(),
            self.frame_timeout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://club.example.com/guests/calendar?d=2026-10-18";

    #[test]
    fn test_locate_text_link_climbs_to_anchor() {
        let html = r#"<table><tr><td><a href="/book?p=18" target="_blank"><span>$45.00</span></a></td></tr></table>"#;
        let target = locate_text_link(html, BASE, "$45.00").unwrap();
        assert_eq!(target.url, "https://club.example.com/book?p=18");
        assert!(target.new_surface);
    }

    #[test]
    fn test_locate_text_link_without_link_is_none() {
        let html = "<p>$45.00 green fee</p>";
        assert!(locate_text_link(html, BASE, "$45.00").is_none());
    }

    #[test]
    fn test_locate_selector_link_skips_dead_links() {
        let html = r##"<a href="#">Top</a><a href="javascript:void(0)">Menu</a><a href="timesheet">Book</a>"##;
        let target = locate_selector_link(html, BASE, "a[href], button").unwrap().unwrap();
        assert_eq!(target.url, "https://club.example.com/guests/timesheet");
        assert!(!target.new_surface);
        assert!(locate_selector_link(html, BASE, "table a[href]").unwrap().is_none());
        assert!(locate_selector_link(html, BASE, "a[[").is_err());
    }

    #[test]
    fn test_frame_urls_resolve_against_page() {
        let html = r#"<iframe src="/sheet?d=1"></iframe><iframe></iframe>"#;
        assert_eq!(
            frame_urls(html, BASE),
            vec!["https://club.example.com/sheet?d=1".to_string()]
        );
    }
}
