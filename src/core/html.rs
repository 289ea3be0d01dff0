//! 擷取策略與靜態工作階段共用的 `scraper` 工具函式

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::core::normalize::squash_whitespace;

pub static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
pub static IFRAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[src], frame[src]").unwrap());

/// 元素的純文字，空白已壓縮
pub fn element_text(element: ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn document_text(document: &Html) -> String {
    element_text(document.root_element())
}

/// 一列的 `td`/`th`，依 `colspan` 重複展開，讓合併儲存格的欄位索引對齊
pub fn expand_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut expanded = Vec::new();
    for cell in row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
    {
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);
        expanded.extend(std::iter::repeat(cell).take(span));
    }
    expanded
}

/// 排除空字串、`#` 錨點與 `javascript:` 連結
pub fn usable_href(href: &str) -> Option<&str> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();
    if href.is_empty() || href.starts_with('#') || lowered.starts_with("javascript:") {
        None
    } else {
        Some(href)
    }
}

/// 以所在頁面網址解析相對連結
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_cells_repeats_by_colspan() {
        let doc = Html::parse_document(
            "<table><tr><th colspan=\"2\">Time</th><th>9 Holes</th><th colspan=\"x\">18 Holes</th></tr></table>",
        );
        let row_sel = Selector::parse("tr").unwrap();
        let row = doc.select(&row_sel).next().unwrap();
        let texts: Vec<String> = expand_cells(row).into_iter().map(element_text).collect();
        assert_eq!(texts, vec!["Time", "Time", "9 Holes", "18 Holes"]);
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link("https://club.example.com/teetimes/searchmatrix?d=1", "/teetimes/book/1").unwrap(),
            "https://club.example.com/teetimes/book/1"
        );
        assert_eq!(
            resolve_link("not a url", "https://other.example.com/x").unwrap(),
            "https://other.example.com/x"
        );
        assert!(resolve_link("not a url", "/relative").is_none());
    }

    #[test]
    fn test_usable_href() {
        assert_eq!(usable_href(" /book "), Some("/book"));
        assert!(usable_href("#").is_none());
        assert!(usable_href("javascript:void(0)").is_none());
        assert!(usable_href("").is_none());
    }
}
