//! Reduces rich product copy to a small, attribute-free HTML vocabulary and
//! drops the reseller's promotional tail.
//!
//! Content is held as a flat list of nodes in document order, each pointing at
//! its parent. A node's descendants are the contiguous run that follows it, so
//! "this node and everything after it" is a truncation of the list.

use scraper::{ElementRef, Html, Node as DomNode};

use crate::error::{Result, ScraperError};

/// Elements that survive sanitizing; everything else is unwrapped.
pub const ALLOWED_TAGS: [&str; 8] = ["h2", "h3", "h4", "p", "ul", "ol", "li", "br"];

/// Quoted brand name that starts the promotional tail.
pub const BRAND_QUOTED: &str = "«Вистерма»";
/// Capitalized brand name found in trailing contact lines.
pub const BRAND_UPPER: &str = "ВИСТЕРМА";

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Element(&'static str),
    Text(String),
}

#[derive(Debug, Clone)]
struct Item {
    parent: Option<usize>,
    depth: usize,
    content: Content,
}

/// Restricted-vocabulary markup in document order.
#[derive(Debug, Default, Clone)]
pub struct Fragment {
    items: Vec<Item>,
}

fn allowed_tag(name: &str) -> Option<&'static str> {
    ALLOWED_TAGS.iter().copied().find(|tag| *tag == name)
}

impl Fragment {
    /// Builds a fragment from the children of `root`; `root` itself is not kept.
    pub fn from_element(root: ElementRef<'_>) -> Result<Self> {
        let mut fragment = Self::default();
        let mut resumed = Vec::new();
        fragment.push_children(root, None, 0, &mut resumed)?;
        fragment.drop_blank_paragraphs(&resumed);
        Ok(fragment)
    }

    /// Parses a markup string. Document and body wrappers are unwrapped like any
    /// other disallowed element.
    pub fn parse(html: &str) -> Result<Self> {
        let document = Html::parse_fragment(html);
        Self::from_element(document.root_element())
    }

    fn push_element(&mut self, parent: Option<usize>, tag: &'static str) -> usize {
        let depth = parent.map_or(0, |p| self.items[p].depth + 1);
        self.items.push(Item {
            parent,
            depth,
            content: Content::Element(tag),
        });
        self.items.len() - 1
    }

    /// Appends the children of `element` under `parent`. Returns the node that
    /// later siblings belong to, which differs from `parent` once a block had to
    /// be lifted out of a paragraph.
    fn push_children(
        &mut self,
        element: ElementRef<'_>,
        mut parent: Option<usize>,
        nesting: usize,
        resumed: &mut Vec<usize>,
    ) -> Result<Option<usize>> {
        if nesting > MAX_DEPTH {
            return Err(ScraperError::NestingTooDeep(MAX_DEPTH));
        }

        for child in element.children() {
            let depth = parent.map_or(0, |p| self.items[p].depth + 1);
            match child.value() {
                DomNode::Text(text) => self.items.push(Item {
                    parent,
                    depth,
                    content: Content::Text(String::from(&**text)),
                }),
                DomNode::Element(el) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let Some(tag) = allowed_tag(el.name()) else {
                        parent = self.push_children(child_el, parent, nesting + 1, resumed)?;
                        continue;
                    };

                    // Paragraphs hold only text and line breaks. A block found
                    // inside one is placed after the paragraph, which then
                    // continues past the block.
                    let paragraph = parent.filter(|&p| tag != "br" && self.tag(p) == Some("p"));
                    match paragraph {
                        Some(paragraph) => {
                            let outer = self.items[paragraph].parent;
                            let index = self.push_element(outer, tag);
                            self.push_children(child_el, Some(index), nesting + 1, resumed)?;
                            let continued = self.push_element(outer, "p");
                            resumed.push(continued);
                            parent = Some(continued);
                        }
                        None => {
                            let index = self.push_element(parent, tag);
                            self.push_children(child_el, Some(index), nesting + 1, resumed)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(parent)
    }

    /// Removes resumed paragraphs that received nothing but whitespace.
    fn drop_blank_paragraphs(&mut self, paragraphs: &[usize]) {
        let blank: Vec<usize> = paragraphs
            .iter()
            .copied()
            .filter(|&p| {
                (p + 1..self.subtree_end(p)).all(|i| self.tag(i).is_none())
                    && self.text_of(p).trim().is_empty()
            })
            .collect();
        if !blank.is_empty() {
            self.remove(&blank);
        }
    }

    fn tag(&self, index: usize) -> Option<&'static str> {
        match self.items[index].content {
            Content::Element(tag) => Some(tag),
            Content::Text(_) => None,
        }
    }

    /// One past the last descendant of `index`.
    fn subtree_end(&self, index: usize) -> usize {
        let depth = self.items[index].depth;
        (index + 1..self.items.len())
            .find(|&i| self.items[i].depth <= depth)
            .unwrap_or(self.items.len())
    }

    fn next_sibling(&self, index: usize) -> Option<usize> {
        let next = self.subtree_end(index);
        (next < self.items.len() && self.items[next].parent == self.items[index].parent)
            .then_some(next)
    }

    fn text_of(&self, index: usize) -> String {
        (index..self.subtree_end(index))
            .filter_map(|i| match &self.items[i].content {
                Content::Text(text) => Some(text.as_str()),
                Content::Element(_) => None,
            })
            .collect()
    }

    /// Cuts the first element whose text contains `marker`, together with
    /// everything after it in document order. Returns whether a cut happened.
    pub fn truncate_at_marker(&mut self, marker: &str) -> bool {
        let hit = (0..self.items.len())
            .find(|&i| self.tag(i).is_some() && self.text_of(i).contains(marker));
        match hit {
            Some(index) => {
                self.items.truncate(index);
                true
            }
            None => false,
        }
    }

    /// Inside each paragraph, drops the first line break whose following line
    /// mentions the brand, along with that line.
    pub fn strip_branded_lines(&mut self) {
        let mut cursor = 0;
        while let Some(paragraph) = (cursor..self.items.len()).find(|&i| self.tag(i) == Some("p")) {
            let breaks: Vec<usize> = (paragraph + 1..self.subtree_end(paragraph))
                .filter(|&i| self.tag(i) == Some("br"))
                .collect();

            for br in breaks {
                let mut line = Vec::new();
                let mut current = self.next_sibling(br);
                while let Some(sibling) = current {
                    if self.tag(sibling) == Some("br") {
                        break;
                    }
                    line.push(sibling);
                    current = self.next_sibling(sibling);
                }

                let text: String = line.iter().map(|&i| self.text_of(i)).collect();
                if text.contains(BRAND_UPPER) || text.contains(BRAND_QUOTED) {
                    line.push(br);
                    self.remove(&line);
                    break;
                }
            }
            cursor = paragraph + 1;
        }
    }

    /// Removes the given nodes and their descendants, keeping document order.
    fn remove(&mut self, roots: &[usize]) {
        let mut removed = vec![false; self.items.len()];
        let mut remap = vec![None; self.items.len()];
        let mut kept = Vec::with_capacity(self.items.len());

        for (index, item) in self.items.iter().enumerate() {
            removed[index] = roots.contains(&index) || item.parent.is_some_and(|p| removed[p]);
            if removed[index] {
                continue;
            }
            remap[index] = Some(kept.len());
            kept.push(Item {
                parent: item.parent.and_then(|p| remap[p]),
                depth: item.depth,
                content: item.content.clone(),
            });
        }
        self.items = kept;
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let mut open: Vec<usize> = Vec::new();

        for (index, item) in self.items.iter().enumerate() {
            while let Some(&top) = open.last() {
                if Some(top) == item.parent {
                    break;
                }
                close_tag(&mut out, self.tag(top));
                open.pop();
            }
            match &item.content {
                Content::Text(text) => escape_into(&mut out, text),
                Content::Element("br") => out.push_str("<br/>"),
                Content::Element(tag) => {
                    out.push('<');
                    out.push_str(tag);
                    out.push('>');
                    open.push(index);
                }
            }
        }
        while let Some(top) = open.pop() {
            close_tag(&mut out, self.tag(top));
        }
        out
    }
}

fn close_tag(out: &mut String, tag: Option<&str>) {
    if let Some(tag) = tag {
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn clean(mut fragment: Fragment) -> Fragment {
    if fragment.truncate_at_marker(BRAND_QUOTED) {
        log::debug!("Dropped promotional tail starting at {}", BRAND_QUOTED);
    }
    fragment.strip_branded_lines();
    fragment
}

/// Sanitizes the content of a page block. A missing block yields an empty
/// string; a block that cannot be processed is returned unchanged.
pub fn sanitize_block(block: Option<ElementRef<'_>>) -> String {
    let Some(block) = block else {
        return String::new();
    };
    match Fragment::from_element(block) {
        Ok(fragment) => clean(fragment).to_html().trim().to_string(),
        Err(e) => {
            log::warn!("Sanitizing failed, keeping original markup: {}", e);
            block.inner_html()
        }
    }
}

/// Sanitizes a markup string, returning the input unchanged if it cannot be processed.
pub fn sanitize_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    match Fragment::parse(html) {
        Ok(fragment) => clean(fragment).to_html().trim().to_string(),
        Err(e) => {
            log::warn!("Sanitizing failed, keeping original markup: {}", e);
            html.to_string()
        }
    }
}
