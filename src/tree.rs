use std::collections::VecDeque;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ConvertError;

/// One element of the parsed document. The name is the tag exactly as
/// written, prefix included (e.g. `gml:Envelope`); the source documents are
/// namespace-prefixed but matched on the literal string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// First direct child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// An immutable tree for one source document.
#[derive(Debug, Clone)]
pub struct XmlTree {
    root: XmlNode,
}

impl XmlTree {
    /// Builds the tree from raw markup. quick-xml does the tokenizing and
    /// tag-pair validation; this only stacks elements into owned nodes.
    pub fn parse(xml: &str) -> Result<Self, ConvertError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        // 疑似ルート。文書の最上位要素はこの子になる。
        let mut stack: Vec<XmlNode> = vec![XmlNode::new(String::new())];

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    stack.push(XmlNode::new(name));
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::new(name));
                    }
                }
                Event::End(_) => {
                    // quick-xml rejects unbalanced tags before this can underflow
                    if stack.len() > 1 {
                        if let Some(node) = stack.pop() {
                            if let Some(parent) = stack.last_mut() {
                                parent.children.push(node);
                            }
                        }
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(quick_xml::Error::from)?;
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() > 1 {
            let unclosed = stack.pop().map(|n| n.name).unwrap_or_default();
            return Err(quick_xml::Error::IllFormed(
                quick_xml::errors::IllFormedError::MissingEndTag(unclosed),
            )
            .into());
        }

        let root = stack.swap_remove(0);
        Ok(Self { root })
    }

    pub fn root(&self) -> &XmlNode {
        &self.root
    }
}

/// Breadth-first first-match lookup by tag name, anywhere under `root`.
/// `root` itself is never matched. Linear scan is fine here: each document is
/// visited once and the trees are shallow, a few hundred nodes at most.
pub fn find_node<'a>(root: &'a XmlNode, name: &str) -> Option<&'a XmlNode> {
    let mut queue: VecDeque<&XmlNode> = VecDeque::new();
    queue.push_back(root);

    while let Some(front) = queue.pop_front() {
        for child in front.children() {
            if !child.name().is_empty() && child.name() == name {
                return Some(child);
            }
            queue.push_back(child);
        }
    }
    None
}
