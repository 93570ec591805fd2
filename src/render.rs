//! Article body to HTML. The JATS `<body>` and `<abstract>` are first lowered
//! to a JSON tree (`{"tag", "attrs", "children"}` objects and bare strings),
//! which a [`BodyRenderer`] turns into one standalone HTML page.

use std::fs;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::escape::escape;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::domain::ResourceKind;
use crate::error::OapmcError;
use crate::naming::slugify_name;
use crate::package::Package;
use crate::xml::{self, Element, Node};

pub trait BodyRenderer {
    fn render(&self, document: &Value, package: &Package) -> Result<String, OapmcError>;
}

pub fn element_tree(el: &Element) -> Value {
    let attrs: Map<String, Value> = el
        .attrs
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    let children: Vec<Value> = el
        .children
        .iter()
        .map(|node| match node {
            Node::Element(child) => element_tree(child),
            Node::Text(text) => Value::String(text.clone()),
        })
        .collect();
    json!({ "tag": el.name, "attrs": attrs, "children": children })
}

/// `{"abstract": tree | null, "body": tree}` for the first abstract without
/// an `abstract-type` and the article body.
pub fn document_tree(source: &str) -> Result<Value, OapmcError> {
    let root = xml::parse(source)?;
    let abstract_tree = root
        .descendants("abstract")
        .into_iter()
        .find(|el| el.attr("abstract-type").is_none())
        .map(element_tree)
        .unwrap_or(Value::Null);
    let body_tree = match root.first_descendant("body") {
        Some(body) => element_tree(body),
        None => json!({ "tag": "body", "attrs": {}, "children": [] }),
    };
    Ok(json!({ "abstract": abstract_tree, "body": body_tree }))
}

/// Renders into a page that references package resources; formula graphics
/// are inlined from `root` as base64 `data:` uris.
pub struct HtmlRenderer {
    root: PathBuf,
}

impl HtmlRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BodyRenderer for HtmlRenderer {
    fn render(&self, document: &Value, package: &Package) -> Result<String, OapmcError> {
        let title = package.description.as_deref().unwrap_or(&package.name);
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n<article>\n", escape(title)));
        html.push_str(&format!("<h1>{}</h1>\n", escape(title)));

        let mut writer = Writer {
            root: &self.root,
            package,
            out: String::new(),
            depth: 0,
            in_formula: false,
        };
        if !document["abstract"].is_null() {
            writer.out.push_str("<section class=\"abstract\">\n<h2>Abstract</h2>\n");
            writer.children(&document["abstract"])?;
            writer.out.push_str("</section>\n");
        }
        writer.children(&document["body"])?;
        html.push_str(&writer.out);
        html.push_str("</article>\n</body>\n</html>\n");
        Ok(html)
    }
}

struct Writer<'a> {
    root: &'a PathBuf,
    package: &'a Package,
    out: String,
    depth: usize,
    in_formula: bool,
}

impl Writer<'_> {
    fn children(&mut self, node: &Value) -> Result<(), OapmcError> {
        if let Some(children) = node["children"].as_array() {
            for child in children {
                self.node(child)?;
            }
        }
        Ok(())
    }

    fn node(&mut self, node: &Value) -> Result<(), OapmcError> {
        let tag = match node {
            Value::String(text) => {
                self.out.push_str(&escape(text));
                return Ok(());
            }
            Value::Object(_) => node["tag"].as_str().unwrap_or_default(),
            _ => return Err(OapmcError::Render("unexpected node in body tree".to_string())),
        };
        let attr = |key: &str| node["attrs"][key].as_str().map(str::to_string);

        match tag {
            "sec" => {
                self.open("section", attr("id"));
                self.depth += 1;
                self.children(node)?;
                self.depth -= 1;
                self.out.push_str("</section>\n");
            }
            "title" => {
                let level = (self.depth + 1).min(6);
                self.out.push_str(&format!("<h{level}>"));
                self.children(node)?;
                self.out.push_str(&format!("</h{level}>\n"));
            }
            "p" => self.wrap("p", node)?,
            "italic" => self.wrap("em", node)?,
            "bold" => self.wrap("strong", node)?,
            "sup" | "sub" => self.wrap(tag, node)?,
            "underline" => self.wrap("u", node)?,
            "monospace" => self.wrap("code", node)?,
            "list" => {
                let list = if attr("list-type").as_deref() == Some("order") { "ol" } else { "ul" };
                self.wrap(list, node)?;
            }
            "list-item" => self.wrap("li", node)?,
            "xref" => {
                let target = attr("rid").unwrap_or_default();
                self.out
                    .push_str(&format!("<a href=\"#{}\">", escape(&target)));
                self.children(node)?;
                self.out.push_str("</a>");
            }
            "ext-link" | "uri" => {
                let href = attr("xlink:href").unwrap_or_default();
                self.out.push_str(&format!("<a href=\"{}\">", escape(&href)));
                self.children(node)?;
                self.out.push_str("</a>");
            }
            "fig" => {
                self.open("figure", attr("id"));
                self.children(node)?;
                self.out.push_str("</figure>\n");
            }
            "caption" => self.wrap("figcaption", node)?,
            "label" => {
                self.out.push_str("<span class=\"label\">");
                self.children(node)?;
                self.out.push_str("</span> ");
            }
            "table-wrap" => {
                self.out.push_str("<div class=\"table-wrap\"");
                if let Some(id) = attr("id") {
                    self.out.push_str(&format!(" id=\"{}\"", escape(&id)));
                }
                self.out.push('>');
                self.children(node)?;
                self.out.push_str("</div>\n");
            }
            "table" | "thead" | "tbody" | "tr" | "td" | "th" => self.wrap(tag, node)?,
            "inline-formula" | "disp-formula" => {
                let element = if tag == "inline-formula" { "span" } else { "div" };
                self.out
                    .push_str(&format!("<{element} class=\"{tag}\">"));
                let outer = self.in_formula;
                self.in_formula = true;
                self.children(node)?;
                self.in_formula = outer;
                self.out.push_str(&format!("</{element}>"));
            }
            "graphic" | "inline-graphic" => {
                let href = attr("xlink:href").unwrap_or_default();
                let src = if self.in_formula {
                    self.inline_image(&href)?
                } else {
                    self.resource_src(&href)
                };
                self.out
                    .push_str(&format!("<img src=\"{}\" alt=\"{}\"/>", escape(&src), escape(&href)));
            }
            // Anything else renders as its content.
            _ => self.children(node)?,
        }
        Ok(())
    }

    fn open(&mut self, element: &str, id: Option<String>) {
        match id {
            Some(id) => self.out.push_str(&format!("<{element} id=\"{}\">\n", escape(&id))),
            None => self.out.push_str(&format!("<{element}>\n")),
        }
    }

    fn wrap(&mut self, element: &str, node: &Value) -> Result<(), OapmcError> {
        self.out.push_str(&format!("<{element}>"));
        self.children(node)?;
        self.out.push_str(&format!("</{element}>"));
        Ok(())
    }

    /// Url or package-relative path of the figure resource behind `href`.
    fn resource_src(&self, href: &str) -> String {
        let slug = slugify_name(href);
        self.package
            .resources(ResourceKind::Figure)
            .iter()
            .find(|figure| figure.name == slug)
            .and_then(|figure| {
                figure
                    .encodings()
                    .iter()
                    .find_map(|enc| enc.content_url.clone().or_else(|| enc.content_path.clone()))
            })
            .unwrap_or_else(|| href.to_string())
    }

    /// Formula renderings ship only in the bundle; their bytes go into the page.
    fn inline_image(&self, href: &str) -> Result<String, OapmcError> {
        let slug = slugify_name(href);
        let local = self
            .package
            .resources(ResourceKind::Figure)
            .iter()
            .filter(|figure| figure.name == slug)
            .flat_map(|figure| figure.encodings())
            .find_map(|enc| {
                enc.content_path
                    .as_ref()
                    .map(|path| (path.clone(), enc.encoding_format.clone()))
            });
        let Some((path, format)) = local else {
            return Ok(self.resource_src(href));
        };
        let bytes = fs::read(self.root.join(&path))
            .map_err(|err| OapmcError::Render(format!("read {path}: {err}")))?;
        debug!("inlining formula {path}");
        let mime = format.unwrap_or_else(|| {
            mime_guess::from_path(&path)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }
}
