//! Browsing tools exposed to the LLM agent.

use crate::error::{GigscoutError, Result};
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Maximum number of links returned by `find_links`.
const MAX_LINKS: usize = 80;

/// Available tools for the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum BrowserTool {
    /// Fetch a page and return its readable text.
    OpenPage { url: String },

    /// List the links on a page, optionally filtered by a substring.
    FindLinks {
        url: String,
        #[serde(default)]
        contains: Option<String>,
    },

    /// Finish the run with a final result.
    Done {
        result: String,
        #[serde(default = "default_success")]
        success: bool,
    },
}

fn default_success() -> bool {
    true
}

impl std::fmt::Display for BrowserTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserTool::OpenPage { url } => write!(f, "open_page({})", url),
            BrowserTool::FindLinks { url, contains: Some(c) } => {
                write!(f, "find_links({}, contains={})", url, c)
            }
            BrowserTool::FindLinks { url, contains: None } => write!(f, "find_links({})", url),
            BrowserTool::Done { success, .. } => write!(f, "done(success={})", success),
        }
    }
}

/// Elements whose text never reaches the model.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "svg", "template", "head"];

/// Elements that end a line of readable text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article", "header",
    "footer", "table", "ul", "ol", "dt", "dd",
];

/// Fetches pages over HTTP and reduces them to text the model can read.
pub struct PageFetcher {
    client: reqwest::Client,
    max_chars: usize,
    title_selector: Selector,
    link_selector: Selector,
}

impl PageFetcher {
    /// Create a fetcher with the given user agent, per-page timeout and text limit.
    pub fn new(user_agent: &str, timeout: Duration, max_chars: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            max_chars,
            title_selector: selector("title")?,
            link_selector: selector("a[href]")?,
        })
    }

    /// Execute a tool call and return the result as a string.
    ///
    /// `Done` is handled by the runner and simply echoes its result here.
    pub async fn execute(&self, tool: &BrowserTool) -> Result<String> {
        match tool {
            BrowserTool::OpenPage { url } => self.open_page(url).await,
            BrowserTool::FindLinks { url, contains } => {
                self.find_links(url, contains.as_deref()).await
            }
            BrowserTool::Done { result, .. } => Ok(result.clone()),
        }
    }

    async fn fetch(&self, raw_url: &str) -> Result<(Url, String)> {
        let url = parse_http_url(raw_url)?;
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| GigscoutError::Fetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GigscoutError::Fetch(format!("{} returned HTTP {}", url, status)));
        }

        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok((final_url, body))
    }

    async fn open_page(&self, url: &str) -> Result<String> {
        let (final_url, html) = self.fetch(url).await?;
        let (title, text) = self.read_page(&html);
        let text = truncate_chars(&text, self.max_chars);

        Ok(format!("# {}\nURL: {}\n\n{}", title, final_url, text))
    }

    async fn find_links(&self, url: &str, contains: Option<&str>) -> Result<String> {
        let (final_url, html) = self.fetch(url).await?;
        let links = self.links(&html, &final_url, contains);

        if links.is_empty() {
            return Ok(format!("No matching links found on {}.", final_url));
        }

        let formatted = links
            .iter()
            .map(|(text, href)| {
                if text.is_empty() {
                    format!("- {}", href)
                } else {
                    format!("- {} -> {}", text, href)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!("Links on {} ({}):\n\n{}", final_url, links.len(), formatted))
    }

    /// Title and readable text of an HTML document, parsed once.
    fn read_page(&self, html: &str) -> (String, String) {
        let doc = Html::parse_document(html);

        let title = doc
            .select(&self.title_selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default();

        let mut text = String::new();
        collect_text(doc.root_element(), &mut text);

        (title, collapse_whitespace(&text))
    }

    /// Readable text of an HTML document.
    pub fn to_text(&self, html: &str) -> String {
        self.read_page(html).1
    }

    /// Absolute links in a document with their anchor text, deduplicated, in order.
    pub fn links(&self, html: &str, base: &Url, contains: Option<&str>) -> Vec<(String, String)> {
        let doc = Html::parse_document(html);
        let mut seen = std::collections::HashSet::new();
        let mut links = Vec::new();

        for anchor in doc.select(&self.link_selector) {
            let Some(href) = anchor.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            let Ok(mut resolved) = base.join(href) else {
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            resolved.set_fragment(None);
            let resolved = resolved.to_string();
            if contains.is_some_and(|c| !resolved.contains(c)) {
                continue;
            }
            if !seen.insert(resolved.clone()) {
                continue;
            }

            let text = collapse_whitespace(&anchor.text().collect::<String>());
            links.push((text.replace('\n', " "), resolved));

            if links.len() >= MAX_LINKS {
                break;
            }
        }

        links
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| GigscoutError::Config(format!("Invalid selector {:?}: {:?}", css, e)))
}

/// Append the visible text under `element`, breaking lines after block elements.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
                if BLOCK_ELEMENTS.contains(&name) {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| GigscoutError::Fetch(format!("invalid URL {:?}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GigscoutError::Fetch(format!("unsupported URL scheme: {}", other))),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n[... truncated]", &text[..idx]),
        None => text.to_string(),
    }
}

/// Get OpenAI function/tool definitions for the agent.
pub fn tool_definitions() -> Vec<async_openai::types::ChatCompletionTool> {
    use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};

    vec![
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "open_page".to_string(),
                description: Some(
                    "Open a web page and read its text. \
                    Use this for search result pages and event detail pages."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Absolute http(s) URL"
                        }
                    },
                    "required": ["url"]
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "find_links".to_string(),
                description: Some(
                    "List the links on a web page with their text. \
                    Use this to discover event detail page URLs on a results page."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Absolute http(s) URL"
                        },
                        "contains": {
                            "type": "string",
                            "description": "Only return links whose URL contains this text, e.g. '/event/'"
                        }
                    },
                    "required": ["url"]
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "done".to_string(),
                description: Some(
                    "Finish the task. Call this exactly once with the final result."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "result": {
                            "type": "string",
                            "description": "The final result in the requested format"
                        },
                        "success": {
                            "type": "boolean",
                            "description": "Whether the task was completed successfully"
                        }
                    },
                    "required": ["result"]
                })),
                strict: None,
            },
        },
    ]
}

/// Parse a tool call from the OpenAI response format.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<BrowserTool> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| GigscoutError::Agent(format!("Invalid tool arguments: {}", e)))?;

    let url_arg = || {
        args["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GigscoutError::Agent("Missing 'url' argument".to_string()))
    };

    match name {
        "open_page" => Ok(BrowserTool::OpenPage { url: url_arg()? }),
        "find_links" => Ok(BrowserTool::FindLinks {
            url: url_arg()?,
            contains: args["contains"]
                .as_str()
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }),
        "done" => {
            // Some models send the result as a JSON value rather than a string.
            let result = match &args["result"] {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => {
                    return Err(GigscoutError::Agent("Missing 'result' argument".to_string()))
                }
                other => other.to_string(),
            };
            let success = args["success"].as_bool().unwrap_or(true);
            Ok(BrowserTool::Done { result, success })
        }
        _ => Err(GigscoutError::Agent(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> PageFetcher {
        PageFetcher::new("test", Duration::from_secs(1), 100).unwrap()
    }

    #[test]
    fn test_parse_open_page_tool() {
        let tool = parse_tool_call("open_page", r#"{"url": "https://www.showstart.com"}"#).unwrap();
        assert_eq!(
            tool,
            BrowserTool::OpenPage {
                url: "https://www.showstart.com".to_string()
            }
        );
        assert!(parse_tool_call("open_page", "{}").is_err());
        assert!(parse_tool_call("click", "{}").is_err());
    }

    #[test]
    fn test_parse_done_tool() {
        let tool = parse_tool_call("done", r#"{"result": "{\"performances\": []}"}"#).unwrap();
        assert_eq!(
            tool,
            BrowserTool::Done {
                result: r#"{"performances": []}"#.to_string(),
                success: true
            }
        );

        // A structured result is re-serialized.
        let tool = parse_tool_call("done", r#"{"result": {"performances": []}, "success": false}"#)
            .unwrap();
        match tool {
            BrowserTool::Done { result, success } => {
                assert_eq!(result, r#"{"performances":[]}"#);
                assert!(!success);
            }
            _ => panic!("Expected Done tool"),
        }
    }

    #[test]
    fn test_html_to_text() {
        let html = r#"<html><head><title>KITO &amp; friends</title><style>.a{color:red}</style>
<script>var x = "<p>";</script></head>
<body><div>MAO Livehouse</div><p>08月24日&nbsp;19:00<br>￥158</p></body></html>"#;
        let text = fetcher().to_text(html);
        assert!(text.contains("MAO Livehouse"));
        assert!(text.contains("08月24日 19:00\n￥158"));
        assert!(!text.contains("color"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("KITO & friends"));
    }

    #[test]
    fn test_html_to_text_keeps_bare_angle_brackets() {
        let html = "<p>VIP &lt;limited&gt; seats: price < 300 and guests > 2 allowed</p><p>08月24日</p>";
        let text = fetcher().to_text(html);
        assert_eq!(
            text,
            "VIP <limited> seats: price < 300 and guests > 2 allowed\n08月24日"
        );
    }

    #[test]
    fn test_read_page_title_decodes_entities() {
        let html = "<html><head><title> KITO &amp; friends &yen;158 </title></head><body>x</body></html>";
        let (title, text) = fetcher().read_page(html);
        assert_eq!(title, "KITO & friends ¥158");
        assert_eq!(text, "x");
    }

    #[test]
    fn test_links_resolved_filtered_and_deduplicated() {
        let html = r##"
<a href="/event/273756"><span>KITO Tour</span></a>
<a class="x" href="/event/273756">again</a>
<a href='https://www.showstart.com/event/1'>Other</a>
<a href="/artist/9">Artist</a>
<a href="javascript:void(0)">js</a>
<a href="#top">top</a>
<a href="/event/1#tickets">fragment</a>"##;
        let base = Url::parse("https://www.showstart.com/event/list?keyword=kito").unwrap();
        let links = fetcher().links(html, &base, Some("/event/"));
        assert_eq!(
            links,
            vec![
                (
                    "KITO Tour".to_string(),
                    "https://www.showstart.com/event/273756".to_string()
                ),
                ("Other".to_string(), "https://www.showstart.com/event/1".to_string()),
            ]
        );
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("秀动秀动", 2), "秀动\n[... truncated]");
        assert_eq!(truncate_chars("abc", 5), "abc");
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(parse_http_url("file:///etc/passwd").is_err());
        assert!(parse_http_url("not a url").is_err());
        assert!(parse_http_url(" https://www.showstart.com ").is_ok());
    }

    #[test]
    fn test_tool_display() {
        let tool = BrowserTool::FindLinks {
            url: "https://a.b".to_string(),
            contains: Some("/event/".to_string()),
        };
        assert_eq!(tool.to_string(), "find_links(https://a.b, contains=/event/)");
    }
}
