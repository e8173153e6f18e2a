//! The HTML page returned for every request.

use crate::capture::CapturedFrame;

/// Builds the response body from the current bridge state.
pub trait Render {
    /// `status` is empty when there is nothing to report. `frame` is `None` until
    /// the first bus frame was captured.
    fn render(&self, status: &str, frame: Option<&CapturedFrame>) -> String;
}

impl<F> Render for F
where
    F: Fn(&str, Option<&CapturedFrame>) -> String,
{
    fn render(&self, status: &str, frame: Option<&CapturedFrame>) -> String {
        self(status, frame)
    }
}

/// Sniffer/sender status page: last captured frame and the frame injection form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPage;

const WAITING: &str = "Waiting for data...";

const STYLE: &str = "\
body { font-family: monospace; background: #1e1e1e; color: #d4d4d4; padding: 20px; max-width: 1200px; margin: 0 auto; }
h1 { color: #569cd6; } h2 { color: #4ec9b0; }
.frame, .send-frame, .message { background: #2d2d2d; padding: 15px; margin: 10px 0; }
.frame { border-left: 4px solid #007acc; }
.send-frame, .message { border-left: 4px solid #4ec9b0; }
.message { color: #4ec9b0; }
.label { color: #9cdcfe; font-weight: bold; }
.examples { color: #6a9955; font-size: 12px; }
input[type=\"text\"] { width: 100%; padding: 10px; background: #1e1e1e; border: 1px solid #007acc; color: #d4d4d4; font-family: monospace; box-sizing: border-box; }
button { background: #007acc; color: white; border: none; padding: 10px 20px; margin-top: 10px; cursor: pointer; }
";

impl Render for StatusPage {
    fn render(&self, status: &str, frame: Option<&CapturedFrame>) -> String {
        let status_html = if status.is_empty() {
            String::new()
        } else {
            format!("<div class=\"message\">{}</div>", escape(status))
        };
        let (hex, dec, len) = match frame {
            Some(frame) => (frame.to_hex(), frame.to_decimal(), frame.len()),
            None => (WAITING.to_string(), String::new(), 0),
        };

        format!(
            "<!DOCTYPE html>
<html>
<head>
<meta charset=\"utf-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<title>iBUS Sniffer/Sender</title>
<style>
{style}</style>
</head>
<body>
<h1>iBUS Sniffer/Sender</h1>
{status_html}
<div class=\"frame\">
<h2>Received data</h2>
<p><span class=\"label\">HEX:</span> {hex}</p>
<p><span class=\"label\">DEC:</span> {dec}</p>
<p><span class=\"label\">Length:</span> {len} bytes</p>
</div>
<div class=\"send-frame\">
<h2>Send a frame</h2>
<form method=\"POST\" action=\"/send\">
<p><span class=\"label\">Hex data:</span></p>
<input type=\"text\" name=\"hex_data\" placeholder=\"FD A0 09 A0 FF 01 FF FF 9F 75\" required>
<button type=\"submit\">Send on bus</button>
</form>
<div class=\"examples\">
<p>Auto mode: FD A0 09 A0 FF 01 FF FF 9F 75</p>
<p>Boost mode: FD A0 09 A0 FF 02 FF FF 9F 76</p>
<p>Spaces, commas and 0x prefixes are optional.</p>
</div>
</div>
<p><a href=\"/\">Refresh</a></p>
</body>
</html>
",
            style = STYLE,
            status_html = status_html,
            hex = hex,
            dec = dec,
            len = len,
        )
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
